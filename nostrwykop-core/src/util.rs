use nostr_sdk::prelude::*;

/// Parse a pubkey given in either 64-char hex or bech32 "npub" form.
///
/// Relay filters only match the hex form, so every entry point that accepts
/// a user-supplied key goes through here first.
pub fn parse_pubkey(input: &str) -> Option<PublicKey> {
    if input.starts_with("npub") {
        PublicKey::from_bech32(input).ok()
    } else {
        PublicKey::from_hex(input).ok()
    }
}

/// Normalize an npub to canonical hex, passing malformed input through
/// unchanged (soft-fail, matching the lookup behaviour: a garbage key just
/// matches nothing on the relay).
pub fn normalize_pubkey(input: &str) -> String {
    match parse_pubkey(input) {
        Some(pk) => pk.to_hex(),
        None => {
            log::warn!("invalid pubkey format, passing through: {}", input);
            input.to_string()
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Extract the first HTTP(S) URL pointing at a raster image from a string.
///
/// Best-effort heuristic: scans for `http://`/`https://`, cuts the URL at the
/// first whitespace or common delimiter, trims trailing punctuation, and
/// keeps it only when the path ends in a known image extension
/// (case-insensitive). Any query string or fragment is cut off, so the
/// returned URL always ends at the extension. No validation that the URL
/// actually resolves.
pub fn extract_image_url(text: &str) -> Option<String> {
    let mut start_idx = 0;

    while let Some(http_idx) = text[start_idx..].find("http") {
        let abs_start = start_idx + http_idx;
        let url_text = &text[abs_start..];

        if !url_text.starts_with("http://") && !url_text.starts_with("https://") {
            start_idx = abs_start + 1;
            continue;
        }

        // Find the end of the URL (first whitespace or common URL-ending chars)
        let mut end_idx = url_text
            .find(|c: char| {
                c.is_whitespace()
                    || c == '"'
                    || c == '<'
                    || c == '>'
                    || c == ')'
                    || c == ']'
                    || c == '}'
                    || c == '|'
            })
            .unwrap_or(url_text.len());

        // Trim trailing punctuation
        while end_idx > 0 {
            let last_char = url_text[..end_idx].chars().last().unwrap();
            if last_char == '.' || last_char == ',' || last_char == ':' || last_char == ';' {
                end_idx -= 1;
            } else {
                break;
            }
        }

        let candidate = &url_text[..end_idx];
        let path = candidate.split(['?', '#']).next().unwrap_or(candidate);
        if has_image_extension(path) {
            return Some(path.to_string());
        }

        start_idx = abs_start + 1;
    }

    None
}

fn has_image_extension(path: &str) -> bool {
    match path.rsplit('.').next() {
        Some(ext) => {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pubkey_roundtrip() {
        let keys = Keys::generate();
        let hex = keys.public_key().to_hex();
        let npub = keys.public_key().to_bech32().unwrap();

        assert_eq!(normalize_pubkey(&hex), hex);
        assert_eq!(normalize_pubkey(&npub), hex);
    }

    #[test]
    fn test_normalize_pubkey_passthrough_on_garbage() {
        assert_eq!(normalize_pubkey("npub1garbage"), "npub1garbage");
        assert_eq!(normalize_pubkey("not-a-key"), "not-a-key");
    }

    #[test]
    fn test_extract_image_url() {
        assert_eq!(
            extract_image_url("look at https://example.com/cat.PNG wow"),
            Some("https://example.com/cat.PNG".to_string())
        );
        assert_eq!(
            extract_image_url("plain link https://example.com/page.html"),
            None
        );
        assert_eq!(extract_image_url("no urls here"), None);
        // First image wins
        assert_eq!(
            extract_image_url("https://a.com/x.jpg https://b.com/y.gif"),
            Some("https://a.com/x.jpg".to_string())
        );
        // Trailing punctuation trimmed
        assert_eq!(
            extract_image_url("see https://a.com/x.webp."),
            Some("https://a.com/x.webp".to_string())
        );
    }

    #[test]
    fn test_extract_image_url_cuts_query_string() {
        assert_eq!(
            extract_image_url("https://a.com/x.png?size=2&v=abc"),
            Some("https://a.com/x.png".to_string())
        );
        assert_eq!(
            extract_image_url("https://a.com/x.jpeg#section"),
            Some("https://a.com/x.jpeg".to_string())
        );
        // A query string cannot smuggle in the extension
        assert_eq!(extract_image_url("https://a.com/page?img=x.png"), None);
    }
}
