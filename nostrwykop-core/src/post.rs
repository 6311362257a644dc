//! Post and comment domain types, plus the pure event parser.
//!
//! A [`Post`] is a point-in-time snapshot: votes and comment counts are
//! re-derived from relay state on every fetch, never stored.

use nostr_sdk::prelude::*;

use crate::profile::Profile;
use crate::util::extract_image_url;

/// Sentinel title for posts whose content has no title line.
pub const NO_TITLE: &str = "Untitled";

/// Maximum summary length before truncation, in characters.
const SUMMARY_LEN: usize = 150;

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    pub author: Profile,
    pub tags: Vec<String>,
    pub votes: i64,
    pub comments_count: u64,
    pub image: Option<String>,
}

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
pub struct Comment {
    pub id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    pub author: Profile,
    pub votes: i64,
    pub replies: Vec<Comment>,
}

/// The author-independent fields decoded from a single kind 1/30023 event.
#[derive(Clone, Debug, PartialEq)]
pub struct PostFragment {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub image: Option<String>,
}

/// Decode one raw post event into a candidate domain fragment.
///
/// Total function: malformed input degrades to documented defaults (sentinel
/// title, empty tag list, no image), never panics.
pub fn parse_post_event(event: &Event) -> PostFragment {
    let (title, content) = split_title(&event.content);
    let summary = summarize(&content);

    // Collect "t" tags in encounter order, duplicates kept
    let tags: Vec<String> = event
        .tags
        .iter()
        .filter_map(|tag| {
            let values = tag.as_slice();
            if values.len() >= 2 && values[0] == "t" {
                Some(values[1].clone())
            } else {
                None
            }
        })
        .collect();

    let image = extract_image_url(&event.content);

    PostFragment {
        title,
        content,
        summary,
        tags,
        image,
    }
}

/// Split content on the first blank line: text before becomes the title,
/// the remainder the body. Without a blank line the whole text stays in the
/// body under the sentinel title, so no content is ever discarded.
fn split_title(raw: &str) -> (String, String) {
    match raw.split_once("\n\n") {
        Some((title, rest)) if !title.is_empty() => (title.to_string(), rest.to_string()),
        _ => (NO_TITLE.to_string(), raw.to_string()),
    }
}

fn summarize(content: &str) -> String {
    let mut summary: String = content.chars().take(SUMMARY_LEN).collect();
    if content.chars().count() > SUMMARY_LEN {
        summary.push_str("...");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_event(content: &str, tags: Vec<Tag>) -> Event {
        let keys = Keys::generate();
        EventBuilder::new(Kind::TextNote, content)
            .tags(tags)
            .sign_with_keys(&keys)
            .unwrap()
    }

    #[test]
    fn test_title_split() {
        let event = post_event("My Title\n\nBody text", Vec::new());
        let fragment = parse_post_event(&event);
        assert_eq!(fragment.title, "My Title");
        assert_eq!(fragment.content, "Body text");
    }

    #[test]
    fn test_title_split_reassembles_original() {
        let originals = [
            "Title\n\nbody",
            "Two\nline title\n\nbody\n\nwith more breaks",
            "a\n\n",
        ];
        for original in originals {
            let event = post_event(original, Vec::new());
            let fragment = parse_post_event(&event);
            assert_ne!(fragment.title, NO_TITLE);
            let reassembled = format!("{}\n\n{}", fragment.title, fragment.content);
            assert_eq!(reassembled, original);
        }
    }

    #[test]
    fn test_no_title_keeps_full_content() {
        let event = post_event("just a note with no break", Vec::new());
        let fragment = parse_post_event(&event);
        assert_eq!(fragment.title, NO_TITLE);
        assert_eq!(fragment.content, "just a note with no break");
    }

    #[test]
    fn test_parser_is_total() {
        let long = "x".repeat(12_000);
        for content in ["", "   ", "\n\n", "\n\n\n\n", long.as_str()] {
            let event = post_event(content, Vec::new());
            let _ = parse_post_event(&event);
        }
    }

    #[test]
    fn test_summary_truncation() {
        let body = "b".repeat(200);
        let event = post_event(&format!("T\n\n{}", body), Vec::new());
        let fragment = parse_post_event(&event);
        assert_eq!(fragment.summary.len(), 153);
        assert!(fragment.summary.ends_with("..."));

        let short = post_event("T\n\nshort body", Vec::new());
        assert_eq!(parse_post_event(&short).summary, "short body");
    }

    #[test]
    fn test_tags_keep_order_and_duplicates() {
        let tags = vec![
            Tag::hashtag("rust"),
            Tag::hashtag("nostr"),
            Tag::hashtag("rust"),
        ];
        let event = post_event("T\n\nbody", tags);
        let fragment = parse_post_event(&event);
        assert_eq!(fragment.tags, vec!["rust", "nostr", "rust"]);
    }

    #[test]
    fn test_image_sniffed_from_full_content() {
        let event = post_event("Pic\n\nhttps://example.com/cat.jpg", Vec::new());
        let fragment = parse_post_event(&event);
        assert_eq!(fragment.image, Some("https://example.com/cat.jpg".to_string()));
    }
}
