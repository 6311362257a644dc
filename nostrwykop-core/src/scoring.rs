//! Vote tallies and feed ranking.
//!
//! Pure functions over already-fetched data; no relay access here.

use nostr_sdk::prelude::*;

use crate::post::Post;

/// Feed sort strategy. Unrecognized strategy names fall back to `Newest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Newest,
    Hot,
    Active,
}

impl From<&str> for SortBy {
    fn from(value: &str) -> Self {
        match value {
            "hot" => SortBy::Hot,
            "active" => SortBy::Active,
            "newest" => SortBy::Newest,
            _ => SortBy::Newest,
        }
    }
}

/// Net vote tally over a set of reaction events.
///
/// Content exactly "+" counts up, exactly "-" counts down, anything else is
/// ignored entirely. Repeated reactions from one pubkey each count: per-voter
/// deduplication is deliberately not applied, matching what other clients
/// derive from the same events.
pub fn tally_reactions(reactions: &[Event]) -> i64 {
    let mut tally = 0i64;
    for event in reactions {
        match event.content.as_str() {
            "+" => tally += 1,
            "-" => tally -= 1,
            _ => {}
        }
    }
    tally
}

/// Decaying popularity score: `(votes + comments) / age_in_hours`, with the
/// denominator floored at one hour so brand-new posts are not divided up.
pub fn hot_score(post: &Post, now_ms: u64) -> f64 {
    let age_hours = now_ms.saturating_sub(post.created_at) as f64 / 3_600_000.0;
    (post.votes + post.comments_count as i64) as f64 / age_hours.max(1.0)
}

/// Order a freshly assembled feed according to the requested strategy.
pub fn sort_posts(posts: &mut [Post], sort: SortBy, now_ms: u64) {
    match sort {
        SortBy::Hot => {
            posts.sort_by(|a, b| {
                hot_score(b, now_ms)
                    .total_cmp(&hot_score(a, now_ms))
            });
        }
        SortBy::Active => posts.sort_by(|a, b| b.comments_count.cmp(&a.comments_count)),
        SortBy::Newest => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}
