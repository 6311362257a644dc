//! Post and comment aggregation.
//!
//! Assembles fully-populated domain objects from flat relay streams: every
//! post re-derives its author profile, vote tally and comment count through
//! independent sub-queries, and comment trees are rebuilt from "e"-tag
//! references on every read.

use std::collections::{HashMap, HashSet};

use futures_util::future::{try_join, try_join3, try_join_all};
use nostr_sdk::prelude::*;

use crate::client::NostrWykop;
use crate::error::{Error, Result};
use crate::post::{parse_post_event, Comment, Post};
use crate::scoring::{sort_posts, tally_reactions, SortBy};
use crate::util::{now_ms, parse_pubkey};

/// Feed query options. Timestamps are milliseconds, converted to the
/// protocol's second-precision epoch when building filters.
#[derive(Clone, Debug, Default)]
pub struct FeedOptions {
    pub limit: Option<usize>,
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub tags: Vec<String>,
    pub sort: SortBy,
}

/// Which field a search query hit first, checked title, then content,
/// then tags.
#[derive(serde::Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchReason {
    Title,
    Content,
    Tags,
}

#[derive(serde::Serialize, Clone, Debug)]
pub struct SearchHit {
    pub post: Post,
    pub matched: MatchReason,
}

impl NostrWykop {
    /// Fetch the main feed: kind 1 and 30023 events, each resolved into a
    /// full [`Post`], ordered by the requested sort strategy.
    pub async fn get_posts(&self, options: &FeedOptions) -> Result<Vec<Post>> {
        self.ensure_connected()?;

        let mut filter = Filter::new()
            .kinds([Kind::TextNote, Kind::LongFormTextNote])
            .limit(options.limit.unwrap_or(self.config.post_limit));
        if let Some(since) = options.since {
            filter = filter.since(Timestamp::from_secs(since / 1000));
        }
        if let Some(until) = options.until {
            filter = filter.until(Timestamp::from_secs(until / 1000));
        }
        for tag in &options.tags {
            filter = filter.custom_tag(SingleLetterTag::lowercase(Alphabet::T), tag.as_str());
        }

        let events = self.pool.query(filter).await?;
        let mut posts = try_join_all(events.iter().map(|e| self.build_post(e))).await?;
        sort_posts(&mut posts, options.sort, now_ms());
        Ok(posts)
    }

    /// Single-post lookup. Absence (including an undecodable id) is a
    /// normal outcome, not an error.
    pub async fn get_post_by_id(&self, id: &str) -> Result<Option<Post>> {
        self.ensure_connected()?;
        let event_id = match EventId::from_hex(id) {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };

        let filter = Filter::new()
            .id(event_id)
            .kinds([Kind::TextNote, Kind::LongFormTextNote]);
        let events = self.pool.query(filter).await?;

        match events.first() {
            Some(event) => Ok(Some(self.build_post(event).await?)),
            None => Ok(None),
        }
    }

    /// All posts by one author, newest first. The author profile is
    /// resolved once and shared across the whole page.
    pub async fn get_user_posts(&self, pubkey: &str) -> Result<Vec<Post>> {
        self.ensure_connected()?;
        let pk = match parse_pubkey(pubkey) {
            Some(pk) => pk,
            None => return Ok(Vec::new()),
        };

        let author = self.get_profile(&pk.to_hex()).await?;
        let filter = Filter::new()
            .author(pk)
            .kinds([Kind::TextNote, Kind::LongFormTextNote])
            .limit(self.config.user_post_limit);
        let events = self.pool.query(filter).await?;

        let mut posts = try_join_all(events.iter().map(|event| {
            let author = author.clone();
            async move {
                let fragment = parse_post_event(event);
                let (votes, comments_count) =
                    try_join(self.vote_tally(event.id), self.comment_count(event.id)).await?;
                Ok::<_, Error>(Post {
                    id: event.id.to_hex(),
                    title: fragment.title,
                    content: fragment.content,
                    summary: fragment.summary,
                    created_at: event.created_at.as_u64() * 1000,
                    author,
                    tags: fragment.tags,
                    votes,
                    comments_count,
                    image: fragment.image,
                })
            }
        }))
        .await?;

        sort_posts(&mut posts, SortBy::Newest, now_ms());
        Ok(posts)
    }

    /// Feed restricted to a set of authors. Undecodable keys are skipped;
    /// an empty (or fully undecodable) author set yields an empty feed
    /// without touching the relays.
    pub async fn get_posts_by_authors(
        &self,
        pubkeys: &[String],
        options: &FeedOptions,
    ) -> Result<Vec<Post>> {
        self.ensure_connected()?;
        let authors: Vec<PublicKey> = pubkeys.iter().filter_map(|p| parse_pubkey(p)).collect();
        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::new()
            .authors(authors)
            .kinds([Kind::TextNote, Kind::LongFormTextNote])
            .limit(options.limit.unwrap_or(self.config.post_limit));
        let events = self.pool.query(filter).await?;

        let mut posts = try_join_all(events.iter().map(|e| self.build_post(e))).await?;
        sort_posts(&mut posts, options.sort, now_ms());
        Ok(posts)
    }

    /// The "followed" feed: posts from everyone a user follows.
    pub async fn get_following_feed(
        &self,
        pubkey: &str,
        options: &FeedOptions,
    ) -> Result<Vec<Post>> {
        let following = self.get_following(pubkey).await?;
        if following.is_empty() {
            return Ok(Vec::new());
        }
        self.get_posts_by_authors(&following, options).await
    }

    /// Posts a user has reacted to with the requested polarity, newest
    /// first. Each post appears once even when the user reacted to it
    /// repeatedly.
    pub async fn get_user_voted_posts(&self, pubkey: &str, upvoted: bool) -> Result<Vec<Post>> {
        self.ensure_connected()?;
        let pk = match parse_pubkey(pubkey) {
            Some(pk) => pk,
            None => return Ok(Vec::new()),
        };

        let wanted = if upvoted { "+" } else { "-" };
        let filter = Filter::new()
            .kind(Kind::Reaction)
            .author(pk)
            .limit(self.config.user_post_limit);
        let reactions = self.pool.query(filter).await?;

        let mut seen: HashSet<EventId> = HashSet::new();
        let mut targets: Vec<EventId> = Vec::new();
        for reaction in &reactions {
            if reaction.content != wanted {
                continue;
            }
            for tag in reaction.tags.iter() {
                let values = tag.as_slice();
                if values.len() >= 2 && values[0] == "e" {
                    if let Ok(id) = EventId::from_hex(&values[1]) {
                        if seen.insert(id) {
                            targets.push(id);
                        }
                    }
                }
            }
        }
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::new()
            .ids(targets)
            .kinds([Kind::TextNote, Kind::LongFormTextNote]);
        let events = self.pool.query(filter).await?;

        let mut posts = try_join_all(events.iter().map(|e| self.build_post(e))).await?;
        sort_posts(&mut posts, SortBy::Newest, now_ms());
        Ok(posts)
    }

    /// Saved-post collections have no protocol representation yet, so this
    /// always resolves to an empty page rather than an error.
    pub async fn get_saved_posts(&self, _pubkey: &str) -> Result<Vec<Post>> {
        self.ensure_connected()?;
        Ok(Vec::new())
    }

    /// Rebuild the comment tree under a post.
    ///
    /// Traversal is an explicit breadth-first worklist with a visited-id
    /// set, a depth cap and a node cap, so a crafted event graph with
    /// reference cycles cannot loop or blow the stack.
    pub async fn get_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        self.ensure_connected()?;
        let root = match EventId::from_hex(post_id) {
            Ok(id) => id,
            Err(_) => return Ok(Vec::new()),
        };

        let mut visited: HashSet<EventId> = HashSet::from([root]);
        // (parent id, event), in breadth-first discovery order
        let mut discovered: Vec<(EventId, Event)> = Vec::new();
        let mut frontier = vec![root];
        let mut node_count = 0usize;

        for _depth in 0..self.config.max_comment_depth {
            if frontier.is_empty() || node_count >= self.config.max_comment_nodes {
                break;
            }
            let mut next = Vec::new();
            for parent in frontier {
                let filter = Filter::new()
                    .kind(Kind::TextNote)
                    .event(parent)
                    .limit(self.config.comment_limit);
                for event in self.pool.query(filter).await? {
                    if node_count >= self.config.max_comment_nodes {
                        break;
                    }
                    if !visited.insert(event.id) {
                        // Duplicate reference or cycle
                        continue;
                    }
                    node_count += 1;
                    next.push(event.id);
                    discovered.push((parent, event));
                }
            }
            frontier = next;
        }

        // Resolve every node into a comment shell (author + votes)
        let shells = try_join_all(
            discovered
                .iter()
                .map(|(_, event)| self.build_comment(event)),
        )
        .await?;
        let mut built: HashMap<EventId, Comment> = discovered
            .iter()
            .map(|(_, event)| event.id)
            .zip(shells)
            .collect();

        // Attach children to parents. Reverse discovery order guarantees a
        // node's subtree is complete before the node itself is attached.
        let mut top_level = Vec::new();
        for (parent, event) in discovered.iter().rev() {
            let comment = match built.remove(&event.id) {
                Some(c) => c,
                None => continue,
            };
            if *parent == root {
                top_level.push(comment);
            } else if let Some(parent_comment) = built.get_mut(parent) {
                parent_comment.replies.push(comment);
            }
        }

        sort_comment_tree(&mut top_level);
        Ok(top_level)
    }

    /// Publish a top-level comment on a post and return it optimistically,
    /// without waiting for the relays to serve it back.
    pub async fn add_comment(&self, post_id: &str, content: &str) -> Result<Comment> {
        self.publish_reply(post_id, content, "root").await
    }

    /// Publish a nested reply to an existing comment.
    pub async fn add_reply(&self, comment_id: &str, content: &str) -> Result<Comment> {
        self.publish_reply(comment_id, content, "reply").await
    }

    /// Publish a reaction ("+" or "-") targeting a post.
    pub async fn vote_on_post(&self, post_id: &str, upvote: bool) -> Result<()> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let event_id = EventId::from_hex(post_id)
            .map_err(|_| Error::InvalidId(post_id.to_string()))?;

        let content = if upvote { "+" } else { "-" };
        let event = signer
            .sign(EventBuilder::new(Kind::Reaction, content).tag(Tag::event(event_id)))
            .await?;
        self.pool.publish(&event).await
    }

    /// Comments are voted on exactly like posts.
    pub async fn vote_on_comment(&self, comment_id: &str, upvote: bool) -> Result<()> {
        self.vote_on_post(comment_id, upvote).await
    }

    /// Case-insensitive substring search over an oversampled window of
    /// recent posts. Best-effort by construction: older content outside the
    /// window is invisible to it.
    pub async fn search_posts(&self, query: &str, options: &FeedOptions) -> Result<Vec<SearchHit>> {
        self.ensure_connected()?;

        let filter = Filter::new()
            .kinds([Kind::TextNote, Kind::LongFormTextNote])
            .limit(self.config.search_window);
        let mut events = self.pool.query(filter).await?;
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let needle = query.to_lowercase();
        let mut matched: Vec<(Event, MatchReason)> = Vec::new();
        let limit = options.limit.unwrap_or(self.config.post_limit);
        for event in events {
            if matched.len() >= limit {
                break;
            }
            let fragment = parse_post_event(&event);
            let reason = if fragment.title.to_lowercase().contains(&needle) {
                Some(MatchReason::Title)
            } else if fragment.content.to_lowercase().contains(&needle) {
                Some(MatchReason::Content)
            } else if fragment
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(&needle))
            {
                Some(MatchReason::Tags)
            } else {
                None
            };
            if let Some(reason) = reason {
                matched.push((event, reason));
            }
        }

        try_join_all(matched.iter().map(|(event, reason)| async move {
            Ok::<_, Error>(SearchHit {
                post: self.build_post(event).await?,
                matched: *reason,
            })
        }))
        .await
    }

    /// Assemble a full post: parse the fragment, then resolve author, vote
    /// tally and comment count as independent sub-queries.
    pub(crate) async fn build_post(&self, event: &Event) -> Result<Post> {
        let fragment = parse_post_event(event);
        let (author, votes, comments_count) = try_join3(
            self.get_profile(&event.pubkey.to_hex()),
            self.vote_tally(event.id),
            self.comment_count(event.id),
        )
        .await?;

        Ok(Post {
            id: event.id.to_hex(),
            title: fragment.title,
            content: fragment.content,
            summary: fragment.summary,
            created_at: event.created_at.as_u64() * 1000,
            author,
            tags: fragment.tags,
            votes,
            comments_count,
            image: fragment.image,
        })
    }

    async fn build_comment(&self, event: &Event) -> Result<Comment> {
        let (author, votes) = try_join(
            self.get_profile(&event.pubkey.to_hex()),
            self.vote_tally(event.id),
        )
        .await?;

        Ok(Comment {
            id: event.id.to_hex(),
            content: event.content.clone(),
            created_at: event.created_at.as_u64() * 1000,
            author,
            votes,
            replies: Vec::new(),
        })
    }

    /// Net reaction tally for one target event.
    pub(crate) async fn vote_tally(&self, id: EventId) -> Result<i64> {
        let filter = Filter::new().kind(Kind::Reaction).event(id);
        let reactions = self.pool.query(filter).await?;
        Ok(tally_reactions(&reactions))
    }

    /// Number of direct kind-1 replies referencing one target event.
    pub(crate) async fn comment_count(&self, id: EventId) -> Result<u64> {
        let filter = Filter::new()
            .kind(Kind::TextNote)
            .event(id)
            .limit(self.config.comment_limit);
        let replies = self.pool.query(filter).await?;
        Ok(replies.len() as u64)
    }

    async fn publish_reply(&self, parent_id: &str, content: &str, marker: &str) -> Result<Comment> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let parent = EventId::from_hex(parent_id)
            .map_err(|_| Error::InvalidId(parent_id.to_string()))?;

        let tag = Tag::custom(
            TagKind::e(),
            [parent.to_hex(), String::new(), marker.to_string()],
        );
        let event = signer
            .sign(EventBuilder::new(Kind::TextNote, content).tag(tag))
            .await?;
        self.pool.publish(&event).await?;

        // Optimistic object: our own write, zero votes, no replies yet
        let author = self.get_profile(&event.pubkey.to_hex()).await?;
        Ok(Comment {
            id: event.id.to_hex(),
            content: content.to_string(),
            created_at: event.created_at.as_u64() * 1000,
            author,
            votes: 0,
            replies: Vec::new(),
        })
    }
}

/// Newest-first ordering at every level of the tree.
fn sort_comment_tree(comments: &mut [Comment]) {
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    for comment in comments {
        sort_comment_tree(&mut comment.replies);
    }
}
