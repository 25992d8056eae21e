//! In-memory post pool shared by every feed of every cached subreddit.
//!
//! Posts are keyed by id and never removed. Each (subreddit, feed) pair only
//! references post ids, so a post that drops out of one listing keeps its title
//! available to any other feed that still lists it.

use crate::error::DatabaseError;
use crate::types::{Feed, FeedKey, FeedState, FetchedPost, Post};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostStore {
    posts: HashMap<String, Post>,
    feed_states: HashMap<FeedKey, FeedState>,
}

/// What a single `upsert_feed_result` call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertSummary {
    pub fetched: usize,
    pub new_posts: usize,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted parts, rejecting anything that could not
    /// have been produced by `upsert_feed_result`.
    pub fn from_parts(
        posts: impl IntoIterator<Item = Post>,
        feed_states: impl IntoIterator<Item = (FeedKey, FeedState)>,
    ) -> Result<Self, DatabaseError> {
        let mut store = Self::new();

        for post in posts {
            if post.id.is_empty() {
                return Err(DatabaseError::CorruptDatabase {
                    details: "post with empty id".to_string(),
                });
            }
            if store.posts.contains_key(&post.id) {
                return Err(DatabaseError::CorruptDatabase {
                    details: format!("duplicate post id '{}'", post.id),
                });
            }
            store.posts.insert(post.id.clone(), post);
        }

        for (key, state) in feed_states {
            let mut seen = HashSet::with_capacity(state.post_ids.len());
            for id in &state.post_ids {
                if !store.posts.contains_key(id) {
                    return Err(DatabaseError::CorruptDatabase {
                        details: format!(
                            "feed {}/{} references unknown post '{}'",
                            key.subreddit, key.feed, id
                        ),
                    });
                }
                if !seen.insert(id.as_str()) {
                    return Err(DatabaseError::CorruptDatabase {
                        details: format!(
                            "feed {}/{} lists post '{}' twice",
                            key.subreddit, key.feed, id
                        ),
                    });
                }
            }
            store.feed_states.insert(key, state);
        }

        Ok(store)
    }

    /// Merge one successful fetch of `feed` into the store.
    ///
    /// Unseen ids become new posts; known ids only gain `feed` in their
    /// `feeds_seen_in` and keep their original title. The feed's membership is
    /// replaced by this fetch and its refresh time moves to `now` (never backwards).
    pub fn upsert_feed_result(
        &mut self,
        subreddit: &str,
        feed: Feed,
        fetched: Vec<FetchedPost>,
        now: DateTime<Utc>,
    ) -> UpsertSummary {
        let key = FeedKey::new(subreddit, feed);
        let mut summary = UpsertSummary {
            fetched: fetched.len(),
            new_posts: 0,
        };

        let mut post_ids = Vec::with_capacity(fetched.len());
        let mut seen = HashSet::with_capacity(fetched.len());

        for FetchedPost { id, title } in fetched {
            if !seen.insert(id.clone()) {
                continue;
            }

            match self.posts.get_mut(&id) {
                Some(existing) => {
                    if existing.title != title {
                        debug!("Keeping first-seen title for edited post {}", id);
                    }
                    existing.feeds_seen_in.insert(feed);
                }
                None => {
                    summary.new_posts += 1;
                    self.posts.insert(
                        id.clone(),
                        Post {
                            id: id.clone(),
                            title,
                            feeds_seen_in: BTreeSet::from([feed]),
                        },
                    );
                }
            }
            post_ids.push(id);
        }

        let last_refreshed_at = match self.feed_states.get(&key) {
            Some(previous) if previous.last_refreshed_at > now => previous.last_refreshed_at,
            _ => now,
        };

        self.feed_states.insert(
            key,
            FeedState {
                post_ids,
                last_refreshed_at,
            },
        );

        summary
    }

    /// Titles of every post currently listed by any of `feeds`, each post once.
    ///
    /// Order is feed order, then listing order within a feed.
    pub fn titles_for(&self, subreddit: &str, feeds: &[Feed]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut titles = Vec::new();

        for feed in feeds {
            let Some(state) = self.feed_states.get(&FeedKey::new(subreddit, *feed)) else {
                continue;
            };
            for id in &state.post_ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                if let Some(post) = self.posts.get(id) {
                    titles.push(post.title.clone());
                }
            }
        }

        titles
    }

    /// True when the feed was never fetched or its last fetch is at least `ttl` old.
    pub fn is_stale(&self, subreddit: &str, feed: Feed, ttl: Duration, now: DateTime<Utc>) -> bool {
        let Some(state) = self.feed_states.get(&FeedKey::new(subreddit, feed)) else {
            return true;
        };

        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(state.last_refreshed_at) >= ttl,
            // A TTL beyond chrono's range never expires.
            Err(_) => false,
        }
    }

    pub fn post(&self, id: &str) -> Option<&Post> {
        self.posts.get(id)
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }

    pub fn feed_state(&self, subreddit: &str, feed: Feed) -> Option<&FeedState> {
        self.feed_states.get(&FeedKey::new(subreddit, feed))
    }

    pub fn feed_states(&self) -> impl Iterator<Item = (&FeedKey, &FeedState)> {
        self.feed_states.iter()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}
