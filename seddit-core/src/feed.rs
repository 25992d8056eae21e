use crate::error::CoreError;
use crate::types::{Feed, FetchedPost};
use async_trait::async_trait;

/// Largest number of posts a single listing query can return.
pub const MAX_FEED_LIMIT: u32 = 1000;

/// Anything that can produce the current contents of a subreddit feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch up to `limit` posts from `feed` of `subreddit`, in listing order.
    async fn fetch(
        &self,
        subreddit: &str,
        feed: Feed,
        limit: u32,
    ) -> Result<Vec<FetchedPost>, CoreError>;
}
