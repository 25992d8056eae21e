pub mod api;
pub mod auth;
pub mod rate_limiter;
pub mod retry;

#[cfg(test)]
mod tests;

pub use api::{ListingQuery, RedditApiClient, RedditListing, RedditPostData, MAX_PAGE_SIZE};
pub use auth::{AppOnlyAuth, RedditOAuth2Config, RedditToken};
pub use retry::{RetryConfig, RetryExecutor};

use async_trait::async_trait;
use seddit_core::{
    CacheSettings, CoreError, Feed, FeedSource, FetchedPost, RedditApiError, RedditSettings,
    MAX_FEED_LIMIT,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Reddit listings as a [`FeedSource`].
pub struct RedditClient {
    auth: AppOnlyAuth,
    api: RedditApiClient,
    retry: RetryExecutor,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        Ok(Self {
            auth: AppOnlyAuth::new(&config)?,
            api: RedditApiClient::new(config.user_agent.clone(), config.request_timeout)?,
            retry: RetryExecutor::new(RetryConfig::reddit()),
        })
    }

    /// Build a client from the run configuration. Fails with a missing-field
    /// error when credentials are not configured.
    pub fn from_settings(reddit: &RedditSettings, cache: &CacheSettings) -> Result<Self, CoreError> {
        let (client_id, client_secret) = reddit.credentials()?;
        Self::new(RedditOAuth2Config::new(
            client_id.to_string(),
            client_secret.to_string(),
            reddit.user_agent.clone(),
            cache.request_timeout(),
        ))
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn auth(&self) -> &AppOnlyAuth {
        &self.auth
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    async fn fetch_page(
        &self,
        subreddit: &str,
        query: &ListingQuery<'_>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let operation = format!("r/{}/{} page", subreddit, query.feed);
        self.retry
            .execute(&operation, move || async move {
                let token = self.auth.access_token().await?;
                match self.api.get_listing(&token, subreddit, query).await {
                    Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                        // One fresh token per attempt before giving up.
                        self.auth.invalidate().await;
                        let token = self.auth.access_token().await?;
                        self.api.get_listing(&token, subreddit, query).await
                    }
                    other => other,
                }
            })
            .await
    }
}

#[async_trait]
impl FeedSource for RedditClient {
    async fn fetch(
        &self,
        subreddit: &str,
        feed: Feed,
        limit: u32,
    ) -> Result<Vec<FetchedPost>, CoreError> {
        let limit = limit.clamp(1, MAX_FEED_LIMIT) as usize;
        let mut posts = Vec::with_capacity(limit);
        let mut seen = HashSet::new();
        let mut after: Option<String> = None;

        while posts.len() < limit {
            let query = ListingQuery {
                feed,
                limit: (limit - posts.len()).min(MAX_PAGE_SIZE as usize) as u32,
                after: after.as_deref(),
            };
            let listing = self.fetch_page(subreddit, &query).await?;
            let page_len = listing.data.children.len();

            for child in listing.data.children {
                if seen.insert(child.data.id.clone()) {
                    posts.push(FetchedPost::from(child.data));
                }
            }
            debug!(
                "r/{}/{}: page of {} posts, {} collected",
                subreddit,
                feed,
                page_len,
                posts.len()
            );

            match listing.data.after {
                Some(next) if page_len > 0 => after = Some(next),
                _ => break,
            }
        }

        posts.truncate(limit);
        info!("Fetched {} posts from r/{}/{}", posts.len(), subreddit, feed);
        Ok(posts)
    }
}
