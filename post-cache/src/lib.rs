//! Keeps a subreddit's cached feeds fresh and hands out its working set of titles.

use chrono::{DateTime, Utc};
use seddit_core::{
    normalize_subreddit, CacheSettings, CoreError, ErrorExt, Feed, FeedSource, PostStore,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled_feeds: Vec<Feed>,
    pub ttls: BTreeMap<Feed, Duration>,
    /// Posts requested from the source per refresh.
    pub feed_limit: u32,
    /// Refresh every enabled feed regardless of its age.
    pub force_refresh: bool,
}

impl CacheConfig {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let mut enabled_feeds = Vec::with_capacity(settings.enabled_feeds.len());
        for feed in &settings.enabled_feeds {
            if !enabled_feeds.contains(feed) {
                enabled_feeds.push(*feed);
            }
        }

        Self {
            enabled_feeds,
            ttls: Feed::ALL
                .iter()
                .map(|feed| (*feed, settings.ttl_for(*feed)))
                .collect(),
            feed_limit: settings.effective_feed_limit(),
            force_refresh: false,
        }
    }

    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn with_feed_limit(mut self, limit: u32) -> Self {
        self.feed_limit = limit;
        self
    }

    pub fn ttl_for(&self, feed: Feed) -> Duration {
        self.ttls.get(&feed).copied().unwrap_or(Duration::ZERO)
    }
}

/// A feed whose refresh failed this run. Its cached state was left untouched.
#[derive(Debug)]
pub struct FeedFailure {
    pub feed: Feed,
    pub error: CoreError,
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: Vec<Feed>,
    pub fresh: Vec<Feed>,
    pub failed: Vec<FeedFailure>,
    pub new_posts: usize,
}

/// The titles visible to analysis for one subreddit, plus what happened
/// while bringing them up to date.
#[derive(Debug)]
pub struct WorkingSet {
    pub subreddit: String,
    pub titles: Vec<String>,
    pub report: RefreshReport,
}

pub struct CacheManager {
    store: PostStore,
    config: CacheConfig,
}

impl CacheManager {
    pub fn new(store: PostStore, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &PostStore {
        &self.store
    }

    pub fn into_store(self) -> PostStore {
        self.store
    }

    /// Enabled feeds that a refresh at `now` would fetch.
    pub fn stale_feeds(&self, subreddit: &str, now: DateTime<Utc>) -> Vec<Feed> {
        let subreddit = normalize_subreddit(subreddit);
        self.config
            .enabled_feeds
            .iter()
            .copied()
            .filter(|feed| {
                self.config.force_refresh
                    || self
                        .store
                        .is_stale(&subreddit, *feed, self.config.ttl_for(*feed), now)
            })
            .collect()
    }

    pub async fn refresh<S>(&mut self, source: &S, subreddit: &str) -> RefreshReport
    where
        S: FeedSource + ?Sized,
    {
        self.refresh_at(source, subreddit, Utc::now()).await
    }

    /// Fetch every stale enabled feed, one at a time, and merge the results.
    /// A failed fetch is recorded and logged; the feed keeps its cached state.
    pub async fn refresh_at<S>(
        &mut self,
        source: &S,
        subreddit: &str,
        now: DateTime<Utc>,
    ) -> RefreshReport
    where
        S: FeedSource + ?Sized,
    {
        let subreddit = normalize_subreddit(subreddit);
        let stale = self.stale_feeds(&subreddit, now);
        let mut report = RefreshReport::default();

        for feed in self.config.enabled_feeds.clone() {
            if !stale.contains(&feed) {
                debug!("r/{}/{} is fresh, using cache", subreddit, feed);
                report.fresh.push(feed);
                continue;
            }

            info!("Refreshing r/{}/{}", subreddit, feed);
            match source.fetch(&subreddit, feed, self.config.feed_limit).await {
                Ok(posts) => {
                    let summary = self.store.upsert_feed_result(&subreddit, feed, posts, now);
                    info!(
                        "r/{}/{}: {} posts fetched, {} new",
                        subreddit, feed, summary.fetched, summary.new_posts
                    );
                    report.new_posts += summary.new_posts;
                    report.refreshed.push(feed);
                }
                Err(error) => {
                    warn!(
                        "r/{}/{}: refresh failed, keeping cached data: {}",
                        subreddit,
                        feed,
                        error.user_friendly_message()
                    );
                    debug!("r/{}/{} fetch error: {:?}", subreddit, feed, error);
                    report.failed.push(FeedFailure { feed, error });
                }
            }
        }

        report
    }

    /// Deduplicated titles of every enabled feed, as currently cached.
    pub fn titles(&self, subreddit: &str) -> Vec<String> {
        self.store
            .titles_for(&normalize_subreddit(subreddit), &self.config.enabled_feeds)
    }

    /// Refresh stale feeds, then return the subreddit's working set.
    pub async fn get_working_set<S>(&mut self, source: &S, subreddit: &str) -> WorkingSet
    where
        S: FeedSource + ?Sized,
    {
        let report = self.refresh(source, subreddit).await;
        self.working_set_with(subreddit, report)
    }

    /// Working set from the cache alone, without contacting any source.
    /// Enabled feeds that are still within their TTL are reported as fresh.
    pub fn cached_working_set(&self, subreddit: &str) -> WorkingSet {
        let stale = self.stale_feeds(subreddit, Utc::now());
        let report = RefreshReport {
            fresh: self
                .config
                .enabled_feeds
                .iter()
                .copied()
                .filter(|feed| !stale.contains(feed))
                .collect(),
            ..RefreshReport::default()
        };
        self.working_set_with(subreddit, report)
    }

    fn working_set_with(&self, subreddit: &str, report: RefreshReport) -> WorkingSet {
        let subreddit = normalize_subreddit(subreddit);
        let titles = self.titles(&subreddit);
        debug!("r/{}: working set of {} titles", subreddit, titles.len());
        WorkingSet {
            subreddit,
            titles,
            report,
        }
    }
}
