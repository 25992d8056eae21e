use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A named Reddit listing for a subreddit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Hot,
    New,
    Top,
    Rising,
}

impl Feed {
    pub const ALL: [Feed; 4] = [Feed::Hot, Feed::New, Feed::Top, Feed::Rising];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Hot => "hot",
            Feed::New => "new",
            Feed::Top => "top",
            Feed::Rising => "rising",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feed {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(Feed::Hot),
            "new" => Ok(Feed::New),
            "top" => Ok(Feed::Top),
            "rising" => Ok(Feed::Rising),
            other => Err(ConfigError::InvalidValue {
                field: "feed".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// One post as returned by a feed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPost {
    pub id: String,
    pub title: String,
}

impl FetchedPost {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// A cached post. The title is the first one ever seen for this id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub feeds_seen_in: BTreeSet<Feed>,
}

/// Composite key of a feed's bookkeeping. Subreddit names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedKey {
    pub subreddit: String,
    pub feed: Feed,
}

impl FeedKey {
    pub fn new(subreddit: &str, feed: Feed) -> Self {
        Self {
            subreddit: normalize_subreddit(subreddit),
            feed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    /// Ids from the latest successful fetch, in listing order, without repeats.
    pub post_ids: Vec<String>,
    pub last_refreshed_at: DateTime<Utc>,
}

pub fn normalize_subreddit(subreddit: &str) -> String {
    subreddit
        .trim()
        .trim_start_matches("/r/")
        .trim_start_matches("r/")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_parsing() {
        assert_eq!("hot".parse::<Feed>().unwrap(), Feed::Hot);
        assert_eq!(" TOP ".parse::<Feed>().unwrap(), Feed::Top);
        assert!("best".parse::<Feed>().is_err());
        assert_eq!(Feed::Rising.to_string(), "rising");
    }

    #[test]
    fn test_subreddit_normalization() {
        assert_eq!(normalize_subreddit("KerbalSpaceProgram"), "kerbalspaceprogram");
        assert_eq!(normalize_subreddit("r/Rust"), "rust");
        assert_eq!(normalize_subreddit("/r/Rust"), "rust");
        assert_eq!(FeedKey::new("AskReddit", Feed::New).subreddit, "askreddit");
    }
}
