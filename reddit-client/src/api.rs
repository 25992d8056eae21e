use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response, StatusCode};
use seddit_core::{CoreError, Feed, FetchedPost, RedditApiError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use url::Url;

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Largest `limit` a single listing request accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

/// The fields of a link listing entry that the cache keeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub created_utc: f64,
}

impl From<RedditPostData> for FetchedPost {
    fn from(post_data: RedditPostData) -> Self {
        FetchedPost::new(post_data.id, post_data.title)
    }
}

/// Query parameters for one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery<'a> {
    pub feed: Feed,
    pub limit: u32,
    pub after: Option<&'a str>,
}

impl ListingQuery<'_> {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("raw_json", "1".to_string()),
        ];
        if self.feed == Feed::Top {
            params.push(("t", "all".to_string()));
        }
        if let Some(after) = self.after {
            params.push(("after", after.to_string()));
        }
        params
    }
}

pub fn listing_url(subreddit: &str, feed: Feed) -> Result<Url, CoreError> {
    let mut url = Url::parse(REDDIT_API_BASE).map_err(|e| CoreError::Internal {
        message: format!("Invalid API base URL: {}", e),
    })?;
    url.path_segments_mut()
        .map_err(|_| CoreError::Internal {
            message: "API base URL cannot carry a path".to_string(),
        })?
        .pop_if_empty()
        .extend(["r", subreddit, feed.as_str()]);
    Ok(url)
}

/// Translate a non-success status into the matching API error. `subreddit`
/// names the resource for 403/404 responses.
pub fn error_for_status(
    status: StatusCode,
    headers: &HeaderMap,
    subreddit: &str,
) -> Option<RedditApiError> {
    if status.is_success() {
        return None;
    }

    Some(match status.as_u16() {
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: format!("r/{}", subreddit),
        },
        404 => RedditApiError::SubredditNotFound {
            subreddit: subreddit.to_string(),
        },
        429 => RedditApiError::RateLimitExceeded {
            retry_after: header_number(headers, "retry-after")
                .map(|secs| secs.ceil() as u64)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
        code => RedditApiError::InvalidResponse {
            details: format!("Unexpected status {}", code),
        },
    })
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth())),
            user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn make_request(
        &self,
        method: Method,
        url: Url,
        access_token: &str,
        query_params: &[(&str, String)],
        subreddit: &str,
    ) -> Result<Response, CoreError> {
        let start_time = Instant::now();

        let permit = self.rate_limiter.acquire_permit().await;
        if permit.queue_wait_time > Duration::from_millis(100) {
            debug!("Waited {:?} for a rate limit permit", permit.queue_wait_time);
        }

        debug!("Making Reddit API request: {} {}", method, url.path());
        let response = self
            .http_client
            .request(method.clone(), url.clone())
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .map_err(|e| {
                error!("Network error for {} {}: {}", method, url.path(), e);
                if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        if let (Some(remaining), Some(reset)) = (
            header_number(response.headers(), "x-ratelimit-remaining"),
            header_number(response.headers(), "x-ratelimit-reset"),
        ) {
            self.rate_limiter
                .observe_server_budget(remaining, Duration::from_secs_f64(reset.max(0.0)))
                .await;
        }

        if let Some(api_error) = error_for_status(response.status(), response.headers(), subreddit)
        {
            warn!(
                "Request failed with status {} for {}",
                response.status(),
                url.path()
            );
            return Err(CoreError::RedditApi(api_error));
        }

        debug!(
            "Request successful: {} {} in {:?}",
            response.status(),
            url.path(),
            start_time.elapsed()
        );
        Ok(response)
    }

    /// Fetch one page of a subreddit feed.
    pub async fn get_listing(
        &self,
        access_token: &str,
        subreddit: &str,
        query: &ListingQuery<'_>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let url = listing_url(subreddit, query.feed)?;
        let response = self
            .make_request(Method::GET, url, access_token, &query.params(), subreddit)
            .await?;

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::RedditApi(RedditApiError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })?;

        parse_listing(&body).map_err(|details| {
            error!("Failed to parse r/{}/{} listing: {}", subreddit, query.feed, details);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse r/{}/{} listing", subreddit, query.feed),
            })
        })
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

pub fn parse_listing(body: &str) -> Result<RedditListing<RedditPostData>, String> {
    let listing: RedditListing<RedditPostData> =
        serde_json::from_str(body).map_err(|e| e.to_string())?;
    if listing.kind != "Listing" {
        return Err(format!("expected a Listing, got '{}'", listing.kind));
    }
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[tokio::test]
    async fn test_api_client_creation() {
        let client =
            RedditApiClient::new("test-user-agent/1.0".to_string(), Duration::from_secs(5)).unwrap();
        assert_eq!(client.user_agent(), "test-user-agent/1.0");

        let status = client.get_rate_limit_status().await;
        assert!(status.available_tokens > 0);
    }

    #[test]
    fn test_listing_url() {
        let url = listing_url("KerbalSpaceProgram", Feed::Rising).unwrap();
        assert_eq!(
            url.as_str(),
            "https://oauth.reddit.com/r/KerbalSpaceProgram/rising"
        );
    }

    #[test]
    fn test_listing_query_params() {
        let query = ListingQuery {
            feed: Feed::Top,
            limit: 250,
            after: Some("t3_abc"),
        };
        let params = query.params();
        assert!(params.contains(&("limit", "100".to_string())));
        assert!(params.contains(&("t", "all".to_string())));
        assert!(params.contains(&("after", "t3_abc".to_string())));

        let hot = ListingQuery {
            feed: Feed::Hot,
            limit: 25,
            after: None,
        };
        assert!(!hot.params().iter().any(|(k, _)| *k == "t" || *k == "after"));
    }

    #[test]
    fn test_status_mapping() {
        let headers = HeaderMap::new();
        assert!(error_for_status(StatusCode::OK, &headers, "ksp").is_none());
        assert_eq!(
            error_for_status(StatusCode::UNAUTHORIZED, &headers, "ksp"),
            Some(RedditApiError::InvalidToken)
        );
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, &headers, "ksp"),
            Some(RedditApiError::SubredditNotFound { subreddit }) if subreddit == "ksp"
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, &headers, "ksp"),
            Some(RedditApiError::ServerError { status_code: 502 })
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, &headers, "ksp"),
            Some(RedditApiError::RateLimitExceeded { retry_after: 60 })
        ));

        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("12"));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, &headers, "ksp"),
            Some(RedditApiError::RateLimitExceeded { retry_after: 12 })
        ));
    }

    #[test]
    fn test_parse_listing() {
        let body = r#"{
            "kind": "Listing",
            "data": {
                "after": "t3_b",
                "before": null,
                "dist": 2,
                "children": [
                    {"kind": "t3", "data": {"id": "a", "title": "Landed on the Mun", "subreddit": "KerbalSpaceProgram", "stickied": true, "created_utc": 1700000000.0, "score": 12}},
                    {"kind": "t3", "data": {"id": "b", "title": "Jool & friends"}}
                ]
            }
        }"#;

        let listing = parse_listing(body).unwrap();
        assert_eq!(listing.data.after.as_deref(), Some("t3_b"));

        let posts: Vec<FetchedPost> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect();
        assert_eq!(posts[0], FetchedPost::new("a", "Landed on the Mun"));
        assert_eq!(posts[1].title, "Jool & friends");
    }

    #[test]
    fn test_parse_listing_rejects_other_shapes() {
        assert!(parse_listing(r#"{"kind": "t5", "data": {"children": []}}"#).is_err());
        assert!(parse_listing("<html>busy</html>").is_err());
    }
}
