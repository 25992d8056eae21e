#[cfg(test)]
mod tests {
    use crate::{AppOnlyAuth, RedditClient, RedditOAuth2Config, RedditToken};
    use seddit_core::{CacheSettings, ConfigError, CoreError, RedditSettings};
    use std::time::{Duration, SystemTime};

    fn create_test_config() -> RedditOAuth2Config {
        RedditOAuth2Config::new(
            "test_client_id".to_string(),
            "test_client_secret".to_string(),
            "seddit/1.0 by test_user".to_string(),
            Duration::from_secs(5),
        )
    }

    fn token(access_token: &str, expires_at: SystemTime) -> RedditToken {
        RedditToken {
            access_token: access_token.to_string(),
            expires_at,
            scope: vec!["read".to_string()],
        }
    }

    #[test]
    fn test_config_creation() {
        let config = create_test_config();
        assert_eq!(config.client_id, "test_client_id");
        assert_eq!(config.client_secret, "test_client_secret");
        assert_eq!(config.user_agent, "seddit/1.0 by test_user");
    }

    #[test]
    fn test_client_creation() {
        let client = RedditClient::new(create_test_config()).unwrap();
        assert_eq!(client.api().user_agent(), "seddit/1.0 by test_user");
        assert!(tokio_test::block_on(client.auth().cached_token()).is_none());
    }

    #[test]
    fn test_from_settings_requires_credentials() {
        let reddit = RedditSettings {
            client_id: Some("id".to_string()),
            client_secret: None,
            ..Default::default()
        };

        match RedditClient::from_settings(&reddit, &CacheSettings::default()) {
            Err(CoreError::Config(ConfigError::MissingField { field })) => {
                assert_eq!(field, "reddit.client_secret");
            }
            Err(other) => panic!("Expected MissingField, got {:?}", other),
            Ok(_) => panic!("Expected MissingField, got a client"),
        }
    }

    #[test]
    fn test_token_expiry() {
        let now = SystemTime::now();

        let valid = token("valid", now + Duration::from_secs(3600));
        assert!(!valid.is_expired());
        assert!(!valid.needs_refresh());

        let almost = token("almost", now + Duration::from_secs(30));
        assert!(!almost.is_expired());
        assert!(almost.needs_refresh());

        let expired = token("expired", now - Duration::from_secs(3600));
        assert!(expired.is_expired());
        assert!(expired.needs_refresh());
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let auth = AppOnlyAuth::new(&create_test_config()).unwrap();
        auth.set_token(token("cached", SystemTime::now() + Duration::from_secs(3600)))
            .await;

        // A fresh cached token never touches the network.
        assert_eq!(auth.access_token().await.unwrap(), "cached");

        auth.invalidate().await;
        assert!(auth.cached_token().await.is_none());
    }

    #[test]
    fn test_token_serialization() {
        let original = token(
            "test_access_token",
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_640_995_200),
        );

        let serialized = serde_json::to_string(&original).unwrap();
        assert!(serialized.contains("test_access_token"));

        let deserialized: RedditToken = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, original);
    }
}
