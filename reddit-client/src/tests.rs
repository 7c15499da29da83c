#[cfg(test)]
mod tests {
    use crate::{RateLimitConfig, RedditClient};
    use mcbc_core::{BotSettings, RedditCredentials};
    use std::time::Duration;

    fn create_test_credentials() -> RedditCredentials {
        RedditCredentials {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            username: "mc_bc_bot".to_string(),
            password: "test_password".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        let settings = BotSettings::default();
        let client = RedditClient::new(&settings, create_test_credentials());
        assert!(client.is_ok());

        let client = client.unwrap();
        assert_eq!(client.subreddits(), &["EmergingCricket".to_string()]);
    }

    #[test]
    fn test_blank_subreddits_are_dropped() {
        let mut settings = BotSettings::default();
        settings.reddit.subreddits = vec![
            " Cricket ".to_string(),
            "".to_string(),
            "EmergingCricket".to_string(),
        ];

        let client = RedditClient::new(&settings, create_test_credentials()).unwrap();
        assert_eq!(
            client.subreddits(),
            &["Cricket".to_string(), "EmergingCricket".to_string()]
        );
    }

    #[tokio::test]
    async fn test_request_quota_follows_settings() {
        let mut settings = BotSettings::default();
        settings.reddit.requests_per_minute = 30;

        let client = RedditClient::new(&settings, create_test_credentials()).unwrap();
        let expected = RateLimitConfig::per_minute(30);
        assert_eq!(expected.time_window, Duration::from_secs(60));
        assert_eq!(
            client.api().available_request_tokens().await,
            expected.burst_allowance
        );
    }
}
