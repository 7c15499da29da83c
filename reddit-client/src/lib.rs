pub mod api;
pub mod auth;
pub mod rate_limiter;
pub mod stream;

#[cfg(test)]
mod tests;

pub use api::RedditApiClient;
pub use auth::{RedditAuthenticator, RedditToken};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use stream::{CommentPoller, SeenSet};

use async_trait::async_trait;
use futures::stream::BoxStream;
use mcbc_core::{BotSettings, Comment, CoreError, RedditCredentials, RedditHandle};
use std::time::Duration;
use tracing::info;

/// Authenticated handle to Reddit scoped to the configured subreddits.
#[derive(Debug)]
pub struct RedditClient {
    api: RedditApiClient,
    subreddits: Vec<String>,
    poll_interval: Duration,
}

impl RedditClient {
    pub fn new(settings: &BotSettings, credentials: RedditCredentials) -> Result<Self, CoreError> {
        let user_agent = settings.reddit.user_agent.clone();
        let http_client = RedditApiClient::build_http_client(&user_agent)?;
        let authenticator = RedditAuthenticator::new(credentials, http_client.clone())?;
        let rate_config = RateLimitConfig::per_minute(settings.reddit.requests_per_minute);

        let subreddits: Vec<String> = settings
            .reddit
            .subreddits
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        info!("Reddit client ready for r/{}", subreddits.join("+"));
        Ok(Self {
            api: RedditApiClient::new(http_client, authenticator, rate_config, user_agent),
            subreddits,
            poll_interval: settings.pipeline.poll_interval(),
        })
    }

    pub fn subreddits(&self) -> &[String] {
        &self.subreddits
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }
}

#[async_trait]
impl RedditHandle for RedditClient {
    fn stream_comments(&self, skip_existing: bool) -> BoxStream<'_, Result<Comment, CoreError>> {
        CommentPoller::new(skip_existing, self.poll_interval)
            .into_stream(&self.api, &self.subreddits)
    }

    async fn fetch_item(&self, fullname: &str) -> Result<Comment, CoreError> {
        self.api.get_info(fullname).await
    }

    async fn reply(&self, comment: &Comment, text: &str) -> Result<(), CoreError> {
        self.api.submit_comment(&comment.fullname, text).await
    }
}
