//! Posting replies through Reddit's write cooldown.
//!
//! A rejected reply carries a message like "try again in 3 minutes". The poster
//! sleeps for that long plus a safety buffer and tries again, up to the retry
//! budget; after that the reply is dropped without failing the caller.

use mcbc_core::{Comment, CoreError, ErrorExt, RedditApiError, RedditHandle};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Posted,
    Abandoned,
}

/// Remaining rate-limit retries for a single reply.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    attempts_remaining: u32,
}

impl RetryBudget {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts_remaining: attempts,
        }
    }

    /// Spend one retry. Returns `false` once the budget is used up.
    pub fn consume(&mut self) -> bool {
        if self.attempts_remaining == 0 {
            return false;
        }
        self.attempts_remaining -= 1;
        true
    }

    pub fn remaining(&self) -> u32 {
        self.attempts_remaining
    }
}

/// `minutes * 60 + seconds + buffer`, each part defaulting to zero when absent.
pub fn parse_wait(message: &str, buffer: Duration) -> Duration {
    static MINUTES: OnceLock<Regex> = OnceLock::new();
    static SECONDS: OnceLock<Regex> = OnceLock::new();

    let minutes_re = MINUTES.get_or_init(|| Regex::new(r"(?i)(\d+)\s*minute").unwrap());
    let seconds_re = SECONDS.get_or_init(|| Regex::new(r"(?i)(\d+)\s*second").unwrap());

    let number = |re: &Regex| {
        re.captures(message)
            .and_then(|c| c[1].parse::<u64>().ok())
            .unwrap_or(0)
    };
    let minutes = number(minutes_re);
    let seconds = number(seconds_re);

    Duration::from_secs(minutes.saturating_mul(60).saturating_add(seconds)).saturating_add(buffer)
}

pub struct RateLimitedPoster {
    retries: u32,
    buffer: Duration,
}

impl RateLimitedPoster {
    pub fn new(retries: u32, buffer: Duration) -> Self {
        Self { retries, buffer }
    }

    /// How long to wait before retrying after `error`, or `None` if it is not a rate limit.
    pub fn wait_for(&self, error: &CoreError) -> Option<Duration> {
        if let Some(message) = error.rate_limit_message() {
            return Some(parse_wait(message, self.buffer));
        }
        match error {
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after }) => {
                Some(Duration::from_secs(*retry_after).saturating_add(self.buffer))
            }
            _ => None,
        }
    }

    /// Post `text` under `comment`. Errors other than rate limits are returned
    /// unchanged and not retried.
    pub async fn post<R>(
        &self,
        reddit: &R,
        comment: &Comment,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<PostOutcome, CoreError>
    where
        R: RedditHandle + ?Sized,
    {
        let mut budget = RetryBudget::new(self.retries);

        loop {
            let error = match reddit.reply(comment, text).await {
                Ok(()) => {
                    info!("Replied to {} ({})", comment.fullname, comment.permalink);
                    return Ok(PostOutcome::Posted);
                }
                Err(e) => e,
            };

            let Some(wait) = self.wait_for(&error) else {
                return Err(error);
            };

            if !budget.consume() {
                warn!(
                    "Giving up on reply to {} after {} rate-limit retries: {}",
                    comment.fullname, self.retries, error
                );
                return Ok(PostOutcome::Abandoned);
            }

            info!(
                "Rate limited replying to {}, retrying in {:?} ({} retries left)",
                comment.fullname,
                wait,
                budget.remaining()
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Cancelled while waiting to reply to {}", comment.fullname);
                    return Ok(PostOutcome::Abandoned);
                }
                _ = sleep(wait) => {}
            }
        }
    }
}
