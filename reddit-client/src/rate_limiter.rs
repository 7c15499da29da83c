use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn reddit_oauth() -> Self {
        Self::per_minute(60)
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests: max_requests.max(1),
            time_window: Duration::from_secs(60),
            burst_allowance: (max_requests / 6).clamp(1, 10),
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Client-side pacing so the bot stays under Reddit's request quota.
/// Reddit's own reply cooldown is handled by the poster, not here.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    /// Take `tokens_needed` tokens, or report how long until they would be available.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            token_bucket: TokenBucket::new(&config),
            config,
        }
    }

    /// Wait until a request may be sent. Returns how long the caller waited.
    pub async fn acquire_permit(&self) -> Duration {
        let start_time = Instant::now();
        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    debug!("Request quota reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }
        start_time.elapsed()
    }

    pub async fn available_tokens(&self) -> u32 {
        self.token_bucket.available_tokens().await as u32
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_bucket_basic() {
        let config = RateLimitConfig {
            max_requests: 10,
            time_window: Duration::from_secs(10),
            burst_allowance: 5,
        };

        let bucket = TokenBucket::new(&config);

        // Should be able to acquire up to burst allowance
        for _ in 0..5 {
            assert!(bucket.acquire(1.0).await.is_ok());
        }

        // Next acquisition should fail
        assert!(bucket.acquire(1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let config = RateLimitConfig {
            max_requests: 60, // 1 token per second
            time_window: Duration::from_secs(60),
            burst_allowance: 2,
        };

        let bucket = TokenBucket::new(&config);

        assert!(bucket.acquire(2.0).await.is_ok());
        let wait = bucket.acquire(1.0).await.unwrap_err();
        assert!(wait <= Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(bucket.acquire(1.0).await.is_ok());
    }

    #[test]
    fn test_per_minute_burst() {
        assert_eq!(RateLimitConfig::per_minute(60).burst_allowance, 10);
        assert_eq!(RateLimitConfig::per_minute(12).burst_allowance, 2);
        assert_eq!(RateLimitConfig::per_minute(0).max_requests, 1);
        assert_eq!(RateLimitConfig::per_minute(0).burst_allowance, 1);
    }

    #[tokio::test]
    async fn test_rate_limiter_permits() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());

        limiter.acquire_permit().await;
        limiter.acquire_permit().await;

        assert!(limiter.available_tokens().await <= limiter.config().burst_allowance);
    }
}
