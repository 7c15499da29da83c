//! The long-running comment loop.
//!
//! `StreamConsumer` pulls new comments, runs them through the filter and posts
//! a composed reply for each eligible one. Connection-level failures of the
//! stream are recovered by waiting and resubscribing, indefinitely. Only a
//! configuration failure or an unexpected stream error ends the loop early.

use crate::ancestry::AncestryValidator;
use crate::composer::ReplyComposer;
use crate::config_store::ConfigStore;
use crate::filter::{CommentFilter, Verdict};
use crate::poster::{PostOutcome, RateLimitedPoster};
use futures::StreamExt;
use mcbc_core::{BotSettings, Comment, CoreError, ErrorExt, RedditApiError, RedditHandle};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_RECENT_CAPACITY: usize = 1000;

/// Ids of the most recently answered comments, oldest evicted first.
///
/// Kept across reconnects so a resubscribed stream that replays a comment
/// does not get a second reply.
#[derive(Debug)]
pub struct RecentReplies {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl RecentReplies {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn record(&mut self, id: &str) {
        if !self.members.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub seen: u64,
    pub replied: u64,
    pub abandoned: u64,
    pub skipped: u64,
    pub failed: u64,
    pub reconnects: u64,
}

enum StreamEnd {
    Cancelled,
    Reconnect(Duration),
}

pub struct StreamConsumer {
    config: ConfigStore,
    filter: CommentFilter,
    composer: ReplyComposer,
    poster: RateLimitedPoster,
    reconnect_delay: Duration,
    recent: Mutex<RecentReplies>,
}

impl StreamConsumer {
    pub fn new(
        config: ConfigStore,
        filter: CommentFilter,
        composer: ReplyComposer,
        poster: RateLimitedPoster,
    ) -> Self {
        Self {
            config,
            filter,
            composer,
            poster,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            recent: Mutex::new(RecentReplies::with_capacity(DEFAULT_RECENT_CAPACITY)),
        }
    }

    /// Wire up the whole pipeline from bot settings.
    pub fn from_settings(settings: &BotSettings, config: ConfigStore) -> Self {
        let pipeline = &settings.pipeline;
        let filter = CommentFilter::new(AncestryValidator::new(
            settings.reddit.username.clone(),
            pipeline.max_ancestry_depth,
        ));
        let poster =
            RateLimitedPoster::new(pipeline.rate_limit_retries, pipeline.rate_limit_buffer());

        Self::new(config, filter, ReplyComposer::new(&settings.footer), poster)
            .with_reconnect_delay(pipeline.reconnect_delay())
            .with_recent_capacity(pipeline.recent_reply_capacity)
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_recent_capacity(mut self, capacity: usize) -> Self {
        self.recent = Mutex::new(RecentReplies::with_capacity(capacity));
        self
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Consume comments until `cancel` fires.
    pub async fn run<R>(
        &self,
        reddit: &R,
        cancel: CancellationToken,
    ) -> Result<RunSummary, CoreError>
    where
        R: RedditHandle + ?Sized,
    {
        let mut summary = RunSummary::default();
        info!(
            "Listening for comments as u/{} (reconnect delay {:?})",
            self.filter.identity(),
            self.reconnect_delay
        );

        loop {
            match self.consume_stream(reddit, &cancel, &mut summary).await? {
                StreamEnd::Cancelled => break,
                StreamEnd::Reconnect(delay) => {
                    summary.reconnects += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(delay) => {}
                    }
                    info!("Resubscribing to comment stream (attempt {})", summary.reconnects);
                }
            }
        }

        info!(
            "Stopped: {} seen, {} replied, {} abandoned, {} skipped, {} failed, {} reconnects",
            summary.seen,
            summary.replied,
            summary.abandoned,
            summary.skipped,
            summary.failed,
            summary.reconnects
        );
        Ok(summary)
    }

    async fn consume_stream<R>(
        &self,
        reddit: &R,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<StreamEnd, CoreError>
    where
        R: RedditHandle + ?Sized,
    {
        let mut comments = reddit.stream_comments(true);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
                next = comments.next() => next,
            };

            match next {
                Some(Ok(comment)) => {
                    summary.seen += 1;
                    self.handle_comment(reddit, &comment, cancel, summary).await?;
                }
                Some(Err(e)) if e.is_transport_failure() => {
                    warn!("Comment stream interrupted: {}", e);
                    return Ok(StreamEnd::Reconnect(self.reconnect_delay));
                }
                // Throttled listing or an expired token; the next subscription re-authenticates.
                Some(Err(e)) if e.is_retryable() || is_stale_token(&e) => {
                    warn!("Comment stream paused: {}", e);
                    let delay = e
                        .retry_after()
                        .map_or(self.reconnect_delay, |after| after.max(self.reconnect_delay));
                    return Ok(StreamEnd::Reconnect(delay));
                }
                Some(Err(e)) => {
                    e.log_error();
                    return Err(e);
                }
                None => {
                    warn!("Comment stream ended");
                    return Ok(StreamEnd::Reconnect(self.reconnect_delay));
                }
            }
        }
    }

    /// Configuration errors are returned; a failed post only counts as `failed`.
    async fn handle_comment<R>(
        &self,
        reddit: &R,
        comment: &Comment,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), CoreError>
    where
        R: RedditHandle + ?Sized,
    {
        if comment.is_authored_by(self.filter.identity()) || self.already_replied(&comment.id) {
            summary.skipped += 1;
            return Ok(());
        }

        match self.filter.evaluate(&self.config, reddit, comment).await? {
            Verdict::Eligible => {}
            Verdict::Rejected(reason) => {
                debug!("Skipping {}: {:?}", comment.fullname, reason);
                summary.skipped += 1;
                return Ok(());
            }
        }

        let templates = self.config.reply_templates().await?;
        let text = self.composer.compose(&templates)?;

        match self.poster.post(reddit, comment, &text, cancel).await {
            Ok(PostOutcome::Posted) => {
                self.remember(&comment.id);
                summary.replied += 1;
            }
            Ok(PostOutcome::Abandoned) => summary.abandoned += 1,
            Err(e) => {
                error!("Failed to reply to {}: {}", comment.fullname, e);
                summary.failed += 1;
            }
        }
        Ok(())
    }

    fn already_replied(&self, id: &str) -> bool {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    fn remember(&self, id: &str) {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(id);
    }
}

fn is_stale_token(error: &CoreError) -> bool {
    matches!(error, CoreError::RedditApi(RedditApiError::InvalidToken))
}
