//! Turns repeated listing polls into a stream of new comments.

use crate::api::RedditApiClient;
use futures::stream::{self, BoxStream, StreamExt};
use mcbc_core::{Comment, CoreError};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

const LISTING_LIMIT: u32 = 100;
const SEEN_CAPACITY: usize = 1000;
const MAX_BACKOFF_FACTOR: u32 = 16;

/// Remembers the most recent ids so overlapping listing pages are not re-yielded.
#[derive(Debug, Default)]
pub struct SeenSet {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` if `id` had not been seen.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Polling state behind [`crate::RedditClient`]'s comment stream.
#[derive(Debug)]
pub struct CommentPoller {
    seen: SeenSet,
    pending: VecDeque<Comment>,
    skip_existing: bool,
    primed: bool,
    base_interval: Duration,
    interval: Duration,
}

impl CommentPoller {
    pub fn new(skip_existing: bool, base_interval: Duration) -> Self {
        Self {
            seen: SeenSet::with_capacity(SEEN_CAPACITY),
            pending: VecDeque::new(),
            skip_existing,
            primed: false,
            base_interval,
            interval: base_interval,
        }
    }

    /// Feed one listing page (newest first). Returns how many comments were queued.
    pub fn ingest(&mut self, newest_first: Vec<Comment>) -> usize {
        let hide = self.skip_existing && !self.primed;
        self.primed = true;
        let mut queued = 0;

        for comment in newest_first.into_iter().rev() {
            if !self.seen.insert(&comment.fullname) || hide {
                continue;
            }
            self.pending.push_back(comment);
            queued += 1;
        }

        if hide {
            debug!("Skipped {} pre-existing comments", self.seen.len());
            return 0;
        }

        if queued == 0 {
            self.interval = (self.interval * 2).min(self.base_interval * MAX_BACKOFF_FACTOR);
        } else {
            self.interval = self.base_interval;
        }
        queued
    }

    pub fn next_pending(&mut self) -> Option<Comment> {
        self.pending.pop_front()
    }

    pub fn current_interval(&self) -> Duration {
        self.interval
    }

    pub fn into_stream<'a>(
        self,
        api: &'a RedditApiClient,
        subreddits: &'a [String],
    ) -> BoxStream<'a, Result<Comment, CoreError>> {
        stream::unfold(self, move |mut poller| async move {
            loop {
                if let Some(comment) = poller.next_pending() {
                    return Some((Ok(comment), poller));
                }
                if poller.primed {
                    sleep(poller.interval).await;
                }
                match api.get_new_comments(subreddits, LISTING_LIMIT).await {
                    Ok(batch) => {
                        poller.ingest(batch);
                    }
                    Err(e) => return Some((Err(e), poller)),
                }
            }
        })
        .boxed()
    }
}
