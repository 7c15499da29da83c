//! Scripted in-memory [`RedditHandle`] for exercising the pipeline without Reddit.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use mcbc_core::{Comment, CoreError, ParentRef, RedditApiError, RedditHandle};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Build a comment whose parent is `parent` (a fullname) or a root item when `None`.
pub fn comment(id: &str, author: Option<&str>, body: &str, parent: Option<&str>) -> Comment {
    Comment {
        id: id.to_string(),
        fullname: format!("t1_{id}"),
        body: body.to_string(),
        author: author.map(str::to_string),
        parent: match parent {
            Some(parent_id) => ParentRef::Reply {
                parent_id: parent_id.to_string(),
            },
            None => ParentRef::Root,
        },
        permalink: format!("/r/EmergingCricket/comments/p1/_/{id}/"),
        subreddit: "EmergingCricket".to_string(),
        created_at: Utc::now(),
    }
}

pub fn submission(id: &str, author: Option<&str>) -> Comment {
    Comment {
        fullname: format!("t3_{id}"),
        ..comment(id, author, "Match thread", None)
    }
}

#[derive(Default)]
pub struct FakeReddit {
    items: HashMap<String, Comment>,
    failing_lookups: HashSet<String>,
    lookups: Mutex<Vec<String>>,
    replies: Mutex<Vec<(String, String)>>,
    reply_script: Mutex<VecDeque<Result<(), CoreError>>>,
    streams: Mutex<VecDeque<Vec<Result<Comment, CoreError>>>>,
    stream_opens: Mutex<Vec<bool>>,
    exhausted: Option<CancellationToken>,
}

impl FakeReddit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `item` resolvable through `fetch_item`.
    pub fn with_item(mut self, item: Comment) -> Self {
        self.items.insert(item.fullname.clone(), item);
        self
    }

    /// Lookups of `fullname` fail with a server error.
    pub fn with_failing_lookup(mut self, fullname: &str) -> Self {
        self.failing_lookups.insert(fullname.to_string());
        self
    }

    /// Queue outcomes for successive `reply` calls; once drained, replies succeed.
    pub fn with_reply_results(self, results: Vec<Result<(), CoreError>>) -> Self {
        self.reply_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(results);
        self
    }

    /// Queue the items yielded by the next `stream_comments` call. The stream
    /// ends after the last item.
    pub fn with_stream(self, items: Vec<Result<Comment, CoreError>>) -> Self {
        self.streams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(items);
        self
    }

    /// Cancel `token` when a stream is requested after the scripted ones ran out.
    pub fn cancel_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.exhausted = Some(token);
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// `(comment fullname, reply text)` for every reply that was accepted.
    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The `skip_existing` flag of every stream that was opened.
    pub fn stream_opens(&self) -> Vec<bool> {
        self.stream_opens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

pub fn rate_limited(message: &str) -> CoreError {
    CoreError::RedditApi(RedditApiError::RateLimited {
        message: message.to_string(),
    })
}

pub fn connection_failed() -> CoreError {
    CoreError::RedditApi(RedditApiError::ConnectionFailed {
        reason: "failed to establish connection".to_string(),
    })
}

#[async_trait]
impl RedditHandle for FakeReddit {
    fn stream_comments(&self, skip_existing: bool) -> BoxStream<'_, Result<Comment, CoreError>> {
        self.stream_opens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(skip_existing);

        let next = self
            .streams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(items) => stream::iter(items).boxed(),
            None => {
                if let Some(token) = &self.exhausted {
                    token.cancel();
                }
                stream::pending::<Result<Comment, CoreError>>().boxed()
            }
        }
    }

    async fn fetch_item(&self, fullname: &str) -> Result<Comment, CoreError> {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(fullname.to_string());

        if self.failing_lookups.contains(fullname) {
            return Err(CoreError::RedditApi(RedditApiError::ServerError {
                status_code: 500,
            }));
        }
        self.items.get(fullname).cloned().ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::NotFound {
                fullname: fullname.to_string(),
            })
        })
    }

    async fn reply(&self, comment: &Comment, text: &str) -> Result<(), CoreError> {
        let scripted = self
            .reply_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }

        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((comment.fullname.clone(), text.to_string()));
        Ok(())
    }
}
