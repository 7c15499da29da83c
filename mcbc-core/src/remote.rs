//! The contract the reply pipeline needs from the remote service.

use crate::{Comment, CoreError};
use async_trait::async_trait;
use futures::stream::BoxStream;

#[async_trait]
pub trait RedditHandle: Send + Sync {
    /// Live, unbounded sequence of new comments. With `skip_existing` the
    /// comments already present when the stream opens are not yielded.
    fn stream_comments(&self, skip_existing: bool) -> BoxStream<'_, Result<Comment, CoreError>>;

    /// Look up a comment or submission by fullname (`t1_…` / `t3_…`).
    async fn fetch_item(&self, fullname: &str) -> Result<Comment, CoreError>;

    /// Post `text` as a reply to `comment`.
    async fn reply(&self, comment: &Comment, text: &str) -> Result<(), CoreError>;
}
