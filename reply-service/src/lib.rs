pub mod ancestry;
pub mod composer;
pub mod config_store;
pub mod consumer;
pub mod filter;
pub mod poster;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use ancestry::AncestryValidator;
pub use composer::ReplyComposer;
pub use config_store::{Clock, ConfigStore, ManualClock, SystemClock, TtlCache};
pub use consumer::{RecentReplies, RunSummary, StreamConsumer};
pub use filter::{CommentFilter, Rejection, Verdict};
pub use poster::{parse_wait, PostOutcome, RateLimitedPoster, RetryBudget};
