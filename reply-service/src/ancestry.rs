use mcbc_core::{Comment, ErrorExt, ParentRef, RedditHandle};
use tracing::{debug, warn};

/// Walks a comment's parent chain looking for an item the bot wrote itself.
pub struct AncestryValidator {
    identity: String,
    max_depth: usize,
}

impl AncestryValidator {
    pub fn new(identity: impl Into<String>, max_depth: usize) -> Self {
        Self {
            identity: identity.into(),
            max_depth: max_depth.max(1),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// `true` when no ancestor of `comment` was authored by the bot.
    ///
    /// Any failed lookup, or a chain deeper than `max_depth`, counts as unsafe.
    pub async fn is_safe_from_self_reply<R>(&self, reddit: &R, comment: &Comment) -> bool
    where
        R: RedditHandle + ?Sized,
    {
        let mut next = comment.parent.clone();
        let mut depth = 0;

        while let ParentRef::Reply { parent_id } = next {
            if depth == self.max_depth {
                warn!(
                    "Ancestry of {} deeper than {} levels, not replying",
                    comment.fullname, self.max_depth
                );
                return false;
            }
            depth += 1;

            let parent = match reddit.fetch_item(&parent_id).await {
                Ok(parent) => parent,
                Err(e) => {
                    e.log_warn();
                    warn!(
                        "Could not look up {} while checking {}; treating as unsafe",
                        parent_id, comment.fullname
                    );
                    return false;
                }
            };

            if parent.is_authored_by(&self.identity) {
                debug!(
                    "{} sits under {} by u/{}, skipping",
                    comment.fullname, parent.fullname, self.identity
                );
                return false;
            }
            next = parent.parent;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{comment, submission, FakeReddit};

    const BOT: &str = "mc_bc_bot";

    /// A chain of `depth` ancestors above a leaf comment, ending in a submission.
    /// `bot_at` marks the ancestor (1 = direct parent) written by the bot.
    fn chain(depth: usize, bot_at: Option<usize>) -> (FakeReddit, Comment) {
        let author = |level: usize| {
            if Some(level) == bot_at {
                Some(BOT)
            } else {
                Some("fan")
            }
        };

        let mut reddit = FakeReddit::new().with_item(submission("p1", author(depth)));
        let mut parent = "t3_p1".to_string();
        for level in (1..depth).rev() {
            let id = format!("a{level}");
            reddit = reddit.with_item(comment(&id, author(level), "text", Some(&parent)));
            parent = format!("t1_{id}");
        }
        let leaf = comment("leaf", Some("fan"), "caught!", Some(&parent));
        (reddit, leaf)
    }

    #[tokio::test]
    async fn test_root_item_needs_no_lookup() {
        let reddit = FakeReddit::new();
        let validator = AncestryValidator::new(BOT, 500);
        let root = comment("r", Some("fan"), "text", None);

        assert!(validator.is_safe_from_self_reply(&reddit, &root).await);
        assert!(reddit.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_top_level_comment_takes_one_lookup() {
        let reddit = FakeReddit::new().with_item(submission("p1", Some("op")));
        let validator = AncestryValidator::new(BOT, 500);
        let top = comment("c1", Some("fan"), "text", Some("t3_p1"));

        assert!(validator.is_safe_from_self_reply(&reddit, &top).await);
        assert_eq!(reddit.lookups(), vec!["t3_p1".to_string()]);
    }

    #[tokio::test]
    async fn test_chain_without_bot_is_safe() {
        let (reddit, leaf) = chain(6, None);
        let validator = AncestryValidator::new(BOT, 500);

        assert!(validator.is_safe_from_self_reply(&reddit, &leaf).await);
        assert_eq!(reddit.lookups().len(), 6);
    }

    #[tokio::test]
    async fn test_bot_ancestor_at_any_depth_is_unsafe() {
        let validator = AncestryValidator::new(BOT, 500);
        for bot_at in 1..=6 {
            let (reddit, leaf) = chain(6, Some(bot_at));
            assert!(
                !validator.is_safe_from_self_reply(&reddit, &leaf).await,
                "bot ancestor at depth {bot_at} was missed"
            );
            // The walk stops at the bot's item.
            assert_eq!(reddit.lookups().len(), bot_at);
        }
    }

    #[tokio::test]
    async fn test_identity_match_ignores_case() {
        let (reddit, leaf) = chain(3, Some(2));
        let validator = AncestryValidator::new("MC_BC_BOT", 500);
        assert!(!validator.is_safe_from_self_reply(&reddit, &leaf).await);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_unsafe() {
        let (reddit, leaf) = chain(4, None);
        let reddit = reddit.with_failing_lookup("t1_a2");
        let validator = AncestryValidator::new(BOT, 500);

        assert!(!validator.is_safe_from_self_reply(&reddit, &leaf).await);
    }

    #[tokio::test]
    async fn test_missing_parent_is_unsafe() {
        let reddit = FakeReddit::new();
        let validator = AncestryValidator::new(BOT, 500);
        let orphan = comment("c1", Some("fan"), "text", Some("t1_gone"));

        assert!(!validator.is_safe_from_self_reply(&reddit, &orphan).await);
    }

    #[tokio::test]
    async fn test_walk_is_bounded_by_max_depth() {
        // Two comments pointing at each other.
        let reddit = FakeReddit::new()
            .with_item(comment("x", Some("fan"), "text", Some("t1_y")))
            .with_item(comment("y", Some("fan"), "text", Some("t1_x")));
        let validator = AncestryValidator::new(BOT, 10);
        let leaf = comment("leaf", Some("fan"), "text", Some("t1_x"));

        assert!(!validator.is_safe_from_self_reply(&reddit, &leaf).await);
        assert_eq!(reddit.lookups().len(), 10);
    }
}
