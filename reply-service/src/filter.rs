use crate::ancestry::AncestryValidator;
use crate::config_store::ConfigStore;
use mcbc_core::{Comment, CoreError, RedditHandle, TriggerConfig};
use tracing::debug;

/// Why a comment was not replied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoTrigger,
    MissingAuthor,
    UndesirableAuthor,
    SelfReplyRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Rejected(Rejection),
}

/// Case-insensitive substring match against any trigger.
pub fn matches_trigger(config: &TriggerConfig, body: &str) -> bool {
    let body = body.to_lowercase();
    config
        .triggered_by
        .iter()
        .any(|trigger| body.contains(trigger.as_str()))
}

/// Missing authors are rejected rather than checked against the exclusion list.
pub fn author_check(config: &TriggerConfig, author: Option<&str>) -> Result<(), Rejection> {
    match author {
        None => Err(Rejection::MissingAuthor),
        Some(name) if config.undesirable.contains(&name.to_lowercase()) => {
            Err(Rejection::UndesirableAuthor)
        }
        Some(_) => Ok(()),
    }
}

pub struct CommentFilter {
    ancestry: AncestryValidator,
}

impl CommentFilter {
    pub fn new(ancestry: AncestryValidator) -> Self {
        Self { ancestry }
    }

    pub fn identity(&self) -> &str {
        self.ancestry.identity()
    }

    /// Checks run cheapest first: trigger, author, then the ancestry walk.
    ///
    /// Only a configuration failure is returned as an error.
    pub async fn evaluate<R>(
        &self,
        config: &ConfigStore,
        reddit: &R,
        comment: &Comment,
    ) -> Result<Verdict, CoreError>
    where
        R: RedditHandle + ?Sized,
    {
        let triggers = config.trigger_config().await?;

        if !matches_trigger(&triggers, &comment.body) {
            return Ok(Verdict::Rejected(Rejection::NoTrigger));
        }
        if let Err(rejection) = author_check(&triggers, comment.author.as_deref()) {
            debug!("{} rejected: {:?}", comment.fullname, rejection);
            return Ok(Verdict::Rejected(rejection));
        }
        if !self.ancestry.is_safe_from_self_reply(reddit, comment).await {
            return Ok(Verdict::Rejected(Rejection::SelfReplyRisk));
        }

        Ok(Verdict::Eligible)
    }

    pub async fn is_eligible<R>(
        &self,
        config: &ConfigStore,
        reddit: &R,
        comment: &Comment,
    ) -> Result<bool, CoreError>
    where
        R: RedditHandle + ?Sized,
    {
        Ok(self.evaluate(config, reddit, comment).await? == Verdict::Eligible)
    }
}
