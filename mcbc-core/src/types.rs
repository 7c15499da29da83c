use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

/// Where an item sits in its thread.
///
/// A submission has no parent; a comment always points at either another
/// comment (`t1_…`) or the submission it was made on (`t3_…`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    Root,
    Reply { parent_id: String },
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    /// Reddit fullname, e.g. `t1_abc123`.
    pub fullname: String,
    pub body: String,
    /// `None` when the account was deleted or the data is missing.
    pub author: Option<String>,
    pub parent: ParentRef,
    pub permalink: String,
    pub subreddit: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        matches!(self.parent, ParentRef::Root)
    }

    pub fn is_authored_by(&self, name: &str) -> bool {
        self.author
            .as_deref()
            .is_some_and(|author| author.eq_ignore_ascii_case(name))
    }
}

/// Trigger substrings and excluded authors, as stored in `triggers.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerConfig {
    pub triggered_by: HashSet<String>,
    pub undesirable: HashSet<String>,
}

impl TriggerConfig {
    /// Lowercase triggers and excluded names so lookups only lowercase the comment side.
    pub fn normalized(self) -> Self {
        Self {
            triggered_by: self
                .triggered_by
                .into_iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            undesirable: self
                .undesirable
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRecord {
    pub actor: String,
    pub target: String,
    pub context: String,
}

impl From<(String, String, String)> for TemplateRecord {
    fn from((actor, target, context): (String, String, String)) -> Self {
        Self {
            actor,
            target,
            context,
        }
    }
}

/// Quote → (actor, target, context). Ordered so a seeded pick is reproducible.
pub type ReplyTemplates = BTreeMap<String, TemplateRecord>;
