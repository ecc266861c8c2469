//! Mutation audit trail.
//!
//! Each successful mutation produces one `info` event on the `diskfm::audit`
//! target, shaped as `<message> by user <who>.` with the disk root attached as
//! `scope`. Who performed the action is injected by the caller; the kernel
//! never looks it up.

use std::fmt;
use std::path::Path;

/// Who performs gateway mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Actor {
    #[default]
    Anonymous,
    User(String),
}

impl Actor {
    pub fn user(name: impl Into<String>) -> Self {
        Actor::User(name.into())
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Anonymous => f.write_str("~anonymous"),
            Actor::User(name) => write!(f, "\"{name}\""),
        }
    }
}

/// One audited mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord<'a> {
    pub scope: &'a Path,
    pub message: String,
    pub actor: &'a Actor,
}

impl AuditRecord<'_> {
    pub fn line(&self) -> String {
        format!("{} by user {}.", self.message, self.actor)
    }

    pub fn emit(&self) {
        tracing::info!(
            target: "diskfm::audit",
            scope = %self.scope.display(),
            "{}",
            self.line()
        );
    }
}
