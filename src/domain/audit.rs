//! Audit stamping.
//!
//! Aggregates never look up "who" or "when" on their own: every mutating call
//! receives an [`AuditStamp`] from the caller, and the aggregate is the only
//! writer of its [`AuditInfo`].

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity of the caller plus the instant the operation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    pub fn new(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            at,
        }
    }

    /// Stamp attributed to `actor` at the current wall-clock time.
    pub fn now(actor: impl Into<String>) -> Self {
        Self::new(actor, Utc::now())
    }

    /// Stamp for work performed by the service itself rather than a user.
    pub fn system() -> Self {
        Self::now("system")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditInfo {
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl AuditInfo {
    pub(crate) fn created(stamp: &AuditStamp) -> Self {
        Self {
            created_at: stamp.at,
            created_by: stamp.actor.clone(),
            updated_at: None,
            updated_by: None,
        }
    }

    pub(crate) fn touch(&mut self, stamp: &AuditStamp) {
        self.updated_at = Some(stamp.at);
        self.updated_by = Some(stamp.actor.clone());
    }

    /// Rebuilds stored audit columns. Only the persistence layer calls this.
    pub(crate) fn restore(
        created_at: DateTime<Utc>,
        created_by: String,
        updated_at: Option<DateTime<Utc>>,
        updated_by: Option<String>,
    ) -> Self {
        Self {
            created_at,
            created_by,
            updated_at,
            updated_by,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }
}
