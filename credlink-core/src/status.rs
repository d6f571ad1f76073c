//! Pure projection from controller state to the externally visible status.
//!
//! Both controllers route every status they expose through [`project`] so the
//! transition tables stay decoupled from the human-facing strings.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "schema")]
use schemars::JsonSchema;

/// Detail reported whenever no relation (or no resolvable secret) is available.
pub const WAITING_DETAIL: &str = "waiting for relation";

const DRIFT_MARKER: &str = " (new revision available!)";

/// Logical health of a party, surfaced to the orchestration layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub enum StatusKind {
    Waiting,
    Blocked,
    Active,
}

impl StatusKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Blocked => "blocked",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived status plus a free-text detail string. Recomputed, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ReconciledStatus {
    pub kind: StatusKind,
    pub detail: String,
}

impl ReconciledStatus {
    pub fn waiting(detail: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Waiting,
            detail: detail.into(),
        }
    }

    pub fn blocked(detail: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Blocked,
            detail: detail.into(),
        }
    }

    pub fn active(detail: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Active,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ReconciledStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Discovery progress of a controller with respect to its relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForRelation,
    Discovering,
    Tracking,
}

/// Outcome of the most recent resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Resolution succeeded; carries the human-readable summary.
    Ready(String),
    /// Resolution failed; carries the reason to surface.
    Failed(String),
}

/// Map controller state to the exposed status. No side effects, no I/O.
pub fn project(phase: Phase, resolution: Option<&Resolution>, drift: bool) -> ReconciledStatus {
    match phase {
        Phase::WaitingForRelation => ReconciledStatus::waiting(WAITING_DETAIL),
        Phase::Discovering | Phase::Tracking => match resolution {
            None => ReconciledStatus::waiting(WAITING_DETAIL),
            Some(Resolution::Failed(reason)) => ReconciledStatus::blocked(reason.clone()),
            Some(Resolution::Ready(summary)) if drift => {
                ReconciledStatus::active(format!("{summary}{DRIFT_MARKER}"))
            }
            Some(Resolution::Ready(summary)) => ReconciledStatus::active(summary.clone()),
        },
    }
}
