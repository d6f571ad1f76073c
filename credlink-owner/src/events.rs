use credlink_core::{PartyId, RelationId};

/// Events the platform runtime delivers to the owner controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerEvent {
    Install,
    RelationCreated { relation: RelationId, remote: PartyId },
    RotateAction,
    SecretRotate,
    SecretExpired,
    SecretRemove { revision: u64 },
    RelationBroken { relation: RelationId },
}

/// Discriminant used to key the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OwnerEventKind {
    Install,
    RelationCreated,
    RotateAction,
    SecretRotate,
    SecretExpired,
    SecretRemove,
    RelationBroken,
}

impl OwnerEvent {
    pub fn kind(&self) -> OwnerEventKind {
        match self {
            Self::Install => OwnerEventKind::Install,
            Self::RelationCreated { .. } => OwnerEventKind::RelationCreated,
            Self::RotateAction => OwnerEventKind::RotateAction,
            Self::SecretRotate => OwnerEventKind::SecretRotate,
            Self::SecretExpired => OwnerEventKind::SecretExpired,
            Self::SecretRemove { .. } => OwnerEventKind::SecretRemove,
            Self::RelationBroken { .. } => OwnerEventKind::RelationBroken,
        }
    }
}

impl OwnerEventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::RelationCreated => "relation-created",
            Self::RotateAction => "rotate-secret",
            Self::SecretRotate => "secret-rotate",
            Self::SecretExpired => "secret-expired",
            Self::SecretRemove => "secret-remove",
            Self::RelationBroken => "relation-broken",
        }
    }
}
