use credlink_core::RelationId;

/// Events the platform runtime delivers to the holder controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolderEvent {
    Install,
    RelationChanged { relation: RelationId },
    SecretChanged,
    UpdateStatus,
    UpgradeAction,
    RelationBroken { relation: RelationId },
}

/// Discriminant used to key the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HolderEventKind {
    Install,
    RelationChanged,
    SecretChanged,
    UpdateStatus,
    UpgradeAction,
    RelationBroken,
}

impl HolderEvent {
    pub fn kind(&self) -> HolderEventKind {
        match self {
            Self::Install => HolderEventKind::Install,
            Self::RelationChanged { .. } => HolderEventKind::RelationChanged,
            Self::SecretChanged => HolderEventKind::SecretChanged,
            Self::UpdateStatus => HolderEventKind::UpdateStatus,
            Self::UpgradeAction => HolderEventKind::UpgradeAction,
            Self::RelationBroken { .. } => HolderEventKind::RelationBroken,
        }
    }
}

impl HolderEventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::RelationChanged => "relation-changed",
            Self::SecretChanged => "secret-changed",
            Self::UpdateStatus => "update-status",
            Self::UpgradeAction => "upgrade-secret",
            Self::RelationBroken => "relation-broken",
        }
    }
}
