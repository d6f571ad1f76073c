use credlink_core::DeliveryKind;
use serde::{Deserialize, Serialize};

/// Deployment-variant configuration for the holder controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HolderConfig {
    /// Which addressing variant the relation is expected to carry.
    pub addressing: DeliveryKind,
}
