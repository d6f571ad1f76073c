//! Core domain primitives shared by the owner and holder controllers.

pub mod channel;
pub mod errors;
pub mod status;
pub mod store;
pub mod types;

pub use channel::{RelationChannel, RelationRecord, Side};
pub use errors::{Error, Result};
pub use status::{project, Phase, ReconciledStatus, Resolution, StatusKind};
pub use store::{MemoryStore, ResolveOptions, SecretStore};
pub use types::{
    DeliveryKind, DeliveryMode, PartyId, RelationId, RevisionView, RotationPolicy, Secret,
    SecretContent, SecretId, ViewTag,
};

use std::sync::Arc;

pub type DynSecretStore = Arc<dyn SecretStore>;
