//! Owner-side controller: creates, rotates, expires and revokes the shared
//! credential, publishing its identity over the relation channel.

pub mod config;
pub mod controller;
pub mod events;

pub use config::OwnerConfig;
pub use controller::{OwnerController, OwnerState, SECRET_LABEL};
pub use events::{OwnerEvent, OwnerEventKind};
