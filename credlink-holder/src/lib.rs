//! Holder-side controller: discovers a published credential over the relation
//! channel, tracks new revisions, and reacts to access changes.

pub mod config;
pub mod controller;
pub mod events;

pub use config::HolderConfig;
pub use controller::HolderController;
pub use events::{HolderEvent, HolderEventKind};
