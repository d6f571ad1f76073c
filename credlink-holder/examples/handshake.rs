//! Drives one owner and one holder through the full credential lifecycle:
//! publish, track, rotate, upgrade, and teardown.
//!
//! ```sh
//! RUST_LOG=debug cargo run -p credlink-holder --example handshake
//! ```

use std::sync::Arc;

use anyhow::Result;
use credlink_core::channel::RelationChannel;
use credlink_core::{DynSecretStore, MemoryStore, PartyId, RelationId};
use credlink_holder::{HolderConfig, HolderController, HolderEvent};
use credlink_owner::{OwnerConfig, OwnerController, OwnerEvent};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store: DynSecretStore = Arc::new(MemoryStore::new());
    let channel = Arc::new(RelationChannel::new());

    let mut owner = OwnerController::new(
        PartyId::new("owner-app")?,
        store.clone(),
        channel.clone(),
        OwnerConfig::default(),
    );
    let mut holder = HolderController::new(
        PartyId::new("holder-app")?,
        store,
        channel.clone(),
        HolderConfig::default(),
    );

    owner.dispatch(&OwnerEvent::Install);
    holder.dispatch(&HolderEvent::Install);

    let relation = RelationId::new("secret-id.0")?;
    channel.open(&relation);
    owner.dispatch(&OwnerEvent::RelationCreated {
        relation: relation.clone(),
        remote: holder.party().clone(),
    });
    holder.dispatch(&HolderEvent::RelationChanged {
        relation: relation.clone(),
    });
    println!("owner:  {}", owner.status());
    println!("holder: {}", holder.status());

    owner.dispatch(&OwnerEvent::RotateAction);
    holder.dispatch(&HolderEvent::SecretChanged);
    println!("owner:  {}", owner.status());
    println!("holder: {}", holder.status());

    holder.dispatch(&HolderEvent::UpgradeAction);
    println!("holder: {}", holder.status());

    owner.dispatch(&OwnerEvent::RelationBroken {
        relation: relation.clone(),
    });
    holder.dispatch(&HolderEvent::RelationBroken { relation });
    println!("owner:  {}", owner.status());
    println!("holder: {}", holder.status());

    Ok(())
}
