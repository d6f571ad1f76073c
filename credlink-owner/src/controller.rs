use std::collections::BTreeMap;
use std::sync::Arc;

use credlink_core::channel::{RelationChannel, Side, PASSWORD_KEY, SECRET_ID_KEY, USERNAME_KEY};
use credlink_core::{
    project, DeliveryKind, DynSecretStore, Error, PartyId, Phase, ReconciledStatus, RelationId,
    Resolution, ResolveOptions, Result, SecretContent, SecretId,
};
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::config::OwnerConfig;
use crate::events::{OwnerEvent, OwnerEventKind};

/// Label under which the owner registers its credential secret.
pub const SECRET_LABEL: &str = "shared-credentials";

/// Lifecycle state of the owner, scoped to the current relation instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerState {
    Uninitialized,
    WaitingForRelation,
    Published { relation: RelationId },
    Revoked,
}

type Handler = fn(&mut OwnerController, &OwnerEvent);

// Event dispatch: one handler per event kind, initialized once for the
// process lifetime.
static HANDLERS: Lazy<BTreeMap<OwnerEventKind, Handler>> = Lazy::new(|| {
    let mut table: BTreeMap<OwnerEventKind, Handler> = BTreeMap::new();
    table.insert(OwnerEventKind::Install, OwnerController::on_install);
    table.insert(
        OwnerEventKind::RelationCreated,
        OwnerController::on_relation_created,
    );
    table.insert(
        OwnerEventKind::RotateAction,
        OwnerController::on_rotate_action,
    );
    table.insert(
        OwnerEventKind::SecretRotate,
        OwnerController::on_secret_rotate,
    );
    table.insert(
        OwnerEventKind::SecretExpired,
        OwnerController::on_secret_expired,
    );
    table.insert(
        OwnerEventKind::SecretRemove,
        OwnerController::on_secret_remove,
    );
    table.insert(
        OwnerEventKind::RelationBroken,
        OwnerController::on_relation_broken,
    );
    table
});

/// Owner-side protocol state machine. Events are processed to completion, one
/// at a time; every store failure is converted into a status, never
/// propagated.
pub struct OwnerController {
    party: PartyId,
    store: DynSecretStore,
    channel: Arc<RelationChannel>,
    config: OwnerConfig,
    state: OwnerState,
    status: ReconciledStatus,
    secret_id: Option<SecretId>,
}

impl OwnerController {
    pub fn new(
        party: PartyId,
        store: DynSecretStore,
        channel: Arc<RelationChannel>,
        config: OwnerConfig,
    ) -> Self {
        Self {
            party,
            store,
            channel,
            config,
            state: OwnerState::Uninitialized,
            status: project(Phase::WaitingForRelation, None, false),
            secret_id: None,
        }
    }

    pub fn party(&self) -> &PartyId {
        &self.party
    }

    pub fn state(&self) -> &OwnerState {
        &self.state
    }

    pub fn status(&self) -> &ReconciledStatus {
        &self.status
    }

    pub fn secret_id(&self) -> Option<&SecretId> {
        self.secret_id.as_ref()
    }

    /// Run the handler registered for the event's kind to completion.
    pub fn dispatch(&mut self, event: &OwnerEvent) {
        debug!(party = %self.party, event = event.kind().as_str(), "owner event");
        if let Some(handler) = HANDLERS.get(&event.kind()) {
            handler(self, event);
        }
    }

    fn on_install(&mut self, _event: &OwnerEvent) {
        self.state = OwnerState::WaitingForRelation;
        self.status = project(Phase::WaitingForRelation, None, false);
    }

    fn on_relation_created(&mut self, event: &OwnerEvent) {
        let OwnerEvent::RelationCreated { relation, remote } = event else {
            return;
        };
        match self.publish(relation, remote) {
            Ok(summary) => {
                self.state = OwnerState::Published {
                    relation: relation.clone(),
                };
                self.status = project(Phase::Tracking, Some(&Resolution::Ready(summary)), false);
            }
            Err(err) => {
                warn!(party = %self.party, relation = %relation, error = %err, "publish failed");
                self.status = project(
                    Phase::Tracking,
                    Some(&Resolution::Failed(err.to_string())),
                    false,
                );
            }
        }
    }

    /// Create the secret if needed, grant it, and write the identifying data
    /// into the owner's half of the relation. Idempotent under event
    /// redelivery: existing relation data means publish already ran.
    fn publish(&mut self, relation: &RelationId, remote: &PartyId) -> Result<String> {
        let id = self.ensure_secret()?;

        if self.config.grant {
            self.store.grant(&self.party, &id, relation, remote)?;
        } else {
            warn!(party = %self.party, secret = %id, relation = %relation, "secret NOT granted");
        }

        let marker_key = match self.config.delivery {
            DeliveryKind::Indirect => SECRET_ID_KEY,
            DeliveryKind::Direct => USERNAME_KEY,
        };
        if self
            .channel
            .read_local(Side::Owner, relation, marker_key)
            .is_some()
        {
            debug!(party = %self.party, relation = %relation, "identity already published; skipping rewrite");
        } else {
            match self.config.delivery {
                DeliveryKind::Indirect => {
                    self.channel
                        .put_once(Side::Owner, relation, SECRET_ID_KEY, id.as_str())?;
                }
                DeliveryKind::Direct => {
                    let view = self.store.resolve(&self.party, &id, ResolveOptions::peek())?;
                    for (key, value) in &view.content {
                        self.channel.put(Side::Owner, relation, key, value.clone())?;
                    }
                }
            }
            info!(party = %self.party, secret = %id, relation = %relation, delivery = %self.config.delivery, "secret published");
        }

        let mut summary = format!("published secret ID {id}");
        if !self.config.grant {
            summary.push_str(" (not granted)");
        }
        Ok(summary)
    }

    fn ensure_secret(&mut self) -> Result<SecretId> {
        if let Some(id) = &self.secret_id {
            return Ok(id.clone());
        }
        let id = match self.store.lookup(&self.party, SECRET_LABEL) {
            Ok(id) => id,
            Err(Error::NotFound { .. }) => {
                let expiry = self.config.expiry()?;
                self.store
                    .create(
                        &self.party,
                        SECRET_LABEL,
                        default_content(),
                        self.config.rotate,
                        expiry,
                    )?
                    .id
            }
            Err(err) => return Err(err),
        };
        self.secret_id = Some(id.clone());
        Ok(id)
    }

    fn on_rotate_action(&mut self, _event: &OwnerEvent) {
        let Some(id) = self.secret_id.clone() else {
            debug!(party = %self.party, "nothing to rotate; ignoring rotate-secret action");
            return;
        };
        match self.rotate_secret(&id) {
            Ok((old, new)) => {
                info!(party = %self.party, secret = %id, old_revision = old, new_revision = new, "secret rotated");
                self.status = project(
                    Phase::Tracking,
                    Some(&Resolution::Ready(format!(
                        "rotated: revision {old} --> {new}"
                    ))),
                    false,
                );
            }
            Err(err) => {
                warn!(party = %self.party, secret = %id, error = %err, "rotation failed");
                self.status = project(
                    Phase::Tracking,
                    Some(&Resolution::Failed(err.to_string())),
                    false,
                );
            }
        }
    }

    fn rotate_secret(&self, id: &SecretId) -> Result<(u64, u64)> {
        let old = self.store.info(&self.party, id)?.revision;
        let content = rotated_content(old + 1);
        let new = self.store.rotate(&self.party, id, content.clone())?.revision;

        // Direct delivery exposes the fields themselves, so rotation rewrites
        // them; the identity key is never rewritten.
        if self.config.delivery == DeliveryKind::Direct {
            if let OwnerState::Published { relation } = &self.state {
                for (key, value) in &content {
                    self.channel.put(Side::Owner, relation, key, value.clone())?;
                }
            }
        }
        Ok((old, new))
    }

    // Policy reminder only: content a holder may have cached is never changed
    // behind its back.
    fn on_secret_rotate(&mut self, _event: &OwnerEvent) {
        self.status = project(
            Phase::Tracking,
            Some(&Resolution::Failed(
                "rotation overdue! run rotate-secret to publish a new revision".into(),
            )),
            false,
        );
    }

    fn on_secret_expired(&mut self, _event: &OwnerEvent) {
        self.status = project(
            Phase::Tracking,
            Some(&Resolution::Failed(
                "secret expired! run rotate-secret to publish a new revision".into(),
            )),
            false,
        );
    }

    // Best-effort housekeeping; a refused prune only wastes storage.
    fn on_secret_remove(&mut self, event: &OwnerEvent) {
        let OwnerEvent::SecretRemove { revision } = event else {
            return;
        };
        let Some(id) = self.secret_id.clone() else {
            return;
        };
        match self.store.prune(&self.party, &id, *revision) {
            Ok(()) => {
                debug!(party = %self.party, secret = %id, revision = *revision, "unreferenced revision pruned");
            }
            Err(err) => {
                warn!(party = %self.party, secret = %id, revision = *revision, error = %err, "prune skipped");
            }
        }
    }

    fn on_relation_broken(&mut self, event: &OwnerEvent) {
        let OwnerEvent::RelationBroken { relation } = event else {
            return;
        };
        if let Some(id) = self.secret_id.take() {
            if let Err(err) = self.store.revoke(&self.party, &id, relation) {
                warn!(party = %self.party, secret = %id, error = %err, "revoke failed during teardown");
            }
            if let Err(err) = self.store.remove_all_revisions(&self.party, &id) {
                warn!(party = %self.party, secret = %id, error = %err, "revision removal failed during teardown");
            }
            info!(party = %self.party, secret = %id, relation = %relation, "secret revoked and torn down");
        }
        self.state = OwnerState::Revoked;
        self.status = project(Phase::WaitingForRelation, None, false);
    }
}

/// Content of revision 0.
pub fn default_content() -> SecretContent {
    let mut content = SecretContent::new();
    content.insert(USERNAME_KEY.to_string(), "admin".to_string());
    content.insert(PASSWORD_KEY.to_string(), "admin".to_string());
    content
}

fn rotated_content(revision: u64) -> SecretContent {
    let mut content = SecretContent::new();
    content.insert(USERNAME_KEY.to_string(), format!("username-rev-{revision}"));
    content.insert(PASSWORD_KEY.to_string(), format!("password-rev-{revision}"));
    content
}
