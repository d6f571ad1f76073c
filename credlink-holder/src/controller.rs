use std::collections::BTreeMap;
use std::sync::Arc;

use credlink_core::channel::{RelationChannel, Side, PASSWORD_KEY, SECRET_ID_KEY, USERNAME_KEY};
use credlink_core::{
    project, DeliveryKind, DeliveryMode, DynSecretStore, PartyId, Phase, ReconciledStatus,
    RelationId, Resolution, ResolveOptions, SecretContent, SecretId,
};
use once_cell::sync::Lazy;
use tracing::debug;

use crate::config::HolderConfig;
use crate::events::{HolderEvent, HolderEventKind};

type Handler = fn(&mut HolderController, &HolderEvent);

// Event dispatch: one handler per event kind, initialized once for the
// process lifetime.
static HANDLERS: Lazy<BTreeMap<HolderEventKind, Handler>> = Lazy::new(|| {
    let mut table: BTreeMap<HolderEventKind, Handler> = BTreeMap::new();
    table.insert(HolderEventKind::Install, HolderController::on_install);
    table.insert(
        HolderEventKind::RelationChanged,
        HolderController::on_relation_changed,
    );
    table.insert(
        HolderEventKind::SecretChanged,
        HolderController::on_secret_changed,
    );
    table.insert(
        HolderEventKind::UpdateStatus,
        HolderController::on_update_status,
    );
    table.insert(
        HolderEventKind::UpgradeAction,
        HolderController::on_upgrade_action,
    );
    table.insert(
        HolderEventKind::RelationBroken,
        HolderController::on_relation_broken,
    );
    table
});

/// Holder-side protocol state machine.
///
/// Discovery binds a relation to a delivery mode exactly once; every later
/// status check consults the recorded binding instead of re-deriving it.
pub struct HolderController {
    party: PartyId,
    store: DynSecretStore,
    channel: Arc<RelationChannel>,
    config: HolderConfig,
    phase: Phase,
    mode: Option<DeliveryMode>,
    aliases: BTreeMap<RelationId, SecretId>,
    relation: Option<RelationId>,
    upgrade_requested: bool,
    status: ReconciledStatus,
}

impl HolderController {
    pub fn new(
        party: PartyId,
        store: DynSecretStore,
        channel: Arc<RelationChannel>,
        config: HolderConfig,
    ) -> Self {
        Self {
            party,
            store,
            channel,
            config,
            phase: Phase::WaitingForRelation,
            mode: None,
            aliases: BTreeMap::new(),
            relation: None,
            upgrade_requested: false,
            status: project(Phase::WaitingForRelation, None, false),
        }
    }

    pub fn party(&self) -> &PartyId {
        &self.party
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &ReconciledStatus {
        &self.status
    }

    pub fn mode(&self) -> Option<&DeliveryMode> {
        self.mode.as_ref()
    }

    /// The secret id bound to a relation at discovery time, if any.
    pub fn alias_for(&self, relation: &RelationId) -> Option<&SecretId> {
        self.aliases.get(relation)
    }

    /// Run the handler registered for the event's kind to completion.
    pub fn dispatch(&mut self, event: &HolderEvent) {
        debug!(party = %self.party, event = event.kind().as_str(), "holder event");
        if let Some(handler) = HANDLERS.get(&event.kind()) {
            handler(self, event);
        }
    }

    fn on_install(&mut self, _event: &HolderEvent) {
        self.phase = Phase::WaitingForRelation;
        self.mode = None;
        self.aliases.clear();
        self.relation = None;
        self.upgrade_requested = false;
        self.status = project(Phase::WaitingForRelation, None, false);
    }

    fn on_relation_changed(&mut self, event: &HolderEvent) {
        let HolderEvent::RelationChanged { relation } = event else {
            return;
        };
        self.relation = Some(relation.clone());
        self.discover(relation);
    }

    /// Attempt discovery for the relation. Idempotent: a bound alias short
    /// circuits straight into tracking, so redelivered or reordered
    /// notifications converge on the same state.
    fn discover(&mut self, relation: &RelationId) {
        match self.config.addressing {
            DeliveryKind::Indirect => {
                if let Some(id) = self.aliases.get(relation).cloned() {
                    self.mode = Some(DeliveryMode::Indirect { id });
                    self.phase = Phase::Tracking;
                    self.reconcile(false);
                    return;
                }

                self.phase = Phase::Discovering;
                let Some(raw) =
                    self.channel
                        .read_remote(Side::Consumer, relation, SECRET_ID_KEY)
                else {
                    self.status = project(
                        Phase::Discovering,
                        Some(&Resolution::Failed(format!(
                            "{SECRET_ID_KEY} not provided by relation"
                        ))),
                        false,
                    );
                    return;
                };

                let resolved = SecretId::parse(&raw).and_then(|id| {
                    self.store
                        .resolve(&self.party, &id, ResolveOptions::current())
                        .map(|_| id)
                });
                match resolved {
                    Ok(id) => {
                        debug!(party = %self.party, relation = %relation, secret = %id, "relation bound to secret");
                        self.aliases.insert(relation.clone(), id.clone());
                        self.mode = Some(DeliveryMode::Indirect { id });
                        self.phase = Phase::Tracking;
                        self.reconcile(false);
                    }
                    Err(err) => {
                        debug!(party = %self.party, relation = %relation, error = %err, "secret id resolution failed");
                        self.status = project(
                            Phase::Discovering,
                            Some(&Resolution::Failed(format!(
                                "relation-provided secret-id {raw} is invalid"
                            ))),
                            false,
                        );
                    }
                }
            }
            DeliveryKind::Direct => {
                self.phase = Phase::Discovering;
                for key in [USERNAME_KEY, PASSWORD_KEY] {
                    if self
                        .channel
                        .read_remote(Side::Consumer, relation, key)
                        .is_none()
                    {
                        self.status = project(
                            Phase::Discovering,
                            Some(&Resolution::Failed(format!(
                                "{key} not provided by relation"
                            ))),
                            false,
                        );
                        return;
                    }
                }
                self.mode = Some(DeliveryMode::Direct);
                self.phase = Phase::Tracking;
                self.reconcile(false);
            }
        }
    }

    fn on_secret_changed(&mut self, _event: &HolderEvent) {
        match (self.mode.clone(), self.relation.clone()) {
            (Some(DeliveryMode::Indirect { id }), _) => {
                match self
                    .store
                    .resolve(&self.party, &id, ResolveOptions::current())
                {
                    Ok(_) => self.reconcile(false),
                    Err(err) => {
                        debug!(party = %self.party, secret = %id, error = %err, "tracked secret became unresolvable");
                        self.status = project(
                            Phase::Tracking,
                            Some(&Resolution::Failed(format!(
                                "secret {id} can no longer be resolved"
                            ))),
                            false,
                        );
                    }
                }
            }
            (Some(DeliveryMode::Direct), _) => {
                debug!(party = %self.party, "store notification ignored in direct mode");
            }
            // The store notification raced ahead of the relation data one;
            // discovery handles both orders.
            (None, Some(relation)) => self.discover(&relation),
            (None, None) => {
                debug!(party = %self.party, "no relation yet; ignoring secret-changed");
            }
        }
    }

    fn on_update_status(&mut self, _event: &HolderEvent) {
        let update = std::mem::take(&mut self.upgrade_requested);
        self.reconcile(update);
    }

    fn on_upgrade_action(&mut self, event: &HolderEvent) {
        self.upgrade_requested = true;
        self.on_update_status(event);
    }

    fn on_relation_broken(&mut self, event: &HolderEvent) {
        let HolderEvent::RelationBroken { relation } = event else {
            return;
        };
        self.aliases.remove(relation);
        if self.relation.as_ref() == Some(relation) {
            self.relation = None;
            self.mode = None;
            self.phase = Phase::WaitingForRelation;
        }
        // A broken relation supersedes any earlier blocked state.
        self.status = project(Phase::WaitingForRelation, None, false);
    }

    /// Periodic reconciliation. `update` acknowledges the latest revision;
    /// ordinary passes observe drift without consuming it.
    fn reconcile(&mut self, update: bool) {
        let Some(mode) = self.mode.clone() else {
            self.status = project(Phase::WaitingForRelation, None, false);
            return;
        };
        match mode {
            DeliveryMode::Direct => {
                // Raw fields carry no revision number, so drift is never
                // observable in this mode.
                let summary = self.relation.as_ref().and_then(|relation| {
                    let username =
                        self.channel
                            .read_remote(Side::Consumer, relation, USERNAME_KEY)?;
                    let password =
                        self.channel
                            .read_remote(Side::Consumer, relation, PASSWORD_KEY)?;
                    Some(format!("{username}/{password}"))
                });
                self.status = match summary {
                    Some(summary) => {
                        self.phase = Phase::Tracking;
                        project(Phase::Tracking, Some(&Resolution::Ready(summary)), false)
                    }
                    None => project(Phase::WaitingForRelation, None, false),
                };
            }
            DeliveryMode::Indirect { id } => {
                let opts = ResolveOptions {
                    peek: false,
                    refresh: update,
                };
                let views = self.store.resolve(&self.party, &id, opts).and_then(|current| {
                    let pending = self
                        .store
                        .resolve(&self.party, &id, ResolveOptions::peek())?;
                    Ok((current, pending))
                });
                match views {
                    Ok((current, pending)) => {
                        let drift = pending.revision > current.revision;
                        self.phase = Phase::Tracking;
                        self.status = project(
                            Phase::Tracking,
                            Some(&Resolution::Ready(credentials_summary(&current.content))),
                            drift,
                        );
                    }
                    Err(err) => {
                        // Routine reconciliation treats a lost secret like a
                        // lost relation; discovery-time failures block instead.
                        debug!(party = %self.party, secret = %id, error = %err, "tracked secret no longer resolvable");
                        self.status = project(Phase::WaitingForRelation, None, false);
                    }
                }
            }
        }
    }
}

fn credentials_summary(content: &SecretContent) -> String {
    let username = content.get(USERNAME_KEY).map(String::as_str).unwrap_or("?");
    let password = content.get(PASSWORD_KEY).map(String::as_str).unwrap_or("?");
    format!("{username}/{password}")
}
