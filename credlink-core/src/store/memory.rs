use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::errors::{Error, Result};
use crate::store::{ResolveOptions, SecretStore};
use crate::types::{
    PartyId, RelationId, RevisionView, RotationPolicy, Secret, SecretContent, SecretId, ViewTag,
};

#[derive(Debug)]
struct SecretEntry {
    id: SecretId,
    owner: PartyId,
    label: Option<String>,
    rotation: RotationPolicy,
    expiry: Option<OffsetDateTime>,
    revisions: BTreeMap<u64, SecretContent>,
    next_revision: u64,
    grants: BTreeMap<RelationId, PartyId>,
    acks: BTreeMap<PartyId, u64>,
}

impl SecretEntry {
    fn latest(&self) -> Option<u64> {
        self.revisions.keys().next_back().copied()
    }

    fn snapshot(&self, revision: u64) -> Secret {
        Secret {
            id: self.id.clone(),
            label: self.label.clone(),
            revision,
            rotation: self.rotation,
            expiry: self.expiry,
        }
    }

    fn check_read(&self, reader: &PartyId) -> Result<()> {
        if &self.owner == reader || self.grants.values().any(|holder| holder == reader) {
            return Ok(());
        }
        Err(Error::AccessDenied {
            id: self.id.to_string(),
            party: reader.to_string(),
        })
    }

    fn check_owner(&self, party: &PartyId) -> Result<()> {
        if &self.owner == party {
            return Ok(());
        }
        Err(Error::AccessDenied {
            id: self.id.to_string(),
            party: party.to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct StoreState {
    secrets: HashMap<SecretId, SecretEntry>,
    labels: HashMap<(PartyId, String), SecretId>,
}

impl StoreState {
    fn entry(&self, id: &SecretId) -> Result<&SecretEntry> {
        self.secrets.get(id).ok_or_else(|| Error::NotFound {
            entity: format!("secret {id}"),
        })
    }

    fn entry_mut(&mut self, id: &SecretId) -> Result<&mut SecretEntry> {
        self.secrets.get_mut(id).ok_or_else(|| Error::NotFound {
            entity: format!("secret {id}"),
        })
    }
}

/// In-memory [`SecretStore`]. The mutex serializes every operation, which also
/// satisfies the requirement that a refresh never observes a half-written
/// revision.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryStore {
    fn create(
        &self,
        owner: &PartyId,
        label: &str,
        content: SecretContent,
        rotation: RotationPolicy,
        expiry: Option<OffsetDateTime>,
    ) -> Result<Secret> {
        let mut state = self.inner.lock().expect("secret store lock");
        let key = (owner.clone(), label.to_string());
        if state.labels.contains_key(&key) {
            return Err(Error::AlreadyExists {
                entity: format!("secret labelled `{label}`"),
            });
        }

        let id = SecretId::generate();
        let mut revisions = BTreeMap::new();
        revisions.insert(0, content);
        let entry = SecretEntry {
            id: id.clone(),
            owner: owner.clone(),
            label: Some(label.to_string()),
            rotation,
            expiry,
            revisions,
            next_revision: 1,
            grants: BTreeMap::new(),
            acks: BTreeMap::new(),
        };
        let snapshot = entry.snapshot(0);
        state.labels.insert(key, id.clone());
        state.secrets.insert(id.clone(), entry);
        info!(owner = %owner, secret = %id, label = label, "secret created");
        Ok(snapshot)
    }

    fn rotate(&self, owner: &PartyId, id: &SecretId, content: SecretContent) -> Result<Secret> {
        let mut state = self.inner.lock().expect("secret store lock");
        let entry = state.entry_mut(id)?;
        entry.check_owner(owner)?;

        let revision = entry.next_revision;
        entry.revisions.insert(revision, content);
        entry.next_revision += 1;
        debug!(owner = %owner, secret = %id, revision = revision, "revision appended");
        Ok(entry.snapshot(revision))
    }

    fn info(&self, reader: &PartyId, id: &SecretId) -> Result<Secret> {
        let state = self.inner.lock().expect("secret store lock");
        let entry = state.entry(id)?;
        entry.check_read(reader)?;
        let latest = entry.latest().ok_or_else(|| Error::NotFound {
            entity: format!("revisions of secret {id}"),
        })?;
        Ok(entry.snapshot(latest))
    }

    fn lookup(&self, owner: &PartyId, label: &str) -> Result<SecretId> {
        let state = self.inner.lock().expect("secret store lock");
        state
            .labels
            .get(&(owner.clone(), label.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                entity: format!("secret labelled `{label}`"),
            })
    }

    fn resolve(
        &self,
        reader: &PartyId,
        id: &SecretId,
        opts: ResolveOptions,
    ) -> Result<RevisionView> {
        let mut state = self.inner.lock().expect("secret store lock");
        let entry = state.entry_mut(id)?;
        entry.check_read(reader)?;
        let latest = entry.latest().ok_or_else(|| Error::NotFound {
            entity: format!("revisions of secret {id}"),
        })?;

        if opts.peek {
            let content = entry.revisions[&latest].clone();
            return Ok(RevisionView {
                revision: latest,
                content,
                tag: ViewTag::Pending,
            });
        }

        // A reader's first resolve pins its acknowledgment to the then-latest
        // revision; afterwards only refresh moves it.
        let revision = if opts.refresh {
            entry.acks.insert(reader.clone(), latest);
            latest
        } else {
            *entry.acks.entry(reader.clone()).or_insert(latest)
        };

        let content = entry
            .revisions
            .get(&revision)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                entity: format!("revision {revision} of secret {id}"),
            })?;
        Ok(RevisionView {
            revision,
            content,
            tag: ViewTag::Current,
        })
    }

    fn grant(
        &self,
        owner: &PartyId,
        id: &SecretId,
        relation: &RelationId,
        holder: &PartyId,
    ) -> Result<()> {
        let mut state = self.inner.lock().expect("secret store lock");
        let entry = state.entry_mut(id)?;
        entry.check_owner(owner)?;
        entry.grants.insert(relation.clone(), holder.clone());
        info!(secret = %id, relation = %relation, holder = %holder, "grant recorded");
        Ok(())
    }

    fn revoke(&self, owner: &PartyId, id: &SecretId, relation: &RelationId) -> Result<()> {
        let mut state = self.inner.lock().expect("secret store lock");
        let entry = state.entry_mut(id)?;
        entry.check_owner(owner)?;
        if entry.grants.remove(relation).is_some() {
            info!(secret = %id, relation = %relation, "grant revoked");
        }
        Ok(())
    }

    fn prune(&self, owner: &PartyId, id: &SecretId, revision: u64) -> Result<()> {
        let mut state = self.inner.lock().expect("secret store lock");
        let entry = state.entry_mut(id)?;
        entry.check_owner(owner)?;
        if !entry.revisions.contains_key(&revision) {
            return Err(Error::NotFound {
                entity: format!("revision {revision} of secret {id}"),
            });
        }
        let newest = entry.latest() == Some(revision);
        if newest || entry.acks.values().any(|acked| *acked == revision) {
            return Err(Error::InUse { revision });
        }
        entry.revisions.remove(&revision);
        debug!(secret = %id, revision = revision, "revision pruned");
        Ok(())
    }

    fn remove_all_revisions(&self, owner: &PartyId, id: &SecretId) -> Result<()> {
        let mut state = self.inner.lock().expect("secret store lock");
        let entry = state.entry_mut(id)?;
        entry.check_owner(owner)?;
        entry.revisions.clear();
        entry.acks.clear();
        entry.grants.clear();
        let label = entry.label.take();
        if let Some(label) = label {
            state.labels.remove(&(owner.clone(), label));
        }
        info!(owner = %owner, secret = %id, "secret torn down");
        Ok(())
    }
}
