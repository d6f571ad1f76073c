//! Versioned, access-controlled storage for secrets.

use crate::errors::Result;
use crate::types::{
    PartyId, RelationId, RevisionView, RotationPolicy, Secret, SecretContent, SecretId,
};
use time::OffsetDateTime;

mod memory;

pub use memory::MemoryStore;

/// Options controlling how a reader resolves a secret revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Return the latest revision without advancing the reader's acknowledgment.
    pub peek: bool,
    /// Advance the reader's acknowledgment to the latest revision.
    pub refresh: bool,
}

impl ResolveOptions {
    /// The reader's last-acknowledged revision.
    pub const fn current() -> Self {
        Self {
            peek: false,
            refresh: false,
        }
    }

    /// The latest revision, without acknowledging it.
    pub const fn peek() -> Self {
        Self {
            peek: true,
            refresh: false,
        }
    }

    /// The latest revision, acknowledging it.
    pub const fn refresh() -> Self {
        Self {
            peek: false,
            refresh: true,
        }
    }
}

/// Versioned secret storage shared by owner and consumers.
///
/// Implementations must serialize `rotate` against concurrent
/// `resolve(refresh)` calls for the same secret so a refresh never observes a
/// half-written revision.
pub trait SecretStore: Send + Sync {
    /// Register a new secret under the owner's label with `revision = 0`.
    fn create(
        &self,
        owner: &PartyId,
        label: &str,
        content: SecretContent,
        rotation: RotationPolicy,
        expiry: Option<OffsetDateTime>,
    ) -> Result<Secret>;

    /// Append a new revision. Identity, label and policy are preserved; the
    /// revision number strictly increases and never resets.
    fn rotate(&self, owner: &PartyId, id: &SecretId, content: SecretContent) -> Result<Secret>;

    /// Latest metadata snapshot, access-checked.
    fn info(&self, reader: &PartyId, id: &SecretId) -> Result<Secret>;

    /// Resolve an owner's label to the secret it registered.
    fn lookup(&self, owner: &PartyId, label: &str) -> Result<SecretId>;

    /// Read a revision according to [`ResolveOptions`].
    fn resolve(&self, reader: &PartyId, id: &SecretId, opts: ResolveOptions)
        -> Result<RevisionView>;

    /// Grant the holder on the given relation access to the secret. Idempotent.
    fn grant(
        &self,
        owner: &PartyId,
        id: &SecretId,
        relation: &RelationId,
        holder: &PartyId,
    ) -> Result<()>;

    /// Withdraw a relation's grant. Revoking an absent grant is a no-op.
    fn revoke(&self, owner: &PartyId, id: &SecretId, relation: &RelationId) -> Result<()>;

    /// Remove one historical revision. Fails with `InUse` while any reader
    /// still acknowledges it, or when it is the newest revision.
    fn prune(&self, owner: &PartyId, id: &SecretId, revision: u64) -> Result<()>;

    /// Full teardown: drop every revision and acknowledgment, clear grants and
    /// free the label. The id stays registered so stale readers are answered
    /// with `AccessDenied` rather than `NotFound`.
    fn remove_all_revisions(&self, owner: &PartyId, id: &SecretId) -> Result<()>;
}

impl<T> SecretStore for Box<T>
where
    T: SecretStore + ?Sized,
{
    fn create(
        &self,
        owner: &PartyId,
        label: &str,
        content: SecretContent,
        rotation: RotationPolicy,
        expiry: Option<OffsetDateTime>,
    ) -> Result<Secret> {
        (**self).create(owner, label, content, rotation, expiry)
    }
    fn rotate(&self, owner: &PartyId, id: &SecretId, content: SecretContent) -> Result<Secret> {
        (**self).rotate(owner, id, content)
    }
    fn info(&self, reader: &PartyId, id: &SecretId) -> Result<Secret> {
        (**self).info(reader, id)
    }
    fn lookup(&self, owner: &PartyId, label: &str) -> Result<SecretId> {
        (**self).lookup(owner, label)
    }
    fn resolve(
        &self,
        reader: &PartyId,
        id: &SecretId,
        opts: ResolveOptions,
    ) -> Result<RevisionView> {
        (**self).resolve(reader, id, opts)
    }
    fn grant(
        &self,
        owner: &PartyId,
        id: &SecretId,
        relation: &RelationId,
        holder: &PartyId,
    ) -> Result<()> {
        (**self).grant(owner, id, relation, holder)
    }
    fn revoke(&self, owner: &PartyId, id: &SecretId, relation: &RelationId) -> Result<()> {
        (**self).revoke(owner, id, relation)
    }
    fn prune(&self, owner: &PartyId, id: &SecretId, revision: u64) -> Result<()> {
        (**self).prune(owner, id, revision)
    }
    fn remove_all_revisions(&self, owner: &PartyId, id: &SecretId) -> Result<()> {
        (**self).remove_all_revisions(owner, id)
    }
}

impl<T> SecretStore for std::sync::Arc<T>
where
    T: SecretStore + ?Sized,
{
    fn create(
        &self,
        owner: &PartyId,
        label: &str,
        content: SecretContent,
        rotation: RotationPolicy,
        expiry: Option<OffsetDateTime>,
    ) -> Result<Secret> {
        (**self).create(owner, label, content, rotation, expiry)
    }
    fn rotate(&self, owner: &PartyId, id: &SecretId, content: SecretContent) -> Result<Secret> {
        (**self).rotate(owner, id, content)
    }
    fn info(&self, reader: &PartyId, id: &SecretId) -> Result<Secret> {
        (**self).info(reader, id)
    }
    fn lookup(&self, owner: &PartyId, label: &str) -> Result<SecretId> {
        (**self).lookup(owner, label)
    }
    fn resolve(
        &self,
        reader: &PartyId,
        id: &SecretId,
        opts: ResolveOptions,
    ) -> Result<RevisionView> {
        (**self).resolve(reader, id, opts)
    }
    fn grant(
        &self,
        owner: &PartyId,
        id: &SecretId,
        relation: &RelationId,
        holder: &PartyId,
    ) -> Result<()> {
        (**self).grant(owner, id, relation, holder)
    }
    fn revoke(&self, owner: &PartyId, id: &SecretId, relation: &RelationId) -> Result<()> {
        (**self).revoke(owner, id, relation)
    }
    fn prune(&self, owner: &PartyId, id: &SecretId, revision: u64) -> Result<()> {
        (**self).prune(owner, id, revision)
    }
    fn remove_all_revisions(&self, owner: &PartyId, id: &SecretId) -> Result<()> {
        (**self).remove_all_revisions(owner, id)
    }
}
