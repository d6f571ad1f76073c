//! App-scoped relation data: the only shared medium between owner and consumer.
//!
//! Each side writes its own half of the record and reads the other side's
//! half. The underlying platform delivers change notifications at-least-once;
//! this module only models the synchronous key-value view each side observes.

use crate::errors::{Error, Result};
use crate::types::RelationId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[cfg(feature = "schema")]
use schemars::JsonSchema;

/// Relation data key carrying the secret identifier (indirect delivery).
/// Write-once for the lifetime of the relation.
pub const SECRET_ID_KEY: &str = "secret-id";
/// Relation data key carrying the raw username (direct delivery).
pub const USERNAME_KEY: &str = "username";
/// Relation data key carrying the raw password (direct delivery).
pub const PASSWORD_KEY: &str = "password";

/// Which half of the relation record a party owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Owner,
    Consumer,
}

impl Side {
    const fn other(self) -> Side {
        match self {
            Self::Owner => Self::Consumer,
            Self::Consumer => Self::Owner,
        }
    }
}

/// One relation's application data, both halves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct RelationRecord {
    pub relation_id: RelationId,
    pub owner_app_data: BTreeMap<String, String>,
    pub consumer_app_data: BTreeMap<String, String>,
}

impl RelationRecord {
    fn new(relation_id: RelationId) -> Self {
        Self {
            relation_id,
            owner_app_data: BTreeMap::new(),
            consumer_app_data: BTreeMap::new(),
        }
    }

    fn half(&self, side: Side) -> &BTreeMap<String, String> {
        match side {
            Side::Owner => &self.owner_app_data,
            Side::Consumer => &self.consumer_app_data,
        }
    }

    fn half_mut(&mut self, side: Side) -> &mut BTreeMap<String, String> {
        match side {
            Side::Owner => &mut self.owner_app_data,
            Side::Consumer => &mut self.consumer_app_data,
        }
    }
}

/// In-process relation channel shared between the two parties.
#[derive(Debug, Default)]
pub struct RelationChannel {
    inner: Mutex<HashMap<RelationId, RelationRecord>>,
}

impl RelationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish a relation. Idempotent.
    pub fn open(&self, relation: &RelationId) {
        let mut records = self.inner.lock().expect("relation channel lock");
        records
            .entry(relation.clone())
            .or_insert_with(|| RelationRecord::new(relation.clone()));
    }

    /// Destroy a relation and both halves of its data.
    pub fn close(&self, relation: &RelationId) {
        let mut records = self.inner.lock().expect("relation channel lock");
        records.remove(relation);
    }

    /// Write a key into the caller's own half of the relation data.
    pub fn put(
        &self,
        side: Side,
        relation: &RelationId,
        key: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        let mut records = self.inner.lock().expect("relation channel lock");
        let record = records.get_mut(relation).ok_or_else(|| Error::NotFound {
            entity: format!("relation {relation}"),
        })?;
        record.half_mut(side).insert(key.to_string(), value.into());
        Ok(())
    }

    /// Write a key that must never change once set. Re-writing the same value
    /// is a no-op; a conflicting rewrite fails with `AlreadyExists`.
    pub fn put_once(
        &self,
        side: Side,
        relation: &RelationId,
        key: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        let value = value.into();
        let mut records = self.inner.lock().expect("relation channel lock");
        let record = records.get_mut(relation).ok_or_else(|| Error::NotFound {
            entity: format!("relation {relation}"),
        })?;
        match record.half(side).get(key) {
            Some(existing) if existing != &value => Err(Error::AlreadyExists {
                entity: format!("relation data key `{key}`"),
            }),
            Some(_) => Ok(()),
            None => {
                record.half_mut(side).insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Read a key from the caller's own half.
    pub fn read_local(&self, side: Side, relation: &RelationId, key: &str) -> Option<String> {
        let records = self.inner.lock().expect("relation channel lock");
        records
            .get(relation)
            .and_then(|record| record.half(side).get(key).cloned())
    }

    /// Read a key written by the other side.
    pub fn read_remote(&self, side: Side, relation: &RelationId, key: &str) -> Option<String> {
        let records = self.inner.lock().expect("relation channel lock");
        records
            .get(relation)
            .and_then(|record| record.half(side.other()).get(key).cloned())
    }

    /// Snapshot of the full record, mainly for tests and diagnostics.
    pub fn record(&self, relation: &RelationId) -> Option<RelationRecord> {
        let records = self.inner.lock().expect("relation channel lock");
        records.get(relation).cloned()
    }
}
