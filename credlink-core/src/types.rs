use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg(feature = "schema")]
use schemars::JsonSchema;

/// Validates that the provided value is non-empty and contains only supported characters.
pub(crate) fn validate_component(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::EmptyComponent { field });
    }

    if !value
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(Error::InvalidCharacters {
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}

/// Identity of one party (application) participating in the protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct PartyId(String);

impl PartyId {
    /// Construct a validated party identifier.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_component(&value, "party id")?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one relation instance between an owner and a consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct RelationId(String);

impl RelationId {
    /// Construct a validated relation identifier.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_component(&value, "relation id")?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a secret. Never derived from the secret's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct SecretId(String);

const SECRET_ID_PREFIX: &str = "secret:";

impl SecretId {
    /// Allocate a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("{SECRET_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Parse an identifier received over the relation channel.
    pub fn parse(value: &str) -> Result<Self> {
        let rest = value
            .strip_prefix(SECRET_ID_PREFIX)
            .ok_or_else(|| Error::InvalidSecretId {
                value: value.to_string(),
            })?;
        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidSecretId {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rotation reminder policy stamped onto a secret at creation time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub enum RotationPolicy {
    #[default]
    Never,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RotationPolicy {
    /// Stable string representation used for configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "never" => Ok(Self::Never),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(Error::InvalidPolicy {
                value: other.to_string(),
            }),
        }
    }
}

/// Content of one secret revision.
pub type SecretContent = BTreeMap<String, String>;

/// Metadata snapshot of a secret. Content is only reachable through `resolve`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Secret {
    pub id: SecretId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub revision: u64,
    pub rotation: RotationPolicy,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    #[cfg_attr(feature = "schema", schemars(with = "Option<String>"))]
    pub expiry: Option<OffsetDateTime>,
}

/// Whether a view reflects the reader's acknowledged revision or the latest upstream one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub enum ViewTag {
    Current,
    Pending,
}

/// A read of one secret revision.
///
/// Invariant: for the same reader and secret, a `Pending` view never carries a
/// lower revision than a `Current` view taken in the same pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct RevisionView {
    pub revision: u64,
    pub content: SecretContent,
    pub tag: ViewTag,
}

/// How credentials travel over the relation: by identifier, or as raw fields.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub enum DeliveryKind {
    #[default]
    Indirect,
    Direct,
}

impl DeliveryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Indirect => "indirect",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for DeliveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery mode resolved at discovery time and kept for the relation's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    /// The relation carries a secret identifier resolved against the store.
    Indirect { id: SecretId },
    /// The relation carries the raw credential fields themselves.
    Direct,
}
