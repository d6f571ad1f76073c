use credlink_core::{DeliveryKind, Error, Result, RotationPolicy};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Operator-facing configuration consumed by the owner controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OwnerConfig {
    /// Grant the relation access at publish time. When false the identity is
    /// still published but nothing can be read until a grant is issued.
    pub grant: bool,
    /// Rotation reminder policy stamped onto the secret at creation.
    pub rotate: RotationPolicy,
    /// Optional RFC-3339 expiry timestamp.
    pub expire: Option<String>,
    /// Whether the relation carries the secret id or the raw fields.
    pub delivery: DeliveryKind,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            grant: true,
            rotate: RotationPolicy::Never,
            expire: None,
            delivery: DeliveryKind::Indirect,
        }
    }
}

impl OwnerConfig {
    /// Parse the configured expiry timestamp, if any.
    pub fn expiry(&self) -> Result<Option<OffsetDateTime>> {
        match self.expire.as_deref() {
            None => Ok(None),
            Some(raw) => OffsetDateTime::parse(raw, &Rfc3339)
                .map(Some)
                .map_err(|_| Error::InvalidTimestamp {
                    value: raw.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_grant_and_never_rotate() {
        let config = OwnerConfig::default();
        assert!(config.grant);
        assert_eq!(config.rotate, RotationPolicy::Never);
        assert_eq!(config.delivery, DeliveryKind::Indirect);
        assert_eq!(config.expiry().expect("no expiry"), None);
    }

    #[test]
    fn deserializes_from_partial_json() {
        let config: OwnerConfig = serde_json::from_str(
            r#"{ "grant": false, "rotate": "daily", "expire": "2026-09-01T00:00:00Z" }"#,
        )
        .expect("config json");
        assert!(!config.grant);
        assert_eq!(config.rotate, RotationPolicy::Daily);
        assert!(config.expiry().expect("parse").is_some());
    }

    #[test]
    fn rejects_malformed_expiry() {
        let config = OwnerConfig {
            expire: Some("next tuesday".into()),
            ..OwnerConfig::default()
        };
        assert!(matches!(
            config.expiry(),
            Err(Error::InvalidTimestamp { .. })
        ));
    }
}
