use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{entity} not found")]
    NotFound { entity: String },
    #[error("access to secret {id} denied for {party}")]
    AccessDenied { id: String, party: String },
    #[error("{entity} already exists")]
    AlreadyExists { entity: String },
    #[error("revision {revision} is still referenced by a reader")]
    InUse { revision: u64 },
    #[error("relation data key `{key}` is missing or unparseable")]
    MalformedRelationData { key: String },
    #[error("{field} must not be empty")]
    EmptyComponent { field: &'static str },
    #[error("{field} contains invalid characters: {value}")]
    InvalidCharacters { field: &'static str, value: String },
    #[error("invalid secret id: {value}")]
    InvalidSecretId { value: String },
    #[error("unsupported rotation policy: {value}")]
    InvalidPolicy { value: String },
    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },
}
