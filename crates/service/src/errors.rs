use std::fmt;

use thiserror::Error;

/// Why a conditional write was refused by the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The file changed since it was read: someone else saved in between (HTTP 409).
    ChangedRemotely,
    /// The tag sent does not describe the file at all, e.g. a create over an
    /// existing file or a tag from an old read (HTTP 422).
    Stale,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::ChangedRemotely => f.write_str("the file was changed by someone else after it was read"),
            ConflictKind::Stale => f.write_str("the local copy of the file is out of date"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("authentication failed: {0}; update the access token in settings")]
    Auth(String),
    #[error("conflict on {path}: {kind}; reload and try again")]
    Conflict { path: String, kind: ConflictKind },
    #[error("{}", transport_message(.status, .message))]
    Transport { status: Option<u16>, message: String },
    #[error("cannot decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("git error: {0}")]
    Git(String),
}

fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("remote request failed with status {code}: {message}"),
        None => format!("remote request failed: {message}"),
    }
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(entity.to_string()) }

    pub fn storage(e: impl fmt::Display) -> Self { Self::Storage(e.to_string()) }

    pub fn is_conflict(&self) -> bool { matches!(self, Self::Conflict { .. }) }

    /// Short stable label, used for metrics and JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Auth(_) => "auth",
            Self::Conflict { kind: ConflictKind::ChangedRemotely, .. } => "conflict",
            Self::Conflict { kind: ConflictKind::Stale, .. } => "stale",
            Self::Transport { .. } => "transport",
            Self::Decode { .. } => "decode",
            Self::Storage(_) => "storage",
            Self::Git(_) => "git",
        }
    }
}
