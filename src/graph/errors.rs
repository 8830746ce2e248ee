use thiserror::Error;

/// Error kinds for the remote drive subsystem.
///
/// `NotFound` and `Conflict` are expected control-flow signals inside the
/// folder walk; everything else propagates to the caller.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("token acquisition failed: {0}")]
    Auth(String),

    #[error("drive item not found: drive {drive_id}, {target}")]
    NotFound { drive_id: String, target: String },

    #[error("folder name conflict: drive {drive_id}, '{name}' under '{parent_path}'")]
    Conflict {
        drive_id: String,
        parent_path: String,
        name: String,
    },

    #[error("transient remote failure: {0}")]
    Transient(String),

    #[error("remote API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("folder exists but no web URL could be resolved for '{path}'")]
    UnresolvableReference { path: String },

    #[error("invalid request URL: {0}")]
    BadUrl(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl GraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, GraphError::Conflict { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, GraphError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
