use std::process::ExitStatus;

pub type ActivationResult<T> = Result<T, ActivationError>;

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("publish failed: {0}")]
    PushFailed(String),

    #[error("platform rejected the deployment: {0}")]
    DeployRejected(String),

    #[error("service '{service}' had no ready revision after {waited_secs}s")]
    DeployTimeout { service: String, waited_secs: u64 },

    #[error(
        "endpoint never became healthy after {attempts} attempts (last status: {})",
        .last_status.map_or_else(|| "no response".to_string(), |code| code.to_string())
    )]
    VerificationFailed {
        attempts: u32,
        last_status: Option<u16>,
    },

    #[error("webhook cutover failed: {0}")]
    CutoverFailed(String),

    #[error(
        "cutover rollback failed: {reason}; webhook may be unset or point at \
         '{attempted}', last known good URL was '{previous}'"
    )]
    RollbackFailed {
        attempted: String,
        previous: String,
        reason: String,
    },

    #[error("another activation holds the lock for '{key}' ({holder})")]
    LockHeld { key: String, holder: String },

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("command failed: {command} ({status})")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("environment variable missing: {0}")]
    EnvMissing(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl ActivationError {
    /// True when the webhook registration can no longer be trusted
    /// and an operator has to inspect it by hand.
    #[must_use]
    pub const fn requires_manual_intervention(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}
