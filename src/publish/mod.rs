pub mod cloud_build;
pub mod docker;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ActivationError, ActivationResult};

/// A built image that the platform can pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Fully-qualified image reference, repository plus tag.
    pub image: String,
    /// Unix timestamp recorded when the publish finished.
    pub built_at: u64,
}

impl Artifact {
    #[must_use]
    pub fn new(image: &str) -> Self {
        Self {
            image: image.to_string(),
            built_at: unix_now(),
        }
    }
}

/// A publisher turns a source tree into an image the platform can
/// pull: build, then push to the registry.
pub trait ArtifactPublisher {
    /// Build the image from a source directory.
    fn build(&self, source: &Path, image: &str) -> ActivationResult<()>;

    /// Push the built image and return the published artifact.
    fn push(&self, image: &str) -> ActivationResult<Artifact>;
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn build_failure(e: ActivationError) -> ActivationError {
    match e {
        ActivationError::CommandFailed {
            command, status, ..
        } => ActivationError::BuildFailed(format!("{command} ({status})")),
        other => other,
    }
}

fn push_failure(e: ActivationError) -> ActivationError {
    match e {
        ActivationError::CommandFailed {
            command, status, ..
        } => ActivationError::PushFailed(format!("{command} ({status})")),
        other => other,
    }
}
