use std::path::Path;

use crate::cmd;
use crate::error::ActivationResult;
use crate::publish::{Artifact, ArtifactPublisher, build_failure};

/// Publish through Cloud Build: `gcloud builds submit --tag`.
///
/// The build runs remotely and the image lands in the registry in
/// the same step, so `push` only stamps the artifact.
pub struct CloudBuild {
    project: String,
}

impl CloudBuild {
    #[must_use]
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
        }
    }
}

impl ArtifactPublisher for CloudBuild {
    fn build(&self, source: &Path, image: &str) -> ActivationResult<()> {
        eprintln!("Submitting {image} to Cloud Build...");

        let source = source.to_string_lossy();
        cmd::run_streamed(
            "gcloud",
            &[
                "builds",
                "submit",
                "--tag",
                image,
                "--project",
                &self.project,
                "--quiet",
                &source,
            ],
        )
        .map_err(build_failure)
    }

    fn push(&self, image: &str) -> ActivationResult<Artifact> {
        // Already in the registry after submit.
        Ok(Artifact::new(image))
    }
}
