pub mod cloud_run;
pub mod fly;

use crate::error::ActivationResult;
use crate::publish::Artifact;
use crate::target::{DeploymentTarget, ServiceSpec};

/// A running revision's public address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Base URL serving traffic.
    pub url: String,
    /// Platform identifier of the revision behind the URL.
    pub revision: String,
}

/// A platform turns artifacts into running revisions and reports
/// the endpoint they serve on.
pub trait Platform {
    /// Create a revision running `artifact` and wait until the
    /// platform reports it ready, bounded by
    /// [`ServiceSpec::ready_wait_secs`]. A revision that was
    /// created stays up even when a later stage of the run fails.
    fn deploy(
        &self,
        artifact: &Artifact,
        target: &DeploymentTarget,
        spec: &ServiceSpec,
    ) -> ActivationResult<ServiceEndpoint>;

    /// Look up the endpoint currently serving the target.
    fn describe(&self, target: &DeploymentTarget) -> ActivationResult<ServiceEndpoint>;
}
