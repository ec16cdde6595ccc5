use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::ActivationError;
use crate::health::{HealthVerifier, HttpProbe, Probe};
use crate::lock::ActivationLock;
use crate::platform::{Platform, ServiceEndpoint};
use crate::publish::{Artifact, ArtifactPublisher};
use crate::target::{DeploymentTarget, ServiceSpec};
use crate::webhook::WebhookProvider;
use crate::webhook::cutover::{Cutover, CutoverReport};

/// Stages of an activation run, in execution order. Each failure
/// is pinned to the stage it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Building,
    Publishing,
    Deploying,
    Verifying,
    CuttingOver,
}

impl Stage {
    /// Operator-facing stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Publishing => "publishing",
            Self::Deploying => "deploying",
            Self::Verifying => "verifying",
            Self::CuttingOver => "cutting over",
        }
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Succeeded,
    Failed,
    /// The cutover failed and the previous webhook registration
    /// was restored.
    RolledBack,
}

/// What a run ended with, successful or not.
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub status: WorkflowStatus,
    /// Stage the run failed in; `None` for success and for
    /// failures before the first stage (config, lock).
    pub failed_stage: Option<Stage>,
    /// Endpoint of the new revision, when one was deployed.
    pub endpoint: Option<ServiceEndpoint>,
    pub error: Option<ActivationError>,
    /// Webhook URL believed registered after the run: the new URL
    /// on success, the surviving one after a failure or rollback.
    pub last_good_webhook: Option<String>,
}

impl WorkflowOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, WorkflowStatus::Succeeded)
    }

    fn succeeded(endpoint: ServiceEndpoint, webhook: String) -> Self {
        Self {
            status: WorkflowStatus::Succeeded,
            failed_stage: None,
            endpoint: Some(endpoint),
            error: None,
            last_good_webhook: Some(webhook),
        }
    }

    fn planned() -> Self {
        Self {
            status: WorkflowStatus::Succeeded,
            failed_stage: None,
            endpoint: None,
            error: None,
            last_good_webhook: None,
        }
    }

    fn aborted(error: ActivationError) -> Self {
        Self {
            status: WorkflowStatus::Failed,
            failed_stage: None,
            endpoint: None,
            error: Some(error),
            last_good_webhook: None,
        }
    }

    fn failed(
        stage: Stage,
        error: ActivationError,
        endpoint: Option<ServiceEndpoint>,
        last_good_webhook: Option<String>,
    ) -> Self {
        Self {
            status: WorkflowStatus::Failed,
            failed_stage: Some(stage),
            endpoint,
            error: Some(error),
            last_good_webhook,
        }
    }
}

/// Sequences publish, deploy, verify, and webhook cutover with
/// the failure rules that keep the registration pointing at a
/// verified endpoint.
///
/// Stages run strictly in order and any failure ends the run. A
/// revision that was deployed stays up; only a confirmed cutover
/// routes updates to it.
pub struct Workflow {
    target: DeploymentTarget,
    spec: ServiceSpec,
    image: String,
    source: PathBuf,
    publisher: Option<Box<dyn ArtifactPublisher>>,
    platform: Option<Box<dyn Platform>>,
    verifier: HealthVerifier,
    probe: Option<Box<dyn Probe>>,
    cutover: Cutover,
    provider: Option<Box<dyn WebhookProvider>>,
    lock_dir: PathBuf,
    deadline: Option<Instant>,
    skip_build: bool,
    dry_run: bool,
}

impl Workflow {
    #[must_use]
    pub fn new(target: DeploymentTarget, spec: ServiceSpec) -> Self {
        Self {
            target,
            spec,
            image: String::new(),
            source: PathBuf::from("."),
            publisher: None,
            platform: None,
            verifier: HealthVerifier::new("/healthz"),
            probe: None,
            cutover: Cutover::new("/webhook/telegram"),
            provider: None,
            lock_dir: std::env::temp_dir(),
            deadline: None,
            skip_build: false,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    /// Source directory handed to the publisher.
    #[must_use]
    pub fn source(mut self, source: &Path) -> Self {
        self.source = source.to_path_buf();
        self
    }

    #[must_use]
    pub fn publisher(mut self, publisher: impl ArtifactPublisher + 'static) -> Self {
        self.publisher = Some(Box::new(publisher));
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: impl Platform + 'static) -> Self {
        self.platform = Some(Box::new(platform));
        self
    }

    #[must_use]
    pub fn verifier(mut self, verifier: HealthVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Probe used during verification. Defaults to a plain HTTP GET.
    #[must_use]
    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    #[must_use]
    pub fn cutover(mut self, cutover: Cutover) -> Self {
        self.cutover = cutover;
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: impl WebhookProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Directory the activation lock file lives in.
    #[must_use]
    pub fn lock_dir(mut self, dir: &Path) -> Self {
        self.lock_dir = dir.to_path_buf();
        self
    }

    /// Hard stop for the verification stage. Probing gives up at
    /// the deadline even with attempts left in the budget.
    #[must_use]
    pub const fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Reuse the already-published image, skipping build and push.
    #[must_use]
    pub const fn skip_build(mut self, skip: bool) -> Self {
        self.skip_build = skip;
        self
    }

    /// Print the plan without executing anything.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the activation end to end and report how it went. The
    /// outcome is always returned, never panicked out of; the
    /// caller decides what a failure is worth.
    #[must_use]
    pub fn run(&self) -> WorkflowOutcome {
        if self.image.is_empty() {
            return WorkflowOutcome::aborted(ActivationError::InvalidConfig(
                "no image configured".to_string(),
            ));
        }

        if self.dry_run {
            self.print_plan();
            return WorkflowOutcome::planned();
        }

        let Some(platform) = self.platform.as_deref() else {
            return WorkflowOutcome::aborted(ActivationError::Other(
                "no platform configured".to_string(),
            ));
        };
        let Some(provider) = self.provider.as_deref() else {
            return WorkflowOutcome::aborted(ActivationError::Other(
                "no webhook provider configured".to_string(),
            ));
        };

        // One run at a time per target; the registration is an
        // exclusive resource.
        let _lock = match ActivationLock::acquire_in(&self.lock_dir, &self.target) {
            Ok(lock) => lock,
            Err(e) => return WorkflowOutcome::aborted(e),
        };

        let artifact = match self.stage_artifact() {
            Ok(artifact) => artifact,
            Err((stage, e)) => {
                return WorkflowOutcome::failed(stage, e, None, self.last_known_webhook());
            }
        };

        let endpoint = match platform.deploy(&artifact, &self.target, &self.spec) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                return WorkflowOutcome::failed(
                    Stage::Deploying,
                    e,
                    None,
                    self.last_known_webhook(),
                );
            }
        };

        let probe = self.probe.as_deref().unwrap_or(&HttpProbe);
        let report = self.verifier.verify_with(probe, &endpoint, self.deadline);
        if let Err(e) = report.require_healthy() {
            // The new revision stays up, but no updates are routed
            // to it: the registration is untouched.
            return WorkflowOutcome::failed(
                Stage::Verifying,
                e,
                Some(endpoint),
                self.last_known_webhook(),
            );
        }

        match self.cutover.execute(provider, &endpoint) {
            Ok(cut) => {
                self.print_summary(&endpoint, &cut);
                let webhook = cut.registration.url;
                WorkflowOutcome::succeeded(endpoint, webhook)
            }
            Err(e) if e.requires_manual_intervention() => WorkflowOutcome {
                status: WorkflowStatus::Failed,
                failed_stage: Some(Stage::CuttingOver),
                endpoint: Some(endpoint),
                error: Some(e),
                last_good_webhook: None,
            },
            Err(e) => WorkflowOutcome {
                status: WorkflowStatus::RolledBack,
                failed_stage: Some(Stage::CuttingOver),
                endpoint: Some(endpoint),
                error: Some(e),
                last_good_webhook: self.last_known_webhook(),
            },
        }
    }

    fn stage_artifact(&self) -> Result<Artifact, (Stage, ActivationError)> {
        if self.skip_build {
            eprintln!("Skipping build, reusing {}", self.image);
            return Ok(Artifact::new(&self.image));
        }

        let Some(publisher) = self.publisher.as_deref() else {
            return Err((
                Stage::Building,
                ActivationError::Other("no publisher configured".to_string()),
            ));
        };

        publisher
            .build(&self.source, &self.image)
            .map_err(|e| (Stage::Building, e))?;
        publisher
            .push(&self.image)
            .map_err(|e| (Stage::Publishing, e))
    }

    fn last_known_webhook(&self) -> Option<String> {
        self.provider
            .as_deref()
            .and_then(|p| p.info().ok())
            .map(|registration| registration.url)
            .filter(|url| !url.is_empty())
    }

    fn print_plan(&self) {
        eprintln!("=== Dry run: no changes will be made ===");
        eprintln!();
        eprintln!(
            "Target: service '{}' in {} (project {})",
            self.target.service, self.target.region, self.target.project
        );
        eprintln!("Image:  {}", self.image);
        eprintln!();

        eprintln!("--- Actions that would be performed ---");
        let mut steps = Vec::new();
        if self.skip_build {
            steps.push(format!("Reuse published image {}", self.image));
        } else {
            steps.push(format!(
                "Build {} from {}",
                self.image,
                self.source.display()
            ));
            steps.push("Push the image to the registry".to_string());
        }
        steps.push(format!(
            "Deploy to '{}' and wait up to {}s for a ready revision",
            self.target.service, self.spec.ready_wait_secs
        ));
        steps.push(format!(
            "Probe {} until healthy ({} attempts max)",
            self.verifier.probe_path, self.verifier.max_attempts
        ));
        steps.push(format!(
            "Cut the webhook over to {}, then confirm by read-back",
            self.cutover.webhook_path
        ));
        for (i, step) in steps.iter().enumerate() {
            eprintln!("{}. {step}", i + 1);
        }
    }

    fn print_summary(&self, endpoint: &ServiceEndpoint, cut: &CutoverReport) {
        eprintln!();
        eprintln!("========================================");
        eprintln!("Activation complete!");
        eprintln!("========================================");
        eprintln!(
            "Service:  {} ({})",
            self.target.service, self.target.region
        );
        eprintln!("Revision: {}", endpoint.revision);
        eprintln!("Endpoint: {}", endpoint.url);
        eprintln!("Webhook:  {}", cut.registration.url);
        if let Some(previous) = &cut.registration.previous {
            eprintln!("Replaced: {previous}");
        }
        if cut.pending_dropped > 0 {
            eprintln!("Dropped:  {} pending update(s)", cut.pending_dropped);
        }
    }
}
