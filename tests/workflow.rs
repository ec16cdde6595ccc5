use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use estafeta::error::{ActivationError, ActivationResult};
use estafeta::health::{HealthVerifier, Probe};
use estafeta::platform::Platform;
use estafeta::publish::{Artifact, ArtifactPublisher};
use estafeta::webhook::{WebhookProvider, WebhookRegistration};
use estafeta::{
    ActivationLock, Cutover, DeploymentTarget, ServiceEndpoint, ServiceSpec, Stage, Workflow,
    WorkflowStatus,
};

const IMAGE: &str = "gcr.io/acme/selina:latest";
const ENDPOINT_URL: &str = "https://svc.example";
const OLD_WEBHOOK: &str = "https://old.example/webhook/telegram";
const NEW_WEBHOOK: &str = "https://svc.example/webhook/telegram";

type Log = Rc<RefCell<Vec<String>>>;

fn endpoint() -> ServiceEndpoint {
    ServiceEndpoint {
        url: ENDPOINT_URL.to_string(),
        revision: "rev-7".to_string(),
    }
}

struct FakePublisher {
    log: Log,
    fail_build: bool,
    fail_push: bool,
}

impl ArtifactPublisher for FakePublisher {
    fn build(&self, _source: &Path, image: &str) -> ActivationResult<()> {
        self.log.borrow_mut().push(format!("build {image}"));
        if self.fail_build {
            return Err(ActivationError::BuildFailed(
                "docker build (exit status: 1)".to_string(),
            ));
        }
        Ok(())
    }

    fn push(&self, image: &str) -> ActivationResult<Artifact> {
        self.log.borrow_mut().push(format!("push {image}"));
        if self.fail_push {
            return Err(ActivationError::PushFailed(
                "docker push (exit status: 1)".to_string(),
            ));
        }
        Ok(Artifact::new(image))
    }
}

struct FakePlatform {
    log: Log,
    fail: bool,
}

impl Platform for FakePlatform {
    fn deploy(
        &self,
        artifact: &Artifact,
        target: &DeploymentTarget,
        _spec: &ServiceSpec,
    ) -> ActivationResult<ServiceEndpoint> {
        self.log
            .borrow_mut()
            .push(format!("deploy {} to {}", artifact.image, target.service));
        if self.fail {
            return Err(ActivationError::DeployRejected(
                "revision failed to start".to_string(),
            ));
        }
        Ok(endpoint())
    }

    fn describe(&self, _target: &DeploymentTarget) -> ActivationResult<ServiceEndpoint> {
        self.log.borrow_mut().push("describe".to_string());
        Ok(endpoint())
    }
}

struct FakeProbe {
    log: Log,
    status: u16,
}

impl Probe for FakeProbe {
    fn status(&self, _url: &str, _timeout: Duration) -> ActivationResult<u16> {
        self.log.borrow_mut().push("probe".to_string());
        Ok(self.status)
    }
}

struct FakeProvider {
    log: Log,
    url: Rc<RefCell<String>>,
    fail_register_urls: Vec<String>,
}

impl WebhookProvider for FakeProvider {
    fn info(&self) -> ActivationResult<WebhookRegistration> {
        self.log.borrow_mut().push("info".to_string());
        Ok(WebhookRegistration {
            url: self.url.borrow().clone(),
            previous: None,
            allowed_updates: Vec::new(),
            pending: 0,
        })
    }

    fn register(
        &self,
        url: &str,
        _allowed_updates: &[String],
        _drop_pending: bool,
    ) -> ActivationResult<()> {
        self.log.borrow_mut().push(format!("register {url}"));
        if self.fail_register_urls.iter().any(|u| u == url) {
            return Err(ActivationError::CutoverFailed("setWebhook: boom".to_string()));
        }
        *self.url.borrow_mut() = url.to_string();
        Ok(())
    }

    fn deregister(&self) -> ActivationResult<()> {
        self.log.borrow_mut().push("deregister".to_string());
        self.url.borrow_mut().clear();
        Ok(())
    }
}

/// One shared call log plus the provider's registration state,
/// handed out to every fake so a test can inspect the whole run
/// after the workflow consumed them.
struct Rig {
    log: Log,
    webhook: Rc<RefCell<String>>,
}

impl Rig {
    fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            webhook: Rc::new(RefCell::new(OLD_WEBHOOK.to_string())),
        }
    }

    fn publisher(&self) -> FakePublisher {
        FakePublisher {
            log: Rc::clone(&self.log),
            fail_build: false,
            fail_push: false,
        }
    }

    fn publisher_failing_build(&self) -> FakePublisher {
        FakePublisher {
            log: Rc::clone(&self.log),
            fail_build: true,
            fail_push: false,
        }
    }

    fn publisher_failing_push(&self) -> FakePublisher {
        FakePublisher {
            log: Rc::clone(&self.log),
            fail_build: false,
            fail_push: true,
        }
    }

    fn platform(&self) -> FakePlatform {
        FakePlatform {
            log: Rc::clone(&self.log),
            fail: false,
        }
    }

    fn failing_platform(&self) -> FakePlatform {
        FakePlatform {
            log: Rc::clone(&self.log),
            fail: true,
        }
    }

    fn probe(&self, status: u16) -> FakeProbe {
        FakeProbe {
            log: Rc::clone(&self.log),
            status,
        }
    }

    fn provider(&self) -> FakeProvider {
        FakeProvider {
            log: Rc::clone(&self.log),
            url: Rc::clone(&self.webhook),
            fail_register_urls: Vec::new(),
        }
    }

    fn provider_failing_register(&self, urls: &[&str]) -> FakeProvider {
        FakeProvider {
            log: Rc::clone(&self.log),
            url: Rc::clone(&self.webhook),
            fail_register_urls: urls.iter().map(ToString::to_string).collect(),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn webhook_url(&self) -> String {
        self.webhook.borrow().clone()
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let dir = std::env::temp_dir().join(format!(
        "estafeta-workflow-{name}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn workflow(service: &str) -> Workflow {
    Workflow::new(
        DeploymentTarget::new("acme-prod", "europe-west1", service),
        ServiceSpec::new(),
    )
    .image(IMAGE)
    .lock_dir(&scratch_dir(service))
    .verifier(HealthVerifier::new("/healthz").interval(Duration::ZERO))
    .cutover(Cutover::new("/webhook/telegram").step_retry(1, Duration::ZERO))
}

#[test]
fn full_run_succeeds_and_reports_the_new_webhook() {
    let rig = Rig::new();

    let outcome = workflow("svc-full")
        .publisher(rig.publisher())
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .run();

    assert!(outcome.is_success());
    assert_eq!(outcome.status, WorkflowStatus::Succeeded);
    assert!(outcome.failed_stage.is_none());
    assert!(outcome.error.is_none());
    assert_eq!(outcome.endpoint, Some(endpoint()));
    assert_eq!(outcome.last_good_webhook.as_deref(), Some(NEW_WEBHOOK));
    assert_eq!(rig.webhook_url(), NEW_WEBHOOK);
    assert_eq!(
        rig.calls(),
        vec![
            format!("build {IMAGE}"),
            format!("push {IMAGE}"),
            format!("deploy {IMAGE} to svc-full"),
            "probe".to_string(),
            "info".to_string(),
            "deregister".to_string(),
            format!("register {NEW_WEBHOOK}"),
            "info".to_string(),
        ]
    );
}

#[test]
fn build_failure_is_pinned_to_the_building_stage() {
    let rig = Rig::new();

    let outcome = workflow("svc-build-fail")
        .publisher(rig.publisher_failing_build())
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .run();

    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert_eq!(outcome.failed_stage, Some(Stage::Building));
    assert!(outcome.endpoint.is_none());
    assert!(matches!(outcome.error, Some(ActivationError::BuildFailed(_))));
    assert_eq!(outcome.last_good_webhook.as_deref(), Some(OLD_WEBHOOK));
    assert!(!rig.calls().iter().any(|c| c.starts_with("deploy")));
}

#[test]
fn push_failure_is_pinned_to_the_publishing_stage() {
    let rig = Rig::new();

    let outcome = workflow("svc-push-fail")
        .publisher(rig.publisher_failing_push())
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .run();

    assert_eq!(outcome.failed_stage, Some(Stage::Publishing));
    assert!(matches!(outcome.error, Some(ActivationError::PushFailed(_))));
    assert!(!rig.calls().iter().any(|c| c.starts_with("deploy")));
}

#[test]
fn deploy_failure_stops_before_verification() {
    let rig = Rig::new();

    let outcome = workflow("svc-deploy-fail")
        .publisher(rig.publisher())
        .platform(rig.failing_platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .run();

    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert_eq!(outcome.failed_stage, Some(Stage::Deploying));
    assert!(outcome.endpoint.is_none());
    assert!(matches!(
        outcome.error,
        Some(ActivationError::DeployRejected(_))
    ));
    assert_eq!(rig.webhook_url(), OLD_WEBHOOK);
    assert!(!rig.calls().iter().any(|c| c == "probe"));
}

#[test]
fn verification_failure_keeps_the_registration_untouched() {
    let rig = Rig::new();

    let outcome = workflow("svc-unhealthy")
        .publisher(rig.publisher())
        .platform(rig.platform())
        .probe(rig.probe(503))
        .verifier(
            HealthVerifier::new("/healthz")
                .max_attempts(2)
                .interval(Duration::ZERO),
        )
        .provider(rig.provider())
        .run();

    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert_eq!(outcome.failed_stage, Some(Stage::Verifying));
    assert_eq!(outcome.endpoint, Some(endpoint()));
    assert!(matches!(
        outcome.error,
        Some(ActivationError::VerificationFailed {
            attempts: 2,
            last_status: Some(503),
        })
    ));
    assert_eq!(outcome.last_good_webhook.as_deref(), Some(OLD_WEBHOOK));

    let calls = rig.calls();
    assert_eq!(calls.iter().filter(|c| *c == "probe").count(), 2);
    assert!(!calls.iter().any(|c| c == "deregister" || c.starts_with("register")));
    assert_eq!(rig.webhook_url(), OLD_WEBHOOK);
}

#[test]
fn cutover_failure_rolls_back_to_the_previous_registration() {
    let rig = Rig::new();

    let outcome = workflow("svc-rollback")
        .publisher(rig.publisher())
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider_failing_register(&[NEW_WEBHOOK]))
        .run();

    assert_eq!(outcome.status, WorkflowStatus::RolledBack);
    assert_eq!(outcome.failed_stage, Some(Stage::CuttingOver));
    assert_eq!(outcome.endpoint, Some(endpoint()));
    assert!(matches!(
        outcome.error,
        Some(ActivationError::CutoverFailed(_))
    ));
    assert_eq!(outcome.last_good_webhook.as_deref(), Some(OLD_WEBHOOK));
    assert_eq!(rig.webhook_url(), OLD_WEBHOOK);
}

#[test]
fn failed_rollback_demands_manual_intervention() {
    let rig = Rig::new();

    let outcome = workflow("svc-manual")
        .publisher(rig.publisher())
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider_failing_register(&[NEW_WEBHOOK, OLD_WEBHOOK]))
        .run();

    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert_eq!(outcome.failed_stage, Some(Stage::CuttingOver));
    assert!(outcome.last_good_webhook.is_none());
    assert_eq!(rig.webhook_url(), "");
    let error = outcome.error.unwrap();
    assert!(error.requires_manual_intervention());
}

#[test]
fn skip_build_reuses_the_published_image() {
    let rig = Rig::new();

    let outcome = workflow("svc-skip")
        .skip_build(true)
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .run();

    assert!(outcome.is_success());
    let calls = rig.calls();
    assert!(calls.first().is_some_and(|c| c.starts_with("deploy")));
    assert!(
        !calls
            .iter()
            .any(|c| c.starts_with("build") || c.starts_with("push"))
    );
}

#[test]
fn dry_run_performs_no_actions() {
    let rig = Rig::new();

    let outcome = workflow("svc-dry")
        .publisher(rig.publisher())
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .dry_run(true)
        .run();

    assert!(outcome.is_success());
    assert!(outcome.endpoint.is_none());
    assert!(outcome.last_good_webhook.is_none());
    assert!(rig.calls().is_empty());
    assert_eq!(rig.webhook_url(), OLD_WEBHOOK);
}

#[test]
fn missing_image_fails_before_any_stage() {
    let rig = Rig::new();

    let outcome = Workflow::new(
        DeploymentTarget::new("acme-prod", "europe-west1", "svc-no-image"),
        ServiceSpec::new(),
    )
    .platform(rig.platform())
    .provider(rig.provider())
    .run();

    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert!(outcome.failed_stage.is_none());
    assert!(matches!(
        outcome.error,
        Some(ActivationError::InvalidConfig(_))
    ));
    assert!(rig.calls().is_empty());
}

#[test]
fn missing_platform_aborts() {
    let rig = Rig::new();

    let outcome = workflow("svc-no-platform").provider(rig.provider()).run();

    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert!(outcome.failed_stage.is_none());
    assert_eq!(
        outcome.error.map(|e| e.to_string()),
        Some("no platform configured".to_string())
    );
}

#[test]
fn missing_provider_aborts() {
    let rig = Rig::new();

    let outcome = workflow("svc-no-provider").platform(rig.platform()).run();

    assert!(outcome.failed_stage.is_none());
    assert_eq!(
        outcome.error.map(|e| e.to_string()),
        Some("no webhook provider configured".to_string())
    );
}

#[test]
fn missing_publisher_is_a_building_failure() {
    let rig = Rig::new();

    let outcome = workflow("svc-no-publisher")
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .run();

    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert_eq!(outcome.failed_stage, Some(Stage::Building));
    assert!(!rig.calls().iter().any(|c| c.starts_with("deploy")));
}

#[test]
fn a_held_lock_blocks_the_run() {
    let rig = Rig::new();
    let dir = scratch_dir("svc-locked");
    let target = DeploymentTarget::new("acme-prod", "europe-west1", "svc-locked");
    let _held = ActivationLock::acquire_in(&dir, &target).unwrap();

    let outcome = Workflow::new(target, ServiceSpec::new())
        .image(IMAGE)
        .lock_dir(&dir)
        .publisher(rig.publisher())
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .run();

    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert!(outcome.failed_stage.is_none());
    assert!(matches!(
        outcome.error,
        Some(ActivationError::LockHeld { .. })
    ));
    assert!(rig.calls().is_empty());
}

#[test]
fn the_lock_is_released_after_a_run() {
    let rig = Rig::new();
    let dir = scratch_dir("svc-relock");
    let target = DeploymentTarget::new("acme-prod", "europe-west1", "svc-relock");

    let outcome = Workflow::new(target.clone(), ServiceSpec::new())
        .image(IMAGE)
        .lock_dir(&dir)
        .publisher(rig.publisher())
        .platform(rig.platform())
        .probe(rig.probe(200))
        .provider(rig.provider())
        .run();
    assert!(outcome.is_success());

    ActivationLock::acquire_in(&dir, &target).unwrap();
}
