//! Command-line surface: argument parsing, config wiring, and
//! exit codes.
//!
//! Every failure class gets its own exit code so wrapping scripts
//! can tell a failed build from a failed cutover without parsing
//! stderr.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use crate::cmd;
use crate::config::Config;
use crate::error::{ActivationError, ActivationResult};
use crate::health::HealthVerifier;
use crate::http;
use crate::platform::cloud_run::CloudRun;
use crate::platform::fly::Fly;
use crate::platform::{Platform, ServiceEndpoint};
use crate::publish::cloud_build::CloudBuild;
use crate::publish::docker::DockerPublisher;
use crate::webhook::WebhookProvider;
use crate::webhook::cutover::Cutover;
use crate::webhook::telegram::Telegram;
use crate::workflow::{Stage, Workflow, WorkflowOutcome, WorkflowStatus};

const EXIT_OK: i32 = 0;
const EXIT_CONFIG: i32 = 1;
const EXIT_LOCKED: i32 = 2;
const EXIT_BUILD: i32 = 10;
const EXIT_PUBLISH: i32 = 11;
const EXIT_DEPLOY: i32 = 12;
const EXIT_VERIFY: i32 = 13;
const EXIT_CUTOVER_ROLLED_BACK: i32 = 14;
const EXIT_CUTOVER_MANUAL: i32 = 15;

#[derive(Parser)]
#[command(name = "estafeta")]
#[command(about = "Deployment activation for webhook-driven services", version)]
struct Cli {
    /// Path to the config file (default: estafeta.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full activation: build, publish, deploy, verify,
    /// cut the webhook over
    Deploy {
        /// Platform project (falls back to the config)
        project: Option<String>,

        /// Platform region (falls back to the config)
        region: Option<String>,

        /// Service name (falls back to the config)
        service: Option<String>,

        /// Exact image reference to use
        #[arg(long)]
        image: Option<String>,

        /// Reuse the already-published image
        #[arg(long)]
        skip_build: bool,

        /// Print the plan without executing
        #[arg(long)]
        dry_run: bool,

        /// Give up on verification after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Probe a deployed endpoint until it answers healthy
    Verify {
        /// Base URL of the deployment
        url: String,
    },

    /// Repoint the webhook at an already verified endpoint
    Cutover {
        /// Base URL of the deployment
        url: String,

        /// Skip the single pre-cutover probe
        #[arg(long)]
        force: bool,
    },

    /// Show endpoint, health, and webhook state for a service
    Check {
        /// Service name (falls back to the config)
        service: Option<String>,

        /// Platform region (falls back to the config)
        region: Option<String>,
    },
}

/// Parse arguments, dispatch, and map the result to an exit
/// code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();

    match dispatch(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            error_exit_code(&e)
        }
    }
}

fn dispatch(cli: &Cli) -> ActivationResult<i32> {
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Deploy {
            project,
            region,
            service,
            image,
            skip_build,
            dry_run,
            deadline_secs,
        } => cmd_deploy(
            &config,
            &TargetOverrides {
                project: project.as_deref(),
                region: region.as_deref(),
                service: service.as_deref(),
            },
            image.as_deref(),
            *skip_build,
            *dry_run,
            *deadline_secs,
        ),
        Command::Verify { url } => cmd_verify(&config, url),
        Command::Cutover { url, force } => cmd_cutover(&config, url, *force),
        Command::Check { service, region } => cmd_check(
            &config,
            &TargetOverrides {
                project: None,
                region: region.as_deref(),
                service: service.as_deref(),
            },
        ),
    }
}

struct TargetOverrides<'a> {
    project: Option<&'a str>,
    region: Option<&'a str>,
    service: Option<&'a str>,
}

impl TargetOverrides<'_> {
    fn apply(&self, config: &mut Config) {
        if let Some(project) = self.project {
            config.deploy.project = project.to_string();
        }
        if let Some(region) = self.region {
            config.deploy.region = region.to_string();
        }
        if let Some(service) = self.service {
            config.deploy.service = service.to_string();
        }
    }
}

fn cmd_deploy(
    config: &Config,
    overrides: &TargetOverrides<'_>,
    image: Option<&str>,
    skip_build: bool,
    dry_run: bool,
    deadline_secs: Option<u64>,
) -> ActivationResult<i32> {
    let mut config = config.clone();
    overrides.apply(&mut config);

    let target = config.target()?;
    let image = match image {
        Some(reference) => reference.to_string(),
        None => config.image()?,
    };

    if !dry_run {
        check_prerequisites(&config, skip_build)?;
    }

    let mut workflow = Workflow::new(target, config.service_spec())
        .image(&image)
        .source(Path::new(&config.build.context))
        .verifier(build_verifier(&config))
        .cutover(build_cutover(&config))
        .skip_build(skip_build)
        .dry_run(dry_run);

    workflow = match config.deploy.platform.as_str() {
        "cloud-run" => workflow.platform(CloudRun::new()),
        "fly" => workflow.platform(Fly::new()),
        other => {
            return Err(ActivationError::InvalidConfig(format!(
                "unknown platform '{other}'"
            )));
        }
    };

    workflow = match config.build.publisher.as_str() {
        "cloud-build" => workflow.publisher(CloudBuild::new(&config.deploy.project)),
        "docker" => {
            workflow.publisher(DockerPublisher::new().dockerfile(&config.build.dockerfile))
        }
        other => {
            return Err(ActivationError::InvalidConfig(format!(
                "unknown publisher '{other}'"
            )));
        }
    };

    // The token is only needed once something will be mutated.
    if !dry_run {
        workflow = workflow.provider(Telegram::new(&Config::bot_token()?));
    }

    if let Some(secs) = deadline_secs {
        workflow = workflow.deadline(Instant::now() + Duration::from_secs(secs));
    }

    let outcome = workflow.run();
    report_outcome(&outcome);
    Ok(outcome_exit_code(&outcome))
}

fn cmd_verify(config: &Config, url: &str) -> ActivationResult<i32> {
    let endpoint = manual_endpoint(url);
    let report = build_verifier(config)
        .verify(&endpoint, None)
        .require_healthy()?;

    eprintln!("Healthy after {} attempt(s)", report.attempts);
    Ok(EXIT_OK)
}

fn cmd_cutover(config: &Config, url: &str, force: bool) -> ActivationResult<i32> {
    let endpoint = manual_endpoint(url);

    if force {
        eprintln!("Skipping the pre-cutover probe (--force)");
    } else {
        // One probe, not the whole budget: this command is meant
        // for endpoints that already passed verification.
        build_verifier(config)
            .max_attempts(1)
            .verify(&endpoint, None)
            .require_healthy()?;
    }

    let provider = Telegram::new(&Config::bot_token()?);
    let report = build_cutover(config).execute(&provider, &endpoint)?;

    if report.pending_dropped > 0 {
        eprintln!("Dropped {} pending update(s)", report.pending_dropped);
    }
    eprintln!("Webhook now points at {}", report.registration.url);
    Ok(EXIT_OK)
}

fn cmd_check(config: &Config, overrides: &TargetOverrides<'_>) -> ActivationResult<i32> {
    let mut config = config.clone();
    overrides.apply(&mut config);
    let target = config.target()?;

    let platform: Box<dyn Platform> = match config.deploy.platform.as_str() {
        "cloud-run" => Box::new(CloudRun::new()),
        "fly" => Box::new(Fly::new()),
        other => {
            return Err(ActivationError::InvalidConfig(format!(
                "unknown platform '{other}'"
            )));
        }
    };

    let endpoint = platform.describe(&target)?;
    eprintln!("Service:  {} ({})", target.service, target.region);
    eprintln!("Revision: {}", endpoint.revision);
    eprintln!("Endpoint: {}", endpoint.url);

    let report = build_verifier(&config).max_attempts(1).verify(&endpoint, None);
    let health = report
        .last_status
        .map_or_else(|| "no response".to_string(), |code| code.to_string());
    eprintln!("Health:   {health}");

    if let Ok(token) = Config::bot_token() {
        let registration = Telegram::new(&token).info()?;
        if registration.url.is_empty() {
            eprintln!("Webhook:  (unregistered)");
        } else {
            eprintln!("Webhook:  {}", registration.url);
        }
        if registration.pending > 0 {
            eprintln!("Pending:  {} update(s)", registration.pending);
        }
        let expected = http::join_url(&endpoint.url, &config.webhook.path);
        if !registration.url.is_empty() && registration.url != expected {
            eprintln!("WARNING: webhook does not point at this service ({expected})");
        }
    }

    report.require_healthy()?;
    Ok(EXIT_OK)
}

fn manual_endpoint(url: &str) -> ServiceEndpoint {
    ServiceEndpoint {
        url: url.to_string(),
        revision: String::new(),
    }
}

/// Fail fast when a CLI the run would shell out to is missing.
fn check_prerequisites(config: &Config, skip_build: bool) -> ActivationResult<()> {
    eprintln!("Checking prerequisites...");
    for tool in required_tools(config, skip_build) {
        if !cmd::command_exists(tool) {
            return Err(ActivationError::CommandNotFound(tool.to_string()));
        }
    }
    Ok(())
}

fn required_tools(config: &Config, skip_build: bool) -> Vec<&'static str> {
    let mut tools = vec!["curl"];
    tools.push(match config.deploy.platform.as_str() {
        "fly" => "flyctl",
        _ => "gcloud",
    });
    if !skip_build {
        tools.push(match config.build.publisher.as_str() {
            "docker" => "docker",
            _ => "gcloud",
        });
    }
    tools.sort_unstable();
    tools.dedup();
    tools
}

fn build_verifier(config: &Config) -> HealthVerifier {
    HealthVerifier::new(&config.verify.probe_path)
        .interval(Duration::from_secs(config.verify.interval_secs))
        .max_attempts(config.verify.max_attempts)
        .request_timeout(Duration::from_secs(config.verify.request_timeout_secs))
}

fn build_cutover(config: &Config) -> Cutover {
    let mut cutover =
        Cutover::new(&config.webhook.path).drop_pending(config.webhook.drop_pending);
    for update in &config.webhook.allowed_updates {
        cutover = cutover.allowed_update(update);
    }
    cutover
}

fn report_outcome(outcome: &WorkflowOutcome) {
    if outcome.is_success() {
        return;
    }

    eprintln!();
    let stage = outcome.failed_stage.map_or("starting", Stage::name);
    if let Some(e) = &outcome.error {
        eprintln!("Activation failed while {stage}: {e}");
        if let ActivationError::CommandFailed { stderr, .. } = e {
            if !stderr.is_empty() {
                eprintln!("{stderr}");
            }
        }
    }
    if outcome.status == WorkflowStatus::RolledBack {
        eprintln!("The previous webhook registration was restored.");
    }
    if let Some(url) = &outcome.last_good_webhook {
        eprintln!("Webhook still registered to: {url}");
    } else if outcome
        .error
        .as_ref()
        .is_some_and(ActivationError::requires_manual_intervention)
    {
        eprintln!("Inspect the webhook registration before the next run.");
    }
}

fn outcome_exit_code(outcome: &WorkflowOutcome) -> i32 {
    if outcome.is_success() {
        return EXIT_OK;
    }
    if let Some(e) = &outcome.error {
        if e.requires_manual_intervention() {
            return EXIT_CUTOVER_MANUAL;
        }
        if matches!(e, ActivationError::LockHeld { .. }) {
            return EXIT_LOCKED;
        }
    }
    match outcome.failed_stage {
        Some(Stage::Building) => EXIT_BUILD,
        Some(Stage::Publishing) => EXIT_PUBLISH,
        Some(Stage::Deploying) => EXIT_DEPLOY,
        Some(Stage::Verifying) => EXIT_VERIFY,
        Some(Stage::CuttingOver) => EXIT_CUTOVER_ROLLED_BACK,
        None => EXIT_CONFIG,
    }
}

fn error_exit_code(e: &ActivationError) -> i32 {
    match e {
        ActivationError::LockHeld { .. } => EXIT_LOCKED,
        ActivationError::BuildFailed(_) => EXIT_BUILD,
        ActivationError::PushFailed(_) => EXIT_PUBLISH,
        ActivationError::DeployRejected(_)
        | ActivationError::DeployTimeout { .. }
        | ActivationError::ServiceNotFound(_) => EXIT_DEPLOY,
        ActivationError::VerificationFailed { .. } => EXIT_VERIFY,
        ActivationError::CutoverFailed(_) => EXIT_CUTOVER_ROLLED_BACK,
        ActivationError::RollbackFailed { .. } => EXIT_CUTOVER_MANUAL,
        _ => EXIT_CONFIG,
    }
}
