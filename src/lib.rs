//! Deployment activation workflow for webhook-driven services.
//!
//! [Repository](https://github.com/LeakIX/estafeta) |
//! [Online docs](https://leakix.github.io/estafeta/estafeta/) |
//! [crates.io](https://crates.io/crates/estafeta)
//!
//! Estafeta takes a bot service from source to serving updates:
//! build the image, publish it, deploy a revision, verify its
//! health, and only then cut the provider's webhook over to the
//! new endpoint - with a rollback path when the cutover goes
//! wrong.
//!
//! The name comes from Portuguese for *courier*: the last leg of
//! a deployment is handing the traffic over.
//!
//! # Overview
//!
//! An activation is defined as a [`Workflow`] that wires
//! together:
//!
//! - A [`DeploymentTarget`] and [`ServiceSpec`] naming what runs
//!   where, with which resources
//! - An [`ArtifactPublisher`](publish::ArtifactPublisher) that
//!   builds and pushes the image (e.g. [`CloudBuild`],
//!   [`DockerPublisher`])
//! - A [`Platform`](platform::Platform) that creates revisions
//!   (e.g. [`CloudRun`], [`Fly`])
//! - A [`HealthVerifier`] that polls the new endpoint
//! - A [`Cutover`] plus a
//!   [`WebhookProvider`](webhook::WebhookProvider) that repoint
//!   the webhook (e.g. [`Telegram`])
//!
//! # Architecture
//!
//! A run moves through five stages, strictly in order:
//!
//! 1. **Build** - turn the source tree into an image
//! 2. **Publish** - push the image where the platform can pull it
//! 3. **Deploy** - create a revision and wait for readiness
//! 4. **Verify** - poll the probe path, bounded by an attempt
//!    budget
//! 5. **Cut over** - deregister the old webhook, register the new
//!    URL, confirm by read-back, roll back on failure
//!
//! Any failure ends the run and is pinned to its stage. The
//! webhook registration is only ever moved to an endpoint that
//! just passed verification; until the cutover is confirmed, the
//! previous registration stays authoritative.
//!
//! # Examples
//!
//! ## Full activation
//!
//! ```rust,no_run
//! use estafeta::{
//!     CloudBuild, CloudRun, Cutover, DeploymentTarget,
//!     HealthVerifier, ServiceSpec, Telegram, Workflow,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let target = DeploymentTarget::new(
//!         "my-project",
//!         "europe-west1",
//!         "selina-bot",
//!     );
//!     let spec = ServiceSpec::new()
//!         .env("TELEGRAM_WEBHOOK_MODE", "true")
//!         .memory("512Mi")
//!         .max_instances(3);
//!
//!     let token = std::env::var("TELEGRAM_TOKEN")?;
//!     let workflow = Workflow::new(target, spec)
//!         .image("gcr.io/my-project/selina-bot:latest")
//!         .publisher(CloudBuild::new("my-project"))
//!         .platform(CloudRun::new())
//!         .verifier(HealthVerifier::new("/healthz"))
//!         .cutover(
//!             Cutover::new("/webhook/telegram")
//!                 .allowed_update("message")
//!                 .allowed_update("callback_query")
//!                 .allowed_update("inline_query"),
//!         )
//!         .provider(Telegram::new(&token));
//!
//!     let outcome = workflow.run();
//!     if !outcome.is_success() {
//!         anyhow::bail!("activation failed");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Cutover against a verified endpoint
//!
//! Repoint the webhook without deploying, for example after a
//! manual deploy from another pipeline:
//!
//! ```rust,no_run
//! use estafeta::{Cutover, ServiceEndpoint, Telegram};
//!
//! fn main() -> anyhow::Result<()> {
//!     let token = std::env::var("TELEGRAM_TOKEN")?;
//!     let endpoint = ServiceEndpoint {
//!         url: "https://selina-bot-abc123-ew.a.run.app".to_string(),
//!         revision: "selina-bot-00042-xyz".to_string(),
//!     };
//!
//!     let report = Cutover::new("/webhook/telegram")
//!         .execute(&Telegram::new(&token), &endpoint)?;
//!     eprintln!("webhook now at {}", report.registration.url);
//!     Ok(())
//! }
//! ```

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lock;
pub mod platform;
pub mod publish;
pub mod target;
pub mod webhook;
pub mod workflow;

pub use config::Config;
pub use error::ActivationError;
pub use error::ActivationResult;
pub use health::HealthVerifier;
pub use health::ProbeReport;
pub use lock::ActivationLock;
pub use platform::ServiceEndpoint;
pub use platform::cloud_run::CloudRun;
pub use platform::fly::Fly;
pub use publish::Artifact;
pub use publish::cloud_build::CloudBuild;
pub use publish::docker::DockerPublisher;
pub use target::DeploymentTarget;
pub use target::ServiceSpec;
pub use webhook::WebhookRegistration;
pub use webhook::cutover::Cutover;
pub use webhook::cutover::CutoverReport;
pub use webhook::telegram::Telegram;
pub use workflow::Stage;
pub use workflow::Workflow;
pub use workflow::WorkflowOutcome;
pub use workflow::WorkflowStatus;
