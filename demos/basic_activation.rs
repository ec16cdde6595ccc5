//! Basic activation example.
//!
//! Builds the bot image with Cloud Build, deploys it to Cloud Run,
//! waits for the health endpoint to answer, then cuts the Telegram
//! webhook over to the new revision.
//!
//! ```sh
//! TELEGRAM_TOKEN=123456:ABC cargo run --example basic_activation
//! ```

use std::time::Duration;

use estafeta::{
    CloudBuild, CloudRun, Cutover, DeploymentTarget, HealthVerifier, ServiceSpec, Telegram,
    Workflow,
};

fn main() -> anyhow::Result<()> {
    let token = std::env::var("TELEGRAM_TOKEN")?;

    let target = DeploymentTarget::new("my-project", "europe-west1", "selina-bot");
    let spec = ServiceSpec::new()
        .memory("512Mi")
        .max_instances(3)
        .env("TELEGRAM_WEBHOOK_MODE", "true")
        .env("LOG_LEVEL", "info");

    let outcome = Workflow::new(target, spec)
        .image("gcr.io/my-project/selina-bot:latest")
        .publisher(CloudBuild::new("my-project"))
        .platform(CloudRun::new())
        .verifier(
            HealthVerifier::new("/healthz")
                .max_attempts(10)
                .interval(Duration::from_secs(3)),
        )
        .cutover(
            Cutover::new("/webhook/telegram")
                .allowed_update("message")
                .allowed_update("callback_query"),
        )
        .provider(Telegram::new(&token))
        .run();

    if let Some(e) = outcome.error {
        return Err(e.into());
    }
    Ok(())
}
