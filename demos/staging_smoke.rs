//! Staging smoke run against Fly.io.
//!
//! Reuses an image that is already in the registry, previews the
//! activation with a dry run, then performs it for real under a
//! hard three-minute deadline. Pending updates are kept so the
//! staging bot replays whatever queued up while it was down.
//!
//! ```sh
//! TELEGRAM_TOKEN=123456:ABC cargo run --example staging_smoke
//! ```

use std::time::{Duration, Instant};

use estafeta::{Cutover, DeploymentTarget, Fly, HealthVerifier, ServiceSpec, Telegram, Workflow};

fn main() -> anyhow::Result<()> {
    let token = std::env::var("TELEGRAM_TOKEN")?;

    let plan = activation(&token).dry_run(true).run();
    if !plan.is_success() {
        anyhow::bail!("dry run rejected the configuration");
    }

    let outcome = activation(&token)
        .deadline(Instant::now() + Duration::from_secs(180))
        .run();
    if let Some(e) = outcome.error {
        return Err(e.into());
    }
    if let Some(endpoint) = outcome.endpoint {
        println!("Serving from {}", endpoint.url);
    }
    Ok(())
}

fn activation(token: &str) -> Workflow {
    let target = DeploymentTarget::new("personal", "fra", "selina-staging");
    let spec = ServiceSpec::new().memory("256Mi").max_instances(1);

    Workflow::new(target, spec)
        .image("registry.fly.io/selina-staging:deployment-01")
        .skip_build(true)
        .platform(Fly::new())
        .verifier(HealthVerifier::new("/healthz").max_attempts(20))
        .cutover(Cutover::new("/webhook/telegram").drop_pending(false))
        .provider(Telegram::new(token))
}
