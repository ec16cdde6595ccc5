use crate::cmd;
use crate::error::{ActivationError, ActivationResult};
use crate::platform::{Platform, ServiceEndpoint};
use crate::publish::Artifact;
use crate::target::{DeploymentTarget, ServiceSpec};

/// Fly.io driver using `flyctl`.
///
/// `flyctl deploy` blocks until the new machines pass their
/// checks, so readiness needs no extra polling here. The region
/// and scaling policy live in `fly.toml`; memory and CPU from the
/// service spec are passed through.
pub struct Fly;

impl Fly {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for Fly {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for Fly {
    fn deploy(
        &self,
        artifact: &Artifact,
        target: &DeploymentTarget,
        spec: &ServiceSpec,
    ) -> ActivationResult<ServiceEndpoint> {
        eprintln!("Deploying {} to Fly...", artifact.image);

        let memory = vm_memory_mb(spec.memory_or_default());
        let mut args = vec![
            "deploy".to_string(),
            "--app".to_string(),
            target.service.clone(),
            "--image".to_string(),
            artifact.image.clone(),
            "--vm-memory".to_string(),
            memory,
            "--vm-cpus".to_string(),
            spec.cpu_or_default().to_string(),
            "--yes".to_string(),
        ];
        for (key, value) in &spec.env {
            args.push("--env".to_string());
            args.push(format!("{key}={value}"));
        }

        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        cmd::run_streamed("flyctl", &args_ref).map_err(|e| match e {
            ActivationError::CommandFailed {
                command, status, ..
            } => ActivationError::DeployRejected(format!("{command} ({status})")),
            other => other,
        })?;

        self.describe(target)
    }

    fn describe(&self, target: &DeploymentTarget) -> ActivationResult<ServiceEndpoint> {
        let output = cmd::run("flyctl", &["status", "--app", &target.service, "--json"])
            .map_err(|e| match e {
                ActivationError::CommandFailed { .. } => {
                    ActivationError::ServiceNotFound(target.service.clone())
                }
                other => other,
            })?;
        let status: serde_json::Value = serde_json::from_str(&output)?;

        endpoint_from_status(&status)
            .ok_or_else(|| ActivationError::ServiceNotFound(target.service.clone()))
    }
}

/// Convert a `512Mi` / `1Gi` style size into the megabyte count
/// flyctl expects. Bare numbers pass through unchanged.
fn vm_memory_mb(memory: &str) -> String {
    if let Some(gib) = memory.strip_suffix("Gi") {
        if let Ok(n) = gib.parse::<u64>() {
            return (n * 1024).to_string();
        }
    }
    if let Some(mib) = memory.strip_suffix("Mi") {
        return mib.to_string();
    }
    memory.to_string()
}

fn endpoint_from_status(status: &serde_json::Value) -> Option<ServiceEndpoint> {
    let hostname = status["Hostname"].as_str()?;
    let version = status["Version"].as_u64().unwrap_or(0);
    Some(ServiceEndpoint {
        url: format!("https://{hostname}"),
        revision: format!("v{version}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_suffix_conversion() {
        assert_eq!(vm_memory_mb("512Mi"), "512");
        assert_eq!(vm_memory_mb("2Gi"), "2048");
        assert_eq!(vm_memory_mb("256"), "256");
    }

    #[test]
    fn status_parses_to_endpoint() {
        let status = json!({
            "Hostname": "selina-bot.fly.dev",
            "Version": 42,
        });

        let endpoint = endpoint_from_status(&status).unwrap();
        assert_eq!(endpoint.url, "https://selina-bot.fly.dev");
        assert_eq!(endpoint.revision, "v42");
    }

    #[test]
    fn status_without_hostname_is_rejected() {
        assert!(endpoint_from_status(&json!({ "Version": 3 })).is_none());
    }
}
