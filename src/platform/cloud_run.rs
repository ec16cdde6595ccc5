use std::thread;
use std::time::Duration;

use crate::cmd;
use crate::error::{ActivationError, ActivationResult};
use crate::platform::{Platform, ServiceEndpoint};
use crate::publish::Artifact;
use crate::target::{DeploymentTarget, ServiceSpec};

const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Cloud Run driver using the `gcloud` CLI.
///
/// `deploy` creates a revision that takes over the service URL
/// once ready. The webhook endpoint must be reachable by the
/// provider's servers, so the service is deployed with
/// unauthenticated ingress.
pub struct CloudRun;

impl CloudRun {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn describe_json(target: &DeploymentTarget) -> ActivationResult<serde_json::Value> {
        let output = cmd::run(
            "gcloud",
            &[
                "run",
                "services",
                "describe",
                &target.service,
                "--project",
                &target.project,
                "--region",
                &target.region,
                "--platform",
                "managed",
                "--format",
                "json",
            ],
        )?;
        Ok(serde_json::from_str(&output)?)
    }

    fn wait_ready(
        target: &DeploymentTarget,
        ready_wait_secs: u64,
    ) -> ActivationResult<ServiceEndpoint> {
        let attempts = (ready_wait_secs / READY_POLL_INTERVAL.as_secs()).max(1);

        for attempt in 1..=attempts {
            let service = Self::describe_json(target)?;
            if is_ready(&service) {
                if let Some(endpoint) = endpoint_from(&service) {
                    eprintln!("  Revision {} is ready", endpoint.revision);
                    return Ok(endpoint);
                }
            }
            eprintln!("  Waiting for a ready revision ({attempt}/{attempts})...");
            if attempt < attempts {
                thread::sleep(READY_POLL_INTERVAL);
            }
        }

        Err(ActivationError::DeployTimeout {
            service: target.service.clone(),
            waited_secs: ready_wait_secs,
        })
    }
}

impl Default for CloudRun {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for CloudRun {
    fn deploy(
        &self,
        artifact: &Artifact,
        target: &DeploymentTarget,
        spec: &ServiceSpec,
    ) -> ActivationResult<ServiceEndpoint> {
        eprintln!(
            "Deploying {} to Cloud Run in {}...",
            artifact.image, target.region
        );

        let concurrency = spec.concurrency.to_string();
        let timeout = spec.request_timeout_secs.to_string();
        let max_instances = spec.max_instances.to_string();
        let mut args = vec![
            "run",
            "deploy",
            &target.service,
            "--image",
            &artifact.image,
            "--project",
            &target.project,
            "--region",
            &target.region,
            "--platform",
            "managed",
            "--allow-unauthenticated",
            "--memory",
            spec.memory_or_default(),
            "--cpu",
            spec.cpu_or_default(),
            "--concurrency",
            &concurrency,
            "--timeout",
            &timeout,
            "--max-instances",
            &max_instances,
            "--quiet",
        ];

        let env_joined = join_env(&spec.env);
        if !env_joined.is_empty() {
            args.push("--set-env-vars");
            args.push(&env_joined);
        }

        cmd::run_streamed("gcloud", &args).map_err(|e| match e {
            ActivationError::CommandFailed {
                command, status, ..
            } => ActivationError::DeployRejected(format!("{command} ({status})")),
            other => other,
        })?;

        Self::wait_ready(target, spec.ready_wait_secs)
    }

    fn describe(&self, target: &DeploymentTarget) -> ActivationResult<ServiceEndpoint> {
        let service = Self::describe_json(target).map_err(|e| match e {
            ActivationError::CommandFailed { .. } => {
                ActivationError::ServiceNotFound(target.service.clone())
            }
            other => other,
        })?;

        endpoint_from(&service)
            .ok_or_else(|| ActivationError::ServiceNotFound(target.service.clone()))
    }
}

fn join_env(env: &[(String, String)]) -> String {
    env.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn is_ready(service: &serde_json::Value) -> bool {
    service["status"]["conditions"]
        .as_array()
        .is_some_and(|conditions| {
            conditions.iter().any(|c| {
                c["type"].as_str() == Some("Ready") && c["status"].as_str() == Some("True")
            })
        })
}

fn endpoint_from(service: &serde_json::Value) -> Option<ServiceEndpoint> {
    let status = &service["status"];
    let url = status["url"].as_str()?;
    let revision = status["latestReadyRevisionName"].as_str()?;
    Some(ServiceEndpoint {
        url: url.to_string(),
        revision: revision.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ready_service() -> serde_json::Value {
        json!({
            "status": {
                "url": "https://selina-bot-abc123-ew.a.run.app",
                "latestReadyRevisionName": "selina-bot-00042-xyz",
                "conditions": [
                    { "type": "ConfigurationsReady", "status": "True" },
                    { "type": "Ready", "status": "True" },
                ]
            }
        })
    }

    #[test]
    fn ready_service_parses() {
        let service = ready_service();

        assert!(is_ready(&service));
        let endpoint = endpoint_from(&service).unwrap();
        assert_eq!(endpoint.url, "https://selina-bot-abc123-ew.a.run.app");
        assert_eq!(endpoint.revision, "selina-bot-00042-xyz");
    }

    #[test]
    fn unready_condition_is_not_ready() {
        let service = json!({
            "status": {
                "conditions": [
                    { "type": "Ready", "status": "False", "reason": "HealthCheckContainerError" },
                ]
            }
        });

        assert!(!is_ready(&service));
    }

    #[test]
    fn missing_status_yields_no_endpoint() {
        assert!(endpoint_from(&json!({})).is_none());
        assert!(!is_ready(&json!({})));
    }

    #[test]
    fn env_joining() {
        let env = vec![
            ("TELEGRAM_WEBHOOK_MODE".to_string(), "true".to_string()),
            ("WEBAPP_URL".to_string(), "https://svc.example".to_string()),
        ];

        assert_eq!(
            join_env(&env),
            "TELEGRAM_WEBHOOK_MODE=true,WEBAPP_URL=https://svc.example"
        );
        assert_eq!(join_env(&[]), "");
    }
}
