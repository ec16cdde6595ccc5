//! Configuration file plus environment overrides.
//!
//! Everything tunable lives in one TOML file, with `ESTAFETA_*`
//! environment variables taking precedence key by key. Nothing
//! else in the crate reads the environment directly; the wiring
//! in [`crate::cli`] resolves a `Config` once and hands plain
//! values to the workflow.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ActivationError, ActivationResult};
use crate::target::{DeploymentTarget, ServiceSpec};

/// Config file looked up in the working directory when no path is
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "estafeta.toml";

/// Environment variable holding the webhook provider bot token.
/// Kept out of the config file on purpose: tokens do not belong
/// in files that get committed.
pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildSection,
    pub deploy: DeploySection,
    pub verify: VerifySection,
    pub webhook: WebhookSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Image repository the build is tagged into.
    pub repository: String,
    /// Publisher driving the build: `cloud-build` or `docker`.
    pub publisher: String,
    pub dockerfile: String,
    /// Source directory handed to the publisher.
    pub context: String,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            repository: String::new(),
            publisher: "cloud-build".to_string(),
            dockerfile: "Dockerfile".to_string(),
            context: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeploySection {
    /// Platform running the revisions: `cloud-run` or `fly`.
    pub platform: String,
    pub project: String,
    pub region: String,
    pub service: String,
    pub memory: String,
    pub cpu: String,
    pub concurrency: u32,
    pub request_timeout_secs: u32,
    pub max_instances: u32,
    /// Upper bound on waiting for the new revision to go ready.
    pub ready_wait_secs: u64,
    pub env: BTreeMap<String, String>,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            platform: "cloud-run".to_string(),
            project: String::new(),
            region: String::new(),
            service: String::new(),
            memory: String::new(),
            cpu: String::new(),
            concurrency: 80,
            request_timeout_secs: 300,
            max_instances: 3,
            ready_wait_secs: 300,
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifySection {
    pub probe_path: String,
    pub interval_secs: u64,
    pub max_attempts: u32,
    pub request_timeout_secs: u64,
}

impl Default for VerifySection {
    fn default() -> Self {
        Self {
            probe_path: "/healthz".to_string(),
            interval_secs: 2,
            max_attempts: 5,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookSection {
    pub path: String,
    /// Update types the provider should deliver.
    pub allowed_updates: Vec<String>,
    /// Discard updates queued for the previous URL at cutover.
    pub drop_pending: bool,
}

impl Default for WebhookSection {
    fn default() -> Self {
        Self {
            path: "/webhook/telegram".to_string(),
            allowed_updates: vec![
                "message".to_string(),
                "callback_query".to_string(),
                "inline_query".to_string(),
            ],
            drop_pending: true,
        }
    }
}

impl Config {
    /// Load from an explicit path, or from `estafeta.toml` in the
    /// working directory when present, then apply the `ESTAFETA_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> ActivationResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file without touching the environment.
    pub fn from_file(path: &Path) -> ActivationResult<Self> {
        if !path.exists() {
            return Err(ActivationError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Apply per-key overrides from a lookup, normally the process
    /// environment.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ActivationResult<()> {
        if let Some(v) = lookup("ESTAFETA_IMAGE_REPOSITORY") {
            self.build.repository = v;
        }
        if let Some(v) = lookup("ESTAFETA_PROJECT") {
            self.deploy.project = v;
        }
        if let Some(v) = lookup("ESTAFETA_REGION") {
            self.deploy.region = v;
        }
        if let Some(v) = lookup("ESTAFETA_SERVICE") {
            self.deploy.service = v;
        }
        if let Some(v) = lookup("ESTAFETA_PROBE_PATH") {
            self.verify.probe_path = v;
        }
        if let Some(v) = lookup("ESTAFETA_INTERVAL_SECS") {
            self.verify.interval_secs = parse_override("ESTAFETA_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("ESTAFETA_MAX_ATTEMPTS") {
            self.verify.max_attempts = parse_override("ESTAFETA_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("ESTAFETA_WEBHOOK_PATH") {
            self.webhook.path = v;
        }
        if let Some(v) = lookup("ESTAFETA_ALLOWED_UPDATES") {
            self.webhook.allowed_updates = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(())
    }

    /// The deployment target named by the config.
    pub fn target(&self) -> ActivationResult<DeploymentTarget> {
        for (key, value) in [
            ("deploy.project", &self.deploy.project),
            ("deploy.region", &self.deploy.region),
            ("deploy.service", &self.deploy.service),
        ] {
            if value.is_empty() {
                return Err(ActivationError::InvalidConfig(format!("{key} is not set")));
            }
        }
        Ok(DeploymentTarget::new(
            &self.deploy.project,
            &self.deploy.region,
            &self.deploy.service,
        ))
    }

    /// Service spec assembled from the deploy section.
    #[must_use]
    pub fn service_spec(&self) -> ServiceSpec {
        let mut spec = ServiceSpec::new()
            .concurrency(self.deploy.concurrency)
            .request_timeout_secs(self.deploy.request_timeout_secs)
            .max_instances(self.deploy.max_instances)
            .ready_wait_secs(self.deploy.ready_wait_secs);
        if !self.deploy.memory.is_empty() {
            spec = spec.memory(&self.deploy.memory);
        }
        if !self.deploy.cpu.is_empty() {
            spec = spec.cpu(&self.deploy.cpu);
        }
        for (key, value) in &self.deploy.env {
            spec = spec.env(key, value);
        }
        spec
    }

    /// Image reference for this run: the configured repository,
    /// tagged `latest` when it carries no tag of its own.
    pub fn image(&self) -> ActivationResult<String> {
        if self.build.repository.is_empty() {
            return Err(ActivationError::InvalidConfig(
                "build.repository is not set".to_string(),
            ));
        }
        // A registry host may carry a port, so only the last path
        // segment decides whether a tag is present.
        let tagged = self
            .build
            .repository
            .rsplit('/')
            .next()
            .is_some_and(|segment| segment.contains(':'));
        if tagged {
            Ok(self.build.repository.clone())
        } else {
            Ok(format!("{}:latest", self.build.repository))
        }
    }

    /// Bot token from the environment.
    pub fn bot_token() -> ActivationResult<String> {
        std::env::var(TOKEN_ENV).map_err(|_| ActivationError::EnvMissing(TOKEN_ENV.to_string()))
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> ActivationResult<T> {
    value
        .parse()
        .map_err(|_| ActivationError::InvalidConfig(format!("{key} must be a number, got '{value}'")))
}
