/// Identifies the service being activated: one platform project,
/// one region, one service name. Fixed for the duration of a run.
///
/// # Example
///
/// ```
/// use estafeta::DeploymentTarget;
///
/// let target = DeploymentTarget::new("my-project", "europe-west1", "selina-bot");
///
/// assert_eq!(target.service, "selina-bot");
/// assert_eq!(target.lock_key(), "selina-bot-europe-west1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub project: String,
    pub region: String,
    pub service: String,
}

impl DeploymentTarget {
    #[must_use]
    pub fn new(project: &str, region: &str, service: &str) -> Self {
        Self {
            project: project.to_string(),
            region: region.to_string(),
            service: service.to_string(),
        }
    }

    /// Key under which concurrent runs against this service are
    /// serialized. The same service name may exist in several
    /// regions, so the region is part of the key.
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!("{}-{}", self.service, self.region)
    }
}

/// Runtime shape of the deployed revision: resources, scaling
/// bounds, environment, and how long to wait for readiness.
///
/// # Example
///
/// ```
/// use estafeta::ServiceSpec;
///
/// let spec = ServiceSpec::new()
///     .env("TELEGRAM_WEBHOOK_MODE", "true")
///     .memory("1Gi")
///     .max_instances(5);
///
/// assert_eq!(spec.memory, "1Gi");
/// assert_eq!(spec.concurrency, 80);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub env: Vec<(String, String)>,
    pub memory: String,
    pub cpu: String,
    pub concurrency: u32,
    pub request_timeout_secs: u32,
    pub max_instances: u32,
    pub ready_wait_secs: u64,
}

impl ServiceSpec {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            env: Vec::new(),
            memory: String::new(),
            cpu: String::new(),
            concurrency: 80,
            request_timeout_secs: 300,
            max_instances: 3,
            ready_wait_secs: 300,
        }
    }

    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn memory(mut self, memory: &str) -> Self {
        self.memory = memory.to_string();
        self
    }

    #[must_use]
    pub fn cpu(mut self, cpu: &str) -> Self {
        self.cpu = cpu.to_string();
        self
    }

    #[must_use]
    pub const fn concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub const fn request_timeout_secs(mut self, secs: u32) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    #[must_use]
    pub const fn max_instances(mut self, max: u32) -> Self {
        self.max_instances = max;
        self
    }

    #[must_use]
    pub const fn ready_wait_secs(mut self, secs: u64) -> Self {
        self.ready_wait_secs = secs;
        self
    }

    /// Memory with the platform default applied when unset.
    #[must_use]
    pub fn memory_or_default(&self) -> &str {
        if self.memory.is_empty() {
            "512Mi"
        } else {
            &self.memory
        }
    }

    /// CPU count with the platform default applied when unset.
    #[must_use]
    pub fn cpu_or_default(&self) -> &str {
        if self.cpu.is_empty() { "1" } else { &self.cpu }
    }
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self::new()
    }
}
