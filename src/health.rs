//! Bounded health polling against a deployed endpoint.
//!
//! This is the only retry loop in the whole workflow: every other
//! failure surfaces immediately, while readiness is given exactly
//! `max_attempts` probes and not one more.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{ActivationError, ActivationResult};
use crate::http;
use crate::platform::ServiceEndpoint;

/// What a verification pass observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub healthy: bool,
    /// Probes actually issued, at most `max_attempts`.
    pub attempts: u32,
    /// Status of the last probe that got a response.
    pub last_status: Option<u16>,
}

impl ProbeReport {
    /// Turn an unhealthy report into the verification error.
    pub fn require_healthy(self) -> ActivationResult<Self> {
        if self.healthy {
            Ok(self)
        } else {
            Err(ActivationError::VerificationFailed {
                attempts: self.attempts,
                last_status: self.last_status,
            })
        }
    }
}

/// One readiness check. A trait so the polling bound can be
/// exercised without a listening endpoint.
pub trait Probe {
    /// Response status for a GET of `url`.
    fn status(&self, url: &str, timeout: Duration) -> ActivationResult<u16>;
}

/// Probe over plain HTTP.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpProbe;

impl Probe for HttpProbe {
    fn status(&self, url: &str, timeout: Duration) -> ActivationResult<u16> {
        http::status(url, timeout)
    }
}

/// Polls a probe path on a deployed endpoint until it answers
/// with a 2xx or the attempt budget runs out.
pub struct HealthVerifier {
    pub probe_path: String,
    pub interval: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl HealthVerifier {
    #[must_use]
    pub fn new(probe_path: &str) -> Self {
        Self {
            probe_path: probe_path.to_string(),
            interval: Duration::from_secs(2),
            max_attempts: 5,
            request_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Verify with the default HTTP probe.
    #[must_use]
    pub fn verify(&self, endpoint: &ServiceEndpoint, deadline: Option<Instant>) -> ProbeReport {
        self.verify_with(&HttpProbe, endpoint, deadline)
    }

    /// Poll `endpoint` at the configured probe path. Any status
    /// outside 2xx, and any probe that gets no response at all,
    /// counts as one failed attempt. A `deadline` in the past or
    /// reached between attempts stops the loop early.
    #[must_use]
    pub fn verify_with(
        &self,
        probe: &dyn Probe,
        endpoint: &ServiceEndpoint,
        deadline: Option<Instant>,
    ) -> ProbeReport {
        let url = http::join_url(&endpoint.url, &self.probe_path);
        eprintln!("Waiting for {url} to answer healthy...");

        let mut last_status = None;
        for attempt in 1..=self.max_attempts {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                eprintln!("  Deadline reached, giving up");
                return ProbeReport {
                    healthy: false,
                    attempts: attempt - 1,
                    last_status,
                };
            }

            match probe.status(&url, self.request_timeout) {
                Ok(code) => {
                    last_status = Some(code);
                    eprint!("  Probe ({attempt}/{}): {code}", self.max_attempts);
                    if (200..300).contains(&code) {
                        eprintln!();
                        return ProbeReport {
                            healthy: true,
                            attempts: attempt,
                            last_status,
                        };
                    }
                    eprintln!(" - retrying...");
                }
                Err(_) => {
                    eprintln!(
                        "  Probe ({attempt}/{}): no response - retrying...",
                        self.max_attempts
                    );
                }
            }

            if attempt < self.max_attempts {
                thread::sleep(self.interval);
            }
        }

        ProbeReport {
            healthy: false,
            attempts: self.max_attempts,
            last_status,
        }
    }
}
