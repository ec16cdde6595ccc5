use std::cell::Cell;
use std::time::{Duration, Instant};

use estafeta::ServiceEndpoint;
use estafeta::error::{ActivationError, ActivationResult};
use estafeta::health::{HealthVerifier, Probe};

/// Probe that replays a fixed script of responses; `None` means
/// the probe got no response at all. The last entry repeats once
/// the script runs out.
struct ScriptedProbe {
    calls: Cell<usize>,
    script: Vec<Option<u16>>,
}

impl ScriptedProbe {
    fn new(script: &[Option<u16>]) -> Self {
        Self {
            calls: Cell::new(0),
            script: script.to_vec(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Probe for ScriptedProbe {
    fn status(&self, _url: &str, _timeout: Duration) -> ActivationResult<u16> {
        let index = self.calls.get();
        self.calls.set(index + 1);
        self.script
            .get(index)
            .copied()
            .or_else(|| self.script.last().copied())
            .flatten()
            .ok_or_else(|| ActivationError::Other("connection refused".to_string()))
    }
}

fn endpoint() -> ServiceEndpoint {
    ServiceEndpoint {
        url: "https://svc.example".to_string(),
        revision: "rev-1".to_string(),
    }
}

fn verifier() -> HealthVerifier {
    HealthVerifier::new("/healthz").interval(Duration::ZERO)
}

#[test]
fn healthy_on_first_probe() {
    let probe = ScriptedProbe::new(&[Some(200)]);

    let report = verifier().verify_with(&probe, &endpoint(), None);

    assert!(report.healthy);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.last_status, Some(200));
    assert_eq!(probe.calls(), 1);
}

#[test]
fn unhealthy_exhausts_exactly_the_attempt_budget() {
    let probe = ScriptedProbe::new(&[Some(503)]);

    let report = verifier().max_attempts(5).verify_with(&probe, &endpoint(), None);

    assert!(!report.healthy);
    assert_eq!(report.attempts, 5);
    assert_eq!(report.last_status, Some(503));
    assert_eq!(probe.calls(), 5);
}

#[test]
fn recovery_midway_stops_the_polling() {
    let probe = ScriptedProbe::new(&[Some(500), None, Some(204)]);

    let report = verifier().max_attempts(5).verify_with(&probe, &endpoint(), None);

    assert!(report.healthy);
    assert_eq!(report.attempts, 3);
    assert_eq!(report.last_status, Some(204));
    assert_eq!(probe.calls(), 3);
}

#[test]
fn no_response_leaves_the_status_empty() {
    let probe = ScriptedProbe::new(&[None]);

    let report = verifier().max_attempts(3).verify_with(&probe, &endpoint(), None);

    assert!(!report.healthy);
    assert_eq!(report.attempts, 3);
    assert_eq!(report.last_status, None);
    assert_eq!(probe.calls(), 3);
}

#[test]
fn a_non_2xx_status_is_not_healthy() {
    let probe = ScriptedProbe::new(&[Some(301)]);

    let report = verifier().max_attempts(2).verify_with(&probe, &endpoint(), None);

    assert!(!report.healthy);
    assert_eq!(report.last_status, Some(301));
}

#[test]
fn past_deadline_stops_before_the_first_probe() {
    let probe = ScriptedProbe::new(&[Some(200)]);

    let report = verifier().verify_with(&probe, &endpoint(), Some(Instant::now()));

    assert!(!report.healthy);
    assert_eq!(report.attempts, 0);
    assert_eq!(probe.calls(), 0);
}

#[test]
fn failed_report_converts_to_the_verification_error() {
    let probe = ScriptedProbe::new(&[Some(503)]);
    let report = verifier().max_attempts(2).verify_with(&probe, &endpoint(), None);

    let err = report.require_healthy().unwrap_err();
    assert!(matches!(
        err,
        ActivationError::VerificationFailed {
            attempts: 2,
            last_status: Some(503),
        }
    ));
}

#[test]
fn healthy_report_passes_through() {
    let probe = ScriptedProbe::new(&[Some(200)]);
    let report = verifier().verify_with(&probe, &endpoint(), None);

    assert!(report.require_healthy().is_ok());
}
