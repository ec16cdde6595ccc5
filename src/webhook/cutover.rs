use std::thread;
use std::time::Duration;

use crate::error::{ActivationError, ActivationResult};
use crate::http;
use crate::platform::ServiceEndpoint;
use crate::webhook::{WebhookProvider, WebhookRegistration};

/// A finished cutover: the confirmed registration, carrying the
/// URL it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutoverReport {
    pub registration: WebhookRegistration,
    /// Updates that were queued for the old URL and discarded.
    pub pending_dropped: u32,
}

/// Repoints the provider's webhook at a freshly verified
/// endpoint.
///
/// The order is fixed: fetch the current registration, clear it,
/// register the new URL, then read it back and compare. Only the
/// read-back makes the cutover count as done. When registration
/// or confirmation fails, the previous registration is restored,
/// so the webhook never stays pointed at an address that did not
/// pass verification.
pub struct Cutover {
    pub webhook_path: String,
    pub allowed_updates: Vec<String>,
    pub drop_pending: bool,
    step_attempts: u32,
    step_delay: Duration,
}

impl Cutover {
    #[must_use]
    pub fn new(webhook_path: &str) -> Self {
        Self {
            webhook_path: webhook_path.to_string(),
            allowed_updates: Vec::new(),
            drop_pending: true,
            step_attempts: 3,
            step_delay: Duration::from_secs(2),
        }
    }

    /// Add an update type the provider should deliver. When none
    /// are added, the provider keeps its own default set.
    #[must_use]
    pub fn allowed_update(mut self, update: &str) -> Self {
        self.allowed_updates.push(update.to_string());
        self
    }

    /// Whether updates queued for the old URL are discarded at
    /// registration time.
    #[must_use]
    pub const fn drop_pending(mut self, drop: bool) -> Self {
        self.drop_pending = drop;
        self
    }

    /// Retry budget for each provider call. Only the calls
    /// themselves are retried; a read-back that names a different
    /// URL means someone else moved the webhook and is surfaced
    /// at once.
    #[must_use]
    pub const fn step_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.step_attempts = attempts;
        self.step_delay = delay;
        self
    }

    /// Run the cutover against `provider` for a verified
    /// `endpoint`. On success the new registration has been
    /// confirmed by read-back. On failure the previous
    /// registration has been restored, unless the error is
    /// [`ActivationError::RollbackFailed`].
    pub fn execute(
        &self,
        provider: &dyn WebhookProvider,
        endpoint: &ServiceEndpoint,
    ) -> ActivationResult<CutoverReport> {
        let new_url = http::join_url(&endpoint.url, &self.webhook_path);

        let current = self.with_retry("fetch webhook info", || provider.info())?;
        let pending_dropped = if self.drop_pending { current.pending } else { 0 };
        let previous = current.url;

        if previous.is_empty() {
            eprintln!("Webhook cutover: (unregistered) -> {new_url}");
        } else {
            eprintln!("Webhook cutover: {previous} -> {new_url}");
        }

        // Clear first so the provider never holds both URLs.
        self.with_retry("deregister old webhook", || provider.deregister())?;

        match self.register_and_confirm(provider, &new_url) {
            Ok(mut registration) => {
                if !previous.is_empty() {
                    registration.previous = Some(previous);
                }
                eprintln!("Webhook registered: {new_url}");
                Ok(CutoverReport {
                    registration,
                    pending_dropped,
                })
            }
            Err(cause) => Err(self.rollback(provider, &new_url, &previous, cause)),
        }
    }

    fn register_and_confirm(
        &self,
        provider: &dyn WebhookProvider,
        new_url: &str,
    ) -> ActivationResult<WebhookRegistration> {
        self.with_retry("register new webhook", || {
            provider.register(new_url, &self.allowed_updates, self.drop_pending)
        })?;

        let readback = self.with_retry("confirm registration", || provider.info())?;
        if readback.url == new_url {
            Ok(readback)
        } else {
            Err(ActivationError::CutoverFailed(format!(
                "provider reports '{}' after registering '{new_url}'",
                readback.url
            )))
        }
    }

    fn rollback(
        &self,
        provider: &dyn WebhookProvider,
        attempted: &str,
        previous: &str,
        cause: ActivationError,
    ) -> ActivationError {
        let restore = if previous.is_empty() {
            // Nothing was registered before, so restoring means
            // leaving the webhook cleared.
            eprintln!("Cutover failed ({cause}), clearing the registration...");
            self.with_retry("rollback deregister", || provider.deregister())
        } else {
            eprintln!("Cutover failed ({cause}), restoring {previous}...");
            self.with_retry("rollback register", || {
                provider.register(previous, &self.allowed_updates, false)
            })
        };

        match restore {
            Ok(()) => cause,
            Err(rollback_error) => ActivationError::RollbackFailed {
                attempted: attempted.to_string(),
                previous: previous.to_string(),
                reason: rollback_error.to_string(),
            },
        }
    }

    fn with_retry<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> ActivationResult<T>,
    ) -> ActivationResult<T> {
        let attempts = self.step_attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt < attempts {
                        eprintln!("  {what}: {e} - retrying ({attempt}/{attempts})...");
                        thread::sleep(self.step_delay);
                    }
                    last = Some(e);
                }
            }
        }
        Err(last
            .unwrap_or_else(|| ActivationError::CutoverFailed(format!("{what}: never attempted"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cutover = Cutover::new("/webhook/telegram");

        assert_eq!(cutover.webhook_path, "/webhook/telegram");
        assert!(cutover.allowed_updates.is_empty());
        assert!(cutover.drop_pending);
    }

    #[test]
    fn builder_chain() {
        let cutover = Cutover::new("/hook")
            .allowed_update("message")
            .allowed_update("callback_query")
            .drop_pending(false);

        assert_eq!(cutover.allowed_updates, vec!["message", "callback_query"]);
        assert!(!cutover.drop_pending);
    }
}
