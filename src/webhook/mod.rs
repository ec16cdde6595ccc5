pub mod cutover;
pub mod telegram;

use crate::error::ActivationResult;

/// The provider-side webhook registration as last observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRegistration {
    /// URL currently receiving updates; empty when unregistered.
    pub url: String,
    /// URL that was registered before the last cutover touched
    /// it, kept so a failed cutover can restore it.
    pub previous: Option<String>,
    /// Event types the provider will deliver.
    pub allowed_updates: Vec<String>,
    /// Updates queued at the provider but not yet delivered.
    pub pending: u32,
}

/// A webhook provider holds exactly one target URL per bot and
/// can report, replace, or clear it.
pub trait WebhookProvider {
    /// Fetch the current registration.
    fn info(&self) -> ActivationResult<WebhookRegistration>;

    /// Point the webhook at `url`, restricted to `allowed_updates`
    /// when non-empty. With `drop_pending`, updates queued for the
    /// old URL are discarded instead of replayed against the new
    /// one.
    fn register(
        &self,
        url: &str,
        allowed_updates: &[String],
        drop_pending: bool,
    ) -> ActivationResult<()>;

    /// Remove the registration entirely.
    fn deregister(&self) -> ActivationResult<()>;
}
