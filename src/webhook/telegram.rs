use std::time::Duration;

use crate::error::{ActivationError, ActivationResult};
use crate::http;
use crate::webhook::{WebhookProvider, WebhookRegistration};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram Bot API webhook provider.
///
/// Drives `getWebhookInfo`, `setWebhook`, and `deleteWebhook` for
/// one bot token. The token rides in the request URL, so command
/// failures are reported by method name only and never echo the
/// command line.
pub struct Telegram {
    token: String,
    api_base: String,
    timeout: Duration,
}

impl Telegram {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            api_base: TELEGRAM_API.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Point the driver at a self-hosted Bot API server.
    #[must_use]
    pub fn api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    fn call(&self, method: &str, fields: &[(&str, &str)]) -> ActivationResult<serde_json::Value> {
        let url = self.method_url(method);
        let body = if fields.is_empty() {
            http::get(&url, self.timeout)
        } else {
            http::post_form(&url, fields, self.timeout)
        }
        .map_err(|e| redact(method, e))?;

        let parsed: serde_json::Value = serde_json::from_str(&body)?;
        if parsed["ok"].as_bool() == Some(true) {
            Ok(parsed["result"].clone())
        } else {
            let description = parsed["description"]
                .as_str()
                .unwrap_or("no description given");
            Err(ActivationError::CutoverFailed(format!(
                "{method}: {description}"
            )))
        }
    }
}

impl WebhookProvider for Telegram {
    fn info(&self) -> ActivationResult<WebhookRegistration> {
        let result = self.call("getWebhookInfo", &[])?;
        Ok(registration_from(&result))
    }

    fn register(
        &self,
        url: &str,
        allowed_updates: &[String],
        drop_pending: bool,
    ) -> ActivationResult<()> {
        let allowed_json = serde_json::to_string(allowed_updates)?;
        let mut fields = vec![("url", url)];
        if !allowed_updates.is_empty() {
            fields.push(("allowed_updates", &allowed_json));
        }
        if drop_pending {
            fields.push(("drop_pending_updates", "true"));
        }

        self.call("setWebhook", &fields)?;
        Ok(())
    }

    fn deregister(&self) -> ActivationResult<()> {
        self.call("deleteWebhook", &[])?;
        Ok(())
    }
}

fn redact(method: &str, e: ActivationError) -> ActivationError {
    match e {
        ActivationError::CommandFailed { status, .. } => {
            ActivationError::CutoverFailed(format!("{method} request failed ({status})"))
        }
        other => other,
    }
}

fn registration_from(result: &serde_json::Value) -> WebhookRegistration {
    WebhookRegistration {
        url: result["url"].as_str().unwrap_or_default().to_string(),
        previous: None,
        allowed_updates: result["allowed_updates"]
            .as_array()
            .map(|updates| {
                updates
                    .iter()
                    .filter_map(|u| u.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
        pending: u32::try_from(result["pending_update_count"].as_u64().unwrap_or(0))
            .unwrap_or(u32::MAX),
    }
}
