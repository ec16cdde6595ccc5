//! Small HTTP helpers over `curl`.
//!
//! Health probes and the webhook provider API both speak plain
//! HTTP; going through curl keeps the tool on the same footing as
//! the platform CLIs it drives and needs nothing resident.

use std::time::Duration;

use crate::cmd;
use crate::error::{ActivationError, ActivationResult};

/// Issue a GET and return only the numeric response status.
/// Connection failures and timeouts surface as errors, not as a
/// status code.
pub fn status(url: &str, timeout: Duration) -> ActivationResult<u16> {
    let max_time = timeout.as_secs().max(1).to_string();
    let output = cmd::run(
        "curl",
        &[
            "-s",
            "-o",
            "/dev/null",
            "-w",
            "%{http_code}",
            "--max-time",
            &max_time,
            url,
        ],
    )?;

    output
        .trim()
        .parse()
        .map_err(|_| ActivationError::Other(format!("unexpected curl status output: {output}")))
}

/// GET a URL and return the response body.
pub fn get(url: &str, timeout: Duration) -> ActivationResult<String> {
    let max_time = timeout.as_secs().max(1).to_string();
    cmd::run("curl", &["-s", "--max-time", &max_time, url])
}

/// POST form fields and return the response body. Values are
/// url-encoded by curl, so JSON-valued fields pass through intact.
pub fn post_form(
    url: &str,
    fields: &[(&str, &str)],
    timeout: Duration,
) -> ActivationResult<String> {
    let mut args = vec![
        "-s".to_string(),
        "-X".to_string(),
        "POST".to_string(),
        "--max-time".to_string(),
        timeout.as_secs().max(1).to_string(),
    ];
    for (key, value) in fields {
        args.push("--data-urlencode".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(url.to_string());

    let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
    cmd::run("curl", &args_ref)
}

/// Join a base URL and a path with exactly one separating slash,
/// whatever the inputs carry.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}
