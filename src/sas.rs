//! SAS token usability evaluation.
//!
//! Pure functions over tokens of the form
//! `SharedAccessSignature sr=<resource>&sig=<sig>&se=<unix-secs>[&skn=<policy>]`.
//! Safe to call from any thread; parse failures are decisions ("not
//! usable"), never crashes.

use lazy_static::lazy_static;
use regex::Regex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::CloudLinkError;

lazy_static! {
    static ref SAS_RE: Regex = Regex::new(r"^SharedAccessSignature\s+(\S.*)$").unwrap();
}

fn malformed(host: &str) -> CloudLinkError {
    CloudLinkError::MalformedToken {
        host: host.to_string(),
    }
}

/// Extract the expiry instant from `token`, validating that the token's
/// resource URI belongs to `host`.
pub fn expires_at(host: &str, token: &str) -> Result<SystemTime, CloudLinkError> {
    let fields = SAS_RE
        .captures(token.trim())
        .and_then(|cap| cap.get(1))
        .ok_or_else(|| malformed(host))?;

    // serde_urlencoded both splits the field list and percent-decodes the
    // resource URI in one go.
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(fields.as_str()).map_err(|_| malformed(host))?;

    let mut resource = None;
    let mut expiry = None;
    for (key, value) in &pairs {
        match key.as_str() {
            "sr" => resource = Some(value.as_str()),
            "se" => expiry = Some(value.as_str()),
            _ => {}
        }
    }

    let resource = resource.ok_or_else(|| malformed(host))?;
    // The host must be the whole first path segment of the resource URI:
    // "host" or "host/...", never a mere prefix of a longer host name.
    let scoped_to_host = resource
        .to_lowercase()
        .strip_prefix(&host.to_lowercase())
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
    if !scoped_to_host {
        return Err(malformed(host));
    }

    let secs = expiry
        .and_then(|se| se.parse::<u64>().ok())
        .ok_or_else(|| malformed(host))?;

    Ok(UNIX_EPOCH + Duration::from_secs(secs))
}

/// Remaining validity of `token` at `now`; zero once expired.
pub fn remaining_from(
    host: &str,
    token: &str,
    now: SystemTime,
) -> Result<Duration, CloudLinkError> {
    let expiry = expires_at(host, token)?;
    Ok(expiry.duration_since(now).unwrap_or(Duration::ZERO))
}

/// Remaining validity of `token` right now; zero once expired.
pub fn remaining(host: &str, token: &str) -> Result<Duration, CloudLinkError> {
    remaining_from(host, token, SystemTime::now())
}

/// A token is usable while it stays valid at least `buffer` longer.
pub fn is_usable_from(host: &str, token: &str, buffer: Duration, now: SystemTime) -> bool {
    match remaining_from(host, token, now) {
        Ok(left) => left >= buffer,
        Err(e) => {
            debug!(error = %e, "error checking if token is usable");
            false
        }
    }
}

pub fn is_usable(host: &str, token: &str, buffer: Duration) -> bool {
    is_usable_from(host, token, buffer, SystemTime::now())
}

/// Parse failures count as expired: fail safe toward re-authentication.
pub fn is_expired_from(host: &str, token: &str, now: SystemTime) -> bool {
    match remaining_from(host, token, now) {
        Ok(left) => left == Duration::ZERO,
        Err(_) => true,
    }
}

pub fn is_expired(host: &str, token: &str) -> bool {
    is_expired_from(host, token, SystemTime::now())
}
