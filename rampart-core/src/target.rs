//! Submission-time target validation.
//!
//! Every target is checked against the syntax its job kind expects before a
//! job record is created: scans need a parseable host, IP, or CIDR block;
//! lookups need a plausible product keyword. Rejected targets never reach
//! the queue.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use once_cell::sync::Lazy;
use rampart_model::JobKind;
use regex::Regex;

use crate::error::{PipelineError, Result};

/// RFC 1123 host labels: alphanumeric with interior hyphens, dot-separated.
static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .expect("hostname pattern compiles")
});

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_KEYWORD_LEN: usize = 128;

/// Validate `target` for `kind` and return its canonical (trimmed) form.
///
/// Scan targets must parse as an IP address, a CIDR block, or a hostname.
/// Lookup targets are free-text keywords, bounded in length and free of
/// control characters.
pub fn validate_target(target: &str, kind: JobKind) -> Result<String> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidTarget(
            "target must not be empty".into(),
        ));
    }

    match kind {
        JobKind::NetworkScan => validate_scan_target(trimmed),
        JobKind::VulnerabilityLookup => validate_keyword(trimmed),
    }?;

    Ok(trimmed.to_string())
}

fn validate_scan_target(target: &str) -> Result<()> {
    if target.parse::<IpAddr>().is_ok() || target.parse::<IpNetwork>().is_ok() {
        return Ok(());
    }

    if target.len() > MAX_HOSTNAME_LEN {
        return Err(PipelineError::InvalidTarget(format!(
            "hostname exceeds {MAX_HOSTNAME_LEN} characters"
        )));
    }

    if !HOSTNAME_RE.is_match(target) {
        return Err(PipelineError::InvalidTarget(format!(
            "'{target}' is not a valid host, IP address, or CIDR block"
        )));
    }

    Ok(())
}

fn validate_keyword(keyword: &str) -> Result<()> {
    if keyword.len() > MAX_KEYWORD_LEN {
        return Err(PipelineError::InvalidTarget(format!(
            "keyword exceeds {MAX_KEYWORD_LEN} characters"
        )));
    }

    if keyword.chars().any(char::is_control) {
        return Err(PipelineError::InvalidTarget(
            "keyword contains control characters".into(),
        ));
    }

    Ok(())
}
