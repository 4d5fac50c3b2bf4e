// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hostname detection for the identity attached to every reported event.

use tracing::{debug, warn};

use crate::config::DEFAULT_CLIENT_HOSTNAME;
use crate::error::ResolveError;

/// Looks up the system hostname.
pub fn system_hostname() -> Result<String, ResolveError> {
    let hostname = nix::unistd::gethostname()?;
    let hostname = hostname.into_string().map_err(|_| ResolveError::NotUtf8)?;
    if hostname.is_empty() {
        return Err(ResolveError::Empty);
    }
    Ok(hostname)
}

/// Resolves the identity this agent reports as.
///
/// 1. The configured override, if any
/// 2. The system hostname
/// 3. [`DEFAULT_CLIENT_HOSTNAME`] when the lookup fails
#[must_use]
pub fn resolve_hostname(hostname_override: Option<&str>) -> String {
    resolve_with(hostname_override, system_hostname)
}

fn resolve_with<F>(hostname_override: Option<&str>, lookup: F) -> String
where
    F: FnOnce() -> Result<String, ResolveError>,
{
    if let Some(hostname) = hostname_override.filter(|h| !h.is_empty()) {
        debug!("Using configured hostname {hostname}");
        return hostname.to_string();
    }

    match lookup() {
        Ok(hostname) => hostname,
        Err(e) => {
            warn!("Failed to resolve hostname, reporting as '{DEFAULT_CLIENT_HOSTNAME}': {e}");
            DEFAULT_CLIENT_HOSTNAME.to_string()
        }
    }
}
