// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// The monitored log file could not be opened. Fatal at startup.
#[derive(Debug, thiserror::Error)]
#[error("Failed to open log file {path}: {source}")]
pub struct OpenError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The local hostname could not be resolved. Recovered by substituting the default identity.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("hostname lookup failed: {0}")]
    Lookup(#[from] nix::Error),

    #[error("hostname is not valid UTF-8")]
    NotUtf8,

    #[error("hostname is empty")]
    Empty,
}

/// Failure of a single delivery. Never fatal; the event is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("collector {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("transport failure talking to {endpoint}: {reason}")]
    TransportFailure { endpoint: String, reason: String },
}

/// Errors surfaced by a [`crate::delivery::Connector`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid collector endpoint {0}")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Connect(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Status(#[from] tonic::Status),
}

/// Errors that stop the agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Open(#[from] OpenError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_display_names_path() {
        let error = OpenError {
            path: PathBuf::from("/var/log/auth.log"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let message = error.to_string();
        assert!(message.contains("/var/log/auth.log"));
        assert!(message.starts_with("Failed to open log file"));
    }

    #[test]
    fn test_delivery_error_display() {
        let error = DeliveryError::Unreachable {
            endpoint: "http://127.0.0.1:5050".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "collector http://127.0.0.1:5050 unreachable: connection refused"
        );
    }

    #[test]
    fn test_agent_error_wraps_open_error() {
        let error: AgentError = OpenError {
            path: PathBuf::from("/missing"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
        .into();
        assert!(matches!(error, AgentError::Open(_)));
        assert!(error.to_string().contains("/missing"));
    }
}
