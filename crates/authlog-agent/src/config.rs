// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration, read once at startup.
//!
//! Every setting is optional. Missing or empty values fall back to the defaults below and
//! numeric values that do not parse are treated as missing. The resulting [`AgentConfig`]
//! is immutable and handed to the agent; no component reads the environment on its own.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::classifier::MatchMode;
use crate::tailer::TailStart;

pub const DEFAULT_AUTH_LOG_FILE_PATH: &str = "/var/log/auth.log";
pub const DEFAULT_SERVER_ENDPOINT: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 5050;
pub const DEFAULT_CLIENT_HOSTNAME: &str = "localhost";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_RECONNECT_BACKOFF_BASE_MS: u64 = 500;
const DEFAULT_RECONNECT_BACKOFF_MAX_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Authentication log to tail
    pub log_file_path: PathBuf,
    /// Collector host name or address
    pub collector_host: String,
    pub collector_port: u16,
    /// Identity to report instead of the system hostname
    pub hostname_override: Option<String>,
    /// tracing filter level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// Bound on establishing the collector connection
    pub connect_timeout: Duration,
    /// Bound on one request/acknowledgment round trip
    pub request_timeout: Duration,
    /// How long the tailer waits at end of file before looking again
    pub poll_interval: Duration,
    pub tail_start: TailStart,
    pub match_mode: MatchMode,
    /// First connect suppression window after a failed connect; zero disables suppression
    pub reconnect_backoff_base: Duration,
    pub reconnect_backoff_max: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_file_path: PathBuf::from(DEFAULT_AUTH_LOG_FILE_PATH),
            collector_host: DEFAULT_SERVER_ENDPOINT.to_string(),
            collector_port: DEFAULT_SERVER_PORT,
            hostname_override: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            tail_start: TailStart::End,
            match_mode: MatchMode::Token,
            reconnect_backoff_base: Duration::from_millis(DEFAULT_RECONNECT_BACKOFF_BASE_MS),
            reconnect_backoff_max: Duration::from_millis(DEFAULT_RECONNECT_BACKOFF_MAX_MS),
        }
    }
}

impl AgentConfig {
    /// Create configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|val| val.trim().to_string())
                .filter(|val| !val.is_empty())
        };
        let millis = |key: &str, default: u64| {
            Duration::from_millis(
                non_empty(key)
                    .and_then(|val| val.parse::<u64>().ok())
                    .unwrap_or(default),
            )
        };

        let log_file_path = non_empty("ALPHA_AUTH_LOG_FILE_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_AUTH_LOG_FILE_PATH), PathBuf::from);
        let collector_host = non_empty("ALPHA_SERVER_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_SERVER_ENDPOINT.to_string());
        let collector_port = non_empty("ALPHA_SERVER_PORT")
            .and_then(|val| parse_port(&val))
            .unwrap_or(DEFAULT_SERVER_PORT);
        let hostname_override = non_empty("ALPHA_CLIENT_HOSTNAME");
        let log_level = non_empty("ALPHA_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let tail_start = if non_empty("ALPHA_READ_FROM_START")
            .is_some_and(|val| matches!(val.to_lowercase().as_str(), "true" | "1" | "yes"))
        {
            TailStart::Beginning
        } else {
            TailStart::End
        };
        let match_mode = non_empty("ALPHA_MATCH_MODE")
            .and_then(|val| val.parse::<MatchMode>().ok())
            .unwrap_or_default();

        Self {
            log_file_path,
            collector_host,
            collector_port,
            hostname_override,
            log_level,
            connect_timeout: millis("ALPHA_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: millis("ALPHA_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS),
            poll_interval: millis("ALPHA_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            tail_start,
            match_mode,
            reconnect_backoff_base: millis(
                "ALPHA_RECONNECT_BACKOFF_BASE_MS",
                DEFAULT_RECONNECT_BACKOFF_BASE_MS,
            ),
            reconnect_backoff_max: millis(
                "ALPHA_RECONNECT_BACKOFF_MAX_MS",
                DEFAULT_RECONNECT_BACKOFF_MAX_MS,
            ),
        }
    }

    /// URI of the collector's gRPC endpoint, e.g. `http://127.0.0.1:5050`.
    #[must_use]
    pub fn collector_endpoint(&self) -> String {
        let host = self.collector_host.as_str();
        if host.contains(':') && !host.starts_with('[') {
            format!("http://[{host}]:{}", self.collector_port)
        } else {
            format!("http://{host}:{}", self.collector_port)
        }
    }
}

// Older deployments configure the port in dial-string form (":5050").
fn parse_port(value: &str) -> Option<u16> {
    value.strip_prefix(':').unwrap_or(value).parse::<u16>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AgentConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AgentConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.log_file_path, PathBuf::from("/var/log/auth.log"));
        assert_eq!(config.collector_endpoint(), "http://127.0.0.1:5050");
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("ALPHA_AUTH_LOG_FILE_PATH", ""),
            ("ALPHA_SERVER_ENDPOINT", "   "),
            ("ALPHA_SERVER_PORT", ""),
            ("ALPHA_CLIENT_HOSTNAME", ""),
        ]);
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn test_values_override_defaults() {
        let config = config_from(&[
            ("ALPHA_AUTH_LOG_FILE_PATH", "/var/log/secure"),
            ("ALPHA_SERVER_ENDPOINT", "collector.internal"),
            ("ALPHA_SERVER_PORT", "6060"),
            ("ALPHA_CLIENT_HOSTNAME", "bastion-1"),
            ("ALPHA_LOG_LEVEL", "DEBUG"),
            ("ALPHA_POLL_INTERVAL_MS", "50"),
            ("ALPHA_READ_FROM_START", "true"),
            ("ALPHA_MATCH_MODE", "sshd"),
        ]);
        assert_eq!(config.log_file_path, PathBuf::from("/var/log/secure"));
        assert_eq!(config.collector_endpoint(), "http://collector.internal:6060");
        assert_eq!(config.hostname_override.as_deref(), Some("bastion-1"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.tail_start, TailStart::Beginning);
        assert_eq!(config.match_mode, MatchMode::Sshd);
    }

    #[test]
    fn test_port_accepts_dial_string_form() {
        let config = config_from(&[("ALPHA_SERVER_PORT", ":7070")]);
        assert_eq!(config.collector_port, 7070);
    }

    #[test]
    fn test_unparseable_numbers_use_defaults() {
        let config = config_from(&[
            ("ALPHA_SERVER_PORT", "not-a-port"),
            ("ALPHA_CONNECT_TIMEOUT_MS", "soon"),
            ("ALPHA_MATCH_MODE", "fuzzy"),
        ]);
        assert_eq!(config.collector_port, DEFAULT_SERVER_PORT);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.match_mode, MatchMode::Token);
    }

    #[test]
    fn test_ipv6_collector_host_is_bracketed() {
        let config = config_from(&[("ALPHA_SERVER_ENDPOINT", "::1")]);
        assert_eq!(config.collector_endpoint(), "http://[::1]:5050");
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("ALPHA_AUTH_LOG_FILE_PATH", "/tmp/auth-test.log");
        env::set_var("ALPHA_SERVER_PORT", ":5151");
        env::remove_var("ALPHA_SERVER_ENDPOINT");

        let config = AgentConfig::from_env();
        assert_eq!(config.log_file_path, PathBuf::from("/tmp/auth-test.log"));
        assert_eq!(config.collector_endpoint(), "http://127.0.0.1:5151");

        env::remove_var("ALPHA_AUTH_LOG_FILE_PATH");
        env::remove_var("ALPHA_SERVER_PORT");
    }
}
