// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use logstream_proto::LogStreamRequest;

/// Attempt count carried by every detected login. Counts are not accumulated across lines.
pub const LOGIN_ATTEMPT_COUNT: i32 = 1;

/// What the classifier knows about a matching line, before host identity is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthEventFragment {
    pub attempt_count: i32,
}

impl AuthEventFragment {
    #[must_use]
    pub fn with_hostname(self, hostname: impl Into<String>) -> AuthEvent {
        AuthEvent {
            hostname: hostname.into(),
            attempt_count: self.attempt_count,
        }
    }
}

/// A successful login detected on this host, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    hostname: String,
    attempt_count: i32,
}

impl AuthEvent {
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    #[must_use]
    pub fn attempt_count(&self) -> i32 {
        self.attempt_count
    }

    #[must_use]
    pub fn to_request(&self) -> LogStreamRequest {
        LogStreamRequest {
            hostname: self.hostname.clone(),
            attempt_count: self.attempt_count,
        }
    }
}
