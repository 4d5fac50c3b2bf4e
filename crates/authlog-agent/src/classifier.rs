// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Recognizes successful authentication lines.
//!
//! Matching anchors on the literal token `Accepted`. Nothing is extracted from the line;
//! the reporting host identity is attached later by the agent.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::event::{AuthEventFragment, LOGIN_ATTEMPT_COUNT};

/// Literal marker of a successful authentication record.
pub const ACCEPTED_TOKEN: &str = "Accepted";

// sshd success record, e.g. "Accepted publickey for alice from 10.0.0.5 port 52113 ssh2"
const SSHD_ACCEPTED_PATTERN: &str = r"\bAccepted [a-z0-9/-]+ for \S+ from \S+ port \d+";

/// How strictly a line must look like a login record to be classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Any line containing [`ACCEPTED_TOKEN`].
    #[default]
    Token,
    /// Only lines shaped like an sshd `Accepted <method> for <user> from <addr> port <n>` record.
    Sshd,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "token" => Ok(MatchMode::Token),
            "sshd" => Ok(MatchMode::Sshd),
            other => Err(format!("unknown match mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    mode: MatchMode,
}

impl Classifier {
    #[must_use]
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns a fragment for a successful login line and `None` for everything else.
    #[must_use]
    pub fn classify(&self, line: &str) -> Option<AuthEventFragment> {
        // Cheap literal scan first; the overwhelming majority of lines stop here.
        if !line.contains(ACCEPTED_TOKEN) {
            return None;
        }
        if self.mode == MatchMode::Sshd && !sshd_accepted().is_match(line) {
            return None;
        }
        Some(AuthEventFragment {
            attempt_count: LOGIN_ATTEMPT_COUNT,
        })
    }
}

/// Classifies with the default [`MatchMode::Token`].
#[must_use]
pub fn classify(line: &str) -> Option<AuthEventFragment> {
    Classifier::default().classify(line)
}

fn sshd_accepted() -> &'static Regex {
    static SSHD_ACCEPTED: OnceLock<Regex> = OnceLock::new();
    SSHD_ACCEPTED.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(SSHD_ACCEPTED_PATTERN).expect("sshd pattern is a valid regex")
    })
}
