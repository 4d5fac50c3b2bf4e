// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Auth Log Agent
//!
//! Host agent that follows the system authentication log and reports every successful
//! login to a central collector over gRPC.
//!
//! ## Architecture
//!
//! - [`tailer`]: follows the log file across truncation and rotation
//! - [`classifier`]: decides which lines are successful logins
//! - [`event`]: the login event reported to the collector
//! - [`hostname`]: the identity attached to every event
//! - [`delivery`]: one persistent, reused connection to the collector
//! - [`agent`]: wires the pipeline together and handles shutdown
//!
//! Delivery is at-most-once. An event that cannot be delivered within the configured
//! timeouts is logged and dropped; the agent keeps reading.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod agent;
pub mod classifier;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod hostname;
pub mod tailer;
