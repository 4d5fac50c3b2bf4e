// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire types for the `logstream.LogStreamer` collector service.
//!
//! The collector exposes a single unary ingest method, `StreamLog`. Its schema is:
//!
//! ```text
//! package logstream;
//!
//! service LogStreamer {
//!   rpc StreamLog (LogStreamRequest) returns (LogStreamResponse) {}
//! }
//!
//! message LogStreamRequest {
//!   string hostname = 1;
//!   int32 attempt_count = 2;
//! }
//!
//! message LogStreamResponse {
//!   string message = 1;
//! }
//! ```
//!
//! The messages below are maintained by hand and the client/server stubs are generated
//! by `build.rs`, so field tags here must stay in sync with the collector.

/// One detected authentication event, as reported by an agent.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogStreamRequest {
    /// Identity of the reporting host.
    #[prost(string, tag = "1")]
    pub hostname: ::prost::alloc::string::String,
    /// Number of successful logins carried by this report.
    #[prost(int32, tag = "2")]
    pub attempt_count: i32,
}

/// Collector acknowledgment for a single [`LogStreamRequest`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogStreamResponse {
    /// Human-readable acknowledgment.
    #[prost(string, tag = "1")]
    pub message: ::prost::alloc::string::String,
}

#[allow(clippy::all, clippy::pedantic, missing_docs, unreachable_pub)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/logstream.LogStreamer.rs"));
}

pub use generated::log_streamer_client;
pub use generated::log_streamer_server;
