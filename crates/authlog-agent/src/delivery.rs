// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of detected events to the collector over one long-lived connection.
//!
//! # Connection lifecycle
//!
//! ```text
//!                  connect ok
//!   Disconnected ──────────────> Ready ──┐ deliver ok (connection reused)
//!     ^    │ connect fails/times out │ ^ │
//!     └────┘ (Unreachable)           │ └─┘
//!                                    │ send fails/times out (TransportFailure)
//!                                    v
//!                                  Failed ── next deliver reconnects
//! ```
//!
//! Connect and request round trip are bounded independently. A failed delivery is reported
//! to the caller and never retried here. After repeated connect failures, further connect
//! attempts are suppressed for an exponentially growing window so an outage does not stall
//! every event for the full connect timeout.

use std::time::Duration;

use async_trait::async_trait;
use logstream_proto::{log_streamer_client::LogStreamerClient, LogStreamRequest, LogStreamResponse};
use tokio::time::{timeout, Instant};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::{DeliveryError, TransportError};
use crate::event::AuthEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

/// Collector acknowledgment of one delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message: String,
}

/// An established collector session.
#[async_trait]
pub trait Session: Send {
    async fn send(
        &mut self,
        request: LogStreamRequest,
    ) -> Result<LogStreamResponse, TransportError>;
}

/// Establishes collector sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    async fn connect(&self) -> Result<Self::Session, TransportError>;

    /// Human-readable collector address, used in diagnostics.
    fn endpoint(&self) -> &str;
}

/// Connects to the collector's `logstream.LogStreamer` gRPC service over plaintext HTTP/2.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    endpoint: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl GrpcConnector {
    #[must_use]
    pub fn new(endpoint: String, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            request_timeout,
        }
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    type Session = LogStreamerClient<Channel>;

    async fn connect(&self) -> Result<Self::Session, TransportError> {
        let endpoint = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .tcp_nodelay(true);
        let channel = endpoint.connect().await?;
        Ok(LogStreamerClient::new(channel))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Session for LogStreamerClient<Channel> {
    async fn send(
        &mut self,
        request: LogStreamRequest,
    ) -> Result<LogStreamResponse, TransportError> {
        Ok(self.stream_log(request).await?.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub reconnect_backoff_base: Duration,
    pub reconnect_backoff_max: Duration,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for DeliveryOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            request_timeout: config.request_timeout,
            reconnect_backoff_base: config.reconnect_backoff_base,
            reconnect_backoff_max: config.reconnect_backoff_max,
        }
    }
}

/// Running totals kept by a [`DeliveryChannel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy)]
struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    failures: u32,
    retry_at: Option<Instant>,
}

impl ReconnectBackoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
            retry_at: None,
        }
    }

    fn record_failure(&mut self, now: Instant) {
        self.failures = self.failures.saturating_add(1);
        if self.base.is_zero() {
            return;
        }
        let exponent = self.failures.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(1 << exponent).min(self.max);
        self.retry_at = Some(now + delay);
    }

    fn reset(&mut self) {
        self.failures = 0;
        self.retry_at = None;
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.retry_at
            .filter(|retry_at| *retry_at > now)
            .map(|retry_at| retry_at - now)
    }
}

/// Owns the single collector connection and delivers events over it, one at a time.
pub struct DeliveryChannel<C: Connector> {
    connector: C,
    session: Option<C::Session>,
    state: ConnectionState,
    options: DeliveryOptions,
    backoff: ReconnectBackoff,
    stats: DeliveryStats,
}

impl DeliveryChannel<GrpcConnector> {
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        let connector = GrpcConnector::new(
            config.collector_endpoint(),
            config.connect_timeout,
            config.request_timeout,
        );
        Self::new(connector, DeliveryOptions::from(config))
    }
}

impl<C: Connector> DeliveryChannel<C> {
    #[must_use]
    pub fn new(connector: C, options: DeliveryOptions) -> Self {
        Self {
            connector,
            session: None,
            state: ConnectionState::Disconnected,
            backoff: ReconnectBackoff::new(
                options.reconnect_backoff_base,
                options.reconnect_backoff_max,
            ),
            options,
            stats: DeliveryStats::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }

    /// Sends one event and waits for the collector's acknowledgment.
    ///
    /// Connects first if there is no live connection. Every wait is bounded by the
    /// configured timeouts, so this never blocks indefinitely.
    pub async fn deliver(&mut self, event: AuthEvent) -> Result<Ack, DeliveryError> {
        let result = self.try_deliver(event).await;
        if result.is_ok() {
            self.stats.delivered += 1;
        } else {
            self.stats.failed += 1;
        }
        result
    }

    /// Tears down the live connection, if any.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("DELIVERY | Closed connection to {}", self.endpoint());
        }
        self.state = ConnectionState::Disconnected;
    }

    async fn try_deliver(&mut self, event: AuthEvent) -> Result<Ack, DeliveryError> {
        self.ensure_ready().await?;

        // Held outside `self` while in flight; only a healthy session is put back.
        let Some(mut session) = self.session.take() else {
            return Err(self.transport_failure("no live connection".to_string()));
        };

        let request_timeout = self.options.request_timeout;
        let outcome = timeout(request_timeout, session.send(event.to_request())).await;
        match outcome {
            Ok(Ok(response)) => {
                self.session = Some(session);
                Ok(Ack {
                    message: response.message,
                })
            }
            Ok(Err(e)) => Err(self.transport_failure(e.to_string())),
            Err(_) => Err(self.transport_failure(format!(
                "no acknowledgment within {} ms",
                request_timeout.as_millis()
            ))),
        }
    }

    async fn ensure_ready(&mut self) -> Result<(), DeliveryError> {
        if self.state == ConnectionState::Ready && self.session.is_some() {
            return Ok(());
        }

        if let Some(remaining) = self.backoff.remaining(Instant::now()) {
            return Err(DeliveryError::Unreachable {
                endpoint: self.endpoint().to_string(),
                reason: format!(
                    "reconnect suppressed for another {} ms after {} failed attempts",
                    remaining.as_millis(),
                    self.backoff.failures
                ),
            });
        }

        self.session = None;
        self.state = ConnectionState::Connecting;
        self.stats.connect_attempts += 1;
        let connect_timeout = self.options.connect_timeout;
        debug!("DELIVERY | Connecting to {}", self.endpoint());

        let outcome = timeout(connect_timeout, self.connector.connect()).await;
        let reason = match outcome {
            Ok(Ok(session)) => {
                self.session = Some(session);
                self.state = ConnectionState::Ready;
                self.backoff.reset();
                info!("DELIVERY | Connected to {}", self.endpoint());
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("connect timed out after {} ms", connect_timeout.as_millis()),
        };

        self.state = ConnectionState::Disconnected;
        self.stats.connect_failures += 1;
        self.backoff.record_failure(Instant::now());
        Err(DeliveryError::Unreachable {
            endpoint: self.endpoint().to_string(),
            reason,
        })
    }

    fn transport_failure(&mut self, reason: String) -> DeliveryError {
        warn!(
            "DELIVERY | Dropping connection to {}: {reason}",
            self.endpoint()
        );
        self.session = None;
        self.state = ConnectionState::Failed;
        DeliveryError::TransportFailure {
            endpoint: self.endpoint().to_string(),
            reason,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tonic::Status;

    #[derive(Default)]
    pub(crate) struct FakeState {
        pub(crate) connects: usize,
        pub(crate) refuse: bool,
        pub(crate) hang_connect: bool,
        pub(crate) fail_next_send: bool,
        pub(crate) hang_send: bool,
        pub(crate) received: Vec<LogStreamRequest>,
    }

    /// In-memory collector that records requests and can simulate outages.
    #[derive(Clone, Default)]
    pub(crate) struct FakeCollector {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeCollector {
        pub(crate) fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
            f(&mut self.state.lock().expect("lock poisoned"))
        }
    }

    pub(crate) struct FakeSession {
        state: Arc<Mutex<FakeState>>,
    }

    #[async_trait]
    impl Connector for FakeCollector {
        type Session = FakeSession;

        async fn connect(&self) -> Result<FakeSession, TransportError> {
            let (refuse, hang) = self.with(|s| {
                s.connects += 1;
                (s.refuse, s.hang_connect)
            });
            if hang {
                std::future::pending::<()>().await;
            }
            if refuse {
                return Err(Status::unavailable("connection refused").into());
            }
            Ok(FakeSession {
                state: Arc::clone(&self.state),
            })
        }

        fn endpoint(&self) -> &str {
            "http://collector.test:5050"
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        async fn send(
            &mut self,
            request: LogStreamRequest,
        ) -> Result<LogStreamResponse, TransportError> {
            let (fail, hang) = {
                let mut s = self.state.lock().expect("lock poisoned");
                (std::mem::take(&mut s.fail_next_send), s.hang_send)
            };
            if hang {
                std::future::pending::<()>().await;
            }
            if fail {
                return Err(Status::unavailable("stream reset").into());
            }
            let mut s = self.state.lock().expect("lock poisoned");
            s.received.push(request);
            Ok(LogStreamResponse {
                message: format!("ack {}", s.received.len()),
            })
        }
    }

    pub(crate) fn fast_options() -> DeliveryOptions {
        DeliveryOptions {
            connect_timeout: Duration::from_millis(100),
            request_timeout: Duration::from_millis(100),
            reconnect_backoff_base: Duration::ZERO,
            reconnect_backoff_max: Duration::ZERO,
        }
    }
}
