// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Top-level agent driving the detection and delivery pipeline.
//!
//! # Architecture
//!
//! ```text
//!   ┌─────────────┐
//!   │ LineSource  │ (tail the auth log)
//!   └──────┬──────┘
//!          │ Line
//!          v
//!   ┌─────────────┐
//!   │ Classifier  │ ("Accepted" lines only)
//!   └──────┬──────┘
//!          │ AuthEventFragment + hostname
//!          v
//!   ┌─────────────┐
//!   │  Delivery   │ (single reused connection)
//!   └─────────────┘
//! ```
//!
//! Everything runs sequentially on one task: a line is fully classified and delivered
//! before the next one is read, so events reach the collector in log order and a slow
//! collector slows down reading. Failed deliveries are logged and dropped.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classifier::Classifier;
use crate::config::AgentConfig;
use crate::delivery::{Ack, Connector, DeliveryChannel, DeliveryStats, GrpcConnector};
use crate::error::{AgentError, DeliveryError};
use crate::hostname::resolve_hostname;
use crate::tailer::{Line, LineSource, TailOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Starting,
    Running,
    Terminated,
}

/// Totals reported when the agent stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentSummary {
    pub lines_read: u64,
    pub events_detected: u64,
    pub events_delivered: u64,
    pub events_dropped: u64,
    pub delivery: DeliveryStats,
}

pub struct Agent<C: Connector = GrpcConnector> {
    config: Arc<AgentConfig>,
    hostname: String,
    classifier: Classifier,
    channel: DeliveryChannel<C>,
    summary: AgentSummary,
    state_tx: watch::Sender<AgentState>,
}

impl Agent<GrpcConnector> {
    /// Creates an agent reporting to the configured collector over gRPC.
    ///
    /// The hostname is resolved here, once, for the lifetime of the agent.
    #[must_use]
    pub fn new(config: Arc<AgentConfig>) -> Self {
        let hostname = resolve_hostname(config.hostname_override.as_deref());
        let channel = DeliveryChannel::from_config(&config);
        Self::with_channel(config, hostname, channel)
    }
}

impl<C: Connector> Agent<C> {
    #[must_use]
    pub fn with_channel(
        config: Arc<AgentConfig>,
        hostname: String,
        channel: DeliveryChannel<C>,
    ) -> Self {
        let (state_tx, _) = watch::channel(AgentState::Starting);
        Self {
            classifier: Classifier::new(config.match_mode),
            config,
            hostname,
            channel,
            summary: AgentSummary::default(),
            state_tx,
        }
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    #[must_use]
    pub fn state(&self) -> AgentState {
        *self.state_tx.borrow()
    }

    /// Receiver for lifecycle transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.state_tx.subscribe()
    }

    /// Runs the pipeline until `cancel_token` is cancelled.
    ///
    /// Fails only if the log file cannot be opened. On shutdown the file handle and the
    /// collector connection are released and the run totals returned.
    pub async fn run(mut self, cancel_token: CancellationToken) -> Result<AgentSummary, AgentError> {
        let options = TailOptions {
            poll_interval: self.config.poll_interval,
            start: self.config.tail_start,
        };
        let mut source = match LineSource::open(&self.config.log_file_path, options).await {
            Ok(source) => source,
            Err(e) => {
                error!("AGENT | Unable to start: {e}");
                self.state_tx.send_replace(AgentState::Terminated);
                return Err(e.into());
            }
        };

        self.state_tx.send_replace(AgentState::Running);
        info!(
            "AGENT | Client started at {}, watching {} and reporting to {}",
            self.hostname,
            self.config.log_file_path.display(),
            self.channel.endpoint()
        );

        loop {
            let line = tokio::select! {
                line = source.next_line() => line,
                () = cancel_token.cancelled() => break,
            };
            self.summary.lines_read += 1;

            tokio::select! {
                _ = self.process_line(&line) => {}
                () = cancel_token.cancelled() => {
                    debug!("AGENT | Shutdown requested while handling line {}", line.number);
                    break;
                }
            }
        }

        info!("AGENT | Shutting down");
        source.close();
        self.channel.close();
        self.summary.delivery = self.channel.stats();
        self.state_tx.send_replace(AgentState::Terminated);

        let summary = self.summary;
        info!(
            "AGENT | Read {} lines, detected {} logins, delivered {}, dropped {}",
            summary.lines_read,
            summary.events_detected,
            summary.events_delivered,
            summary.events_dropped
        );
        Ok(summary)
    }

    /// Classifies one line and, if it is a successful login, delivers it.
    ///
    /// Returns `None` for lines that are not login events.
    pub async fn process_line(&mut self, line: &Line) -> Option<Result<Ack, DeliveryError>> {
        let fragment = self.classifier.classify(&line.text)?;
        self.summary.events_detected += 1;
        debug!("AGENT | Successful login at line {}", line.number);

        let event = fragment.with_hostname(self.hostname.as_str());
        let result = self.channel.deliver(event).await;
        match &result {
            Ok(ack) => {
                self.summary.events_delivered += 1;
                info!("AGENT | Response: {}", ack.message);
            }
            Err(e) => {
                self.summary.events_dropped += 1;
                warn!("AGENT | Dropping event from line {}: {e}", line.number);
            }
        }
        Some(result)
    }
}
