// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use authlog_agent::{agent::Agent, config::AgentConfig};

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = Arc::new(AgentConfig::from_env());

    let env_filter = format!("h2=off,hyper=off,tower=off,{}", config.log_level);
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {e}");
        return ExitCode::FAILURE;
    }

    debug!("Logging subsystem enabled");

    let cancel_token = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(cancel_token.clone()));

    let agent = Agent::new(Arc::clone(&config));
    match agent.run(cancel_token).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Auth log agent stopped: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Cancels `cancel_token` on SIGINT or SIGTERM.
async fn wait_for_shutdown(cancel_token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::pin!(terminate);

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received Ctrl+C, initiating shutdown"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                (&mut terminate).await;
                info!("Received SIGTERM, initiating shutdown");
            }
        },
        () = &mut terminate => info!("Received SIGTERM, initiating shutdown"),
    }
    cancel_token.cancel();
}
