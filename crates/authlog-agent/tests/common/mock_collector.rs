// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process gRPC collector for exercising the agent over a real connection

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use logstream_proto::{
    log_streamer_server::{LogStreamer, LogStreamerServer},
    LogStreamRequest, LogStreamResponse,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status};

#[derive(Clone)]
struct Recorder {
    received: Arc<Mutex<Vec<LogStreamRequest>>>,
}

#[tonic::async_trait]
impl LogStreamer for Recorder {
    async fn stream_log(
        &self,
        request: Request<LogStreamRequest>,
    ) -> Result<Response<LogStreamResponse>, Status> {
        let request = request.into_inner();
        let message = format!("Recorded login on {}", request.hostname);
        self.received.lock().expect("lock poisoned").push(request);
        Ok(Response::new(LogStreamResponse { message }))
    }
}

#[derive(Clone)]
pub struct MockCollector {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<LogStreamRequest>>>,
    accepted: Arc<AtomicUsize>,
}

impl MockCollector {
    /// Start a collector on a random local port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock collector");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let received = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        let incoming = TcpListenerStream::new(listener).inspect(move |conn| {
            if conn.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let service = LogStreamerServer::new(Recorder {
            received: Arc::clone(&received),
        });
        tokio::spawn(
            Server::builder()
                .add_service(service)
                .serve_with_incoming(incoming),
        );

        Self {
            addr,
            received,
            accepted,
        }
    }

    /// Requests received so far
    pub fn received(&self) -> Vec<LogStreamRequest> {
        self.received.lock().expect("lock poisoned").clone()
    }

    /// TCP connections accepted so far
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` requests have arrived
    pub async fn wait_for_requests(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.received.lock().expect("lock poisoned").len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Timed out waiting for collector requests");
    }
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    listener.local_addr().expect("Failed to get local addr").port()
}
