//! MockServer - listener lifecycle.
//!
//! Binds the configured address (optionally with TLS), serves each connection
//! on its own task and drains in-flight requests on stop.

use super::config::MockServerConfig;
use super::core::MockServerState;
use super::handler::{handle_request, record_stalled_head};
use super::tls::build_acceptor;
use super::types::{MockServerError, ObservedRequest, ServerState};
use crate::error::{ConfigurationError, Error};
use crate::interaction::InteractionRegistry;
use crate::pact::{Pact, PactWriter};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// A mock provider serving the interactions of one registry.
pub struct MockServer {
    config: MockServerConfig,
    state: Arc<MockServerState>,
    lifecycle: ServerState,
    addr: Option<SocketAddr>,
    certificate_pem: Option<String>,
    tracker: TaskTracker,
    /// Stop accepting and shut connections down gracefully.
    drain: CancellationToken,
    /// Drop whatever is still running.
    abort: CancellationToken,
}

impl MockServer {
    pub fn new(config: MockServerConfig, registry: InteractionRegistry) -> Self {
        let state = Arc::new(MockServerState::new(
            config.consumer.clone(),
            config.provider.clone(),
            registry,
            config.cors,
        ));
        Self {
            config,
            state,
            lifecycle: ServerState::Idle,
            addr: None,
            certificate_pem: None,
            tracker: TaskTracker::new(),
            drain: CancellationToken::new(),
            abort: CancellationToken::new(),
        }
    }

    pub fn lifecycle(&self) -> ServerState {
        self.lifecycle
    }

    pub fn config(&self) -> &MockServerConfig {
        &self.config
    }

    /// Bind and start serving. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, MockServerError> {
        if self.lifecycle != ServerState::Idle {
            return Err(self.lifecycle_error("start() may only be called once").into());
        }
        self.config.validate()?;
        self.lifecycle = ServerState::Starting;

        match self.bind().await {
            Ok(addr) => {
                self.lifecycle = ServerState::Listening;
                Ok(addr)
            }
            Err(e) => {
                self.lifecycle = ServerState::Stopped;
                Err(e)
            }
        }
    }

    async fn bind(&mut self) -> Result<SocketAddr, MockServerError> {
        let tls = match &self.config.tls {
            Some(tls) => {
                let material = build_acceptor(tls)?;
                self.certificate_pem = material.certificate_pem;
                Some(material.acceptor)
            }
            None => None,
        };

        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| MockServerError::Bind {
                addr: bind_addr.clone(),
                reason: e.to_string(),
            })?;
        let addr = listener.local_addr().map_err(|e| MockServerError::Bind {
            addr: bind_addr,
            reason: e.to_string(),
        })?;
        self.addr = Some(addr);

        info!(
            "Mock server for {} -> {} bound to {}://{} ({} interactions)",
            self.config.consumer,
            self.config.provider,
            self.config.scheme(),
            addr,
            self.state.interaction_count()
        );

        let connection = Connection {
            state: Arc::clone(&self.state),
            tls,
            request_timeout: self.config.request_timeout(),
            drain: self.drain.clone(),
            abort: self.abort.clone(),
        };
        let tracker = self.tracker.clone();
        let drain = self.drain.clone();

        self.tracker.spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                debug!("Accepted connection from {}", peer);
                                let connection = connection.clone();
                                tracker.spawn(async move {
                                    connection.serve_stream(stream, peer).await;
                                });
                            }
                            Err(e) => {
                                error!("Accept error on {}: {}", addr, e);
                            }
                        }
                    }
                    _ = drain.cancelled() => {
                        debug!("Mock server on {} stopped accepting connections", addr);
                        break;
                    }
                }
            }
        });

        Ok(addr)
    }

    /// Stop accepting, let in-flight requests finish within the shutdown
    /// timeout, then cancel whatever remains. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        match self.lifecycle {
            ServerState::Stopped => return,
            ServerState::Idle => {
                self.lifecycle = ServerState::Stopped;
                return;
            }
            _ => {}
        }
        self.lifecycle = ServerState::Draining;
        self.drain.cancel();
        self.tracker.close();

        let shutdown_timeout = self.config.shutdown_timeout();
        if tokio::time::timeout(shutdown_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            let incomplete = self.state.in_flight();
            warn!(
                "Shutdown timeout of {}ms elapsed with {} requests in flight, cancelling",
                shutdown_timeout.as_millis(),
                incomplete
            );
            self.state.set_incomplete(incomplete);
            self.abort.cancel();
            self.tracker.wait().await;
        }

        self.lifecycle = ServerState::Stopped;
        info!(
            "Mock server on {} stopped ({}/{} interactions matched)",
            self.url().unwrap_or_default(),
            self.state.matched_count(),
            self.state.interaction_count()
        );
    }

    /// Fail with the full report unless every interaction was exercised and
    /// nothing unexpected arrived. Only valid once stopped.
    pub fn verify(&self) -> Result<(), MockServerError> {
        if self.lifecycle != ServerState::Stopped {
            return Err(self
                .lifecycle_error("verify() requires the server to be stopped")
                .into());
        }
        let report = self.state.verification();
        if report.is_empty() {
            Ok(())
        } else {
            Err(report.into())
        }
    }

    /// Verify, then write the matched interactions to the pact directory.
    pub fn write_pact(&self) -> Result<PathBuf, Error> {
        self.verify()?;
        let writer = PactWriter::new(self.config.pact_dir.clone(), self.config.write_mode);
        Ok(writer.write(&self.pact())?)
    }

    /// The matched interactions as a contract.
    pub fn pact(&self) -> Pact {
        self.state.pact()
    }

    /// Observed requests not served from an interaction.
    pub fn mismatches(&self) -> Vec<ObservedRequest> {
        self.state.mismatches()
    }

    pub fn requests(&self) -> Vec<ObservedRequest> {
        self.state.requests()
    }

    /// Requests currently being handled.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight()
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn url(&self) -> Option<String> {
        self.addr
            .map(|addr| format!("{}://{}", self.config.scheme(), addr))
    }

    /// PEM of the server certificate, when TLS is enabled.
    pub fn certificate_pem(&self) -> Option<&str> {
        self.certificate_pem.as_deref()
    }

    fn lifecycle_error(&self, reason: &str) -> ConfigurationError {
        ConfigurationError::Lifecycle {
            state: self.lifecycle.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.drain.cancel();
        self.abort.cancel();
    }
}

// ============================================================================
// Connections
// ============================================================================

#[derive(Clone)]
struct Connection {
    state: Arc<MockServerState>,
    tls: Option<TlsAcceptor>,
    request_timeout: Duration,
    drain: CancellationToken,
    abort: CancellationToken,
}

impl Connection {
    async fn serve_stream(self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        match self.tls.clone() {
            Some(acceptor) => {
                let handshake = tokio::time::timeout(self.request_timeout, acceptor.accept(stream));
                match handshake.await {
                    Ok(Ok(tls_stream)) => self.serve(tls_stream, peer).await,
                    Ok(Err(e)) => error!("TLS handshake with {} failed: {}", peer, e),
                    Err(_) => warn!("TLS handshake with {} timed out", peer),
                }
            }
            None => self.serve(stream, peer).await,
        }
    }

    async fn serve<I>(self, io: I, peer: SocketAddr)
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let head = PendingHead::default();
        let state = Arc::clone(&self.state);
        let request_timeout = self.request_timeout;
        let service_head = head.clone();
        let service = service_fn(move |req| {
            let state = Arc::clone(&state);
            let head = service_head.clone();
            async move {
                let response = handle_request(req, state, request_timeout).await;
                head.clear();
                response
            }
        });

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(request_timeout);
        let io = RecordingIo {
            inner: io,
            head: head.clone(),
        };
        let conn = builder.serve_connection(TokioIo::new(io), service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    self.connection_error(peer, &e, &head);
                }
            }
            _ = self.drain.cancelled() => {
                conn.as_mut().graceful_shutdown();
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            self.connection_error(peer, &e, &head);
                        }
                    }
                    _ = self.abort.cancelled() => {
                        debug!("Connection from {} cancelled at shutdown", peer);
                    }
                }
            }
        }
    }

    /// A header read timeout with part of a request received counts as a
    /// failed request. Idle keep-alive connections timing out do not.
    fn connection_error(&self, peer: SocketAddr, e: &hyper::Error, head: &PendingHead) {
        let stalled = head.take();
        if is_header_timeout(e) && !stalled.is_empty() {
            record_stalled_head(&self.state, &stalled, self.request_timeout);
        } else {
            debug!("Connection error from {}: {}", peer, e);
        }
    }
}

fn is_header_timeout(e: &hyper::Error) -> bool {
    e.is_timeout() || e.to_string().contains("timeout")
}

/// Upper bound on the bytes kept for a request that never completes its head.
const PENDING_HEAD_LIMIT: usize = 8 * 1024;

/// Bytes read on a connection since the last request was handled.
#[derive(Clone, Default)]
struct PendingHead(Arc<Mutex<Vec<u8>>>);

impl PendingHead {
    fn extend(&self, bytes: &[u8]) {
        let mut pending = self.0.lock();
        let room = PENDING_HEAD_LIMIT.saturating_sub(pending.len());
        pending.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// Connection IO that copies what it reads into a [`PendingHead`].
struct RecordingIo<I> {
    inner: I,
    head: PendingHead,
}

impl<I: AsyncRead + Unpin> AsyncRead for RecordingIo<I> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            this.head.extend(&buf.filled()[before..]);
        }
        poll
    }
}

impl<I: AsyncWrite + Unpin> AsyncWrite for RecordingIo<I> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
