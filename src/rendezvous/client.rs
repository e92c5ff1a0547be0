//! HTTP client for the rendezvous service: one-shot registration and polling
//! discovery.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, warn};

use super::types::PeerDescriptor;
use crate::error::{Result, WgAgentError};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Talks to a `RendezvousServer` on behalf of one local peer.
pub struct RendezvousClient {
    base_url: String,
    http: reqwest::Client,
    wait_interval: Duration,
}

impl RendezvousClient {
    /// Construct a client against `base_url` (e.g. `http://127.0.0.1:8787`)
    /// with the default 5s HTTP timeout and 1s poll interval.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_options(base_url, DEFAULT_HTTP_TIMEOUT, DEFAULT_WAIT_INTERVAL)
    }

    /// Construct a client with explicit HTTP timeout and poll interval.
    pub fn with_options(base_url: impl Into<String>, http_timeout: Duration, wait_interval: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .expect("reqwest client builder should not fail with default TLS config");
        Self {
            base_url: base_url.into(),
            http,
            wait_interval,
        }
    }

    /// Publish `descriptor` to the rendezvous. Overwrites any prior record
    /// for the same `peer_id`. Racing against `ctx` lets a caller abort a
    /// hung request the same way every other blocking step in the connect
    /// sequence is cancellable.
    pub async fn register(
        &self,
        ctx: &tokio_util::sync::CancellationToken,
        descriptor: &PeerDescriptor,
    ) -> Result<()> {
        tokio::select! {
            result = self.register_inner(descriptor) => result,
            _ = ctx.cancelled() => Err(WgAgentError::RegisterPeer(
                "cancelled while registering with rendezvous".to_string(),
            )),
        }
    }

    async fn register_inner(&self, descriptor: &PeerDescriptor) -> Result<()> {
        let url = format!("{}/register", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(descriptor)
            .send()
            .await
            .map_err(|e| WgAgentError::RegisterPeer(format!("transport: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WgAgentError::RegisterPeer(format!(
                "rendezvous returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    /// Look up `peer_id` once. Returns the descriptor plus its freshly
    /// resolved UDP address. Racing against `ctx` lets a caller abort a hung
    /// request.
    pub async fn discover(
        &self,
        ctx: &tokio_util::sync::CancellationToken,
        peer_id: &str,
    ) -> Result<(PeerDescriptor, SocketAddr)> {
        tokio::select! {
            result = self.discover_inner(peer_id) => result,
            _ = ctx.cancelled() => Err(WgAgentError::WaitForPeer(format!(
                "cancelled while looking up peer {}", peer_id
            ))),
        }
    }

    async fn discover_inner(&self, peer_id: &str) -> Result<(PeerDescriptor, SocketAddr)> {
        let url = format!("{}/peer/{}", self.base_url, peer_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WgAgentError::WaitForPeer(format!("transport: {}", e)))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(WgAgentError::WaitForPeer(format!("peer {} not found", peer_id)));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(WgAgentError::WaitForPeer(format!("rendezvous returned {}", status)));
        }

        let descriptor: PeerDescriptor = resp
            .json()
            .await
            .map_err(|e| WgAgentError::WaitForPeer(format!("decode: {}", e)))?;

        let resolved = tokio::net::lookup_host(&descriptor.endpoint)
            .await
            .map_err(|e| WgAgentError::WaitForPeer(format!("resolve endpoint: {}", e)))?
            .next()
            .ok_or_else(|| WgAgentError::WaitForPeer(format!("no address for {}", descriptor.endpoint)))?;

        Ok((descriptor, resolved))
    }

    /// Poll `discover` every `wait_interval` until it succeeds or `ctx` fires.
    pub async fn wait_for_peer(
        &self,
        ctx: &tokio_util::sync::CancellationToken,
        peer_id: &str,
    ) -> Result<(PeerDescriptor, SocketAddr)> {
        let mut ticker = tokio::time::interval(self.wait_interval);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    return Err(WgAgentError::WaitForPeer(format!(
                        "cancelled while waiting for peer {}", peer_id
                    )));
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        result = self.discover(ctx, peer_id) => {
                            match result {
                                Ok(found) => return Ok(found),
                                Err(e) => debug!(peer_id, error = %e, "peer not yet present, retrying"),
                            }
                        }
                        _ = ctx.cancelled() => {
                            return Err(WgAgentError::WaitForPeer(format!(
                                "cancelled while waiting for peer {}", peer_id
                            )));
                        }
                    }
                }
            }
        }
    }
}
