//! Peer-connector orchestration: the eight-step sequence that turns a local
//! WireGuard key pair and a remote peer id into a live tunnel.
//!
//! 1. Bind a local UDP socket on the configured listen port.
//! 2. Discover its public address via STUN.
//! 3. Register with the rendezvous.
//! 4. Wait for the remote peer to register too.
//! 5. Start hole punching toward the remote peer's public address.
//! 6. Validate the remote peer's allowed-ip list.
//! 7. Bring the tunnel engine up on the punched socket.
//! 8. Return a handle the caller can use to stop the tunnel.
//!
//! Every step is wrapped in the error kind spec'd for it, so a caller can
//! distinguish "STUN is unreachable" from "the remote peer never showed up"
//! without parsing strings.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::validation::validate_cidr;
use crate::error::{Result, WgAgentError};
use crate::platform::Platform;
use crate::puncher::Puncher;
use crate::rendezvous::{PeerDescriptor, RendezvousClient};
use crate::wireguard::{KeyPair, TunnelEngine};

/// Everything needed to connect to one remote peer.
pub struct ConnectorConfig {
    /// Rendezvous base URL, e.g. `http://rendezvous.example.com:8787`.
    pub rendezvous_url: String,
    /// STUN servers tried, in order, for public address discovery.
    pub stun_servers: Vec<String>,
    /// This side's published identity.
    pub local_peer_id: String,
    /// The remote peer id to wait for and connect to.
    pub remote_peer_id: String,
    /// Local WireGuard key pair.
    pub keypair: KeyPair,
    /// TUN interface name to create.
    pub interface: String,
    /// TUN interface MTU.
    pub mtu: u16,
    /// Overlay address (CIDR) to assign to the interface once connected.
    pub iface_ipv4_cidr: String,
    /// Overlay prefixes this side advertises as reachable through it.
    pub allowed_ips: Vec<String>,
    /// UDP port to bind the tunnel socket to. `0` lets the OS pick one.
    pub listen_port: u16,
    /// Interval between WireGuard keepalive packets once the tunnel is up.
    pub keepalive_interval: Duration,
}

/// A live connection: the tunnel engine plus the background puncher/session
/// state needed to tear it down cleanly.
pub struct ConnectorSession {
    engine: Arc<TunnelEngine>,
}

impl ConnectorSession {
    /// Stop the underlying tunnel.
    pub async fn stop(&self) -> Result<()> {
        self.engine.stop().await
    }

    /// Access the underlying tunnel engine, e.g. to poll its state.
    pub fn engine(&self) -> &Arc<TunnelEngine> {
        &self.engine
    }
}

/// Orchestrates STUN discovery, rendezvous and hole punching to bring up a
/// tunnel with exactly one remote peer.
pub struct Connector {
    config: ConnectorConfig,
    platform: Arc<dyn Platform>,
}

impl Connector {
    /// Construct a connector for `config`, using `platform` for interface
    /// and routing operations once the tunnel comes up.
    pub fn new(config: ConnectorConfig, platform: Arc<dyn Platform>) -> Self {
        Self { config, platform }
    }

    /// Run the full connect sequence. Cancelling `ctx` aborts the wait for
    /// the remote peer; once hole punching has started, cancellation no
    /// longer short-circuits the flow (the punch/engine start sequence runs
    /// to completion or failure).
    pub async fn connect(&self, ctx: &CancellationToken) -> Result<ConnectorSession> {
        let socket = self.bind_socket().await?;

        info!(
            local_peer_id = %self.config.local_peer_id,
            "binding local socket and discovering public address"
        );
        let puncher = Puncher::with_default_interval(self.config.stun_servers.clone());
        let public_addr = puncher
            .public_address(ctx, &socket)
            .await
            .map_err(|e| WgAgentError::PubAddrRetrieve(e.to_string()))?;

        let client = RendezvousClient::new(self.config.rendezvous_url.clone());
        let local_descriptor = PeerDescriptor {
            peer_id: self.config.local_peer_id.clone(),
            public_key: self.config.keypair.public.to_base64(),
            endpoint: public_addr.to_string(),
            allowed_ips: self.config.allowed_ips.clone(),
        };

        client
            .register(ctx, &local_descriptor)
            .await
            .map_err(|e| WgAgentError::RegisterPeer(e.to_string()))?;

        info!(remote_peer_id = %self.config.remote_peer_id, "waiting for remote peer");
        let (remote_descriptor, remote_endpoint) = client
            .wait_for_peer(ctx, &self.config.remote_peer_id)
            .await
            .map_err(|e| WgAgentError::WaitForPeer(e.to_string()))?;

        for cidr in &remote_descriptor.allowed_ips {
            validate_cidr(cidr).map_err(|e| {
                WgAgentError::ConvertAllowed(format!("peer allowed_ip {}: {}", cidr, e))
            })?;
        }

        info!(%remote_endpoint, "starting hole punch");
        let punch_handle = puncher
            .punch(ctx, Arc::clone(&socket), remote_endpoint)
            .map_err(|e| WgAgentError::PunchingNat(e.to_string()))?;

        // Give the punch a head start before configuring the device: the
        // remote side's own puncher needs a few round trips to open its NAT
        // mapping in both directions before a handshake can land.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let engine = Arc::new(TunnelEngine::new(
            self.config.interface.clone(),
            self.config.mtu,
            self.config.keypair.clone(),
            self.config.iface_ipv4_cidr.clone(),
            self.config.keepalive_interval,
            Arc::clone(&self.platform),
        ));

        engine
            .start(socket, &remote_descriptor, remote_endpoint, punch_handle)
            .await
            .map_err(|e| WgAgentError::TunnelStart(e.to_string()))?;

        Ok(ConnectorSession { engine })
    }

    async fn bind_socket(&self) -> Result<Arc<UdpSocket>> {
        let addr = format!("0.0.0.0:{}", self.config.listen_port);
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|e| WgAgentError::BindUdp(e.to_string()))?;
        Ok(Arc::new(socket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::get_platform;
    use crate::rendezvous::{MemoryStore, RendezvousServer};

    fn test_config(rendezvous_url: String) -> ConnectorConfig {
        ConnectorConfig {
            rendezvous_url,
            stun_servers: vec![],
            local_peer_id: "local".to_string(),
            remote_peer_id: "remote".to_string(),
            keypair: KeyPair::generate(),
            interface: "wgconn0".to_string(),
            mtu: 1420,
            iface_ipv4_cidr: "10.10.0.2/32".to_string(),
            allowed_ips: vec!["10.10.0.2/32".to_string()],
            listen_port: 0,
            keepalive_interval: Duration::from_secs(25),
        }
    }

    #[tokio::test]
    async fn connect_times_out_waiting_for_a_remote_peer_that_never_registers() {
        let store = Arc::new(MemoryStore::new());
        let server = Arc::new(RendezvousServer::new(store));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let shutdown = CancellationToken::new();
        let shutdown_in = shutdown.clone();
        let server_handle = tokio::spawn(async move {
            server
                .serve(addr, async move { shutdown_in.cancelled().await })
                .await
        });
        // give axum a moment to bind before we hit it
        tokio::time::sleep(Duration::from_millis(50)).await;

        let config = test_config(format!("http://{}", addr));
        let connector = Connector::new(config, Arc::from(get_platform()));

        let wait_ctx = CancellationToken::new();
        let cancel_in = wait_ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel_in.cancel();
        });

        let result = connector.connect(&wait_ctx).await;
        assert!(result.is_err());

        shutdown.cancel();
        let _ = server_handle.await;
    }
}
