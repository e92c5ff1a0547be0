//! Dynamic, single-peer tunnel engine for the peer-connector flow.
//!
//! Unlike [`Tunnel`](crate::wireguard::Tunnel), which owns a static,
//! config-file-driven set of peers bound to a socket it binds itself, the
//! engine here takes ownership of a socket that the connector has already
//! punched through a NAT and brings a single remote peer up on it. It follows
//! a fixed state sequence rather than the richer `TunnelState` lifecycle:
//! exactly `Init -> Binding -> Configuring -> Up`, with `Stopped` reachable
//! from any of those.

use crate::error::{Result, WgAgentError};
use crate::platform::Platform;
use crate::puncher::CancelHandle;
use crate::rendezvous::PeerDescriptor;
use crate::wireguard::{DeviceConfig, KeyPair, PeerConfig, PublicKey, WgDevice};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, error, info, warn};

/// How often to poll boringtun for a completed handshake once the device is
/// configured.
const HANDSHAKE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on how long `start` waits for the first handshake before
/// reporting failure and tearing everything back down.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// State of a peer-connector tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, nothing started yet.
    Init,
    /// Taking ownership of the socket and creating the TUN device.
    Binding,
    /// Applying addresses, routes and the WireGuard configuration.
    Configuring,
    /// Handshake completed, traffic can flow.
    Up,
    /// Torn down, either cleanly or after a failed start.
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Init => write!(f, "init"),
            EngineState::Binding => write!(f, "binding"),
            EngineState::Configuring => write!(f, "configuring"),
            EngineState::Up => write!(f, "up"),
            EngineState::Stopped => write!(f, "stopped"),
        }
    }
}

/// A single-peer WireGuard tunnel driven by the connector, bound to an
/// already-punched UDP socket.
pub struct TunnelEngine {
    interface: String,
    mtu: u16,
    keypair: KeyPair,
    iface_ipv4_cidr: String,
    keepalive_interval: Duration,
    state: Arc<RwLock<EngineState>>,
    platform: Arc<dyn Platform>,
    device: Arc<RwLock<Option<WgDevice>>>,
    peer_public_key: Arc<RwLock<Option<PublicKey>>>,
    listen_port: AtomicU16,
}

impl TunnelEngine {
    /// Create a new engine. Nothing is touched on the system until `start`
    /// is called.
    pub fn new(
        interface: String,
        mtu: u16,
        keypair: KeyPair,
        iface_ipv4_cidr: String,
        keepalive_interval: Duration,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            interface,
            mtu,
            keypair,
            iface_ipv4_cidr,
            keepalive_interval,
            state: Arc::new(RwLock::new(EngineState::Init)),
            platform,
            device: Arc::new(RwLock::new(None)),
            peer_public_key: Arc::new(RwLock::new(None)),
            listen_port: AtomicU16::new(0),
        }
    }

    /// Our own public key, to publish via the rendezvous.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public.clone()
    }

    /// The local UDP port the tunnel socket is bound to. `0` until `start`
    /// has taken ownership of a bound socket.
    pub fn listen_port(&self) -> u16 {
        self.listen_port.load(Ordering::SeqCst)
    }

    /// Current engine state.
    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Bring the tunnel up on `socket`, which must already have had its NAT
    /// punched toward `remote_endpoint` for `remote`.
    ///
    /// `puncher` is cancelled, and its stop observed, before the socket is
    /// handed to the device: the puncher must stop writing before the tunnel
    /// starts reading, or its keepalive payload races the handshake traffic
    /// on the same socket.
    pub async fn start(
        &self,
        socket: Arc<UdpSocket>,
        remote: &PeerDescriptor,
        remote_endpoint: SocketAddr,
        puncher: CancelHandle,
    ) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != EngineState::Init {
                return Err(WgAgentError::InvalidState(format!(
                    "cannot start tunnel engine in state: {}",
                    state
                )));
            }
            *state = EngineState::Binding;
        }

        info!(
            "Starting tunnel engine on interface {} for peer {}",
            self.interface, remote.peer_id
        );

        if let Ok(addr) = socket.local_addr() {
            self.listen_port.store(addr.port(), Ordering::SeqCst);
        }

        // Best-effort: a link left over from a previous run would otherwise
        // make TUN device creation fail outright.
        if let Err(e) = self.platform.destroy_interface(&self.interface) {
            debug!("no existing interface {} to remove before start: {}", self.interface, e);
        }

        let peer_public = match PublicKey::from_base64(&remote.public_key) {
            Ok(k) => k,
            Err(e) => {
                *self.state.write().await = EngineState::Stopped;
                return Err(WgAgentError::ConvertAllowed(format!(
                    "invalid peer public key: {}",
                    e
                )));
            }
        };

        let peer_config = PeerConfig {
            name: remote.peer_id.clone(),
            public_key: peer_public.clone(),
            endpoint: Some(remote_endpoint),
            allowed_ips: remote.allowed_ips.clone(),
            keepalive_interval: Some(self.keepalive_interval),
            preshared_key: None,
        };

        let device_config = DeviceConfig {
            interface: self.interface.clone(),
            mtu: self.mtu,
            keypair: self.keypair.clone(),
            peers: vec![peer_config],
        };

        // Taking ownership of `socket` here hands the puncher's four-tuple
        // straight to the device; the puncher must stop writing to it first.
        puncher.cancel();
        puncher.cancelled().await;

        *self.state.write().await = EngineState::Configuring;

        let device = match WgDevice::new(device_config, socket, self.platform.as_ref()).await {
            Ok(d) => d,
            Err(e) => {
                error!("Failed to bring up WireGuard device: {}", e);
                *self.state.write().await = EngineState::Stopped;
                return Err(WgAgentError::TunnelStart(e.to_string()));
            }
        };

        let interface_name = device.interface_name().to_string();

        if let Err(e) = self
            .platform
            .assign_address(&interface_name, &self.iface_ipv4_cidr)
        {
            error!("Failed to assign address {}: {}", self.iface_ipv4_cidr, e);
            let _ = device.stop().await;
            *self.state.write().await = EngineState::Stopped;
            return Err(WgAgentError::TunnelStart(e.to_string()));
        }

        if !remote.allowed_ips.is_empty() {
            if let Err(e) = self
                .platform
                .configure_routes(&interface_name, &remote.allowed_ips)
            {
                warn!("Failed to configure routes for peer {}: {}", remote.peer_id, e);
            }
        }

        if let Err(e) = self.platform.interface_up(&interface_name) {
            error!("Failed to bring interface {} up: {}", interface_name, e);
            let _ = device.stop().await;
            *self.state.write().await = EngineState::Stopped;
            return Err(WgAgentError::TunnelStart(e.to_string()));
        }

        debug!("Polling for handshake completion with peer {}", remote.peer_id);
        let mut waited = Duration::ZERO;
        loop {
            if device.has_completed_handshake().await {
                break;
            }
            if waited >= HANDSHAKE_TIMEOUT {
                error!(
                    "Handshake with peer {} did not complete within {:?}",
                    remote.peer_id, HANDSHAKE_TIMEOUT
                );
                let _ = self.platform.remove_routes(&interface_name, &remote.allowed_ips);
                let _ = device.stop().await;
                *self.state.write().await = EngineState::Stopped;
                return Err(WgAgentError::TunnelStart(format!(
                    "handshake timed out after {:?}",
                    HANDSHAKE_TIMEOUT
                )));
            }
            time::sleep(HANDSHAKE_POLL_INTERVAL).await;
            waited += HANDSHAKE_POLL_INTERVAL;
        }

        *self.peer_public_key.write().await = Some(peer_public);
        *self.device.write().await = Some(device);
        *self.state.write().await = EngineState::Up;

        info!(
            "Tunnel engine up on {} with peer {}",
            interface_name, remote.peer_id
        );

        Ok(())
    }

    /// Tear the tunnel down. Idempotent: calling `stop` when already stopped
    /// or never started is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state == EngineState::Stopped || *state == EngineState::Init {
            *state = EngineState::Stopped;
            return Ok(());
        }
        *state = EngineState::Stopped;
        drop(state);

        let device = self.device.write().await.take();
        if let Some(device) = device {
            let interface_name = device.interface_name().to_string();
            if let Err(e) = device.stop().await {
                warn!("Failed to stop WireGuard device: {}", e);
            }
            if let Err(e) = self.platform.destroy_interface(&interface_name) {
                warn!("Failed to destroy interface {}: {}", interface_name, e);
            }
        }

        info!("Tunnel engine on {} stopped", self.interface);
        Ok(())
    }
}
