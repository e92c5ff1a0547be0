//! Wire types for the rendezvous protocol.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::config::validation::{validate_cidr, validate_endpoint};
use crate::error::{Result, WgAgentError};

/// What a peer publishes to the rendezvous and what the other side consumes
/// to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Opaque, case-sensitive identifier unique per rendezvous.
    pub peer_id: String,
    /// Base64-encoded 32-byte Curve25519 public key.
    pub public_key: String,
    /// `host:port`, resolvable to a single UDP address.
    pub endpoint: String,
    /// Routable overlay prefixes for this peer.
    pub allowed_ips: Vec<String>,
}

impl PeerDescriptor {
    /// Validate the descriptor's invariants: the public key decodes to 32
    /// bytes, the endpoint is a well-formed `host:port`, and every
    /// `allowed_ips` entry is a well-formed CIDR.
    pub fn validate(&self) -> Result<()> {
        if self.peer_id.trim().is_empty() {
            return Err(WgAgentError::Validation("peer_id must not be empty".into()));
        }

        use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
        let decoded = BASE64
            .decode(self.public_key.trim())
            .map_err(|e| WgAgentError::Validation(format!("invalid public_key base64: {}", e)))?;
        if decoded.len() != 32 {
            return Err(WgAgentError::Validation(format!(
                "public_key must decode to 32 bytes, got {}",
                decoded.len()
            )));
        }

        validate_endpoint(&self.endpoint)
            .map_err(|e| WgAgentError::Validation(format!("invalid endpoint: {}", e)))?;

        for cidr in &self.allowed_ips {
            validate_cidr(cidr)
                .map_err(|e| WgAgentError::Validation(format!("invalid allowed_ip {}: {}", cidr, e)))?;
        }

        Ok(())
    }
}

/// Server-side storage record: a descriptor plus the time it was last
/// written.
#[derive(Debug, Clone)]
pub struct RendezvousRecord {
    /// The peer's published descriptor.
    pub descriptor: PeerDescriptor,
    /// When this record was last written (register overwrites this).
    pub last_updated: SystemTime,
}

impl RendezvousRecord {
    /// Wrap a descriptor with the current time as its `last_updated` stamp.
    pub fn new(descriptor: PeerDescriptor) -> Self {
        Self {
            descriptor,
            last_updated: SystemTime::now(),
        }
    }
}
