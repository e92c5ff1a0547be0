//! STUN public-address discovery (RFC 5389 Binding Request / XOR-MAPPED-ADDRESS).
//!
//! Tries a list of STUN servers in order against an already-bound UDP socket,
//! returning the first public `(ip, port)` mapping any of them report. This
//! module never binds a socket itself: the caller owns the socket for the
//! lifetime of the connector session.

use std::net::SocketAddr;
use std::time::Duration;

use bytecodec::{DecodeExt, EncodeExt};
use rand::Rng;
use stun_codec::rfc5389::methods::BINDING;
use stun_codec::{Message, MessageClass, MessageDecoder, MessageEncoder, TransactionId};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::{Result, WgAgentError};

/// Default set of public STUN servers, used when a configuration leaves
/// `stun_servers` empty.
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun.l.google.com:19302",
    "stun1.l.google.com:19302",
    "stun.cloudflare.com:3478",
];

/// Default per-server read deadline.
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(2);

/// Discover the public `(ip, port)` mapping for `socket` by sending a STUN
/// Binding Request to each server in `stun_servers`, in order, until one
/// replies within `deadline`.
///
/// Side effect: this function only reads from `socket`'s receive path for the
/// duration of the call; it does not mutate any persistent socket option.
pub async fn public_address(
    socket: &UdpSocket,
    stun_servers: &[String],
    deadline: Duration,
) -> Result<SocketAddr> {
    let default_servers;
    let servers: &[String] = if stun_servers.is_empty() {
        default_servers = DEFAULT_STUN_SERVERS
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        &default_servers
    } else {
        stun_servers
    };

    let mut last_err = String::new();
    for server in servers {
        match query_server(socket, server, deadline).await {
            Ok(addr) => {
                debug!(server = %server, public_addr = %addr, "stun query succeeded");
                return Ok(addr);
            }
            Err(e) => {
                warn!(server = %server, error = %e, "stun server failed");
                last_err = e;
            }
        }
    }

    Err(WgAgentError::PubAddrRetrieve(format!(
        "all {} stun servers failed; last error: {}",
        servers.len(),
        last_err
    )))
}

async fn query_server(socket: &UdpSocket, server: &str, deadline: Duration) -> std::result::Result<SocketAddr, String> {
    let server_addr = resolve_server(server).await?;

    let transaction_id = generate_transaction_id();
    let request = Message::<stun_codec::rfc5389::Attribute>::new(
        MessageClass::Request,
        BINDING,
        transaction_id,
    );

    let mut encoder = MessageEncoder::new();
    let request_bytes = encoder
        .encode_into_bytes(request)
        .map_err(|e| format!("encode stun request: {}", e))?;

    socket
        .send_to(&request_bytes, server_addr)
        .await
        .map_err(|e| format!("send stun request: {}", e))?;

    let mut buf = [0u8; 1024];
    let (len, _) = tokio::time::timeout(deadline, socket.recv_from(&mut buf))
        .await
        .map_err(|_| "stun read deadline exceeded".to_string())?
        .map_err(|e| format!("recv stun response: {}", e))?;

    let mut decoder = MessageDecoder::<stun_codec::rfc5389::Attribute>::new();
    let response = decoder
        .decode_from_bytes(&buf[..len])
        .map_err(|e| format!("decode stun response: {}", e))?
        .map_err(|e| format!("incomplete stun response: {:?}", e))?;

    if response.transaction_id() != transaction_id {
        return Err("stun transaction id mismatch".to_string());
    }

    for attr in response.attributes() {
        if let stun_codec::rfc5389::Attribute::XorMappedAddress(xma) = attr {
            return Ok(xma.address());
        }
    }
    for attr in response.attributes() {
        if let stun_codec::rfc5389::Attribute::MappedAddress(ma) = attr {
            return Ok(ma.address());
        }
    }

    Err("no mapped address in stun response".to_string())
}

async fn resolve_server(server: &str) -> std::result::Result<SocketAddr, String> {
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host(server)
        .await
        .map_err(|e| format!("dns resolution failed for {}: {}", server, e))?
        .next()
        .ok_or_else(|| format!("no addresses found for {}", server))
}

fn generate_transaction_id() -> TransactionId {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 12];
    rng.fill(&mut bytes);
    TransactionId::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_servers_failed_surfaces_pub_addr_retrieve() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // Port 0 on loopback is never a valid STUN server; both will fail fast.
        let servers = vec!["127.0.0.1:1".to_string(), "127.0.0.1:2".to_string()];
        let result = public_address(&socket, &servers, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(WgAgentError::PubAddrRetrieve(_))));
    }

    #[test]
    fn transaction_ids_are_not_degenerate() {
        let a = generate_transaction_id();
        let b = generate_transaction_id();
        assert_ne!(a, b);
    }
}
