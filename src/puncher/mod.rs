//! UDP hole punching: a cancellable background task that keeps a NAT mapping
//! open by writing a fixed keepalive payload to a remote endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, WgAgentError};
use crate::stun;

/// The literal payload written on every punch tick. Content is irrelevant to
/// the remote side; only the NAT traversal side effect matters. Kept as a
/// fixed, grep-able ASCII string rather than a zero-length datagram, since
/// some middlebox/NAT implementations are more likely to drop or deprioritize
/// empty UDP packets.
pub const PUNCH_PAYLOAD: &[u8] = b"punch";

/// Default interval between punch datagrams.
pub const DEFAULT_PUNCHER_INTERVAL: Duration = Duration::from_millis(300);

/// Handle returned by [`Puncher::punch`]. Cancelling is idempotent.
#[derive(Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Request the punching task to stop. Safe to call more than once.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait until the punching task has observably stopped issuing writes.
    /// Used by callers (notably the tunnel engine) that must guarantee no
    /// racing writer remains on the socket before reconfiguring it.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Emits keepalive datagrams at a fixed interval and can discover this
/// process's own public address via STUN.
pub struct Puncher {
    interval: Duration,
    stun_servers: Vec<String>,
}

impl Puncher {
    /// Construct a puncher with the given tick interval and STUN server list
    /// (used only by [`Puncher::public_address`]).
    pub fn new(interval: Duration, stun_servers: Vec<String>) -> Self {
        Self { interval, stun_servers }
    }

    /// Construct a puncher using the default 300ms interval.
    pub fn with_default_interval(stun_servers: Vec<String>) -> Self {
        Self::new(DEFAULT_PUNCHER_INTERVAL, stun_servers)
    }

    /// Discover this socket's public address via STUN, delegating to the
    /// `stun` module. Racing against `ctx` lets a caller abort a hung probe
    /// the same way every other blocking step in the connect sequence is
    /// cancellable.
    pub async fn public_address(&self, ctx: &CancellationToken, socket: &UdpSocket) -> Result<SocketAddr> {
        tokio::select! {
            result = stun::public_address(socket, &self.stun_servers, stun::DEFAULT_READ_DEADLINE) => result,
            _ = ctx.cancelled() => Err(WgAgentError::PubAddrRetrieve(
                "cancelled while discovering public address".to_string(),
            )),
        }
    }

    /// Start punching `remote_endpoint` through `socket`. Returns a handle
    /// that stops the background task when cancelled (explicitly, or when
    /// `ctx` fires).
    pub fn punch(
        &self,
        ctx: &CancellationToken,
        socket: Arc<UdpSocket>,
        remote_endpoint: SocketAddr,
    ) -> Result<CancelHandle> {
        let child = ctx.child_token();
        let task_token = child.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!(%remote_endpoint, "puncher cancelled");
                        return;
                    }
                    _ = ticker.tick() => {
                        match socket.send_to(PUNCH_PAYLOAD, remote_endpoint).await {
                            Ok(_) => {}
                            Err(e) if is_socket_closed(&e) => {
                                debug!(%remote_endpoint, "puncher socket closed, exiting cleanly");
                                return;
                            }
                            Err(e) => {
                                warn!(%remote_endpoint, error = %e, "punch write failed, continuing");
                            }
                        }
                    }
                }
            }
        });

        Ok(CancelHandle { token: child })
    }
}

fn is_socket_closed(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::NotConnected | std::io::ErrorKind::BrokenPipe
    ) || e.raw_os_error() == Some(libc::EBADF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn punch_writes_the_fixed_payload_until_cancelled() {
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = receiver.local_addr().unwrap();

        let puncher = Puncher::new(Duration::from_millis(20), vec![]);
        let ctx = CancellationToken::new();
        let handle = puncher.punch(&ctx, sender, receiver_addr).unwrap();

        let mut buf = [0u8; 16];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), receiver.recv_from(&mut buf))
            .await
            .expect("should receive a punch datagram")
            .unwrap();
        assert_eq!(&buf[..len], PUNCH_PAYLOAD);

        handle.cancel();
        handle.cancelled().await;
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let target: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let puncher = Puncher::new(Duration::from_millis(500), vec![]);
        let ctx = CancellationToken::new();
        let handle = puncher.punch(&ctx, sender, target).unwrap();

        handle.cancel();
        handle.cancel();
        handle.cancelled().await;
    }

    #[tokio::test]
    async fn parent_context_cancellation_stops_the_task() {
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let target: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let puncher = Puncher::new(Duration::from_millis(20), vec![]);
        let ctx = CancellationToken::new();
        let handle = puncher.punch(&ctx, sender, target).unwrap();

        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle.cancelled())
            .await
            .expect("handle should observe parent cancellation");
    }

    #[tokio::test]
    async fn no_writes_observed_after_cancel() {
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = receiver.local_addr().unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let puncher = Puncher::new(Duration::from_millis(10), vec![]);
        let ctx = CancellationToken::new();
        let handle = puncher.punch(&ctx, sender, receiver_addr).unwrap();

        // Drain a few datagrams, then cancel and ensure draining stops.
        for _ in 0..3 {
            let mut buf = [0u8; 16];
            let _ = tokio::time::timeout(Duration::from_secs(1), receiver.recv_from(&mut buf)).await;
            count.fetch_add(1, Ordering::SeqCst);
        }
        handle.cancel();
        handle.cancelled().await;

        // After cancellation settles, no further datagram should arrive.
        let mut buf = [0u8; 16];
        let res = tokio::time::timeout(Duration::from_millis(100), receiver.recv_from(&mut buf)).await;
        assert!(res.is_err(), "expected no further punch datagrams after cancel");
    }
}
