//! Storage backend for rendezvous records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::{PeerDescriptor, RendezvousRecord};
use crate::error::Result;

/// Capability set a rendezvous backend must provide. The in-memory
/// implementation below is the reference; a persistent backend is a future
/// extension (see design notes on rendezvous record TTL).
#[async_trait]
pub trait Store: Send + Sync {
    /// Replace any prior record for `descriptor.peer_id` with `descriptor`.
    async fn register(&self, descriptor: PeerDescriptor) -> Result<()>;

    /// Look up the current record for `peer_id`, if any.
    async fn lookup(&self, peer_id: &str) -> Result<Option<PeerDescriptor>>;
}

/// Reference `Store` implementation: an in-process map guarded by a
/// reader/writer lock. Reads (lookups) proceed concurrently; writes
/// (registrations) are exclusive. Records are never expired or deleted by
/// this store; stale entries are tolerated (see design notes).
#[derive(Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, RendezvousRecord>>>,
}

impl MemoryStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register(&self, descriptor: PeerDescriptor) -> Result<()> {
        descriptor.validate()?;
        let mut records = self.records.write().await;
        records.insert(descriptor.peer_id.clone(), RendezvousRecord::new(descriptor));
        Ok(())
    }

    async fn lookup(&self, peer_id: &str) -> Result<Option<PeerDescriptor>> {
        let records = self.records.read().await;
        Ok(records.get(peer_id).map(|r| r.descriptor.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(peer_id: &str, endpoint: &str) -> PeerDescriptor {
        PeerDescriptor {
            peer_id: peer_id.to_string(),
            public_key: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [9u8; 32]),
            endpoint: endpoint.to_string(),
            allowed_ips: vec!["10.10.0.2/32".into()],
        }
    }

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        let store = MemoryStore::new();
        store.register(descriptor("a", "1.2.3.4:1000")).await.unwrap();
        let found = store.lookup("a").await.unwrap();
        assert_eq!(found.unwrap().endpoint, "1.2.3.4:1000");
    }

    #[tokio::test]
    async fn lookup_of_unknown_peer_is_none() {
        let store = MemoryStore::new();
        assert!(store.lookup("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_registration_overwrites_the_first() {
        let store = MemoryStore::new();
        store.register(descriptor("a", "1.2.3.4:1000")).await.unwrap();
        store.register(descriptor("a", "5.6.7.8:2000")).await.unwrap();
        let found = store.lookup("a").await.unwrap().unwrap();
        assert_eq!(found.endpoint, "5.6.7.8:2000");
    }

    #[tokio::test]
    async fn register_rejects_invalid_descriptor() {
        let store = MemoryStore::new();
        let mut bad = descriptor("a", "1.2.3.4:1000");
        bad.allowed_ips = vec!["not-a-cidr".into()];
        assert!(store.register(bad).await.is_err());
    }
}
