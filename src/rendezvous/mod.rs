//! Rendezvous protocol: peer registration, discovery, and the HTTP service
//! that brokers it.
//!
//! Two peers with no prior communication channel register their public
//! descriptor here and poll for each other's arrival. The rendezvous never
//! participates in the data plane; once both sides have discovered each
//! other it is no longer consulted.

mod client;
mod server;
mod store;
mod types;

pub use client::RendezvousClient;
pub use server::RendezvousServer;
pub use store::{MemoryStore, Store};
pub use types::{PeerDescriptor, RendezvousRecord};
