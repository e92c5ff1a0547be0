//! TOML configuration file parser
//!
//! This module handles parsing of TOML configuration files for standalone
//! agent operation. It supports the Harmony configuration schema with multiple
//! named networks.

use crate::config::{Config, HttpConfig, NetworkConfig, PeerConfig};
use crate::error::{Result, WgAgentError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// TOML configuration file structure
/// Matches the Harmony configuration schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Network configurations
    #[serde(default)]
    pub network: HashMap<String, TomlNetworkConfig>,

    /// Optional rendezvous server to host from this process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendezvous_server: Option<TomlHttpConfig>,
}

/// TOML network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlNetworkConfig {
    /// Enable WireGuard for this network
    #[serde(default)]
    pub enable_wireguard: bool,

    /// WireGuard interface name
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Maximum Transmission Unit
    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// Path to private key file
    pub private_key_path: String,

    /// Interface IP address (CIDR notation)
    pub address: Option<String>,

    /// DNS servers
    #[serde(default)]
    pub dns: Vec<String>,

    /// HTTP configuration (optional, from Harmony)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<TomlHttpConfig>,

    /// WireGuard peers
    #[serde(default)]
    pub peers: Vec<TomlPeerConfig>,

    /// This side's identity when registering with a rendezvous server
    #[serde(default)]
    pub local_peer_id: String,

    /// The remote peer id to wait for and connect to via the rendezvous
    #[serde(default)]
    pub remote_peer_id: String,

    /// Rendezvous base URL
    #[serde(default)]
    pub rendezvous_url: String,

    /// STUN servers tried, in order, for public address discovery
    #[serde(default)]
    pub stun_servers: Vec<String>,

    /// Overlay address (CIDR) assigned once a peer-connector tunnel comes up
    #[serde(default)]
    pub iface_ipv4_cidr: String,

    /// Replace the device's peer list on reconfiguration instead of merging
    #[serde(default)]
    pub replace_peers: bool,

    /// Create the TUN interface if it does not already exist
    #[serde(default = "default_create_iface")]
    pub create_iface: bool,

    /// Seconds between rendezvous polls while waiting for the remote peer
    #[serde(default = "default_wait_interval_secs")]
    pub wait_interval_secs: u64,

    /// Milliseconds between hole-punch packets
    #[serde(default = "default_puncher_interval_ms")]
    pub puncher_interval_ms: u64,

    /// UDP port the tunnel socket binds to. `0` means "let the OS pick".
    #[serde(default)]
    pub listen_port: u16,

    /// Seconds between WireGuard keepalive packets once the tunnel is up.
    #[serde(default = "default_keepalive")]
    pub keepalive_interval_secs: u16,
}

/// TOML HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlHttpConfig {
    /// Bind address
    pub bind_address: String,

    /// Bind port
    pub bind_port: u16,
}

/// TOML peer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlPeerConfig {
    /// Peer name
    pub name: String,

    /// Base64-encoded public key
    pub public_key: String,

    /// Peer endpoint
    pub endpoint: String,

    /// Allowed IP addresses/ranges
    pub allowed_ips: Vec<String>,

    /// Persistent keepalive interval in seconds
    #[serde(default = "default_keepalive")]
    pub persistent_keepalive_secs: u16,
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            WgAgentError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: TomlConfig = toml::from_str(&contents).map_err(|e| {
            WgAgentError::Config(format!("Failed to parse TOML config: {}", e))
        })?;

        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| {
            WgAgentError::Config(format!("Failed to parse TOML: {}", e))
        })
    }
}

// Convert TOML config to internal Config
impl From<TomlConfig> for Config {
    fn from(toml: TomlConfig) -> Self {
        let mut config = Config::new();

        for (name, network) in toml.network {
            config.add_network(name, network.into());
        }

        config.rendezvous_server = toml.rendezvous_server.map(|h| h.into());

        config
    }
}

impl From<TomlNetworkConfig> for NetworkConfig {
    fn from(toml: TomlNetworkConfig) -> Self {
        NetworkConfig {
            enable_wireguard: toml.enable_wireguard,
            interface: toml.interface,
            mtu: toml.mtu,
            private_key_path: toml.private_key_path,
            dns: toml.dns,
            address: toml.address,
            peers: toml.peers.into_iter().map(|p| p.into()).collect(),
            http: toml.http.map(|h| h.into()),
            local_peer_id: toml.local_peer_id,
            remote_peer_id: toml.remote_peer_id,
            rendezvous_url: toml.rendezvous_url,
            stun_servers: toml.stun_servers,
            iface_ipv4_cidr: toml.iface_ipv4_cidr,
            replace_peers: toml.replace_peers,
            create_iface: toml.create_iface,
            wait_interval_secs: toml.wait_interval_secs,
            puncher_interval_ms: toml.puncher_interval_ms,
            listen_port: toml.listen_port,
            keepalive_interval_secs: toml.keepalive_interval_secs,
        }
    }
}

impl From<TomlHttpConfig> for HttpConfig {
    fn from(toml: TomlHttpConfig) -> Self {
        HttpConfig {
            bind_address: toml.bind_address,
            bind_port: toml.bind_port,
        }
    }
}

impl From<TomlPeerConfig> for PeerConfig {
    fn from(toml: TomlPeerConfig) -> Self {
        PeerConfig {
            name: toml.name,
            public_key: toml.public_key,
            endpoint: toml.endpoint,
            allowed_ips: toml.allowed_ips,
            persistent_keepalive_secs: toml.persistent_keepalive_secs,
        }
    }
}

// Default value functions
fn default_interface() -> String {
    "wg0".to_string()
}

fn default_mtu() -> u16 {
    1280
}

fn default_keepalive() -> u16 {
    25
}

fn default_create_iface() -> bool {
    true
}

fn default_wait_interval_secs() -> u64 {
    1
}

fn default_puncher_interval_ms() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_toml() {
        let toml = r#"
            [network.default]
            enable_wireguard = true
            interface = "wg0"
            mtu = 1420
            private_key_path = "/etc/wg-agent/private.key"
            dns = ["10.100.0.2"]

            [[network.default.peers]]
            name = "test-peer"
            public_key = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMN=="
            endpoint = "example.com:51820"
            allowed_ips = ["10.0.0.0/8"]
            persistent_keepalive_secs = 25
        "#;

        let config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        assert!(config.network.contains_key("default"));

        let network = &config.network["default"];
        assert!(network.enable_wireguard);
        assert_eq!(network.interface, "wg0");
        assert_eq!(network.mtu, 1420);
        assert_eq!(network.dns.len(), 1);
        assert_eq!(network.peers.len(), 1);
    }

    #[test]
    fn test_parse_toml_with_http() {
        let toml = r#"
            [network.default]
            enable_wireguard = true
            interface = "wg0"
            mtu = 1280
            private_key_path = "/etc/wg-agent/private.key"

            [network.default.http]
            bind_address = "0.0.0.0"
            bind_port = 8081
        "#;

        let config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        let network = &config.network["default"];
        assert!(network.http.is_some());

        let http = network.http.as_ref().unwrap();
        assert_eq!(http.bind_address, "0.0.0.0");
        assert_eq!(http.bind_port, 8081);
    }

    #[test]
    fn test_parse_multiple_networks() {
        let toml = r#"
            [network.default]
            enable_wireguard = true
            interface = "wg0"
            private_key_path = "/etc/wg-agent/default.key"

            [network.production]
            enable_wireguard = true
            interface = "wg1"
            private_key_path = "/etc/wg-agent/prod.key"
        "#;

        let config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        assert_eq!(config.network.len(), 2);
        assert!(config.network.contains_key("default"));
        assert!(config.network.contains_key("production"));
    }

    #[test]
    fn test_parse_with_defaults() {
        let toml = r#"
            [network.minimal]
            private_key_path = "/etc/wg-agent/private.key"
        "#;

        let config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        let network = &config.network["minimal"];
        
        // Check defaults
        assert_eq!(network.interface, "wg0");
        assert_eq!(network.mtu, 1280);
        assert!(!network.enable_wireguard);
        assert!(network.dns.is_empty());
        assert!(network.peers.is_empty());
    }

    #[test]
    fn test_convert_to_config() {
        let toml = r#"
            [network.default]
            enable_wireguard = true
            interface = "wg0"
            mtu = 1420
            private_key_path = "/etc/wg-agent/private.key"
        "#;

        let toml_config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        let config: Config = toml_config.into();

        assert_eq!(config.networks.len(), 1);
        assert!(config.networks.contains_key("default"));

        let network = config.get_network("default").unwrap();
        assert!(network.enable_wireguard);
        assert_eq!(network.interface, "wg0");
    }

    #[test]
    fn test_parse_peer_connector_network() {
        let toml = r#"
            [network.punch]
            enable_wireguard = true
            interface = "wgpunch0"
            private_key_path = "/etc/wg-agent/private.key"
            local_peer_id = "laptop-a"
            remote_peer_id = "laptop-b"
            rendezvous_url = "http://rendezvous.example.com:8787"
            stun_servers = ["stun.example.com:3478"]
            iface_ipv4_cidr = "10.10.0.2/32"
        "#;

        let config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        let network = &config.network["punch"];

        assert_eq!(network.local_peer_id, "laptop-a");
        assert_eq!(network.remote_peer_id, "laptop-b");
        assert_eq!(network.rendezvous_url, "http://rendezvous.example.com:8787");
        assert_eq!(network.stun_servers, vec!["stun.example.com:3478"]);
        assert_eq!(network.iface_ipv4_cidr, "10.10.0.2/32");
        // peer-connector defaults
        assert!(network.create_iface);
        assert!(!network.replace_peers);
        assert_eq!(network.wait_interval_secs, 1);
        assert_eq!(network.puncher_interval_ms, 300);

        let config: Config = config.into();
        let network = config.get_network("punch").unwrap();
        assert!(network.is_peer_connector());
    }

    #[test]
    fn test_rendezvous_server_section() {
        let toml = r#"
            [rendezvous_server]
            bind_address = "0.0.0.0"
            bind_port = 8787
        "#;

        let toml_config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        let config: Config = toml_config.into();

        let rendezvous = config.rendezvous_server.expect("expected rendezvous server config");
        assert_eq!(rendezvous.bind_address, "0.0.0.0");
        assert_eq!(rendezvous.bind_port, 8787);
    }
}
