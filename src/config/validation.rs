//! Configuration validation functions
//!
//! This module provides validation for all configuration fields including
//! interface names, IP addresses, file paths, keys, and network parameters.

use crate::error::{Result, WgAgentError};
use std::net::IpAddr;
use std::path::Path;

/// Validate interface name (alphanumeric, max 15 chars)
pub fn validate_interface_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(WgAgentError::Config(
            "Interface name cannot be empty".to_string(),
        ));
    }

    if name.len() > 15 {
        return Err(WgAgentError::Config(format!(
            "Interface name '{}' exceeds maximum length of 15 characters",
            name
        )));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(WgAgentError::Config(format!(
            "Interface name '{}' contains invalid characters (only alphanumeric, '_', and '-' allowed)",
            name
        )));
    }

    Ok(())
}

/// Validate MTU value (1280-1500 range for WireGuard)
pub fn validate_mtu(mtu: u16) -> Result<()> {
    if !(1280..=1500).contains(&mtu) {
        return Err(WgAgentError::Config(format!(
            "MTU value {} is out of valid range (1280-1500)",
            mtu
        )));
    }
    Ok(())
}

/// Validate IP address
pub fn validate_ip_address(ip: &str) -> Result<()> {
    ip.parse::<IpAddr>()
        .map_err(|_| WgAgentError::Config(format!("Invalid IP address: {}", ip)))?;
    Ok(())
}

/// Validate CIDR notation (IP/prefix)
pub fn validate_cidr(cidr: &str) -> Result<()> {
    let parts: Vec<&str> = cidr.split('/').collect();
    
    if parts.len() != 2 {
        return Err(WgAgentError::Config(format!(
            "Invalid CIDR notation: {} (expected format: IP/prefix)",
            cidr
        )));
    }

    // Validate IP part
    validate_ip_address(parts[0])?;

    // Validate prefix length
    let prefix: u8 = parts[1].parse().map_err(|_| {
        WgAgentError::Config(format!("Invalid prefix length in CIDR: {}", cidr))
    })?;

    // Check prefix range based on IP version
    let ip: IpAddr = parts[0].parse().unwrap();
    let max_prefix = match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };

    if prefix > max_prefix {
        return Err(WgAgentError::Config(format!(
            "Prefix length {} exceeds maximum {} for IP address {}",
            prefix, max_prefix, parts[0]
        )));
    }

    Ok(())
}

/// Validate endpoint format (host:port)
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    let parts: Vec<&str> = endpoint.rsplitn(2, ':').collect();
    
    if parts.len() != 2 {
        return Err(WgAgentError::Config(format!(
            "Invalid endpoint format: {} (expected format: host:port)",
            endpoint
        )));
    }

    // Validate port
    let port: u16 = parts[0].parse().map_err(|_| {
        WgAgentError::Config(format!("Invalid port in endpoint: {}", endpoint))
    })?;

    if port == 0 {
        return Err(WgAgentError::Config(
            "Port number cannot be 0".to_string(),
        ));
    }

    // Host validation is lenient (can be hostname or IP)
    let host = parts[1];
    if host.is_empty() {
        return Err(WgAgentError::Config(
            "Host cannot be empty in endpoint".to_string(),
        ));
    }

    Ok(())
}

/// Validate file path exists and is readable
pub fn validate_file_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(WgAgentError::Config(
            "File path cannot be empty".to_string(),
        ));
    }

    let path_obj = Path::new(path);
    
    // Note: We don't check if the file exists here because it might be created later
    // Just validate the path is syntactically valid
    if path_obj.to_str().is_none() {
        return Err(WgAgentError::Config(format!(
            "Invalid file path: {}",
            path
        )));
    }

    Ok(())
}

/// Validate base64-encoded public key
pub fn validate_public_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(WgAgentError::Config(
            "Public key cannot be empty".to_string(),
        ));
    }

    // WireGuard keys are 32 bytes, base64 encoded = 44 characters (with padding)
    if key.len() != 44 {
        return Err(WgAgentError::Config(format!(
            "Invalid public key length: {} (expected 44 characters)",
            key.len()
        )));
    }

    // Basic base64 character validation
    if !key.chars().all(|c| c.is_alphanumeric() || c == '+' || c == '/' || c == '=') {
        return Err(WgAgentError::Config(
            "Public key contains invalid base64 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate keepalive timeout
pub fn validate_keepalive(secs: u16) -> Result<()> {
    // Reasonable range: 0 (disabled) or 10-300 seconds
    if secs > 0 && secs < 10 {
        return Err(WgAgentError::Config(format!(
            "Keepalive interval {} is too short (minimum 10 seconds or 0 to disable)",
            secs
        )));
    }

    if secs > 300 {
        return Err(WgAgentError::Config(format!(
            "Keepalive interval {} is too long (maximum 300 seconds)",
            secs
        )));
    }

    Ok(())
}

/// Validate a peer id used to register/discover a peer with the rendezvous
/// (non-empty, no whitespace, reasonable length)
pub fn validate_peer_id(peer_id: &str) -> Result<()> {
    if peer_id.is_empty() {
        return Err(WgAgentError::Config("Peer id cannot be empty".to_string()));
    }

    if peer_id.len() > 128 {
        return Err(WgAgentError::Config(format!(
            "Peer id '{}' exceeds maximum length of 128 characters",
            peer_id
        )));
    }

    if peer_id.chars().any(|c| c.is_whitespace()) {
        return Err(WgAgentError::Config(format!(
            "Peer id '{}' cannot contain whitespace",
            peer_id
        )));
    }

    Ok(())
}

/// Validate a rendezvous base URL (must parse as http(s))
pub fn validate_rendezvous_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(WgAgentError::Config(
            "Rendezvous URL cannot be empty".to_string(),
        ));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(WgAgentError::Config(format!(
            "Rendezvous URL '{}' must start with http:// or https://",
            url
        )));
    }

    Ok(())
}

/// Validate the interval, in seconds, between rendezvous polls while waiting
/// for a remote peer to register (1-300 seconds)
pub fn validate_wait_interval(secs: u64) -> Result<()> {
    if !(1..=300).contains(&secs) {
        return Err(WgAgentError::Config(format!(
            "Wait interval {} is out of valid range (1-300 seconds)",
            secs
        )));
    }
    Ok(())
}

/// Validate the interval, in milliseconds, between hole-punch packets
/// (50-5000 milliseconds)
pub fn validate_puncher_interval(ms: u64) -> Result<()> {
    if !(50..=5000).contains(&ms) {
        return Err(WgAgentError::Config(format!(
            "Puncher interval {} is out of valid range (50-5000 milliseconds)",
            ms
        )));
    }
    Ok(())
}
