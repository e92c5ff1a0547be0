//! Windows platform implementation
//!
//! This module provides Windows-specific implementations for TUN/TAP device
//! management using the Wintun driver, routing, and DNS configuration.

use crate::error::{Result, WgAgentError};
use crate::platform::{detection, Platform, PlatformInfo};
use tracing::{debug, info, warn};

/// Windows platform implementation
pub struct WindowsPlatform {
    info: PlatformInfo,
}

impl WindowsPlatform {
    /// Create a new Windows platform instance
    pub fn new() -> Self {
        Self {
            info: detection::detect_environment(),
        }
    }
}

impl Default for WindowsPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for WindowsPlatform {
    fn info(&self) -> &PlatformInfo {
        &self.info
    }

    fn create_interface(&self, name: &str) -> Result<()> {
        info!("Creating Windows interface: {}", name);

        // Note: Windows will use Wintun driver for TUN/TAP management
        // This will be fully implemented in Phase 4 with WireGuard integration
        
        debug!("Interface {} will be created using Wintun driver", name);
        warn!("Windows implementation is a stub - requires Wintun driver integration");
        
        Err(WgAgentError::Platform(
            "Windows implementation not yet complete".to_string()
        ))
    }

    fn destroy_interface(&self, name: &str) -> Result<()> {
        info!("Destroying Windows interface: {}", name);
        
        warn!("Windows implementation is a stub");
        Ok(())
    }

    fn set_mtu(&self, interface: &str, mtu: u16) -> Result<()> {
        info!("Setting MTU for interface {}: {}", interface, mtu);
        
        // Windows MTU configuration would use netsh or IP Helper API
        warn!("Windows MTU configuration not yet implemented");
        Ok(())
    }

    fn interface_up(&self, interface: &str) -> Result<()> {
        info!("Bringing interface {} up", interface);
        
        warn!("Windows interface_up not yet implemented");
        Ok(())
    }

    fn interface_down(&self, interface: &str) -> Result<()> {
        info!("Bringing interface {} down", interface);
        
        warn!("Windows interface_down not yet implemented");
        Ok(())
    }

    fn assign_address(&self, interface: &str, cidr: &str) -> Result<()> {
        info!("Assigning address {} to interface {}", cidr, interface);

        warn!("Windows assign_address not yet implemented");
        Ok(())
    }

    fn configure_routes(&self, interface: &str, routes: &[String]) -> Result<()> {
        info!("Configuring {} routes for interface {}", routes.len(), interface);

        // Windows routing would use 'route add' or IP Helper API
        for route in routes {
            debug!("Would add route: {} via {}", route, interface);
        }

        warn!("Windows route configuration not yet implemented");
        Ok(())
    }

    fn remove_routes(&self, interface: &str, routes: &[String]) -> Result<()> {
        info!("Removing {} routes from interface {}", routes.len(), interface);

        for route in routes {
            debug!("Would remove route: {} via {}", route, interface);
        }

        warn!("Windows route removal not yet implemented");
        Ok(())
    }

    fn configure_dns(&self, interface: &str, dns_servers: &[String]) -> Result<()> {
        info!("Configuring {} DNS servers for interface {}", dns_servers.len(), interface);

        // Windows DNS configuration would use netsh or IP Helper API
        for dns in dns_servers {
            debug!("Would configure DNS: {}", dns);
        }

        warn!("Windows DNS configuration not yet implemented");
        Ok(())
    }

    fn remove_dns(&self, interface: &str) -> Result<()> {
        info!("Removing DNS configuration for interface {}", interface);
        
        warn!("Windows DNS removal not yet implemented");
        Ok(())
    }

    fn check_capabilities(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();

        // Check if running as Administrator
        if !self.info.is_privileged {
            missing.push("Administrator privileges required".to_string());
        }

        // Check for Wintun driver (would be checked in Phase 4)
        missing.push("Wintun driver required (not yet checked)".to_string());

        Ok(missing)
    }

    fn create_tun_device(&self, name: &str, mtu: u16) -> Result<tun::platform::Device> {
        info!("Attempting to create TUN device '{}' with MTU {} on Windows", name, mtu);
        
        // Windows requires Wintun driver integration which is not yet implemented
        // The tun crate supports Wintun but requires additional setup
        warn!("Windows TUN device creation not yet implemented - requires Wintun driver");
        
        Err(WgAgentError::TunDevice(
            "Windows TUN device creation not yet implemented (requires Wintun driver integration)".to_string()
        ))
    }
}
