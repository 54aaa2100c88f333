//! # Network Configuration
//!
//! Addresses and per-connection limits for the networking layer.
//!
//! # Example
//!
//! ```rust
//! use lobby_network::NetworkConfig;
//! use std::time::Duration;
//!
//! let config = NetworkConfig {
//!     client_bind: "0.0.0.0:9000".parse().unwrap(),
//!     connect_retry: Duration::from_secs(2),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::ratelimit::RateLimit;
use lobby_protocol::{CLIENT_MAX_CHUNK, DEFAULT_MAX_CHUNK};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Network configuration options
///
/// # Default Values
/// - game clients on port 9000, launchers on 9001, the auth bot on 9002
/// - firewall daemon dialed at `127.0.0.1:9801`, retried every 5 seconds
/// - 1450-byte chunks for clients, 0xFFFF for control peers
/// - 50 message burst, 20 messages/second sustained, per connection
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Where game clients connect
    ///
    /// # Default
    /// `0.0.0.0:9000`
    pub client_bind: SocketAddr,

    /// Where game-server launchers connect
    ///
    /// # Default
    /// `0.0.0.0:9001`
    pub launcher_bind: SocketAddr,

    /// Where the auth bot connects
    ///
    /// # Default
    /// `0.0.0.0:9002`
    pub authbot_bind: SocketAddr,

    /// Firewall daemon to dial out to
    ///
    /// # Default
    /// `127.0.0.1:9801`
    pub firewall_addr: SocketAddr,

    /// Fixed delay between outgoing connection attempts
    ///
    /// # Notes
    /// - Applies after a refusal, a timeout and a dropped connection alike
    /// - There is no attempt limit
    pub connect_retry: Duration,

    /// Largest chunk on the game client channel
    ///
    /// # Default
    /// 1450 bytes, which keeps a chunk inside one typical Ethernet frame
    pub client_max_chunk: usize,

    /// Largest chunk on control channels
    ///
    /// # Default
    /// 65535 bytes, the most a length word can describe
    pub control_max_chunk: usize,

    /// Inbound message rate allowed per game client connection
    ///
    /// # Notes
    /// - Exceeding it disconnects the client
    /// - Control peers are trusted and not limited
    pub rate_limit: RateLimit,
}

fn any(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            client_bind: any(9000),
            launcher_bind: any(9001),
            authbot_bind: any(9002),
            firewall_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9801)),
            connect_retry: Duration::from_secs(5),
            client_max_chunk: CLIENT_MAX_CHUNK,
            control_max_chunk: DEFAULT_MAX_CHUNK,
            rate_limit: RateLimit::default(),
        }
    }
}

impl NetworkConfig {
    /// Validate the configuration
    ///
    /// # Checks
    /// - chunk sizes are within `1..=65535`
    /// - the three listeners use distinct ports
    /// - the retry delay is non-zero
    /// - the rate limit allows at least one message
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("client_max_chunk", self.client_max_chunk),
            ("control_max_chunk", self.control_max_chunk),
        ] {
            if value == 0 || value > DEFAULT_MAX_CHUNK {
                return Err(format!("{} must be 1-65535, got {}", name, value));
            }
        }

        let ports = [
            self.client_bind.port(),
            self.launcher_bind.port(),
            self.authbot_bind.port(),
        ];
        if ports[0] == ports[1] || ports[0] == ports[2] || ports[1] == ports[2] {
            return Err(format!("listener ports must differ, got {:?}", ports));
        }

        if self.connect_retry.is_zero() {
            return Err("connect_retry must be > 0".to_string());
        }

        if self.rate_limit.burst == 0 {
            return Err("rate_limit_burst must be > 0".to_string());
        }

        if self.rate_limit.per_second <= 0.0 {
            tracing::warn!("rate_limit_per_sec is 0, clients can only ever send the initial burst");
        }

        Ok(())
    }
}
