//! Lobby Configuration Management
//!
//! Loads `lobby.cfg`, a `key = value` file with `#` comments, over built-in
//! defaults. Unknown keys are ignored; values that do not parse keep their
//! default.

use lobby_core::{Result, ServerError};
use lobby_network::{NetworkConfig, RateLimit};
use std::fmt::Display;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "lobby.cfg";

/// Complete lobby configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LobbyConfig {
    // ========== Listeners ==========
    /// Interface all listeners bind to (from "bind_ip", default 0.0.0.0)
    pub bind_ip: IpAddr,
    /// Game client port (from "client_port", default 9000)
    pub client_port: u16,
    /// Launcher control port (from "launcher_port", default 9001)
    pub launcher_port: u16,
    /// Auth bot control port (from "authbot_port", default 9002)
    pub authbot_port: u16,

    // ========== Outgoing ==========
    /// Firewall daemon address (from "firewall_address")
    pub firewall_address: SocketAddr,
    /// Seconds between connection attempts (from "connect_retry_secs", default 5)
    pub connect_retry_secs: u64,

    // ========== Connections ==========
    /// Seconds without traffic before a player is dropped (from "idle_timeout_secs", default 60)
    pub idle_timeout_secs: u64,
    pub client_max_chunk: usize,
    pub control_max_chunk: usize,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: f64,

    // ========== Behaviour ==========
    /// Let unknown accounts in with a temporary id (from "allow_unverified", default true)
    pub allow_unverified: bool,
    /// Ask for a restart when a game server process exits (from "restart_game_servers")
    pub restart_game_servers: bool,
    /// How long a vote-kicked address stays blacklisted (from "vote_kick_ban_secs", default 300)
    pub vote_kick_ban_secs: u64,
    /// Capture file with the menu data bodies (from "menu_capture")
    pub menu_capture: Option<PathBuf>,
    /// Module injected into started game server processes (from "inject_module")
    pub inject_module: Option<PathBuf>,
    /// Name announced in SERVER_INFO (from "server_name")
    pub server_name: String,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            client_port: 9000,
            launcher_port: 9001,
            authbot_port: 9002,
            firewall_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9801),
            connect_retry_secs: 5,
            idle_timeout_secs: 60,
            client_max_chunk: 1450,
            control_max_chunk: 0xFFFF,
            rate_limit_burst: 50,
            rate_limit_per_sec: 20.0,
            allow_unverified: true,
            restart_game_servers: false,
            vote_kick_ban_secs: 300,
            menu_capture: None,
            inject_module: None,
            server_name: "Lobby".to_string(),
        }
    }
}

impl LobbyConfig {
    /// Load and validate a config file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::parse(&content);
        config.validate()?;
        Ok(config)
    }

    /// Load `lobby.cfg` if it exists, defaults otherwise
    pub fn load_default() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::load_from_file(DEFAULT_CONFIG_FILE)
        } else {
            tracing::info!("{} not found, using defaults", DEFAULT_CONFIG_FILE);
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse config file content over the defaults
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) => config.parse_option(key.trim(), value.trim()),
                None => tracing::warn!("Ignoring malformed config line: {}", line),
            }
        }

        config
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key {
            "bind_ip" => parse_into(key, value, &mut self.bind_ip),
            "client_port" => parse_into(key, value, &mut self.client_port),
            "launcher_port" => parse_into(key, value, &mut self.launcher_port),
            "authbot_port" => parse_into(key, value, &mut self.authbot_port),
            "firewall_address" => parse_into(key, value, &mut self.firewall_address),
            "connect_retry_secs" => parse_into(key, value, &mut self.connect_retry_secs),
            "idle_timeout_secs" => parse_into(key, value, &mut self.idle_timeout_secs),
            "client_max_chunk" => parse_into(key, value, &mut self.client_max_chunk),
            "control_max_chunk" => parse_into(key, value, &mut self.control_max_chunk),
            "rate_limit_burst" => parse_into(key, value, &mut self.rate_limit_burst),
            "rate_limit_per_sec" => parse_into(key, value, &mut self.rate_limit_per_sec),
            "allow_unverified" => parse_bool(key, value, &mut self.allow_unverified),
            "restart_game_servers" => parse_bool(key, value, &mut self.restart_game_servers),
            "vote_kick_ban_secs" => parse_into(key, value, &mut self.vote_kick_ban_secs),
            "menu_capture" => {
                self.menu_capture = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "inject_module" => {
                self.inject_module = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "server_name" => self.server_name = value.into(),
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        let ports = [self.client_port, self.launcher_port, self.authbot_port];
        if ports.contains(&0) {
            return Err(ServerError::Config("listener ports must be non-zero".into()));
        }
        self.network().validate().map_err(ServerError::Config)?;
        if self.idle_timeout_secs == 0 {
            return Err(ServerError::Config("idle_timeout_secs must be > 0".into()));
        }
        if !(self.rate_limit_per_sec.is_finite() && self.rate_limit_per_sec >= 0.0) {
            return Err(ServerError::Config(format!(
                "rate_limit_per_sec must be a non-negative number, got {}",
                self.rate_limit_per_sec
            )));
        }
        if self.server_name.is_empty() {
            return Err(ServerError::Config("server_name must not be empty".into()));
        }
        Ok(())
    }

    /// Settings for the networking layer
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            client_bind: self.client_bind(),
            launcher_bind: self.launcher_bind(),
            authbot_bind: self.authbot_bind(),
            firewall_addr: self.firewall_address,
            connect_retry: self.connect_retry(),
            client_max_chunk: self.client_max_chunk,
            control_max_chunk: self.control_max_chunk,
            rate_limit: RateLimit {
                burst: self.rate_limit_burst,
                per_second: self.rate_limit_per_sec,
            },
        }
    }

    pub fn client_bind(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.client_port)
    }

    pub fn launcher_bind(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.launcher_port)
    }

    pub fn authbot_bind(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.authbot_port)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn vote_kick_ban(&self) -> Duration {
        Duration::from_secs(self.vote_kick_ban_secs)
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Lobby configuration:");
        tracing::info!("  Server name: {}", self.server_name);
        tracing::info!(
            "  Listeners: clients {}, launchers {}, auth bot {}",
            self.client_bind(),
            self.launcher_bind(),
            self.authbot_bind()
        );
        tracing::info!(
            "  Firewall: {} (retry every {}s)",
            self.firewall_address,
            self.connect_retry_secs
        );
        tracing::info!("  Idle timeout: {}s", self.idle_timeout_secs);
        tracing::info!(
            "  Chunks: client {} / control {}",
            self.client_max_chunk,
            self.control_max_chunk
        );
        tracing::info!(
            "  Rate limit: burst {}, {}/s",
            self.rate_limit_burst,
            self.rate_limit_per_sec
        );
        tracing::info!("  Unverified logins: {}", self.allow_unverified);
        tracing::info!("  Restart game servers: {}", self.restart_game_servers);
        tracing::info!("  Vote kick ban: {}s", self.vote_kick_ban_secs);
        match &self.menu_capture {
            Some(path) => tracing::info!("  Menu capture: {}", path.display()),
            None => tracing::info!("  Menu capture: (none, structured menus)"),
        }
        if let Some(path) = &self.inject_module {
            tracing::info!("  Inject module: {}", path.display());
        }
    }
}

fn parse_into<T>(key: &str, value: &str, slot: &mut T)
where
    T: FromStr + Display,
{
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!("Invalid value for {}: {:?}, keeping {}", key, value, slot),
    }
}

/// Accepts true/false, yes/no, on/off and 1/0
fn parse_bool(key: &str, value: &str, slot: &mut bool) {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => *slot = true,
        "false" | "no" | "off" | "0" => *slot = false,
        _ => tracing::warn!("Invalid value for {}: {:?}, keeping {}", key, value, slot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LobbyConfig::default();
        assert_eq!(config.client_port, 9000);
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.client_max_chunk, 1450);
        assert!(config.allow_unverified);
        assert!(config.menu_capture.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_simple_config() {
        let config_text = r#"
# lobby
server_name = Test Lobby
client_port = 7000
allow_unverified = no
firewall_address = 10.0.0.5:9900
menu_capture = captures/menu.bin
inject_module = hooks/lobby.dll
"#;
        let config = LobbyConfig::parse(config_text);
        assert_eq!(config.server_name, "Test Lobby");
        assert_eq!(config.client_port, 7000);
        assert!(!config.allow_unverified);
        assert_eq!(config.firewall_address, "10.0.0.5:9900".parse().unwrap());
        assert_eq!(config.menu_capture, Some(PathBuf::from("captures/menu.bin")));
        assert_eq!(config.inject_module, Some(PathBuf::from("hooks/lobby.dll")));
    }

    #[test]
    fn test_empty_path_clears_option() {
        let config = LobbyConfig::parse("inject_module =\nmenu_capture = ");
        assert!(config.inject_module.is_none());
        assert!(config.menu_capture.is_none());
    }

    #[test]
    fn test_bad_value_keeps_default() {
        let config = LobbyConfig::parse("client_port = lots\nidle_timeout_secs = -3\nunknown = 1");
        assert_eq!(config.client_port, 9000);
        assert_eq!(config.idle_timeout_secs, 60);
    }

    #[test]
    fn test_validate_rejects_port_clash() {
        let config = LobbyConfig::parse("launcher_port = 9000");
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_chunk() {
        let config = LobbyConfig::parse("client_max_chunk = 70000");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_settings_follow_config() {
        let config = LobbyConfig::parse("bind_ip = 127.0.0.1\nlauncher_port = 7001\nrate_limit_burst = 8");
        let network = config.network();
        assert_eq!(network.launcher_bind, "127.0.0.1:7001".parse().unwrap());
        assert_eq!(network.rate_limit.burst, 8);
        assert!(config.validate().is_ok());

        // Checks owned by the networking layer surface as config errors
        let config = LobbyConfig::parse("rate_limit_burst = 0");
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
        let config = LobbyConfig::parse("connect_retry_secs = 0");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_name = From File").unwrap();
        writeln!(file, "vote_kick_ban_secs = 30").unwrap();

        let config = LobbyConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.server_name, "From File");
        assert_eq!(config.vote_kick_ban(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connect_retry_secs = 0").unwrap();
        assert!(LobbyConfig::load_from_file(file.path()).is_err());

        let missing = LobbyConfig::load_from_file("/nonexistent/lobby.cfg");
        assert!(matches!(missing, Err(ServerError::Config(_))));
    }
}
