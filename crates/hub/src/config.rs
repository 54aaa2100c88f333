//! Hub behaviour settings

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Announced to clients in SERVER_INFO
    pub server_name: String,

    /// A player with no inbound traffic for this long is disconnected
    ///
    /// # Default
    /// 60 seconds
    pub idle_timeout: Duration,

    /// Let logins for unknown accounts through with a temporary id
    pub allow_unverified: bool,

    /// Ask the process collaborator to start a game server again when it exits
    pub restart_game_servers: bool,

    /// How long a vote-kicked address stays blacklisted
    ///
    /// # Default
    /// 5 minutes
    pub vote_kick_ban: Duration,

    /// How long a picked server waits for the confirm step
    pub candidate_timeout: Duration,

    /// How long an unfinished vote kick stays open
    pub vote_timeout: Duration,

    /// Lifetime of an auth code
    pub auth_code_ttl: Duration,

    /// Module handed to the process collaborator for every started game server
    pub inject_module: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            server_name: "Lobby".to_string(),
            idle_timeout: Duration::from_secs(60),
            allow_unverified: true,
            restart_game_servers: false,
            vote_kick_ban: Duration::from_secs(300),
            candidate_timeout: Duration::from_secs(30),
            vote_timeout: Duration::from_secs(30),
            auth_code_ttl: Duration::from_secs(600),
            inject_module: None,
        }
    }
}
