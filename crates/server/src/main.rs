//! Lobby Server
//!
//! Login and directory server: game clients, game-server launchers and the
//! auth bot connect in, the firewall daemon is dialed out to, and one hub
//! task owns all shared state.

use anyhow::Context;
use lobby_accounts::MemoryStore;
use lobby_config::LobbyConfig;
use lobby_core::{ServerError, Severity};
use lobby_hub::{Hub, HubConfig, LoggingProcessControl, MenuData};
use lobby_network::{bind, hub_channel, run_connector, serve, AuthBotKind, FirewallKind, LauncherKind, PlayerKind};
use lobby_protocol::{CaptureBlob, Registry};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// The supervisor restarts the process after a cooldown
const EXIT_MAJOR: u8 = 2;
/// The supervisor leaves the process down
const EXIT_FATAL: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => {
            info!("Lobby server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Lobby server failed: {:#}", e);
            exit_code(&e)
        }
    }
}

fn exit_code(e: &anyhow::Error) -> ExitCode {
    match e.downcast_ref::<ServerError>().map(ServerError::severity) {
        Some(Severity::Major) => ExitCode::from(EXIT_MAJOR),
        Some(Severity::Fatal) => ExitCode::from(EXIT_FATAL),
        _ => ExitCode::FAILURE,
    }
}

fn hub_config(config: &LobbyConfig) -> HubConfig {
    HubConfig {
        server_name: config.server_name.clone(),
        idle_timeout: config.idle_timeout(),
        allow_unverified: config.allow_unverified,
        restart_game_servers: config.restart_game_servers,
        vote_kick_ban: config.vote_kick_ban(),
        inject_module: config.inject_module.clone(),
        ..HubConfig::default()
    }
}

fn load_menu(config: &LobbyConfig) -> lobby_core::Result<MenuData> {
    let Some(path) = &config.menu_capture else {
        return Ok(MenuData::structured());
    };
    let blob = CaptureBlob::load(path)?;
    let menu = MenuData::from_capture(&blob).map_err(|e| {
        ServerError::Config(format!("capture {} does not hold the menu data: {}", path.display(), e))
    })?;
    info!("Loaded menu capture {} ({} bytes)", path.display(), blob.len());
    Ok(menu)
}

async fn run() -> anyhow::Result<()> {
    info!("Lobby server starting");

    let config = LobbyConfig::load_default().context("loading configuration")?;
    config.display();

    let network = config.network();
    let menu = load_menu(&config).context("loading menu data")?;

    let (tx, rx) = hub_channel();
    let hub = Hub::new(
        hub_config(&config),
        Box::new(MemoryStore::new()),
        Box::new(LoggingProcessControl),
        menu,
        tx.clone(),
    );

    // Bind everything up front so a taken port stops startup
    let clients = bind(network.client_bind).context("binding the client port")?;
    let launchers = bind(network.launcher_bind).context("binding the launcher port")?;
    let authbots = bind(network.authbot_bind).context("binding the auth bot port")?;

    let shutdown = CancellationToken::new();
    let players = PlayerKind {
        registry: Arc::new(Registry::standard()),
        max_chunk: network.client_max_chunk,
        rate_limit: Some(network.rate_limit),
    };
    let launcher_kind = LauncherKind {
        max_chunk: network.control_max_chunk,
        rate_limit: None,
    };
    let authbot_kind = AuthBotKind {
        max_chunk: network.control_max_chunk,
        rate_limit: None,
    };
    let firewall_kind = FirewallKind {
        max_chunk: network.control_max_chunk,
        rate_limit: None,
    };

    spawn_listener("clients", serve(clients, players, tx.clone(), shutdown.clone()));
    spawn_listener("launchers", serve(launchers, launcher_kind, tx.clone(), shutdown.clone()));
    spawn_listener("auth bot", serve(authbots, authbot_kind, tx.clone(), shutdown.clone()));
    tokio::spawn(run_connector(
        network.firewall_addr,
        network.connect_retry,
        firewall_kind,
        tx,
        shutdown.clone(),
    ));

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                ctrl_c.cancel();
            }
            Err(e) => warn!("Cannot listen for interrupts: {}", e),
        }
    });

    info!("Lobby server ready");
    let outcome = hub.run(rx, shutdown.clone()).await;
    shutdown.cancel();
    outcome.context("hub stopped")
}

fn spawn_listener<F>(name: &'static str, listener: F)
where
    F: std::future::Future<Output = lobby_core::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = listener.await {
            error!("Listener for {} failed: {}", name, e);
        }
    });
}
