mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wi_config::registration::{install_registration, render_snippet, ClientConfigFile, ServerRegistration};
use wi_config::{AppConfig, ConfigManager};
use wi_mcp::PageRegistry;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let config_manager = load_config_manager(&cli).await;

    init_logging(&config_manager.get());

    let result = match cli.command {
        None => serve(config_manager).await,
        Some(Command::ClaudeConfig { url, name, install }) => {
            claude_config(&config_manager, url, &name, install)
        }
        Some(Command::CheckConfig { path }) => check_config(&path),
        Some(Command::Doctor { url }) => doctor(&config_manager, url).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load settings from --config or the default location, falling back to
/// defaults when loading fails
async fn load_config_manager(cli: &Cli) -> Arc<ConfigManager> {
    let loaded = match &cli.config {
        Some(path) => ConfigManager::load_from_path(path.clone()).await,
        None => ConfigManager::load().await,
    };

    let manager = loaded.unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        let path = cli
            .config
            .clone()
            .or_else(|| wi_config::paths::config_file().ok())
            .unwrap_or_else(|| std::path::PathBuf::from("settings.yaml"));
        ConfigManager::new(AppConfig::default(), path)
    });

    Arc::new(manager)
}

/// Initialize logging
///
/// RUST_LOG wins when set; otherwise the configured level applies to our
/// crates and everything else stays at warn.
fn init_logging(config: &AppConfig) {
    let level = &config.logging.level;
    let default_filter = format!(
        "warn,web_interact={level},wi_server={level},wi_mcp={level},wi_config={level}"
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the server until Ctrl-C
async fn serve(config_manager: Arc<ConfigManager>) -> anyhow::Result<()> {
    info!("Starting web-interact...");

    #[cfg(debug_assertions)]
    info!("Running in DEVELOPMENT mode");
    #[cfg(not(debug_assertions))]
    info!("Running in PRODUCTION mode");
    info!("Configuration file: {}", config_manager.path().display());

    let config = config_manager.get();
    let pages = Arc::new(PageRegistry::new(config.page.command_timeout_secs));

    let (_state, mut server_handle, port) =
        wi_server::start_server(config_manager.clone(), pages).await?;

    // Keep the watcher alive for the lifetime of the server; dropping it
    // stops hot reload.
    let _watcher = match config_manager.start_watching() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Config hot reload disabled: {}", e);
            None
        }
    };

    let endpoint = format!("http://{}:{}/mcp/mcp", config.server.host, port);
    info!("Register with a desktop client via: web-interact claude-config --url {}", endpoint);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested, stopping server");
            server_handle.abort();
        }
        result = &mut server_handle => {
            // Server task ended on its own (bind loss or panic)
            if let Err(e) = result {
                if !e.is_cancelled() {
                    return Err(anyhow::anyhow!("Server task failed: {}", e));
                }
            }
        }
    }

    Ok(())
}

/// Print or install the desktop-client registration entry
fn claude_config(
    config_manager: &ConfigManager,
    url: Option<String>,
    name: &str,
    install: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let endpoint = url.unwrap_or_else(|| config_manager.get().server.mcp_endpoint_url());
    let registration = ServerRegistration::for_endpoint(&endpoint);

    match install {
        Some(path) => {
            install_registration(&path, name, registration)?;
            println!(
                "Installed '{}' into {} (restart the desktop client to pick it up)",
                name,
                path.display()
            );
        }
        None => {
            println!("{}", render_snippet(name, &registration)?);
        }
    }

    Ok(())
}

/// Validate every registration entry in a client config file
fn check_config(path: &std::path::Path) -> anyhow::Result<()> {
    let file = ClientConfigFile::load(path)?;

    if file.mcp_servers.is_empty() {
        println!("{}: no mcpServers entries", path.display());
        return Ok(());
    }

    let results = file.validate_all();
    let mut failures = 0;
    for (name, result) in &results {
        match result {
            Ok(()) => println!("  ok   {}", name),
            Err(e) => {
                failures += 1;
                println!("  FAIL {}: {}", name, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} entries failed validation", failures, results.len());
    }

    println!("All {} entries valid", results.len());
    Ok(())
}

/// Probe a running server's MCP endpoint with an initialize request
async fn doctor(config_manager: &ConfigManager, url: Option<String>) -> anyhow::Result<()> {
    let endpoint = url.unwrap_or_else(|| config_manager.get().server.mcp_endpoint_url());

    println!("Probing {} ...", endpoint);

    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": "doctor",
        "method": "initialize",
        "params": {
            "protocolVersion": wi_mcp::protocol::PROTOCOL_VERSION,
            "clientInfo": {"name": "web-interact-doctor", "version": env!("CARGO_PKG_VERSION")}
        }
    });

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let response = match client.post(&endpoint).json(&request).send().await {
        Ok(response) => response,
        Err(e) if e.is_connect() => {
            anyhow::bail!(
                "Could not connect to {} - is the server running? (start it with: web-interact)",
                endpoint
            );
        }
        Err(e) if e.is_timeout() => {
            anyhow::bail!("Timed out waiting for {} to answer", endpoint);
        }
        Err(e) => return Err(e.into()),
    };

    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    if let Some(result) = body.get("result") {
        let server_name = result
            .pointer("/serverInfo/name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let version = result
            .pointer("/serverInfo/version")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        println!("ok: {} {} answered initialize ({})", server_name, version, status);
        Ok(())
    } else {
        anyhow::bail!("Endpoint answered {} but not with an initialize result: {}", status, body)
    }
}
