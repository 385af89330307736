use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use vigil_config::{Config, ConfigLoad, ConfigLoader};
use vigil_core::NmapExecutor;
use vigil_scan_server::cli::{
    Cli, Command, ConfigArgs, MintTokenArgs, ServeArgs,
};
use vigil_scan_server::rate_limit::{self, PRUNE_INTERVAL};
use vigil_scan_server::{AppState, TokenVerifier, create_app, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(args) => {
            telemetry::init_tracing();
            serve(args).await
        }
        Command::MintToken(args) => mint_token(args),
    }
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;
    warnings.log();
    Ok(config)
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(host) = args.host {
        config.scan_server.host = host;
    }
    if let Some(port) = args.port {
        config.scan_server.port = port;
    }
    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }

    let secret = config
        .require_jwt_secret()
        .context("the scan service cannot authenticate requests")?;
    let settings = &config.scan_server;
    let executor = Arc::new(NmapExecutor::new(settings.nmap_path.clone()));
    let state = AppState::new(executor, TokenVerifier::new(secret), settings);
    let _pruner =
        rate_limit::spawn_pruner(state.limiter.clone(), PRUNE_INTERVAL);

    let listener =
        tokio::net::TcpListener::bind((settings.host.as_str(), settings.port))
            .await
            .with_context(|| {
                format!("failed to bind {}:{}", settings.host, settings.port)
            })?;
    info!(
        addr = %listener.local_addr()?,
        nmap = %settings.nmap_path,
        trust_proxy_headers = settings.trust_proxy_headers,
        "Starting Vigil scan service"
    );

    let make_service =
        create_app(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

fn mint_token(args: MintTokenArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let secret = config.require_jwt_secret()?;
    let token = TokenVerifier::new(secret)
        .mint(args.subject.as_deref(), args.ttl)
        .context("failed to mint token")?;
    println!("{token}");
    Ok(())
}
