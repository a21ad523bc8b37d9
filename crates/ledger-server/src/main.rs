//! Flume fleet ledger server entry point.

mod cli;

use cli::{Cli, Commands};
use clap::Parser;
use ledger_common::LedgerConfig;
use ledger_secrets::InMemorySecretBackend;
use ledger_secrets::SecretRecord;
use ledger_server::error::{Error, Result};
use ledger_server::{background, http, observability, process, state::AppState};
use ledger_store::Database;
use std::path::{Path, PathBuf};
use tracing::{error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Test { config_file }) => {
            let config_path = find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            test_config_file(&config_path)
        }
        Some(Commands::Migrate) => {
            println!("schema migrations are applied automatically on connect; nothing to do");
            Ok(())
        }
        None => {
            let config_path = find_config_file(&cli.config)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run(&config_path))
        }
    }
}

fn find_config_file(provided: &PathBuf) -> Result<PathBuf> {
    if provided != Path::new("config.toml") {
        if provided.exists() {
            return Ok(provided.clone());
        }
        return Err(Error::bad_request(format!(
            "config file not found: {provided:?}"
        )));
    }

    for candidate in [PathBuf::from("config.toml"), PathBuf::from("/etc/ledger-server/config.toml")] {
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(Error::bad_request(
        "no configuration file found; create config.toml or pass --config",
    ))
}

fn test_config_file(config_path: &Path) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = LedgerConfig::from_file(config_path).map_err(Error::Config)?;
    match config.validate() {
        Ok(()) => {
            info!("configuration is valid: {:?}", config_path);
            Ok(())
        }
        Err(errors) => {
            for err in &errors {
                error!("{}", err);
            }
            Err(Error::bad_request(format!(
                "configuration has {} error(s)",
                errors.len()
            )))
        }
    }
}

async fn run(config_path: &Path) -> Result<()> {
    let config = LedgerConfig::from_file(config_path).map_err(Error::Config)?;
    if let Err(errors) = config.validate() {
        for err in &errors {
            eprintln!("config error: {err}");
        }
        return Err(Error::bad_request("configuration failed validation"));
    }

    let _observability_guard = observability::init_observability(&config)?;

    let pid_path = process::write_pid_file(std::env::var("LEDGER_PID_FILE").ok().as_deref())?;
    let _pid_guard = process::PidFileGuard::new(pid_path);

    info!(name = %config.name, env = %config.env, "starting ledger server");

    let db = Database::connect(&config.sqlite).await.map_err(Error::from)?;
    let secrets_backend = InMemorySecretBackend::new();
    for (secret_ref, record) in &config.bootstrap_secrets {
        secrets_backend.insert(
            secret_ref.clone(),
            SecretRecord {
                kid: record.kid.clone(),
                token: record.token.clone(),
                prev_kid: record.prev_kid.clone(),
                prev_token: record.prev_token.clone(),
            },
        );
    }
    info!(count = config.bootstrap_secrets.len(), "loaded bootstrap secrets from config");
    let bind_addr = config
        .bind
        .http
        .socket_addr()
        .map_err(|e| Error::bad_request(format!("invalid bind address: {e}")))?;

    let app_state = AppState::new(config, db, secrets_backend);
    let router = http::build_router(app_state.clone());

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(4);
    let sweep_handle = background::spawn_heartbeat_sweep(app_state.clone(), shutdown_tx.subscribe());
    let fanout_handle = background::spawn_periodic_fanout(app_state.clone(), shutdown_tx.subscribe());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "listening");

    let shutdown_signal = {
        let shutdown_tx = shutdown_tx.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received ctrl-c, shutting down");
            let _ = shutdown_tx.send(());
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    let _ = sweep_handle.await;
    let _ = fanout_handle.await;

    info!("ledger server stopped");
    Ok(())
}
