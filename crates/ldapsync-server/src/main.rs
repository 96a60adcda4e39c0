//! ldapsync - keeps Synapse accounts in line with an LDAP directory

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::Settings;
use ldapsync_identity::LdapDirectory;
use ldapsync_synapse::SynapseClient;
use ldapsync_sync::{CredentialManager, FileTombstoneStore, SyncScheduler, SyncService};

#[derive(Debug, Parser)]
#[command(name = "ldapsync", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "LDAPSYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    info!("Starting ldapsync v{}", env!("CARGO_PKG_VERSION"));
    info!(
        ldap = %settings.ldap.server_url,
        synapse = %settings.synapse.server_url,
        domain = %settings.synapse.domain,
        "Configuration loaded successfully"
    );
    if settings.sync.dry_run {
        warn!("Dry run enabled; no account will be modified");
    }

    let shutdown = CancellationToken::new();
    let mut scheduler = build_scheduler(settings, shutdown.clone())?;

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    scheduler.run(shutdown).await;

    info!("ldapsync stopped");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ldapsync=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

fn build_scheduler(
    settings: Settings,
    shutdown: CancellationToken,
) -> Result<SyncScheduler<LdapDirectory, SynapseClient, FileTombstoneStore>> {
    let directory = Arc::new(LdapDirectory::new(settings.ldap));
    let api = Arc::new(
        SynapseClient::new(settings.synapse).context("Failed to create Synapse client")?,
    );
    let store = Arc::new(FileTombstoneStore::new(settings.sync.tombstone_path));

    let credentials = CredentialManager::new(Arc::clone(&api), settings.service_account, shutdown);
    let service = SyncService::new(directory, api, store, credentials, settings.sync.dry_run);

    Ok(SyncScheduler::from_hours(service, settings.sync.interval_hours))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C; finishing the current pass"),
        _ = terminate => info!("Received SIGTERM; finishing the current pass"),
    }
}
