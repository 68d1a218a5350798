//! linkrace room coordinator.
//!
//! ```text
//! linkrace-server --bind 0.0.0.0:8787 --data-dir ./data
//! ```
//!
//! Without `--data-dir`, histories are kept in memory and lost on exit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use linkrace::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "linkrace-server", version, about = "Real-time room coordinator for wiki races")]
struct Options {
    /// Address to listen on.
    #[arg(long, env = "LINKRACE_BIND", default_value = "127.0.0.1:8787")]
    bind: String,

    /// Directory for persisted room histories. In-memory if unset.
    #[arg(long, env = "LINKRACE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// How long an empty room keeps its history.
    #[arg(long, env = "LINKRACE_CLEANUP_GRACE_MS", default_value_t = 5_000)]
    cleanup_grace_ms: u64,

    /// How long a new peer may take to complete the WebSocket upgrade.
    #[arg(long, env = "LINKRACE_HANDSHAKE_TIMEOUT_MS", default_value_t = 10_000)]
    handshake_timeout_ms: u64,
}

impl Options {
    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            cleanup_grace: Duration::from_millis(self.cleanup_grace_ms),
            ..RoomConfig::default()
        }
    }

    fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

#[tokio::main]
async fn main() -> Result<(), LinkraceError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = Options::parse();
    tracing::debug!(?options, "starting");

    match &options.data_dir {
        Some(dir) => {
            let store = Arc::new(FileStore::open(dir).await?);
            serve(&options, store).await
        }
        None => {
            tracing::warn!("no data dir configured, room histories are in-memory");
            serve(&options, Arc::new(MemoryStore::new())).await
        }
    }
}

async fn serve<S: HistoryStore>(options: &Options, store: Arc<S>) -> Result<(), LinkraceError> {
    let server = LinkraceServer::builder()
        .bind(&options.bind)
        .room_config(options.room_config())
        .handshake_timeout(options.handshake_timeout())
        .build(store)
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("ctrl-c received");
        })
        .await
}
