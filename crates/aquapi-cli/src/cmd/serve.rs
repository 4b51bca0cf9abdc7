use aquapi_core::config::Config;
use aquapi_server::AppState;
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides server.bind)
    #[arg(long, env = "AQUAPI_BIND")]
    bind: Option<String>,

    /// Port to listen on, 0 = OS-assigned (overrides server.port)
    #[arg(long, env = "AQUAPI_PORT")]
    port: Option<u16>,

    /// redb database file (overrides server.db_path)
    #[arg(long, env = "AQUAPI_DB", conflicts_with = "memory")]
    db: Option<PathBuf>,

    /// Keep everything in memory; nothing survives a restart
    #[arg(long)]
    memory: bool,
}

pub fn run(config_path: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let bind = args.bind.unwrap_or(config.server.bind);
    let port = args.port.unwrap_or(config.server.port);

    let state = if args.memory {
        tracing::warn!("using in-memory store; data is lost on exit");
        AppState::memory()
    } else {
        let db_path = args.db.unwrap_or(config.server.db_path);
        tracing::info!(db = %db_path.display(), "opening store");
        AppState::open(&db_path)
            .with_context(|| format!("failed to open store at {}", db_path.display()))?
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
            .await
            .with_context(|| format!("failed to bind {bind}:{port}"))?;
        let actual_port = listener.local_addr()?.port();
        println!("aquapi server → http://{bind}:{actual_port}");

        tokio::select! {
            res = aquapi_server::serve_on(state, listener) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
