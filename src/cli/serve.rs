use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tokio::time::interval;
use tracing::{debug, info};

use traceview_replay_router::{FsArchiveOpener, SessionLeases, TraceRouter};

use crate::server::{build_router, ServeState};
use crate::Config;

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Address to bind (overrides the config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory that relative trace ids resolve against
    #[arg(long, value_name = "DIR")]
    pub trace_root: Option<PathBuf>,
}

pub async fn cmd_serve(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(host) = args.host {
        config.serve.host = host;
    }
    if let Some(port) = args.port {
        config.serve.port = port;
    }
    if args.trace_root.is_some() {
        config.router.trace_root = args.trace_root;
    }

    let state = build_state(&config);
    spawn_session_gc(state.clone(), &config);

    let addr: SocketAddr = format!("{}:{}", config.serve.host, config.serve.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.serve.host, config.serve.port
            )
        })?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind trace server on {}", addr))?;
    info!("Trace viewer backend available at http://{}", addr);
    if let Some(root) = &config.router.trace_root {
        info!("Resolving relative traces under {}", root.display());
    }

    state.health.mark_live();
    state.health.mark_ready();
    let router = build_router(state);
    info!("Server starting, waiting for requests...");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("trace server exited unexpectedly")?;
    Ok(())
}

pub fn build_state(config: &Config) -> ServeState {
    let opener = FsArchiveOpener::new(config.router.trace_root.clone());
    let leases = Arc::new(SessionLeases::new(config.router.session_ttl()));
    let router = TraceRouter::new(Arc::new(opener), &config.router).with_presence(leases.clone());
    ServeState::new(Arc::new(router), leases)
}

fn spawn_session_gc(state: ServeState, config: &Config) {
    let gc_interval = config.router.gc_interval();
    info!(
        ttl_secs = config.router.session_ttl_secs,
        interval_secs = gc_interval.as_secs(),
        "Trace cache GC enabled"
    );
    tokio::spawn(async move {
        let mut ticker = interval(gc_interval);
        loop {
            ticker.tick().await;
            // Evict while expired leases still read as dead, then forget them.
            let evicted = state.router.gc().await;
            let expired = state.leases.prune();
            if evicted > 0 || expired > 0 {
                debug!(evicted, expired, "Pruned departed viewer sessions");
            }
        }
    });
}
