mod api;
mod config;
mod error;
mod explain;
mod middleware;
mod orchestrator;
mod persistence;
mod state;
mod tick;

use std::sync::Arc;

use clap::Parser;
use gridshift_core::contracts::{PassthroughHeadroomPredictor, SeededCarbonSource};
use gridshift_core::topology::{Edge, Node, Topology};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::persistence::JsonlPersistenceSink;
use crate::state::AppState;

/// GridShift safety-gating control plane: thermal twin, ramp planner, and
/// the live HTTP/SSE/WS surface in front of them.
#[derive(Parser, Debug)]
#[command(name = "gridshift-server")]
#[command(about = "Safety-gating control plane for a data-center power-shift controller")]
struct Cli {
    /// Address to bind the HTTP server to; overrides BIND_ADDR.
    #[arg(long, env = "BIND_ADDR")]
    bind_addr: Option<String>,
}

fn init_tracing(cfg: &ServerConfig) {
    let filter = EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().json().with_env_filter(filter);

    if let Some(dir) = &cfg.log_dir {
        let _ = std::fs::create_dir_all(dir);
        let file_appender = tracing_appender::rolling::daily(dir, "gridshift-server.log");
        builder.with_writer(file_appender).init();
    } else {
        builder.init();
    }
}

fn static_topology() -> Topology {
    Topology {
        nodes: vec![
            Node { id: 1, label: "utility-feed".to_string() },
            Node { id: 2, label: "site-transformer".to_string() },
            Node { id: 3, label: "rack-row-a".to_string() },
            Node { id: 4, label: "rack-row-b".to_string() },
        ],
        edges: vec![
            Edge { from: 1, to: 2 },
            Edge { from: 2, to: 3 },
            Edge { from: 2, to: 4 },
        ],
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ServerConfig::from_env();
    if let Some(bind_addr) = cli.bind_addr {
        config.bind_addr = bind_addr;
    }

    init_tracing(&config);
    tracing::info!(bind_addr = %config.bind_addr, demo_mode = config.demo_mode, "starting gridshift-server");

    let predictor = Arc::new(PassthroughHeadroomPredictor {
        grid_headroom_kw: 1500.0,
    });
    let carbon_source = Arc::new(SeededCarbonSource::default());
    let persistence = Arc::new(JsonlPersistenceSink::new(config.database_url.as_deref()));
    let topology = static_topology();

    let state = Arc::new(AppState::new(config, predictor, carbon_source, persistence, topology));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let tick_state = state.clone();
    let tick_handle = tokio::spawn(async move {
        tick::run(tick_state, shutdown_rx).await;
    });

    let app = api::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    tracing::info!(addr = %state.config.bind_addr, "listening");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = tick_handle.await;

    Ok(())
}
