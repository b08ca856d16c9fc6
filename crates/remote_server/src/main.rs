//! # remote_server: HTTP host
//!
//! Serves the remote bridge over HTTP long-polling.
//!
//! ## Startup Sequence
//!
//! 1. Parse the command line and install the log subscriber.
//! 2. Register the `demo` runtime and start its `tick` emitter.
//! 3. Bind the listener and serve `/frex/remote` and `/frex/remote/event`.

mod api;
mod demo;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use remote_bridge::{Bridge, BridgeConfig};
use remote_runtime::RuntimeRegistry;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "remote_server", about = "Remote engine bridge over HTTP long-polling")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Coalescing window after the first live event, in milliseconds
    #[arg(long, default_value_t = 10)]
    linger_ms: u64,

    /// Longest a poll waits for events, in seconds
    #[arg(long, default_value_t = 60)]
    poll_timeout_secs: u64,

    /// Longest a command waits for its first callback, in seconds
    #[arg(long, default_value_t = 30)]
    command_timeout_secs: u64,

    /// Maximum concurrently open polls
    #[arg(long, default_value_t = 1024)]
    max_sessions: usize,

    /// Maximum subscriptions honoured per poll
    #[arg(long, default_value_t = 64)]
    max_subscriptions: usize,

    /// Live event slots per poll before events are dropped
    #[arg(long, default_value_t = 256)]
    listener_capacity: usize,

    /// Callback slots per command before callbacks are dropped
    #[arg(long, default_value_t = 64)]
    callback_capacity: usize,

    /// Interval between demo `tick` events, in milliseconds (0 disables)
    #[arg(long, default_value_t = 1000)]
    demo_interval_ms: u64,
}

impl Args {
    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::default()
            .with_linger(Duration::from_millis(self.linger_ms))
            .with_poll_timeout(Duration::from_secs(self.poll_timeout_secs))
            .with_command_timeout(Duration::from_secs(self.command_timeout_secs))
            .with_max_sessions(self.max_sessions)
            .with_max_subscriptions(self.max_subscriptions)
            .with_listener_capacity(self.listener_capacity)
            .with_callback_capacity(self.callback_capacity)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("remote_server=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.bridge_config();

    let registry = Arc::new(RuntimeRegistry::new());
    let demo = demo::runtime();
    registry.register(demo.clone());
    if args.demo_interval_ms > 0 {
        demo::spawn_ticker(demo, Duration::from_millis(args.demo_interval_ms));
    }
    info!(runtimes = ?registry.names(), "runtimes registered");

    let bridge = Arc::new(Bridge::new(registry, config));
    let app = api::router(bridge);

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind to {}", args.bind))?;
    info!(addr = %args.bind, "remote bridge listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server failure")?;

    info!("remote bridge shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
