//! Tether — socket server with pooled request-execution contexts.
//!
//! Serves newline-delimited JSON over TCP (the `route` field names the
//! operation) and plain HTTP (the path names the operation) through one
//! pool of reusable controllers.
//!
//! Usage:
//!   tether                                  # TCP 9501, HTTP 8081
//!   tether --tcp-port 0 --http-port 0       # OS-assigned ports
//!   tether --debug                          # Send fault messages to clients
//!   tether --log-file /tmp/tether.log       # Log to a file

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tether::ChatHandler;
use tether_server::{ControllerConfig, ControllerEnv, ControllerPool, Dispatcher, PoolConfig};
use tether_transport::{JsonLineCodec, LocalRuntime, TransportConfig, TransportServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tether", about = "Tether — TCP + HTTP server with pooled controllers")]
struct Cli {
    /// Hostname to bind both listeners to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// TCP port (0 for OS-assigned)
    #[arg(long, default_value = "9501")]
    tcp_port: u16,

    /// HTTP port (0 for OS-assigned)
    #[arg(long, default_value = "8081")]
    http_port: u16,

    /// Maximum concurrent TCP connections
    #[arg(long, default_value = "1024")]
    max_connections: usize,

    /// Idle controllers kept for reuse
    #[arg(long, default_value = "256")]
    max_idle: usize,

    /// Send fault messages to clients verbatim
    #[arg(long)]
    debug: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(ref log_path) = cli.log_file {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .unwrap_or_else(|e| panic!("Failed to open log file {}: {e}", log_path.display()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let runtime = Arc::new(LocalRuntime::new());
    let codec = Arc::new(JsonLineCodec::default());
    let env = ControllerEnv::new(runtime.clone(), codec.clone()).with_config(ControllerConfig {
        debug: cli.debug,
        capture: false,
    });
    let pool = ControllerPool::new(
        Arc::new(env),
        PoolConfig {
            max_idle: cli.max_idle,
        },
    );

    let mut dispatcher = Dispatcher::new(pool);
    dispatcher.register_handler(ChatHandler);

    let transport_config = TransportConfig {
        hostname: cli.hostname.clone(),
        tcp_port: cli.tcp_port,
        http_port: cli.http_port,
        max_connections: Some(cli.max_connections),
        max_frame_len: codec.max_frame_len(),
    };

    let mut transport =
        match TransportServer::start(transport_config, runtime, Arc::new(dispatcher)).await {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to start transport: {e}");
                std::process::exit(1);
            }
        };

    println!();
    println!("  Tether server running");
    println!();
    println!("  TCP:    {}:{}", cli.hostname, transport.tcp_port());
    println!("  HTTP:   http://{}:{}", cli.hostname, transport.http_port());
    println!("  Debug:  {}", if cli.debug { "on" } else { "off" });
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
    }

    info!("Shutting down");
    transport.stop().await;
    println!("  Server stopped.");
}
