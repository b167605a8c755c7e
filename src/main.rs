#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use signal_relay::config;
use signal_relay::logging;
use signal_relay::server::SignalRelay;
use signal_relay::websocket;
use std::net::{IpAddr, SocketAddr};

/// Signal Relay -- minimal WebSocket signaling relay for peer-to-peer video calls
#[derive(Parser, Debug)]
#[command(name = "signal-relay")]
#[command(about = "A minimal in-memory WebSocket signaling relay for P2P video conferencing")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Listen: {}:{}", cfg.bind_address, cfg.port);
                println!("  Signal path: {}", cfg.relay.path);
                println!(
                    "  Max connections: {}",
                    match cfg.relay.max_connections {
                        0 => "unlimited".to_string(),
                        n => n.to_string(),
                    }
                );
                println!("  Send timeout: {}ms", cfg.relay.send_timeout_ms);
                println!(
                    "  Metrics auth required: {}",
                    cfg.security.require_metrics_auth
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    // Held for the process lifetime so buffered file logs are flushed on exit.
    let _log_guard = logging::init_with_config(&cfg.logging);

    let ip: IpAddr = cfg.bind_address.trim().parse()?;
    let addr = SocketAddr::new(ip, cfg.port);

    let relay = SignalRelay::new(cfg.relay.clone());
    let app = websocket::build_app(relay, &cfg);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        signal_path = %cfg.relay.path,
        cors_origins = %cfg.security.cors_origins,
        "Signal relay listening - WebSocket: {}, Health: /health, Metrics: /metrics",
        cfg.relay.path
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
