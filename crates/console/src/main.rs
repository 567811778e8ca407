//! Coin Ticker - live crypto prices in the terminal
//!
//! Main entry point for the console front end

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ticker_console::{build_supervisor, render_screen, Command};
use ticker_core::TickerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Coin Ticker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = TickerConfig::load()?;
    info!(
        "Tracking {} assets, charting {}",
        config.assets.len(),
        config.chart_asset
    );

    let supervisor = build_supervisor(&config)?;
    let mut screen = supervisor.state();
    supervisor.start();

    // Setup shutdown channel
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        let _ = shutdown_tx.send(());
    });

    println!("{}", Command::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,

            changed = screen.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = screen.borrow_and_update().clone();
                print!("{}", render_screen(&state));
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(Command::Retry) => {
                        if !supervisor.retry_initial_load() {
                            println!("nothing to retry in phase {}", supervisor.phase());
                        }
                    }
                    Ok(Command::Reconnect) => {
                        if !supervisor.reconnect() {
                            println!("not disconnected (phase {})", supervisor.phase());
                        }
                    }
                    Ok(Command::Status) => {
                        print!("{}", render_screen(&supervisor.screen()));
                        info!("Supervisor stats: {:?}", supervisor.stats());
                    }
                    Ok(Command::Help) => println!("{}", Command::HELP),
                    Err(e) => println!("{}. {}", e, Command::HELP),
                },
                Ok(None) => {
                    info!("stdin closed, waiting for shutdown signal");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    supervisor.shutdown();
    info!("Shutdown complete");
    Ok(())
}
