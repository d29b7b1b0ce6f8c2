//! Sonde Binary Entry Point
//!
//! Runs the configured collectors against the local machine for a fixed
//! window. Core functionality is provided by the `sonde` library crate; real
//! deployments embed the instruments in a test-run orchestrator instead.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sonde::{
    AppConfig, Instrument, LocalShellExecutor, PollInstrument, SessionContext, TraceInstrument,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sonde - Device Telemetry Sampler
#[derive(Parser, Debug)]
#[command(name = "sonde", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "SONDE_CONFIG"
    )]
    config: String,

    /// Session output directory (overrides config file)
    #[arg(long, env = "SONDE_OUTPUT_DIR")]
    output_dir: Option<String>,

    /// How long to keep the collectors running
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    run_for: Duration,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sonde=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Sonde - Device Telemetry Sampler");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load_with_collector_path(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    std::fs::create_dir_all(&config.output_dir)?;
    let ctx = SessionContext::new(&config.output_dir);
    let executor = Arc::new(LocalShellExecutor);

    // Build instruments from configuration
    let mut instruments: Vec<Box<dyn Instrument>> = Vec::new();
    for poll in &config.collectors.poll {
        if !poll.enabled {
            tracing::debug!("Skipping disabled collector: {}", poll.name);
            continue;
        }
        instruments.push(Box::new(PollInstrument::new(
            poll.clone(),
            Arc::clone(&executor),
        )));
    }
    for trace in &config.collectors.trace {
        if !trace.enabled {
            tracing::debug!("Skipping disabled collector: {}", trace.name);
            continue;
        }
        instruments.push(Box::new(TraceInstrument::new(
            trace.clone(),
            Arc::clone(&executor),
        )));
    }

    tracing::info!("Found {} collectors in configuration", instruments.len());

    for instrument in &mut instruments {
        instrument.setup(&ctx)?;
    }

    for instrument in &mut instruments {
        match instrument.start() {
            Ok(()) => {
                tracing::info!(
                    "Started collector: {} ({})",
                    instrument.name(),
                    instrument.kind().as_ref()
                );
            }
            Err(e) => {
                tracing::error!("Failed to start collector '{}': {}", instrument.name(), e);
            }
        }
    }

    tracing::info!("Collecting for {:?}...", cli.run_for);
    std::thread::sleep(cli.run_for);

    let mut failures = 0;
    for instrument in &mut instruments {
        match instrument.stop() {
            Ok(()) => {
                if let Err(e) = instrument.update_result() {
                    tracing::warn!(
                        "Result processing failed for '{}': {}",
                        instrument.name(),
                        e
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    "Collection session '{}' failed: {}",
                    instrument.name(),
                    e
                );
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} collection session(s) failed").into());
    }

    tracing::info!("All sessions complete, output in: {}", config.output_dir);
    Ok(())
}
