use anyhow::{Context, Result};
use can_transport::{CanBus, MockBus};
use clap::{ArgAction, Parser};
use mppt_canbus::{
    load_config_file, MpptConfig, MpptManager, RuleFlag, StatusReport, TelemetryMode,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mppt-daemon")]
#[command(about = "MPPT solar charger bridge over CAN")]
struct Args {
    /// YAML or JSON config file; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scheduler tick period in milliseconds
    #[arg(long, default_value = "100")]
    tick_ms: u64,

    /// Run with this many simulated chargers instead of the bus
    #[arg(long)]
    synthetic: Option<usize>,

    /// Start with the bank over-voltage rule asserted
    #[arg(long, action = ArgAction::SetTrue)]
    over_voltage: bool,

    /// Print the JSON status view every N ticks (0 disables)
    #[arg(long, default_value = "50")]
    status_every: u64,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Print Prometheus metrics on exit
    #[arg(long, action = ArgAction::SetTrue)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => MpptConfig::default(),
    };
    if let Some(count) = args.synthetic {
        config.telemetry.mode = TelemetryMode::Synthetic;
        config.telemetry.device_count = count;
    }

    let bus = Arc::new(MockBus::new("mock0"));
    let rules = Arc::new(RuleFlag::new(args.over_voltage));
    let manager = MpptManager::new(config, bus.clone(), rules)
        .context("starting MPPT manager")?;

    info!(
        "mppt-daemon starting: bus={}, mode={:?}, tick={}ms",
        bus.name(),
        manager.config().telemetry.mode,
        args.tick_ms
    );

    let mut interval = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    let mut ticks = 0u64;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
        }

        let report = manager.tick();
        if !report.charge_disabled.is_empty() {
            warn!("Interlock disabled {} charger(s)", report.charge_disabled.len());
        }
        ticks += 1;

        if args.status_every > 0 && ticks % args.status_every == 0 {
            print_status(&manager)?;
        }
        if args.ticks.is_some_and(|limit| ticks >= limit) {
            break;
        }
    }

    print_status(&manager)?;
    info!("{} frame(s) sent on {}", bus.sent().len(), bus.name());
    if args.metrics {
        print!("{}", manager.metrics().encode_text());
    }
    Ok(())
}

fn print_status(manager: &MpptManager) -> Result<()> {
    let json = StatusReport::collect(manager)
        .to_json()
        .context("rendering status")?;
    println!("{json}");
    Ok(())
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
