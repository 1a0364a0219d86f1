//! glowstatd - Host telemetry exporter daemon.
//!
//! Discovers temperature and I/O sources once at startup, then samples
//! `/proc` and `/sys` on a fixed interval and exposes the readings as
//! Prometheus gauges over HTTP.

mod exposition;
mod metrics;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use prometheus::Registry;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use glowstat_core::collector::traits::{RealFs, RealRunner};
use glowstat_core::{CollectorConfig, GpuKind, HostKind, StatCollector};

use metrics::Gauges;

/// Host telemetry exporter daemon.
#[derive(Parser)]
#[command(name = "glowstatd", about = "Host telemetry exporter daemon", version)]
struct Args {
    /// Collection interval in seconds.
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Listen address for the metrics endpoint.
    #[arg(short, long, default_value = "0.0.0.0:9184")]
    listen: String,

    /// Network interface to sample byte counters from.
    #[arg(short = 'n', long, default_value = "eth0")]
    net_interface: String,

    /// Block device for I/O accounting: kernel name (e.g. "sda") or a
    /// hardware serial number to be translated via lsblk.
    #[arg(short = 'd', long, default_value = "sda")]
    io_device: String,

    /// Host type: "generic" or "raspberry-pi". Selects the thermal zone
    /// label to look for.
    #[arg(long, default_value = "generic")]
    host_type: String,

    /// GPU type: "none", "nvidia", "amd" or "raspberry-pi".
    #[arg(long, default_value = "none")]
    gpu_type: String,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to /sys filesystem (for testing/mocking).
    #[arg(long, default_value = "/sys")]
    sys_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("glowstatd={}", level).parse().unwrap())
        .add_directive(format!("glowstat={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let host: HostKind = match args.host_type.parse() {
        Ok(host) => host,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };
    let gpu: GpuKind = match args.gpu_type.parse() {
        Ok(gpu) => gpu,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };
    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!("invalid listen address '{}': {}", args.listen, err);
            process::exit(1);
        }
    };
    if args.interval == 0 {
        error!("collection interval must be at least 1 second");
        process::exit(1);
    }

    info!("glowstatd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, listen={}, interface={}, device={}, host={}, gpu={}",
        args.interval, args.listen, args.net_interface, args.io_device, host, gpu
    );

    let config = CollectorConfig {
        host,
        gpu,
        net_interface: args.net_interface.clone(),
        io_device: args.io_device.clone(),
    };

    let mut collector = StatCollector::new(
        RealFs::new(),
        RealRunner::new(),
        &config,
        &args.proc_path,
        &args.sys_path,
    );

    let registry = Registry::new();
    let gauges = match Gauges::register(&registry) {
        Ok(gauges) => gauges,
        Err(err) => {
            error!("failed to register gauges: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = exposition::spawn(registry, addr) {
        error!("failed to start metrics endpoint on {}: {}", addr, err);
        process::exit(1);
    }

    let interval = Duration::from_secs(args.interval);
    let interval_secs = args.interval as f64;

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting collection loop");

    while running.load(Ordering::SeqCst) {
        match collector.collect_snapshot() {
            Ok(snapshot) => gauges.apply(&snapshot, interval_secs),
            Err(e) => {
                // Baselines were discarded; the next good tick reports
                // zero rates rather than a delta spanning this gap.
                error!("Failed to collect snapshot: {}", e);
            }
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutdown complete");
}
