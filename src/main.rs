//! zoneftl smoke-test CLI.
//!
//! Builds an in-memory zoned namespace, opens a translation device over it,
//! runs a write/overwrite/read workload, drains the log, and prints the
//! resulting statistics. Useful for eyeballing the translation layer and
//! its log/merge behavior without hardware.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zoneftl::{Error, FtlConfig, MemZns, Result, ZonedFtl};

// =============================================================================
// CLI Arguments
// =============================================================================

/// User-space flash translation layer over a Zoned Namespace
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device label
    #[arg(long, env = "ZONEFTL_DEVICE", default_value = "mem0")]
    device: String,

    /// Number of zones in the emulated namespace
    #[arg(long, default_value = "32")]
    zones: u64,

    /// Blocks per zone
    #[arg(long, default_value = "64")]
    blocks_per_zone: u64,

    /// Block size in bytes
    #[arg(long, default_value = "4096")]
    lba_size: u64,

    /// Zones reserved for the append log
    #[arg(long, env = "ZONEFTL_LOG_ZONES", default_value = "3")]
    log_zones: u32,

    /// Free-log-zone watermark that triggers a merge
    #[arg(long, env = "ZONEFTL_GC_WMARK", default_value = "1")]
    gc_wmark: u32,

    /// Reset all zones at init and skip checkpoint restore
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    force_reset: bool,

    /// Blocks to write during the smoke workload
    #[arg(long, default_value = "128")]
    smoke_blocks: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let transport = Arc::new(MemZns::new(args.zones, args.blocks_per_zone, args.lba_size));
    let config = FtlConfig {
        device: args.device.clone(),
        log_zones: args.log_zones,
        gc_watermark: args.gc_wmark,
        force_reset: args.force_reset,
    };

    let ftl = ZonedFtl::init(config, transport)?;
    info!("{}", ftl.info());

    run_smoke_workload(&ftl, &args)?;

    let stats = ftl.stats();
    info!(
        writes = stats.writes_total,
        reads = stats.reads_total,
        gc_passes = stats.gc_passes,
        zones_merged = stats.zones_merged,
        zones_reset = stats.zones_reset,
        "workload complete"
    );

    ftl.close()?;
    Ok(())
}

/// Write a recognizable pattern, overwrite part of it, read everything back.
fn run_smoke_workload(ftl: &ZonedFtl, args: &Args) -> Result<()> {
    let lba = ftl.lba_size();
    let blocks = args
        .smoke_blocks
        .min(ftl.capacity_bytes() / lba);

    info!(blocks, "writing pattern");
    for i in 0..blocks {
        let buf = vec![(i % 251) as u8 + 1; lba as usize];
        ftl.write(i * lba, &buf)?;
    }

    info!("overwriting every other block");
    for i in (0..blocks).step_by(2) {
        let buf = vec![0xEE; lba as usize];
        ftl.write(i * lba, &buf)?;
    }

    ftl.drain_log()?;

    info!(blocks, "verifying");
    let mut out = vec![0u8; lba as usize];
    for i in 0..blocks {
        ftl.read(i * lba, &mut out)?;
        let expected = if i % 2 == 0 {
            0xEE
        } else {
            (i % 251) as u8 + 1
        };
        if out.iter().any(|&b| b != expected) {
            error!(block = i, expected, "pattern mismatch");
            return Err(Error::device_io("verify", i, "readback mismatch"));
        }
    }
    info!("verification passed");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
