//! pixelpipe - Main entry point
//!
//! Lists registered types, checks descriptors, discovers KiNET supplies and
//! drives a device tree with a test pattern.

mod config;
mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pixelpipe_core::{build_with, registry, BuildOptions, RgbColor};
use pixelpipe_discovery::{descriptor_for, scan_blocking};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::render::Chase;

/// Environment variable consulted by `run` when no descriptor flag is given
const DESCRIPTOR_ENV: &str = "PIXELPIPE_DESCRIPTOR";

#[derive(Parser, Debug)]
#[command(name = "pixelpipe")]
#[command(about = "Drive addressable LED hardware from a descriptor string")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "pixelpipe.toml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered device and filter types
    Types,
    /// Build a descriptor and print its canonical form
    Describe {
        descriptor: String,
    },
    /// Find KiNET supplies on the local network
    Discover {
        /// Broadcast address to use instead of every interface's
        #[arg(long)]
        broadcast: Option<Ipv4Addr>,
        /// Reply window in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Skip per-supply port enumeration
        #[arg(long)]
        no_enumerate: bool,
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a chase test pattern on a device tree
    Run {
        /// Descriptor of the tree to drive
        #[arg(short, long)]
        descriptor: Option<String>,
        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,
        /// Pattern color, a name or #rrggbb
        #[arg(long, default_value = "white")]
        color: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("pixelpipe v{}", env!("CARGO_PKG_VERSION"));

    pixelpipe_core::register_builtins();
    pixelpipe_kinet::register();

    let config = config::load_config(&args.config)?;

    match args.command {
        Command::Types => list_types(),
        Command::Describe { descriptor } => describe(&config, &descriptor),
        Command::Discover {
            broadcast,
            timeout_ms,
            no_enumerate,
            json,
        } => {
            let mut scanner = config.to_scanner_config();
            if broadcast.is_some() {
                scanner.broadcast = broadcast;
            }
            if let Some(timeout_ms) = timeout_ms {
                scanner.timeout_ms = timeout_ms;
            }
            if no_enumerate {
                scanner.enumerate = false;
            }
            discover(&scanner, json)
        }
        Command::Run {
            descriptor,
            fps,
            frames,
            color,
        } => {
            let env = std::env::var(DESCRIPTOR_ENV).ok();
            let descriptor = resolve_descriptor(descriptor, env, &config)
                .with_context(|| {
                    format!(
                        "No descriptor: pass --descriptor, set {} or add [output] descriptor to {}",
                        DESCRIPTOR_ENV,
                        args.config.display()
                    )
                })?;
            let color: RgbColor = color
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid --color")?;
            run(
                &config,
                &descriptor,
                fps.unwrap_or(config.output.fps),
                frames,
                color,
            )
        }
    }
}

fn list_types() -> Result<()> {
    for entry in registry::entries() {
        let synopsis = if entry.args.is_empty() {
            entry.name.to_string()
        } else {
            format!("{}:{}", entry.name, entry.args)
        };
        println!("{:<6} {:<36} {}", entry.kind(), synopsis, entry.doc);
    }
    Ok(())
}

fn build_options(config: &Config) -> BuildOptions {
    BuildOptions {
        write_spacing: config.output.write_spacing(),
    }
}

fn describe(config: &Config, descriptor: &str) -> Result<()> {
    let tree = build_with(descriptor, &build_options(config))?;
    println!("{}", tree.describe());
    println!("{} pixels", tree.count());
    Ok(())
}

fn discover(scanner: &pixelpipe_discovery::ScannerConfig, json: bool) -> Result<()> {
    let devices = scan_blocking(scanner)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!("Discovered {} supplies:", devices.len());
    for device in &devices {
        println!(
            "  - {} ({}) at {} kinet v{} serial {}",
            if device.name.is_empty() { "unnamed" } else { device.name.as_str() },
            device.mac,
            device.ip,
            device.kinet_version,
            device.serial
        );
        for port in &device.ports {
            println!("    port {}: {} lights", port.port, port.lights);
        }
    }
    if let Some(descriptor) = descriptor_for(&devices, scanner.default_count) {
        println!("{}", descriptor);
    }
    Ok(())
}

/// Command-line flag first, then the environment, then the config file
fn resolve_descriptor(
    flag: Option<String>,
    env: Option<String>,
    config: &Config,
) -> Option<String> {
    flag.or(env)
        .or_else(|| config.output.descriptor.clone())
        .filter(|d| !d.trim().is_empty())
}

fn run(
    config: &Config,
    descriptor: &str,
    fps: u32,
    frames: Option<u64>,
    color: RgbColor,
) -> Result<()> {
    if fps == 0 {
        bail!("fps must be at least 1");
    }
    let mut tree = build_with(descriptor, &build_options(config))?;
    info!(
        descriptor = %tree.describe(),
        count = tree.count(),
        fps = fps,
        "Driving device tree"
    );

    let stats = render::run(tree.as_mut(), &Chase::new(color), fps, frames);
    info!(frames = stats.frames, failed = stats.failed, "Done");
    if let Some(error) = tree.last_error() {
        info!(error = %error, "Last device error");
    }
    Ok(())
}
