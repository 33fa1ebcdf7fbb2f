//! SureElec LCD Control Tool
//!
//! CLI for driving a SureElec character LCD over its serial line.

mod config;
mod stats;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use sureelec_hw::{LcdSession, ScrollDirection, SensorReading, Temperature};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use stats::SystemInfo;

#[derive(Parser)]
#[command(name = "sureelecctl")]
#[command(about = "Control tool for SureElec serial LCD modules")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, overrides the configuration file
    #[arg(short, long)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show device information
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write text to a line
    Write {
        /// Line number, starting at 1
        line: usize,
        /// Text to show
        text: String,
    },
    /// Blank every line
    Clear,
    /// Repaint every line from the framebuffer
    Refresh,
    /// Write lines, then shift them and repaint the display
    Scroll {
        /// Direction: up or down
        direction: ScrollDirection,
        /// Number of lines to shift
        #[arg(default_value_t = 1)]
        distance: usize,
        /// Lines shifted off one edge re-enter at the other
        #[arg(long)]
        wrap: bool,
        /// Text for lines 1, 2, ... before scrolling
        #[arg(short, long = "line")]
        lines: Vec<String>,
    },
    /// Switch the display on or off
    Toggle,
    /// Set or show the contrast level
    Contrast {
        /// Level (1-255, omit to show current)
        #[arg(allow_negative_numbers = true)]
        value: Option<i32>,
    },
    /// Set or show the backlight brightness
    Brightness {
        /// Level (1-255, omit to show current)
        #[arg(allow_negative_numbers = true)]
        value: Option<i32>,
    },
    /// Show the on-board temperature
    Temperature,
    /// Echo lines from stdin to the display, scrolling when full
    Console,
    /// Show hostname, clock, temperature, uptime and load until interrupted
    Stats,
    /// Page through the display's character set
    Charmap,
}

/// Device information as printed by `info --json`.
#[derive(Serialize)]
struct InfoReport {
    device: String,
    width: u8,
    height: u8,
    real_time_clock: bool,
    rom_size_kbit: u32,
    light_sensor: bool,
    thermal_sensor: bool,
    contrast: Option<u8>,
    brightness: Option<u8>,
    temperature: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(device) = cli.device {
        config.device = device;
    }

    let mut session = LcdSession::open_with(&config.device, config.session_options())
        .with_context(|| format!("Failed to open LCD at {}", config.device))?;
    info!("Connected to LCD at {}", config.device);

    let result = run(cli.command, &mut session, &config).await;
    finish(result, session.close())
}

/// Combines the command outcome with the close outcome, keeping the
/// command's own error when both fail.
fn finish(result: Result<()>, closed: sureelec_hw::Result<()>) -> Result<()> {
    match (result, closed) {
        (Ok(()), closed) => closed.context("Failed to close LCD session"),
        (Err(e), Err(close_err)) => {
            warn!("Failed to close LCD session: {}", close_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}

async fn run(command: Commands, session: &mut LcdSession, config: &Config) -> Result<()> {
    match command {
        Commands::Info { json } => handle_info(session, config, json)?,
        Commands::Write { line, text } => {
            session
                .write_line(line, &text)
                .with_context(|| format!("Failed to write line {}", line))?;
            println!("Line {} set to: {}", line, text);
        }
        Commands::Clear => {
            session.clear_display().context("Failed to clear display")?;
            println!("Display cleared");
        }
        Commands::Refresh => {
            session.refresh().context("Failed to refresh display")?;
            println!("Display refreshed");
        }
        Commands::Scroll {
            direction,
            distance,
            wrap,
            lines,
        } => handle_scroll(session, direction, distance, wrap, &lines)?,
        Commands::Toggle => {
            session.toggle_display().context("Failed to toggle display")?;
            println!("Display toggled");
        }
        Commands::Contrast { value } => handle_contrast(session, value)?,
        Commands::Brightness { value } => handle_brightness(session, value)?,
        Commands::Temperature => {
            let reading = session
                .get_temperature()
                .context("Failed to read temperature")?;
            println!("Temperature: {}", reading);
        }
        Commands::Console => run_console(session, config).await?,
        Commands::Stats => run_stats(session, config).await?,
        Commands::Charmap => run_charmap(session, config).await?,
    }

    Ok(())
}

fn handle_info(session: &mut LcdSession, config: &Config, json: bool) -> Result<()> {
    let caps = *session.capabilities();

    let contrast = session
        .get_contrast()
        .inspect_err(|e| warn!("Contrast query failed: {}", e))
        .ok()
        .and_then(SensorReading::value);
    let brightness = session
        .get_brightness()
        .inspect_err(|e| warn!("Brightness query failed: {}", e))
        .ok()
        .and_then(SensorReading::value);
    let temperature = session
        .get_temperature()
        .context("Failed to read temperature")?;

    let report = InfoReport {
        device: config.device.clone(),
        width: caps.width,
        height: caps.height,
        real_time_clock: caps.has_real_time_clock,
        rom_size_kbit: caps.rom_size_kbit,
        light_sensor: caps.has_light_sensor,
        thermal_sensor: caps.has_thermal_sensor,
        contrast,
        brightness,
        temperature: match temperature {
            SensorReading::Unsupported => None,
            reading => Some(reading.to_string()),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let or_unknown = |value: Option<u8>| value.map_or("unknown".to_string(), |v| v.to_string());
    println!("LCD Status:");
    println!("  Device: {}", report.device);
    println!("  Size: {}x{}", report.width, report.height);
    println!("  Real-time clock: {}", yes_no(report.real_time_clock));
    println!("  ROM: {} kbit", report.rom_size_kbit);
    println!("  Light sensor: {}", yes_no(report.light_sensor));
    println!("  Thermal sensor: {}", yes_no(report.thermal_sensor));
    println!("  Contrast: {}", or_unknown(report.contrast));
    println!("  Brightness: {}", or_unknown(report.brightness));
    println!("  Temperature: {}", temperature);
    Ok(())
}

fn handle_contrast(session: &mut LcdSession, value: Option<i32>) -> Result<()> {
    if let Some(value) = value {
        let level = session
            .set_contrast(value)
            .context("Failed to set contrast")?;
        println!("Contrast set to: {}", level);
    } else {
        let current = session.get_contrast().context("Failed to read contrast")?;
        println!("Current contrast: {}", current);
    }
    Ok(())
}

fn handle_brightness(session: &mut LcdSession, value: Option<i32>) -> Result<()> {
    if let Some(value) = value {
        let level = session
            .set_brightness(value)
            .context("Failed to set brightness")?;
        println!("Brightness set to: {}", level);
    } else {
        let current = session
            .get_brightness()
            .context("Failed to read brightness")?;
        println!("Current brightness: {}", current);
    }
    Ok(())
}

fn check_direction(direction: ScrollDirection) -> Result<()> {
    if !direction.is_supported() {
        bail!("Cannot scroll {}: only up and down are supported", direction);
    }
    Ok(())
}

fn handle_scroll(
    session: &mut LcdSession,
    direction: ScrollDirection,
    distance: usize,
    wrap: bool,
    lines: &[String],
) -> Result<()> {
    check_direction(direction)?;

    for (index, text) in lines.iter().enumerate() {
        session
            .write_line(index + 1, text)
            .with_context(|| format!("Failed to write line {}", index + 1))?;
    }

    let scrolled = if wrap {
        session.scroll_wrapping(direction, distance)
    } else {
        session.scroll(direction, distance)
    };
    scrolled.with_context(|| format!("Failed to scroll {}", direction))?;

    println!("Scrolled {} by {}", direction, distance);
    Ok(())
}

/// Applies configured contrast and brightness, then blanks the screen.
fn prepare_display(session: &mut LcdSession, config: &Config) -> Result<()> {
    session
        .set_contrast(config.display.contrast)
        .context("Failed to set contrast")?;
    session
        .set_brightness(config.display.brightness)
        .context("Failed to set brightness")?;
    session.clear_display().context("Failed to clear display")?;
    Ok(())
}

async fn run_console(session: &mut LcdSession, config: &Config) -> Result<()> {
    prepare_display(session, config)?;

    let height = session.capabilities().height as usize;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next = 1;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let input = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = &mut shutdown => None,
        };
        let Some(input) = input else {
            break;
        };

        if next > height {
            session
                .scroll(ScrollDirection::Up, 1)
                .context("Failed to scroll display")?;
            next = height;
        }

        println!("Writing {} to screen line {}", input, next);
        session
            .write_line(next, &input)
            .with_context(|| format!("Failed to write line {}", next))?;
        next += 1;
    }

    Ok(())
}

fn temperature_line(reading: Option<SensorReading<Temperature>>) -> String {
    match reading {
        Some(SensorReading::Value(t)) => format!("Temp is {}", t),
        Some(SensorReading::OutOfRange) => "Temp out of range".to_string(),
        Some(SensorReading::Unsupported) => "No temp sensor".to_string(),
        None => "Temp --".to_string(),
    }
}

async fn run_stats(session: &mut LcdSession, config: &Config) -> Result<()> {
    prepare_display(session, config)?;

    let system = SystemInfo::new();
    let hostname = system.hostname();
    let height = session.capabilities().height as usize;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.stats.interval_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("Interrupted, stopping stats display");
                break;
            }
        }

        // An unresponsive sensor should not stop the screen from updating.
        let temperature = session
            .get_temperature()
            .inspect_err(|e| warn!("Temperature query failed: {}", e))
            .ok();

        let lines = [
            stats::format_host_clock(&hostname, system.local_time()),
            temperature_line(temperature),
            stats::format_uptime(system.uptime_seconds()),
            stats::format_load(system.load_average()),
        ];
        for (index, text) in lines.iter().enumerate().take(height) {
            session
                .write_line(index + 1, text)
                .with_context(|| format!("Failed to write line {}", index + 1))?;
        }
    }

    Ok(())
}

async fn run_charmap(session: &mut LcdSession, config: &Config) -> Result<()> {
    prepare_display(session, config)?;

    let caps = *session.capabilities();
    let width = caps.width as usize;
    let codes: Vec<u8> = (32..=u8::MAX).collect();
    let page_delay = Duration::from_millis(config.charmap.page_ms);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    for (page, chunk) in codes.chunks(caps.cells()).enumerate() {
        println!(
            "Page {} - characters {} to {}",
            page + 1,
            chunk[0],
            chunk[chunk.len() - 1]
        );

        let mut rows = chunk.chunks(width);
        for line in 1..=caps.height as usize {
            let row = rows.next().unwrap_or(&[]);
            session
                .write_line(line, row)
                .with_context(|| format!("Failed to write line {}", line))?;
        }

        tokio::select! {
            _ = tokio::time::sleep(page_delay) => {}
            _ = &mut shutdown => break,
        }
    }

    Ok(())
}
