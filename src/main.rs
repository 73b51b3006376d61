//! Headless timeline host.
//!
//! Notifications are written to stdout and commands read from stdin, one
//! JSON object per line. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sketch_timeline::core::{BlockSpec, FunctionRegistry, Value};
use sketch_timeline::host::{ChannelHost, IntervalTrigger, JsonLinesCommands, Notification, Player};
use sketch_timeline::input::load_blocks;
use sketch_timeline::{ClockMode, Timeline, TimelineConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sketch-timeline")]
#[command(about = "Run a block timeline, speaking JSON lines over stdio")]
struct Args {
    /// Block definitions (JSON list or {"blocks": [...]})
    blocks: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Stop at the end instead of looping
    #[arg(long)]
    no_loop: bool,

    /// Wait for a play command before ticking
    #[arg(long)]
    paused: bool,

    /// End of the default block when no block file is given
    #[arg(long)]
    length: Option<f64>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_config: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Frame,
    Time,
}

impl From<ModeArg> for ClockMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Frame => ClockMode::Frame,
            ModeArg::Time => ClockMode::Time,
        }
    }
}

impl Args {
    fn settings_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(TimelineConfig::config_path)
    }

    fn load_config(&self) -> Result<TimelineConfig> {
        let mut config = match &self.config {
            Some(path) => TimelineConfig::load_from(path)?,
            None => TimelineConfig::load(),
        };

        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(rate) = self.tick_rate {
            config.tick_rate = rate;
        }
        if let Some(length) = self.length {
            config.default_length = length;
        }
        if self.no_loop {
            config.looping = false;
        }
        if self.paused {
            config.autoplay = false;
        }
        Ok(config)
    }
}

/// Functions block titles can refer to
fn builtin_functions() -> FunctionRegistry {
    FunctionRegistry::new()
        .with("log", |args| {
            let text: Vec<String> = args.iter().map(Value::to_string).collect();
            info!("log({})", text.join(", "));
        })
        .with("noop", |_| {})
}

async fn write_notifications(mut rx: mpsc::Receiver<Notification>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(notification) = rx.recv().await {
        let line = match serde_json::to_string(&notification) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to encode notification: {}", e);
                continue;
            }
        };
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn run(config: TimelineConfig, blocks: Option<Vec<BlockSpec>>) -> Result<()> {
    let (host, notifications) = ChannelHost::channel(1024);
    let writer = tokio::spawn(write_notifications(notifications));

    let (trigger, ticks) = IntervalTrigger::channel(Handle::current());
    let mut builder = Timeline::builder(config)
        .functions(builtin_functions())
        .host(host)
        .trigger(trigger)
        .draw(|_| trace!("draw"));
    if let Some(blocks) = blocks {
        builder = builder.blocks(blocks);
    }
    let timeline = builder.build();

    let commands = JsonLinesCommands::new(BufReader::new(tokio::io::stdin()));
    let player = Player::new(timeline, ticks, commands);

    tokio::select! {
        timeline = player.run() => {
            info!("Input closed at position {}", timeline.position());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    // Every sender is gone once the timeline is dropped
    writer
        .await
        .context("Notification writer panicked")?
        .context("Failed to write notifications")?;
    Ok(())
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;

    if args.save_config {
        if let Some(path) = args.settings_path() {
            config.save_to(&path)?;
            info!("Saved settings to {:?}", path);
        }
    }

    let blocks = args.blocks.as_ref().map(load_blocks).transpose()?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let result = rt.block_on(run(config, blocks));
    // The stdin reader sits on a blocking thread that may never return
    rt.shutdown_timeout(Duration::from_millis(100));
    result
}
