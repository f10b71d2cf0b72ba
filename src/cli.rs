//! Command-line interface for channel-tint.
//!
//! Subcommands drive the colorizer against an in-memory page: `replay` runs a
//! scripted scenario through the change watcher, `classify` and `resolve`
//! expose the single-step pieces for quick checks, and `settings` shows (or
//! follows) the settings file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use channel_tint_config::{
    Config, FileSettingsStore, HexColor, LogLevel, Settings, SettingsStore,
};

use crate::decorator::ThemeClass;
use crate::page::MemoryPage;
use crate::resolver::ChannelResolver;
use crate::scenario::{ReplayReport, Scenario};

/// channel-tint - per-channel composer tint for a chat web application
#[derive(Parser)]
#[command(name = "channel-tint")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ~/.config/channel-tint/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set debug log level (overrides config and RUST_LOG)
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevelArg>,
}

/// Log level argument for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Off => LogLevel::Off,
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a YAML scenario against an in-memory page
    Replay {
        /// Scenario file
        scenario: PathBuf,
    },

    /// Print the luma and light/dark class of a color
    Classify {
        /// Color as #rrggbb or #rgb
        color: String,
    },

    /// Detect the channel of a bare page at ADDRESS
    Resolve {
        /// Navigation address
        address: String,
    },

    /// Show the stored settings (exclusions and default color)
    Settings {
        /// Keep running and print the settings again whenever the file changes
        #[arg(short, long)]
        watch: bool,
    },
}

/// Result of CLI processing
pub enum CliResult {
    /// Subcommand completed with this exit code
    Exit(i32),
}

/// Load the configuration named on the command line, or the default one.
///
/// An explicitly named file must exist; the default location may be absent.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from(path)
        }
        None => Config::load(),
    }
}

/// Run a parsed subcommand.
pub fn run(command: Commands, config: &Config) -> Result<CliResult> {
    let code = match command {
        Commands::Replay { scenario } => replay_cli(&scenario, config)?,
        Commands::Classify { color } => classify_cli(&color)?,
        Commands::Resolve { address } => resolve_cli(&address, config)?,
        Commands::Settings { watch } => settings_cli(config, watch)?,
    };
    Ok(CliResult::Exit(code))
}

/// Passes must not run in parallel, so every command uses a single-threaded runtime.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")
}

fn replay_cli(path: &Path, config: &Config) -> Result<i32> {
    let scenario = Scenario::load(path)?;
    let report = runtime()?.block_on(crate::scenario::replay(&scenario, config))?;
    print_report(&report);
    Ok(0)
}

fn print_report(report: &ReplayReport) {
    for (index, pass) in report.passes.iter().enumerate() {
        println!("pass {} [{}]: {}", index + 1, pass.trigger, pass.outcome);
    }
    match &report.surface {
        Some(surface) => {
            let owner = surface
                .mark
                .owner
                .as_ref()
                .map(|o| o.as_str())
                .unwrap_or("-");
            println!(
                "surface {}: background {}, colorized {}, owner {}, theme {}",
                surface.element,
                surface.background.as_deref().unwrap_or("-"),
                surface.mark.colorized,
                owner,
                surface.mark.theme
            );
        }
        None => println!("surface: absent"),
    }
}

fn classify_cli(color: &str) -> Result<i32> {
    let color: HexColor = color.parse()?;
    println!(
        "{} luma {:.1} {}",
        color,
        color.luma(),
        ThemeClass::for_color(color)
    );
    Ok(0)
}

fn resolve_cli(address: &str, config: &Config) -> Result<i32> {
    let resolver = ChannelResolver::from_config(config).context("Invalid address pattern")?;
    let page = MemoryPage::new(address);
    match resolver.resolve(&page) {
        Some(channel) => {
            println!("{channel}");
            Ok(0)
        }
        None => {
            eprintln!("No channel detected");
            Ok(1)
        }
    }
}

fn settings_cli(config: &Config, watch: bool) -> Result<i32> {
    let path = config.settings_path();
    let runtime = runtime()?;

    if !watch {
        let store = FileSettingsStore::new(&path);
        let settings = runtime.block_on(store.get())?;
        print_settings(&path, &settings);
        return Ok(0);
    }

    runtime.block_on(async {
        let store = FileSettingsStore::watched(&path, config.settings_debounce_ms)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        let mut changes = store.subscribe();
        print_settings(&path, &store.get().await?);

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        match store.get().await {
                            Ok(settings) => print_settings(&path, &settings),
                            // Editors can leave a half-written file behind; wait for the next save
                            Err(e) => eprintln!("channel-tint: {e}"),
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        Ok::<_, anyhow::Error>(())
    })?;
    Ok(0)
}

fn print_settings(path: &Path, settings: &Settings) {
    println!("{}", path.display());
    println!("  default color: {}", settings.default_color);
    if settings.channel_colors.is_empty() {
        println!("  excluded: (none)");
    } else {
        let labels: Vec<&str> = settings.channel_colors.labels().collect();
        println!("  excluded: {}", labels.join(", "));
    }
}
