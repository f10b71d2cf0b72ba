use anyhow::Result;
use channel_tint::cli::{self, Cli, CliResult};
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config first: its log level is the lowest-precedence source
    let config = cli::load_config(cli.config.as_deref())?;

    // CLI --log-level flag takes highest precedence, then RUST_LOG, then config.
    channel_tint::debug::init_log_bridge(cli.log_level.map(Into::into), config.log_level);

    log::info!("Starting channel-tint {}", channel_tint::VERSION);

    match cli::run(cli.command, &config) {
        Ok(CliResult::Exit(0)) => Ok(()),
        // Non-zero exit: use process::exit so the shell sees the correct code
        Ok(CliResult::Exit(code)) => std::process::exit(code),
        Err(e) => {
            eprintln!("channel-tint: error: {e:#}");
            Err(e)
        }
    }
}
