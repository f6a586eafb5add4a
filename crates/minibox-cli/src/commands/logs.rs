//! `mbx logs` — Print a container's captured output.

use std::io;

use clap::Args;
use minibox_runtime::engine::Engine;
use minibox_runtime::logs::LogsOutcome;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container ID (e.g. c1).
    pub id: String,

    /// Keep printing new output until the container exits.
    #[arg(short, long)]
    pub follow: bool,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or the log cannot be read.
pub fn execute(engine: &Engine, args: &LogsArgs) -> anyhow::Result<()> {
    let outcome = engine.logs(&args.id, args.follow, &mut io::stdout().lock())?;
    if outcome == LogsOutcome::NoLogs {
        println!("No logs for container {}", args.id);
    }
    Ok(())
}
