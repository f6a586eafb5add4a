//! `mbx rm` — Remove a container record.

use clap::Args;
use minibox_runtime::engine::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container ID (e.g. c1).
    pub id: String,
}

/// Executes the `rm` command. The container's log file is kept.
///
/// # Errors
///
/// Returns an error if the container is unknown or still running.
pub fn execute(engine: &Engine, args: &RmArgs) -> anyhow::Result<()> {
    let _ = engine.remove(&args.id)?;
    println!("Container {} removed", args.id);
    Ok(())
}
