//! `mbx stop` — Stop a running container.

use clap::Args;
use minibox_runtime::engine::Engine;
use minibox_runtime::lifecycle::StopOutcome;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container ID (e.g. c1).
    pub id: String,
}

/// Executes the `stop` command.
///
/// Sends SIGTERM, waits out the grace period and escalates to SIGKILL if
/// the process is still alive. Blocks for several seconds.
///
/// # Errors
///
/// Returns an error if the container is unknown or cannot be signalled.
pub fn execute(engine: &Engine, args: &StopArgs) -> anyhow::Result<()> {
    let id = &args.id;
    match engine.stop(id)? {
        StopOutcome::AlreadyStopped(status) => {
            println!("Container {id} already stopped ({status})");
        }
        StopOutcome::Reconciled => println!("Container {id} was not running; marked exited"),
        StopOutcome::Stopped => println!("Container {id} stopped"),
        StopOutcome::Killed => println!("Container {id} killed after grace period"),
    }
    Ok(())
}
