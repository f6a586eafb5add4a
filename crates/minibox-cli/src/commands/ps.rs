//! `mbx ps` — List containers.

use clap::Args;
use minibox_runtime::engine::Engine;
use minibox_runtime::lifecycle::ContainerView;

use crate::output::optional;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Print the rows as a JSON array.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `ps` command.
///
/// Statuses are reconciled against live processes for display only; the
/// stored records are not rewritten.
///
/// # Errors
///
/// Returns an error if the container table cannot be read.
pub fn execute(engine: &Engine, args: &PsArgs) -> anyhow::Result<()> {
    let containers = engine.list()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&containers)?);
        return Ok(());
    }

    if containers.is_empty() {
        println!("No containers found.");
        return Ok(());
    }

    println!("{}", header());
    for c in &containers {
        println!("{}", row(c));
    }
    Ok(())
}

fn header() -> String {
    format!(
        "{:<8} {:<16} {:<9} {:<8} {:<20} {:<10} {:<5}",
        "ID", "IMAGE", "STATUS", "PID", "STARTED", "UPTIME", "EXIT"
    )
}

fn row(c: &ContainerView) -> String {
    format!(
        "{:<8} {:<16} {:<9} {:<8} {:<20} {:<10} {:<5}",
        c.id,
        c.image,
        c.status,
        c.pid,
        c.start_time,
        c.uptime,
        optional(c.exit_code)
    )
}
