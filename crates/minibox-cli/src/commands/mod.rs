//! CLI command definitions and dispatch.

pub mod build;
pub mod images;
pub mod logs;
pub mod ps;
pub mod rm;
pub mod rmi;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use minibox_common::config::HomeLayout;
use minibox_common::constants::HOME_ENV;
use minibox_runtime::engine::Engine;

/// minibox: minimal single-host container lifecycle manager.
#[derive(Parser, Debug)]
#[command(name = "mbx", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Base directory for images, records and logs [default: ~/.minibox].
    #[arg(long, global = true, env = HOME_ENV, value_name = "DIR")]
    pub home: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Snapshot a directory as a named image.
    Build(build::BuildArgs),
    /// List images.
    Images,
    /// Remove an image no container references.
    Rmi(rmi::RmiArgs),
    /// Run a container and wait for it to exit.
    Run(run::RunArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Stop a running container (SIGTERM, then SIGKILL).
    Stop(stop::StopArgs),
    /// Remove a container record.
    Rm(rm::RmArgs),
    /// Print a container's output.
    Logs(logs::LogsArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the home directory cannot be prepared or the
/// command fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let layout = HomeLayout::resolve(cli.home)?;
    tracing::debug!(home = %layout.base_dir().display(), "using home directory");
    let engine = Engine::open(layout)?;

    match cli.command {
        Command::Build(args) => build::execute(&engine, &args),
        Command::Images => images::execute(&engine),
        Command::Rmi(args) => rmi::execute(&engine, &args),
        Command::Run(args) => run::execute(&engine, args),
        Command::Ps(args) => ps::execute(&engine, &args),
        Command::Stop(args) => stop::execute(&engine, &args),
        Command::Rm(args) => rm::execute(&engine, &args),
        Command::Logs(args) => logs::execute(&engine, &args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn home_flag_is_global() {
        let cli = Cli::try_parse_from(["mbx", "ps", "--home", "/tmp/mb"]).expect("parse");
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/mb")));
        assert!(matches!(cli.command, Command::Ps(_)));
    }

    #[test]
    fn stop_requires_an_id() {
        assert!(Cli::try_parse_from(["mbx", "stop"]).is_err());
    }
}
