//! `mbx run` — Run a container and wait for it to exit.

use clap::Args;
use minibox_common::types::ResourceLimits;
use minibox_runtime::engine::{Engine, parse_memory};
use minibox_runtime::supervisor::RunRequest;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Address-space limit, e.g. 16M, 512K, 1GiB or a byte count.
    #[arg(long, value_name = "SIZE", value_parser = parse_memory_arg)]
    pub mem: Option<u64>,

    /// CPU-time limit in whole seconds.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub cpu: Option<u64>,

    /// Extra environment variable; may be repeated.
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Image to run.
    pub image: String,

    /// Entry command and arguments [default: /bin/sh].
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    fn into_request(self) -> RunRequest {
        RunRequest {
            image: self.image,
            limits: ResourceLimits {
                cpu_seconds: self.cpu,
                memory_bytes: self.mem,
            },
            env: self.env,
            command: self.command,
        }
    }
}

/// Executes the `run` command.
///
/// Prints a launch line as soon as the process exists, then blocks until
/// it terminates.
///
/// # Errors
///
/// Returns an error if the image cannot be resolved or the process cannot
/// be launched or waited for.
pub fn execute(engine: &Engine, args: RunArgs) -> anyhow::Result<()> {
    let request = args.into_request();
    let outcome = engine.run(&request, |id, pid| {
        println!("Container {id} started (PID {pid})");
    })?;

    match &outcome.reason {
        Some(reason) => println!(
            "Container {} exited with code {}: {reason}",
            outcome.id, outcome.exit_code
        ),
        None => println!(
            "Container {} exited with code {}",
            outcome.id, outcome.exit_code
        ),
    }
    if !outcome.recorded {
        eprintln!(
            "Warning: the record of container {} may be incomplete",
            outcome.id
        );
    }
    Ok(())
}

fn parse_memory_arg(s: &str) -> Result<u64, String> {
    parse_memory(s).map_err(|e| e.to_string())
}

/// Parses `KEY=VALUE`; the value may be empty or contain `=`.
fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}
