//! `mbx build` — Snapshot a directory as a named image.

use std::path::PathBuf;

use clap::Args;
use minibox_runtime::engine::Engine;

/// Arguments for the `build` command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Image name (letters, digits, '-' and '_'; starts with a letter).
    pub name: String,

    /// Directory to copy as the image root filesystem.
    pub source: PathBuf,
}

/// Executes the `build` command.
///
/// # Errors
///
/// Returns an error if the name is invalid or taken, or the copy fails.
pub fn execute(engine: &Engine, args: &BuildArgs) -> anyhow::Result<()> {
    tracing::info!(image = %args.name, source = %args.source.display(), "building image");
    let record = engine.build(&args.name, &args.source)?;
    println!(
        "Image {} built from {} ({})",
        record.name,
        args.source.display(),
        record.rootfs_path.display()
    );
    Ok(())
}
