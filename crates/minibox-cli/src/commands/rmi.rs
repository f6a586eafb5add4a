//! `mbx rmi` — Remove an image.

use clap::Args;
use minibox_runtime::engine::Engine;

/// Arguments for the `rmi` command.
#[derive(Args, Debug)]
pub struct RmiArgs {
    /// Image name.
    pub name: String,
}

/// Executes the `rmi` command.
///
/// # Errors
///
/// Returns an error if the image is unknown or still referenced by a
/// container record.
pub fn execute(engine: &Engine, args: &RmiArgs) -> anyhow::Result<()> {
    let _ = engine.remove_image(&args.name)?;
    println!("Image {} removed", args.name);
    Ok(())
}
