//! `mbx images` — List images.

use minibox_runtime::engine::Engine;

use crate::output::format_bytes;

/// Executes the `images` command.
///
/// # Errors
///
/// Returns an error if the image table cannot be read.
pub fn execute(engine: &Engine) -> anyhow::Result<()> {
    let images = engine.images()?;
    if images.is_empty() {
        println!("No images found.");
        return Ok(());
    }

    println!("{:<24} {:<12} {:<20}", "IMAGE", "SIZE", "CREATED");
    for image in &images {
        println!(
            "{:<24} {:<12} {:<20}",
            image.record.name,
            image.size.map_or_else(|| "N/A".to_string(), format_bytes),
            image.record.created_at
        );
    }
    Ok(())
}
