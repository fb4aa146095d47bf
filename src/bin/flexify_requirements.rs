//! Rewrite a pip requirements manifest into its "flexible" variant.
//!
//! Usage: `flexify_requirements [requirements.txt]`
//!
//! The input defaults to `requirements.txt` in the current directory; the
//! output lands next to it with a `_flexible` suffix. The transform itself
//! lives in [`transcribe_backend::manifest`].

use anyhow::{Context, Result};
use std::path::Path;

use transcribe_backend::manifest::{flexible_output_name, ManifestRewriter};

const DEFAULT_INPUT_FILE: &str = "requirements.txt";

fn main() -> Result<()> {
    let input_file = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            println!("No file specified, using default: '{}'", DEFAULT_INPUT_FILE);
            DEFAULT_INPUT_FILE.to_string()
        }
    };

    if !Path::new(&input_file).exists() {
        anyhow::bail!("File '{}' not found", input_file);
    }

    let raw = std::fs::read(&input_file)
        .with_context(|| format!("Failed to read '{}'", input_file))?;

    // Windows editors love BOMs; strip one if present and read the rest
    // leniently.
    let contents = String::from_utf8_lossy(&raw);
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(&contents);

    let rewriter = ManifestRewriter::default();
    let output = rewriter.rewrite(contents);

    let output_file = flexible_output_name(&input_file);
    std::fs::write(&output_file, output)
        .with_context(|| format!("Failed to write '{}'", output_file))?;

    println!("Generated '{}' from '{}'", output_file, input_file);
    Ok(())
}
