//! Result-line output.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Print `value` as one compact JSON line on stdout.
pub fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).context("failed to serialize result line")?;
    println!("{line}");
    Ok(())
}

/// Read a file as text with a path-bearing error.
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read and parse a JSON file.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// `path` made absolute against the working directory, without touching
/// the filesystem.
pub fn absolute(path: &Path) -> String {
    if path.is_absolute() {
        return path.display().to_string();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
