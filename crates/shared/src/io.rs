use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load quotes from a text file, one per line
pub fn load_quotes_file(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        anyhow::bail!("Quotes file not found: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read quotes file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read OCR output text saved by an external OCR step
pub fn load_ocr_text(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read OCR text: {}", path.display()))
}
