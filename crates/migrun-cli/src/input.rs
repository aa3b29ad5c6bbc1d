use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// Read a migrations document. `-` reads JSON from stdin; `.yml`/`.yaml`
/// files are parsed as YAML, everything else as JSON.
pub fn read_document(path: &Path) -> Result<Value> {
    if path == Path::new("-") {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .context("failed to read migrations from stdin")?;
        return parse_document(&contents, "json");
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    parse_document(&contents, ext)
}

fn parse_document(contents: &str, ext: &str) -> Result<Value> {
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(contents).context("YAML parse error"),
        _ => serde_json::from_str(contents).context("JSON parse error"),
    }
}
