use crate::core::{BlockDef, BlockSpec};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Block file layout, detected from the first non-blank character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// `[{"title": ..., "start": ...}, ...]`
    List,
    /// `{"blocks": [...]}`
    Document,
    Unknown,
}

#[derive(Deserialize)]
struct BlockDocument {
    blocks: Vec<BlockDef>,
}

pub fn detect_format(text: &str) -> InputFormat {
    match text.trim_start().chars().next() {
        Some('[') => InputFormat::List,
        Some('{') => InputFormat::Document,
        _ => InputFormat::Unknown,
    }
}

/// Parse block definitions from JSON text
pub fn parse_blocks(text: &str) -> Result<Vec<BlockDef>> {
    let defs = match detect_format(text) {
        InputFormat::List => serde_json::from_str::<Vec<BlockDef>>(text)?,
        InputFormat::Document => serde_json::from_str::<BlockDocument>(text)?.blocks,
        InputFormat::Unknown => bail!("Unknown block file format"),
    };
    Ok(defs)
}

/// Load block definitions from a file as reference-bound specs
pub fn load_blocks<P: AsRef<Path>>(path: P) -> Result<Vec<BlockSpec>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read block file: {:?}", path))?;
    let defs = parse_blocks(&text)
        .with_context(|| format!("Failed to parse block file: {:?}", path))?;
    debug!("Loaded {} block definitions from {:?}", defs.len(), path);
    Ok(defs.into_iter().map(BlockSpec::from).collect())
}
