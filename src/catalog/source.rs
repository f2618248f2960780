
use std::path::Path;
use tracing::info;

use super::models::{CatalogError, CatalogRow};

/// Reads a JSON array of [`CatalogRow`]s.
pub fn load_rows(path: &Path) -> Result<Vec<CatalogRow>, CatalogError> {
    let raw = std::fs::read_to_string(path)?;
    let rows = parse_rows(&raw)?;
    info!("Loaded {} catalog rows from {}", rows.len(), path.display());
    Ok(rows)
}


pub fn parse_rows(raw: &str) -> Result<Vec<CatalogRow>, CatalogError> {
    Ok(serde_json::from_str(raw)?)
}
