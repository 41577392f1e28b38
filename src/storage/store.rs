use crate::domain::ItemRecord;
use crate::storage::files::{atomic_write, read_file};
use anyhow::Result;
use std::path::Path;
use tracing::warn;

/// Load the item list snapshot. A missing file is an empty list; a
/// file that fails to parse is logged and treated as empty rather
/// than aborting startup.
pub fn load_items<P: AsRef<Path>>(path: P) -> Result<Vec<ItemRecord>> {
    let path = path.as_ref();
    let content = read_file(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Vec<ItemRecord>>(&content) {
        Ok(records) => Ok(records
            .into_iter()
            .filter_map(ItemRecord::sanitized)
            .collect()),
        Err(e) => {
            warn!("could not parse {}: {e}; starting empty", path.display());
            Ok(Vec::new())
        }
    }
}

/// Write the full snapshot atomically. The previous file stays intact
/// if anything fails mid-write.
pub fn save_items<P: AsRef<Path>>(path: P, records: &[ItemRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    atomic_write(path, &json)?;
    Ok(())
}
