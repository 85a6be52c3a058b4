//! Add-group command implementation.

use dirsync_catalog::CatalogStore;
use std::path::Path;

/// Runs the add-group command.
pub fn run(
    path: &Path,
    name: &str,
    description: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = CatalogStore::open(path)?;
    let group = store.transaction(|t| {
        let group = t.create_group(name)?;
        t.set_group_description(group.id, description)?;
        Ok(group)
    })?;
    println!("Added group {} ({})", group.name, group.id);
    Ok(())
}
