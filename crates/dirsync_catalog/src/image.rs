//! Catalog image encoding.
//!
//! The whole catalog is persisted as one CBOR document:
//!
//! ```text
//! { magic: "dirsync-catalog", format_version: 1,
//!   last_user_id, last_group_id, users: [..], groups: [..], memberships: [..] }
//! ```
//!
//! Decoding re-checks every integrity rule, so a hand-edited or truncated
//! image is rejected instead of loaded half-valid.

use crate::entity::{LocalGroup, LocalUser, Membership};
use crate::error::{CatalogError, CatalogResult};
use crate::tables::Tables;
use serde::{Deserialize, Serialize};

/// Current catalog image format version.
pub const FORMAT_VERSION: u16 = 1;

const MAGIC: &str = "dirsync-catalog";

#[derive(Serialize, Deserialize)]
struct CatalogImage {
    magic: String,
    format_version: u16,
    last_user_id: u32,
    last_group_id: u32,
    users: Vec<LocalUser>,
    groups: Vec<LocalGroup>,
    memberships: Vec<Membership>,
}

/// Encodes tables into image bytes.
pub(crate) fn encode(tables: &Tables) -> CatalogResult<Vec<u8>> {
    let image = CatalogImage {
        magic: MAGIC.to_string(),
        format_version: FORMAT_VERSION,
        last_user_id: tables.last_user_id(),
        last_group_id: tables.last_group_id(),
        users: tables.users().cloned().collect(),
        groups: tables.groups().cloned().collect(),
        memberships: tables.memberships().copied().collect(),
    };

    let mut bytes = Vec::new();
    ciborium::into_writer(&image, &mut bytes).map_err(|e| CatalogError::encode(e.to_string()))?;
    Ok(bytes)
}

/// Decodes image bytes into tables.
pub(crate) fn decode(bytes: &[u8]) -> CatalogResult<Tables> {
    let image: CatalogImage =
        ciborium::from_reader(bytes).map_err(|e| CatalogError::invalid_format(e.to_string()))?;

    if image.magic != MAGIC {
        return Err(CatalogError::invalid_format(format!(
            "unexpected magic {:?}",
            image.magic
        )));
    }
    if image.format_version != FORMAT_VERSION {
        return Err(CatalogError::invalid_format(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            image.format_version
        )));
    }

    Tables::from_rows(
        image.users,
        image.groups,
        image.memberships,
        image.last_user_id,
        image.last_group_id,
    )
}
