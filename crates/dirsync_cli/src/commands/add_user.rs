//! Add-user command implementation.
//!
//! Stands in for the login flow that materializes directory users in the
//! catalog on first authentication.

use dirsync_catalog::{AuthKind, CatalogError, CatalogStore, LocalUser, Profile};
use std::path::Path;

/// A user to add.
#[derive(Debug, Clone)]
pub struct AddUser {
    /// Login name.
    pub name: String,
    /// Directory-sourced user.
    pub ldap: bool,
    /// Group to join; must exist.
    pub group: Option<String>,
    /// Profile in the group.
    pub profile: String,
    /// Contact address.
    pub email: Option<String>,
}

/// Runs the add-user command.
pub fn run(path: &Path, request: &AddUser) -> Result<(), Box<dyn std::error::Error>> {
    let store = CatalogStore::open(path)?;
    let user = add(&store, request)?;
    println!("Added {} user {} ({})", user.auth_kind, user.username, user.id);
    Ok(())
}

fn add(store: &CatalogStore, request: &AddUser) -> Result<LocalUser, CatalogError> {
    let kind = if request.ldap {
        AuthKind::Ldap
    } else {
        AuthKind::Local
    };
    let profile: Profile = request.profile.parse()?;

    store.transaction(|t| {
        let group = match &request.group {
            Some(name) => Some(
                t.find_group_by_name(name)
                    .map(|g| g.id)
                    .ok_or_else(|| CatalogError::invalid_name(format!("no group named {name:?}")))?,
            ),
            None => None,
        };
        let user = t.create_user(&request.name, kind, request.email.clone())?;
        if let Some(group) = group {
            t.add_membership(user.id, group, profile)?;
        }
        Ok(user)
    })
}
