//! Inspect command implementation.

use dirsync_catalog::{CatalogStats, CatalogStore, Tables};
use serde::Serialize;
use std::path::Path;

/// Catalog inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Catalog path.
    pub path: String,
    /// Row counts.
    pub stats: CatalogStats,
    /// Users in ID order.
    pub users: Vec<UserRow>,
    /// Groups in ID order.
    pub groups: Vec<GroupRow>,
}

/// One user and its memberships.
#[derive(Debug, Serialize)]
pub struct UserRow {
    /// User ID.
    pub id: u32,
    /// Login name.
    pub username: String,
    /// Authentication origin.
    pub auth_kind: String,
    /// `group:profile` pairs.
    pub memberships: Vec<String>,
}

/// One group.
#[derive(Debug, Serialize)]
pub struct GroupRow {
    /// Group ID.
    pub id: u32,
    /// Group name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.join("catalog.cbor").exists() {
        return Err(format!("No catalog found at {:?}", path).into());
    }
    let store = CatalogStore::open(path)?;
    let result = InspectResult {
        path: path.display().to_string(),
        stats: store.stats(),
        users: store.read_committed(user_rows),
        groups: store.read_committed(group_rows),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn user_rows(tables: &Tables) -> Vec<UserRow> {
    tables
        .users()
        .map(|user| UserRow {
            id: user.id.as_u32(),
            username: user.username.clone(),
            auth_kind: user.auth_kind.to_string(),
            memberships: tables
                .memberships_of(user.id)
                .iter()
                .map(|m| {
                    let group = tables
                        .group(m.group_id)
                        .map_or_else(|| m.group_id.to_string(), |g| g.name.clone());
                    format!("{group}:{}", m.profile)
                })
                .collect(),
        })
        .collect()
}

fn group_rows(tables: &Tables) -> Vec<GroupRow> {
    tables
        .groups()
        .map(|group| GroupRow {
            id: group.id.as_u32(),
            name: group.name.clone(),
            description: group.description.clone(),
        })
        .collect()
}

fn print_text_output(result: &InspectResult) {
    println!("Catalog Inspection Report");
    println!("=========================");
    println!("Path: {}", result.path);
    println!();
    println!("Users:          {}", result.stats.users());
    println!("  Local:        {}", result.stats.local_users);
    println!("  Directory:    {}", result.stats.ldap_users);
    println!("Groups:         {}", result.stats.groups);
    println!("Memberships:    {}", result.stats.memberships);

    if !result.users.is_empty() {
        println!();
        println!("{:>6}  {:<24}  {:<6}  Memberships", "ID", "Username", "Auth");
        for user in &result.users {
            println!(
                "{:>6}  {:<24}  {:<6}  {}",
                user.id,
                user.username,
                user.auth_kind,
                user.memberships.join(", ")
            );
        }
    }

    if !result.groups.is_empty() {
        println!();
        println!("{:>6}  {:<24}  Description", "ID", "Group");
        for group in &result.groups {
            println!(
                "{:>6}  {:<24}  {}",
                group.id,
                group.name,
                group.description.as_deref().unwrap_or("")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsync_catalog::{AuthKind, Profile};

    #[test]
    fn rows_name_groups_and_profiles() {
        let store = CatalogStore::open_in_memory().unwrap();
        store
            .transaction(|t| {
                let user = t.create_user("alice", AuthKind::Ldap, None)?;
                let group = t.create_group("Editors")?;
                t.add_membership(user.id, group.id, Profile::Editor)
            })
            .unwrap();

        let users = store.read_committed(user_rows);
        assert_eq!(users[0].auth_kind, "ldap");
        assert_eq!(users[0].memberships, vec!["Editors:Editor"]);
        assert_eq!(store.read_committed(group_rows)[0].name, "Editors");
    }

    #[test]
    fn missing_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), "text").is_err());
    }
}
