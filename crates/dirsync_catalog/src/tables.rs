//! In-memory catalog tables.

use crate::entity::{LocalGroup, LocalUser, Membership};
use crate::error::{CatalogError, CatalogResult};
use crate::stats::CatalogStats;
use crate::types::{AuthKind, GroupId, Profile, UserId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// The users, groups and memberships tables with their name indexes.
///
/// `Tables` enforces the catalog's integrity rules on every mutation:
/// unique names, memberships that only reference existing rows, and no
/// user deletion while memberships still point at the user.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    users: BTreeMap<UserId, LocalUser>,
    groups: BTreeMap<GroupId, LocalGroup>,
    memberships: BTreeSet<Membership>,
    user_names: HashMap<String, UserId>,
    group_names: HashMap<String, GroupId>,
    last_user_id: u32,
    last_group_id: u32,
}

impl Tables {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds tables from decoded rows, checking every integrity rule.
    pub(crate) fn from_rows(
        users: Vec<LocalUser>,
        groups: Vec<LocalGroup>,
        memberships: Vec<Membership>,
        last_user_id: u32,
        last_group_id: u32,
    ) -> CatalogResult<Self> {
        let mut tables = Self {
            last_user_id,
            last_group_id,
            ..Self::default()
        };

        for user in users {
            if user.id.as_u32() > last_user_id {
                return Err(CatalogError::invalid_format(format!(
                    "{} exceeds id watermark {last_user_id}",
                    user.id
                )));
            }
            if tables.user_names.insert(user.username.clone(), user.id).is_some() {
                return Err(CatalogError::invalid_format(format!(
                    "duplicate user name {}",
                    user.username
                )));
            }
            tables.users.insert(user.id, user);
        }

        for group in groups {
            if group.id.as_u32() > last_group_id {
                return Err(CatalogError::invalid_format(format!(
                    "{} exceeds id watermark {last_group_id}",
                    group.id
                )));
            }
            if tables.group_names.insert(group.name.clone(), group.id).is_some() {
                return Err(CatalogError::invalid_format(format!(
                    "duplicate group name {}",
                    group.name
                )));
            }
            tables.groups.insert(group.id, group);
        }

        for membership in memberships {
            if !tables.users.contains_key(&membership.user_id)
                || !tables.groups.contains_key(&membership.group_id)
            {
                return Err(CatalogError::invalid_format(format!(
                    "dangling membership {} -> {}",
                    membership.user_id, membership.group_id
                )));
            }
            tables.memberships.insert(membership);
        }

        Ok(tables)
    }

    pub(crate) fn last_user_id(&self) -> u32 {
        self.last_user_id
    }

    pub(crate) fn last_group_id(&self) -> u32 {
        self.last_group_id
    }

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a blank name and `UserNameTaken` if the
    /// name is already in use.
    pub fn create_user(
        &mut self,
        username: &str,
        auth_kind: AuthKind,
        email: Option<String>,
    ) -> CatalogResult<LocalUser> {
        validate_name("user", username)?;
        if self.user_names.contains_key(username) {
            return Err(CatalogError::UserNameTaken {
                username: username.to_string(),
            });
        }

        self.last_user_id += 1;
        let user = LocalUser {
            id: UserId::new(self.last_user_id),
            username: username.to_string(),
            auth_kind,
            email,
        };
        self.user_names.insert(user.username.clone(), user.id);
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Creates a group.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a blank name and `GroupNameTaken` if a group
    /// with exactly this name exists.
    pub fn create_group(&mut self, name: &str) -> CatalogResult<LocalGroup> {
        validate_name("group", name)?;
        if self.group_names.contains_key(name) {
            return Err(CatalogError::GroupNameTaken {
                name: name.to_string(),
            });
        }

        self.last_group_id += 1;
        let group = LocalGroup {
            id: GroupId::new(self.last_group_id),
            name: name.to_string(),
            description: None,
        };
        self.group_names.insert(group.name.clone(), group.id);
        self.groups.insert(group.id, group.clone());
        Ok(group)
    }

    /// Sets the catalog-owned description of a group.
    pub fn set_group_description(
        &mut self,
        id: GroupId,
        description: Option<String>,
    ) -> CatalogResult<()> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(CatalogError::GroupNotFound { id: id.as_u32() })?;
        group.description = description;
        Ok(())
    }

    /// Adds a membership. Returns false if the exact link already existed.
    pub fn add_membership(
        &mut self,
        user_id: UserId,
        group_id: GroupId,
        profile: Profile,
    ) -> CatalogResult<bool> {
        if !self.users.contains_key(&user_id) {
            return Err(CatalogError::UserNotFound {
                id: user_id.as_u32(),
            });
        }
        if !self.groups.contains_key(&group_id) {
            return Err(CatalogError::GroupNotFound {
                id: group_id.as_u32(),
            });
        }
        Ok(self.memberships.insert(Membership {
            user_id,
            group_id,
            profile,
        }))
    }

    /// Gets a user by ID.
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<&LocalUser> {
        self.users.get(&id)
    }

    /// Gets a group by ID.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&LocalGroup> {
        self.groups.get(&id)
    }

    /// Finds a user by exact name.
    #[must_use]
    pub fn find_user_by_name(&self, username: &str) -> Option<&LocalUser> {
        self.user_names
            .get(username)
            .and_then(|id| self.users.get(id))
    }

    /// Finds a group by exact, case-sensitive name.
    #[must_use]
    pub fn find_group_by_name(&self, name: &str) -> Option<&LocalGroup> {
        self.group_names
            .get(name)
            .and_then(|id| self.groups.get(id))
    }

    /// Returns every user of the given kind whose name is not in `excluded`.
    #[must_use]
    pub fn find_users_by_auth_kind_excluding(
        &self,
        kind: AuthKind,
        excluded: &HashSet<String>,
    ) -> Vec<LocalUser> {
        self.users
            .values()
            .filter(|user| user.auth_kind == kind && !excluded.contains(&user.username))
            .cloned()
            .collect()
    }

    /// Deletes every membership of the given users. Returns how many links
    /// were removed.
    pub fn delete_memberships_for_users(&mut self, ids: &[UserId]) -> usize {
        let ids: HashSet<UserId> = ids.iter().copied().collect();
        let before = self.memberships.len();
        self.memberships.retain(|m| !ids.contains(&m.user_id));
        before - self.memberships.len()
    }

    /// Deletes the given users. Returns how many rows were removed; unknown
    /// IDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns `MembershipsRemain` if any of the users is still referenced by
    /// a membership. Nothing is deleted in that case.
    pub fn delete_users(&mut self, ids: &[UserId]) -> CatalogResult<usize> {
        let targets: HashSet<UserId> = ids.iter().copied().collect();
        let mut remaining: BTreeMap<UserId, usize> = BTreeMap::new();
        for membership in &self.memberships {
            if targets.contains(&membership.user_id) {
                *remaining.entry(membership.user_id).or_default() += 1;
            }
        }
        if let Some((user_id, count)) = remaining.into_iter().next() {
            return Err(CatalogError::MembershipsRemain {
                user_id: user_id.as_u32(),
                count,
            });
        }

        let mut removed = 0;
        for id in targets {
            if let Some(user) = self.users.remove(&id) {
                self.user_names.remove(&user.username);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Iterates over users in ID order.
    pub fn users(&self) -> impl Iterator<Item = &LocalUser> {
        self.users.values()
    }

    /// Iterates over groups in ID order.
    pub fn groups(&self) -> impl Iterator<Item = &LocalGroup> {
        self.groups.values()
    }

    /// Iterates over all memberships.
    pub fn memberships(&self) -> impl Iterator<Item = &Membership> {
        self.memberships.iter()
    }

    /// Returns the memberships of one user.
    #[must_use]
    pub fn memberships_of(&self, user_id: UserId) -> Vec<Membership> {
        self.memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .copied()
            .collect()
    }

    /// Computes table statistics.
    #[must_use]
    pub fn stats(&self) -> CatalogStats {
        let ldap_users = self
            .users
            .values()
            .filter(|u| u.auth_kind == AuthKind::Ldap)
            .count();
        CatalogStats {
            local_users: self.users.len() - ldap_users,
            ldap_users,
            groups: self.groups.len(),
            memberships: self.memberships.len(),
        }
    }
}

fn validate_name(kind: &str, name: &str) -> CatalogResult<()> {
    if name.trim().is_empty() {
        return Err(CatalogError::invalid_name(format!("{kind} name is blank")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Tables, LocalUser, LocalGroup) {
        let mut tables = Tables::new();
        let user = tables.create_user("bob", AuthKind::Ldap, None).unwrap();
        let group = tables.create_group("Editors").unwrap();
        tables
            .add_membership(user.id, group.id, Profile::Editor)
            .unwrap();
        (tables, user, group)
    }

    #[test]
    fn ids_are_sequential() {
        let mut tables = Tables::new();
        let a = tables.create_user("a", AuthKind::Local, None).unwrap();
        let b = tables.create_user("b", AuthKind::Ldap, None).unwrap();
        assert_eq!(a.id, UserId::new(1));
        assert_eq!(b.id, UserId::new(2));
    }

    #[test]
    fn names_are_unique() {
        let (mut tables, _, _) = seeded();
        assert!(matches!(
            tables.create_user("bob", AuthKind::Local, None),
            Err(CatalogError::UserNameTaken { .. })
        ));
        assert!(matches!(
            tables.create_group("Editors"),
            Err(CatalogError::GroupNameTaken { .. })
        ));
    }

    #[test]
    fn group_names_are_case_sensitive() {
        let (mut tables, _, _) = seeded();
        let lower = tables.create_group("editors").unwrap();
        assert_eq!(tables.find_group_by_name("editors"), Some(&lower));
        assert_ne!(tables.find_group_by_name("Editors"), Some(&lower));
    }

    #[test]
    fn blank_names_rejected() {
        let mut tables = Tables::new();
        assert!(matches!(
            tables.create_group("   "),
            Err(CatalogError::InvalidName { .. })
        ));
        assert!(matches!(
            tables.create_user("", AuthKind::Ldap, None),
            Err(CatalogError::InvalidName { .. })
        ));
    }

    #[test]
    fn delete_user_with_memberships_fails() {
        let (mut tables, user, _) = seeded();
        let err = tables.delete_users(&[user.id]).unwrap_err();
        assert!(matches!(err, CatalogError::MembershipsRemain { count: 1, .. }));
        assert!(tables.user(user.id).is_some());
    }

    #[test]
    fn delete_dependents_then_owners() {
        let (mut tables, user, group) = seeded();
        assert_eq!(tables.delete_memberships_for_users(&[user.id]), 1);
        assert_eq!(tables.delete_users(&[user.id]).unwrap(), 1);
        assert!(tables.find_user_by_name("bob").is_none());
        assert!(tables.group(group.id).is_some());
        assert_eq!(tables.memberships().count(), 0);
    }

    #[test]
    fn find_users_excluding_filters_kind_and_names() {
        let mut tables = Tables::new();
        tables.create_user("admin", AuthKind::Local, None).unwrap();
        tables.create_user("alice", AuthKind::Ldap, None).unwrap();
        tables.create_user("bob", AuthKind::Ldap, None).unwrap();

        let keep: HashSet<String> = ["alice".to_string()].into_iter().collect();
        let found = tables.find_users_by_auth_kind_excluding(AuthKind::Ldap, &keep);
        let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["bob"]);
    }

    #[test]
    fn membership_requires_rows() {
        let (mut tables, user, group) = seeded();
        assert!(matches!(
            tables.add_membership(UserId::new(99), group.id, Profile::Editor),
            Err(CatalogError::UserNotFound { id: 99 })
        ));
        assert!(matches!(
            tables.add_membership(user.id, GroupId::new(42), Profile::Editor),
            Err(CatalogError::GroupNotFound { id: 42 })
        ));
        // Same link twice is a no-op
        assert!(!tables
            .add_membership(user.id, group.id, Profile::Editor)
            .unwrap());
    }

    #[test]
    fn from_rows_rejects_dangling_membership() {
        let user = LocalUser {
            id: UserId::new(1),
            username: "bob".into(),
            auth_kind: AuthKind::Ldap,
            email: None,
        };
        let membership = Membership {
            user_id: UserId::new(1),
            group_id: GroupId::new(5),
            profile: Profile::Editor,
        };
        let result = Tables::from_rows(vec![user], vec![], vec![membership], 1, 5);
        assert!(matches!(result, Err(CatalogError::InvalidFormat { .. })));
    }

    #[test]
    fn stats_split_by_kind() {
        let (mut tables, _, _) = seeded();
        tables.create_user("admin", AuthKind::Local, None).unwrap();
        let stats = tables.stats();
        assert_eq!(stats.ldap_users, 1);
        assert_eq!(stats.local_users, 1);
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.memberships, 1);
    }
}
