//! Configuration for synchronization runs.

use crate::error::{SyncError, SyncResult};
use crate::pattern::GroupNamePattern;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 120_000;

/// Depth of a directory search below its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Only the base entry itself.
    Base,
    /// Immediate children of the base.
    #[default]
    OneLevel,
    /// The base and everything below it.
    Subtree,
}

/// One directory search: where, what, and which attribute identifies a
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    /// Search base DN.
    pub base: String,
    /// Search filter.
    pub filter: String,
    /// Attribute holding the identifier (user name or group name).
    pub attribute: String,
    /// Search scope.
    #[serde(default)]
    pub scope: SearchScope,
}

impl SearchSpec {
    /// Creates a one-level search spec.
    pub fn new(
        base: impl Into<String>,
        filter: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into(),
            filter: filter.into(),
            attribute: attribute.into(),
            scope: SearchScope::default(),
        }
    }

    /// Sets the search scope.
    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    fn validate(&self, what: &str) -> SyncResult<()> {
        if self.filter.trim().is_empty() {
            return Err(SyncError::configuration(format!("{what} search filter is empty")));
        }
        if self.attribute.trim().is_empty() {
            return Err(SyncError::configuration(format!(
                "{what} search attribute is empty"
            )));
        }
        Ok(())
    }
}

/// Connection source for the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory URL (`ldap://host:389` or `ldaps://host:636`).
    pub url: String,
    /// Service account DN; anonymous bind when absent.
    #[serde(default)]
    pub bind_dn: Option<String>,
    /// Service account password.
    #[serde(default)]
    pub bind_password: Option<String>,
    /// Environment variable holding the password, used when
    /// `bind_password` is absent.
    #[serde(default)]
    pub bind_password_env: Option<String>,
    /// Upgrade the connection with StartTLS.
    #[serde(default)]
    pub starttls: bool,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Deadline for each search, in milliseconds.
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_search_timeout_ms() -> u64 {
    DEFAULT_SEARCH_TIMEOUT_MS
}

fn duration_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

impl DirectoryConfig {
    /// Creates a configuration for an anonymous connection.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bind_dn: None,
            bind_password: None,
            bind_password_env: None,
            starttls: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            search_timeout_ms: DEFAULT_SEARCH_TIMEOUT_MS,
        }
    }

    /// Sets the service account.
    pub fn with_bind(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self.bind_password = Some(password.into());
        self
    }

    /// Enables StartTLS.
    pub fn with_starttls(mut self) -> Self {
        self.starttls = true;
        self
    }

    /// Sets the connect timeout, at millisecond resolution.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the search deadline, at millisecond resolution.
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout_ms = duration_ms(timeout);
        self
    }

    /// Returns the connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the search deadline.
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    /// Returns the bind password, reading the configured environment
    /// variable if no literal password is set.
    pub fn resolve_password(&self) -> SyncResult<Option<String>> {
        if let Some(password) = &self.bind_password {
            return Ok(Some(password.clone()));
        }
        match &self.bind_password_env {
            Some(var) => std::env::var(var).map(Some).map_err(|_| {
                SyncError::configuration(format!("bind password variable {var} is not set"))
            }),
            None => Ok(None),
        }
    }

    /// Checks the connection source.
    pub fn validate(&self) -> SyncResult<()> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(SyncError::configuration("directory url is empty"));
        }
        if !(url.starts_with("ldap://") || url.starts_with("ldaps://") || url.starts_with("ldapi://"))
        {
            return Err(SyncError::configuration(format!(
                "unsupported directory url scheme: {url}"
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(SyncError::configuration("connect timeout must be positive"));
        }
        if self.search_timeout_ms == 0 {
            return Err(SyncError::configuration("search timeout must be positive"));
        }
        Ok(())
    }
}

/// The trigger input for one synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobConfig {
    /// Directory connection source.
    pub directory: DirectoryConfig,
    /// User search.
    pub users: SearchSpec,
    /// Create catalog groups for directory groups the catalog lacks.
    #[serde(default)]
    pub create_missing_groups: bool,
    /// Group search, required when `create_missing_groups` is set.
    #[serde(default)]
    pub groups: Option<SearchSpec>,
    /// Optional group-name extraction pattern. Empty means none.
    #[serde(default)]
    pub group_name_pattern: Option<String>,
}

impl SyncJobConfig {
    /// Creates a configuration that syncs users only.
    pub fn new(directory: DirectoryConfig, users: SearchSpec) -> Self {
        Self {
            directory,
            users,
            create_missing_groups: false,
            groups: None,
            group_name_pattern: None,
        }
    }

    /// Enables the group phase.
    pub fn with_group_sync(mut self, groups: SearchSpec) -> Self {
        self.create_missing_groups = true;
        self.groups = Some(groups);
        self
    }

    /// Sets the group-name extraction pattern.
    pub fn with_group_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.group_name_pattern = Some(pattern.into());
        self
    }

    /// Parses a JSON configuration.
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::configuration(format!("invalid job configuration: {e}")))
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: &Path) -> SyncResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SyncError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Validates the configuration into an immutable run context.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a search is incomplete, the group phase is
    /// enabled without a group search, or the pattern does not compile or
    /// lacks a capture group.
    pub fn validate(&self) -> SyncResult<RunContext> {
        self.directory.validate()?;
        self.users.validate("user")?;

        let groups = if self.create_missing_groups {
            let search = self.groups.clone().ok_or_else(|| {
                SyncError::configuration("group sync is enabled but no group search is configured")
            })?;
            search.validate("group")?;
            let pattern = GroupNamePattern::parse_optional(self.group_name_pattern.as_deref())?;
            Some(GroupPhaseContext { search, pattern })
        } else {
            None
        };

        Ok(RunContext {
            users: self.users.clone(),
            groups,
        })
    }
}

/// Group phase settings of a validated run.
#[derive(Debug, Clone)]
pub struct GroupPhaseContext {
    /// Group search.
    pub search: SearchSpec,
    /// Compiled extraction pattern.
    pub pattern: Option<GroupNamePattern>,
}

/// Immutable settings of one validated run, handed to every phase.
#[derive(Debug, Clone)]
pub struct RunContext {
    users: SearchSpec,
    groups: Option<GroupPhaseContext>,
}

impl RunContext {
    /// Returns the user search.
    pub fn users(&self) -> &SearchSpec {
        &self.users
    }

    /// Returns the group phase settings, if the phase is enabled.
    pub fn groups(&self) -> Option<&GroupPhaseContext> {
        self.groups.as_ref()
    }
}
