//! LDAP implementation of the directory abstraction.

use crate::config::{DirectoryConfig, SearchScope, SearchSpec};
use crate::directory::{DirectoryConnector, DirectoryRecord, DirectorySession, RecordStream};
use crate::error::{SyncError, SyncResult};
use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry};
use std::time::Duration;
use tracing::{debug, info};

/// LDAP result code for a rejected bind.
const INVALID_CREDENTIALS: u32 = 49;

/// Requests no attributes at all; the entry DN is always returned.
const NO_ATTRIBUTES: &str = "1.1";

/// A connection source for an LDAP directory.
#[derive(Debug, Clone)]
pub struct LdapDirectory {
    config: DirectoryConfig,
}

impl LdapDirectory {
    /// Creates a connection source.
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    /// Returns the connection settings.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }
}

impl DirectoryConnector for LdapDirectory {
    type Session = LdapSession;

    fn connect(&self) -> SyncResult<LdapSession> {
        let url = self.config.url.trim();
        debug!(url, starttls = self.config.starttls, "connecting to directory");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connect_timeout())
            .set_starttls(self.config.starttls);
        let mut conn = LdapConn::with_settings(settings, url)
            .map_err(|e| SyncError::directory(format!("cannot connect to {url}: {e}")))?;

        if let Some(bind_dn) = self.config.bind_dn.as_deref() {
            let password = self.config.resolve_password()?.unwrap_or_default();
            debug!(bind_dn, "binding to directory");

            let result = conn
                .simple_bind(bind_dn, &password)
                .map_err(|e| SyncError::directory(format!("bind failed for {bind_dn}: {e}")))?;
            if result.rc == INVALID_CREDENTIALS {
                return Err(SyncError::directory(format!(
                    "invalid credentials for {bind_dn}"
                )));
            }
            if result.rc != 0 {
                return Err(SyncError::directory(format!(
                    "bind failed with code {}: {}",
                    result.rc, result.text
                )));
            }
        }

        info!(url, "directory connection established");
        Ok(LdapSession {
            conn: Some(conn),
            search_timeout: self.config.search_timeout(),
        })
    }
}

/// A read-only LDAP connection.
pub struct LdapSession {
    conn: Option<LdapConn>,
    search_timeout: Duration,
}

impl LdapSession {
    fn scope(scope: SearchScope) -> Scope {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }

    fn into_record(entry: SearchEntry) -> DirectoryRecord {
        let mut record = DirectoryRecord::new(entry.dn);
        for (name, values) in entry.attrs {
            record = record.with_attribute(&name, values);
        }
        // Binary values are kept only when they are valid UTF-8
        for (name, values) in entry.bin_attrs {
            let text = values.into_iter().filter_map(|v| String::from_utf8(v).ok());
            record = record.with_attribute(&name, text);
        }
        record
    }
}

impl DirectorySession for LdapSession {
    fn search(&mut self, spec: &SearchSpec) -> SyncResult<RecordStream<'_>> {
        let timeout = self.search_timeout;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| SyncError::directory("directory session is closed"))?;

        let attribute = if spec.attribute.eq_ignore_ascii_case("dn") {
            NO_ATTRIBUTES
        } else {
            spec.attribute.as_str()
        };
        debug!(base = %spec.base, filter = %spec.filter, scope = ?spec.scope, "directory search");

        let result = conn
            .with_timeout(timeout)
            .search(&spec.base, Self::scope(spec.scope), &spec.filter, vec![attribute])
            .map_err(|e| SyncError::directory(format!("search of {:?} failed: {e}", spec.base)))?;
        let (entries, _) = result
            .success()
            .map_err(|e| SyncError::directory(format!("search of {:?} failed: {e}", spec.base)))?;

        debug!(base = %spec.base, entries = entries.len(), "directory search finished");
        Ok(Box::new(
            entries
                .into_iter()
                .map(|entry| Ok(Self::into_record(SearchEntry::construct(entry)))),
        ))
    }

    fn close(&mut self) -> SyncResult<()> {
        match self.conn.take() {
            Some(mut conn) => {
                conn.unbind()
                    .map_err(|e| SyncError::directory(format!("unbind failed: {e}")))?;
                debug!("directory connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for LdapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSession")
            .field("open", &self.conn.is_some())
            .field("search_timeout", &self.search_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn scope_mapping() {
        assert!(matches!(LdapSession::scope(SearchScope::Base), Scope::Base));
        assert!(matches!(
            LdapSession::scope(SearchScope::OneLevel),
            Scope::OneLevel
        ));
        assert!(matches!(
            LdapSession::scope(SearchScope::Subtree),
            Scope::Subtree
        ));
    }

    #[test]
    fn entry_conversion() {
        let mut attrs = HashMap::new();
        attrs.insert("uid".to_string(), vec!["alice".to_string()]);
        let mut bin_attrs = HashMap::new();
        bin_attrs.insert(
            "cn".to_string(),
            vec![b"Alice".to_vec(), vec![0xff, 0xfe]],
        );
        let entry = SearchEntry {
            dn: "uid=alice,ou=people".to_string(),
            attrs,
            bin_attrs,
        };

        let record = LdapSession::into_record(entry);
        assert_eq!(record.dn(), "uid=alice,ou=people");
        assert_eq!(record.first_value("UID"), Some("alice"));
        assert_eq!(record.values("cn"), &["Alice".to_string()]);
    }

    #[test]
    fn unreachable_server_is_directory_error() {
        let config = DirectoryConfig::new("ldap://127.0.0.1:1")
            .with_connect_timeout(Duration::from_secs(1));
        let err = LdapDirectory::new(config).connect().unwrap_err();
        assert!(matches!(err, SyncError::DirectoryProtocol { .. }));
        assert!(err.is_recoverable());
    }
}
