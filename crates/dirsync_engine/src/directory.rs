//! Directory search abstraction.

use crate::config::SearchSpec;
use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// One entry returned by a directory search.
///
/// Attribute names are case-insensitive, as in the directory itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    dn: String,
    attributes: HashMap<String, Vec<String>>,
}

impl DirectoryRecord {
    /// Creates a record with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Adds values to an attribute.
    pub fn with_attribute<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .entry(name.to_ascii_lowercase())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Returns the distinguished name.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Returns all values of an attribute.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the first value of an attribute.
    ///
    /// The pseudo-attribute `dn` yields the record's distinguished name when
    /// the entry carries no real `dn` attribute.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        match self.values(name).first() {
            Some(value) => Some(value.as_str()),
            None if name.eq_ignore_ascii_case("dn") && !self.dn.is_empty() => Some(&self.dn),
            None => None,
        }
    }
}

/// A lazy, single-pass sequence of search results.
pub type RecordStream<'a> = Box<dyn Iterator<Item = SyncResult<DirectoryRecord>> + 'a>;

/// A read-only connection to the directory.
pub trait DirectorySession {
    /// Runs a search and returns its records.
    fn search(&mut self, spec: &SearchSpec) -> SyncResult<RecordStream<'_>>;

    /// Releases the connection. Closing twice is a no-op.
    fn close(&mut self) -> SyncResult<()>;
}

/// A source of read-only directory connections.
pub trait DirectoryConnector {
    /// Session type handed out by this connector.
    type Session: DirectorySession;

    /// Opens a read-only session.
    fn connect(&self) -> SyncResult<Self::Session>;
}

/// Owns a session and closes it when dropped.
///
/// Call [`SessionGuard::close`] to observe the close result; otherwise the
/// guard closes on drop and logs a failure.
pub struct SessionGuard<S: DirectorySession> {
    session: Option<S>,
}

impl<S: DirectorySession> SessionGuard<S> {
    /// Wraps an open session.
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Returns the session, or an error once it has been closed.
    pub fn session(&mut self) -> SyncResult<&mut S> {
        self.session
            .as_mut()
            .ok_or_else(|| SyncError::directory("directory session already closed"))
    }

    /// Closes the session now.
    pub fn close(mut self) -> SyncResult<()> {
        match self.session.take() {
            Some(mut session) => session.close(),
            None => Ok(()),
        }
    }
}

impl<S: DirectorySession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close() {
                warn!(error = %e, "failed to close directory session");
            }
        }
    }
}

/// Scripted answer of the mock directory for one search base.
#[derive(Debug, Clone)]
enum MockAnswer {
    Records(Vec<DirectoryRecord>),
    Fail(String),
    FailAfter(Vec<DirectoryRecord>, String),
}

#[derive(Debug, Default)]
struct MockState {
    answers: Mutex<HashMap<String, MockAnswer>>,
    fail_connect: Mutex<Option<String>>,
    fail_close: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    searches: Mutex<Vec<String>>,
}

/// A scripted directory for testing.
///
/// Answers are keyed by search base; filters are not evaluated. Clones
/// share their script and counters.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    state: Arc<MockState>,
}

impl MockDirectory {
    /// Creates a mock with no answers. Searching an unscripted base fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the records returned for a base.
    pub fn set_records(&self, base: &str, records: Vec<DirectoryRecord>) {
        self.state
            .answers
            .lock()
            .insert(base.to_string(), MockAnswer::Records(records));
    }

    /// Makes searches of a base fail immediately.
    pub fn set_search_failure(&self, base: &str, message: &str) {
        self.state
            .answers
            .lock()
            .insert(base.to_string(), MockAnswer::Fail(message.to_string()));
    }

    /// Makes searches of a base yield some records and then fail.
    pub fn set_failure_after(&self, base: &str, records: Vec<DirectoryRecord>, message: &str) {
        self.state.answers.lock().insert(
            base.to_string(),
            MockAnswer::FailAfter(records, message.to_string()),
        );
    }

    /// Makes `connect` fail.
    pub fn set_connect_failure(&self, message: Option<&str>) {
        *self.state.fail_connect.lock() = message.map(str::to_string);
    }

    /// Makes `close` fail (the session still counts as closed).
    pub fn set_close_failure(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Number of sessions opened.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of sessions closed.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Bases searched so far, in order.
    pub fn searched_bases(&self) -> Vec<String> {
        self.state.searches.lock().clone()
    }
}

impl DirectoryConnector for MockDirectory {
    type Session = MockSession;

    fn connect(&self) -> SyncResult<MockSession> {
        if let Some(message) = self.state.fail_connect.lock().clone() {
            return Err(SyncError::directory(message));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            state: Arc::clone(&self.state),
            open: true,
        })
    }
}

/// Session of a [`MockDirectory`].
#[derive(Debug)]
pub struct MockSession {
    state: Arc<MockState>,
    open: bool,
}

impl DirectorySession for MockSession {
    fn search(&mut self, spec: &SearchSpec) -> SyncResult<RecordStream<'_>> {
        if !self.open {
            return Err(SyncError::directory("not connected"));
        }
        self.state.searches.lock().push(spec.base.clone());

        let answer = self.state.answers.lock().get(&spec.base).cloned();
        match answer {
            Some(MockAnswer::Records(records)) => Ok(Box::new(records.into_iter().map(Ok))),
            Some(MockAnswer::Fail(message)) => Err(SyncError::directory(message)),
            Some(MockAnswer::FailAfter(records, message)) => Ok(Box::new(
                records
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(SyncError::directory(message)))),
            )),
            None => Err(SyncError::directory(format!(
                "no such object: {}",
                spec.base
            ))),
        }
    }

    fn close(&mut self) -> SyncResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(SyncError::directory("unbind failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(base: &str) -> SearchSpec {
        SearchSpec::new(base, "(objectClass=*)", "uid")
    }

    #[test]
    fn attribute_names_are_case_insensitive() {
        let record = DirectoryRecord::new("uid=alice,ou=people").with_attribute("UID", ["alice"]);
        assert_eq!(record.first_value("uid"), Some("alice"));
        assert_eq!(record.first_value("Uid"), Some("alice"));
        assert_eq!(record.values("mail"), &[] as &[String]);
    }

    #[test]
    fn first_value_of_multi_valued_attribute() {
        let record = DirectoryRecord::new("cn=x").with_attribute("cn", ["first", "second"]);
        assert_eq!(record.first_value("cn"), Some("first"));
        assert_eq!(record.values("cn").len(), 2);
    }

    #[test]
    fn dn_pseudo_attribute() {
        let record = DirectoryRecord::new("cn=Editors,ou=groups");
        assert_eq!(record.first_value("dn"), Some("cn=Editors,ou=groups"));
        assert_eq!(record.first_value("cn"), None);
    }

    #[test]
    fn mock_scripted_search() {
        let mock = MockDirectory::new();
        mock.set_records(
            "ou=people",
            vec![DirectoryRecord::new("uid=a").with_attribute("uid", ["a"])],
        );

        let mut session = mock.connect().unwrap();
        let records: Vec<_> = session.search(&spec("ou=people")).unwrap().collect();
        assert_eq!(records.len(), 1);
        assert!(session.search(&spec("ou=unknown")).is_err());
        assert_eq!(mock.searched_bases(), vec!["ou=people", "ou=unknown"]);
    }

    #[test]
    fn mock_failure_mid_stream() {
        let mock = MockDirectory::new();
        mock.set_failure_after(
            "ou=people",
            vec![DirectoryRecord::new("uid=a").with_attribute("uid", ["a"])],
            "connection reset",
        );

        let mut session = mock.connect().unwrap();
        let results: Vec<_> = session.search(&spec("ou=people")).unwrap().collect();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SyncError::DirectoryProtocol { .. })));
    }

    #[test]
    fn guard_closes_on_drop() {
        let mock = MockDirectory::new();
        {
            let _guard = SessionGuard::new(mock.connect().unwrap());
        }
        assert_eq!(mock.connects(), 1);
        assert_eq!(mock.closes(), 1);
    }

    #[test]
    fn guard_close_reports_failure_once() {
        let mock = MockDirectory::new();
        mock.set_close_failure(true);
        let guard = SessionGuard::new(mock.connect().unwrap());
        assert!(guard.close().is_err());
        assert_eq!(mock.closes(), 1);
    }

    #[test]
    fn connect_failure() {
        let mock = MockDirectory::new();
        mock.set_connect_failure(Some("connection refused"));
        assert!(mock.connect().is_err());
        assert_eq!(mock.connects(), 0);
    }
}
