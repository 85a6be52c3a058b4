//! Sync job driver.
//!
//! A run validates its configuration, opens one directory session, begins
//! one transaction, runs the user phase and the optional group phase, then
//! commits what survived and closes the session. Every failure is caught,
//! logged and recorded in the returned [`RunReport`].

use crate::config::SyncJobConfig;
use crate::directory::{DirectoryConnector, SessionGuard};
use crate::error::{SyncError, SyncResult};
use crate::gateway::SyncStore;
use crate::reconcile::{group_phase, user_phase, GroupPhaseReport, UserPhaseReport};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// The current state of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// No run has started.
    Idle,
    /// A directory session is open.
    DirectoryConnected,
    /// The user phase is running.
    UserPhaseRunning,
    /// The group phase is running.
    GroupPhaseRunning,
    /// Committing and releasing the directory session.
    Closing,
    /// The last run finished.
    Done,
}

impl JobState {
    /// Returns true while a run holds the directory session.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::DirectoryConnected
                | JobState::UserPhaseRunning
                | JobState::GroupPhaseRunning
                | JobState::Closing
        )
    }
}

/// How one phase ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseOutcome<R> {
    /// The phase ran to completion.
    Completed(R),
    /// The phase did not run.
    Skipped {
        /// Why it did not run.
        reason: String,
    },
    /// The phase failed and its transaction was rolled back.
    Failed {
        /// Error kind.
        kind: String,
        /// Error message.
        error: String,
        /// Whether later phases could still run.
        recoverable: bool,
    },
}

impl<R> PhaseOutcome<R> {
    fn skipped(reason: impl Into<String>) -> Self {
        PhaseOutcome::Skipped {
            reason: reason.into(),
        }
    }

    fn failed(error: &SyncError) -> Self {
        PhaseOutcome::Failed {
            kind: error.kind().to_string(),
            error: error.to_string(),
            recoverable: error.is_recoverable(),
        }
    }

    /// Returns the phase report if the phase completed.
    pub fn completed(&self) -> Option<&R> {
        match self {
            PhaseOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    /// Returns true if the phase failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseOutcome::Failed { .. })
    }

    fn is_fatal(&self) -> bool {
        matches!(
            self,
            PhaseOutcome::Failed {
                recoverable: false,
                ..
            }
        )
    }

    fn error(&self) -> Option<&str> {
        match self {
            PhaseOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl<R> fmt::Display for PhaseOutcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseOutcome::Completed(_) => write!(f, "completed"),
            PhaseOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            PhaseOutcome::Failed { error, .. } => write!(f, "failed ({error})"),
        }
    }
}

/// What happened to the run's transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionOutcome {
    /// No transaction was begun.
    NotStarted,
    /// The final transaction committed.
    Committed,
    /// Every transaction of the run was rolled back.
    RolledBack,
    /// The final commit failed; its changes are lost.
    CommitFailed {
        /// Error message.
        error: String,
    },
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionOutcome::NotStarted => write!(f, "not started"),
            TransactionOutcome::Committed => write!(f, "committed"),
            TransactionOutcome::RolledBack => write!(f, "rolled back"),
            TransactionOutcome::CommitFailed { error } => write!(f, "commit failed ({error})"),
        }
    }
}

/// The outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique ID of the run, also attached to its log lines.
    pub run_id: Uuid,
    /// Error that stopped the run before any phase ran.
    pub setup_error: Option<String>,
    /// User phase outcome.
    pub users: PhaseOutcome<UserPhaseReport>,
    /// Group phase outcome.
    pub groups: PhaseOutcome<GroupPhaseReport>,
    /// Outcome of the transaction.
    pub transaction: TransactionOutcome,
    /// Number of rollbacks performed.
    pub rollbacks: usize,
    /// Rollback and session-close failures.
    pub cleanup_errors: Vec<String>,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            setup_error: None,
            users: PhaseOutcome::skipped("not reached"),
            groups: PhaseOutcome::skipped("not reached"),
            transaction: TransactionOutcome::NotStarted,
            rollbacks: 0,
            cleanup_errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Returns true if both phases did what they were asked and the work
    /// was committed.
    pub fn is_success(&self) -> bool {
        self.setup_error.is_none()
            && !self.users.is_failed()
            && !self.groups.is_failed()
            && self.transaction == TransactionOutcome::Committed
    }

    /// Returns true if the run was refused because another run was active.
    pub fn is_skipped(&self) -> bool {
        self.setup_error.is_none()
            && self.transaction == TransactionOutcome::NotStarted
            && matches!(self.users, PhaseOutcome::Skipped { .. })
            && matches!(self.groups, PhaseOutcome::Skipped { .. })
    }

    /// Returns the first error of the run.
    pub fn first_error(&self) -> Option<String> {
        if let Some(e) = &self.setup_error {
            return Some(e.clone());
        }
        if let Some(e) = self.users.error().or_else(|| self.groups.error()) {
            return Some(e.to_string());
        }
        match &self.transaction {
            TransactionOutcome::CommitFailed { error } => Some(error.clone()),
            _ => None,
        }
    }

    /// Returns the names of users removed by a committed run.
    pub fn removed_users(&self) -> &[String] {
        match (&self.transaction, self.users.completed()) {
            (TransactionOutcome::Committed, Some(report)) => &report.removed,
            _ => &[],
        }
    }

    /// Returns the names of groups created by a committed run.
    pub fn created_groups(&self) -> &[String] {
        match (&self.transaction, self.groups.completed()) {
            (TransactionOutcome::Committed, Some(report)) => &report.created,
            _ => &[],
        }
    }
}

/// Cumulative statistics of a job.
#[derive(Debug, Clone, Default)]
pub struct JobStats {
    /// Runs that committed without a phase failure.
    pub runs_completed: u64,
    /// Runs with a setup error, a failed phase or a failed commit.
    pub runs_failed: u64,
    /// Runs refused because another run was active.
    pub runs_skipped: u64,
    /// Users removed by committed runs.
    pub users_removed: u64,
    /// Groups created by committed runs.
    pub groups_created: u64,
    /// First error of the last failed run; cleared by a successful run.
    pub last_error: Option<String>,
    /// When the last run finished.
    pub last_run_time: Option<Instant>,
}

/// Runs synchronizations between a directory and a catalog.
///
/// # Example
///
/// ```rust
/// use dirsync_catalog::CatalogStore;
/// use dirsync_engine::{
///     CatalogGateway, DirectoryConfig, DirectoryRecord, MockDirectory, SearchSpec,
///     SyncJob, SyncJobConfig,
/// };
/// use std::sync::Arc;
///
/// let directory = MockDirectory::new();
/// directory.set_records(
///     "ou=people",
///     vec![DirectoryRecord::new("uid=alice,ou=people").with_attribute("uid", ["alice"])],
/// );
///
/// let store = Arc::new(CatalogStore::open_in_memory().unwrap());
/// let job = SyncJob::new(directory, CatalogGateway::new(store));
/// let config = SyncJobConfig::new(
///     DirectoryConfig::new("ldap://localhost"),
///     SearchSpec::new("ou=people", "(objectClass=person)", "uid"),
/// );
///
/// let report = job.run(&config);
/// assert!(report.is_success());
/// ```
pub struct SyncJob<C: DirectoryConnector, G: SyncStore> {
    connector: C,
    gateway: G,
    state: RwLock<JobState>,
    stats: RwLock<JobStats>,
    run_lock: Mutex<()>,
}

impl<C: DirectoryConnector, G: SyncStore> SyncJob<C, G> {
    /// Creates a job.
    pub fn new(connector: C, gateway: G) -> Self {
        Self {
            connector,
            gateway,
            state: RwLock::new(JobState::Idle),
            stats: RwLock::new(JobStats::default()),
            run_lock: Mutex::new(()),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> JobState {
        *self.state.read()
    }

    /// Returns cumulative statistics.
    pub fn stats(&self) -> JobStats {
        self.stats.read().clone()
    }

    /// Returns the directory connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns the persistence gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn set_state(&self, state: JobState) {
        *self.state.write() = state;
    }

    /// Performs one run. Never fails; the outcome is in the report.
    ///
    /// A run started while another run of this job is active is refused
    /// and reported as skipped.
    pub fn run(&self, config: &SyncJobConfig) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new(Uuid::new_v4());
        let span = info_span!("sync_run", run_id = %report.run_id);
        let _enter = span.enter();

        let Some(_running) = self.run_lock.try_lock() else {
            warn!("another sync run is active, skipping");
            report.users = PhaseOutcome::skipped("another run is active");
            report.groups = PhaseOutcome::skipped("another run is active");
            self.stats.write().runs_skipped += 1;
            return report;
        };

        info!("sync run started");
        self.execute(config, &mut report);
        report.duration = started.elapsed();
        self.set_state(JobState::Done);
        self.record(&report);
        report
    }

    fn execute(&self, config: &SyncJobConfig, report: &mut RunReport) {
        let ctx = match config.validate() {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(kind = e.kind(), error = %e, "invalid sync configuration");
                report.setup_error = Some(e.to_string());
                return;
            }
        };

        let session = match self.connector.connect() {
            Ok(session) => session,
            Err(e) => {
                error!(kind = e.kind(), error = %e, "cannot connect to directory");
                report.setup_error = Some(e.to_string());
                return;
            }
        };
        let mut guard = SessionGuard::new(session);
        self.set_state(JobState::DirectoryConnected);

        if let Err(e) = self.gateway.begin() {
            error!(kind = e.kind(), error = %e, "cannot begin transaction");
            report.setup_error = Some(e.to_string());
            self.set_state(JobState::Closing);
            self.close(guard, report);
            return;
        }
        let mut in_transaction = true;

        self.set_state(JobState::UserPhaseRunning);
        report.users = match guard
            .session()
            .and_then(|session| user_phase(&ctx, session, &self.gateway))
        {
            Ok(phase) => PhaseOutcome::Completed(phase),
            Err(e) => self.phase_failed("users", &e, &mut in_transaction, report),
        };

        report.groups = match ctx.groups() {
            None => PhaseOutcome::skipped("group sync disabled"),
            Some(_) if report.users.is_fatal() => {
                PhaseOutcome::skipped("run aborted by user phase failure")
            }
            Some(group_ctx) => {
                let began = if in_transaction {
                    Ok(())
                } else {
                    info!("beginning fresh transaction for group phase");
                    self.gateway.begin()
                };
                match began {
                    Ok(()) => {
                        in_transaction = true;
                        self.set_state(JobState::GroupPhaseRunning);
                        match guard
                            .session()
                            .and_then(|session| group_phase(group_ctx, session, &self.gateway))
                        {
                            Ok(phase) => PhaseOutcome::Completed(phase),
                            Err(e) => {
                                self.phase_failed("groups", &e, &mut in_transaction, report)
                            }
                        }
                    }
                    Err(e) => {
                        error!(phase = "groups", kind = e.kind(), error = %e, "cannot begin transaction");
                        PhaseOutcome::failed(&e)
                    }
                }
            }
        };

        self.set_state(JobState::Closing);
        report.transaction = if in_transaction {
            match self.gateway.commit() {
                Ok(()) => TransactionOutcome::Committed,
                Err(e) => {
                    error!(kind = e.kind(), error = %e, "commit failed");
                    TransactionOutcome::CommitFailed {
                        error: e.to_string(),
                    }
                }
            }
        } else {
            TransactionOutcome::RolledBack
        };
        self.close(guard, report);
    }

    /// Logs a phase failure and rolls back the active transaction.
    fn phase_failed<R>(
        &self,
        phase: &str,
        e: &SyncError,
        in_transaction: &mut bool,
        report: &mut RunReport,
    ) -> PhaseOutcome<R> {
        error!(
            phase,
            kind = e.kind(),
            recoverable = e.is_recoverable(),
            error = %e,
            "sync phase failed, rolling back"
        );
        if *in_transaction {
            *in_transaction = false;
            match self.gateway.rollback() {
                Ok(()) => report.rollbacks += 1,
                Err(re) => {
                    error!(phase, error = %re, "rollback failed");
                    report.cleanup_errors.push(re.to_string());
                }
            }
        }
        PhaseOutcome::failed(e)
    }

    fn close(&self, guard: SessionGuard<C::Session>, report: &mut RunReport) {
        let closed: SyncResult<()> = guard.close();
        if let Err(e) = closed {
            warn!(error = %e, "failed to close directory session");
            report.cleanup_errors.push(e.to_string());
        }
    }

    fn record(&self, report: &RunReport) {
        let mut stats = self.stats.write();
        stats.last_run_time = Some(Instant::now());
        stats.users_removed += report.removed_users().len() as u64;
        stats.groups_created += report.created_groups().len() as u64;

        if report.is_success() {
            stats.runs_completed += 1;
            stats.last_error = None;
            info!(
                removed_users = report.removed_users().len(),
                created_groups = report.created_groups().len(),
                duration_ms = report.duration.as_millis() as u64,
                "sync run finished"
            );
        } else {
            stats.runs_failed += 1;
            stats.last_error = report.first_error();
            warn!(
                users = %report.users,
                groups = %report.groups,
                transaction = %report.transaction,
                duration_ms = report.duration.as_millis() as u64,
                "sync run finished with errors"
            );
        }
    }
}

impl<C: DirectoryConnector, G: SyncStore> fmt::Debug for SyncJob<C, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncJob")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_gateway::CatalogGateway;
    use crate::config::{DirectoryConfig, SearchSpec};
    use crate::directory::{DirectoryRecord, MockDirectory};
    use crate::gateway::{GatewayOp, RecordingGateway};
    use dirsync_catalog::{AuthKind, CatalogError, CatalogStore, Profile};
    use std::io;
    use std::sync::Arc;

    const PEOPLE: &str = "ou=people,dc=example,dc=org";
    const GROUPS: &str = "ou=groups,dc=example,dc=org";

    type TestJob = SyncJob<MockDirectory, RecordingGateway<CatalogGateway>>;

    fn person(uid: &str) -> DirectoryRecord {
        DirectoryRecord::new(format!("uid={uid},{PEOPLE}")).with_attribute("uid", [uid])
    }

    fn group(cn: &str) -> DirectoryRecord {
        DirectoryRecord::new(format!("cn={cn},{GROUPS}")).with_attribute("cn", [cn])
    }

    fn users_only() -> SyncJobConfig {
        SyncJobConfig::new(
            DirectoryConfig::new("ldap://ldap.example.org"),
            SearchSpec::new(PEOPLE, "(objectClass=person)", "uid"),
        )
    }

    fn with_groups() -> SyncJobConfig {
        users_only().with_group_sync(SearchSpec::new(GROUPS, "(objectClass=groupOfNames)", "cn"))
    }

    fn setup(ldap_users: &[&str]) -> (TestJob, MockDirectory, Arc<CatalogStore>) {
        let store = Arc::new(CatalogStore::open_in_memory().unwrap());
        store
            .transaction(|t| {
                let everyone = t.create_group("Everyone")?;
                for name in ldap_users {
                    let user = t.create_user(name, AuthKind::Ldap, None)?;
                    t.add_membership(user.id, everyone.id, Profile::RegisteredUser)?;
                }
                t.create_user("admin", AuthKind::Local, None)?;
                Ok(())
            })
            .unwrap();

        let directory = MockDirectory::new();
        let gateway = RecordingGateway::new(CatalogGateway::new(Arc::clone(&store)));
        (SyncJob::new(directory.clone(), gateway), directory, store)
    }

    fn ldap_usernames(store: &CatalogStore) -> Vec<String> {
        store.read_committed(|t| {
            t.users()
                .filter(|u| u.is_directory_sourced())
                .map(|u| u.username.clone())
                .collect()
        })
    }

    #[test]
    fn successful_users_only_run() {
        let (job, directory, store) = setup(&["alice", "bob", "carol"]);
        directory.set_records(PEOPLE, vec![person("alice"), person("carol")]);

        let report = job.run(&users_only());
        assert!(report.is_success(), "{report:?}");
        assert_eq!(report.removed_users(), &["bob".to_string()]);
        assert!(matches!(report.groups, PhaseOutcome::Skipped { .. }));
        assert_eq!(ldap_usernames(&store), vec!["alice", "carol"]);
        assert_eq!(store.stats().memberships, 2);

        assert_eq!(job.state(), JobState::Done);
        assert_eq!(job.stats().runs_completed, 1);
        assert_eq!(job.stats().users_removed, 1);
        assert_eq!(directory.closes(), 1);
    }

    #[test]
    fn search_failure_rolls_back_and_returns_normally() {
        let (job, directory, store) = setup(&["alice", "bob"]);
        directory.set_search_failure(PEOPLE, "server unavailable");

        let report = job.run(&users_only());
        assert!(!report.is_success());
        assert!(report.users.is_failed());
        assert_eq!(report.transaction, TransactionOutcome::RolledBack);
        assert_eq!(report.rollbacks, 1);
        assert_eq!(ldap_usernames(&store), vec!["alice", "bob"]);
        assert_eq!(job.gateway().count(GatewayOp::Commit), 0);
        assert_eq!(directory.closes(), 1);

        let stats = job.stats();
        assert_eq!(stats.runs_failed, 1);
        assert!(stats.last_error.unwrap().contains("server unavailable"));
    }

    #[test]
    fn group_phase_runs_in_fresh_transaction_after_user_failure() {
        let (job, directory, store) = setup(&["alice"]);
        directory.set_failure_after(PEOPLE, vec![person("alice")], "connection reset");
        directory.set_records(GROUPS, vec![group("Editors")]);

        let report = job.run(&with_groups());
        assert!(report.users.is_failed());
        assert_eq!(
            report.groups.completed().unwrap().created,
            vec!["Editors".to_string()]
        );
        assert_eq!(report.transaction, TransactionOutcome::Committed);
        assert_eq!(report.rollbacks, 1);
        assert_eq!(
            job.gateway().ops().iter().filter(|op| **op == GatewayOp::Begin).count(),
            2
        );
        assert!(store.read_committed(|t| t.find_group_by_name("Editors").is_some()));
        assert_eq!(ldap_usernames(&store), vec!["alice"]);
    }

    #[test]
    fn group_failure_rolls_back_user_work() {
        let (job, directory, store) = setup(&["alice", "bob"]);
        directory.set_records(PEOPLE, vec![person("alice")]);
        directory.set_search_failure(GROUPS, "size limit exceeded");

        let report = job.run(&with_groups());
        assert!(report.users.completed().is_some());
        assert!(report.groups.is_failed());
        assert_eq!(report.transaction, TransactionOutcome::RolledBack);
        assert!(report.removed_users().is_empty());
        assert_eq!(ldap_usernames(&store), vec!["alice", "bob"]);
        assert_eq!(job.gateway().count(GatewayOp::Commit), 0);
    }

    #[test]
    fn blank_group_name_does_not_roll_back_run() {
        let (job, directory, store) = setup(&["alice", "bob"]);
        directory.set_records(PEOPLE, vec![person("alice")]);
        directory.set_records(GROUPS, vec![group("Editors"), group(" ")]);
        let config = users_only()
            .with_group_sync(SearchSpec::new(GROUPS, "(objectClass=groupOfNames)", "dn"))
            .with_group_name_pattern("cn=([^,]*),.*");

        let report = job.run(&config);
        assert!(report.is_success(), "{report:?}");
        assert_eq!(report.transaction, TransactionOutcome::Committed);
        assert_eq!(report.removed_users(), &["bob".to_string()]);
        assert_eq!(report.created_groups(), &["Editors".to_string()]);
        assert_eq!(report.groups.completed().unwrap().skipped.len(), 1);
        assert_eq!(ldap_usernames(&store), vec!["alice"]);
        assert!(store.read_committed(|t| t.find_group_by_name("Editors").is_some()));
    }

    #[test]
    fn no_commit_after_rollback() {
        let (job, directory, _store) = setup(&["alice"]);
        directory.set_search_failure(PEOPLE, "timeout");

        job.run(&users_only());
        let ops = job.gateway().ops();
        assert_eq!(ops.first(), Some(&GatewayOp::Begin));
        assert_eq!(ops.last(), Some(&GatewayOp::Rollback));
    }

    #[test]
    fn configuration_error_touches_nothing() {
        let (job, directory, _store) = setup(&["alice"]);
        let mut config = users_only();
        config.users.attribute = String::new();

        let report = job.run(&config);
        assert!(report.setup_error.unwrap().contains("attribute"));
        assert_eq!(directory.connects(), 0);
        assert!(job.gateway().calls().is_empty());
    }

    #[test]
    fn connect_failure_is_reported() {
        let (job, directory, _store) = setup(&["alice"]);
        directory.set_connect_failure(Some("connection refused"));

        let report = job.run(&users_only());
        assert!(report.setup_error.unwrap().contains("connection refused"));
        assert_eq!(report.transaction, TransactionOutcome::NotStarted);
        assert!(job.gateway().calls().is_empty());
    }

    #[test]
    fn begin_failure_closes_session() {
        let (job, directory, _store) = setup(&["alice"]);
        job.gateway().fail_on(GatewayOp::Begin, || {
            CatalogError::TransactionInProgress {
                txid: "txn:9".into(),
            }
            .into()
        });

        let report = job.run(&users_only());
        assert!(report.setup_error.is_some());
        assert_eq!(directory.searched_bases().len(), 0);
        assert_eq!(directory.closes(), 1);
    }

    #[test]
    fn commit_failure_is_recorded() {
        let (job, directory, store) = setup(&["alice", "bob"]);
        directory.set_records(PEOPLE, vec![person("alice")]);
        job.gateway().fail_on(GatewayOp::Commit, || {
            CatalogError::Io(io::Error::other("disk full")).into()
        });

        let report = job.run(&users_only());
        assert!(matches!(
            report.transaction,
            TransactionOutcome::CommitFailed { .. }
        ));
        assert!(!report.is_success());
        assert!(report.removed_users().is_empty());
        assert_eq!(job.stats().users_removed, 0);
        assert_eq!(directory.closes(), 1);
        // The injected failure left the catalog transaction open
        store.rollback().unwrap();
        assert_eq!(ldap_usernames(&store), vec!["alice", "bob"]);
    }

    #[test]
    fn fatal_user_failure_skips_group_phase() {
        let (job, directory, _store) = setup(&["alice"]);
        directory.set_records(PEOPLE, vec![]);
        directory.set_records(GROUPS, vec![group("Editors")]);
        job.gateway().fail_on(GatewayOp::FindUsers, || {
            CatalogError::Io(io::Error::other("read error")).into()
        });

        let report = job.run(&with_groups());
        assert!(matches!(
            report.users,
            PhaseOutcome::Failed {
                recoverable: false,
                ..
            }
        ));
        assert!(matches!(report.groups, PhaseOutcome::Skipped { .. }));
        assert_eq!(directory.searched_bases(), vec![PEOPLE.to_string()]);
    }

    #[test]
    fn close_failure_does_not_change_outcome() {
        let (job, directory, _store) = setup(&["alice"]);
        directory.set_records(PEOPLE, vec![person("alice")]);
        directory.set_close_failure(true);

        let report = job.run(&users_only());
        assert_eq!(report.transaction, TransactionOutcome::Committed);
        assert_eq!(report.cleanup_errors.len(), 1);
        assert!(report.is_success());
    }

    #[test]
    fn repeated_runs_are_idempotent() {
        let (job, directory, store) = setup(&["alice", "bob"]);
        directory.set_records(PEOPLE, vec![person("alice")]);
        directory.set_records(GROUPS, vec![group("Editors"), group("Viewers")]);

        let first = job.run(&with_groups());
        assert_eq!(first.removed_users().len(), 1);
        assert_eq!(first.created_groups().len(), 2);

        let second = job.run(&with_groups());
        assert!(second.removed_users().is_empty());
        assert!(second.created_groups().is_empty());
        assert_eq!(store.stats().groups, 3);
        assert_eq!(job.stats().runs_completed, 2);
    }

    #[test]
    fn report_serializes_to_json() {
        let (job, directory, _store) = setup(&["alice"]);
        directory.set_records(PEOPLE, vec![person("alice")]);

        let report = job.run(&users_only());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["users"]["status"], "completed");
        assert_eq!(json["groups"]["status"], "skipped");
        assert_eq!(json["transaction"]["status"], "committed");
    }
}
