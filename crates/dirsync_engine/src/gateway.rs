//! Persistence and transaction boundaries consumed by the reconciliation
//! phases.

use crate::error::{SyncError, SyncResult};
use dirsync_catalog::{AuthKind, LocalGroup, LocalUser, UserId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// User and group storage as seen by the reconciliation phases.
pub trait PersistenceGateway: Send + Sync {
    /// Finds users of `kind` whose username is not in `excluded`.
    fn find_users_by_auth_kind_excluding(
        &self,
        kind: AuthKind,
        excluded: &HashSet<String>,
    ) -> SyncResult<Vec<LocalUser>>;

    /// Deletes every membership of the given users; returns the count.
    fn delete_memberships_for_users(&self, ids: &[UserId]) -> SyncResult<usize>;

    /// Deletes the given users; returns the count.
    fn delete_users(&self, ids: &[UserId]) -> SyncResult<usize>;

    /// Finds a group by exact name.
    fn find_group_by_name(&self, name: &str) -> SyncResult<Option<LocalGroup>>;

    /// Creates a group.
    fn create_group(&self, name: &str) -> SyncResult<LocalGroup>;
}

/// The unit-of-work boundary around a run.
pub trait TransactionBoundary: Send + Sync {
    /// Begins a transaction.
    fn begin(&self) -> SyncResult<()>;

    /// Commits the active transaction.
    fn commit(&self) -> SyncResult<()>;

    /// Rolls back the active transaction.
    fn rollback(&self) -> SyncResult<()>;
}

/// A store usable by the job driver.
pub trait SyncStore: PersistenceGateway + TransactionBoundary {}

impl<T: PersistenceGateway + TransactionBoundary + ?Sized> SyncStore for T {}

/// Kind of a gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    /// `find_users_by_auth_kind_excluding`
    FindUsers,
    /// `delete_memberships_for_users`
    DeleteMemberships,
    /// `delete_users`
    DeleteUsers,
    /// `find_group_by_name`
    FindGroup,
    /// `create_group`
    CreateGroup,
    /// `begin`
    Begin,
    /// `commit`
    Commit,
    /// `rollback`
    Rollback,
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// Users of a kind were looked up, excluding this many names.
    FindUsers {
        /// Auth kind searched.
        kind: AuthKind,
        /// Size of the exclusion set.
        excluded: usize,
    },
    /// Memberships of these users were deleted.
    DeleteMemberships(Vec<UserId>),
    /// These users were deleted.
    DeleteUsers(Vec<UserId>),
    /// A group was looked up.
    FindGroup(String),
    /// A group was created.
    CreateGroup(String),
    /// A transaction was begun.
    Begin,
    /// A commit was attempted.
    Commit,
    /// A rollback was attempted.
    Rollback,
}

impl GatewayCall {
    /// Returns the kind of the call.
    pub fn op(&self) -> GatewayOp {
        match self {
            GatewayCall::FindUsers { .. } => GatewayOp::FindUsers,
            GatewayCall::DeleteMemberships(_) => GatewayOp::DeleteMemberships,
            GatewayCall::DeleteUsers(_) => GatewayOp::DeleteUsers,
            GatewayCall::FindGroup(_) => GatewayOp::FindGroup,
            GatewayCall::CreateGroup(_) => GatewayOp::CreateGroup,
            GatewayCall::Begin => GatewayOp::Begin,
            GatewayCall::Commit => GatewayOp::Commit,
            GatewayCall::Rollback => GatewayOp::Rollback,
        }
    }
}

type FailureFn = Box<dyn Fn() -> SyncError + Send + Sync>;

/// A gateway wrapper that journals every call and can inject failures.
///
/// Calls are recorded before they are forwarded, so failed calls appear in
/// the journal too.
pub struct RecordingGateway<G> {
    inner: G,
    journal: Mutex<Vec<GatewayCall>>,
    failures: Mutex<HashMap<GatewayOp, FailureFn>>,
}

impl<G> RecordingGateway<G> {
    /// Wraps a gateway.
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            journal: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the wrapped gateway.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Makes every call of `op` fail with the error `make` builds.
    pub fn fail_on<F>(&self, op: GatewayOp, make: F)
    where
        F: Fn() -> SyncError + Send + Sync + 'static,
    {
        self.failures.lock().insert(op, Box::new(make));
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, op: GatewayOp) {
        self.failures.lock().remove(&op);
    }

    /// Returns the journal.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.journal.lock().clone()
    }

    /// Returns the kinds of the journaled calls, in order.
    pub fn ops(&self) -> Vec<GatewayOp> {
        self.journal.lock().iter().map(GatewayCall::op).collect()
    }

    /// Number of journaled calls of `op`.
    pub fn count(&self, op: GatewayOp) -> usize {
        self.journal.lock().iter().filter(|c| c.op() == op).count()
    }

    fn record(&self, call: GatewayCall) -> SyncResult<()> {
        let op = call.op();
        self.journal.lock().push(call);
        match self.failures.lock().get(&op) {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }
}

impl<G> fmt::Debug for RecordingGateway<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingGateway")
            .field("calls", &self.journal.lock().len())
            .field("failures", &self.failures.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<G: PersistenceGateway> PersistenceGateway for RecordingGateway<G> {
    fn find_users_by_auth_kind_excluding(
        &self,
        kind: AuthKind,
        excluded: &HashSet<String>,
    ) -> SyncResult<Vec<LocalUser>> {
        self.record(GatewayCall::FindUsers {
            kind,
            excluded: excluded.len(),
        })?;
        self.inner.find_users_by_auth_kind_excluding(kind, excluded)
    }

    fn delete_memberships_for_users(&self, ids: &[UserId]) -> SyncResult<usize> {
        self.record(GatewayCall::DeleteMemberships(ids.to_vec()))?;
        self.inner.delete_memberships_for_users(ids)
    }

    fn delete_users(&self, ids: &[UserId]) -> SyncResult<usize> {
        self.record(GatewayCall::DeleteUsers(ids.to_vec()))?;
        self.inner.delete_users(ids)
    }

    fn find_group_by_name(&self, name: &str) -> SyncResult<Option<LocalGroup>> {
        self.record(GatewayCall::FindGroup(name.to_string()))?;
        self.inner.find_group_by_name(name)
    }

    fn create_group(&self, name: &str) -> SyncResult<LocalGroup> {
        self.record(GatewayCall::CreateGroup(name.to_string()))?;
        self.inner.create_group(name)
    }
}

impl<G: TransactionBoundary> TransactionBoundary for RecordingGateway<G> {
    fn begin(&self) -> SyncResult<()> {
        self.record(GatewayCall::Begin)?;
        self.inner.begin()
    }

    fn commit(&self) -> SyncResult<()> {
        self.record(GatewayCall::Commit)?;
        self.inner.commit()
    }

    fn rollback(&self) -> SyncResult<()> {
        self.record(GatewayCall::Rollback)?;
        self.inner.rollback()
    }
}
