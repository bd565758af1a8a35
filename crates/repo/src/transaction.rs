// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The reentrant transaction stack (spec.md §3.3). A [`Transaction`] owns a
//! single physical [`Connection`] plus a stack of [`Frame`]s; `begin()`
//! pushes a frame and only emits a driver-level `BEGIN` for the outermost
//! one, so a nested call site never has to know whether it is the one
//! actually opening the transaction.

use stratum_core::schema::role::AccessRole;
use stratum_core::value::Dict;
use stratum_driver::{BackendKind, Connection, DriverError};

use crate::error::{RepoError, RepoResult};

/// Isolation / locking strictness requested by the outermost `begin`
/// (spec.md §3.3). SQLite maps each variant onto its native `BEGIN`
/// keyword; PostgreSQL has no equivalent locking-mode distinction, so
/// `Immediate`/`Exclusive` both collapse onto a plain `BEGIN` there (see
/// DESIGN.md).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl IsolationLevel {
    #[must_use]
    pub const fn begin_sql(self, backend: BackendKind) -> &'static str {
        match (backend, self) {
            (BackendKind::Sqlite, Self::Deferred) => "BEGIN DEFERRED",
            (BackendKind::Sqlite, Self::Immediate) => "BEGIN IMMEDIATE",
            (BackendKind::Sqlite, Self::Exclusive) => "BEGIN EXCLUSIVE",
            (BackendKind::Pgsql, _) => "BEGIN",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum FrameStatus {
    #[default]
    None,
    Commit,
    Rollback,
}

/// Work deferred until after the outermost transaction commits
/// (`schedule_async_task`, spec.md §4.10). There is no task runtime in this
/// crate, so a post-commit task is just a boxed closure the process-context
/// registry drains synchronously once `commit()` returns `Ok`.
pub type PostCommitTask = Box<dyn FnOnce() + Send>;

struct Frame {
    role: AccessRole,
    status: FrameStatus,
    scratch: Dict,
    pending: Vec<PostCommitTask>,
}

impl Frame {
    fn new(role: AccessRole) -> Self {
        Self {
            role,
            status: FrameStatus::None,
            scratch: Dict::new(),
            pending: Vec::new(),
        }
    }
}

/// A reentrant unit of work over one [`Connection`]. Frames stack: starting
/// a transaction while one is already open is a no-op against the database
/// and only pushes bookkeeping (spec.md §3.3).
pub struct Transaction<C: Connection> {
    connection: C,
    backend: BackendKind,
    frames: Vec<Frame>,
    /// Set once a statement fails inside this transaction; every further
    /// operation short-circuits to [`RepoError::TransactionAborted`] until
    /// the outermost frame rolls back (spec.md §4.1 "sticky rollback").
    aborted: bool,
}

impl<C: Connection> std::fmt::Debug for Transaction<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("backend", &self.backend)
            .field("depth", &self.frames.len())
            .field("aborted", &self.aborted)
            .finish()
    }
}

impl<C: Connection> Transaction<C> {
    pub fn new(connection: C, backend: BackendKind) -> Self {
        Self {
            connection,
            backend,
            frames: Vec::new(),
            aborted: false,
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// The effective role for the current frame, defaulting to
    /// [`AccessRole::Default`] outside of any transaction (spec.md §4.5
    /// `max(current_transaction_role, requested_role)` is computed by the
    /// worker from this value).
    #[must_use]
    pub fn role(&self) -> AccessRole {
        self.frames.last().map_or(AccessRole::Default, |f| f.role)
    }

    pub fn scratch(&self) -> Option<&Dict> {
        self.frames.last().map(|f| &f.scratch)
    }

    pub fn scratch_mut(&mut self) -> Option<&mut Dict> {
        self.frames.last_mut().map(|f| &mut f.scratch)
    }

    /// Queue `task` to run once the outermost frame commits successfully.
    /// Nested `commit()`s merely hand their pending tasks up to the parent
    /// frame.
    pub fn schedule_post_commit(&mut self, task: PostCommitTask) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pending.push(task);
        }
    }

    /// Mark the innermost frame (and by propagation, the whole stack) for
    /// rollback without unwinding immediately; `commit()` on the outermost
    /// frame will roll back instead.
    pub fn mark_rollback(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.status = FrameStatus::Rollback;
        }
    }

    fn ensure_not_aborted(&self) -> RepoResult<()> {
        if self.aborted {
            Err(RepoError::TransactionAborted)
        } else {
            Ok(())
        }
    }

    /// Record that `err` came back from a statement executed against this
    /// transaction's connection, sticking it into rollback state if the
    /// error (or the driver's own sticky-rollback signal) demands it.
    pub fn note_driver_error(&mut self, err: &DriverError) {
        self.aborted = true;
        self.mark_rollback();
        let _ = err;
    }

    /// Push a new frame. Only the outermost `begin` touches the database.
    pub fn begin(&mut self, role: AccessRole, isolation: IsolationLevel) -> RepoResult<()> {
        self.ensure_not_aborted()?;
        if self.frames.is_empty() {
            log::debug!(target: "stratum::worker", "{}", isolation.begin_sql(self.backend));
            self.connection
                .execute_batch(isolation.begin_sql(self.backend))
                .map_err(|err| {
                    self.aborted = true;
                    RepoError::from(err)
                })?;
        }
        self.frames.push(Frame::new(role));
        Ok(())
    }

    /// Pop the current frame. On the outermost frame this issues a real
    /// `COMMIT` (or `ROLLBACK`, if any nested frame asked for one) and
    /// drains post-commit tasks; nested frames just fold their status and
    /// pending tasks into the parent.
    pub fn commit(&mut self) -> RepoResult<()> {
        let frame = self.frames.pop().ok_or_else(|| RepoError::Bug("commit() with no open frame".to_owned()))?;
        if let Some(parent) = self.frames.last_mut() {
            if frame.status == FrameStatus::Rollback {
                parent.status = FrameStatus::Rollback;
            }
            parent.pending.extend(frame.pending);
            return Ok(());
        }
        if self.aborted || frame.status == FrameStatus::Rollback {
            log::warn!(target: "stratum::worker", "rolling back transaction");
            let result = self.connection.execute_batch("ROLLBACK");
            self.aborted = false;
            result.map_err(RepoError::from)?;
            return Err(RepoError::TransactionAborted);
        }
        log::debug!(target: "stratum::worker", "COMMIT");
        self.connection.execute_batch("COMMIT").map_err(|err| {
            self.aborted = true;
            RepoError::from(err)
        })?;
        for task in frame.pending {
            task();
        }
        Ok(())
    }

    /// Unconditionally roll back the current frame, propagating the
    /// rollback request to every enclosing frame.
    pub fn rollback(&mut self) -> RepoResult<()> {
        let frame = self.frames.pop().ok_or_else(|| RepoError::Bug("rollback() with no open frame".to_owned()))?;
        drop(frame);
        if let Some(parent) = self.frames.last_mut() {
            parent.status = FrameStatus::Rollback;
            return Ok(());
        }
        self.aborted = false;
        self.connection.execute_batch("ROLLBACK").map_err(RepoError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_driver::{ColumnValue, DriverResult, StepOutcome};

    struct FakeStatement;

    impl stratum_driver::Statement for FakeStatement {
        fn bind(&mut self, _index: u32, _value: &stratum_driver::ParamValue) -> DriverResult<()> {
            Ok(())
        }
        fn step(&mut self) -> DriverResult<StepOutcome> {
            Ok(StepOutcome::Done)
        }
        fn column(&self, _index: usize) -> DriverResult<ColumnValue> {
            Ok(ColumnValue::Null)
        }
        fn column_name(&self, _index: usize) -> Option<&str> {
            None
        }
        fn column_count(&self) -> usize {
            0
        }
        fn reset(&mut self) -> DriverResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeConnection {
        log: Vec<String>,
    }

    impl Connection for FakeConnection {
        type Statement<'a> = FakeStatement;

        fn prepare(&mut self, _sql: &str) -> DriverResult<Self::Statement<'_>> {
            Ok(FakeStatement)
        }

        fn execute_batch(&mut self, sql: &str) -> DriverResult<()> {
            self.log.push(sql.to_owned());
            Ok(())
        }

        fn affected(&self) -> u64 {
            0
        }

        fn last_insert_id(&self) -> Option<i64> {
            None
        }

        fn diagnostics(&self, err: &DriverError) -> stratum_driver::Info {
            stratum_driver::Info {
                code: 0,
                status_name: "fake".into(),
                description: err.to_string(),
                failed_query: None,
            }
        }
    }

    #[test]
    fn nested_begin_only_opens_once() {
        let mut txn = Transaction::new(FakeConnection::default(), BackendKind::Sqlite);
        txn.begin(AccessRole::Authorized, IsolationLevel::Deferred).unwrap();
        txn.begin(AccessRole::Admin, IsolationLevel::Deferred).unwrap();
        assert_eq!(txn.depth(), 2);
        assert_eq!(txn.role(), AccessRole::Admin);
        txn.commit().unwrap();
        assert_eq!(txn.depth(), 1);
        assert_eq!(txn.connection().log, vec!["BEGIN DEFERRED".to_owned()]);
        txn.commit().unwrap();
        assert_eq!(txn.connection().log, vec!["BEGIN DEFERRED".to_owned(), "COMMIT".to_owned()]);
    }

    #[test]
    fn nested_rollback_propagates_to_outermost_commit() {
        let mut txn = Transaction::new(FakeConnection::default(), BackendKind::Sqlite);
        txn.begin(AccessRole::Default, IsolationLevel::Immediate).unwrap();
        txn.begin(AccessRole::Default, IsolationLevel::Immediate).unwrap();
        txn.mark_rollback();
        txn.commit().unwrap();
        let err = txn.commit().unwrap_err();
        assert!(matches!(err, RepoError::TransactionAborted));
        assert_eq!(
            txn.connection().log,
            vec!["BEGIN IMMEDIATE".to_owned(), "ROLLBACK".to_owned()]
        );
    }

    #[test]
    fn post_commit_tasks_run_only_after_outermost_commit() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let counter = Arc::new(AtomicU32::new(0));
        let mut txn = Transaction::new(FakeConnection::default(), BackendKind::Sqlite);
        txn.begin(AccessRole::Default, IsolationLevel::Deferred).unwrap();
        txn.begin(AccessRole::Default, IsolationLevel::Deferred).unwrap();
        let c = Arc::clone(&counter);
        txn.schedule_post_commit(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        txn.commit().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        txn.commit().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
