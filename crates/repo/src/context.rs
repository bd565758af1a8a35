// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process/task-local registry (C10, spec.md §4.10): the current
//! transaction for a given connection type, the current user id, and
//! request metadata, each reachable without threading a context object
//! through every call site.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::thread::LocalKey;

use smol_str::SmolStr;
use stratum_core::schema::role::AccessRole;
use stratum_driver::{BackendKind, Connection};

use crate::error::RepoResult;
use crate::transaction::{IsolationLevel, PostCommitTask, Transaction};

/// Request-scoped metadata kept alongside the current user id. Set once
/// per inbound request by the caller (a web handler, a CLI command) and
/// read by hooks and audit trails further down the call stack.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub user_id: Option<i64>,
    pub remote_addr: Option<SmolStr>,
    pub request_id: Option<SmolStr>,
}

thread_local! {
    static REQUEST: RefCell<RequestMeta> = RefCell::new(RequestMeta::default());
}

/// Replace the current thread's request metadata, returning the previous
/// value.
pub fn set_request_meta(meta: RequestMeta) -> RequestMeta {
    REQUEST.with(|cell| std::mem::replace(&mut cell.borrow_mut(), meta))
}

#[must_use]
pub fn request_meta() -> RequestMeta {
    REQUEST.with(|cell| cell.borrow().clone())
}

struct Slot<C: Connection> {
    transaction: Transaction<C>,
    retain: u32,
}

/// The thread-local slot for connection type `C`. Generic only over `C`,
/// so each backend connection type is monomorphized into exactly one
/// static; `ProcessContext::<SqliteConnection>` and
/// `ProcessContext::<PgConnection>` never share storage.
fn slot_cell<C: Connection + 'static>() -> &'static LocalKey<RefCell<Option<Slot<C>>>> {
    thread_local! {
        static SLOT: RefCell<Option<Slot<C>>> = const { RefCell::new(None) };
    }
    &SLOT
}

/// Per-thread, per-backend registry of the in-flight [`Transaction`]
/// (spec.md §4.10).
pub struct ProcessContext<C: Connection + 'static> {
    _marker: PhantomData<C>,
}

impl<C: Connection + 'static> ProcessContext<C> {
    fn with_slot<R>(f: impl FnOnce(&mut Option<Slot<C>>) -> R) -> R {
        slot_cell::<C>().with(|cell| f(&mut cell.borrow_mut()))
    }

    /// Acquire (creating if absent) the current thread's transaction for
    /// this connection type. The outermost call opens the connection via
    /// `open` and issues the driver-level `BEGIN`; nested calls bump the
    /// retain counter and push a reentrant frame onto the same instance
    /// (spec.md §3.3).
    pub fn acquire_transaction(
        open: impl FnOnce() -> RepoResult<C>,
        backend: BackendKind,
        role: AccessRole,
        isolation: IsolationLevel,
    ) -> RepoResult<()> {
        Self::with_slot(|slot| {
            if let Some(existing) = slot {
                existing.retain += 1;
                existing.transaction.begin(role, isolation)?;
                Ok(())
            } else {
                let connection = open()?;
                let mut transaction = Transaction::new(connection, backend);
                transaction.begin(role, isolation)?;
                *slot = Some(Slot { transaction, retain: 1 });
                Ok(())
            }
        })
    }

    /// Run `f` against the current thread's transaction, if one is open.
    pub fn with_transaction<R>(f: impl FnOnce(&mut Transaction<C>) -> R) -> Option<R> {
        Self::with_slot(|slot| slot.as_mut().map(|s| f(&mut s.transaction)))
    }

    /// Release one retain on the current transaction. At retain zero this
    /// commits (or rolls back, if any nested frame asked for it) and drops
    /// the slot so the next `acquire_transaction` opens a fresh one.
    pub fn release_transaction() -> Option<RepoResult<()>> {
        Self::with_slot(|slot| {
            let inner = slot.as_mut()?;
            let outcome = inner.transaction.commit();
            inner.retain -= 1;
            if inner.retain == 0 {
                *slot = None;
            }
            Some(outcome)
        })
    }

    /// Queue a post-commit task on the current transaction
    /// (`schedule_async_task`, spec.md §4.10). `setup` stands in for the
    /// spec's "fresh allocation context" and simply builds the deferred
    /// closure; no-op if no transaction is open.
    pub fn schedule_async_task(setup: impl FnOnce() -> PostCommitTask) {
        Self::with_transaction(|txn| txn.schedule_post_commit(setup()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_driver::{ColumnValue, DriverError, DriverResult, Info, StepOutcome};

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
    struct FakeConnection;

    impl Connection for FakeConnection {
        type Statement<'a> = FakeStatement;

        fn prepare(&mut self, _sql: &str) -> DriverResult<Self::Statement<'_>> {
            Ok(FakeStatement)
        }

        fn execute_batch(&mut self, _sql: &str) -> DriverResult<()> {
            Ok(())
        }

        fn affected(&self) -> u64 {
            0
        }

        fn last_insert_id(&self) -> Option<i64> {
            None
        }

        fn diagnostics(&self, err: &DriverError) -> Info {
            Info {
                code: 0,
                status_name: "fake".into(),
                description: err.to_string(),
                failed_query: None,
            }
        }
    }

    #[test]
    fn nested_acquire_shares_one_instance_and_releases_once() {
        type Ctx = ProcessContext<FakeConnection>;

        Ctx::acquire_transaction(
            || Ok(FakeConnection),
            BackendKind::Sqlite,
            AccessRole::Authorized,
            IsolationLevel::Deferred,
        )
        .unwrap();
        Ctx::acquire_transaction(
            || Ok(FakeConnection),
            BackendKind::Sqlite,
            AccessRole::Authorized,
            IsolationLevel::Deferred,
        )
        .unwrap();

        let depth = Ctx::with_transaction(Transaction::depth).unwrap();
        assert_eq!(depth, 2);

        assert!(Ctx::release_transaction().unwrap().is_ok());
        assert_eq!(Ctx::with_transaction(Transaction::depth).unwrap(), 1);

        assert!(Ctx::release_transaction().unwrap().is_ok());
        assert!(Ctx::with_transaction(Transaction::depth).is_none());
    }

    #[test]
    fn request_meta_round_trips_per_thread() {
        let previous = set_request_meta(RequestMeta {
            user_id: Some(7),
            remote_addr: Some("127.0.0.1".into()),
            request_id: None,
        });
        assert!(previous.user_id.is_none());
        assert_eq!(request_meta().user_id, Some(7));
        set_request_meta(RequestMeta::default());
    }
}
