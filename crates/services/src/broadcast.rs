// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide broadcast log (spec.md §4.8 "Broadcast"): an append-only
//! `__broadcasts` table other processes poll or tail, plus an optional
//! best-effort wakeup once the inserting transaction actually commits.
//!
//! `Transaction` only exposes a *post*-commit hook
//! ([`Transaction::schedule_post_commit`]), not a pre-commit one, so a
//! broadcast row is written immediately rather than buffered and flushed
//! in one batch at commit time — the row still only becomes visible to
//! other readers once the surrounding transaction actually commits, same
//! as any other write made through it.

use stratum_core::query::Comparison;
use stratum_core::value::Value;
use stratum_driver::Connection;
use stratum_repo::prelude::{RepoError, RepoResult, Transaction};
use stratum_sql::Builder;

use crate::support::run_statement;

/// Append `msg` to the broadcast log and arrange for `on_committed` to run
/// once the surrounding transaction's outermost frame actually commits
/// (e.g. to wake a backend-specific `LISTEN/NOTIFY` subscriber). Returns
/// the new row's id.
pub fn broadcast<C: Connection>(
    txn: &mut Transaction<C>,
    msg: &[u8],
    on_committed: impl FnOnce() + Send + 'static,
) -> RepoResult<i64> {
    let finalized = Builder::new()
        .insert_into("__broadcasts")
        .fields(&["date", "msg"])
        .values_tuple(&[Value::Int(crate::support::now_seconds()), Value::Bytes(msg.to_vec())])
        .returning(&["id"])
        .finalize();
    let rows = run_statement(txn, &finalized)?;
    let id = rows
        .first_int("id")
        .ok_or_else(|| RepoError::Bug("__broadcasts insert did not return id".into()))?;
    txn.schedule_post_commit(Box::new(on_committed));
    Ok(id)
}

/// Read every broadcast strictly after `since_id`, oldest first, handing
/// each `(id, msg)` pair to `on_each`. Returns the highest id observed (or
/// `since_id` unchanged if there was nothing new), for the caller to persist
/// as its new high-water mark.
pub fn process_broadcasts<C: Connection>(
    txn: &mut Transaction<C>,
    since_id: i64,
    mut on_each: impl FnMut(i64, Vec<u8>),
) -> RepoResult<i64> {
    let finalized = Builder::new()
        .select()
        .fields(&["id", "msg"])
        .from("__broadcasts")
        .where_with(|w| w.predicate("\"id\"", Comparison::GreaterThan, Some(Value::Int(since_id)), None))
        .order_by("id", true, None)
        .finalize();
    let rows = run_statement(txn, &finalized)?;
    let mut high_water = since_id;
    for row in rows.rows() {
        let id = rows
            .int(row, "id")
            .ok_or_else(|| RepoError::Bug("__broadcasts.id missing".into()))?;
        let msg = rows.blob(row, "msg").unwrap_or_default();
        on_each(id, msg);
        high_water = id;
    }
    Ok(high_water)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_broadcasts_query_orders_ascending_after_cursor() {
        let finalized = Builder::new()
            .select()
            .fields(&["id", "msg"])
            .from("__broadcasts")
            .where_with(|w| w.predicate("\"id\"", Comparison::GreaterThan, Some(Value::Int(5)), None))
            .order_by("id", true, None)
            .finalize();
        assert_eq!(
            finalized.sql(),
            "SELECT \"id\", \"msg\" FROM \"__broadcasts\" WHERE \"id\" > ?1 ORDER BY \"id\" ASC;"
        );
    }
}
