// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sessions KV store (spec.md §4.8 "Sessions"): opaque binary keys mapped
//! to opaque binary payloads with a per-entry TTL, backed by `__sessions`.

use stratum_core::query::Comparison;
use stratum_core::value::Value;
use stratum_driver::Connection;
use stratum_repo::prelude::{RepoError, RepoResult, Transaction};
use stratum_sql::Builder;

use crate::support::{now_seconds, run_statement};

/// Insert or refresh a session entry. `maxage` is a duration in seconds
/// from `mtime`, not an absolute deadline, so re-`set`ting a key with the
/// same `maxage` keeps sliding its expiry forward.
pub fn set<C: Connection>(txn: &mut Transaction<C>, key: &[u8], data: &[u8], maxage: i64) -> RepoResult<()> {
    let finalized = Builder::new()
        .insert_into("__sessions")
        .fields(&["name", "mtime", "maxage", "data"])
        .values_tuple(&[
            Value::Bytes(key.to_vec()),
            Value::Int(now_seconds()),
            Value::Int(maxage),
            Value::Bytes(data.to_vec()),
        ])
        .on_conflict_do_update(&["name"], &["mtime", "maxage", "data"], None)
        .finalize();
    run_statement(txn, &finalized)?;
    Ok(())
}

/// Fetch a session's payload, or `None` if absent or past `mtime + maxage`.
/// Expired-but-not-yet-swept rows are treated as a miss rather than
/// surfaced, so callers never need to distinguish "gone" from "expired".
pub fn get<C: Connection>(txn: &mut Transaction<C>, key: &[u8]) -> RepoResult<Option<Vec<u8>>> {
    let now = now_seconds();
    let finalized = Builder::new()
        .select()
        .fields(&["data"])
        .from("__sessions")
        .where_with(|w| {
            w.predicate("\"name\"", Comparison::Equal, Some(Value::Bytes(key.to_vec())), None)
                .raw(&format!("(\"mtime\" + \"maxage\") >= {now}"))
        })
        .finalize();
    let rows = run_statement(txn, &finalized)?;
    Ok(rows.first_blob("data"))
}

/// Delete one session key outright, regardless of expiry.
pub fn remove<C: Connection>(txn: &mut Transaction<C>, key: &[u8]) -> RepoResult<()> {
    let finalized = Builder::new()
        .delete_from("__sessions")
        .where_with(|w| w.predicate("\"name\"", Comparison::Equal, Some(Value::Bytes(key.to_vec())), None))
        .finalize();
    run_statement(txn, &finalized)?;
    Ok(())
}

/// Delete every session entry past its expiry. Returns the number of rows
/// removed, for callers that log or report sweep activity.
pub fn sweep_expired<C: Connection>(txn: &mut Transaction<C>) -> RepoResult<u64> {
    let now = now_seconds();
    let finalized = Builder::new()
        .delete_from("__sessions")
        .where_with(|w| w.raw(&format!("(\"mtime\" + \"maxage\") < {now}")))
        .returning(&["name"])
        .finalize();
    let rows = run_statement(txn, &finalized)?;
    Ok(rows.len() as u64)
}

/// Drain `__removed`, a queue of object ids whose physical file payload
/// (spec.md §3.8 `File`/`Image` fields) must be unlinked off the owning
/// row's storage before the audit record can be dropped. Physical file
/// mechanics are out of scope here (spec.md Non-goals); `on_remove` is
/// handed each queued object id and is expected to do that part, returning
/// `Ok(())` once it is safe to forget the id.
pub fn sweep_removed_files<C: Connection>(
    txn: &mut Transaction<C>,
    mut on_remove: impl FnMut(i64) -> RepoResult<()>,
) -> RepoResult<u64> {
    let finalized = Builder::new().select().fields(&["object"]).from("__removed").finalize();
    let rows = run_statement(txn, &finalized)?;
    let mut swept = 0u64;
    for row in rows.rows() {
        let Some(object) = rows.int(row, "object") else {
            return Err(RepoError::Bug("__removed.object missing".into()));
        };
        on_remove(object)?;
        let delete = Builder::new()
            .delete_from("__removed")
            .where_with(|w| w.predicate("\"object\"", Comparison::Equal, Some(Value::Int(object)), None))
            .finalize();
        run_statement(txn, &delete)?;
        swept += 1;
    }
    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_an_upsert_on_name() {
        let finalized = Builder::new()
            .insert_into("__sessions")
            .fields(&["name", "mtime", "maxage", "data"])
            .values_tuple(&[Value::Bytes(b"k".to_vec()), Value::Int(1), Value::Int(60), Value::Bytes(b"v".to_vec())])
            .on_conflict_do_update(&["name"], &["mtime", "maxage", "data"], None)
            .finalize();
        assert!(finalized.sql().contains("ON CONFLICT (\"name\") DO UPDATE SET"));
        assert!(finalized.sql().contains("\"mtime\" = EXCLUDED.\"mtime\""));
    }

    #[test]
    fn expiry_predicate_excludes_expired_rows() {
        let finalized = Builder::new()
            .select()
            .fields(&["data"])
            .from("__sessions")
            .where_with(|w| {
                w.predicate("\"name\"", Comparison::Equal, Some(Value::Bytes(b"k".to_vec())), None)
                    .raw("(\"mtime\" + \"maxage\") >= 100")
            })
            .finalize();
        assert!(finalized.sql().contains(">= 100"));
    }
}
