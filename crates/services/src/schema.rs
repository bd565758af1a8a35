// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bootstrap DDL for the system tables this crate owns (spec.md §3.5):
//! `__sessions`, `__broadcasts`, `__login`, `__removed`. These are plain
//! infrastructure tables, not `Scheme`-backed entities, so they fall
//! outside `stratum-migration`'s schema-projection pass (spec.md §4.7
//! projects only registered schemes) — this crate is the one place that
//! knows their shape and is responsible for creating them once, up front,
//! the same way `stratum-migration::migrate` creates scheme tables.

use stratum_driver::{BackendKind, Connection};
use stratum_repo::prelude::{RepoError, RepoResult};

fn statements(backend: BackendKind) -> [&'static str; 6] {
    match backend {
        BackendKind::Sqlite => [
            "CREATE TABLE IF NOT EXISTS \"__sessions\" (\"name\" BLOB PRIMARY KEY, \"mtime\" BIGINT NOT NULL, \"maxage\" BIGINT NOT NULL, \"data\" BLOB NOT NULL);",
            "CREATE TABLE IF NOT EXISTS \"__broadcasts\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"date\" BIGINT NOT NULL, \"msg\" BLOB NOT NULL);",
            "CREATE TABLE IF NOT EXISTS \"__login\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"user\" BIGINT, \"name\" TEXT NOT NULL, \"password_snapshot\" BLOB, \"date\" BIGINT NOT NULL, \"success\" BOOLEAN NOT NULL, \"addr\" TEXT, \"host\" TEXT, \"path\" TEXT);",
            "CREATE INDEX IF NOT EXISTS \"__login_name_date_idx\" ON \"__login\" (\"name\", \"date\");",
            "CREATE TABLE IF NOT EXISTS \"__removed\" (\"object\" BIGINT NOT NULL);",
            "",
        ],
        BackendKind::Pgsql => [
            "CREATE TABLE IF NOT EXISTS \"__sessions\" (\"name\" BYTEA PRIMARY KEY, \"mtime\" BIGINT NOT NULL, \"maxage\" BIGINT NOT NULL, \"data\" BYTEA NOT NULL);",
            "CREATE TABLE IF NOT EXISTS \"__broadcasts\" (\"id\" BIGSERIAL PRIMARY KEY, \"date\" BIGINT NOT NULL, \"msg\" BYTEA NOT NULL);",
            "CREATE TABLE IF NOT EXISTS \"__login\" (\"id\" BIGSERIAL PRIMARY KEY, \"user\" BIGINT, \"name\" TEXT NOT NULL, \"password_snapshot\" BYTEA, \"date\" BIGINT NOT NULL, \"success\" BOOLEAN NOT NULL, \"addr\" TEXT, \"host\" TEXT, \"path\" TEXT);",
            "CREATE INDEX IF NOT EXISTS \"__login_name_date_idx\" ON \"__login\" (\"name\", \"date\");",
            "CREATE TABLE IF NOT EXISTS \"__removed\" (\"object\" BIGINT NOT NULL);",
            "",
        ],
    }
}

/// Create the system tables this crate depends on if they don't already
/// exist. Idempotent, like [`stratum_migration::migrate`]; safe to call on
/// every process start.
///
/// # Errors
/// Propagates the first failing statement as [`RepoError::BackendUnavailable`].
pub fn bootstrap<C: Connection>(backend: BackendKind, conn: &mut C) -> RepoResult<()> {
    for ddl in statements(backend) {
        if ddl.is_empty() {
            continue;
        }
        log::debug!(target: "stratum::services", "{ddl}");
        conn.execute_batch(ddl)
            .map_err(|err| RepoError::BackendUnavailable(err.to_string()))?;
    }
    Ok(())
}
