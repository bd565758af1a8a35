// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use stratum_driver::{ConnectParams, DriverError, DriverResult, Info};

use crate::statement::SqliteStatement;

/// A pooled SQLite connection plus its LRU-bounded prepared-statement cache
/// (spec.md §4.1 "Prepared statements are cached per connection; cache
/// eviction is LRU with a small bound").
#[derive(Debug)]
pub struct SqliteConnection {
    pub(crate) raw: rusqlite::Connection,
}

/// Cache capacity applied on top of rusqlite's own internal statement
/// cache, matching the size the translator expects to keep warm for a
/// typical request (a handful of distinct statements per transaction).
pub const STATEMENT_CACHE_CAPACITY: usize = 32;

pub(crate) fn open(params: &ConnectParams) -> DriverResult<SqliteConnection> {
    let dbname = params.dbname().unwrap_or(":memory:");
    let raw = if dbname == ":memory:" {
        rusqlite::Connection::open_in_memory()
    } else {
        rusqlite::Connection::open(dbname)
    }
    .map_err(|err| DriverError::Unavailable(err.to_string()))?;

    raw.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);

    if let Some(journal) = params.get("journal") {
        raw.pragma_update(None, "journal_mode", journal)
            .map_err(|err| DriverError::Unavailable(err.to_string()))?;
    }

    Ok(SqliteConnection { raw })
}

impl stratum_driver::Connection for SqliteConnection {
    type Statement<'a> = SqliteStatement<'a>;

    fn prepare(&mut self, sql: &str) -> DriverResult<Self::Statement<'_>> {
        let inner = self
            .raw
            .prepare_cached(sql)
            .map_err(|err| DriverError::Query(err.to_string()))?;
        Ok(SqliteStatement::new(inner))
    }

    fn execute_batch(&mut self, sql: &str) -> DriverResult<()> {
        self.raw
            .execute_batch(sql)
            .map_err(|err| DriverError::Query(err.to_string()))
    }

    fn affected(&self) -> u64 {
        self.raw.changes()
    }

    fn last_insert_id(&self) -> Option<i64> {
        Some(self.raw.last_insert_rowid())
    }

    fn diagnostics(&self, err: &DriverError) -> Info {
        Info {
            code: 0,
            status_name: "sqlite_error".into(),
            description: err.to_string(),
            failed_query: None,
        }
    }

    fn supports_notifications(&self) -> bool {
        false
    }
}
