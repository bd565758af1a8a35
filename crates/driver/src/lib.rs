// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod error;
pub mod param;
pub mod row;

pub use backend::{BackendKind, ConnectParams};
pub use error::{DriverError, DriverResult, Info};
pub use param::{ParamKind, ParamValue};
pub use row::{ColumnValue, Row, StepOutcome};

/// A prepared statement handle. Opaque to callers above [`Statement`]; the
/// only operations defined on it are [`Statement::bind`],
/// [`Statement::step`], [`Statement::reset`] and drop-as-finalize.
pub trait Statement {
    /// Bind a value to the 1-based parameter index (spec.md §4.1 `bind`).
    fn bind(&mut self, index: u32, value: &ParamValue) -> DriverResult<()>;

    /// Advance the cursor by one row.
    fn step(&mut self) -> DriverResult<StepOutcome>;

    /// Read column `i` (0-based) of the current row.
    fn column(&self, index: usize) -> DriverResult<ColumnValue>;

    /// Column name as exposed by the prepared statement's result shape.
    fn column_name(&self, index: usize) -> Option<&str>;

    fn column_count(&self) -> usize;

    /// Reset the statement so it can be stepped again from the start,
    /// re-using the prepared plan (spec.md §4.1 `reset`).
    fn reset(&mut self) -> DriverResult<()>;
}

/// A single logical database connection (spec.md §4.1 `Connection`).
pub trait Connection {
    type Statement<'a>: Statement
    where
        Self: 'a;

    /// Prepare `sql`, consulting and updating the connection's LRU
    /// statement cache.
    fn prepare(&mut self, sql: &str) -> DriverResult<Self::Statement<'_>>;

    /// Execute `sql` directly without returning rows (DDL, `PRAGMA`, …).
    fn execute_batch(&mut self, sql: &str) -> DriverResult<()>;

    /// Rows affected by the most recently executed statement.
    fn affected(&self) -> u64;

    /// Row id assigned by the most recent `INSERT`, when the backend
    /// supports it (SQLite `last_insert_rowid`; PostgreSQL relies on
    /// `RETURNING` instead and always answers `None`).
    fn last_insert_id(&self) -> Option<i64>;

    /// Translate a raw backend failure into a structured [`Info`] record.
    fn diagnostics(&self, err: &DriverError) -> Info;

    fn supports_notifications(&self) -> bool {
        false
    }
}

/// Top-level driver factory: selects and opens a backend (spec.md §4.1
/// `open`/`connect`).
pub trait Driver {
    type Connection: Connection;

    fn backend(&self) -> BackendKind;

    /// Open a new physical connection. Connection-string parsing happens
    /// once in [`ConnectParams::parse`]; this only does the I/O.
    fn connect(&self, params: &ConnectParams) -> DriverResult<Self::Connection>;
}
