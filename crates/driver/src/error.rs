// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use smol_str::SmolStr;

/// A structured error record surfaced by [`Connection::diagnostics`](crate::Connection::diagnostics)
/// (spec.md §4.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Info {
    pub code: i32,
    pub status_name: SmolStr,
    pub description: String,
    pub failed_query: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("statement cache exhausted")]
    StatementCacheExhausted,

    /// A prior statement in this connection's transaction failed; the
    /// connection is in "sticky rollback" and rejects further queries
    /// until the outermost transaction ends (spec.md §4.1).
    #[error("transaction is in sticky-rollback state after a prior error")]
    StickyRollback,

    #[error("malformed connection string: {0}")]
    MalformedParams(String),
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;
