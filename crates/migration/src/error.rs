// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use stratum_driver::DriverError;

/// Errors the migration planner can surface (spec.md §4.7, mirrors the
/// taxonomy shape of [`stratum_repo::error::RepoError`]).
#[derive(thiserror::Error, Debug)]
pub enum MigrationError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("introspection query failed: {0}")]
    Introspection(String),

    #[error("migration statement failed: {0}")]
    Statement(String),
}

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

impl From<DriverError> for MigrationError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Unavailable(msg) => Self::BackendUnavailable(msg),
            DriverError::Query(msg) => Self::Introspection(msg),
            DriverError::StickyRollback => Self::Statement("transaction is in sticky-rollback state".to_owned()),
            DriverError::StatementCacheExhausted => Self::BackendUnavailable("statement cache exhausted".to_owned()),
            DriverError::MalformedParams(msg) => Self::BackendUnavailable(msg),
        }
    }
}
