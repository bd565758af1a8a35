// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use smol_str::SmolStr;
use stratum_core::error::CoreError;
use stratum_driver::{DriverError, Info};

/// The full repository error taxonomy (spec.md §7). Every recoverable
/// failure mode a [`Worker`](crate::worker::Worker) can surface lands in
/// one of these variants; [`Bug`](Self::Bug) is reserved for invariant
/// violations the caller cannot recover from.
#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A transaction short-circuited to sticky-rollback after a prior
    /// statement failed (spec.md §4.1).
    #[error("transaction aborted")]
    TransactionAborted,

    #[error("scheme `{0}` denied the operation for the current role")]
    SchemeDenied(SmolStr),

    #[error("scheme validation failed: {0}")]
    SchemeValidation(String),

    #[error("no matching row")]
    NotFound,

    #[error("conflicting update")]
    Conflict,

    /// Surfaced by `authorize_user` during the lockout window
    /// (spec.md §4.9... see `stratum-services::auth`).
    #[error("account temporarily locked after repeated failed logins")]
    AuthLocked,

    /// A non-recoverable invariant violation; never expected in normal
    /// operation (spec.md §7, mirrors [`CoreError::Bug`]).
    #[error("bug: {0}")]
    Bug(String),
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

impl From<CoreError> for RepoError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Bug(msg) => Self::Bug(msg),
            CoreError::Validation(validation) => Self::SchemeValidation(validation.to_string()),
        }
    }
}

impl From<DriverError> for RepoError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Unavailable(msg) => Self::BackendUnavailable(msg),
            DriverError::StickyRollback => Self::TransactionAborted,
            DriverError::Query(msg) | DriverError::MalformedParams(msg) => Self::ConstraintViolation(msg),
            DriverError::StatementCacheExhausted => Self::BackendUnavailable("statement cache exhausted".to_owned()),
        }
    }
}

impl RepoError {
    #[must_use]
    pub fn from_driver_info(info: &Info) -> Self {
        Self::ConstraintViolation(format!("{}: {}", info.status_name, info.description))
    }
}
