// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::schema::hook::ValidationError;

/// Failures that can be detected purely from the declared schema, before any
/// SQL is emitted. `Bug` corresponds to the top-level `Bug` error kind in
/// spec.md §7 — an invariant the scheme author violated (e.g. an ambiguous
/// reciprocal link) rather than a runtime condition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("schema invariant violated: {0}")]
    Bug(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type CoreResult<T> = Result<T, CoreError>;
