// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(clippy::pedantic)]
#![warn(clippy::clone_on_ref_ptr)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::missing_errors_doc)]

//! Schema introspection, projection and DDL diffing (C7, spec.md §4.7):
//! load what a live database actually looks like, project what the
//! registered schemes say it should look like, and diff the two into an
//! ordered list of DDL statements. Running that list should always be safe
//! to retry — rerunning [`plan`] against an already-migrated database
//! yields an empty plan (spec.md §4.7 "Idempotence").

pub mod dialect;
pub mod diff;
pub mod error;
pub mod introspect;
pub mod naming;
pub mod project;
pub mod shape;
pub mod trigger;

use stratum_core::schema::registry::SchemeRegistry;
use stratum_driver::{BackendKind, Connection};

use crate::dialect::{MigrationDialect, PgsqlMigrationDialect, SqliteMigrationDialect};
use crate::error::MigrationResult;

pub mod prelude {
    pub use crate::dialect::{ColumnTypeKind, MigrationDialect, PgsqlMigrationDialect, SqliteMigrationDialect, TriggerAction};
    pub use crate::error::{MigrationError, MigrationResult};
    pub use crate::shape::{ColumnShape, DatabaseShape, IndexShape, TableShape, TriggerEvent, TriggerShape, TriggerTiming};
    pub use crate::trigger::TriggerName;
    pub use crate::{migrate, plan};
}

fn dialect_for(backend: BackendKind) -> Box<dyn MigrationDialect> {
    match backend {
        BackendKind::Sqlite => Box::new(SqliteMigrationDialect),
        BackendKind::Pgsql => Box::new(PgsqlMigrationDialect),
    }
}

/// Compute the DDL statements that reconcile `conn`'s live shape with what
/// `registry` projects (spec.md §4.7). Read-only: issues no DDL itself.
pub fn plan<C: Connection>(backend: BackendKind, conn: &mut C, registry: &SchemeRegistry) -> MigrationResult<Vec<String>> {
    let dialect = dialect_for(backend);
    let live = introspect::introspect(backend, conn)?;
    let target = project::project(dialect.as_ref(), registry);
    Ok(diff::diff(dialect.as_ref(), &live, &target))
}

/// Run [`plan`] and execute every statement it returns, in order, inside
/// one transaction at the backend's strongest isolation level (spec.md
/// §4.7 "the full plan runs in one outermost transaction"). Logs each
/// statement before executing it so a failed migration leaves a trail of
/// what ran.
///
/// # Errors
/// Propagates the first statement failure; earlier statements in this call
/// remain only as far as the backend's transaction semantics take them —
/// callers are expected to wrap this in their own outer transaction scope
/// when `C` does not auto-wrap `execute_batch` (SQLite does; see
/// `stratum-driver-sqlite`).
pub fn migrate<C: Connection>(backend: BackendKind, conn: &mut C, registry: &SchemeRegistry) -> MigrationResult<usize> {
    let statements = plan(backend, conn, registry)?;
    log::info!(target: "stratum::migration", "{} statement(s) to apply", statements.len());
    for sql in &statements {
        log::debug!(target: "stratum::migration", "{sql}");
        conn.execute_batch(sql)?;
    }
    Ok(statements.len())
}
