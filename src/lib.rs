// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::wildcard_imports)]

//! Schema-driven, multi-backend object storage engine.
//!
//! This crate is a thin, feature-gated facade over the `stratum-*`
//! workspace members: `stratum-core` (the schema/value/query model) is
//! always available; everything backend-facing sits behind Cargo features
//! so a caller that only needs the schema model (e.g. a migration-planning
//! CLI) isn't forced to pull in a SQL driver.
//!
//! - `api` — the storage-facing query/pagination/sorting surface
//!   ([`stratum-core-api`]).
//! - `repo` — the transaction/worker/translator/migration machinery,
//!   backend-agnostic ([`stratum-repo`]).
//! - `sqlite` / `pgsql` — a concrete backend: driver, repo glue, migration
//!   planner and auxiliary services, wired to one connection type.

pub use stratum_core as core;

#[cfg(feature = "api")]
pub use stratum_core_api as api;

#[cfg(feature = "repo")]
pub use stratum_repo as repo;

#[cfg(any(feature = "sqlite", feature = "pgsql"))]
pub use stratum_migration as migration;

#[cfg(any(feature = "sqlite", feature = "pgsql"))]
pub use stratum_services as services;

#[cfg(feature = "sqlite")]
pub use stratum_driver_sqlite as driver_sqlite;

#[cfg(feature = "sqlite")]
pub use stratum_repo_sqlite as repo_sqlite;

#[cfg(feature = "pgsql")]
pub use stratum_driver_pgsql as driver_pgsql;

#[cfg(feature = "pgsql")]
pub use stratum_repo_pgsql as repo_pgsql;

/// Re-exports the most commonly needed types from every enabled feature,
/// grouped the way a facade crate's public surface usually is.
pub mod prelude {
    pub use stratum_core::prelude::*;

    #[cfg(feature = "api")]
    pub use stratum_core_api::prelude::*;

    #[cfg(feature = "repo")]
    pub use stratum_repo::prelude::*;

    #[cfg(any(feature = "sqlite", feature = "pgsql"))]
    pub use stratum_migration::prelude::*;

    #[cfg(any(feature = "sqlite", feature = "pgsql"))]
    pub use stratum_services::prelude::*;
}
