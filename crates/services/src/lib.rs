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

//! Auxiliary services and auth (C8/C9, spec.md §4.8-§4.9): the system
//! tables sit alongside registered schemes in the same database but are
//! not `Scheme`-backed, so they are addressed directly through
//! `stratum-sql` rather than through `stratum_repo::worker::Worker`.

pub mod auth;
pub mod broadcast;
pub mod delta;
pub mod files;
pub mod http_date;
pub mod schema;
pub mod sessions;

mod support;

pub mod prelude {
    pub use crate::auth::{authorize_user, AuthSchemeConfig, LoginRequest};
    pub use crate::broadcast::{broadcast, process_broadcasts};
    pub use crate::delta::{get_history, DeltaRecord, DeltaUser};
    pub use crate::files::{adopt, stage, StagedUpload};
    pub use crate::schema::bootstrap;
    pub use crate::sessions::{get, remove, set, sweep_expired, sweep_removed_files};
}
