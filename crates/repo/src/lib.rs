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

//! Backend-agnostic transaction, translation and worker machinery (C5/C6/C10,
//! spec.md §§4.5-4.6). A concrete backend crate (`stratum-repo-sqlite`,
//! `stratum-repo-pgsql`) supplies a [`driver::Connection`](stratum_driver::Connection)
//! and a [`dialect::Dialect`] impl; everything else in this crate is shared.

pub mod context;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod transaction;
pub mod translator;
pub mod worker;

pub mod prelude {
    pub use crate::context::{request_meta, set_request_meta, ProcessContext, RequestMeta};
    pub use crate::cursor::Cursor;
    pub use crate::dialect::Dialect;
    pub use crate::error::{RepoError, RepoResult};
    pub use crate::transaction::{IsolationLevel, PostCommitTask, Transaction};
    pub use crate::translator::{ConflictHandler, Translator};
    pub use crate::worker::Worker;
}
