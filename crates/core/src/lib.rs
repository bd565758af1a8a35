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

pub mod config;
pub mod error;
pub mod query;
pub mod schema;
pub mod util;
pub mod value;

use util::clock::DateTime;

/// The implicit 64-bit primary key every non-[`detached`](schema::Scheme::is_detached)
/// scheme carries, allocated from a shared process-wide counter
/// (`__objects`/`stellator_next_oid()` in spec.md §3.5).
pub type RecordId = i64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordHeader<Id = RecordId> {
    pub id: Id,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

pub mod prelude {
    pub use crate::{
        config::{AuthConfig, DriverConfig, EngineConfig, PoolConfig},
        error::{CoreError, CoreResult},
        query::{Comparison, FieldPredicate, Predicate},
        schema::{
            field::{Field, FieldFlags, FieldKind, FieldView, FullTextSpec, OnRemove, ScalarKind, Transform},
            hook::{HookContext, SchemeHooks, ValidationError},
            registry::SchemeRegistry,
            FieldSelector, Scheme,
        },
        util::clock::{DateTime, DeltaAction},
        value::{Dict, Value, ValueKind},
        RecordHeader, RecordId,
    };
}
