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

//! A fluent, typestate SQL builder (spec.md §4.3). Each state exposes only
//! the transitions the grammar allows from it:
//!
//! ```text
//! Initial → Select|Insert|Update|Delete|With(Generic)
//! Select → Fields → From → [Join*] → [Where] → [GroupBy → [Having]] → [OrderBy → [Limit|Offset]] → [ForUpdate] → Finalized
//! Insert → Fields → Values+ → [OnConflict → DoNothing | DoUpdate → Where?] → [Returning] → Finalized
//! Update → Set+ → [Where] → [Returning] → Finalized
//! Delete → [Where] → [Returning] → Finalized
//! Generic(CTE) → With("name", subquery)* → (any Initial transition)
//! ```

mod buffer;
mod comparison;
mod ident;

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

pub use buffer::{Buffer, Finalized};
pub use comparison::comparison_sql;
pub use ident::{quote_alias, quote_ident, quote_qualified};
pub use select::{JoinKind, WhereBuilder};

/// Entry point of the grammar (`Initial` in the module docs).
#[derive(Debug, Default)]
pub struct Builder {
    buffer: Buffer,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn select(self) -> select::SelectFields {
        select::SelectFields::new(self.buffer)
    }

    #[must_use]
    pub fn insert_into(self, table: &str) -> insert::InsertFields {
        insert::InsertFields::new(self.buffer, table)
    }

    #[must_use]
    pub fn update(self, table: &str) -> update::UpdateSet {
        update::UpdateSet::new(self.buffer, table)
    }

    #[must_use]
    pub fn delete_from(self, table: &str) -> delete::DeleteWhere {
        delete::DeleteWhere::new(self.buffer, table)
    }

    /// `Generic(CTE)`: open a `WITH` prologue before any statement kind.
    #[must_use]
    pub fn with(self, name: &str, subquery: &Finalized) -> Self {
        let mut buffer = self.buffer;
        buffer.open_with(name, subquery);
        Self { buffer }
    }
}
