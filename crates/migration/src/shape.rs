// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The backend-agnostic description of "what the database looks like"
//! (spec.md §4.7): tables, columns, indices and triggers, whether loaded by
//! introspection or projected from the declared schemes. [`DatabaseShape`]
//! is the type [`crate::diff::diff`] compares two instances of.

use smol_str::SmolStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnShape {
    pub name: SmolStr,
    /// The backend-native type name (`BIGINT`, `TEXT`, ...), compared
    /// verbatim — a mismatch triggers drop-and-readd (spec.md §4.7 "Column
    /// type mismatch").
    pub sql_type: SmolStr,
    pub not_null: bool,
    pub primary_key: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexShape {
    pub name: SmolStr,
    pub table: SmolStr,
    pub unique: bool,
    pub columns: Vec<SmolStr>,
    /// Backend auto-named indices (`sqlite_autoindex_*`, Postgres' implicit
    /// unique-constraint indices) are never dropped even when absent from
    /// the target shape (spec.md §4.7 "Extra index").
    pub auto_named: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

/// One trigger, keyed by its self-describing name (spec.md §4.7
/// "Triggers"). `body` is only used when *creating* a trigger; diffing
/// compares names, never bodies, since a name uniquely encodes the
/// trigger's semantics by construction (see [`crate::trigger`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerShape {
    pub name: SmolStr,
    pub table: SmolStr,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableShape {
    pub name: SmolStr,
    pub columns: Vec<ColumnShape>,
    /// Whether `__oid` is a plain autoincrement key (a detached scheme) or
    /// drawn from the shared oid sequence (spec.md §4.7 "Missing table").
    /// Only meaningful on a projected (target) shape; introspected shapes
    /// never need it since the table already exists.
    pub detached: bool,
}

impl TableShape {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnShape> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A full snapshot of a database's shape (spec.md §4.7), either the live
/// state from introspection or the target projected from the schemes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseShape {
    pub tables: Vec<TableShape>,
    pub indices: Vec<IndexShape>,
    pub triggers: Vec<TriggerShape>,
}

impl DatabaseShape {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableShape> {
        self.tables.iter().find(|t| t.name == name)
    }
}
