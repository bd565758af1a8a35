// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// Outcome of one [`Statement::step`](crate::Statement::step) call
/// (spec.md §4.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Row,
    Done,
}

/// A decoded column cell (spec.md §4.1 `column`). Textual protocols parse
/// integers/doubles explicitly and recognise `NaN`/`±Infinity`; binary
/// protocols decode directly — both collapse to this one shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
}

impl ColumnValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<ColumnValue> for stratum_core::value::Value {
    fn from(column: ColumnValue) -> Self {
        match column {
            ColumnValue::Null => Self::Null,
            ColumnValue::Int(v) => Self::Int(v),
            ColumnValue::Float(v) => Self::Float(v),
            ColumnValue::Bool(v) => Self::Bool(v),
            ColumnValue::Text(v) => Self::Text(v),
            ColumnValue::Blob(v) => Self::Bytes(v),
        }
    }
}

/// A thin, column-name-aware view over the cells of the current row of a
/// [`Statement`](crate::Statement), handed to the result-cursor decoder to
/// build a [`Value::Dict`](stratum_core::value::Value::Dict).
#[derive(Debug)]
pub struct Row<'s> {
    names: &'s [String],
    cells: Vec<ColumnValue>,
}

impl<'s> Row<'s> {
    #[must_use]
    pub const fn new(names: &'s [String], cells: Vec<ColumnValue>) -> Self {
        Self { names, cells }
    }

    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<&ColumnValue> {
        self.cells.get(index)
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&ColumnValue> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .and_then(|index| self.cells.get(index))
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
