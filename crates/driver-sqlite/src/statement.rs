// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::VecDeque;

use rusqlite::types::{Value as SqliteValue, ValueRef};
use stratum_driver::{ColumnValue, DriverError, DriverResult, ParamValue, StepOutcome};

/// Wraps a cached rusqlite statement. Binds are buffered by index and the
/// whole result set is pulled eagerly on the first [`step`](Self::step)
/// call, then replayed row by row — this keeps the wrapper free of
/// self-referential borrows while preserving the bind-then-step contract
/// (spec.md §4.1).
pub struct SqliteStatement<'conn> {
    inner: rusqlite::CachedStatement<'conn>,
    column_names: Vec<String>,
    params: Vec<(usize, SqliteValue)>,
    pending_rows: Option<VecDeque<Vec<ColumnValue>>>,
    current_row: Vec<ColumnValue>,
}

impl<'conn> SqliteStatement<'conn> {
    pub(crate) fn new(inner: rusqlite::CachedStatement<'conn>) -> Self {
        let column_names = inner
            .column_names()
            .into_iter()
            .map(ToOwned::to_owned)
            .collect();
        Self {
            inner,
            column_names,
            params: Vec::new(),
            pending_rows: None,
            current_row: Vec::new(),
        }
    }
}

fn to_sqlite_value(value: &ParamValue) -> SqliteValue {
    match value {
        ParamValue::Null => SqliteValue::Null,
        ParamValue::Int(v) => SqliteValue::Integer(*v),
        ParamValue::Float(v) => SqliteValue::Real(*v),
        ParamValue::Bool(v) => SqliteValue::Integer(i64::from(*v)),
        ParamValue::Text(v) => SqliteValue::Text(v.clone()),
        ParamValue::Blob(v) => SqliteValue::Blob(v.clone()),
    }
}

fn decode_value_ref(value_ref: ValueRef<'_>) -> ColumnValue {
    match value_ref {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(v) => ColumnValue::Int(v),
        ValueRef::Real(v) => ColumnValue::Float(v),
        ValueRef::Text(bytes) => ColumnValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => ColumnValue::Blob(bytes.to_vec()),
    }
}

impl stratum_driver::Statement for SqliteStatement<'_> {
    fn bind(&mut self, index: u32, value: &ParamValue) -> DriverResult<()> {
        self.params.push((index as usize, to_sqlite_value(value)));
        Ok(())
    }

    fn step(&mut self) -> DriverResult<StepOutcome> {
        if self.pending_rows.is_none() {
            self.params.sort_by_key(|(index, _)| *index);
            for (index, value) in &self.params {
                self.inner
                    .raw_bind_parameter(*index, value.clone())
                    .map_err(|err| DriverError::Query(err.to_string()))?;
            }
            let mut rows_iter = self.inner.raw_query();
            let mut buffered = VecDeque::new();
            while let Some(row) = rows_iter
                .next()
                .map_err(|err| DriverError::Query(err.to_string()))?
            {
                let mut cells = Vec::with_capacity(self.column_names.len());
                for i in 0..self.column_names.len() {
                    let value_ref = row
                        .get_ref(i)
                        .map_err(|err| DriverError::Query(err.to_string()))?;
                    cells.push(decode_value_ref(value_ref));
                }
                buffered.push_back(cells);
            }
            self.pending_rows = Some(buffered);
        }

        let rows = self.pending_rows.as_mut().expect("initialized above");
        match rows.pop_front() {
            Some(cells) => {
                self.current_row = cells;
                Ok(StepOutcome::Row)
            }
            None => Ok(StepOutcome::Done),
        }
    }

    fn column(&self, index: usize) -> DriverResult<ColumnValue> {
        self.current_row
            .get(index)
            .cloned()
            .ok_or_else(|| DriverError::Query(format!("column index {index} out of range")))
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.column_names.get(index).map(String::as_str)
    }

    fn column_count(&self) -> usize {
        self.column_names.len()
    }

    fn reset(&mut self) -> DriverResult<()> {
        // `raw_query()`'s `Rows` resets the underlying sqlite3 statement on
        // drop once fully drained, which `step` always does eagerly above.
        self.params.clear();
        self.pending_rows = None;
        self.current_row.clear();
        Ok(())
    }
}
