// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use postgres::types::{ToSql, Type};
use stratum_driver::{ColumnValue, DriverError, DriverResult, ParamValue, StepOutcome};

pub struct PgStatement {
    client: Arc<Mutex<postgres::Client>>,
    last_affected: Arc<AtomicU64>,
    stmt: postgres::Statement,
    column_names: Vec<String>,
    params: Vec<(usize, ParamValue)>,
    pending_rows: Option<VecDeque<Vec<ColumnValue>>>,
    current_row: Vec<ColumnValue>,
}

impl PgStatement {
    pub(crate) fn new(
        client: Arc<Mutex<postgres::Client>>,
        last_affected: Arc<AtomicU64>,
        stmt: postgres::Statement,
        column_names: Vec<String>,
    ) -> Self {
        Self {
            client,
            last_affected,
            stmt,
            column_names,
            params: Vec::new(),
            pending_rows: None,
            current_row: Vec::new(),
        }
    }
}

fn boxed_param(value: &ParamValue) -> Box<dyn ToSql + Sync> {
    match value {
        ParamValue::Null => Box::new(Option::<i64>::None),
        ParamValue::Int(v) => Box::new(*v),
        ParamValue::Float(v) => Box::new(*v),
        ParamValue::Bool(v) => Box::new(*v),
        ParamValue::Text(v) => Box::new(v.clone()),
        ParamValue::Blob(v) => Box::new(v.clone()),
    }
}

/// Decode one cell by the column's declared backend type. `postgres`
/// requires a concrete `FromSql` target per column, so this dispatches on
/// `Type` the way a dynamic bridge has to (spec.md §4.1 `column`: "binary-
/// format protocols are decoded directly").
fn decode_column(row: &postgres::Row, index: usize, ty: &Type) -> DriverResult<ColumnValue> {
    if *ty == Type::BOOL {
        return Ok(row
            .try_get::<_, Option<bool>>(index)
            .map_err(|err| DriverError::Query(err.to_string()))?
            .map_or(ColumnValue::Null, ColumnValue::Bool));
    }
    if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 {
        return Ok(row
            .try_get::<_, Option<i64>>(index)
            .map_err(|err| DriverError::Query(err.to_string()))?
            .map_or(ColumnValue::Null, ColumnValue::Int));
    }
    if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 || *ty == Type::NUMERIC {
        return Ok(row
            .try_get::<_, Option<f64>>(index)
            .map_err(|err| DriverError::Query(err.to_string()))?
            .map_or(ColumnValue::Null, ColumnValue::Float));
    }
    if *ty == Type::BYTEA {
        return Ok(row
            .try_get::<_, Option<Vec<u8>>>(index)
            .map_err(|err| DriverError::Query(err.to_string()))?
            .map_or(ColumnValue::Null, ColumnValue::Blob));
    }
    // TEXT, VARCHAR and anything unrecognised (tsvector rank expressions,
    // enums, …) are read back as text.
    Ok(row
        .try_get::<_, Option<String>>(index)
        .map_err(|err| DriverError::Query(err.to_string()))?
        .map_or(ColumnValue::Null, ColumnValue::Text))
}

impl stratum_driver::Statement for PgStatement {
    fn bind(&mut self, index: u32, value: &ParamValue) -> DriverResult<()> {
        self.params.push((index as usize, value.clone()));
        Ok(())
    }

    fn step(&mut self) -> DriverResult<StepOutcome> {
        if self.pending_rows.is_none() {
            self.params.sort_by_key(|(index, _)| *index);
            let boxed: Vec<Box<dyn ToSql + Sync>> =
                self.params.iter().map(|(_, value)| boxed_param(value)).collect();
            let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(AsRef::as_ref).collect();

            let rows = self
                .client
                .lock()
                .expect("postgres client mutex poisoned")
                .query(&self.stmt, &refs)
                .map_err(|err| DriverError::Query(err.to_string()))?;

            self.last_affected.store(rows.len() as u64, Ordering::Release);

            let columns = self.stmt.columns();
            let mut buffered = VecDeque::with_capacity(rows.len());
            for row in &rows {
                let mut cells = Vec::with_capacity(columns.len());
                for (i, column) in columns.iter().enumerate() {
                    cells.push(decode_column(row, i, column.type_())?);
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
        self.params.clear();
        self.pending_rows = None;
        self.current_row.clear();
        Ok(())
    }
}
