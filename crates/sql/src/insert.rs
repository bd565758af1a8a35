// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use stratum_core::value::Value;
use stratum_driver::ParamValue;

use crate::buffer::{Buffer, Finalized};
use crate::ident::quote_ident;

/// `Insert → Fields`.
#[derive(Debug)]
pub struct InsertFields {
    buffer: Buffer,
}

impl InsertFields {
    pub(crate) fn new(mut buffer: Buffer, table: &str) -> Self {
        buffer.write_str("INSERT INTO ");
        buffer.write_str(&quote_ident(table));
        buffer.write_str(" ");
        Self { buffer }
    }

    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> InsertValues {
        self.buffer.write_str("(");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.buffer.write_str(", ");
            }
            self.buffer.write_str(&quote_ident(field));
        }
        self.buffer.write_str(") VALUES ");
        InsertValues {
            buffer: self.buffer,
            wrote_any_tuple: false,
        }
    }
}

/// `Insert → Fields → Values+`: one or more parenthesised value tuples.
#[derive(Debug)]
pub struct InsertValues {
    buffer: Buffer,
    wrote_any_tuple: bool,
}

impl InsertValues {
    #[must_use]
    pub fn values_tuple(mut self, values: &[Value]) -> Self {
        if self.wrote_any_tuple {
            self.buffer.write_str(", ");
        }
        self.wrote_any_tuple = true;
        self.buffer.write_str("(");
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.buffer.write_str(", ");
            }
            self.buffer.write_str("?");
            let index = self.buffer.push_param(ParamValue::from(value));
            self.buffer.write_str(&index.to_string());
        }
        self.buffer.write_str(")");
        self
    }

    /// `ON CONFLICT (col, ...) DO NOTHING`.
    #[must_use]
    pub fn on_conflict_do_nothing(mut self, conflict_fields: &[&str]) -> InsertBody {
        write_conflict_target(&mut self.buffer, conflict_fields);
        self.buffer.write_str(" DO NOTHING");
        InsertBody { buffer: self.buffer }
    }

    /// `ON CONFLICT (col, ...) DO UPDATE SET col = EXCLUDED.col, ... [WHERE cond]`
    /// (spec.md §4.5 "Conflict handling on INSERT").
    #[must_use]
    pub fn on_conflict_do_update(
        mut self,
        conflict_fields: &[&str],
        set_fields: &[&str],
        condition: Option<&str>,
    ) -> InsertBody {
        write_conflict_target(&mut self.buffer, conflict_fields);
        self.buffer.write_str(" DO UPDATE SET ");
        for (i, field) in set_fields.iter().enumerate() {
            if i > 0 {
                self.buffer.write_str(", ");
            }
            let quoted = quote_ident(field);
            self.buffer.write_str(&quoted);
            self.buffer.write_str(" = EXCLUDED.");
            self.buffer.write_str(&quoted);
        }
        if let Some(cond) = condition {
            self.buffer.write_str(" WHERE ");
            self.buffer.write_str(cond);
        }
        InsertBody { buffer: self.buffer }
    }

    #[must_use]
    pub fn returning(mut self, fields: &[&str]) -> InsertBody {
        write_returning(&mut self.buffer, fields);
        InsertBody { buffer: self.buffer }
    }

    #[must_use]
    pub fn finalize(self) -> Finalized {
        self.buffer.finalize()
    }
}

fn write_conflict_target(buffer: &mut Buffer, conflict_fields: &[&str]) {
    buffer.write_str(" ON CONFLICT (");
    for (i, field) in conflict_fields.iter().enumerate() {
        if i > 0 {
            buffer.write_str(", ");
        }
        buffer.write_str(&quote_ident(field));
    }
    buffer.write_str(")");
}

fn write_returning(buffer: &mut Buffer, fields: &[&str]) {
    buffer.write_str(" RETURNING ");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            buffer.write_str(", ");
        }
        if *field == "*" {
            buffer.write_str("*");
        } else {
            buffer.write_str(&quote_ident(field));
        }
    }
}

/// `[Returning] → Finalized`.
#[derive(Debug)]
pub struct InsertBody {
    buffer: Buffer,
}

impl InsertBody {
    #[must_use]
    pub fn returning(mut self, fields: &[&str]) -> Self {
        write_returning(&mut self.buffer, fields);
        self
    }

    #[must_use]
    pub fn finalize(self) -> Finalized {
        self.buffer.finalize()
    }
}
