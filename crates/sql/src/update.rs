// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use stratum_core::value::Value;
use stratum_driver::ParamValue;

use crate::buffer::{Buffer, Finalized};
use crate::ident::quote_ident;
use crate::select::WhereBuilder;

/// `Update → Set+`.
#[derive(Debug)]
pub struct UpdateSet {
    buffer: Buffer,
    wrote_any: bool,
}

impl UpdateSet {
    pub(crate) fn new(mut buffer: Buffer, table: &str) -> Self {
        buffer.write_str("UPDATE ");
        buffer.write_str(&quote_ident(table));
        buffer.write_str(" SET ");
        Self {
            buffer,
            wrote_any: false,
        }
    }

    #[must_use]
    pub fn set(mut self, field: &str, value: Value) -> Self {
        if self.wrote_any {
            self.buffer.write_str(", ");
        }
        self.wrote_any = true;
        self.buffer.write_str(&quote_ident(field));
        self.buffer.write_str(" = ?");
        let index = self.buffer.push_param(ParamValue::from(&value));
        self.buffer.write_str(&index.to_string());
        self
    }

    /// `field = field + 1`-style bump with no bound value, used by
    /// `touch(id)` to update a timestamp column in place.
    #[must_use]
    pub fn set_raw(mut self, field: &str, expr: &str) -> Self {
        if self.wrote_any {
            self.buffer.write_str(", ");
        }
        self.wrote_any = true;
        self.buffer.write_str(&quote_ident(field));
        self.buffer.write_str(" = ");
        self.buffer.write_str(expr);
        self
    }

    #[must_use]
    pub fn where_with(mut self, build: impl FnOnce(WhereBuilder) -> WhereBuilder) -> UpdateBody {
        self.buffer.write_str(" WHERE ");
        let inner = build(WhereBuilder::new(self.buffer));
        UpdateBody {
            buffer: inner.into_buffer(),
        }
    }

    #[must_use]
    pub fn returning(mut self, fields: &[&str]) -> UpdateBody {
        UpdateBody { buffer: self.buffer }.returning(fields)
    }

    #[must_use]
    pub fn finalize(self) -> Finalized {
        self.buffer.finalize()
    }
}

/// `[Where] → [Returning] → Finalized`.
#[derive(Debug)]
pub struct UpdateBody {
    buffer: Buffer,
}

impl UpdateBody {
    #[must_use]
    pub fn returning(mut self, fields: &[&str]) -> Self {
        self.buffer.write_str(" RETURNING ");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.buffer.write_str(", ");
            }
            if *field == "*" {
                self.buffer.write_str("*");
            } else {
                self.buffer.write_str(&quote_ident(field));
            }
        }
        self
    }

    #[must_use]
    pub fn finalize(self) -> Finalized {
        self.buffer.finalize()
    }
}
