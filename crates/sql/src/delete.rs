// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::buffer::{Buffer, Finalized};
use crate::ident::quote_ident;
use crate::select::WhereBuilder;

/// `Delete → [Where]`.
#[derive(Debug)]
pub struct DeleteWhere {
    buffer: Buffer,
}

impl DeleteWhere {
    pub(crate) fn new(mut buffer: Buffer, table: &str) -> Self {
        buffer.write_str("DELETE FROM ");
        buffer.write_str(&quote_ident(table));
        Self { buffer }
    }

    #[must_use]
    pub fn where_with(mut self, build: impl FnOnce(WhereBuilder) -> WhereBuilder) -> DeleteBody {
        self.buffer.write_str(" WHERE ");
        let inner = build(WhereBuilder::new(self.buffer));
        DeleteBody {
            buffer: inner.into_buffer(),
        }
    }

    #[must_use]
    pub fn returning(self, fields: &[&str]) -> DeleteBody {
        DeleteBody { buffer: self.buffer }.returning(fields)
    }

    #[must_use]
    pub fn finalize(self) -> Finalized {
        self.buffer.finalize()
    }
}

/// `[Returning] → Finalized`.
#[derive(Debug)]
pub struct DeleteBody {
    buffer: Buffer,
}

impl DeleteBody {
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
