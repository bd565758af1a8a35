// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use stratum_driver::ParamValue;

/// Accumulates statement text and buffered bind parameters as the builder
/// walks the grammar (spec.md §4.3 "Each transition appends to a shared
/// text buffer"). Parameters use numbered placeholders (`?1`, `?2`, …);
/// complex values are kept in a side vector alongside the statement instead
/// of being inlined.
#[derive(Debug, Default)]
pub struct Buffer {
    sql: String,
    params: Vec<ParamValue>,
    with_opened: bool,
    pending_space: bool,
}

impl Buffer {
    pub(crate) fn write_str(&mut self, s: &str) {
        if self.pending_space && !s.is_empty() {
            self.sql.push(' ');
            self.pending_space = false;
        }
        self.sql.push_str(s);
    }

    /// Buffer `value` and return the 1-based placeholder index just
    /// assigned to it (spec.md §4.3 "the builder stores `(index, kind,
    /// bytes)` triples").
    pub(crate) fn push_param(&mut self, value: ParamValue) -> u32 {
        self.params.push(value);
        u32::try_from(self.params.len()).expect("parameter count fits in u32")
    }

    #[must_use]
    pub(crate) fn next_index(&self) -> u32 {
        u32::try_from(self.params.len() + 1).expect("parameter count fits in u32")
    }

    /// Append one `WITH name AS (subquery)` prologue clause, renumbering
    /// the subquery's placeholders to continue this buffer's sequence and
    /// folding its bound parameters in.
    pub(crate) fn open_with(&mut self, name: &str, subquery: &Finalized) {
        if self.with_opened {
            self.sql.push_str(", ");
        } else {
            self.sql.push_str("WITH ");
            self.with_opened = true;
        }
        let renumbered = self.embed(subquery);
        self.sql.push_str(&format!("{} AS ({renumbered})", crate::quote_ident(name)));
        self.pending_space = true;
    }

    /// Renumber `subquery`'s placeholders to continue this buffer's
    /// sequence, fold its parameters in, and return its (now consistent)
    /// SQL text for embedding as a subquery or CTE body.
    pub(crate) fn embed(&mut self, subquery: &Finalized) -> String {
        let offset = self.next_index().saturating_sub(1);
        let renumbered = renumber_placeholders(subquery.subquery_sql(), offset);
        self.params.extend(subquery.params.iter().cloned());
        renumbered
    }

    pub(crate) fn finalize(self) -> Finalized {
        Finalized {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Rewrite each `?N` placeholder in `sql` to `?{N + offset}`, walking left
/// to right so multi-digit indices are never partially matched.
fn renumber_placeholders(sql: &str, offset: u32) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '?' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(&(_, d)) = chars.peek() {
            if d.is_ascii_digit() {
                digits.push(d);
                chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            out.push('?');
        } else {
            let n: u32 = digits.parse().expect("digits are ascii");
            out.push('?');
            out.push_str(&(n + offset).to_string());
        }
    }
    out
}

/// A terminated statement: finished SQL text plus its bound parameters in
/// placeholder order, ready to hand to a driver [`Statement`](stratum_driver::Statement).
#[derive(Clone, Debug, PartialEq)]
pub struct Finalized {
    sql: String,
    params: Vec<ParamValue>,
}

impl Finalized {
    #[must_use]
    pub fn sql(&self) -> String {
        format!("{};", self.sql)
    }

    /// The statement's text without a trailing terminator, for embedding
    /// as a CTE body or parenthesised subquery.
    #[must_use]
    pub(crate) fn subquery_sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[ParamValue] {
        &self.params
    }
}
