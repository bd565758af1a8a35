// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use stratum_core::query::Comparison;
use stratum_core::value::Value;

use crate::buffer::{Buffer, Finalized};
use crate::comparison::write_predicate;
use crate::ident::quote_ident;

/// `Select → Fields`: the builder has committed to a `SELECT` and is
/// waiting for its projection list.
#[derive(Debug)]
pub struct SelectFields {
    buffer: Buffer,
}

impl SelectFields {
    pub(crate) fn new(mut buffer: Buffer) -> Self {
        buffer.write_str("SELECT ");
        Self { buffer }
    }

    /// Project the given columns, table-unqualified. Fields named `*` are
    /// never quoted (spec.md §4.3).
    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> SelectFrom {
        write_field_list(&mut self.buffer, fields);
        SelectFrom { buffer: self.buffer }
    }

    #[must_use]
    pub fn all(mut self) -> SelectFrom {
        self.buffer.write_str("*");
        SelectFrom { buffer: self.buffer }
    }

    /// Project already-rendered SQL fragments verbatim (e.g. `"col"` plus a
    /// computed `to_tsvector(...) AS "__ts_rank_x"` expression the
    /// translator assembled itself), bypassing the identifier auto-quoting
    /// `fields` applies.
    #[must_use]
    pub fn fields_raw(mut self, fragments: &[String]) -> SelectFrom {
        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                self.buffer.write_str(", ");
            }
            self.buffer.write_str(fragment);
        }
        SelectFrom { buffer: self.buffer }
    }
}

fn write_field_list(buffer: &mut Buffer, fields: &[&str]) {
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

/// `Select → Fields → From`.
#[derive(Debug)]
pub struct SelectFrom {
    buffer: Buffer,
}

impl SelectFrom {
    #[must_use]
    pub fn from(mut self, table: &str) -> SelectBody {
        self.buffer.write_str(" FROM ");
        self.buffer.write_str(&quote_ident(table));
        SelectBody { buffer: self.buffer }
    }

    /// `FROM (subquery) AS alias`, used by the translator to stack a
    /// keyset or relation-traversal CTE result under the outer projection.
    #[must_use]
    pub fn from_subquery(mut self, subquery: &Finalized, alias: &str) -> SelectBody {
        self.buffer.write_str(" FROM (");
        let text = self.buffer.embed(subquery);
        self.buffer.write_str(&text);
        self.buffer.write_str(") AS ");
        self.buffer.write_str(&quote_ident(alias));
        SelectBody { buffer: self.buffer }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    const fn sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// Everything after `FROM`: joins, `WHERE`, `GROUP BY`/`HAVING`,
/// `ORDER BY`, `LIMIT`/`OFFSET` and `FOR UPDATE` are all optional and, in
/// practice, requested by the translator in the grammar's order — but are
/// exposed as plain chainable methods on one state rather than as one
/// wrapper type per optional stage, to avoid a combinatorial explosion of
/// near-identical marker types for clauses that are either present or
/// completely absent.
#[derive(Debug)]
pub struct SelectBody {
    buffer: Buffer,
}

impl SelectBody {
    #[must_use]
    pub fn join(mut self, kind: JoinKind, table: &str, on_sql: &str) -> Self {
        self.buffer.write_str(" ");
        self.buffer.write_str(kind.sql());
        self.buffer.write_str(" ");
        self.buffer.write_str(&quote_ident(table));
        self.buffer.write_str(" ON ");
        self.buffer.write_str(on_sql);
        self
    }

    /// Open a parenthesised `WHERE` clause; `build` receives a fresh
    /// [`WhereBuilder`] to accumulate `AND`-joined predicates into.
    #[must_use]
    pub fn where_with(mut self, build: impl FnOnce(WhereBuilder) -> WhereBuilder) -> Self {
        self.buffer.write_str(" WHERE ");
        let inner = build(WhereBuilder {
            buffer: self.buffer,
            wrote_any: false,
        });
        self.buffer = inner.buffer;
        self
    }

    #[must_use]
    pub fn group_by(mut self, fields: &[&str]) -> Self {
        self.buffer.write_str(" GROUP BY ");
        write_field_list(&mut self.buffer, fields);
        self
    }

    #[must_use]
    pub fn having(mut self, build: impl FnOnce(WhereBuilder) -> WhereBuilder) -> Self {
        self.buffer.write_str(" HAVING ");
        let inner = build(WhereBuilder {
            buffer: self.buffer,
            wrote_any: false,
        });
        self.buffer = inner.buffer;
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: &str, ascending: bool, nulls_last: Option<bool>) -> Self {
        self.buffer.write_str(" ORDER BY ");
        self.buffer.write_str(&quote_ident(field));
        self.buffer.write_str(if ascending { " ASC" } else { " DESC" });
        if let Some(last) = nulls_last {
            self.buffer
                .write_str(if last { " NULLS LAST" } else { " NULLS FIRST" });
        }
        self
    }

    #[must_use]
    pub fn order_by_raw(mut self, expr: &str, ascending: bool) -> Self {
        self.buffer.write_str(" ORDER BY ");
        self.buffer.write_str(expr);
        self.buffer.write_str(if ascending { " ASC" } else { " DESC" });
        self
    }

    /// Append an additional, comma-joined `ORDER BY` key after one already
    /// opened by `order_by`/`order_by_raw` (spec.md §4.3 multi-key sort).
    #[must_use]
    pub fn then_order_by(mut self, field: &str, ascending: bool, nulls_last: Option<bool>) -> Self {
        self.buffer.write_str(", ");
        self.buffer.write_str(&quote_ident(field));
        self.buffer.write_str(if ascending { " ASC" } else { " DESC" });
        if let Some(last) = nulls_last {
            self.buffer
                .write_str(if last { " NULLS LAST" } else { " NULLS FIRST" });
        }
        self
    }

    /// Raw-expression counterpart of [`Self::then_order_by`].
    #[must_use]
    pub fn then_order_by_raw(mut self, expr: &str, ascending: bool) -> Self {
        self.buffer.write_str(", ");
        self.buffer.write_str(expr);
        self.buffer.write_str(if ascending { " ASC" } else { " DESC" });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.buffer.write_str(&format!(" LIMIT {limit}"));
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.buffer.write_str(&format!(" OFFSET {offset}"));
        self
    }

    #[must_use]
    pub fn for_update(mut self) -> Self {
        self.buffer.write_str(" FOR UPDATE");
        self
    }

    #[must_use]
    pub fn finalize(self) -> Finalized {
        self.buffer.finalize()
    }
}

/// A parenthesised `WHERE`/`HAVING`/`ON` predicate list, `AND`-joined
/// (spec.md §3.4's `Predicate` is always a flat conjunction).
#[derive(Debug)]
pub struct WhereBuilder {
    buffer: Buffer,
    wrote_any: bool,
}

impl WhereBuilder {
    pub(crate) fn new(buffer: Buffer) -> Self {
        Self {
            buffer,
            wrote_any: false,
        }
    }

    pub(crate) fn into_buffer(self) -> Buffer {
        self.buffer
    }

    fn join(&mut self) {
        if self.wrote_any {
            self.buffer.write_str(" AND ");
        }
        self.wrote_any = true;
    }

    #[must_use]
    pub fn predicate(mut self, field_sql: &str, comparison: Comparison, value1: Option<Value>, value2: Option<Value>) -> Self {
        self.join();
        write_predicate(&mut self.buffer, field_sql, comparison, value1, value2);
        self
    }

    /// A raw fragment for cases the translator has already composed
    /// itself, such as a full-text `@@` expression with a cached compiled
    /// query, or an `__oid IN (subquery)` hop test.
    #[must_use]
    pub fn raw(mut self, fragment: &str) -> Self {
        self.join();
        self.buffer.write_str(fragment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;
    use stratum_driver::ParamValue;

    #[test]
    fn builds_simple_select() {
        let finalized = Builder::new()
            .select()
            .fields(&["__oid", "name"])
            .from("users")
            .where_with(|w| w.predicate(&quote_ident("name"), Comparison::Equal, Some(Value::Text("alice".into())), None))
            .finalize();
        assert_eq!(
            finalized.sql(),
            "SELECT \"__oid\", \"name\" FROM \"users\" WHERE \"name\" = ?1;"
        );
        assert_eq!(finalized.params(), &[ParamValue::Text("alice".into())]);
    }

    #[test]
    fn builds_select_with_keyset_cte() {
        let cte = Builder::new()
            .select()
            .fields(&["__oid"])
            .from("users")
            .where_with(|w| w.predicate("\"__oid\"", Comparison::GreaterThan, Some(Value::Int(41)), None))
            .limit(20)
            .finalize();
        let finalized = Builder::new()
            .with("u", &cte)
            .select()
            .all()
            .from_subquery(&cte, "u")
            .finalize();
        assert!(finalized.sql().starts_with("WITH \"u\" AS (SELECT \"__oid\" FROM \"users\" WHERE \"__oid\" > ?1 LIMIT 20) SELECT * FROM ("));
        // The embedded copy inside FROM (...) is renumbered to continue
        // past the CTE prologue's own placeholder.
        assert!(finalized.sql().contains("?2"));
    }
}
