// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The one seam the translator (C6) defers to a concrete backend: turning
//! a [`FullTextQuery`] into a match expression and, where supported, a
//! rank expression (spec.md §4.6 "Full-text"). Everything else the
//! translator does is backend-agnostic SQL text built through
//! `stratum-sql`.

use stratum_core::schema::field::{FieldFlags, FullTextSpec};
use stratum_core_api::fulltext::FullTextQuery;
use stratum_driver::BackendKind;

/// Implemented once per backend crate (`stratum-repo-sqlite`,
/// `stratum-repo-pgsql`).
pub trait Dialect: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// A boolean SQL expression (already referencing `column_sql`, the
    /// quoted/qualified column reference) testing whether the row matches
    /// `query`. Embedded verbatim into a `WhereBuilder::raw` fragment.
    fn fulltext_match_sql(&self, column_sql: &str, spec: &FullTextSpec, query: &FullTextQuery) -> String;

    /// A scalar SQL expression computing the match rank, or `None` when the
    /// backend has no ranking support (SQLite's FTS stub, spec.md §4.6).
    fn fulltext_rank_sql(&self, column_sql: &str, spec: &FullTextSpec, query: &FullTextQuery, flags: FieldFlags) -> Option<String>;
}

/// Escape a string literal for inline embedding in generated SQL (full-text
/// expressions are not bind-parameterised per spec.md §4.3 "dialect-specific
/// kinds ... are emitted as literals in the SQL string, not via bind
/// slots").
#[must_use]
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Render the tokens of a [`FullTextQuery`] into a single space/operator
/// joined search string, the common substrate both backends' `to_tsquery`
/// and `MATCH` syntaxes build on.
#[must_use]
pub fn query_text(query: &FullTextQuery) -> String {
    match query {
        FullTextQuery::Raw { text, .. } => text.clone(),
        FullTextQuery::Tokens(tokens) => tokens
            .iter()
            .map(|t| if t.negate { format!("-{}", t.term) } else { t.term.clone() })
            .collect::<Vec<_>>()
            .join(" "),
    }
}
