// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(clippy::pedantic)]
#![warn(clippy::clone_on_ref_ptr)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::missing_errors_doc)]

//! SQLite [`Dialect`](stratum_repo::dialect::Dialect). SQLite has no native
//! ranked full-text type in this schema's column-type mapping (spec.md §4.7
//! maps `FullTextView` to a plain BLOB stub on this backend), so the match
//! expression degrades to a `LIKE` scan over the stored text and the rank
//! expression is always `None` (spec.md §4.6, documented limitation).

use stratum_core::schema::field::{FieldFlags, FullTextSpec};
use stratum_core_api::fulltext::FullTextQuery;
use stratum_driver::BackendKind;
use stratum_repo::dialect::{escape_literal, query_text, Dialect};

#[derive(Copy, Clone, Debug, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    /// Every whitespace-separated (non-negated) term must appear as a
    /// substring of `column_sql`; a negated term must not. There is no
    /// tokenisation or stemming — callers should not expect PostgreSQL-grade
    /// recall from this backend.
    fn fulltext_match_sql(&self, column_sql: &str, _spec: &FullTextSpec, query: &FullTextQuery) -> String {
        let text = query_text(query);
        let terms: Vec<&str> = text.split_whitespace().collect();
        if terms.is_empty() {
            return "1".to_owned();
        }
        terms
            .iter()
            .map(|term| {
                if let Some(negated) = term.strip_prefix('-') {
                    format!("{column_sql} NOT LIKE '%{}%'", escape_literal(negated))
                } else {
                    format!("{column_sql} LIKE '%{}%'", escape_literal(term))
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn fulltext_rank_sql(&self, _column_sql: &str, _spec: &FullTextSpec, _query: &FullTextQuery, _flags: FieldFlags) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_expression_ands_every_positive_term() {
        let dialect = SqliteDialect;
        let spec = FullTextSpec {
            sources: vec!["title".into()],
            language: "english".into(),
        };
        let query = FullTextQuery::plain("hello world", "english");
        let sql = dialect.fulltext_match_sql("\"search\"", &spec, &query);
        assert_eq!(sql, "\"search\" LIKE '%hello%' AND \"search\" LIKE '%world%'");
    }

    #[test]
    fn negated_term_becomes_not_like() {
        let dialect = SqliteDialect;
        let spec = FullTextSpec {
            sources: vec![],
            language: "english".into(),
        };
        let query = FullTextQuery::plain("-banned", "english");
        let sql = dialect.fulltext_match_sql("\"search\"", &spec, &query);
        assert_eq!(sql, "\"search\" NOT LIKE '%banned%'");
    }

    #[test]
    fn rank_is_always_none() {
        let dialect = SqliteDialect;
        let spec = FullTextSpec {
            sources: vec![],
            language: "english".into(),
        };
        let query = FullTextQuery::plain("hello", "english");
        assert!(dialect.fulltext_rank_sql("\"search\"", &spec, &query, FieldFlags::empty()).is_none());
    }
}
