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

//! PostgreSQL [`Dialect`](stratum_repo::dialect::Dialect) (spec.md §4.6
//! "Full-text"): `to_tsvector`/`to_tsquery`/`ts_rank` with the normalisation
//! variant selected by the field's `TS_NORM_*` flags.

use stratum_core::schema::field::{FieldFlags, FullTextSpec};
use stratum_core_api::fulltext::{FullTextQuery, MatchType};
use stratum_driver::BackendKind;
use stratum_repo::dialect::{escape_literal, query_text, Dialect};

/// `ts_rank`'s normalisation bitmask argument (`postgres` FTS docs §12.3.3),
/// assembled from whichever `TS_NORM_*` [`FieldFlags`] the field declares.
/// Flags combine by simple addition, matching Postgres' own documented
/// semantics for passing multiple normalisation options at once.
fn rank_normalization(flags: FieldFlags) -> u32 {
    let mut norm = 0;
    if flags.contains(FieldFlags::TS_NORM_DOC_LENGTH) {
        norm += 2;
    }
    if flags.contains(FieldFlags::TS_NORM_DOC_LENGTH_LOG) {
        norm += 1;
    }
    if flags.contains(FieldFlags::TS_NORM_UNIQUE_WORDS) {
        norm += 8;
    }
    if flags.contains(FieldFlags::TS_NORM_UNIQUE_WORDS_LOG) {
        norm += 16;
    }
    norm
}

fn tsquery_sql(language: &str, query: &FullTextQuery) -> String {
    let lang = escape_literal(language);
    match query {
        FullTextQuery::Raw {
            match_type: MatchType::WebSearch,
            text,
            ..
        } => format!("websearch_to_tsquery('{lang}', '{}')", escape_literal(text)),
        FullTextQuery::Raw {
            match_type: MatchType::Phrase,
            text,
            ..
        } => format!("phraseto_tsquery('{lang}', '{}')", escape_literal(text)),
        FullTextQuery::Raw {
            match_type: MatchType::Plain,
            text,
            ..
        } => format!("plainto_tsquery('{lang}', '{}')", escape_literal(text)),
        FullTextQuery::Tokens(_) => format!("to_tsquery('{lang}', '{}')", escape_literal(&query_text(query))),
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct PgsqlDialect;

impl Dialect for PgsqlDialect {
    fn backend(&self) -> BackendKind {
        BackendKind::Pgsql
    }

    fn fulltext_match_sql(&self, column_sql: &str, spec: &FullTextSpec, query: &FullTextQuery) -> String {
        format!("{column_sql} @@ {}", tsquery_sql(&spec.language, query))
    }

    fn fulltext_rank_sql(&self, column_sql: &str, spec: &FullTextSpec, query: &FullTextQuery, flags: FieldFlags) -> Option<String> {
        if !query.wants_rank() {
            return None;
        }
        let norm = rank_normalization(flags);
        Some(format!(
            "ts_rank({column_sql}, {}, {norm})",
            tsquery_sql(&spec.language, query)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core_api::fulltext::SearchToken;

    #[test]
    fn plain_query_uses_plainto_tsquery() {
        let dialect = PgsqlDialect;
        let spec = FullTextSpec {
            sources: vec!["title".into()],
            language: "english".into(),
        };
        let query = FullTextQuery::plain("hello world", "english");
        let sql = dialect.fulltext_match_sql("\"search\"", &spec, &query);
        assert_eq!(sql, "\"search\" @@ plainto_tsquery('english', 'hello world')");
    }

    #[test]
    fn rank_expression_combines_normalisation_flags() {
        let dialect = PgsqlDialect;
        let spec = FullTextSpec {
            sources: vec![],
            language: "english".into(),
        };
        let query = FullTextQuery::Tokens(vec![SearchToken {
            term: "alpha".to_owned(),
            negate: false,
        }]);
        let flags = FieldFlags::TS_NORM_DOC_LENGTH | FieldFlags::TS_NORM_UNIQUE_WORDS;
        let sql = dialect.fulltext_rank_sql("\"search\"", &spec, &query, flags).unwrap();
        assert!(sql.starts_with("ts_rank(\"search\", to_tsquery('english', 'alpha'), 10)"));
    }

    #[test]
    fn unranked_query_yields_no_rank_expression() {
        let dialect = PgsqlDialect;
        let spec = FullTextSpec {
            sources: vec![],
            language: "english".into(),
        };
        let query = FullTextQuery::Raw {
            text: "alpha".to_owned(),
            language: "english".into(),
            rank: false,
            match_type: MatchType::Plain,
        };
        assert!(dialect.fulltext_rank_sql("\"search\"", &spec, &query, FieldFlags::empty()).is_none());
    }
}
