// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use smol_str::SmolStr;

/// One parsed full-text search token (spec.md §4.6). A leading `-` in the
/// caller's raw query text negates the term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchToken {
    pub term: String,
    pub negate: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchType {
    /// Space-separated terms, all required (`&`).
    Plain,
    /// Terms matched in sequence (`<->`).
    Phrase,
    /// Google-style free-form query syntax.
    WebSearch,
}

/// A full-text predicate against a `FullTextView` field: either a
/// pre-parsed token list or a raw string to be parsed by the backend
/// dialect's tokenizer.
#[derive(Clone, Debug, PartialEq)]
pub enum FullTextQuery {
    Tokens(Vec<SearchToken>),
    Raw {
        text: String,
        language: SmolStr,
        rank: bool,
        match_type: MatchType,
    },
}

impl FullTextQuery {
    #[must_use]
    pub fn plain(text: impl Into<String>, language: impl Into<SmolStr>) -> Self {
        Self::Raw {
            text: text.into(),
            language: language.into(),
            rank: true,
            match_type: MatchType::Plain,
        }
    }

    #[must_use]
    pub const fn wants_rank(&self) -> bool {
        matches!(self, Self::Raw { rank: true, .. } | Self::Tokens(_))
    }
}
