// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub const fn is_ascending(self) -> bool {
        matches!(self, Self::Ascending)
    }

    /// The comparison operator a soft-limit cursor uses against the "last
    /// seen" value: `>` when paging forward in ascending order, `<` when
    /// paging forward in descending order (spec.md §4.6).
    #[must_use]
    pub const fn keyset_comparison(self) -> stratum_core::query::Comparison {
        use stratum_core::query::Comparison;
        match self {
            Self::Ascending => Comparison::GreaterThan,
            Self::Descending => Comparison::LessThan,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    /// Default placement when ordering by a ranked full-text expression:
    /// `LAST` for descending (spec.md §4.6).
    #[must_use]
    pub const fn default_for(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Descending => Self::Last,
            SortDirection::Ascending => Self::First,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ordering {
    pub field: smol_str::SmolStr,
    pub direction: SortDirection,
    pub nulls: Option<NullsOrder>,
}

impl Ordering {
    #[must_use]
    pub fn new(field: impl Into<smol_str::SmolStr>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
            nulls: None,
        }
    }
}
