// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The low-level predicate shape shared by scheme-declared [`FieldView`]
//! membership expressions and the higher-level `Query` type built on top of
//! it in `stratum-core-api`.

use smol_str::SmolStr;

use crate::value::Value;

/// Comparison operators the translator (C6) knows how to lower to SQL.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    LessThan,
    LessOrEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    GreaterThan,
    /// `BETWEEN value1 AND value2`; `closed` controls whether both bounds
    /// are inclusive (`BETWEEN`) or the complementary exclusive form is
    /// requested via [`Comparison::NotBetween`].
    Between { closed: bool },
    NotBetween { closed: bool },
    /// Full-text match, lowered to `@@` on PostgreSQL.
    Includes,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

/// One `(field, op, value1, value2)` predicate, per spec.md §3.4.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldPredicate {
    pub field: SmolStr,
    pub op: Comparison,
    pub value1: Option<Value>,
    pub value2: Option<Value>,
}

impl FieldPredicate {
    #[must_use]
    pub fn new(field: impl Into<SmolStr>, op: Comparison, value1: Option<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value1,
            value2: None,
        }
    }

    #[must_use]
    pub fn between(field: impl Into<SmolStr>, lo: Value, hi: Value, closed: bool) -> Self {
        Self {
            field: field.into(),
            op: Comparison::Between { closed },
            value1: Some(lo),
            value2: Some(hi),
        }
    }

    #[must_use]
    pub fn is_null(field: impl Into<SmolStr>) -> Self {
        Self {
            field: field.into(),
            op: Comparison::IsNull,
            value1: None,
            value2: None,
        }
    }
}

/// A conjunction (AND) of field predicates. The translator resolves each
/// field against the target scheme; unresolvable fields are silently
/// dropped rather than raising an error, per spec.md §4.6 WHERE composition
/// rule 1 — this keeps caller-supplied filter trees safe against injection
/// via unexpected field names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predicate(pub Vec<FieldPredicate>);

impl Predicate {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn and(mut self, predicate: FieldPredicate) -> Self {
        self.0.push(predicate);
        self
    }
}

impl FromIterator<FieldPredicate> for Predicate {
    fn from_iter<T: IntoIterator<Item = FieldPredicate>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
