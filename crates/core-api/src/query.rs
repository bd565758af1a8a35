// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use smol_str::SmolStr;
use stratum_core::query::Predicate;
use stratum_core::value::Value;

use crate::fulltext::FullTextQuery;
use crate::pagination::{Pagination, SoftLimit};
use crate::sorting::Ordering;

/// How the rows a query operates on are selected (spec.md §3.4).
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Id(stratum_core::RecordId),
    Ids(Vec<stratum_core::RecordId>),
    Alias(Value),
    Predicate(Predicate),
}

impl Target {
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self, Self::Id(_) | Self::Alias(_))
    }
}

/// A delta-since request against a scheme's (or view's) audit table
/// (spec.md §4.6 "Delta queries").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaQuery {
    pub since: stratum_core::util::clock::DateTime,
    /// Set when the delta join targets a `View` field's own
    /// `{owner}_f_{field}_view`/`_delta` tables rather than the queried
    /// scheme's own `__delta_{scheme}` table — `(owner scheme, field)`.
    /// The translator must then be bound to the view's *target* scheme, so
    /// `__oid` lines up with the view table's `child_id`.
    pub view: Option<(SmolStr, SmolStr)>,
}

impl DeltaQuery {
    #[must_use]
    pub fn since(since: stratum_core::util::clock::DateTime) -> Self {
        Self { since, view: None }
    }

    #[must_use]
    pub fn for_view(since: stratum_core::util::clock::DateTime, owner: impl Into<SmolStr>, field: impl Into<SmolStr>) -> Self {
        Self {
            since,
            view: Some((owner.into(), field.into())),
        }
    }
}

/// One hop of a [`QueryList`] relation traversal (spec.md §4.6).
#[derive(Clone, Debug, PartialEq)]
pub enum RelationHop {
    /// Follow an `Object` field to its target scheme.
    Object { field: SmolStr },
    /// Follow a `Set` field whose membership is stored in a join table.
    SetReference { field: SmolStr },
    /// Follow a `Set` field whose membership is the reverse side of a
    /// foreign key on the target scheme.
    SetReverse { field: SmolStr },
    /// Follow a `View` field to its materialisation table.
    View { field: SmolStr },
}

/// A chain of relation hops starting from some scheme, each carrying the
/// subquery to apply once the translator arrives at that hop's target
/// (spec.md §4.6 `(scheme, field-into-next, subquery)` list).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryList {
    pub hops: Vec<(RelationHop, Query)>,
}

impl QueryList {
    #[must_use]
    pub const fn new() -> Self {
        Self { hops: Vec::new() }
    }

    #[must_use]
    pub fn then(mut self, hop: RelationHop, subquery: Query) -> Self {
        self.hops.push((hop, subquery));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// The full request shape a [`Worker`](../../stratum_repo/trait.Worker.html)
/// translates into a single composite SQL statement (spec.md §3.4).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub target: Option<Target>,
    pub ordering: Vec<Ordering>,
    pub pagination: Pagination,
    pub soft_limit: Option<SoftLimit>,
    pub delta: Option<DeltaQuery>,
    pub include_fields: Vec<SmolStr>,
    pub exclude_fields: Vec<SmolStr>,
    pub resolve_depth: u32,
    pub for_update: bool,
    pub id_only: bool,
    /// A full-text predicate against a `FullTextView` field (spec.md §4.6
    /// "Full-text"), kept separate from `target`'s plain field predicates
    /// since it carries its own tokenisation/ranking shape rather than a
    /// `(op, value1, value2)` triple.
    pub fulltext: Option<(SmolStr, FullTextQuery)>,
}

impl Query {
    #[must_use]
    pub fn new(target: Target) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.ordering.push(ordering);
        self
    }

    #[must_use]
    pub const fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    #[must_use]
    pub fn with_soft_limit(mut self, soft_limit: SoftLimit) -> Self {
        self.soft_limit = Some(soft_limit);
        self
    }

    #[must_use]
    pub fn with_delta(mut self, delta: DeltaQuery) -> Self {
        self.delta = Some(delta);
        self
    }

    #[must_use]
    pub const fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    #[must_use]
    pub const fn id_only(mut self) -> Self {
        self.id_only = true;
        self
    }

    #[must_use]
    pub fn with_fulltext(mut self, field: impl Into<SmolStr>, query: FullTextQuery) -> Self {
        self.fulltext = Some((field.into(), query));
        self
    }

    /// Whether LIMIT/OFFSET belong on the outer statement. When a soft-limit
    /// cursor is in play the translator enforces LIMIT inside the keyset CTE
    /// instead (spec.md §4.6 "Ordering & LIMIT").
    #[must_use]
    pub const fn outer_pagination_applies(&self) -> bool {
        self.soft_limit.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_limit_suppresses_outer_pagination() {
        let query = Query::new(Target::Id(1))
            .with_pagination(Pagination {
                limit: Some(20),
                offset: None,
            })
            .with_soft_limit(SoftLimit::first_page(
                "name",
                crate::sorting::SortDirection::Ascending,
                20,
            ));
        assert!(!query.outer_pagination_applies());
    }

    #[test]
    fn query_list_accumulates_hops() {
        let list = QueryList::new()
            .then(
                RelationHop::Object {
                    field: "owner".into(),
                },
                Query::new(Target::Id(1)),
            )
            .then(
                RelationHop::SetReverse {
                    field: "members".into(),
                },
                Query::new(Target::Id(2)),
            );
        assert_eq!(list.hops.len(), 2);
        assert!(!list.is_empty());
    }
}
