// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Storage-to-SQL translator (C6, spec.md §4.6) — the part of the worker
//! that turns a `(Scheme, Query)` pair into one composite statement built
//! through `stratum-sql`. Keyset pagination strategy selection, full-text
//! lowering and relation-list CTE emission all live here; everything else
//! about running a statement belongs to [`crate::worker`].

use smol_str::SmolStr;
use stratum_core::query::{Comparison as CoreComparison, FieldPredicate};
use stratum_core::schema::field::{FieldFlags, FieldKind};
use stratum_core::schema::{FieldSelector, Scheme};
use stratum_core::value::Value;
use stratum_core_api::query::{DeltaQuery, Query, RelationHop, Target};
use stratum_core_api::sorting::Ordering;
use stratum_sql::select::{JoinKind, WhereBuilder};
use stratum_sql::{quote_ident, quote_qualified, Builder, Finalized};

use crate::dialect::Dialect;
use crate::error::{RepoError, RepoResult};

/// How an `INSERT`'s conflict clause is resolved (spec.md §4.5 "Conflict
/// handling on INSERT").
#[derive(Clone, Debug)]
pub enum ConflictHandler {
    DoNothing { conflict_fields: Vec<SmolStr> },
    DoUpdate {
        conflict_fields: Vec<SmolStr>,
        set_fields: Vec<SmolStr>,
        condition: Option<String>,
    },
}

pub struct Translator<'s> {
    scheme: &'s Scheme,
    dialect: &'s dyn Dialect,
}

impl<'s> Translator<'s> {
    #[must_use]
    pub fn new(scheme: &'s Scheme, dialect: &'s dyn Dialect) -> Self {
        Self { scheme, dialect }
    }

    fn table(&self) -> String {
        self.scheme.name().to_owned()
    }

    /// Resolve `query.target` into the field predicates that restrict the
    /// row set, per spec.md §3.4's four target shapes.
    pub(crate) fn target_predicates(&self, target: &Target) -> RepoResult<Vec<FieldPredicate>> {
        match target {
            Target::Id(id) => Ok(vec![FieldPredicate::new("__oid", CoreComparison::Equal, Some(Value::Int(*id)))]),
            Target::Ids(ids) => Ok(vec![FieldPredicate::new(
                "__oid",
                CoreComparison::In,
                Some(Value::Array(ids.iter().copied().map(Value::Int).collect())),
            )]),
            Target::Alias(value) => {
                let (field, _) = self.scheme.alias_field().ok_or_else(|| {
                    RepoError::Bug(format!("scheme `{}` has no alias field to resolve Target::Alias", self.scheme.name()))
                })?;
                Ok(vec![FieldPredicate::new(field, CoreComparison::Equal, Some(value.clone()))])
            }
            Target::Predicate(predicate) => Ok(predicate.0.clone()),
        }
    }

    /// WHERE-composition rule 1 (silent drop on absent/relation field) and
    /// rule 3 (array-equality → `IN` rewrite), spec.md §4.6.
    fn apply_predicates(&self, mut builder: WhereBuilder, predicates: &[FieldPredicate]) -> WhereBuilder {
        for predicate in predicates {
            if predicate.field != "__oid" {
                match self.scheme.get_field(&predicate.field) {
                    None => continue,
                    Some(field) if field.kind.is_relation() => continue,
                    _ => {}
                }
            }
            let (op, value1) = match (predicate.op, &predicate.value1) {
                (CoreComparison::Equal, Some(Value::Array(_))) => (CoreComparison::In, predicate.value1.clone()),
                (CoreComparison::NotEqual, Some(Value::Array(_))) => (CoreComparison::NotIn, predicate.value1.clone()),
                _ => (predicate.op, predicate.value1.clone()),
            };
            let field_sql = quote_ident(&predicate.field);
            builder = builder.predicate(&field_sql, op, value1, predicate.value2.clone());
        }
        builder
    }

    /// The raw `@@`-style match expression for `query.fulltext`, if set, to
    /// be AND-ed into the WHERE clause as a raw fragment.
    fn fulltext_match_sql(&self, query: &Query) -> RepoResult<Option<String>> {
        let Some((field, fulltext)) = &query.fulltext else {
            return Ok(None);
        };
        let spec = self.fulltext_spec(field)?;
        let column_sql = quote_ident(field);
        Ok(Some(self.dialect.fulltext_match_sql(&column_sql, spec, fulltext)))
    }

    /// The rank expression for `query.fulltext`, aliased as
    /// `__ts_rank_{field}`, when the query asked for ranking and the
    /// backend supports it (spec.md §4.6; `None` on SQLite's FTS stub).
    fn fulltext_rank_projection(&self, query: &Query) -> RepoResult<Option<(String, String)>> {
        let Some((field, fulltext)) = &query.fulltext else {
            return Ok(None);
        };
        if !fulltext.wants_rank() {
            return Ok(None);
        }
        let spec = self.fulltext_spec(field)?;
        let column_sql = quote_ident(field);
        let flags = self
            .scheme
            .get_field(field)
            .map(|f| f.flags)
            .unwrap_or(FieldFlags::empty());
        let Some(rank_sql) = self.dialect.fulltext_rank_sql(&column_sql, spec, fulltext, flags) else {
            return Ok(None);
        };
        let alias = format!("__ts_rank_{field}");
        Ok(Some((alias, rank_sql)))
    }

    fn fulltext_spec(&self, field: &str) -> RepoResult<&'s stratum_core::schema::field::FullTextSpec> {
        match self.scheme.get_field(field).map(|f| &f.kind) {
            Some(FieldKind::FullTextView(spec)) => Ok(spec),
            _ => Err(RepoError::Bug(format!(
                "field `{field}` is not a FullTextView on scheme `{}`",
                self.scheme.name()
            ))),
        }
    }

    fn projection(&self, selector: &FieldSelector, query: &Query) -> RepoResult<Vec<String>> {
        let mut fields = vec![quote_ident("__oid")];
        for name in selector.resolve(self.scheme) {
            fields.push(quote_ident(&name));
        }
        if let Some((alias, rank_sql)) = self.fulltext_rank_projection(query)? {
            fields.push(format!("{rank_sql} AS {}", quote_ident(&alias)));
        }
        Ok(fields)
    }

    fn apply_ordering(&self, mut body: stratum_sql::select::SelectBody, ordering: &[Ordering]) -> stratum_sql::select::SelectBody {
        for (i, clause) in ordering.iter().enumerate() {
            let nulls_last = clause.nulls.map(|n| matches!(n, stratum_core_api::sorting::NullsOrder::Last));
            if i == 0 {
                body = body.order_by(&clause.field, clause.direction.is_ascending(), nulls_last);
            } else {
                body = body.then_order_by(&clause.field, clause.direction.is_ascending(), nulls_last);
            }
        }
        body
    }

    /// `Worker::select`/`Worker::get` (spec.md §4.5): the main row query,
    /// including keyset pagination, full-text and relation-list
    /// composition.
    pub fn select(&self, query: &Query, selector: &FieldSelector) -> RepoResult<Finalized> {
        if let Some(delta) = query.delta.as_ref() {
            if let Some((owner, field)) = &delta.view {
                return self.select_view_delta(query, selector, delta, owner, field);
            }
        }

        let base_predicates = match &query.target {
            Some(target) => self.target_predicates(target)?,
            None => Vec::new(),
        };
        let fulltext_match = self.fulltext_match_sql(query)?;
        let mut fields = self.projection(selector, query)?;

        if let Some(soft_limit) = &query.soft_limit {
            return self.select_keyset(query, &fields, &base_predicates, fulltext_match.as_deref(), soft_limit);
        }

        let table = self.table();
        let delta_cte = query.delta.as_ref().map(|delta| self.delta_aggregate_cte(delta));
        if delta_cte.is_some() {
            let d = quote_ident("d");
            fields.push(format!("{} AS {}", quote_qualified(&d, "action"), quote_ident("__d_action")));
            fields.push(format!("{} AS {}", quote_qualified(&d, "time"), quote_ident("__d_time")));
            fields.push(format!("{} AS {}", quote_qualified(&d, "object"), quote_ident("__d_object")));
        }

        let mut prologue = Builder::new();
        if let Some(cte) = &delta_cte {
            prologue = prologue.with("d", cte);
        }
        let has_condition = !base_predicates.is_empty() || fulltext_match.is_some();
        let mut body = prologue.select().fields_raw(&fields).from(&table);
        if delta_cte.is_some() {
            let on_sql = format!("{} = {}", quote_qualified(&quote_ident("d"), "object"), quote_qualified(&quote_ident(&table), "__oid"));
            body = body.join(JoinKind::Left, "d", &on_sql);
        }
        if has_condition {
            let fulltext_match = fulltext_match.clone();
            body = body.where_with(|w| {
                let w = self.apply_predicates(w, &base_predicates);
                match &fulltext_match {
                    Some(sql) => w.raw(sql),
                    None => w,
                }
            });
        }

        let mut ordering = query.ordering.clone();
        if ordering.is_empty() {
            if let Some((alias, _)) = self.fulltext_rank_projection(query)? {
                body = body.order_by_raw(&quote_ident(&alias), false);
            }
        } else {
            body = self.apply_ordering(body, &ordering);
        }
        ordering.clear();

        if query.outer_pagination_applies() {
            if let Some(limit) = query.pagination.limit {
                body = body.limit(limit);
            }
            if let Some(offset) = query.pagination.offset {
                body = body.offset(offset);
            }
        }
        if query.for_update {
            body = body.for_update();
        }
        Ok(body.finalize())
    }

    /// The three keyset strategies of spec.md §4.6: scalar oid order,
    /// unique-indexed column, and the non-unique/FTS CTE form that
    /// preserves ties across the page boundary.
    fn select_keyset(
        &self,
        query: &Query,
        fields: &[String],
        base_predicates: &[FieldPredicate],
        fulltext_match: Option<&str>,
        soft_limit: &stratum_core_api::pagination::SoftLimit,
    ) -> RepoResult<Finalized> {
        let table = self.table();
        let direct = soft_limit.field == "__oid"
            || self
                .scheme
                .get_field(&soft_limit.field)
                .is_some_and(|f| f.flags.contains(FieldFlags::UNIQUE) && !matches!(f.kind, FieldKind::FullTextView(_)));

        if direct {
            let mut predicates = base_predicates.to_vec();
            if let Some(last) = &soft_limit.last_value {
                predicates.push(FieldPredicate::new(
                    soft_limit.field.clone(),
                    soft_limit.direction.keyset_comparison(),
                    Some(last.clone()),
                ));
            }
            let has_condition = !predicates.is_empty() || fulltext_match.is_some();
            let mut body = Builder::new().select().fields_raw(fields).from(&table);
            if has_condition {
                body = body.where_with(|w| {
                    let w = self.apply_predicates(w, &predicates);
                    match fulltext_match {
                        Some(sql) => w.raw(sql),
                        None => w,
                    }
                });
            }
            body = body.order_by(&soft_limit.field, soft_limit.direction.is_ascending(), None);
            body = body.limit(soft_limit.limit);
            if query.for_update {
                body = body.for_update();
            }
            return Ok(body.finalize());
        }

        // Non-unique or full-text ordering column: emit a keyset CTE and
        // widen the outer query with an extremum-match OR branch so ties
        // sitting right on the page boundary are never dropped.
        let is_rank_order = matches!(
            self.scheme.get_field(&soft_limit.field).map(|f| &f.kind),
            Some(FieldKind::FullTextView(_))
        );
        // `compare_sql` is the raw expression the tie-break predicate and
        // the outer extremum comparison evaluate against; unlike a SELECT
        // alias (which only ORDER BY may reference) it's valid anywhere.
        let compare_sql = if is_rank_order {
            self.fulltext_rank_projection(query)?
                .ok_or_else(|| RepoError::Bug(format!("soft-limit field `{}` has no rank expression", soft_limit.field)))?
                .1
        } else {
            quote_ident(&soft_limit.field)
        };
        const KEYSET_RANK_ALIAS: &str = "__keyset_rank";

        let mut inner_fields = vec![quote_ident("__oid")];
        if is_rank_order {
            inner_fields.push(format!("{compare_sql} AS {}", quote_ident(KEYSET_RANK_ALIAS)));
        } else {
            inner_fields.push(compare_sql.clone());
        }

        let mut inner_predicates = base_predicates.to_vec();
        if !is_rank_order {
            if let Some(last) = &soft_limit.last_value {
                inner_predicates.push(FieldPredicate::new(
                    soft_limit.field.clone(),
                    soft_limit.direction.keyset_comparison(),
                    Some(last.clone()),
                ));
            }
        }
        let inner_has_condition = !inner_predicates.is_empty() || fulltext_match.is_some() || (is_rank_order && soft_limit.last_value.is_some());
        let mut inner = Builder::new().select().fields_raw(&inner_fields).from(&table);
        if inner_has_condition {
            inner = inner.where_with(|w| {
                let w = self.apply_predicates(w, &inner_predicates);
                let w = match fulltext_match {
                    Some(sql) => w.raw(sql),
                    None => w,
                };
                if is_rank_order {
                    if let Some(last) = &soft_limit.last_value {
                        return w.predicate(&compare_sql, soft_limit.direction.keyset_comparison(), Some(last.clone()), None);
                    }
                }
                w
            });
        }
        let inner_order_ref = if is_rank_order { quote_ident(KEYSET_RANK_ALIAS) } else { compare_sql.clone() };
        inner = inner.order_by_raw(&inner_order_ref, soft_limit.direction.is_ascending());
        inner = inner.limit(soft_limit.limit);
        let inner_finalized = inner.finalize();

        let agg = if soft_limit.direction.is_ascending() { "MAX" } else { "MIN" };
        let u = quote_ident("u");
        let tie_expr = format!(
            "(\"__oid\" IN (SELECT \"__oid\" FROM {u}) OR {compare_sql} = (SELECT {agg}({inner_order_ref}) FROM {u}))",
        );

        let mut outer = Builder::new()
            .with("u", &inner_finalized)
            .select()
            .fields_raw(fields)
            .from(&table)
            .where_with(|w| {
                let w = self.apply_predicates(w, base_predicates);
                let w = match fulltext_match {
                    Some(sql) => w.raw(sql),
                    None => w,
                };
                w.raw(&tie_expr)
            });
        outer = outer.order_by_raw(&compare_sql, soft_limit.direction.is_ascending());
        if query.for_update {
            outer = outer.for_update();
        }
        Ok(outer.finalize())
    }

    /// Stage 1 of the two-stage delta-join CTE (spec.md §4.6 "Delta
    /// queries"): the most recent delta row per object since `delta.since`,
    /// aggregated by `MAX(time)`/`MAX(action)`. `select` right-joins this
    /// (as a `LEFT JOIN` with the scheme table on the left, which keeps the
    /// same row set) onto the scheme's own rows to expose
    /// `__d_action`/`__d_time`/`__d_object`.
    fn delta_aggregate_cte(&self, delta: &DeltaQuery) -> Finalized {
        let delta_table = format!("__delta_{}", self.scheme.name());
        self.delta_cte_from(&delta_table, delta, true)
    }

    /// One row per changed object since `delta.since`, latest action/time
    /// wins (spec.md §4.6 "Delta queries"). `with_action` is `false` for a
    /// `View` field's own delta table, which has no `action` column — a
    /// view's delta audit only ever records membership being added; a
    /// removal is reflected as a `__vid == 0` tombstone on the live join
    /// row instead, never as a second delta entry.
    fn delta_cte_from(&self, delta_table: &str, delta: &DeltaQuery, with_action: bool) -> Finalized {
        let mut fields = vec![
            quote_ident("object"),
            format!("MAX({}) AS {}", quote_ident("time"), quote_ident("time")),
        ];
        if with_action {
            fields.push(format!("MAX({}) AS {}", quote_ident("action"), quote_ident("action")));
        }
        Builder::new()
            .select()
            .fields_raw(&fields)
            .from(delta_table)
            .where_with(|w| {
                w.predicate(
                    &quote_ident("time"),
                    CoreComparison::GreaterThan,
                    Some(Value::Int(delta.since.timestamp_micros())),
                    None,
                )
            })
            .group_by(&["object"])
            .order_by("time", false, None)
            .finalize()
    }

    /// `Worker::select` against a `View` field's membership history
    /// (spec.md §4.6 scenario 4): driven from the view's own join table
    /// rather than the target scheme's table, so a member whose row has
    /// since been deleted still surfaces — as a `__vid == 0` tombstone
    /// (spec.md §4.2) rather than disappearing outright. `query.target`
    /// is `Target::Id(owner_oid)`: the owning row whose view field is
    /// being inspected, not a predicate against `self.scheme`.
    fn select_view_delta(&self, query: &Query, selector: &FieldSelector, delta: &DeltaQuery, owner: &str, field: &str) -> RepoResult<Finalized> {
        let owner_oid = match &query.target {
            Some(Target::Id(id)) => *id,
            _ => {
                return Err(RepoError::Bug(
                    "a View delta query requires Target::Id(owner_oid)".to_owned(),
                ))
            }
        };
        let view_table = format!("{owner}_f_{field}_view");
        let delta_table = format!("{owner}_f_{field}_delta");
        let target_table = self.table();

        let mut fields = vec![format!(
            "{} AS {}",
            quote_qualified(&quote_ident(&target_table), "__oid"),
            quote_ident("__oid")
        )];
        for name in selector.resolve(self.scheme) {
            fields.push(format!("{} AS {}", quote_qualified(&quote_ident(&target_table), &name), quote_ident(&name)));
        }
        fields.push(format!(
            "{} AS {}",
            quote_qualified(&quote_ident(&view_table), "__vid"),
            quote_ident("__vid")
        ));

        let cte = self.delta_cte_from(&delta_table, delta, false);
        let d = quote_ident("d");
        fields.push(format!("{} AS {}", quote_qualified(&d, "time"), quote_ident("__d_time")));
        fields.push(format!("{} AS {}", quote_qualified(&d, "object"), quote_ident("__d_object")));

        let target_on = format!(
            "{} = {}",
            quote_qualified(&quote_ident(&target_table), "__oid"),
            quote_qualified(&quote_ident(&view_table), "child_id")
        );
        let delta_on = format!(
            "{} = {}",
            quote_qualified(&d, "object"),
            quote_qualified(&quote_ident(&view_table), "child_id")
        );

        let mut body = Builder::new()
            .with("d", &cte)
            .select()
            .fields_raw(&fields)
            .from(&view_table)
            .join(JoinKind::Left, &target_table, &target_on)
            .join(JoinKind::Left, "d", &delta_on)
            .where_with(|w| w.predicate(&quote_qualified(&quote_ident(&view_table), "parent_id"), CoreComparison::Equal, Some(Value::Int(owner_oid)), None));

        if !query.ordering.is_empty() {
            body = self.apply_ordering(body, &query.ordering);
        }
        if query.outer_pagination_applies() {
            if let Some(limit) = query.pagination.limit {
                body = body.limit(limit);
            }
            if let Some(offset) = query.pagination.offset {
                body = body.offset(offset);
            }
        }
        Ok(body.finalize())
    }

    /// `Worker::count` (spec.md §4.5): `SELECT COUNT(*)` over the same
    /// predicate set `select` would use, ignoring ordering/pagination.
    pub fn count(&self, query: &Query) -> RepoResult<Finalized> {
        let table = self.table();
        let predicates = match &query.target {
            Some(target) => self.target_predicates(target)?,
            None => Vec::new(),
        };
        let fulltext_match = self.fulltext_match_sql(query)?;
        let has_condition = !predicates.is_empty() || fulltext_match.is_some();
        let mut body = Builder::new()
            .select()
            .fields_raw(&[format!("COUNT(*) AS {}", quote_ident("__count"))])
            .from(&table);
        if has_condition {
            body = body.where_with(|w| {
                let w = self.apply_predicates(w, &predicates);
                match &fulltext_match {
                    Some(sql) => w.raw(sql),
                    None => w,
                }
            });
        }
        Ok(body.finalize())
    }

    /// `INSERT INTO scheme (...) VALUES (...) [ON CONFLICT ...] RETURNING
    /// ...` (spec.md §4.5).
    pub fn insert(&self, columns: &[(SmolStr, Value)], conflict: Option<&ConflictHandler>, returning: &[&str]) -> Finalized {
        let table = self.table();
        let field_names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        let values: Vec<Value> = columns.iter().map(|(_, value)| value.clone()).collect();
        let values_stage = Builder::new().insert_into(&table).fields(&field_names).values_tuple(&values);
        let body = match conflict {
            None => values_stage.returning(returning),
            Some(ConflictHandler::DoNothing { conflict_fields }) => {
                let fields: Vec<&str> = conflict_fields.iter().map(SmolStr::as_str).collect();
                values_stage.on_conflict_do_nothing(&fields).returning(returning)
            }
            Some(ConflictHandler::DoUpdate {
                conflict_fields,
                set_fields,
                condition,
            }) => {
                let conflict: Vec<&str> = conflict_fields.iter().map(SmolStr::as_str).collect();
                let set: Vec<&str> = set_fields.iter().map(SmolStr::as_str).collect();
                values_stage
                    .on_conflict_do_update(&conflict, &set, condition.as_deref())
                    .returning(returning)
            }
        };
        body.finalize()
    }

    /// `UPDATE scheme SET ... WHERE ... RETURNING ...` (spec.md §4.5).
    pub fn update(&self, target: &Target, patch: &[(SmolStr, Value)], returning: &[&str]) -> RepoResult<Finalized> {
        let table = self.table();
        let mut stage = Builder::new().update(&table);
        for (field, value) in patch {
            stage = stage.set(field, value.clone());
        }
        let predicates = self.target_predicates(target)?;
        let body = stage.where_with(|w| self.apply_predicates(w, &predicates)).returning(returning);
        Ok(body.finalize())
    }

    /// Bump `updated_at` in place without touching any other column
    /// (`Worker::touch`, spec.md §4.5).
    pub fn touch(&self, target: &Target, updated_at_field: &str, now_micros: i64) -> RepoResult<Finalized> {
        let table = self.table();
        let stage = Builder::new().update(&table).set(updated_at_field, Value::Int(now_micros));
        let predicates = self.target_predicates(target)?;
        let body = stage.where_with(|w| self.apply_predicates(w, &predicates));
        Ok(body.finalize())
    }

    /// `DELETE FROM scheme WHERE ...` (spec.md §4.5).
    pub fn delete(&self, target: &Target) -> RepoResult<Finalized> {
        let table = self.table();
        let predicates = self.target_predicates(target)?;
        let body = Builder::new()
            .delete_from(&table)
            .where_with(|w| self.apply_predicates(w, &predicates))
            .returning(&["__oid"]);
        Ok(body.finalize())
    }

    /// One CTE per hop of a [`RelationHop`] chain (spec.md §4.6 "Relation
    /// traversal"): narrows `previous_cte`'s id set by following one
    /// relation field, so hop `i + 1` treats hop `i`'s result as its own
    /// seed. `source_table` is the scheme the hop starts from (only needed
    /// to re-read an `Object` field's value, since `previous_cte` carries
    /// ids, not column values); `join_table` is the many-to-many or view
    /// side table backing `SetReference`/`View`.
    pub fn relation_hop_cte(previous_cte: &str, hop: &RelationHop, source_table: &str, join_table: Option<&str>, target_table: &str, reverse_fk_field: Option<&str>) -> RepoResult<Finalized> {
        let target = quote_ident(target_table);
        let prev_id = quote_qualified(&quote_ident(previous_cte), "id");
        let finalized = match hop {
            RelationHop::Object { field } => {
                let source = quote_ident(source_table);
                let on_prev = format!("{} = {}", quote_qualified(&source, "__oid"), prev_id);
                let on_target = format!("{} = {}", quote_qualified(&target, "__oid"), quote_qualified(&source, field));
                Builder::new()
                    .select()
                    .fields_raw(&[format!("{} AS {}", quote_qualified(&target, "__oid"), quote_ident("id"))])
                    .from(previous_cte)
                    .join(JoinKind::Inner, source_table, &on_prev)
                    .join(JoinKind::Inner, target_table, &on_target)
                    .finalize()
            }
            RelationHop::SetReference { .. } => {
                let join = join_table.ok_or_else(|| RepoError::Bug("SetReference hop requires a join table".to_owned()))?;
                let on = format!("{} = {}", quote_qualified(&quote_ident(join), "parent_id"), prev_id);
                Builder::new()
                    .select()
                    .fields_raw(&[format!(
                        "DISTINCT {} AS {}",
                        quote_qualified(&quote_ident(join), "child_id"),
                        quote_ident("id")
                    )])
                    .from(previous_cte)
                    .join(JoinKind::Inner, join, &on)
                    .finalize()
            }
            RelationHop::SetReverse { .. } => {
                let fk = reverse_fk_field.unwrap_or("parent_id");
                let on = format!("{} = {}", quote_qualified(&target, fk), prev_id);
                Builder::new()
                    .select()
                    .fields_raw(&[format!("{} AS {}", quote_qualified(&target, "__oid"), quote_ident("id"))])
                    .from(previous_cte)
                    .join(JoinKind::Inner, target_table, &on)
                    .finalize()
            }
            RelationHop::View { .. } => {
                let join = join_table.ok_or_else(|| RepoError::Bug("View hop requires its materialisation table".to_owned()))?;
                let on = format!("{} = {}", quote_qualified(&quote_ident(join), "parent_id"), prev_id);
                Builder::new()
                    .select()
                    .fields_raw(&[format!(
                        "DISTINCT {} AS {}",
                        quote_qualified(&quote_ident(join), "child_id"),
                        quote_ident("id")
                    )])
                    .from(previous_cte)
                    .join(JoinKind::Inner, join, &on)
                    .where_with(|w| w.predicate(&quote_qualified(&quote_ident(join), "__vid"), CoreComparison::NotEqual, Some(Value::Int(0)), None))
                    .finalize()
            }
        };
        Ok(finalized)
    }

    /// A single-row seed CTE for the first hop of a [`RelationHop`] chain:
    /// the root scheme's own matching oids, under the same `id` column
    /// name every subsequent hop CTE emits.
    pub fn relation_seed_cte(&self, target: &Target) -> RepoResult<Finalized> {
        let predicates = self.target_predicates(target)?;
        let table = self.table();
        let has_condition = !predicates.is_empty();
        let mut body = Builder::new()
            .select()
            .fields_raw(&[format!("{} AS {}", quote_qualified(&quote_ident(&table), "__oid"), quote_ident("id"))])
            .from(&table);
        if has_condition {
            body = body.where_with(|w| self.apply_predicates(w, &predicates));
        }
        Ok(body.finalize())
    }

    /// The terminal projection of a relation-hop chain (spec.md §4.6
    /// "Relation traversal"): the final scheme's own rows joined against
    /// the last hop's id CTE, or — when `id_only` — just that CTE's ids,
    /// stopping one step short of reading the final scheme's table at all.
    /// `builder` already carries the seed CTE plus one per hop (`Worker::
    /// select_list` accumulates them via repeated `.with(...)`); this only
    /// appends the terminal `SELECT`.
    pub fn select_from_hop_cte(&self, builder: Builder, last_cte: &str, selector: &FieldSelector, query: &Query) -> RepoResult<Finalized> {
        if query.id_only {
            return Ok(builder
                .select()
                .fields_raw(&[format!("{} AS {}", quote_qualified(&quote_ident(last_cte), "id"), quote_ident("__oid"))])
                .from(last_cte)
                .finalize());
        }
        let table = self.table();
        let mut fields = self.projection(selector, query)?;
        for field in &mut fields {
            // `projection` emits table-unqualified names; qualify against
            // the scheme's own table since the final FROM now also carries
            // the hop CTE's `id` column.
            if let Some(rest) = field.strip_prefix('"') {
                *field = quote_qualified(&quote_ident(&table), rest.trim_end_matches('"'));
            }
        }
        let on = format!("{} = {}", quote_qualified(&quote_ident(&table), "__oid"), quote_qualified(&quote_ident(last_cte), "id"));
        let mut body = builder.select().fields_raw(&fields).from(last_cte).join(JoinKind::Inner, &table, &on);
        if !query.ordering.is_empty() {
            body = self.apply_ordering(body, &query.ordering);
        }
        if query.outer_pagination_applies() {
            if let Some(limit) = query.pagination.limit {
                body = body.limit(limit);
            }
            if let Some(offset) = query.pagination.offset {
                body = body.offset(offset);
            }
        }
        Ok(body.finalize())
    }
}
