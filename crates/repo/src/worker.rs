// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The worker (C5, spec.md §4.5): binds a [`Scheme`] to a live
//! [`Transaction`] and exposes the CRUD surface every storage façade method
//! ultimately calls. Translates requests through [`Translator`] (C6),
//! decodes rows through [`Cursor`] (C2), and applies the access-role and
//! hook machinery declared on the scheme (C4) along the way.

use std::collections::VecDeque;

use smol_str::SmolStr;
use stratum_core::query::{Comparison as CoreComparison, FieldPredicate, Predicate};
use stratum_core::schema::field::{Field, FieldKind};
use stratum_core::schema::hook::HookContext;
use stratum_core::schema::registry::SchemeRegistry;
use stratum_core::schema::role::{AccessPolicy, AccessRole, RolePredicate};
use stratum_core::schema::{FieldSelector, Scheme};
use stratum_core::value::{Dict, Value};
use stratum_core::RecordId;
use stratum_core_api::query::{Query, QueryList, RelationHop, Target};
use stratum_driver::{ColumnValue, Connection, DriverResult, ParamValue, StepOutcome};
use stratum_sql::{quote_ident, Builder, Finalized};

use crate::context;
use crate::cursor::Cursor;
use crate::dialect::Dialect;
use crate::error::{RepoError, RepoResult};
use crate::transaction::Transaction;
use crate::translator::{ConflictHandler, Translator};

/// Rows fetched from one statement, column names plus raw cells, kept
/// together so a [`Cursor`] can be built over any of them after the fact.
struct QueryRows {
    names: Vec<String>,
    data: Vec<Vec<ColumnValue>>,
}

impl QueryRows {
    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn decode_all(self, decode: impl Fn(&Cursor<'_>) -> RepoResult<Value>) -> RepoResult<Vec<Value>> {
        let names = self.names;
        self.data
            .into_iter()
            .map(|cells| decode(&Cursor::new(stratum_driver::Row::new(&names, cells))))
            .collect()
    }

    fn decode_first(self, decode: impl Fn(&Cursor<'_>) -> RepoResult<Value>) -> RepoResult<Option<Value>> {
        let names = self.names;
        match self.data.into_iter().next() {
            Some(cells) => decode(&Cursor::new(stratum_driver::Row::new(&names, cells))).map(Some),
            None => Ok(None),
        }
    }

    fn first_i64(&self, column: &str) -> Option<i64> {
        let index = self.names.iter().position(|n| n == column)?;
        match self.data.first()?.get(index)? {
            ColumnValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// Execute `finalized` against `txn`'s connection, logging per spec.md §3.6
/// and sticking the transaction into sticky-rollback on a driver failure.
fn run_statement<C: Connection>(txn: &mut Transaction<C>, finalized: &Finalized) -> RepoResult<QueryRows> {
    log::trace!(
        target: "stratum::worker",
        "{} [{} params]",
        finalized.sql(),
        finalized.params().len()
    );
    match run_statement_inner(txn.connection_mut(), finalized) {
        Ok(rows) => Ok(rows),
        Err(err) => {
            log::error!(target: "stratum::worker", "statement failed: {err}");
            txn.note_driver_error(&err);
            Err(RepoError::from(err))
        }
    }
}

fn run_statement_inner<C: Connection>(conn: &mut C, finalized: &Finalized) -> DriverResult<QueryRows> {
    let mut statement = conn.prepare(&finalized.sql())?;
    for (i, param) in finalized.params().iter().enumerate() {
        statement.bind(u32::try_from(i + 1).expect("parameter index fits u32"), param)?;
    }
    let names: Vec<String> = (0..statement.column_count())
        .map(|i| statement.column_name(i).unwrap_or_default().to_owned())
        .collect();
    let mut data = Vec::new();
    loop {
        match statement.step()? {
            StepOutcome::Done => break,
            StepOutcome::Row => {
                let mut cells = Vec::with_capacity(names.len());
                for i in 0..names.len() {
                    cells.push(statement.column(i)?);
                }
                data.push(cells);
            }
        }
    }
    Ok(QueryRows { names, data })
}

/// Which of a scheme's four policy predicates governs the operation in
/// progress.
#[derive(Copy, Clone, Debug)]
enum PolicyOp {
    Select,
    Create,
    Update,
    Remove,
}

fn policy_rule(policy: &AccessPolicy, op: PolicyOp) -> &RolePredicate {
    match op {
        PolicyOp::Select => &policy.select,
        PolicyOp::Create => &policy.create,
        PolicyOp::Update => &policy.update,
        PolicyOp::Remove => &policy.remove,
    }
}

/// A relation-typed value pulled out of a create/update patch, deferred
/// until the main row exists (spec.md §4.5 "Post-update protocol").
enum PendingRelation {
    /// An `Object` field given as a nested document rather than a bare id.
    ObjectChild { field: SmolStr, patch: Value },
    Set {
        field: SmolStr,
        ids: Vec<RecordId>,
        dicts: Vec<Value>,
    },
    Array { field: SmolStr, values: Vec<Value> },
}

pub struct Worker<'s> {
    scheme: &'s Scheme,
    dialect: &'s dyn Dialect,
    registry: &'s SchemeRegistry,
}

impl<'s> Worker<'s> {
    #[must_use]
    pub fn new(scheme: &'s Scheme, dialect: &'s dyn Dialect, registry: &'s SchemeRegistry) -> Self {
        Self {
            scheme,
            dialect,
            registry,
        }
    }

    fn translator(&self) -> Translator<'s> {
        Translator::new(self.scheme, self.dialect)
    }

    fn for_scheme(&self, name: &str) -> RepoResult<Worker<'s>> {
        let scheme: &'s Scheme = self
            .registry
            .get(name)
            .ok_or_else(|| RepoError::Bug(format!("scheme `{name}` is not registered")))?
            .as_ref();
        Ok(Worker::new(scheme, self.dialect, self.registry))
    }

    /// `max(current_transaction_role, requested_role)` (spec.md §4.5).
    fn effective_role<C: Connection>(txn: &Transaction<C>, requested: AccessRole) -> AccessRole {
        txn.role().max(requested)
    }

    /// Resolve `target` plus whatever extra restriction the scheme's access
    /// policy and `read_filter` hook impose for `op`, folding everything
    /// into one `Target::Predicate`. Returns `Err(SchemeDenied)` immediately
    /// for a `Never` policy, logging the denial per spec.md §4.5.
    fn restrict(&self, target: &Target, role: AccessRole, op: PolicyOp) -> RepoResult<Target> {
        let policy = self.scheme.policy_for(role);
        let rule = policy_rule(&policy, op).clone();
        if matches!(rule, RolePredicate::Never) {
            log::error!(
                target: "stratum::worker",
                "scheme `{}` denied {op:?} for role {role:?}",
                self.scheme.name()
            );
            return Err(RepoError::SchemeDenied(SmolStr::new(self.scheme.name())));
        }

        let mut predicates = self.translator().target_predicates(target)?;
        if let RolePredicate::OwnerMatch { field } = &rule {
            let user_id = context::request_meta()
                .user_id
                .ok_or_else(|| RepoError::SchemeDenied(SmolStr::new(self.scheme.name())))?;
            predicates.push(FieldPredicate::new(field.clone(), CoreComparison::Equal, Some(Value::Int(user_id))));
        }

        let ctx = HookContext {
            scheme_name: self.scheme.name(),
            role,
        };
        if let Some(extra) = self.scheme.hooks().read_filter(&ctx) {
            predicates.extend(extra.0);
        }

        Ok(Target::Predicate(Predicate(predicates)))
    }

    /// Decode one cursor, filling `Virtual` fields via the scheme's hook.
    /// The cursor never invokes hooks itself (spec.md §4.2); the worker
    /// decodes once to get the concrete fields the hook may read, then
    /// decodes again with the computed virtuals folded in.
    fn decode_row(&self, cursor: &Cursor<'_>, role: AccessRole) -> RepoResult<Value> {
        let empty = Dict::new();
        let preliminary = cursor.decode(self.scheme, &empty)?;
        let mut virtuals = Dict::new();
        let ctx = HookContext {
            scheme_name: self.scheme.name(),
            role,
        };
        for (name, field) in self.scheme.fields() {
            if field.kind.is_virtual() {
                if let Some(value) = self.scheme.hooks().virtual_field(&ctx, name, &preliminary) {
                    virtuals.insert(name, value);
                }
            }
        }
        cursor.decode(self.scheme, &virtuals)
    }

    /// `Worker::get` (spec.md §4.5).
    pub fn get<C: Connection>(
        &self,
        txn: &mut Transaction<C>,
        target: Target,
        selector: &FieldSelector,
        for_update: bool,
        requested_role: AccessRole,
    ) -> RepoResult<Option<Value>> {
        let role = Self::effective_role(txn, requested_role);
        let restricted = self.restrict(&target, role, PolicyOp::Select)?;
        let mut query = Query::new(restricted).with_pagination(stratum_core_api::pagination::Pagination {
            limit: Some(1),
            offset: None,
        });
        query.for_update = for_update;
        let finalized = self.translator().select(&query, selector)?;
        let rows = run_statement(txn, &finalized)?;
        rows.decode_first(|c| self.decode_row(c, role))
    }

    /// `Worker::select` (spec.md §4.5).
    pub fn select<C: Connection>(
        &self,
        txn: &mut Transaction<C>,
        query: &Query,
        selector: &FieldSelector,
        requested_role: AccessRole,
    ) -> RepoResult<Value> {
        let role = Self::effective_role(txn, requested_role);
        let original_target = query.target.clone().unwrap_or(Target::Predicate(Predicate::new()));
        let restricted = self.restrict(&original_target, role, PolicyOp::Select)?;
        let mut restricted_query = query.clone();
        restricted_query.target = Some(restricted);
        let finalized = self.translator().select(&restricted_query, selector)?;
        let rows = run_statement(txn, &finalized)?;
        let decoded = rows.decode_all(|c| self.decode_row(c, role))?;
        Ok(Value::Array(decoded))
    }

    /// `Worker::count` (spec.md §4.5).
    pub fn count<C: Connection>(&self, txn: &mut Transaction<C>, query: &Query, requested_role: AccessRole) -> RepoResult<u64> {
        let role = Self::effective_role(txn, requested_role);
        let original_target = query.target.clone().unwrap_or(Target::Predicate(Predicate::new()));
        let restricted = self.restrict(&original_target, role, PolicyOp::Select)?;
        let mut restricted_query = query.clone();
        restricted_query.target = Some(restricted);
        let finalized = self.translator().count(&restricted_query)?;
        let rows = run_statement(txn, &finalized)?;
        Ok(rows.first_i64("__count").unwrap_or(0).max(0) as u64)
    }

    /// `Worker::select_list` (spec.md §4.6 "Relation traversal"): walk a
    /// chain of relation hops starting from this scheme, then run
    /// `final_query`/`selector` against whichever scheme the last hop
    /// lands on. Each hop narrows a CTE of ids; only the final scheme's
    /// table is ever read for row content.
    pub fn select_list<C: Connection>(
        &self,
        txn: &mut Transaction<C>,
        root_target: Target,
        list: &QueryList,
        final_query: &Query,
        selector: &FieldSelector,
        requested_role: AccessRole,
    ) -> RepoResult<Value> {
        let role = Self::effective_role(txn, requested_role);
        let restricted_root = self.restrict(&root_target, role, PolicyOp::Select)?;

        let seed = self.translator().relation_seed_cte(&restricted_root)?;
        let mut builder = Builder::new().with("__hop0", &seed);
        let mut previous_cte = "__hop0".to_owned();
        let mut current_scheme: &'s Scheme = self.scheme;

        for (index, (hop, _subquery)) in list.hops.iter().enumerate() {
            let field_name = match hop {
                RelationHop::Object { field } | RelationHop::SetReference { field } | RelationHop::SetReverse { field } | RelationHop::View { field } => field.as_str(),
            };
            let field_def = current_scheme
                .get_field(field_name)
                .ok_or_else(|| RepoError::Bug(format!("scheme `{}` has no field `{field_name}`", current_scheme.name())))?;
            let (target_name, join_table, reverse_fk) = match (&field_def.kind, hop) {
                (FieldKind::Object { target, .. }, RelationHop::Object { .. }) => (target.clone(), None, None),
                (FieldKind::Set { target, foreign_link: None, .. }, RelationHop::SetReference { .. }) => {
                    (target.clone(), Some(format!("{}_f_{field_name}", current_scheme.name())), None)
                }
                (FieldKind::Set { target, foreign_link: Some(fk), .. }, RelationHop::SetReverse { .. }) => (target.clone(), None, Some(fk.clone())),
                (FieldKind::View(view), RelationHop::View { .. }) => (view.target.clone(), Some(format!("{}_f_{field_name}_view", current_scheme.name())), None),
                _ => {
                    return Err(RepoError::Bug(format!(
                        "hop for field `{field_name}` does not match its declared kind on scheme `{}`",
                        current_scheme.name()
                    )))
                }
            };
            let next_scheme: &'s Scheme = self
                .registry
                .get(&target_name)
                .ok_or_else(|| RepoError::Bug(format!("scheme `{target_name}` is not registered")))?
                .as_ref();
            let hop_cte_name = format!("__hop{}", index + 1);
            let hop_cte = Translator::relation_hop_cte(&previous_cte, hop, current_scheme.name(), join_table.as_deref(), target_name.as_str(), reverse_fk.as_deref())?;
            builder = builder.with(&hop_cte_name, &hop_cte);
            previous_cte = hop_cte_name;
            current_scheme = next_scheme;
        }

        let final_worker = self.for_scheme(current_scheme.name())?;
        let finalized = final_worker.translator().select_from_hop_cte(builder, &previous_cte, selector, final_query)?;
        let rows = run_statement(txn, &finalized)?;
        let decoded = rows.decode_all(|c| final_worker.decode_row(c, role))?;
        Ok(Value::Array(decoded))
    }

    /// Remove the relation-typed fields from `dict`, bucketing each into
    /// either a plain column (a scalar, or an `Object` FK given directly as
    /// an id) or a [`PendingRelation`] (spec.md §4.5 "Split the input
    /// document").
    fn split_patch(&self, dict: &mut Dict) -> (Vec<(SmolStr, Value)>, Vec<PendingRelation>) {
        let mut columns = Vec::new();
        let mut pending = Vec::new();
        for (name, field) in self.scheme.fields() {
            let Some(value) = dict.remove(name) else {
                continue;
            };
            match &field.kind {
                FieldKind::Object { .. } if matches!(value, Value::Dict(_)) => {
                    pending.push(PendingRelation::ObjectChild {
                        field: SmolStr::new(name),
                        patch: value,
                    });
                }
                FieldKind::Set { .. } => {
                    let items = value.as_array().map(<[Value]>::to_vec).unwrap_or_default();
                    let (ids, dicts): (Vec<_>, Vec<_>) = items.into_iter().partition(|v| matches!(v, Value::Int(_)));
                    pending.push(PendingRelation::Set {
                        field: SmolStr::new(name),
                        ids: ids.iter().filter_map(Value::as_i64).collect(),
                        dicts,
                    });
                }
                FieldKind::Array { .. } => {
                    let values = value.as_array().map(<[Value]>::to_vec).unwrap_or_default();
                    pending.push(PendingRelation::Array {
                        field: SmolStr::new(name),
                        values,
                    });
                }
                FieldKind::View(_) => {
                    log::debug!(target: "stratum::worker", "ignoring patch for read-only view field `{name}`");
                }
                FieldKind::Virtual => {
                    log::debug!(target: "stratum::worker", "ignoring patch for computed-on-read field `{name}`");
                }
                _ => columns.push((SmolStr::new(name), value)),
            }
        }
        (columns, pending)
    }

    fn object_target(&self, field: &str) -> RepoResult<SmolStr> {
        match self.scheme.get_field(field).map(|f| &f.kind) {
            Some(FieldKind::Object { target, .. }) => Ok(target.clone()),
            _ => Err(RepoError::Bug(format!("field `{field}` is not an Object relation"))),
        }
    }

    fn set_relation(&self, field: &str) -> RepoResult<&'s Field> {
        self.scheme
            .get_field(field)
            .filter(|f| matches!(f.kind, FieldKind::Set { .. }))
            .ok_or_else(|| RepoError::Bug(format!("field `{field}` is not a Set relation")))
    }

    /// `create`/`update`'s post-update fan-out (spec.md §4.5): resolve each
    /// deferred relation now that `parent_oid` exists.
    fn apply_pending<C: Connection>(
        &self,
        txn: &mut Transaction<C>,
        parent_oid: RecordId,
        pending: Vec<PendingRelation>,
        role: AccessRole,
    ) -> RepoResult<()> {
        for item in pending {
            match item {
                PendingRelation::ObjectChild { field, patch } => {
                    let target_name = self.object_target(&field)?;
                    let child = self.for_scheme(&target_name)?.create(txn, patch, None, role)?;
                    let child_oid = child
                        .as_dict()
                        .and_then(|d| d.get("__oid"))
                        .and_then(Value::as_i64)
                        .ok_or_else(|| RepoError::Bug("child create did not return __oid".to_owned()))?;
                    self.set_fk(txn, parent_oid, &field, child_oid)?;
                }
                PendingRelation::Set { field, ids, dicts } => {
                    self.clear_field(txn, parent_oid, &field, role)?;
                    if !ids.is_empty() {
                        self.append_set_ids(txn, parent_oid, &field, &ids)?;
                    }
                    for dict_value in dicts {
                        let target_name = self.object_target_of_set(&field)?;
                        let child = self.for_scheme(&target_name)?.create(txn, dict_value, None, role)?;
                        let child_oid = child
                            .as_dict()
                            .and_then(|d| d.get("__oid"))
                            .and_then(Value::as_i64)
                            .ok_or_else(|| RepoError::Bug("child create did not return __oid".to_owned()))?;
                        self.append_set_ids(txn, parent_oid, &field, &[child_oid])?;
                    }
                }
                PendingRelation::Array { field, values } => {
                    self.clear_field(txn, parent_oid, &field, role)?;
                    self.append_array_values(txn, parent_oid, &field, &values)?;
                }
            }
        }
        Ok(())
    }

    fn object_target_of_set(&self, field: &str) -> RepoResult<SmolStr> {
        match self.scheme.get_field(field).map(|f| &f.kind) {
            Some(FieldKind::Set { target, .. }) => Ok(target.clone()),
            _ => Err(RepoError::Bug(format!("field `{field}` is not a Set relation"))),
        }
    }

    fn set_fk<C: Connection>(&self, txn: &mut Transaction<C>, parent_oid: RecordId, field: &str, child_oid: RecordId) -> RepoResult<()> {
        let finalized = self
            .translator()
            .update(&Target::Id(parent_oid), &[(SmolStr::new(field), Value::Int(child_oid))], &["__oid"])?;
        run_statement(txn, &finalized)?;
        Ok(())
    }

    fn join_table(&self, field: &str) -> String {
        format!("{}_f_{field}", self.scheme.name())
    }

    /// `get_field` (spec.md §4.5): the related ids for a `Set`/`Array`/
    /// `View` field. Resolving full child records is left to a follow-up
    /// `select`/`get`, matching the lazy-relation shape `Query`'s own
    /// `resolve_depth` already implies.
    pub fn get_field<C: Connection>(
        &self,
        txn: &mut Transaction<C>,
        parent_oid: RecordId,
        field: &str,
        requested_role: AccessRole,
    ) -> RepoResult<Value> {
        let role = Self::effective_role(txn, requested_role);
        self.deny_if_blocked(role, PolicyOp::Select)?;
        let field_def = self
            .scheme
            .get_field(field)
            .ok_or_else(|| RepoError::Bug(format!("unknown field `{field}`")))?;
        match &field_def.kind {
            FieldKind::Array { .. } => {
                let table = self.join_table(field);
                let finalized = Builder::new()
                    .select()
                    .fields(&["data"])
                    .from(&table)
                    .where_with(|w| w.predicate(&quote_ident("parent_id"), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                    .finalize();
                let rows = run_statement(txn, &finalized)?;
                let values = rows
                    .data
                    .into_iter()
                    .map(|cells| cells.into_iter().next().map_or(Value::Null, Into::into))
                    .collect();
                Ok(Value::Array(values))
            }
            FieldKind::Set { target, foreign_link, .. } => {
                let finalized = if let Some(fk) = foreign_link {
                    Builder::new()
                        .select()
                        .fields(&["__oid"])
                        .from(target)
                        .where_with(|w| w.predicate(&quote_ident(fk), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                        .finalize()
                } else {
                    let table = self.join_table(field);
                    Builder::new()
                        .select()
                        .fields(&["child_id"])
                        .from(&table)
                        .where_with(|w| w.predicate(&quote_ident("parent_id"), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                        .finalize()
                };
                let rows = run_statement(txn, &finalized)?;
                let values = rows
                    .data
                    .into_iter()
                    .map(|cells| cells.into_iter().next().map_or(Value::Null, Into::into))
                    .collect();
                Ok(Value::Array(values))
            }
            FieldKind::View(_) => {
                let table = format!("{}_view", self.join_table(field));
                let finalized = Builder::new()
                    .select()
                    .fields(&["child_id"])
                    .from(&table)
                    .where_with(|w| {
                        w.predicate(&quote_ident("parent_id"), CoreComparison::Equal, Some(Value::Int(parent_oid)), None)
                            .predicate(&quote_ident("__vid"), CoreComparison::NotEqual, Some(Value::Int(0)), None)
                    })
                    .finalize();
                let rows = run_statement(txn, &finalized)?;
                let values = rows
                    .data
                    .into_iter()
                    .map(|cells| cells.into_iter().next().map_or(Value::Null, Into::into))
                    .collect();
                Ok(Value::Array(values))
            }
            _ => Err(RepoError::Bug(format!("field `{field}` has no per-field CRUD surface"))),
        }
    }

    fn deny_if_blocked(&self, role: AccessRole, op: PolicyOp) -> RepoResult<()> {
        let policy = self.scheme.policy_for(role);
        if matches!(policy_rule(&policy, op), RolePredicate::Never) {
            return Err(RepoError::SchemeDenied(SmolStr::new(self.scheme.name())));
        }
        Ok(())
    }

    /// `clear_field` (spec.md §4.5): detach every current member without
    /// deleting children (a reverse-FK `Set` is nulled, not cascaded; that
    /// remains the job of the `OnRemove` trigger on the child's own
    /// removal).
    pub fn clear_field<C: Connection>(&self, txn: &mut Transaction<C>, parent_oid: RecordId, field: &str, requested_role: AccessRole) -> RepoResult<()> {
        let role = Self::effective_role(txn, requested_role);
        self.deny_if_blocked(role, PolicyOp::Update)?;
        let field_def = self
            .scheme
            .get_field(field)
            .ok_or_else(|| RepoError::Bug(format!("unknown field `{field}`")))?;
        match &field_def.kind {
            FieldKind::Array { .. } => {
                let table = self.join_table(field);
                let finalized = Builder::new()
                    .delete_from(&table)
                    .where_with(|w| w.predicate(&quote_ident("parent_id"), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                    .finalize();
                run_statement(txn, &finalized)?;
                Ok(())
            }
            FieldKind::Set { target, foreign_link, .. } => {
                if let Some(fk) = foreign_link {
                    let finalized = Builder::new()
                        .update(target)
                        .set(fk, Value::Null)
                        .where_with(|w| w.predicate(&quote_ident(fk), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                        .finalize();
                    run_statement(txn, &finalized)?;
                } else {
                    let table = self.join_table(field);
                    let finalized = Builder::new()
                        .delete_from(&table)
                        .where_with(|w| w.predicate(&quote_ident("parent_id"), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                        .finalize();
                    run_statement(txn, &finalized)?;
                }
                Ok(())
            }
            FieldKind::View(_) => Err(RepoError::SchemeValidation(format!("field `{field}` is a materialised view and cannot be written directly"))),
            _ => Err(RepoError::Bug(format!("field `{field}` has no per-field CRUD surface"))),
        }
    }

    fn append_set_ids<C: Connection>(&self, txn: &mut Transaction<C>, parent_oid: RecordId, field: &str, ids: &[RecordId]) -> RepoResult<()> {
        let field_def = self.set_relation(field)?;
        let FieldKind::Set { target, foreign_link, .. } = &field_def.kind else {
            unreachable!("checked by set_relation")
        };
        if let Some(fk) = foreign_link {
            let finalized = Builder::new()
                .update(target)
                .set(fk, Value::Int(parent_oid))
                .where_with(|w| w.predicate(&quote_ident("__oid"), CoreComparison::In, Some(Value::Array(ids.iter().map(|v| Value::Int(*v)).collect())), None))
                .finalize();
            run_statement(txn, &finalized)?;
        } else {
            let table = self.join_table(field);
            for id in ids {
                let finalized = Builder::new()
                    .insert_into(&table)
                    .fields(&["parent_id", "child_id"])
                    .values_tuple(&[Value::Int(parent_oid), Value::Int(*id)])
                    .on_conflict_do_nothing(&["parent_id", "child_id"])
                    .finalize();
                run_statement(txn, &finalized)?;
            }
        }
        Ok(())
    }

    fn append_array_values<C: Connection>(&self, txn: &mut Transaction<C>, parent_oid: RecordId, field: &str, values: &[Value]) -> RepoResult<()> {
        let table = self.join_table(field);
        for value in values {
            let finalized = Builder::new()
                .insert_into(&table)
                .fields(&["parent_id", "data"])
                .values_tuple(&[Value::Int(parent_oid), value.clone()])
                .finalize();
            run_statement(txn, &finalized)?;
        }
        Ok(())
    }

    /// `append_field` (spec.md §4.5): add members without clearing existing
    /// ones first.
    pub fn append_field<C: Connection>(
        &self,
        txn: &mut Transaction<C>,
        parent_oid: RecordId,
        field: &str,
        value: &Value,
        requested_role: AccessRole,
    ) -> RepoResult<()> {
        let role = Self::effective_role(txn, requested_role);
        self.deny_if_blocked(role, PolicyOp::Update)?;
        let field_def = self
            .scheme
            .get_field(field)
            .ok_or_else(|| RepoError::Bug(format!("unknown field `{field}`")))?;
        match &field_def.kind {
            FieldKind::Array { .. } => {
                let values = value.as_array().map(<[Value]>::to_vec).unwrap_or_else(|| vec![value.clone()]);
                self.append_array_values(txn, parent_oid, field, &values)
            }
            FieldKind::Set { .. } => {
                let ids: Vec<RecordId> = value
                    .as_array()
                    .map(|items| items.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_else(|| value.as_i64().into_iter().collect());
                self.append_set_ids(txn, parent_oid, field, &ids)
            }
            FieldKind::View(_) => Err(RepoError::SchemeValidation(format!("field `{field}` is a materialised view and cannot be written directly"))),
            _ => Err(RepoError::Bug(format!("field `{field}` has no per-field CRUD surface"))),
        }
    }

    /// `set_field` (spec.md §4.5): replace the full member list.
    pub fn set_field<C: Connection>(
        &self,
        txn: &mut Transaction<C>,
        parent_oid: RecordId,
        field: &str,
        value: &Value,
        requested_role: AccessRole,
    ) -> RepoResult<()> {
        self.clear_field(txn, parent_oid, field, requested_role)?;
        self.append_field(txn, parent_oid, field, value, requested_role)
    }

    /// `count_field` (spec.md §4.5).
    pub fn count_field<C: Connection>(&self, txn: &mut Transaction<C>, parent_oid: RecordId, field: &str, requested_role: AccessRole) -> RepoResult<u64> {
        let role = Self::effective_role(txn, requested_role);
        self.deny_if_blocked(role, PolicyOp::Select)?;
        let field_def = self
            .scheme
            .get_field(field)
            .ok_or_else(|| RepoError::Bug(format!("unknown field `{field}`")))?;
        let finalized = match &field_def.kind {
            FieldKind::Array { .. } => {
                let table = self.join_table(field);
                Builder::new()
                    .select()
                    .fields_raw(&[format!("COUNT(*) AS {}", quote_ident("__count"))])
                    .from(&table)
                    .where_with(|w| w.predicate(&quote_ident("parent_id"), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                    .finalize()
            }
            FieldKind::Set { target, foreign_link, .. } => {
                if let Some(fk) = foreign_link {
                    Builder::new()
                        .select()
                        .fields_raw(&[format!("COUNT(*) AS {}", quote_ident("__count"))])
                        .from(target)
                        .where_with(|w| w.predicate(&quote_ident(fk), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                        .finalize()
                } else {
                    let table = self.join_table(field);
                    Builder::new()
                        .select()
                        .fields_raw(&[format!("COUNT(*) AS {}", quote_ident("__count"))])
                        .from(&table)
                        .where_with(|w| w.predicate(&quote_ident("parent_id"), CoreComparison::Equal, Some(Value::Int(parent_oid)), None))
                        .finalize()
                }
            }
            FieldKind::View(_) => {
                let table = format!("{}_view", self.join_table(field));
                Builder::new()
                    .select()
                    .fields_raw(&[format!("COUNT(*) AS {}", quote_ident("__count"))])
                    .from(&table)
                    .where_with(|w| {
                        w.predicate(&quote_ident("parent_id"), CoreComparison::Equal, Some(Value::Int(parent_oid)), None)
                            .predicate(&quote_ident("__vid"), CoreComparison::NotEqual, Some(Value::Int(0)), None)
                    })
                    .finalize()
            }
            _ => return Err(RepoError::Bug(format!("field `{field}` has no per-field CRUD surface"))),
        };
        let rows = run_statement(txn, &finalized)?;
        Ok(rows.first_i64("__count").unwrap_or(0).max(0) as u64)
    }

    /// `Worker::create` (spec.md §4.5).
    pub fn create<C: Connection>(
        &self,
        txn: &mut Transaction<C>,
        mut patch: Value,
        conflict: Option<&ConflictHandler>,
        requested_role: AccessRole,
    ) -> RepoResult<Value> {
        let role = Self::effective_role(txn, requested_role);
        self.deny_if_blocked(role, PolicyOp::Create)?;

        let ctx = HookContext {
            scheme_name: self.scheme.name(),
            role,
        };
        self.scheme
            .hooks()
            .before_create(&ctx, &mut patch)
            .map_err(|e| RepoError::SchemeValidation(e.0))?;

        let mut dict = patch.as_dict().cloned().ok_or_else(|| RepoError::Bug("create patch must be a Dict".to_owned()))?;
        let (columns, pending) = self.split_patch(&mut dict);

        let mut returning: Vec<&str> = vec!["__oid"];
        let column_names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        returning.extend(column_names.iter().copied());

        let finalized = self.translator().insert(&columns, conflict, &returning);
        let rows = run_statement(txn, &finalized)?;
        if rows.is_empty() {
            let is_do_nothing = matches!(conflict, Some(ConflictHandler::DoNothing { .. }));
            if is_do_nothing {
                return Ok(Value::Dict(Dict::new()));
            }
            return Err(RepoError::Conflict);
        }

        let parent_oid = rows
            .first_i64("__oid")
            .ok_or_else(|| RepoError::Bug("INSERT ... RETURNING did not yield __oid".to_owned()))?;

        if !pending.is_empty() {
            self.apply_pending(txn, parent_oid, pending, role)?;
        }

        let record = rows
            .decode_first(|c| self.decode_row(c, role))?
            .ok_or_else(|| RepoError::Bug("INSERT ... RETURNING yielded no row".to_owned()))?;
        self.scheme.hooks().after_create(&ctx, &record);
        Ok(record)
    }

    /// `Worker::update` (spec.md §4.5). When the target matches no row but
    /// explicit conditions were supplied and no SQL error occurred, returns
    /// a value carrying only `__oid` — the documented "no-op success"
    /// signal rather than an error.
    pub fn update<C: Connection>(&self, txn: &mut Transaction<C>, target: Target, mut patch: Value, requested_role: AccessRole) -> RepoResult<Value> {
        let role = Self::effective_role(txn, requested_role);
        let restricted = self.restrict(&target, role, PolicyOp::Update)?;

        let ctx = HookContext {
            scheme_name: self.scheme.name(),
            role,
        };
        self.scheme
            .hooks()
            .before_update(&ctx, &mut patch)
            .map_err(|e| RepoError::SchemeValidation(e.0))?;

        let mut dict = patch.as_dict().cloned().ok_or_else(|| RepoError::Bug("update patch must be a Dict".to_owned()))?;
        let (columns, pending) = self.split_patch(&mut dict);

        if columns.is_empty() && pending.is_empty() {
            return Ok(Value::Dict(Dict::new()));
        }

        if !columns.is_empty() {
            let mut returning: Vec<&str> = vec!["__oid"];
            let column_names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
            returning.extend(column_names.iter().copied());
            let finalized = self.translator().update(&restricted, &columns, &returning)?;
            let rows = run_statement(txn, &finalized)?;
            if rows.is_empty() {
                let mut fallback = Dict::new();
                fallback.insert("__oid", Value::Null);
                return Ok(Value::Dict(fallback));
            }
            let parent_oid = rows
                .first_i64("__oid")
                .ok_or_else(|| RepoError::Bug("UPDATE ... RETURNING did not yield __oid".to_owned()))?;
            if !pending.is_empty() {
                self.apply_pending(txn, parent_oid, pending, role)?;
            }
            let record = rows
                .decode_first(|c| self.decode_row(c, role))?
                .ok_or_else(|| RepoError::Bug("UPDATE ... RETURNING yielded no row".to_owned()))?;
            self.scheme.hooks().after_update(&ctx, &record);
            Ok(record)
        } else {
            // Only relation fields changed; resolve the target's oid
            // through a plain read before fanning the pending list out.
            let selector = FieldSelector {
                include_none: true,
                ..FieldSelector::default()
            };
            let existing = self.get_inner(txn, &restricted, &selector, false)?;
            let Some(record) = existing else {
                let mut fallback = Dict::new();
                fallback.insert("__oid", Value::Null);
                return Ok(Value::Dict(fallback));
            };
            let parent_oid = record
                .as_dict()
                .and_then(|d| d.get("__oid"))
                .and_then(Value::as_i64)
                .ok_or_else(|| RepoError::Bug("resolved row has no __oid".to_owned()))?;
            self.apply_pending(txn, parent_oid, pending, role)?;
            self.scheme.hooks().after_update(&ctx, &record);
            Ok(record)
        }
    }

    fn get_inner<C: Connection>(&self, txn: &mut Transaction<C>, restricted: &Target, selector: &FieldSelector, for_update: bool) -> RepoResult<Option<Value>> {
        let mut query = Query::new(restricted.clone()).with_pagination(stratum_core_api::pagination::Pagination {
            limit: Some(1),
            offset: None,
        });
        query.for_update = for_update;
        let finalized = self.translator().select(&query, selector)?;
        let rows = run_statement(txn, &finalized)?;
        rows.decode_first(|c| cursor_dict_only(c))
    }

    /// `Worker::touch` (spec.md §4.5).
    pub fn touch<C: Connection>(&self, txn: &mut Transaction<C>, target: Target, updated_at_field: &str, requested_role: AccessRole) -> RepoResult<()> {
        let role = Self::effective_role(txn, requested_role);
        let restricted = self.restrict(&target, role, PolicyOp::Update)?;
        let now_micros = stratum_core::util::clock::DateTime::now().timestamp_micros();
        let finalized = self.translator().touch(&restricted, updated_at_field, now_micros)?;
        run_statement(txn, &finalized)?;
        Ok(())
    }

    /// `Worker::remove` (spec.md §4.5). Cascades are left entirely to the
    /// migration-authored `OnRemove` triggers (spec.md §4.7); the worker
    /// only ever issues the one `DELETE` against this scheme's own table.
    pub fn remove<C: Connection>(&self, txn: &mut Transaction<C>, id: RecordId, requested_role: AccessRole) -> RepoResult<bool> {
        let role = Self::effective_role(txn, requested_role);
        let restricted = self.restrict(&Target::Id(id), role, PolicyOp::Remove)?;

        let ctx = HookContext {
            scheme_name: self.scheme.name(),
            role,
        };
        self.scheme
            .hooks()
            .before_remove(&ctx, id)
            .map_err(|e| RepoError::SchemeValidation(e.0))?;

        let finalized = self.translator().delete(&restricted)?;
        let rows = run_statement(txn, &finalized)?;
        let removed = !rows.is_empty();
        if removed {
            self.scheme.hooks().after_remove(&ctx, id);
        }
        Ok(removed)
    }
}

/// A bare `__oid`-only decode used internally to resolve a restricted
/// target's row without invoking the scheme's virtual-field hook, which the
/// relation-only `update` branch has no need for.
fn cursor_dict_only(cursor: &Cursor<'_>) -> RepoResult<Value> {
    let mut dict = Dict::new();
    if let Some(oid) = cursor.get_i64_by_name("__oid") {
        dict.insert("__oid", Value::Int(oid));
    }
    Ok(Value::Dict(dict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::schema::field::FullTextSpec;
    use stratum_core::schema::field::{FieldFlags, OnRemove};
    use stratum_core_api::fulltext::FullTextQuery;
    use stratum_driver::{BackendKind, DriverError, Info, Statement};

    struct FakeStatement {
        names: Vec<String>,
        rows: VecDeque<Vec<ColumnValue>>,
        current: Option<Vec<ColumnValue>>,
    }

    impl Statement for FakeStatement {
        fn bind(&mut self, _index: u32, _value: &ParamValue) -> DriverResult<()> {
            Ok(())
        }
        fn step(&mut self) -> DriverResult<StepOutcome> {
            match self.rows.pop_front() {
                Some(row) => {
                    self.current = Some(row);
                    Ok(StepOutcome::Row)
                }
                None => {
                    self.current = None;
                    Ok(StepOutcome::Done)
                }
            }
        }
        fn column(&self, index: usize) -> DriverResult<ColumnValue> {
            Ok(self.current.as_ref().and_then(|r| r.get(index)).cloned().unwrap_or(ColumnValue::Null))
        }
        fn column_name(&self, index: usize) -> Option<&str> {
            self.names.get(index).map(String::as_str)
        }
        fn column_count(&self) -> usize {
            self.names.len()
        }
        fn reset(&mut self) -> DriverResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeConnection {
        scripts: VecDeque<(Vec<String>, Vec<Vec<ColumnValue>>)>,
        executed: Vec<String>,
    }

    impl Connection for FakeConnection {
        type Statement<'a> = FakeStatement;

        fn prepare(&mut self, sql: &str) -> DriverResult<Self::Statement<'_>> {
            self.executed.push(sql.to_owned());
            let (names, rows) = self.scripts.pop_front().unwrap_or_default();
            Ok(FakeStatement {
                names,
                rows: rows.into(),
                current: None,
            })
        }

        fn execute_batch(&mut self, sql: &str) -> DriverResult<()> {
            self.executed.push(sql.to_owned());
            Ok(())
        }

        fn affected(&self) -> u64 {
            0
        }

        fn last_insert_id(&self) -> Option<i64> {
            None
        }

        fn diagnostics(&self, err: &DriverError) -> Info {
            Info {
                code: 0,
                status_name: "fake".into(),
                description: err.to_string(),
                failed_query: None,
            }
        }
    }

    struct NullDialect;

    impl Dialect for NullDialect {
        fn backend(&self) -> BackendKind {
            BackendKind::Sqlite
        }
        fn fulltext_match_sql(&self, _column_sql: &str, _spec: &FullTextSpec, _query: &FullTextQuery) -> String {
            String::new()
        }
        fn fulltext_rank_sql(&self, _column_sql: &str, _spec: &FullTextSpec, _query: &FullTextQuery, _flags: FieldFlags) -> Option<String> {
            None
        }
    }

    fn widget_scheme() -> Scheme {
        Scheme::new("widget")
            .field("name", Field::new(FieldKind::Text))
            .role(AccessRole::Default, AccessPolicy::allow_all())
            .role(AccessRole::Nobody, AccessPolicy::deny_all())
    }

    #[test]
    fn create_inserts_and_decodes_the_returned_row() {
        let scheme = widget_scheme();
        let dialect = NullDialect;
        let registry = SchemeRegistry::new();
        let worker = Worker::new(&scheme, &dialect, &registry);

        let mut conn = FakeConnection::default();
        conn.scripts.push_back((
            vec!["__oid".to_owned(), "name".to_owned()],
            vec![vec![ColumnValue::Int(1), ColumnValue::Text("lamp".to_owned())]],
        ));
        let mut txn = Transaction::new(conn, BackendKind::Sqlite);
        txn.begin(AccessRole::Default, crate::transaction::IsolationLevel::Deferred).unwrap();

        let mut patch = Dict::new();
        patch.insert("name", Value::Text("lamp".to_owned()));
        let record = worker.create(&mut txn, Value::Dict(patch), None, AccessRole::Default).unwrap();

        let dict = record.as_dict().unwrap();
        assert_eq!(dict.get("__oid"), Some(&Value::Int(1)));
        assert_eq!(dict.get("name"), Some(&Value::Text("lamp".to_owned())));
    }

    #[test]
    fn create_is_denied_before_issuing_any_sql() {
        let scheme = widget_scheme();
        let dialect = NullDialect;
        let registry = SchemeRegistry::new();
        let worker = Worker::new(&scheme, &dialect, &registry);

        let conn = FakeConnection::default();
        let mut txn = Transaction::new(conn, BackendKind::Sqlite);
        txn.begin(AccessRole::Nobody, crate::transaction::IsolationLevel::Deferred).unwrap();

        let mut patch = Dict::new();
        patch.insert("name", Value::Text("lamp".to_owned()));
        let err = worker.create(&mut txn, Value::Dict(patch), None, AccessRole::Nobody).unwrap_err();
        assert!(matches!(err, RepoError::SchemeDenied(_)));
        assert!(txn.connection().executed.is_empty());
    }

    #[test]
    fn split_patch_buckets_relations_away_from_columns() {
        let scheme = Scheme::new("post")
            .field("title", Field::new(FieldKind::Text))
            .field(
                "owner",
                Field::new(FieldKind::Object {
                    target: "user".into(),
                    on_remove: OnRemove::Cascade,
                }),
            )
            .field(
                "tags",
                Field::new(FieldKind::Array {
                    element: stratum_core::schema::field::ScalarKind::Text,
                }),
            );
        let dialect = NullDialect;
        let registry = SchemeRegistry::new();
        let worker = Worker::new(&scheme, &dialect, &registry);

        let mut dict = Dict::new();
        dict.insert("title", Value::Text("hello".to_owned()));
        dict.insert("owner", Value::Int(7));
        dict.insert("tags", Value::Array(vec![Value::Text("a".to_owned()), Value::Text("b".to_owned())]));

        let (columns, pending) = worker.split_patch(&mut dict);
        assert_eq!(columns.len(), 2, "title and the plain-id owner FK both stay as columns");
        assert!(columns.iter().any(|(name, _)| name == "title"));
        assert!(columns.iter().any(|(name, _)| name == "owner"));
        assert_eq!(pending.len(), 1);
        assert!(matches!(&pending[0], PendingRelation::Array { field, values } if field == "tags" && values.len() == 2));
    }
}
