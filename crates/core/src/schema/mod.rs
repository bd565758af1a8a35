// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The declarative schema model (spec.md §3.2, §4.4): fields, relations,
//! access roles, uniqueness and hooks for one entity type.

pub mod field;
pub mod hook;
pub mod registry;
pub mod role;

use std::{collections::HashMap, sync::Arc};

use smol_str::SmolStr;

use self::{
    field::{Field, FieldFlags, FieldKind},
    hook::{NoHooks, SchemeHooks},
    role::{AccessPolicy, AccessRole, RolePredicate},
};

#[derive(Clone)]
pub struct Scheme {
    name: SmolStr,
    fields: Vec<(SmolStr, Field)>,
    field_index: HashMap<SmolStr, usize>,
    unique_tuples: Vec<Vec<SmolStr>>,
    roles: HashMap<AccessRole, AccessPolicy>,
    hooks: Arc<dyn SchemeHooks>,
    has_delta: bool,
    detached: bool,
}

impl std::fmt::Debug for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheme")
            .field("name", &self.name)
            .field("fields", &self.fields.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("has_delta", &self.has_delta)
            .field("detached", &self.detached)
            .finish()
    }
}

impl Scheme {
    #[must_use]
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            field_index: HashMap::new(),
            unique_tuples: Vec::new(),
            roles: HashMap::new(),
            hooks: Arc::new(NoHooks),
            has_delta: false,
            detached: false,
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<SmolStr>, field: Field) -> Self {
        let name = name.into();
        if let Some(&idx) = self.field_index.get(&name) {
            self.fields[idx] = (name, field);
        } else {
            self.field_index.insert(name.clone(), self.fields.len());
            self.fields.push((name, field));
        }
        self
    }

    #[must_use]
    pub fn unique(mut self, fields: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        self.unique_tuples
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn role(mut self, role: AccessRole, policy: AccessPolicy) -> Self {
        self.roles.insert(role, policy);
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn SchemeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub const fn with_delta(mut self, has_delta: bool) -> Self {
        self.has_delta = has_delta;
        self
    }

    #[must_use]
    pub const fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn has_delta(&self) -> bool {
        self.has_delta
    }

    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.detached
    }

    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.field_index.get(name).map(|&idx| &self.fields[idx].1)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn unique_tuples(&self) -> impl Iterator<Item = &[SmolStr]> {
        self.unique_tuples.iter().map(Vec::as_slice)
    }

    #[must_use]
    pub fn hooks(&self) -> &Arc<dyn SchemeHooks> {
        &self.hooks
    }

    /// Resolves the effective access policy for `role`, falling back to
    /// [`AccessRole::Default`] and finally to `deny_all` when the scheme
    /// declares neither.
    #[must_use]
    pub fn policy_for(&self, role: AccessRole) -> AccessPolicy {
        self.roles
            .get(&role)
            .or_else(|| self.roles.get(&AccessRole::Default))
            .cloned()
            .unwrap_or_else(AccessPolicy::deny_all)
    }

    /// Resolves the alias field, i.e. the `Unique + Text` field with
    /// `Transform::Alias`, used by `Worker::get(alias)`.
    #[must_use]
    pub fn alias_field(&self) -> Option<(&str, &Field)> {
        self.fields()
            .find(|(_, field)| field.is_alias_key())
    }

    /// Fields that the read-field policy (spec.md §4.4) must always include.
    pub fn force_include_fields(&self) -> impl Iterator<Item = &str> {
        self.fields()
            .filter(|(_, f)| f.flags.contains(FieldFlags::FORCE_INCLUDE))
            .map(|(n, _)| n)
    }

    /// Fields that the read-field policy must never include unless the
    /// caller explicitly asked for "include all".
    pub fn force_exclude_fields(&self) -> impl Iterator<Item = &str> {
        self.fields()
            .filter(|(_, f)| f.flags.contains(FieldFlags::FORCE_EXCLUDE))
            .map(|(n, _)| n)
    }

    #[must_use]
    pub fn has_any_force_exclude(&self) -> bool {
        self.force_exclude_fields().next().is_some()
    }

    /// Columns persisted directly on the scheme's own table, in declared
    /// order, excluding relation fields (Set/Array/View/FullTextView) and
    /// `Virtual` fields which are never columns.
    pub fn column_fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields()
            .filter(|(_, f)| f.kind.is_scalar_column() || matches!(f.kind, FieldKind::FullTextView(_)))
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields().filter(|(_, f)| f.kind.is_relation())
    }
}

/// Determines which visible field names a read should project, implementing
/// the read-field policy of spec.md §4.4.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSelector {
    pub include: Vec<SmolStr>,
    pub exclude: Vec<SmolStr>,
    /// Caller asked for "include none": only `__oid` is emitted.
    pub include_none: bool,
    /// Caller asked for "include all": overrides `ForceExclude`.
    pub include_all: bool,
}

impl FieldSelector {
    #[must_use]
    pub fn resolve(&self, scheme: &Scheme) -> Vec<SmolStr> {
        if self.include_none {
            return Vec::new();
        }
        let no_explicit_selection = self.include.is_empty() && self.exclude.is_empty();
        if no_explicit_selection && !scheme.has_any_force_exclude() {
            return scheme
                .column_fields()
                .map(|(name, _)| SmolStr::new(name))
                .collect();
        }
        scheme
            .column_fields()
            .filter_map(|(name, field)| {
                let force_include = field.flags.contains(FieldFlags::FORCE_INCLUDE);
                let force_exclude = field.flags.contains(FieldFlags::FORCE_EXCLUDE);
                let in_include_list = self.include.iter().any(|f| f == name);
                let in_exclude_list = self.exclude.iter().any(|f| f == name);
                let included_by_default = no_explicit_selection && !in_exclude_list;
                let included =
                    force_include || in_include_list || included_by_default;
                let excluded = force_exclude && !self.include_all;
                (included && !excluded).then(|| SmolStr::new(name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        field::{Field, FieldFlags, FieldKind},
        role::AccessPolicy,
        *,
    };

    #[test]
    fn alias_field_resolution() {
        let scheme = Scheme::new("user")
            .field("name", Field::new(FieldKind::Text).with_flags(FieldFlags::UNIQUE))
            .field(
                "email",
                Field::new(FieldKind::Text)
                    .with_flags(FieldFlags::UNIQUE)
                    .with_transform(field::Transform::Alias),
            )
            .field(
                "password",
                Field::new(FieldKind::Bytes).with_flags(FieldFlags::FORCE_EXCLUDE),
            );
        let (name, _) = scheme.alias_field().expect("alias field");
        assert_eq!(name, "email");
    }

    #[test]
    fn default_projection_hides_force_excluded_fields() {
        let scheme = Scheme::new("user")
            .field("name", Field::new(FieldKind::Text))
            .field(
                "password",
                Field::new(FieldKind::Bytes).with_flags(FieldFlags::FORCE_EXCLUDE),
            );
        let selector = FieldSelector::default();
        let projected = selector.resolve(&scheme);
        assert!(projected.iter().any(|f| f == "name"));
        assert!(!projected.iter().any(|f| f == "password"));
    }

    #[test]
    fn include_all_overrides_force_exclude() {
        let scheme = Scheme::new("user").field(
            "password",
            Field::new(FieldKind::Bytes).with_flags(FieldFlags::FORCE_EXCLUDE),
        );
        let selector = FieldSelector {
            include_all: true,
            ..Default::default()
        };
        assert!(selector.resolve(&scheme).iter().any(|f| f == "password"));
    }

    #[test]
    fn include_none_yields_empty_projection() {
        let scheme = Scheme::new("user").field("name", Field::new(FieldKind::Text));
        let selector = FieldSelector {
            include_none: true,
            ..Default::default()
        };
        assert!(selector.resolve(&scheme).is_empty());
    }

    #[test]
    fn policy_falls_back_to_default_role() {
        let scheme = Scheme::new("user").role(AccessRole::Default, AccessPolicy::allow_all());
        let policy = scheme.policy_for(AccessRole::Authorized);
        assert_eq!(policy.select, role::RolePredicate::Always);
    }
}
