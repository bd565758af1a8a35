// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{collections::HashMap, sync::Arc};

use smol_str::SmolStr;

use crate::{
    error::{CoreError, CoreResult},
    schema::{
        field::FieldKind,
        Scheme,
    },
};

/// The set of all declared schemes known to one engine instance. Needed to
/// resolve `Set` relations against their target scheme's reciprocal
/// `Object` field (spec.md §3.2).
#[derive(Clone, Default)]
pub struct SchemeRegistry {
    schemes: HashMap<SmolStr, Arc<Scheme>>,
}

impl std::fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("schemes", &self.schemes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `scheme`, validating every `Set` relation's reciprocal
    /// link eagerly so ambiguity is caught at startup rather than at query
    /// time (the `Bug` error kind in spec.md §7 is explicitly
    /// non-recoverable).
    pub fn register(&mut self, scheme: Scheme) -> CoreResult<()> {
        let scheme = Arc::new(scheme);
        self.schemes.insert(scheme.name().into(), Arc::clone(&scheme));
        for (field_name, field) in scheme.fields() {
            if let FieldKind::Set {
                target,
                foreign_link,
                ..
            } = &field.kind
            {
                self.resolve_foreign_link(&scheme, field_name, target, foreign_link.as_deref())?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Scheme>> {
        self.schemes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Scheme>> {
        self.schemes.values()
    }

    /// Returns the name of the target scheme's `Object` field that points
    /// back at `owner`, if the relation is one-to-many (FK on the child).
    /// Returns `Ok(None)` for a many-to-many relation (no reciprocal
    /// `Object` field exists on the target).
    fn resolve_foreign_link(
        &self,
        owner: &Scheme,
        field_name: &str,
        target_name: &str,
        explicit_link: Option<&str>,
    ) -> CoreResult<Option<SmolStr>> {
        if let Some(explicit) = explicit_link {
            return Ok(Some(explicit.into()));
        }
        let Some(target) = self.schemes.get(target_name) else {
            // The target scheme has not been registered yet; this is legal
            // during incremental registration but the check is skipped —
            // the final pass after all schemes are known is authoritative.
            return Ok(None);
        };
        let candidates: Vec<&str> = target
            .fields()
            .filter_map(|(name, field)| match &field.kind {
                FieldKind::Object { target: t, .. } if t == owner.name() => Some(name),
                _ => None,
            })
            .collect();
        match candidates.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some((*single).into())),
            _ => Err(CoreError::Bug(format!(
                "scheme `{}` field `{field_name}` references `{target_name}` ambiguously: \
                 candidates {candidates:?} — name the foreign link explicitly",
                owner.name(),
            ))),
        }
    }

    /// Re-validates every `Set` relation across all registered schemes.
    /// Call this once after the last `register` to catch forward
    /// references that were skipped during incremental registration.
    pub fn validate(&self) -> CoreResult<()> {
        for scheme in self.schemes.values() {
            for (field_name, field) in scheme.fields() {
                if let FieldKind::Set {
                    target,
                    foreign_link,
                    ..
                } = &field.kind
                {
                    self.resolve_foreign_link(scheme, field_name, target, foreign_link.as_deref())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{Field, OnRemove};

    #[test]
    fn unambiguous_reciprocal_link_resolves() {
        let mut registry = SchemeRegistry::new();
        registry
            .register(Scheme::new("user"))
            .expect("register user");
        registry
            .register(
                Scheme::new("post")
                    .field(
                        "owner",
                        Field::new(FieldKind::Object {
                            target: "user".into(),
                            on_remove: OnRemove::Cascade,
                        }),
                    )
                    .field(
                        "comments",
                        Field::new(FieldKind::Set {
                            target: "comment".into(),
                            foreign_link: None,
                            on_remove: OnRemove::Cascade,
                        }),
                    ),
            )
            .expect("register post");
        registry
            .register(
                Scheme::new("comment").field(
                    "article",
                    Field::new(FieldKind::Object {
                        target: "post".into(),
                        on_remove: OnRemove::Cascade,
                    }),
                ),
            )
            .expect("register comment");
        registry.validate().expect("no ambiguity");
    }

    #[test]
    fn ambiguous_reciprocal_link_is_a_bug() {
        let mut registry = SchemeRegistry::new();
        registry.register(Scheme::new("user")).unwrap();
        registry
            .register(
                Scheme::new("message")
                    .field(
                        "sender",
                        Field::new(FieldKind::Object {
                            target: "user".into(),
                            on_remove: OnRemove::Cascade,
                        }),
                    )
                    .field(
                        "recipient",
                        Field::new(FieldKind::Object {
                            target: "user".into(),
                            on_remove: OnRemove::Cascade,
                        }),
                    ),
            )
            .unwrap();
        registry
            .register(Scheme::new("user").field(
                "messages",
                Field::new(FieldKind::Set {
                    target: "message".into(),
                    foreign_link: None,
                    on_remove: OnRemove::Cascade,
                }),
            ))
            .unwrap();
        assert!(matches!(registry.validate(), Err(CoreError::Bug(_))));
    }
}
