// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::{schema::role::AccessRole, value::Value};

/// Lightweight context passed to a [`SchemeHooks`] callback. It deliberately
/// does not expose the transaction or driver: hooks only ever see and
/// reshape `Value` data, keeping `stratum-core` free of any dependency on
/// `stratum-repo`.
#[derive(Copy, Clone, Debug)]
pub struct HookContext<'a> {
    pub scheme_name: &'a str,
    pub role: AccessRole,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("scheme validation failed: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// User-supplied lifecycle callbacks for a [`Scheme`](crate::schema::Scheme).
/// Every method has a no-op default: hooks are optional per-entity callbacks
/// invoked unconditionally by the worker.
pub trait SchemeHooks: Send + Sync {
    fn before_create(
        &self,
        _ctx: &HookContext<'_>,
        _patch: &mut Value,
    ) -> Result<(), ValidationError> {
        Ok(())
    }

    fn after_create(&self, _ctx: &HookContext<'_>, _record: &Value) {}

    fn before_update(
        &self,
        _ctx: &HookContext<'_>,
        _patch: &mut Value,
    ) -> Result<(), ValidationError> {
        Ok(())
    }

    fn after_update(&self, _ctx: &HookContext<'_>, _record: &Value) {}

    fn before_remove(&self, _ctx: &HookContext<'_>, _id: i64) -> Result<(), ValidationError> {
        Ok(())
    }

    fn after_remove(&self, _ctx: &HookContext<'_>, _id: i64) {}

    /// An additional predicate ANDed into every `select`/`count` issued
    /// under `ctx.role`, e.g. to hide soft-deleted rows from non-admins.
    fn read_filter(&self, _ctx: &HookContext<'_>) -> Option<crate::query::Predicate> {
        None
    }

    /// Computes a [`FieldKind::Virtual`](crate::schema::field::FieldKind::Virtual)
    /// field's value on read.
    fn virtual_field(&self, _ctx: &HookContext<'_>, _field: &str, _record: &Value) -> Option<Value> {
        None
    }
}

/// No-op hook set used by schemes that declare none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl SchemeHooks for NoHooks {}
