// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use smol_str::SmolStr;

/// The effective access role flowing through a transaction (spec.md §3.3,
/// §4.5). Ordered so that `max(current, requested)` picks the more
/// privileged role.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessRole {
    Nobody,
    #[default]
    Default,
    Authorized,
    System,
    Admin,
}

/// A condition gating one CRUD operation for a given role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RolePredicate {
    Always,
    Never,
    /// The row's `owner` field (named here) must equal the current user id.
    OwnerMatch { field: SmolStr },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPolicy {
    pub select: RolePredicate,
    pub create: RolePredicate,
    pub update: RolePredicate,
    pub remove: RolePredicate,
}

impl AccessPolicy {
    #[must_use]
    pub const fn allow_all() -> Self {
        Self {
            select: RolePredicate::Always,
            create: RolePredicate::Always,
            update: RolePredicate::Always,
            remove: RolePredicate::Always,
        }
    }

    #[must_use]
    pub const fn deny_all() -> Self {
        Self {
            select: RolePredicate::Never,
            create: RolePredicate::Never,
            update: RolePredicate::Never,
            remove: RolePredicate::Never,
        }
    }
}
