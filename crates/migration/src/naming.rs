// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Side-table and trigger name grammar (spec.md §3.5, §4.7). Mirrors
//! `stratum_repo::worker`'s own table-name helpers exactly — the worker and
//! the migration planner must agree on these names without either depending
//! on the other.

/// `{parent}_f_{field}`: join table for a many-to-many `Set`, or the
/// element table for an `Array`.
#[must_use]
pub fn side_table(scheme: &str, field: &str) -> String {
    format!("{scheme}_f_{field}")
}

/// `{parent}_f_{field}_view`: materialisation table for a `View` field.
#[must_use]
pub fn view_table(scheme: &str, field: &str) -> String {
    format!("{}_view", side_table(scheme, field))
}

/// `{parent}_f_{field}_delta`: audit table for a delta-tracked `View`.
#[must_use]
pub fn view_delta_table(scheme: &str, field: &str) -> String {
    format!("{}_delta", side_table(scheme, field))
}

/// `__delta_{scheme}`: audit table for a `hasDelta` scheme.
#[must_use]
pub fn scheme_delta_table(scheme: &str) -> String {
    format!("__delta_{scheme}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_the_documented_grammar() {
        assert_eq!(side_table("post", "tags"), "post_f_tags");
        assert_eq!(view_table("post", "tags"), "post_f_tags_view");
        assert_eq!(view_delta_table("post", "tags"), "post_f_tags_delta");
        assert_eq!(scheme_delta_table("post"), "__delta_post");
    }
}
