// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delta audit history (spec.md §4.8 "Delta"): reads the `__delta_{scheme}`
//! tables `stratum-migration` creates for every `has_delta` scheme
//! (`crates/migration/src/project.rs`) and populated by its per-event
//! `scheme_delta` triggers.

use smol_str::SmolStr;
use stratum_core::query::Comparison;
use stratum_core::util::clock::DateTime;
use stratum_core::value::Value;
use stratum_driver::Connection;
use stratum_repo::prelude::{RepoError, RepoResult, Transaction};
use stratum_sql::Builder;

use crate::http_date::imf_fixdate;
use crate::support::run_statement;

fn delta_table(scheme: &str) -> String {
    format!("__delta_{scheme}")
}

/// One row out of a scheme's delta log.
#[derive(Clone, Debug, PartialEq)]
pub struct DeltaRecord {
    pub action: SmolStr,
    pub time_micros: i64,
    pub http_date: String,
    pub object: i64,
    pub user: Option<DeltaUser>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeltaUser {
    pub id: i64,
    pub name: Option<String>,
}

/// List everything recorded for `scheme` strictly after `since_micros`,
/// oldest first. When `resolve_users` is set and a row's `user` column is
/// populated, the user's `name` is joined in from `user_scheme`/`name_field`
/// (typically the registered user scheme and its display-name field);
/// `__delta_*` triggers never populate `user` themselves (plain SQL
/// triggers have no request context), so in practice this only resolves
/// rows an application write path has stamped with a user id itself.
pub fn get_history<C: Connection>(
    txn: &mut Transaction<C>,
    scheme: &str,
    since_micros: i64,
    resolve_users: Option<(&str, &str)>,
) -> RepoResult<Vec<DeltaRecord>> {
    let table = delta_table(scheme);
    let finalized = Builder::new()
        .select()
        .fields(&["object", "time", "action", "user"])
        .from(&table)
        .where_with(|w| w.predicate("\"time\"", Comparison::GreaterThan, Some(Value::Int(since_micros)), None))
        .order_by("time", true, None)
        .finalize();
    let rows = run_statement(txn, &finalized)?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows.rows() {
        let object = rows
            .int(row, "object")
            .ok_or_else(|| RepoError::Bug(format!("{table}.object missing")))?;
        let time_micros = rows
            .int(row, "time")
            .ok_or_else(|| RepoError::Bug(format!("{table}.time missing")))?;
        let action = rows
            .text(row, "action")
            .ok_or_else(|| RepoError::Bug(format!("{table}.action missing")))?;
        let user_id = rows.int(row, "user");
        let user = match (user_id, resolve_users) {
            (Some(id), Some((user_scheme, name_field))) => Some(resolve_user(txn, user_scheme, name_field, id)?),
            (Some(id), None) => Some(DeltaUser { id, name: None }),
            (None, _) => None,
        };
        records.push(DeltaRecord {
            action: SmolStr::new(&action),
            time_micros,
            http_date: imf_fixdate(DateTime::new_timestamp_micros(time_micros)),
            object,
            user,
        });
    }
    Ok(records)
}

fn resolve_user<C: Connection>(
    txn: &mut Transaction<C>,
    user_scheme: &str,
    name_field: &str,
    id: i64,
) -> RepoResult<DeltaUser> {
    let finalized = Builder::new()
        .select()
        .fields(&[name_field])
        .from(user_scheme)
        .where_with(|w| w.predicate("\"__oid\"", Comparison::Equal, Some(Value::Int(id)), None))
        .finalize();
    let rows = run_statement(txn, &finalized)?;
    Ok(DeltaUser {
        id,
        name: rows.first_text(name_field),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_table_name_matches_migration_naming() {
        assert_eq!(delta_table("post"), "__delta_post");
    }

    #[test]
    fn history_query_filters_and_orders_by_time() {
        let finalized = Builder::new()
            .select()
            .fields(&["object", "time", "action", "user"])
            .from("__delta_post")
            .where_with(|w| w.predicate("\"time\"", Comparison::GreaterThan, Some(Value::Int(0)), None))
            .order_by("time", true, None)
            .finalize();
        assert_eq!(
            finalized.sql(),
            "SELECT \"object\", \"time\", \"action\", \"user\" FROM \"__delta_post\" WHERE \"time\" > ?1 ORDER BY \"time\" ASC;"
        );
    }
}
