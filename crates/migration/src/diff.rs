// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Diffing a live [`DatabaseShape`] against a projected target, producing
//! the ordered DDL statements that reconcile the former into the latter
//! (spec.md §4.7 "Diff", "Idempotence").

use smol_str::SmolStr;

use crate::dialect::MigrationDialect;
use crate::project::trigger_action_for;
use crate::shape::{DatabaseShape, TableShape};
use crate::trigger::TriggerName;

fn create_table_sql(dialect: &dyn MigrationDialect, table: &TableShape) -> String {
    let mut column_defs = vec![dialect.oid_column_ddl(table.detached)];
    for column in &table.columns {
        if column.name == "__oid" {
            continue;
        }
        let mut def = format!("{} {}", stratum_sql::quote_ident(&column.name), column.sql_type);
        if column.not_null {
            def.push_str(" NOT NULL");
        }
        column_defs.push(def);
    }
    format!(
        "CREATE TABLE {} ({});",
        stratum_sql::quote_ident(&table.name),
        column_defs.join(", ")
    )
}

fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", stratum_sql::quote_ident(table))
}

fn add_column_sql(table: &str, column: &crate::shape::ColumnShape) -> String {
    let mut def = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        stratum_sql::quote_ident(table),
        stratum_sql::quote_ident(&column.name),
        column.sql_type
    );
    if column.not_null {
        def.push_str(" NOT NULL");
    }
    def.push(';');
    def
}

fn drop_column_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {};",
        stratum_sql::quote_ident(table),
        stratum_sql::quote_ident(column)
    )
}

fn create_index_sql(index: &crate::shape::IndexShape) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let columns: Vec<String> = index.columns.iter().map(|c| stratum_sql::quote_ident(c)).collect();
    format!(
        "CREATE {unique}INDEX {} ON {} ({});",
        stratum_sql::quote_ident(&index.name),
        stratum_sql::quote_ident(&index.table),
        columns.join(", ")
    )
}

fn drop_index_sql(index: &str) -> String {
    format!("DROP INDEX IF EXISTS {};", stratum_sql::quote_ident(index))
}

/// Tables present in `target` but missing from `live`: emit `CREATE TABLE`
/// for each, in declaration order (spec.md §4.7 "Missing table").
fn diff_tables(dialect: &dyn MigrationDialect, live: &DatabaseShape, target: &DatabaseShape, statements: &mut Vec<String>) {
    for table in &target.tables {
        match live.table(&table.name) {
            None => statements.push(create_table_sql(dialect, table)),
            Some(live_table) => diff_columns(live_table, table, statements),
        }
    }
}

/// Column-level diff for a table that exists in both shapes (spec.md §4.7
/// "Missing column", "Extra column", "Column type mismatch"). `__oid` is
/// never dropped or re-typed even if it superficially differs, since its
/// declaration is backend-specific identity/default syntax rather than a
/// structural change.
fn diff_columns(live: &TableShape, target: &TableShape, statements: &mut Vec<String>) {
    for column in &target.columns {
        if column.name == "__oid" {
            continue;
        }
        match live.column(&column.name) {
            None => statements.push(add_column_sql(&target.name, column)),
            Some(live_column) if live_column.sql_type != column.sql_type => {
                statements.push(drop_column_sql(&target.name, &column.name));
                statements.push(add_column_sql(&target.name, column));
            }
            Some(_) => {}
        }
    }
    for live_column in &live.columns {
        if live_column.name == "__oid" {
            continue;
        }
        if target.column(&live_column.name).is_none() {
            statements.push(drop_column_sql(&target.name, &live_column.name));
        }
    }
}

/// Indices present in `target` but missing from `live`, and indices present
/// in `live` but missing from `target` — except auto-named ones, which a
/// backend creates on its own and the planner never touches (spec.md §4.7
/// "Extra index").
fn diff_indices(live: &DatabaseShape, target: &DatabaseShape, statements: &mut Vec<String>) {
    for index in &target.indices {
        if !live.indices.iter().any(|i| i.name == index.name) {
            statements.push(create_index_sql(index));
        }
    }
    for index in &live.indices {
        if index.auto_named {
            continue;
        }
        if !target.indices.iter().any(|i| i.name == index.name) {
            statements.push(drop_index_sql(&index.name));
        }
    }
}

/// Trigger diff (spec.md §4.7 "Triggers", "Trigger name mismatch"): a
/// missing trigger is created, a trigger whose name is unrecognised is left
/// alone, and one whose name matches ours but whose table/timing/event no
/// longer agrees is dropped and recreated.
fn diff_triggers(dialect: &dyn MigrationDialect, live: &DatabaseShape, target: &DatabaseShape, statements: &mut Vec<String>) {
    for trigger in &target.triggers {
        let Some(parsed) = TriggerName::parse(&trigger.name) else {
            continue;
        };
        match live.triggers.iter().find(|t| t.name == trigger.name) {
            None => {
                let action = trigger_action_for(&parsed);
                statements.extend(dialect.create_trigger_sql(&parsed, &trigger.table, &action));
            }
            Some(live_trigger) if live_trigger.table != trigger.table || live_trigger.timing != trigger.timing || live_trigger.event != trigger.event => {
                statements.extend(dialect.drop_trigger_sql(&trigger.name, &live_trigger.table));
                let action = trigger_action_for(&parsed);
                statements.extend(dialect.create_trigger_sql(&parsed, &trigger.table, &action));
            }
            Some(_) => {}
        }
    }
    for trigger in &live.triggers {
        if TriggerName::parse(&trigger.name).is_none() {
            // Not ours: left alone (spec.md §4.7 "Introspection").
            continue;
        }
        if !target.triggers.iter().any(|t| t.name == trigger.name) {
            statements.extend(dialect.drop_trigger_sql(&trigger.name, &trigger.table));
        }
    }
}

/// Compute the ordered DDL statements that reconcile `live` into `target`.
/// Tables/columns are diffed before indices and triggers so that a
/// `CREATE TABLE` always precedes the indices and triggers that reference
/// it. Returns an empty vector when `live` already matches `target`
/// (spec.md §4.7 "Idempotence").
#[must_use]
pub fn diff(dialect: &dyn MigrationDialect, live: &DatabaseShape, target: &DatabaseShape) -> Vec<String> {
    let mut statements = Vec::new();
    diff_tables(dialect, live, target, &mut statements);
    for table in &live.tables {
        if target.table(&table.name).is_none() {
            statements.push(drop_table_sql(&table.name));
        }
    }
    diff_indices(live, target, &mut statements);
    diff_triggers(dialect, live, target, &mut statements);
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteMigrationDialect;
    use crate::shape::{ColumnShape, IndexShape, TriggerEvent, TriggerShape, TriggerTiming};
    use stratum_core::schema::field::{Field, FieldKind, OnRemove};
    use stratum_core::schema::registry::SchemeRegistry;
    use stratum_core::schema::Scheme;

    fn sample_table() -> TableShape {
        TableShape {
            name: "post".into(),
            columns: vec![
                ColumnShape {
                    name: "__oid".into(),
                    sql_type: "BIGINT".into(),
                    not_null: true,
                    primary_key: true,
                },
                ColumnShape {
                    name: "title".into(),
                    sql_type: "TEXT".into(),
                    not_null: true,
                    primary_key: false,
                },
            ],
            detached: true,
        }
    }

    #[test]
    fn missing_table_emits_create_table() {
        let live = DatabaseShape::default();
        let target = DatabaseShape {
            tables: vec![sample_table()],
            ..Default::default()
        };
        let statements = diff(&SqliteMigrationDialect, &live, &target);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("CREATE TABLE \"post\""));
        assert!(statements[0].contains("\"title\" TEXT NOT NULL"));
    }

    #[test]
    fn identical_shapes_yield_no_statements() {
        let shape = DatabaseShape {
            tables: vec![sample_table()],
            ..Default::default()
        };
        assert!(diff(&SqliteMigrationDialect, &shape, &shape).is_empty());
    }

    #[test]
    fn missing_column_is_added_and_extra_column_is_dropped() {
        let mut live = sample_table();
        live.columns.push(ColumnShape {
            name: "legacy".into(),
            sql_type: "TEXT".into(),
            not_null: false,
            primary_key: false,
        });
        live.columns.retain(|c| c.name != "title");
        let live_shape = DatabaseShape {
            tables: vec![live],
            ..Default::default()
        };
        let target_shape = DatabaseShape {
            tables: vec![sample_table()],
            ..Default::default()
        };
        let statements = diff(&SqliteMigrationDialect, &live_shape, &target_shape);
        assert!(statements.iter().any(|s| s.contains("ADD COLUMN \"title\"")));
        assert!(statements.iter().any(|s| s.contains("DROP COLUMN \"legacy\"")));
    }

    #[test]
    fn column_type_mismatch_drops_then_readds() {
        let mut live = sample_table();
        live.columns[1].sql_type = "BLOB".into();
        let live_shape = DatabaseShape {
            tables: vec![live],
            ..Default::default()
        };
        let target_shape = DatabaseShape {
            tables: vec![sample_table()],
            ..Default::default()
        };
        let statements = diff(&SqliteMigrationDialect, &live_shape, &target_shape);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("DROP COLUMN \"title\""));
        assert!(statements[1].contains("ADD COLUMN \"title\" TEXT"));
    }

    #[test]
    fn auto_named_index_absent_from_target_is_never_dropped() {
        let live = DatabaseShape {
            tables: vec![sample_table()],
            indices: vec![IndexShape {
                name: "sqlite_autoindex_post_1".into(),
                table: "post".into(),
                unique: true,
                columns: vec!["title".into()],
                auto_named: true,
            }],
            ..Default::default()
        };
        let target = DatabaseShape {
            tables: vec![sample_table()],
            ..Default::default()
        };
        assert!(diff(&SqliteMigrationDialect, &live, &target).is_empty());
    }

    #[test]
    fn unrecognised_live_trigger_is_left_alone() {
        let live = DatabaseShape {
            tables: vec![sample_table()],
            triggers: vec![TriggerShape {
                name: "legacy_audit_trigger".into(),
                table: "post".into(),
                timing: TriggerTiming::After,
                event: TriggerEvent::Insert,
            }],
            ..Default::default()
        };
        let target = DatabaseShape {
            tables: vec![sample_table()],
            ..Default::default()
        };
        assert!(diff(&SqliteMigrationDialect, &live, &target).is_empty());
    }

    #[test]
    fn rerunning_projected_plan_against_itself_is_idempotent() {
        let mut registry = SchemeRegistry::new();
        registry.register(Scheme::new("user")).unwrap();
        registry
            .register(Scheme::new("post").field(
                "owner",
                Field::new(FieldKind::Object {
                    target: "user".into(),
                    on_remove: OnRemove::Cascade,
                }),
            ))
            .unwrap();
        registry.validate().unwrap();

        let target = crate::project::project(&SqliteMigrationDialect, &registry);
        assert!(diff(&SqliteMigrationDialect, &target, &target).is_empty());
    }
}
