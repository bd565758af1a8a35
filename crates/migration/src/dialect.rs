// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The backend seam the migration planner defers to (spec.md §4.7 "Column
//! type mapping" and "Triggers"): native column type names, the `__oid`
//! column's declaration, and trigger DDL syntax differ enough between
//! SQLite and PostgreSQL that they cannot be expressed as one SQL string
//! template.

use smol_str::SmolStr;
use stratum_sql::quote_ident;

use crate::shape::{TriggerEvent, TriggerTiming};
use crate::trigger::TriggerName;

/// The storage-class side of spec.md §4.7's column type mapping table,
/// independent of the concrete SQL type name a backend gives it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnTypeKind {
    Integer,
    Float,
    Boolean,
    Text,
    Blob,
    FullText,
    Custom(SmolStr),
}

/// What a migration-authored trigger should do, independent of dialect
/// syntax. One [`TriggerName`] plus this body is enough for either backend
/// to render a complete `CREATE TRIGGER` statement (or statement group).
/// `fires_on` is the table the `CREATE TRIGGER ... ON` clause names, which
/// is not always `name.source` (an object-FK trigger fires on the relation
/// *target*, per spec.md §4.7 "before-delete on target").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    /// `NULL`/`DELETE`/`RESTRICT` the row on `source_table` that references
    /// the firing row, through `source_field`.
    ObjectFk {
        source_table: SmolStr,
        source_field: SmolStr,
        on_delete: SmolStr,
    },
    /// Delete the referenced target row too (`StrongReference`).
    CascadeDeleteTarget { target_table: SmolStr, target_field: SmolStr },
    /// Delete rows from a join/side table keyed by the firing row's oid.
    DeleteFromSideTable { side_table: SmolStr, key_column: SmolStr },
    /// Append a row to a view's delta table.
    AppendViewDelta { delta_table: SmolStr },
    /// Enqueue the old file oid for physical removal.
    EnqueueRemovedFile { source_field: SmolStr },
    /// Append a row to a scheme's own delta table. `row_ref` is `NEW` for
    /// an insert/update trigger and `OLD` for a delete trigger, since the
    /// firing row's `__oid` is only available under the name the backend
    /// still has bound at that point.
    AppendSchemeDelta {
        delta_table: SmolStr,
        action: SmolStr,
        row_ref: SmolStr,
    },
}

pub trait MigrationDialect: Send + Sync {
    fn column_type_sql(&self, kind: &ColumnTypeKind) -> String;

    /// The full `__oid` column declaration, including its default/identity
    /// clause. `detached` schemes get a plain autoincrement primary key;
    /// attached schemes draw from the shared `stellator_next_oid()`
    /// sequence (spec.md §4.7 "Missing table").
    fn oid_column_ddl(&self, detached: bool) -> String;

    /// Render one trigger, firing on `fires_on`, as one or more executable
    /// statements (PostgreSQL needs a backing function in addition to the
    /// `CREATE TRIGGER` itself; SQLite's trigger body is inline).
    fn create_trigger_sql(&self, name: &TriggerName, fires_on: &str, action: &TriggerAction) -> Vec<String>;

    fn drop_trigger_sql(&self, name: &str, fires_on: &str) -> Vec<String>;
}

fn timing_sql(timing: TriggerTiming) -> &'static str {
    match timing {
        TriggerTiming::Before => "BEFORE",
        TriggerTiming::After => "AFTER",
    }
}

fn event_sql(event: TriggerEvent) -> &'static str {
    match event {
        TriggerEvent::Insert => "INSERT",
        TriggerEvent::Update => "UPDATE",
        TriggerEvent::Delete => "DELETE",
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SqliteMigrationDialect;

impl SqliteMigrationDialect {
    fn action_body(action: &TriggerAction) -> String {
        match action {
            TriggerAction::ObjectFk {
                source_table,
                source_field,
                on_delete,
            } => match on_delete.as_str() {
                "CASCADE" => format!("DELETE FROM {} WHERE {} = OLD.\"__oid\";", quote_ident(source_table), quote_ident(source_field)),
                "SET_NULL" => format!(
                    "UPDATE {} SET {} = NULL WHERE {} = OLD.\"__oid\";",
                    quote_ident(source_table),
                    quote_ident(source_field),
                    quote_ident(source_field)
                ),
                _ => "SELECT RAISE(ABORT, 'restrict');".to_owned(),
            },
            TriggerAction::CascadeDeleteTarget { target_table, target_field } => {
                format!("DELETE FROM {} WHERE \"__oid\" = OLD.{};", quote_ident(target_table), quote_ident(target_field))
            }
            TriggerAction::DeleteFromSideTable { side_table, key_column } => {
                format!("DELETE FROM {} WHERE {} = OLD.\"__oid\";", quote_ident(side_table), quote_ident(key_column))
            }
            TriggerAction::AppendViewDelta { delta_table } => format!(
                "INSERT INTO {} (tag, object, time, user) VALUES (NEW.parent_id, NEW.child_id, strftime('%s','now') * 1000000, NULL);",
                quote_ident(delta_table)
            ),
            TriggerAction::EnqueueRemovedFile { source_field } => format!(
                "INSERT INTO \"__removed\" (\"object\") VALUES (OLD.{});",
                quote_ident(source_field)
            ),
            TriggerAction::AppendSchemeDelta { delta_table, action, row_ref } => format!(
                "INSERT INTO {} (object, time, action, user) VALUES ({row_ref}.\"__oid\", strftime('%s','now') * 1000000, '{action}', NULL);",
                quote_ident(delta_table)
            ),
        }
    }
}

impl MigrationDialect for SqliteMigrationDialect {
    fn column_type_sql(&self, kind: &ColumnTypeKind) -> String {
        match kind {
            ColumnTypeKind::Integer => "BIGINT".to_owned(),
            ColumnTypeKind::Float => "DOUBLE".to_owned(),
            ColumnTypeKind::Boolean => "BOOLEAN".to_owned(),
            ColumnTypeKind::Text => "TEXT".to_owned(),
            ColumnTypeKind::Blob => "BLOB".to_owned(),
            // No native search-vector type; the column is a plain stub
            // (spec.md §4.7, §4.6 "SQLite's FTS path stubs the rank").
            ColumnTypeKind::FullText => "BLOB".to_owned(),
            ColumnTypeKind::Custom(name) => name.to_string(),
        }
    }

    fn oid_column_ddl(&self, detached: bool) -> String {
        if detached {
            "\"__oid\" INTEGER PRIMARY KEY AUTOINCREMENT".to_owned()
        } else {
            "\"__oid\" BIGINT PRIMARY KEY DEFAULT (stellator_next_oid())".to_owned()
        }
    }

    fn create_trigger_sql(&self, name: &TriggerName, fires_on: &str, action: &TriggerAction) -> Vec<String> {
        let body = Self::action_body(action);
        vec![format!(
            "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW BEGIN {body} END;",
            quote_ident(&name.render()),
            timing_sql(name.timing),
            event_sql(name.event),
            quote_ident(fires_on),
        )]
    }

    fn drop_trigger_sql(&self, name: &str, _fires_on: &str) -> Vec<String> {
        vec![format!("DROP TRIGGER IF EXISTS {};", quote_ident(name))]
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct PgsqlMigrationDialect;

impl PgsqlMigrationDialect {
    fn action_body(action: &TriggerAction) -> String {
        match action {
            TriggerAction::ObjectFk {
                source_table,
                source_field,
                on_delete,
            } => match on_delete.as_str() {
                "CASCADE" => format!("DELETE FROM {} WHERE {} = OLD.\"__oid\"; RETURN OLD;", quote_ident(source_table), quote_ident(source_field)),
                "SET_NULL" => format!(
                    "UPDATE {} SET {} = NULL WHERE {} = OLD.\"__oid\"; RETURN OLD;",
                    quote_ident(source_table),
                    quote_ident(source_field),
                    quote_ident(source_field)
                ),
                _ => "RAISE EXCEPTION 'restrict'; RETURN OLD;".to_owned(),
            },
            TriggerAction::CascadeDeleteTarget { target_table, target_field } => {
                format!(
                    "DELETE FROM {} WHERE \"__oid\" = OLD.{}; RETURN OLD;",
                    quote_ident(target_table),
                    quote_ident(target_field)
                )
            }
            TriggerAction::DeleteFromSideTable { side_table, key_column } => {
                format!("DELETE FROM {} WHERE {} = OLD.\"__oid\"; RETURN OLD;", quote_ident(side_table), quote_ident(key_column))
            }
            TriggerAction::AppendViewDelta { delta_table } => format!(
                "INSERT INTO {} (tag, object, time, \"user\") VALUES (NEW.parent_id, NEW.child_id, extract(epoch from now()) * 1000000, NULL); RETURN NEW;",
                quote_ident(delta_table)
            ),
            TriggerAction::EnqueueRemovedFile { source_field } => format!(
                "INSERT INTO \"__removed\" (\"object\") VALUES (OLD.{}); RETURN OLD;",
                quote_ident(source_field)
            ),
            TriggerAction::AppendSchemeDelta { delta_table, action, row_ref } => format!(
                "INSERT INTO {} (object, time, action, \"user\") VALUES ({row_ref}.\"__oid\", extract(epoch from now()) * 1000000, '{action}', NULL); RETURN {row_ref};",
                quote_ident(delta_table)
            ),
        }
    }
}

impl MigrationDialect for PgsqlMigrationDialect {
    fn column_type_sql(&self, kind: &ColumnTypeKind) -> String {
        match kind {
            ColumnTypeKind::Integer => "BIGINT".to_owned(),
            ColumnTypeKind::Float => "DOUBLE PRECISION".to_owned(),
            ColumnTypeKind::Boolean => "BOOLEAN".to_owned(),
            ColumnTypeKind::Text => "TEXT".to_owned(),
            ColumnTypeKind::Blob => "BYTEA".to_owned(),
            ColumnTypeKind::FullText => "TSVECTOR".to_owned(),
            ColumnTypeKind::Custom(name) => name.to_string(),
        }
    }

    fn oid_column_ddl(&self, detached: bool) -> String {
        if detached {
            "\"__oid\" BIGSERIAL PRIMARY KEY".to_owned()
        } else {
            "\"__oid\" BIGINT PRIMARY KEY DEFAULT stellator_next_oid()".to_owned()
        }
    }

    fn create_trigger_sql(&self, name: &TriggerName, fires_on: &str, action: &TriggerAction) -> Vec<String> {
        let function_name = format!("{}_fn", name.render().replace([':', '@'], "_").to_lowercase());
        let body = Self::action_body(action);
        vec![
            format!(
                "CREATE OR REPLACE FUNCTION {}() RETURNS TRIGGER AS $$ BEGIN {body} END; $$ LANGUAGE plpgsql;",
                quote_ident(&function_name)
            ),
            format!(
                "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW EXECUTE FUNCTION {}();",
                quote_ident(&name.render()),
                timing_sql(name.timing),
                event_sql(name.event),
                quote_ident(fires_on),
                quote_ident(&function_name),
            ),
        ]
    }

    fn drop_trigger_sql(&self, name: &str, fires_on: &str) -> Vec<String> {
        vec![format!("DROP TRIGGER IF EXISTS {} ON {};", quote_ident(name), quote_ident(fires_on))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_oid_column_differs_between_detached_and_attached() {
        let dialect = SqliteMigrationDialect;
        assert!(dialect.oid_column_ddl(true).contains("AUTOINCREMENT"));
        assert!(dialect.oid_column_ddl(false).contains("stellator_next_oid"));
    }

    #[test]
    fn pgsql_trigger_creates_function_then_trigger() {
        let dialect = PgsqlMigrationDialect;
        let name = TriggerName {
            timing: TriggerTiming::Before,
            event: TriggerEvent::Delete,
            source: "post".into(),
            source_field: None,
            target: "user".into(),
            target_field: None,
            policy: "cascade".into(),
        };
        let action = TriggerAction::DeleteFromSideTable {
            side_table: "post_f_tags".into(),
            key_column: "parent_id".into(),
        };
        let statements = dialect.create_trigger_sql(&name, "user", &action);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE OR REPLACE FUNCTION"));
        assert!(statements[1].starts_with("CREATE TRIGGER"));
        assert!(statements[1].contains("ON \"user\""));
    }

    #[test]
    fn sqlite_object_fk_cascade_names_real_tables() {
        let dialect = SqliteMigrationDialect;
        let name = TriggerName {
            timing: TriggerTiming::Before,
            event: TriggerEvent::Delete,
            source: "post".into(),
            source_field: Some("owner".into()),
            target: "user".into(),
            target_field: None,
            policy: "cascade".into(),
        };
        let action = TriggerAction::ObjectFk {
            source_table: "post".into(),
            source_field: "owner".into(),
            on_delete: "CASCADE".into(),
        };
        let statements = dialect.create_trigger_sql(&name, "user", &action);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("DELETE FROM \"post\" WHERE \"owner\" = OLD.\"__oid\""));
        assert!(!statements[0].contains('{'));
    }
}
