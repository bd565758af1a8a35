// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Loading the live shape of a database (spec.md §4.7 "Introspection"):
//! SQLite via `sqlite_master`/`PRAGMA table_info`/`PRAGMA index_list`,
//! PostgreSQL via `information_schema`/`pg_catalog`. Raw SQL text only —
//! the execution mechanism is the same generic [`Connection`]/[`Statement`]
//! seam the repository layer already runs queries through, so this crate
//! never needs a dependency on either concrete driver.

use std::collections::HashMap;

use smol_str::SmolStr;
use stratum_driver::{BackendKind, ColumnValue, Connection, DriverResult, StepOutcome};

use crate::error::MigrationResult;
use crate::shape::{ColumnShape, DatabaseShape, IndexShape, TableShape, TriggerEvent, TriggerShape, TriggerTiming};

struct Rows {
    names: Vec<String>,
    data: Vec<Vec<ColumnValue>>,
}

fn run_query<C: Connection>(conn: &mut C, sql: &str) -> DriverResult<Rows> {
    let mut statement = conn.prepare(sql)?;
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
    Ok(Rows { names, data })
}

impl Rows {
    fn text(&self, row: &[ColumnValue], name: &str) -> Option<String> {
        let idx = self.names.iter().position(|n| n == name)?;
        match row.get(idx)? {
            ColumnValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn int(&self, row: &[ColumnValue], name: &str) -> Option<i64> {
        let idx = self.names.iter().position(|n| n == name)?;
        match row.get(idx)? {
            ColumnValue::Int(v) => Some(*v),
            ColumnValue::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }
}

fn sqlite_columns<C: Connection>(conn: &mut C, table: &str) -> MigrationResult<Vec<ColumnShape>> {
    let rows = run_query(conn, &format!("PRAGMA table_info({})", stratum_sql::quote_ident(table)))?;
    let mut columns = Vec::new();
    for cells in &rows.data {
        let name = rows.text(cells, "name").unwrap_or_default();
        let sql_type = rows.text(cells, "type").unwrap_or_default();
        let not_null = rows.int(cells, "notnull").unwrap_or(0) != 0;
        let primary_key = rows.int(cells, "pk").unwrap_or(0) != 0;
        columns.push(ColumnShape {
            name: SmolStr::new(name),
            sql_type: SmolStr::new(sql_type),
            not_null: not_null || primary_key,
            primary_key,
        });
    }
    Ok(columns)
}

fn sqlite_indices<C: Connection>(conn: &mut C, table: &str, shape: &mut DatabaseShape) -> MigrationResult<()> {
    let list = run_query(conn, &format!("PRAGMA index_list({})", stratum_sql::quote_ident(table)))?;
    for index_row in &list.data {
        let name = list.text(index_row, "name").unwrap_or_default();
        let unique = list.int(index_row, "unique").unwrap_or(0) != 0;
        let origin = list.text(index_row, "origin").unwrap_or_default();
        let info = run_query(conn, &format!("PRAGMA index_info({})", stratum_sql::quote_ident(&name)))?;
        let columns: Vec<SmolStr> = info
            .data
            .iter()
            .filter_map(|cells| info.text(cells, "name"))
            .map(SmolStr::new)
            .collect();
        shape.indices.push(IndexShape {
            name: SmolStr::new(&name),
            table: SmolStr::new(table),
            unique,
            columns,
            auto_named: origin != "c" || name.starts_with("sqlite_autoindex_"),
        });
    }
    Ok(())
}

/// Loads the live shape of a SQLite database (spec.md §4.7 "Introspection").
pub fn introspect_sqlite<C: Connection>(conn: &mut C) -> MigrationResult<DatabaseShape> {
    let mut shape = DatabaseShape::default();
    let master = run_query(
        conn,
        "SELECT name, type, tbl_name FROM sqlite_master WHERE type IN ('table', 'trigger') AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut trigger_rows = Vec::new();
    for cells in &master.data {
        let name = master.text(cells, "name").unwrap_or_default();
        let kind = master.text(cells, "type").unwrap_or_default();
        let owner_table = master.text(cells, "tbl_name").unwrap_or_default();
        match kind.as_str() {
            "table" => {
                let columns = sqlite_columns(conn, &name)?;
                sqlite_indices(conn, &name, &mut shape)?;
                shape.tables.push(TableShape {
                    name: SmolStr::new(name),
                    columns,
                    detached: false,
                });
            }
            "trigger" => trigger_rows.push((name, owner_table)),
            _ => {}
        }
    }
    for (name, owner_table) in trigger_rows {
        let Some((timing, event)) = sqlite_trigger_timing_event(conn, &name)? else {
            continue;
        };
        shape.triggers.push(TriggerShape {
            name: SmolStr::new(name),
            table: SmolStr::new(owner_table),
            timing,
            event,
        });
    }
    Ok(shape)
}

/// `CREATE TRIGGER` isn't introspectable structurally in SQLite the way
/// columns/indices are — the statement itself has to be parsed back out of
/// `sqlite_master.sql` for its timing/event keywords. The planner never
/// parses a trigger's body (spec.md §4.7), only this header.
fn sqlite_trigger_timing_event<C: Connection>(conn: &mut C, name: &str) -> MigrationResult<Option<(TriggerTiming, TriggerEvent)>> {
    let rows = run_query(
        conn,
        &format!(
            "SELECT sql FROM sqlite_master WHERE type = 'trigger' AND name = '{}'",
            name.replace('\'', "''")
        ),
    )?;
    let Some(cells) = rows.data.first() else {
        return Ok(None);
    };
    let Some(sql) = rows.text(cells, "sql") else {
        return Ok(None);
    };
    let upper = sql.to_uppercase();
    let timing = if upper.contains("BEFORE") {
        TriggerTiming::Before
    } else {
        TriggerTiming::After
    };
    let event = if upper.contains("DELETE") {
        TriggerEvent::Delete
    } else if upper.contains("UPDATE") {
        TriggerEvent::Update
    } else {
        TriggerEvent::Insert
    };
    Ok(Some((timing, event)))
}

fn pgsql_column_type(udt_name: &str) -> SmolStr {
    SmolStr::new(udt_name.to_uppercase())
}

/// Loads the live shape of a PostgreSQL database (spec.md §4.7
/// "Introspection") from `information_schema` and `pg_catalog`.
pub fn introspect_pgsql<C: Connection>(conn: &mut C) -> MigrationResult<DatabaseShape> {
    let mut shape = DatabaseShape::default();
    let tables = run_query(
        conn,
        "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
    )?;
    let mut primary_keys: HashMap<String, Vec<String>> = HashMap::new();
    let pk_rows = run_query(
        conn,
        "SELECT tc.table_name, kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
         WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = 'public'",
    )?;
    for cells in &pk_rows.data {
        let table = pk_rows.text(cells, "table_name").unwrap_or_default();
        let column = pk_rows.text(cells, "column_name").unwrap_or_default();
        primary_keys.entry(table).or_default().push(column);
    }

    for cells in &tables.data {
        let table_name = tables.text(cells, "table_name").unwrap_or_default();
        let columns_rows = run_query(
            conn,
            &format!(
                "SELECT column_name, udt_name, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = '{}' ORDER BY ordinal_position",
                table_name.replace('\'', "''")
            ),
        )?;
        let pk_columns = primary_keys.get(&table_name).cloned().unwrap_or_default();
        let columns = columns_rows
            .data
            .iter()
            .map(|row| {
                let name = columns_rows.text(row, "column_name").unwrap_or_default();
                let udt_name = columns_rows.text(row, "udt_name").unwrap_or_default();
                let is_nullable = columns_rows.text(row, "is_nullable").unwrap_or_default();
                let primary_key = pk_columns.iter().any(|pk| pk == &name);
                ColumnShape {
                    name: SmolStr::new(&name),
                    sql_type: pgsql_column_type(&udt_name),
                    not_null: is_nullable != "YES" || primary_key,
                    primary_key,
                }
            })
            .collect();
        shape.tables.push(TableShape {
            name: SmolStr::new(&table_name),
            columns,
            detached: false,
        });

        let index_rows = run_query(
            conn,
            &format!(
                "SELECT indexname, indexdef FROM pg_indexes WHERE schemaname = 'public' AND tablename = '{}'",
                table_name.replace('\'', "''")
            ),
        )?;
        for row in &index_rows.data {
            let name = index_rows.text(row, "indexname").unwrap_or_default();
            let def = index_rows.text(row, "indexdef").unwrap_or_default();
            let unique = def.to_uppercase().contains("UNIQUE");
            let columns = parse_index_columns(&def);
            let auto_named = name.ends_with("_pkey") || name.ends_with("_key");
            shape.indices.push(IndexShape {
                name: SmolStr::new(&name),
                table: SmolStr::new(&table_name),
                unique,
                columns,
                auto_named,
            });
        }
    }

    let trigger_rows = run_query(
        conn,
        "SELECT trigger_name, event_object_table, action_timing, event_manipulation \
         FROM information_schema.triggers WHERE trigger_schema = 'public'",
    )?;
    for row in &trigger_rows.data {
        let name = trigger_rows.text(row, "trigger_name").unwrap_or_default();
        let table = trigger_rows.text(row, "event_object_table").unwrap_or_default();
        let timing = if trigger_rows.text(row, "action_timing").unwrap_or_default() == "BEFORE" {
            TriggerTiming::Before
        } else {
            TriggerTiming::After
        };
        let event = match trigger_rows.text(row, "event_manipulation").unwrap_or_default().as_str() {
            "DELETE" => TriggerEvent::Delete,
            "UPDATE" => TriggerEvent::Update,
            _ => TriggerEvent::Insert,
        };
        shape.triggers.push(TriggerShape {
            name: SmolStr::new(name),
            table: SmolStr::new(table),
            timing,
            event,
        });
    }
    Ok(shape)
}

fn parse_index_columns(create_index_sql: &str) -> Vec<SmolStr> {
    let Some(open) = create_index_sql.find('(') else {
        return Vec::new();
    };
    let Some(close) = create_index_sql.rfind(')') else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    create_index_sql[open + 1..close]
        .split(',')
        .map(|c| SmolStr::new(c.trim().trim_matches('"')))
        .collect()
}

/// Dispatch introspection by backend, used by [`crate::plan`].
pub fn introspect<C: Connection>(backend: BackendKind, conn: &mut C) -> MigrationResult<DatabaseShape> {
    match backend {
        BackendKind::Sqlite => introspect_sqlite(conn),
        BackendKind::Pgsql => introspect_pgsql(conn),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_columns_out_of_a_create_index_statement() {
        let columns = parse_index_columns("CREATE UNIQUE INDEX post_title_idx ON post (title, owner)");
        assert_eq!(columns, vec![SmolStr::new("title"), SmolStr::new("owner")]);
    }

    #[test]
    fn pgsql_column_type_is_upper_cased() {
        assert_eq!(pgsql_column_type("int8"), "INT8");
    }
}
