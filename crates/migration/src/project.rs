// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Projecting the declared schemes into a target [`DatabaseShape`]
//! (spec.md §4.7 "Projection from schema").

use smol_str::SmolStr;
use stratum_core::schema::field::{FieldFlags, FieldKind, OnRemove, ScalarKind};
use stratum_core::schema::registry::SchemeRegistry;
use stratum_core::schema::Scheme;

use crate::dialect::{ColumnTypeKind, TriggerAction};
use crate::naming::{scheme_delta_table, side_table, view_delta_table, view_table};
use crate::shape::{ColumnShape, DatabaseShape, IndexShape, TableShape, TriggerEvent, TriggerShape, TriggerTiming};
use crate::trigger::TriggerName;

fn scalar_column_kind(kind: &FieldKind) -> ColumnTypeKind {
    match kind {
        FieldKind::Integer | FieldKind::File | FieldKind::Image | FieldKind::Object { .. } => ColumnTypeKind::Integer,
        FieldKind::Float => ColumnTypeKind::Float,
        FieldKind::Boolean => ColumnTypeKind::Boolean,
        FieldKind::Text => ColumnTypeKind::Text,
        FieldKind::Bytes | FieldKind::Data | FieldKind::Extra { .. } => ColumnTypeKind::Blob,
        FieldKind::FullTextView(_) => ColumnTypeKind::FullText,
        FieldKind::Custom { sql_type } => ColumnTypeKind::Custom(sql_type.clone()),
        FieldKind::Set { .. } | FieldKind::Array { .. } | FieldKind::View(_) | FieldKind::Virtual => {
            unreachable!("relation/virtual fields are never plain columns")
        }
    }
}

fn array_element_kind(element: ScalarKind) -> ColumnTypeKind {
    match element {
        ScalarKind::Integer => ColumnTypeKind::Integer,
        ScalarKind::Float => ColumnTypeKind::Float,
        ScalarKind::Boolean => ColumnTypeKind::Boolean,
        ScalarKind::Text => ColumnTypeKind::Text,
        ScalarKind::Bytes => ColumnTypeKind::Blob,
    }
}

fn column_type_sql(dialect: &dyn crate::dialect::MigrationDialect, kind: &ColumnTypeKind) -> SmolStr {
    SmolStr::new(dialect.column_type_sql(kind))
}

/// Project one scheme's own table: `__oid` plus every scalar-column field
/// (spec.md §4.7 "One table per scheme").
fn project_table(dialect: &dyn crate::dialect::MigrationDialect, scheme: &Scheme) -> TableShape {
    let mut columns = vec![ColumnShape {
        name: "__oid".into(),
        sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
        not_null: true,
        primary_key: true,
    }];
    for (name, field) in scheme.column_fields() {
        columns.push(ColumnShape {
            name: SmolStr::new(name),
            sql_type: column_type_sql(dialect, &scalar_column_kind(&field.kind)),
            not_null: field.flags.contains(FieldFlags::REQUIRED),
            primary_key: false,
        });
    }
    TableShape {
        name: SmolStr::new(scheme.name()),
        columns,
        detached: scheme.is_detached(),
    }
}

/// Side tables + indices a `Set`/`Array`/`View` field needs (spec.md §4.7
/// "Projection from schema"), appended into `shape`.
fn project_relation_fields(dialect: &dyn crate::dialect::MigrationDialect, scheme: &Scheme, shape: &mut DatabaseShape) {
    for (name, field) in scheme.relation_fields() {
        match &field.kind {
            FieldKind::Set { foreign_link: None, .. } => {
                let table = side_table(scheme.name(), name);
                shape.tables.push(TableShape {
                    name: SmolStr::new(&table),
                    columns: vec![
                        ColumnShape {
                            name: "parent_id".into(),
                            sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                            not_null: true,
                            primary_key: false,
                        },
                        ColumnShape {
                            name: "child_id".into(),
                            sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                            not_null: true,
                            primary_key: false,
                        },
                    ],
                    detached: false,
                });
                shape.indices.push(IndexShape {
                    name: SmolStr::new(format!("{table}_parent_idx")),
                    table: SmolStr::new(&table),
                    unique: false,
                    columns: vec!["parent_id".into()],
                    auto_named: false,
                });
                shape.indices.push(IndexShape {
                    name: SmolStr::new(format!("{table}_child_idx")),
                    table: SmolStr::new(&table),
                    unique: false,
                    columns: vec!["child_id".into()],
                    auto_named: false,
                });
            }
            FieldKind::Set {
                foreign_link: Some(_), ..
            } => {
                // Reverse-FK Set: membership lives on the target scheme's
                // own FK column, no join table needed (spec.md §4.7).
            }
            FieldKind::Array { element } => {
                let table = side_table(scheme.name(), name);
                let unique = field.flags.contains(FieldFlags::UNIQUE);
                shape.tables.push(TableShape {
                    name: SmolStr::new(&table),
                    columns: vec![
                        ColumnShape {
                            name: "parent_id".into(),
                            sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                            not_null: true,
                            primary_key: false,
                        },
                        ColumnShape {
                            name: "data".into(),
                            sql_type: column_type_sql(dialect, &array_element_kind(*element)),
                            not_null: true,
                            primary_key: false,
                        },
                    ],
                    detached: false,
                });
                shape.indices.push(IndexShape {
                    name: SmolStr::new(format!("{table}_parent_idx")),
                    table: SmolStr::new(&table),
                    unique: false,
                    columns: vec!["parent_id".into()],
                    auto_named: false,
                });
                if unique {
                    shape.indices.push(IndexShape {
                        name: SmolStr::new(format!("{table}_data_uq")),
                        table: SmolStr::new(&table),
                        unique: true,
                        columns: vec!["data".into()],
                        auto_named: false,
                    });
                }
            }
            FieldKind::View(view) => {
                let table = view_table(scheme.name(), name);
                shape.tables.push(TableShape {
                    name: SmolStr::new(&table),
                    columns: vec![
                        ColumnShape {
                            name: "parent_id".into(),
                            sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                            not_null: true,
                            primary_key: false,
                        },
                        ColumnShape {
                            name: "child_id".into(),
                            sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                            not_null: true,
                            primary_key: false,
                        },
                        ColumnShape {
                            name: "__vid".into(),
                            sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                            not_null: true,
                            primary_key: false,
                        },
                    ],
                    detached: false,
                });
                shape.indices.push(IndexShape {
                    name: SmolStr::new(format!("{table}_parent_idx")),
                    table: SmolStr::new(&table),
                    unique: false,
                    columns: vec!["parent_id".into()],
                    auto_named: false,
                });
                shape.indices.push(IndexShape {
                    name: SmolStr::new(format!("{table}_child_idx")),
                    table: SmolStr::new(&table),
                    unique: false,
                    columns: vec!["child_id".into()],
                    auto_named: false,
                });
                if view.delta {
                    let delta_table = view_delta_table(scheme.name(), name);
                    shape.tables.push(TableShape {
                        name: SmolStr::new(&delta_table),
                        columns: vec![
                            ColumnShape {
                                name: "tag".into(),
                                sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                                not_null: true,
                                primary_key: false,
                            },
                            ColumnShape {
                                name: "object".into(),
                                sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                                not_null: true,
                                primary_key: false,
                            },
                            ColumnShape {
                                name: "time".into(),
                                sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                                not_null: true,
                                primary_key: false,
                            },
                            ColumnShape {
                                name: "user".into(),
                                sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                                not_null: false,
                                primary_key: false,
                            },
                        ],
                        detached: false,
                    });
                    shape.triggers.push(TriggerShape {
                        name: SmolStr::new(
                            TriggerName {
                                timing: TriggerTiming::After,
                                event: TriggerEvent::Insert,
                                source: SmolStr::new(&table),
                                source_field: None,
                                target: SmolStr::new(&delta_table),
                                target_field: None,
                                policy: "delta".into(),
                            }
                            .render(),
                        ),
                        table: SmolStr::new(&table),
                        timing: TriggerTiming::After,
                        event: TriggerEvent::Insert,
                    });
                }
            }
            FieldKind::FullTextView(_) => {}
            FieldKind::Integer
            | FieldKind::Float
            | FieldKind::Boolean
            | FieldKind::Text
            | FieldKind::Bytes
            | FieldKind::Data
            | FieldKind::Extra { .. }
            | FieldKind::File
            | FieldKind::Image
            | FieldKind::Object { .. }
            | FieldKind::Custom { .. }
            | FieldKind::Virtual => {
                unreachable!("relation_fields() only yields Set/Array/View/FullTextView")
            }
        }
    }
}

/// Cascade/removal triggers for `Object`/`Set`/`Array`/`View`/`File` fields
/// (spec.md §4.7 "Triggers").
fn project_triggers(dialect: &dyn crate::dialect::MigrationDialect, scheme: &Scheme, shape: &mut DatabaseShape) {
    for (name, field) in scheme.fields() {
        match &field.kind {
            FieldKind::Object { target, on_remove } => {
                let policy = match on_remove {
                    OnRemove::Cascade => "CASCADE",
                    OnRemove::SetNull => "SET_NULL",
                    OnRemove::Restrict => "RESTRICT",
                    OnRemove::Reference | OnRemove::StrongReference => "REFERENCE",
                };
                let trigger_name = TriggerName {
                    timing: TriggerTiming::Before,
                    event: TriggerEvent::Delete,
                    source: SmolStr::new(scheme.name()),
                    source_field: Some(SmolStr::new(name)),
                    target: SmolStr::new(target),
                    target_field: None,
                    policy: policy.into(),
                };
                shape.triggers.push(TriggerShape {
                    name: SmolStr::new(trigger_name.render()),
                    table: SmolStr::new(target),
                    timing: TriggerTiming::Before,
                    event: TriggerEvent::Delete,
                });
                if matches!(on_remove, OnRemove::StrongReference) {
                    // The target is owned by this field: reassigning it
                    // (UPDATE) or removing the owner (DELETE) both cascade
                    // deletion of the previously-referenced target row.
                    for event in [TriggerEvent::Update, TriggerEvent::Delete] {
                        let strong_name = TriggerName {
                            timing: TriggerTiming::Before,
                            event,
                            source: SmolStr::new(scheme.name()),
                            source_field: Some(SmolStr::new(name)),
                            target: SmolStr::new(target),
                            target_field: None,
                            policy: "strong_reference".into(),
                        };
                        shape.triggers.push(TriggerShape {
                            name: SmolStr::new(strong_name.render()),
                            table: SmolStr::new(scheme.name()),
                            timing: TriggerTiming::Before,
                            event,
                        });
                    }
                }
            }
            FieldKind::Set {
                target,
                foreign_link: None,
                on_remove,
            } => {
                let table = side_table(scheme.name(), name);
                shape.triggers.push(TriggerShape {
                    name: SmolStr::new(
                        TriggerName {
                            timing: TriggerTiming::Before,
                            event: TriggerEvent::Delete,
                            source: SmolStr::new(scheme.name()),
                            source_field: Some(SmolStr::new(name)),
                            target: SmolStr::new(&table),
                            target_field: None,
                            policy: "join_parent".into(),
                        }
                        .render(),
                    ),
                    table: SmolStr::new(scheme.name()),
                    timing: TriggerTiming::Before,
                    event: TriggerEvent::Delete,
                });
                shape.triggers.push(TriggerShape {
                    name: SmolStr::new(
                        TriggerName {
                            timing: TriggerTiming::Before,
                            event: TriggerEvent::Delete,
                            source: SmolStr::new(target),
                            source_field: None,
                            target: SmolStr::new(&table),
                            target_field: None,
                            policy: "join_child".into(),
                        }
                        .render(),
                    ),
                    table: SmolStr::new(target),
                    timing: TriggerTiming::Before,
                    event: TriggerEvent::Delete,
                });
                if matches!(on_remove, OnRemove::StrongReference) {
                    // The join table owns no rows of its own: a removed
                    // join row means the child it pointed at should go too.
                    shape.triggers.push(TriggerShape {
                        name: SmolStr::new(
                            TriggerName {
                                timing: TriggerTiming::After,
                                event: TriggerEvent::Delete,
                                source: SmolStr::new(&table),
                                source_field: Some("child_id".into()),
                                target: SmolStr::new(target),
                                target_field: None,
                                policy: "strong_reference".into(),
                            }
                            .render(),
                        ),
                        table: SmolStr::new(&table),
                        timing: TriggerTiming::After,
                        event: TriggerEvent::Delete,
                    });
                }
            }
            FieldKind::Array { .. } => {
                let table = side_table(scheme.name(), name);
                shape.triggers.push(TriggerShape {
                    name: SmolStr::new(
                        TriggerName {
                            timing: TriggerTiming::Before,
                            event: TriggerEvent::Delete,
                            source: SmolStr::new(scheme.name()),
                            source_field: Some(SmolStr::new(name)),
                            target: SmolStr::new(&table),
                            target_field: None,
                            policy: "side_table".into(),
                        }
                        .render(),
                    ),
                    table: SmolStr::new(scheme.name()),
                    timing: TriggerTiming::Before,
                    event: TriggerEvent::Delete,
                });
            }
            FieldKind::View(_) => {
                let table = view_table(scheme.name(), name);
                shape.triggers.push(TriggerShape {
                    name: SmolStr::new(
                        TriggerName {
                            timing: TriggerTiming::Before,
                            event: TriggerEvent::Delete,
                            source: SmolStr::new(scheme.name()),
                            source_field: Some(SmolStr::new(name)),
                            target: SmolStr::new(&table),
                            target_field: None,
                            policy: "view_parent".into(),
                        }
                        .render(),
                    ),
                    table: SmolStr::new(scheme.name()),
                    timing: TriggerTiming::Before,
                    event: TriggerEvent::Delete,
                });
            }
            FieldKind::File | FieldKind::Image => {
                shape.triggers.push(TriggerShape {
                    name: SmolStr::new(
                        TriggerName {
                            timing: TriggerTiming::After,
                            event: TriggerEvent::Update,
                            source: SmolStr::new(scheme.name()),
                            source_field: Some(SmolStr::new(name)),
                            target: "__removed".into(),
                            target_field: None,
                            policy: "enqueue_removed".into(),
                        }
                        .render(),
                    ),
                    table: SmolStr::new(scheme.name()),
                    timing: TriggerTiming::After,
                    event: TriggerEvent::Update,
                });
            }
            _ => {}
        }
    }
    if scheme.has_delta() {
        let delta_table = scheme_delta_table(scheme.name());
        shape.tables.push(TableShape {
            name: SmolStr::new(&delta_table),
            columns: vec![
                ColumnShape {
                    name: "object".into(),
                    sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                    not_null: true,
                    primary_key: false,
                },
                ColumnShape {
                    name: "time".into(),
                    sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                    not_null: true,
                    primary_key: false,
                },
                ColumnShape {
                    name: "action".into(),
                    sql_type: column_type_sql(dialect, &ColumnTypeKind::Text),
                    not_null: true,
                    primary_key: false,
                },
                ColumnShape {
                    name: "user".into(),
                    sql_type: column_type_sql(dialect, &ColumnTypeKind::Integer),
                    not_null: false,
                    primary_key: false,
                },
            ],
            detached: false,
        });
        shape.indices.push(IndexShape {
            name: SmolStr::new(format!("{delta_table}_object_idx")),
            table: SmolStr::new(&delta_table),
            unique: false,
            columns: vec!["object".into()],
            auto_named: false,
        });
        shape.indices.push(IndexShape {
            name: SmolStr::new(format!("{delta_table}_time_idx")),
            table: SmolStr::new(&delta_table),
            unique: false,
            columns: vec!["time".into()],
            auto_named: false,
        });
        // One trigger per mutating event, so `__delta_*.action` records
        // which of create/update/delete actually happened rather than
        // collapsing every change into a single insert-time record.
        for event in [TriggerEvent::Insert, TriggerEvent::Update, TriggerEvent::Delete] {
            shape.triggers.push(TriggerShape {
                name: SmolStr::new(
                    TriggerName {
                        timing: TriggerTiming::After,
                        event,
                        source: SmolStr::new(scheme.name()),
                        source_field: None,
                        target: SmolStr::new(&delta_table),
                        target_field: None,
                        policy: "scheme_delta".into(),
                    }
                    .render(),
                ),
                table: SmolStr::new(scheme.name()),
                timing: TriggerTiming::After,
                event,
            });
        }
    }
}

/// The SQL-level action a migration-authored [`TriggerShape`] should run,
/// recovered from its own name (spec.md §4.7 "a trigger's purpose is
/// encoded in its name"). Used when (re)creating a trigger, never when
/// merely deciding whether one is missing.
#[must_use]
pub fn trigger_action_for(name: &TriggerName) -> TriggerAction {
    match name.policy.as_str() {
        "CASCADE" | "SET_NULL" | "RESTRICT" | "REFERENCE" => TriggerAction::ObjectFk {
            source_table: name.source.clone(),
            source_field: name.source_field.clone().unwrap_or_default(),
            on_delete: name.policy.clone(),
        },
        "strong_reference" => TriggerAction::CascadeDeleteTarget {
            target_table: name.target.clone(),
            target_field: name.source_field.clone().unwrap_or_default(),
        },
        "join_parent" => TriggerAction::DeleteFromSideTable {
            side_table: name.target.clone(),
            key_column: "parent_id".into(),
        },
        "join_child" => TriggerAction::DeleteFromSideTable {
            side_table: name.target.clone(),
            key_column: "child_id".into(),
        },
        "side_table" => TriggerAction::DeleteFromSideTable {
            side_table: name.target.clone(),
            key_column: "parent_id".into(),
        },
        "view_parent" => TriggerAction::DeleteFromSideTable {
            side_table: name.target.clone(),
            key_column: "parent_id".into(),
        },
        "delta" => TriggerAction::AppendViewDelta {
            delta_table: name.target.clone(),
        },
        "enqueue_removed" => TriggerAction::EnqueueRemovedFile {
            source_field: name.source_field.clone().unwrap_or_default(),
        },
        "scheme_delta" => TriggerAction::AppendSchemeDelta {
            delta_table: name.target.clone(),
            // Matches `stratum_core::util::clock::DeltaAction::as_str`.
            action: match name.event {
                TriggerEvent::Insert => "create".into(),
                TriggerEvent::Update => "update".into(),
                TriggerEvent::Delete => "delete".into(),
            },
            row_ref: if name.event == TriggerEvent::Delete { "OLD".into() } else { "NEW".into() },
        },
        other => unreachable!("unknown migration trigger policy `{other}`"),
    }
}

/// Build the full target shape every registered scheme implies (spec.md
/// §4.7 "Projection from schema").
#[must_use]
pub fn project(dialect: &dyn crate::dialect::MigrationDialect, registry: &SchemeRegistry) -> DatabaseShape {
    let mut shape = DatabaseShape::default();
    for scheme in registry.iter() {
        shape.tables.push(project_table(dialect, scheme));
        project_relation_fields(dialect, scheme, &mut shape);
        project_triggers(dialect, scheme, &mut shape);
    }
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteMigrationDialect;
    use stratum_core::schema::field::Field;

    #[test]
    fn projects_table_join_table_and_trigger_for_a_set_relation() {
        let mut registry = SchemeRegistry::new();
        registry.register(Scheme::new("user")).unwrap();
        registry
            .register(
                Scheme::new("post").field(
                    "tags",
                    Field::new(FieldKind::Set {
                        target: "tag".into(),
                        foreign_link: None,
                        on_remove: OnRemove::Cascade,
                    }),
                ),
            )
            .unwrap();
        registry.register(Scheme::new("tag")).unwrap();
        registry.validate().unwrap();

        let shape = project(&SqliteMigrationDialect, &registry);
        assert!(shape.table("post_f_tags").is_some());
        assert!(shape
            .triggers
            .iter()
            .any(|t| t.name.contains("join_parent") && t.table == "post"));
        assert!(shape
            .triggers
            .iter()
            .any(|t| t.name.contains("join_child") && t.table == "tag"));
    }

    #[test]
    fn projects_delta_table_for_has_delta_schemes() {
        let mut registry = SchemeRegistry::new();
        registry.register(Scheme::new("post").with_delta(true)).unwrap();
        let shape = project(&SqliteMigrationDialect, &registry);
        assert!(shape.table("__delta_post").is_some());
        let delta_triggers: Vec<_> = shape.triggers.iter().filter(|t| t.name.contains("scheme_delta")).collect();
        assert_eq!(delta_triggers.len(), 3, "expected one scheme_delta trigger per mutating event");
        assert!(delta_triggers.iter().any(|t| t.event == TriggerEvent::Insert));
        assert!(delta_triggers.iter().any(|t| t.event == TriggerEvent::Update));
        assert!(delta_triggers.iter().any(|t| t.event == TriggerEvent::Delete));

        let action = trigger_action_for(&TriggerName::parse(&delta_triggers[0].name).unwrap());
        assert!(matches!(action, TriggerAction::AppendSchemeDelta { .. }));
    }
}
