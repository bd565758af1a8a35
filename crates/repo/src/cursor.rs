// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The result cursor (C2, spec.md §4.2): typed getters over one row plus a
//! `decode` that walks a [`Scheme`]'s field list and assembles a
//! [`Value::Dict`], recognising the handful of `__`-prefixed columns the
//! translator (C6) emits for deletion markers, delta joins and full-text
//! rank.

use smol_str::SmolStr;
use stratum_core::schema::field::FieldKind;
use stratum_core::schema::Scheme;
use stratum_core::value::{Dict, Value};
use stratum_driver::{ColumnValue, Row};

use crate::error::{RepoError, RepoResult};

/// A thin, typed wrapper over one [`Row`], handed to `Worker` callers that
/// only want a couple of columns rather than a full `decode`.
#[derive(Debug)]
pub struct Cursor<'s> {
    row: Row<'s>,
}

impl<'s> Cursor<'s> {
    #[must_use]
    pub const fn new(row: Row<'s>) -> Self {
        Self { row }
    }

    #[must_use]
    pub fn row(&self) -> &Row<'s> {
        &self.row
    }

    pub fn get_i64(&self, index: usize) -> Option<i64> {
        match self.row.by_index(index)? {
            ColumnValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64_by_name(&self, name: &str) -> Option<i64> {
        match self.row.by_name(name)? {
            ColumnValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_f64_by_name(&self, name: &str) -> Option<f64> {
        match self.row.by_name(name)? {
            ColumnValue::Float(v) => Some(*v),
            ColumnValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_str_by_name(&self, name: &str) -> Option<&str> {
        match self.row.by_name(name)? {
            ColumnValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_bool_by_name(&self, name: &str) -> Option<bool> {
        match self.row.by_name(name)? {
            ColumnValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Walk `scheme`'s field list and assemble a [`Value::Dict`]. `virtuals`
    /// supplies values for any [`FieldKind::Virtual`] field present on the
    /// scheme (spec.md §4.2): the cursor itself never invokes scheme hooks.
    pub fn decode(&self, scheme: &Scheme, virtuals: &Dict) -> RepoResult<Value> {
        let mut out = Dict::new();

        if let Some(oid) = self.get_i64_by_name("__oid") {
            out.insert("__oid", Value::Int(oid));
        }

        for (name, field) in scheme.fields() {
            if field.kind.is_relation() {
                continue;
            }
            if field.kind.is_virtual() {
                out.insert(name, virtuals.get(name).cloned().unwrap_or(Value::Null));
                continue;
            }
            let Some(raw) = self.row.by_name(name) else {
                continue;
            };
            out.insert(name, decode_column(&field.kind, raw)?);
        }

        self.decode_view_delete_marker(&mut out);
        self.decode_delta_join(&mut out);
        self.decode_fulltext_rank(&mut out);

        Ok(Value::Dict(out))
    }

    /// `__vid == 0` marks a view-join row whose target has been deleted;
    /// spec.md §4.2 asks for a synthesised `__delta: { action: "delete" }`.
    fn decode_view_delete_marker(&self, out: &mut Dict) {
        let Some(vid) = self.get_i64_by_name("__vid") else {
            return;
        };
        out.insert("__vid", Value::Int(vid));
        if vid == 0 {
            let mut delta = Dict::new();
            delta.insert("action", Value::Text("delete".to_owned()));
            out.insert("__delta", Value::Dict(delta));
        }
    }

    /// `__d_action`/`__d_time`/`__d_object`/`__d_user` are materialised into
    /// one nested `__delta` sub-document.
    fn decode_delta_join(&self, out: &mut Dict) {
        const DELTA_COLUMNS: [(&str, &str); 4] = [
            ("__d_action", "action"),
            ("__d_time", "time"),
            ("__d_object", "object"),
            ("__d_user", "user"),
        ];
        let mut delta = Dict::new();
        for (column, key) in DELTA_COLUMNS {
            if let Some(raw) = self.row.by_name(column) {
                delta.insert(key, raw.clone().into());
            }
        }
        if !delta.is_empty() {
            out.insert("__delta", Value::Dict(delta));
        }
    }

    /// `__ts_rank_{field}` is exposed both under its raw column name and
    /// under the stripped field name (spec.md §4.2).
    fn decode_fulltext_rank(&self, out: &mut Dict) {
        const PREFIX: &str = "__ts_rank_";
        for column in self.row.column_names() {
            let Some(field) = column.strip_prefix(PREFIX) else {
                continue;
            };
            let Some(raw) = self.row.by_name(column) else {
                continue;
            };
            let value: Value = raw.clone().into();
            out.insert(SmolStr::new(column), value.clone());
            out.insert(SmolStr::new(field), value);
        }
    }
}

/// Coerce a raw [`ColumnValue`] into the [`Value`] shape appropriate for
/// `kind`. Most kinds pass the decoded primitive straight through; this
/// only exists to give a place to reject a backend returning the wrong
/// SQL type for a declared field.
fn decode_column(kind: &FieldKind, raw: &ColumnValue) -> RepoResult<Value> {
    match (kind, raw) {
        (_, ColumnValue::Null) => Ok(Value::Null),
        (FieldKind::Integer | FieldKind::Object { .. }, ColumnValue::Int(v)) => Ok(Value::Int(*v)),
        (FieldKind::Float, ColumnValue::Float(v)) => Ok(Value::Float(*v)),
        (FieldKind::Float, ColumnValue::Int(v)) => Ok(Value::Float(*v as f64)),
        (FieldKind::Boolean, ColumnValue::Bool(v)) => Ok(Value::Bool(*v)),
        (FieldKind::Boolean, ColumnValue::Int(v)) => Ok(Value::Bool(*v != 0)),
        (FieldKind::Text, ColumnValue::Text(v)) => Ok(Value::Text(v.clone())),
        (FieldKind::Bytes | FieldKind::Data | FieldKind::Extra { .. } | FieldKind::File | FieldKind::Image, ColumnValue::Blob(v)) => {
            Ok(Value::Bytes(v.clone()))
        }
        (FieldKind::Custom { .. }, _) => Ok(raw.clone().into()),
        (_, other) => Err(RepoError::Bug(format!(
            "column decoded to an incompatible shape for field kind {kind:?}: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::schema::field::{Field, FieldFlags};

    fn scheme() -> Scheme {
        Scheme::new("track")
            .field("title", Field::new(FieldKind::Text))
            .field("rating", Field::new(FieldKind::Float))
            .field("summary", Field::new(FieldKind::Virtual).with_flags(FieldFlags::empty()))
    }

    #[test]
    fn decode_builds_dict_with_virtual_and_oid() {
        let names = vec!["__oid".to_owned(), "title".to_owned(), "rating".to_owned()];
        let row = Row::new(&names, vec![ColumnValue::Int(7), ColumnValue::Text("Song".to_owned()), ColumnValue::Float(4.5)]);
        let cursor = Cursor::new(row);
        let mut virtuals = Dict::new();
        virtuals.insert("summary", Value::Text("a great song".to_owned()));

        let decoded = cursor.decode(&scheme(), &virtuals).unwrap();
        let dict = decoded.as_dict().unwrap();
        assert_eq!(dict.get("__oid"), Some(&Value::Int(7)));
        assert_eq!(dict.get("title"), Some(&Value::Text("Song".to_owned())));
        assert_eq!(dict.get("rating"), Some(&Value::Float(4.5)));
        assert_eq!(dict.get("summary"), Some(&Value::Text("a great song".to_owned())));
    }

    #[test]
    fn decode_synthesises_delete_marker_on_zero_vid() {
        let names = vec!["__oid".to_owned(), "__vid".to_owned()];
        let row = Row::new(&names, vec![ColumnValue::Int(1), ColumnValue::Int(0)]);
        let cursor = Cursor::new(row);
        let decoded = cursor.decode(&Scheme::new("empty"), &Dict::new()).unwrap();
        let dict = decoded.as_dict().unwrap();
        let delta = dict.get("__delta").and_then(Value::as_dict).unwrap();
        assert_eq!(delta.get("action"), Some(&Value::Text("delete".to_owned())));
    }

    #[test]
    fn decode_exposes_fulltext_rank_under_both_names() {
        let names = vec!["__oid".to_owned(), "__ts_rank_summary".to_owned()];
        let row = Row::new(&names, vec![ColumnValue::Int(1), ColumnValue::Float(0.75)]);
        let cursor = Cursor::new(row);
        let decoded = cursor.decode(&Scheme::new("empty"), &Dict::new()).unwrap();
        let dict = decoded.as_dict().unwrap();
        assert_eq!(dict.get("__ts_rank_summary"), Some(&Value::Float(0.75)));
        assert_eq!(dict.get("summary"), Some(&Value::Float(0.75)));
    }
}
