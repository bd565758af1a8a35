// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// The kind tag accompanying a bound value (spec.md §4.1 `bind`). Dialect-
/// specific kinds (tsvector, point, integer array) bypass bind slots
/// entirely and are emitted as SQL literals by the translator instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    Text,
    Blob,
    Null,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
    Null,
}

impl ParamValue {
    #[must_use]
    pub const fn kind(&self) -> ParamKind {
        match self {
            Self::Int(_) => ParamKind::Int,
            Self::Float(_) => ParamKind::Float,
            Self::Bool(_) => ParamKind::Bool,
            Self::Text(_) => ParamKind::Text,
            Self::Blob(_) => ParamKind::Blob,
            Self::Null => ParamKind::Null,
        }
    }
}

impl From<&stratum_core::value::Value> for ParamValue {
    fn from(value: &stratum_core::value::Value) -> Self {
        use stratum_core::value::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(v) => Self::Bool(*v),
            Value::Int(v) => Self::Int(*v),
            Value::Float(v) => Self::Float(*v),
            Value::Text(v) => Self::Text(v.clone()),
            Value::Bytes(v) => Self::Blob(v.clone()),
            // Arrays and dicts are never bound directly; the translator
            // lowers them to side-table rows or JSON text before binding.
            Value::Array(_) | Value::Dict(_) => Self::Null,
        }
    }
}
