// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stage-then-adopt lifecycle for `File`/`Image` field uploads, supplemented
//! from `original_source/`'s `STInputFile.h`/`.cc` (SPEC_FULL.md §4.11): a
//! staged upload is adopted — a row created in `__files`, its oid ready to
//! be stored as a field's FK value — only inside the same transaction as
//! the owning row's create/update, so a rolled-back transaction never
//! leaves an orphaned `__files` row. The physical temp-file mechanics
//! (where staged bytes actually live before adoption) are out of scope;
//! [`StagedUpload`] only carries the metadata `__files` stores, plus an
//! opaque `storage_key` a caller-supplied file-mechanics layer resolves.

use stratum_core::value::{Dict, Value};
use stratum_driver::Connection;
use stratum_repo::prelude::{RepoError, RepoResult, Transaction};
use stratum_sql::Builder;

use crate::support::run_statement;

/// An upload whose bytes already live somewhere addressable by
/// `storage_key` (a staging path, a blob-store key — resolved by whatever
/// file-mechanics layer the caller wires in), not yet adopted into `__files`.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedUpload {
    pub storage_key: String,
    pub content_type: String,
    pub size: u64,
    pub original_name: Option<String>,
}

impl StagedUpload {
    #[must_use]
    pub const fn new(storage_key: String, content_type: String, size: u64, original_name: Option<String>) -> Self {
        Self {
            storage_key,
            content_type,
            size,
            original_name,
        }
    }

    fn into_row(self) -> Dict {
        let mut row = Dict::new();
        row.insert("storage_key", Value::Text(self.storage_key));
        row.insert("content_type", Value::Text(self.content_type));
        row.insert("size", Value::Int(self.size as i64));
        row.insert("original_name", self.original_name.map_or(Value::Null, Value::Text));
        row
    }
}

/// Build a [`StagedUpload`] handle. Staging the bytes themselves (writing
/// to a temp path, computing `size`/`content_type`) is the caller's job;
/// this only records the result so it can be adopted transactionally.
#[must_use]
pub fn stage(storage_key: impl Into<String>, content_type: impl Into<String>, size: u64, original_name: Option<String>) -> StagedUpload {
    StagedUpload::new(storage_key.into(), content_type.into(), size, original_name)
}

/// Insert `upload` into `__files` and return its new `__oid`, for the
/// caller to set as the adopting field's FK value within the same
/// transaction. Per SPEC_FULL.md §4.11, call this only once the owning
/// row's create/update is itself about to commit — never speculatively.
pub fn adopt<C: Connection>(txn: &mut Transaction<C>, upload: StagedUpload) -> RepoResult<i64> {
    let row = upload.into_row();
    let fields: Vec<&str> = row.keys().collect();
    let values: Vec<Value> = fields.iter().map(|field| row.get(field).cloned().unwrap_or_default()).collect();
    let finalized = Builder::new()
        .insert_into("__files")
        .fields(&fields)
        .values_tuple(&values)
        .returning(&["__oid"])
        .finalize();
    let rows = run_statement(txn, &finalized)?;
    rows.first_int("__oid").ok_or_else(|| RepoError::Bug("__files insert did not return __oid".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_row_carries_every_field() {
        let upload = stage("tmp/abc", "image/png", 1024, Some("cover.png".to_owned()));
        let row = upload.into_row();
        assert_eq!(row.get("storage_key"), Some(&Value::Text("tmp/abc".to_owned())));
        assert_eq!(row.get("content_type"), Some(&Value::Text("image/png".to_owned())));
        assert_eq!(row.get("size"), Some(&Value::Int(1024)));
        assert_eq!(row.get("original_name"), Some(&Value::Text("cover.png".to_owned())));
    }

    #[test]
    fn missing_original_name_is_null() {
        let row = stage("tmp/abc", "text/plain", 0, None).into_row();
        assert_eq!(row.get("original_name"), Some(&Value::Null));
    }
}
