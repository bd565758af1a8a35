// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use bitflags::bitflags;
use smol_str::SmolStr;

use crate::query::Predicate;

bitflags! {
    /// Field flags (spec.md §3.1). A field may combine several of these;
    /// e.g. a `Text` alias key is typically `Unique | Indexed`.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u32 {
        const REQUIRED          = 1 << 0;
        const UNIQUE            = 1 << 1;
        const INDEXED           = 1 << 2;
        const FORCE_INCLUDE      = 1 << 3;
        const FORCE_EXCLUDE      = 1 << 4;
        const PROTECTED         = 1 << 5;
        const READ_ONLY          = 1 << 6;
        const REFERENCE         = 1 << 7;
        const COMPOSED          = 1 << 8;
        const COMPRESSED        = 1 << 9;
        const PATTERN_INDEXED    = 1 << 10;
        const TRIGRAM_INDEXED    = 1 << 11;
        /// `ts_rank` normalisation option: divide by 1 + log(document length).
        const TS_NORM_DOC_LENGTH        = 1 << 12;
        const TS_NORM_DOC_LENGTH_LOG     = 1 << 13;
        const TS_NORM_UNIQUE_WORDS       = 1 << 14;
        const TS_NORM_UNIQUE_WORDS_LOG    = 1 << 15;
    }
}

/// How a caller may transform/interpret a field's raw value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Transform {
    #[default]
    None,
    /// A `Unique + Text` field usable as a string key in `Worker::get`.
    Alias,
}

/// Policy applied when the target of an `Object` relation is removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OnRemove {
    Cascade,
    Restrict,
    SetNull,
    Reference,
    StrongReference,
}

/// Element type of an [`FieldKind::Array`] field. Arrays only ever hold
/// scalars — nesting documents in an array column is not supported, matching
/// the side-table storage model in spec.md §4.7.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    Float,
    Boolean,
    Text,
    Bytes,
}

/// A materialised many-to-many membership, maintained by triggers.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldView {
    /// Scheme the view ranges over.
    pub target: SmolStr,
    /// Membership predicate evaluated (conceptually) over `target` joined
    /// with the owning row.
    pub predicate: Predicate,
    /// Columns projected from `target` when the view is resolved.
    pub fields: Vec<SmolStr>,
    /// Whether inserts/updates/deletes into the view-materialisation table
    /// are mirrored into a `{parent}_f_{field}_delta` audit table.
    pub delta: bool,
}

/// Compiled-query-cache key plus rank-normalisation selection for a
/// full-text field. The stored column itself is a plain `Text`/native
/// search-vector column; see spec.md §4.6 for the translation contract.
#[derive(Clone, Debug, PartialEq)]
pub struct FullTextSpec {
    /// Other fields of the same scheme whose text content feeds the vector.
    pub sources: Vec<SmolStr>,
    pub language: SmolStr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    Integer,
    Float,
    Boolean,
    Text,
    Bytes,
    /// Self-describing nested document, stored as a serialised blob.
    Data,
    /// Typed sub-document, stored as a serialised blob.
    Extra { type_name: SmolStr },
    File,
    Image,
    Object {
        target: SmolStr,
        on_remove: OnRemove,
    },
    /// One-to-many (FK on the child, when `foreign_link` names the
    /// reciprocal `Object` field) or many-to-many (implicit join table)
    /// relation, per spec.md §3.1.
    Set {
        target: SmolStr,
        foreign_link: Option<SmolStr>,
        on_remove: OnRemove,
    },
    Array {
        element: ScalarKind,
    },
    View(FieldView),
    FullTextView(FullTextSpec),
    /// Synthesised on read by a user callback; never persisted.
    Virtual,
    /// Caller-supplied encoder/decoder and comparator; `sql_type` is the
    /// literal SQL type name used when the migration planner emits DDL for
    /// the backing column.
    Custom { sql_type: SmolStr },
}

impl FieldKind {
    /// Set/Array/View/FullTextView fields are never selected as plain
    /// columns; they are fetched via dedicated secondary queries
    /// (spec.md §4.4 read-field policy).
    #[must_use]
    pub const fn is_relation(&self) -> bool {
        matches!(
            self,
            Self::Set { .. } | Self::Array { .. } | Self::View(_) | Self::FullTextView(_)
        )
    }

    #[must_use]
    pub const fn is_scalar_column(&self) -> bool {
        matches!(
            self,
            Self::Integer
                | Self::Float
                | Self::Boolean
                | Self::Text
                | Self::Bytes
                | Self::Data
                | Self::Extra { .. }
                | Self::File
                | Self::Image
                | Self::Object { .. }
                | Self::Custom { .. }
        )
    }

    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub kind: FieldKind,
    pub flags: FieldFlags,
    pub transform: Transform,
}

impl Field {
    #[must_use]
    pub const fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            flags: FieldFlags::empty(),
            transform: Transform::None,
        }
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    #[must_use]
    pub const fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.flags.contains(FieldFlags::REQUIRED)
    }

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.flags.contains(FieldFlags::UNIQUE)
    }

    #[must_use]
    pub const fn is_alias_key(&self) -> bool {
        matches!(self.kind, FieldKind::Text)
            && self.is_unique()
            && matches!(self.transform, Transform::Alias)
    }
}
