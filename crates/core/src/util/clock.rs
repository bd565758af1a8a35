// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Microsecond-precision timestamps.
//!
//! Every temporal field in a [`Scheme`](crate::schema::Scheme) is stored as
//! a plain [`Integer`](crate::schema::field::FieldKind::Integer) column
//! holding microseconds since the Unix epoch — there is no distinct SQL
//! temporal type. [`DateTime`] is the in-memory convenience wrapper around
//! that representation.

use std::fmt;

use jiff::Timestamp;

pub type TimestampMicros = i64;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DateTime(TimestampMicros);

impl DateTime {
    #[must_use]
    pub const fn new_timestamp_micros(micros: TimestampMicros) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn timestamp_micros(self) -> TimestampMicros {
        self.0
    }

    #[must_use]
    pub fn now() -> Self {
        Self::from(Timestamp::now())
    }
}

impl From<Timestamp> for DateTime {
    fn from(ts: Timestamp) -> Self {
        Self(ts.as_microsecond())
    }
}

impl From<DateTime> for Timestamp {
    fn from(dt: DateTime) -> Self {
        Timestamp::from_microsecond(dt.0).unwrap_or(Timestamp::UNIX_EPOCH)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Timestamp::from(*self), f)
    }
}

/// Monotonic in-process tiebreak used when two `__delta` rows land on the
/// same microsecond: `Create < Update < Delete` per the delta ordering
/// guarantee.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeltaAction {
    Create,
    Update,
    Delete,
}

impl DeltaAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for DeltaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
