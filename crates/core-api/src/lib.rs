// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::missing_errors_doc)]

pub mod fulltext;
pub mod pagination;
pub mod query;
pub mod sorting;

pub mod prelude {
    pub use crate::{
        fulltext::{FullTextQuery, MatchType, SearchToken},
        pagination::{
            ContinueToken, ContinueTokenError, Pagination, PaginationLimit, PaginationOffset,
            SoftLimit,
        },
        query::{DeltaQuery, Query, QueryList, RelationHop, Target},
        sorting::{NullsOrder, Ordering, SortDirection},
    };
}
