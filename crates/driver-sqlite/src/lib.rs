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

pub mod connection;
pub mod pool;
pub mod statement;

pub use connection::SqliteConnection;
pub use pool::{Config, ConnectionPool};
pub use statement::SqliteStatement;

use stratum_driver::{BackendKind, ConnectParams, Driver, DriverResult};

#[derive(Debug, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn connect(&self, params: &ConnectParams) -> DriverResult<Self::Connection> {
        connection::open(params)
    }
}
