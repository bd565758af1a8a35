// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::num::NonZeroU32;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use stratum_driver::{ConnectParams, DriverError, DriverResult};

use crate::connection::PgConnection;

#[derive(Debug)]
pub struct ConnectionManager {
    params: ConnectParams,
}

impl r2d2::ManageConnection for ConnectionManager {
    type Connection = PgConnection;
    type Error = DriverError;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        crate::connection::open(&self.params)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.client
            .lock()
            .expect("postgres client mutex poisoned")
            .simple_query("SELECT 1")
            .map(|_| ())
            .map_err(|err| DriverError::Query(err.to_string()))
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.client
            .lock()
            .expect("postgres client mutex poisoned")
            .is_closed()
    }
}

pub type ConnectionPool = r2d2::Pool<ConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<ConnectionManager>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub max_size: NonZeroU32,
}

pub fn create_connection_pool(params: ConnectParams, config: Config) -> DriverResult<ConnectionPool> {
    drop(crate::connection::open(&params)?);
    let manager = ConnectionManager { params };
    ConnectionPool::builder()
        .max_size(config.max_size.get())
        .build(manager)
        .map_err(|err| DriverError::Unavailable(err.to_string()))
}

pub fn get_pooled_connection(pool: &ConnectionPool) -> DriverResult<PooledConnection> {
    pool.get()
        .map_err(|err| DriverError::Unavailable(err.to_string()))
}
