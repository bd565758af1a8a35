// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use stratum_driver::{ConnectParams, DriverError, DriverResult, Info};

use crate::statement::PgStatement;

/// A connection string assembled from the free-form [`ConnectParams`]
/// entries the driver-agnostic caller supplied (spec.md §4.1 `connect`).
fn build_conninfo(params: &ConnectParams) -> String {
    let mut parts = Vec::new();
    for key in ["host", "port", "dbname", "user", "password"] {
        if let Some(value) = params.get(key) {
            parts.push(format!("{key}={value}"));
        }
    }
    parts.join(" ")
}

#[derive(Debug)]
pub struct PgConnection {
    pub(crate) client: Arc<Mutex<postgres::Client>>,
    pub(crate) last_affected: Arc<AtomicU64>,
}

pub(crate) fn open(params: &ConnectParams) -> DriverResult<PgConnection> {
    let conninfo = build_conninfo(params);
    let client = postgres::Client::connect(&conninfo, postgres::NoTls)
        .map_err(|err| DriverError::Unavailable(err.to_string()))?;
    Ok(PgConnection {
        client: Arc::new(Mutex::new(client)),
        last_affected: Arc::new(AtomicU64::new(0)),
    })
}

impl stratum_driver::Connection for PgConnection {
    type Statement<'a>
        = PgStatement
    where
        Self: 'a;

    fn prepare(&mut self, sql: &str) -> DriverResult<Self::Statement<'_>> {
        let stmt = self
            .client
            .lock()
            .expect("postgres client mutex poisoned")
            .prepare(sql)
            .map_err(|err| DriverError::Query(err.to_string()))?;
        let column_names = stmt.columns().iter().map(|c| c.name().to_owned()).collect();
        Ok(PgStatement::new(
            Arc::clone(&self.client),
            Arc::clone(&self.last_affected),
            stmt,
            column_names,
        ))
    }

    fn execute_batch(&mut self, sql: &str) -> DriverResult<()> {
        self.client
            .lock()
            .expect("postgres client mutex poisoned")
            .batch_execute(sql)
            .map_err(|err| DriverError::Query(err.to_string()))
    }

    fn affected(&self) -> u64 {
        self.last_affected.load(Ordering::Acquire)
    }

    fn last_insert_id(&self) -> Option<i64> {
        // PostgreSQL has no universal row-id equivalent; callers rely on
        // `RETURNING` instead (spec.md §4.5 conflict-handling protocol).
        None
    }

    fn diagnostics(&self, err: &DriverError) -> Info {
        Info {
            code: 0,
            status_name: "pgsql_error".into(),
            description: err.to_string(),
            failed_query: None,
        }
    }

    fn supports_notifications(&self) -> bool {
        true
    }
}
