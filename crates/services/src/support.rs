// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared plumbing for talking to the system tables this crate owns
//! (`__sessions`, `__broadcasts`, `__login`, `__removed`) directly through
//! a [`Transaction`]'s connection. These tables are not `Scheme`-backed, so
//! `Worker` — bound to one `&Scheme` — is the wrong tool; this mirrors
//! `stratum_repo::worker`'s own statement runner one layer down, against
//! the same `Connection`/`Statement` seam (spec.md §4.8/§4.9).

use stratum_core::value::{Dict, Value};
use stratum_driver::{ColumnValue, Connection, DriverResult, StepOutcome};
use stratum_repo::prelude::{RepoError, RepoResult, Transaction};
use stratum_sql::Finalized;

pub(crate) struct Rows {
    names: Vec<String>,
    data: Vec<Vec<ColumnValue>>,
}

impl Rows {
    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &[ColumnValue]> {
        self.data.iter().map(Vec::as_slice)
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub(crate) fn text(&self, row: &[ColumnValue], name: &str) -> Option<String> {
        match row.get(self.index(name)?)? {
            ColumnValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub(crate) fn int(&self, row: &[ColumnValue], name: &str) -> Option<i64> {
        match row.get(self.index(name)?)? {
            ColumnValue::Int(v) => Some(*v),
            ColumnValue::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub(crate) fn bool(&self, row: &[ColumnValue], name: &str) -> Option<bool> {
        match row.get(self.index(name)?)? {
            ColumnValue::Bool(v) => Some(*v),
            ColumnValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub(crate) fn blob(&self, row: &[ColumnValue], name: &str) -> Option<Vec<u8>> {
        match row.get(self.index(name)?)? {
            ColumnValue::Blob(b) => Some(b.clone()),
            _ => None,
        }
    }

    pub(crate) fn first_text(&self, name: &str) -> Option<String> {
        self.data.first().and_then(|row| self.text(row, name))
    }

    pub(crate) fn first_blob(&self, name: &str) -> Option<Vec<u8>> {
        self.data.first().and_then(|row| self.blob(row, name))
    }

    pub(crate) fn first_int(&self, name: &str) -> Option<i64> {
        self.data.first().and_then(|row| self.int(row, name))
    }

    /// Decode a whole row into a [`Dict`] keyed by column name, for callers
    /// that hand a row back to an application rather than pick specific
    /// columns out of it (e.g. `authorize_user`'s resolved user record).
    pub(crate) fn dict(&self, row: &[ColumnValue]) -> Dict {
        self.names
            .iter()
            .zip(row.iter().cloned())
            .map(|(name, value)| (smol_str::SmolStr::new(name), Value::from(value)))
            .collect()
    }

    pub(crate) fn first_dict(&self) -> Option<Dict> {
        self.data.first().map(|row| self.dict(row))
    }
}

/// Execute `finalized` against `txn`'s connection, logging per spec.md §3.6
/// and sticking the transaction into sticky-rollback on a driver failure —
/// the same contract `stratum_repo::worker`'s private statement runner
/// gives `Worker`.
pub(crate) fn run_statement<C: Connection>(txn: &mut Transaction<C>, finalized: &Finalized) -> RepoResult<Rows> {
    log::trace!(
        target: "stratum::services",
        "{} [{} params]",
        finalized.sql(),
        finalized.params().len()
    );
    match run_statement_inner(txn.connection_mut(), finalized) {
        Ok(rows) => Ok(rows),
        Err(err) => {
            log::error!(target: "stratum::services", "statement failed: {err}");
            txn.note_driver_error(&err);
            Err(RepoError::from(err))
        }
    }
}

fn run_statement_inner<C: Connection>(conn: &mut C, finalized: &Finalized) -> DriverResult<Rows> {
    let mut statement = conn.prepare(&finalized.sql())?;
    for (i, param) in finalized.params().iter().enumerate() {
        statement.bind(u32::try_from(i + 1).expect("parameter index fits u32"), param)?;
    }
    let names: Vec<String> = (0..statement.column_count())
        .map(|i| statement.column_name(i).unwrap_or_default().to_owned())
        .collect();
    let mut data = Vec::new();
    loop {
        match statement.step()? {
            StepOutcome::Done => break,
            StepOutcome::Row => {
                let mut cells = Vec::with_capacity(names.len());
                for i in 0..names.len() {
                    cells.push(statement.column(i)?);
                }
                data.push(cells);
            }
        }
    }
    Ok(Rows { names, data })
}

/// Seconds since the Unix epoch "now", at the same precision `__sessions`
/// and `__login` store their timestamps at (whole seconds, unlike the
/// microsecond-precision columns `spec.md` §3.5 uses for `__delta_*`).
pub(crate) fn now_seconds() -> i64 {
    stratum_core::util::clock::DateTime::now().timestamp_micros() / 1_000_000
}
