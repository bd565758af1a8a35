// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::HashMap;

use crate::error::{DriverError, DriverResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Pgsql,
    Sqlite,
}

impl BackendKind {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Pgsql => "pgsql",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Free-form connection parameters parsed from a `kind:key=value;...`
/// string (spec.md §4.1 `connect(params)`), e.g.
/// `sqlite:dbname=/var/lib/stratum.db;mode=rwc;journal=wal` or
/// `pgsql:host=localhost;dbname=stratum;user=stratum`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectParams {
    pub backend: BackendKind,
    entries: HashMap<String, String>,
}

impl ConnectParams {
    pub fn parse(raw: &str) -> DriverResult<Self> {
        let (prefix, rest) = raw
            .split_once(':')
            .ok_or_else(|| DriverError::MalformedParams(raw.to_owned()))?;
        let backend = match prefix {
            "pgsql" => BackendKind::Pgsql,
            "sqlite" => BackendKind::Sqlite,
            other => return Err(DriverError::MalformedParams(format!("unknown backend `{other}`"))),
        };
        let mut entries = HashMap::new();
        for pair in rest.split(';').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| DriverError::MalformedParams(pair.to_owned()))?;
            entries.insert(key.trim().to_owned(), value.trim().to_owned());
        }
        Ok(Self { backend, entries })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn dbname(&self) -> Option<&str> {
        self.get("dbname")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_params() {
        let params = ConnectParams::parse("sqlite:dbname=/tmp/x.db;mode=rwc;journal=wal").unwrap();
        assert_eq!(params.backend, BackendKind::Sqlite);
        assert_eq!(params.dbname(), Some("/tmp/x.db"));
        assert_eq!(params.get("journal"), Some("wal"));
    }

    #[test]
    fn parses_pgsql_params() {
        let params = ConnectParams::parse("pgsql:host=localhost;dbname=stratum").unwrap();
        assert_eq!(params.backend, BackendKind::Pgsql);
        assert_eq!(params.get("host"), Some("localhost"));
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(ConnectParams::parse("mysql:host=localhost").is_err());
    }
}
