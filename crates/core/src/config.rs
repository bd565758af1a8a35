// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Engine-wide configuration (spec.md §6 "Environment/config"), serializable
//! with `serde` behind the `serde` feature.

use std::time::Duration;

use smol_str::SmolStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parsed `kind:key=value;...` connection string (spec.md §4.1, §6).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriverConfig {
    pub connection_string: SmolStr,
}

/// Bounded FIFO connection-pool sizing (spec.md §5), the same shape as the
/// teacher's `storage-sqlite::connection::pool::Config`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    pub max_size: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Failed-login lockout parameters consulted by `authorize_user`
/// (spec.md §4.9).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AuthConfig {
    /// Trailing window over which failed logins are counted.
    pub max_auth_time: Duration,
    /// Failures within that window at or above which the account locks.
    pub max_login_failure: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_auth_time: Duration::from_secs(300),
            max_login_failure: 5,
        }
    }
}

/// Top-level engine configuration (spec.md §6): plain data, `Copy`/`Clone`
/// where the fields allow it, `serde`-derivable behind the `serde` feature.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    pub driver: DriverConfig,
    pub pool: PoolConfig,
    /// Largest request payload accepted before a `Query`/write is rejected.
    pub max_request_size: usize,
    /// Largest single bound parameter value (e.g. a `Bytes` field) accepted.
    pub max_var_size: usize,
    pub max_file_size: u64,
    /// How long a `StagedUpload` may sit unresolved before it is swept.
    pub input_update_time: Duration,
    /// How often the staged-upload sweeper runs.
    pub input_update_frequency: Duration,
    /// Sessions-KV key this process stores its own transaction/request
    /// correlation id under.
    pub transaction_storage_key: SmolStr,
    /// How long delta/audit rows are retained before the sweeper prunes them.
    pub internals_storage_time: Duration,
    pub auth: AuthConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let auth = AuthConfig::default();
        assert!(auth.max_login_failure > 0);
        assert!(auth.max_auth_time > Duration::ZERO);
        let pool = PoolConfig::default();
        assert!(pool.max_size > 0);
    }
}
