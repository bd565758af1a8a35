// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Password authentication against a registered user scheme (spec.md
//! §4.9). Hashing/verification uses `argon2`, the password-hashing crate
//! the broader example corpus reaches for — see DESIGN.md.

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use stratum_core::config::AuthConfig;
use stratum_core::query::Comparison;
use stratum_core::value::{Dict, Value};
use stratum_driver::Connection;
use stratum_repo::prelude::{RepoError, RepoResult, Transaction};
use stratum_sql::Builder;

use crate::support::{now_seconds, run_statement};

/// Names the user scheme and its identifier/password-hash columns;
/// schema-specific, so kept separate from the ambient [`AuthConfig`]
/// (spec.md §6) rather than folded into it.
#[derive(Copy, Clone, Debug)]
pub struct AuthSchemeConfig<'a> {
    pub user_scheme: &'a str,
    pub identifier_field: &'a str,
    pub password_hash_field: &'a str,
}

/// Request metadata recorded alongside a login attempt, all optional
/// (spec.md §4.9 step 4 "when available"). Distinct from
/// [`stratum_repo::context::RequestMeta`] (the C10 process-wide registry's
/// per-thread metadata): that one is ambient and keyed by user id, this one
/// is the handful of fields `__login` actually stores per attempt.
#[derive(Copy, Clone, Debug, Default)]
pub struct LoginRequest<'a> {
    pub addr: Option<&'a str>,
    pub host: Option<&'a str>,
    pub path: Option<&'a str>,
}

/// Runs the full five-step protocol from spec.md §4.9 inside the caller's
/// transaction. Returns the resolved user row (the password hash column
/// stripped out) on success, `None` on any other failure to verify.
///
/// # Errors
/// `Err(RepoError::AuthLocked)` once failed attempts in the trailing
/// `auth_config.max_auth_time` window reach `auth_config.max_login_failure`.
pub fn authorize_user<C: Connection>(
    txn: &mut Transaction<C>,
    auth_config: &AuthConfig,
    scheme_config: AuthSchemeConfig<'_>,
    identifier: &str,
    password: &str,
    request: LoginRequest<'_>,
) -> RepoResult<Option<Dict>> {
    let window_start = now_seconds() - auth_config.max_auth_time.as_secs() as i64;

    let failures = count_failures(txn, identifier, window_start)?;
    if failures >= i64::from(auth_config.max_login_failure) {
        record_attempt(txn, None, identifier, false, request)?;
        return Err(RepoError::AuthLocked);
    }

    let user = resolve_user(txn, &scheme_config, identifier)?;
    let verified = user
        .as_ref()
        .and_then(|row| row.get(scheme_config.password_hash_field))
        .and_then(|value| match value {
            Value::Text(hash) => Some(hash.clone()),
            _ => None,
        })
        .is_some_and(|stored_hash| verify_password(password, &stored_hash));

    let user_id = user.as_ref().and_then(|row| row.get("__oid")).and_then(|v| match v {
        Value::Int(id) => Some(*id),
        _ => None,
    });

    if verified {
        bump_or_record_success(txn, user_id, identifier, window_start, request)?;
        let mut row = user.expect("verified implies a resolved user row");
        row.remove(scheme_config.password_hash_field);
        Ok(Some(row))
    } else {
        record_attempt(txn, user_id, identifier, false, request)?;
        Ok(None)
    }
}

fn verify_password(candidate: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok()
}

fn resolve_user<C: Connection>(
    txn: &mut Transaction<C>,
    scheme_config: &AuthSchemeConfig<'_>,
    identifier: &str,
) -> RepoResult<Option<Dict>> {
    let finalized = Builder::new()
        .select()
        .all()
        .from(scheme_config.user_scheme)
        .where_with(|w| {
            w.predicate(
                &format!("\"{}\"", scheme_config.identifier_field),
                Comparison::Equal,
                Some(Value::Text(identifier.to_owned())),
                None,
            )
        })
        .finalize();
    let rows = run_statement(txn, &finalized)?;
    Ok(rows.first_dict())
}

fn count_failures<C: Connection>(txn: &mut Transaction<C>, identifier: &str, window_start: i64) -> RepoResult<i64> {
    let finalized = Builder::new()
        .select()
        .fields_raw(&["COUNT(*) AS \"__count\"".to_owned()])
        .from("__login")
        .where_with(|w| {
            w.predicate("\"name\"", Comparison::Equal, Some(Value::Text(identifier.to_owned())), None)
                .predicate("\"success\"", Comparison::Equal, Some(Value::Bool(false)), None)
                .predicate("\"date\"", Comparison::GreaterOrEqual, Some(Value::Int(window_start)), None)
        })
        .finalize();
    let rows = run_statement(txn, &finalized)?;
    Ok(rows.first_int("__count").unwrap_or(0))
}

fn record_attempt<C: Connection>(
    txn: &mut Transaction<C>,
    user_id: Option<i64>,
    identifier: &str,
    success: bool,
    request: LoginRequest<'_>,
) -> RepoResult<()> {
    let finalized = Builder::new()
        .insert_into("__login")
        .fields(&["user", "name", "date", "success", "addr", "host", "path"])
        .values_tuple(&[
            user_id.map_or(Value::Null, Value::Int),
            Value::Text(identifier.to_owned()),
            Value::Int(now_seconds()),
            Value::Bool(success),
            request.addr.map_or(Value::Null, |v| Value::Text(v.to_owned())),
            request.host.map_or(Value::Null, |v| Value::Text(v.to_owned())),
            request.path.map_or(Value::Null, |v| Value::Text(v.to_owned())),
        ])
        .finalize();
    run_statement(txn, &finalized)?;
    Ok(())
}

/// On a successful login, bump the most recent successful row for this
/// identifier within the window instead of appending a new one when one
/// already exists, per spec.md §4.9 step 4.
fn bump_or_record_success<C: Connection>(
    txn: &mut Transaction<C>,
    user_id: Option<i64>,
    identifier: &str,
    window_start: i64,
    request: LoginRequest<'_>,
) -> RepoResult<()> {
    let select_recent = Builder::new()
        .select()
        .fields(&["id"])
        .from("__login")
        .where_with(|w| {
            w.predicate("\"name\"", Comparison::Equal, Some(Value::Text(identifier.to_owned())), None)
                .predicate("\"success\"", Comparison::Equal, Some(Value::Bool(true)), None)
                .predicate("\"date\"", Comparison::GreaterOrEqual, Some(Value::Int(window_start)), None)
        })
        .order_by("date", false, None)
        .limit(1)
        .finalize();
    let recent = run_statement(txn, &select_recent)?;
    if let Some(id) = recent.first_int("id") {
        let update = Builder::new()
            .update("__login")
            .set("date", Value::Int(now_seconds()))
            .where_with(|w| w.predicate("\"id\"", Comparison::Equal, Some(Value::Int(id)), None))
            .finalize();
        run_statement(txn, &update)?;
        Ok(())
    } else {
        record_attempt(txn, user_id, identifier, true, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_password_rejects_garbage_hash() {
        assert!(!verify_password("whatever", "not-a-real-hash"));
    }

    #[test]
    fn verify_password_accepts_its_own_hash() {
        use argon2::password_hash::rand_core::OsRng;
        use argon2::password_hash::{PasswordHasher, SaltString};

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(b"correct horse battery staple", &salt).unwrap().to_string();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong", &hash));
    }
}
