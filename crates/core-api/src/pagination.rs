// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use smol_str::SmolStr;
use stratum_core::value::Value;

use crate::sorting::SortDirection;

pub type PaginationOffset = u64;
pub type PaginationLimit = u64;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pagination {
    pub limit: Option<PaginationLimit>,
    pub offset: Option<PaginationOffset>,
}

impl Pagination {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.offset.is_some() || self.limit.is_some()
    }

    #[must_use]
    pub fn mandatory_offset(&self) -> PaginationOffset {
        self.offset.unwrap_or(0)
    }

    #[must_use]
    pub fn mandatory_limit(&self) -> PaginationLimit {
        self.limit.unwrap_or(PaginationLimit::MAX)
    }
}

/// A keyset ("soft limit") pagination cursor (spec.md §3.4, §4.6).
#[derive(Clone, Debug, PartialEq)]
pub struct SoftLimit {
    pub field: SmolStr,
    pub direction: SortDirection,
    pub limit: PaginationLimit,
    /// The value of `field` on the last row of the previous page; `None`
    /// for the first page.
    pub last_value: Option<Value>,
}

impl SoftLimit {
    #[must_use]
    pub fn first_page(field: impl Into<SmolStr>, direction: SortDirection, limit: PaginationLimit) -> Self {
        Self {
            field: field.into(),
            direction,
            limit,
            last_value: None,
        }
    }

    #[must_use]
    pub fn next_page(&self, last_value: Value) -> Self {
        Self {
            field: self.field.clone(),
            direction: self.direction,
            limit: self.limit,
            last_value: Some(last_value),
        }
    }
}

/// An opaque, order-preserving encoding of a [`SoftLimit`] cursor, so a
/// caller can round-trip "where was I" across a request boundary as a single
/// string instead of threading typed cursor state (supplements spec.md
/// §3.4 with a continue-token idiom).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContinueToken(String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContinueTokenError {
    #[error("malformed continue token")]
    Malformed,
    #[error("continue token encodes an unsupported value kind")]
    UnsupportedValue,
}

impl ContinueToken {
    #[must_use]
    pub fn encode(soft_limit: &SoftLimit) -> Self {
        let direction = match soft_limit.direction {
            SortDirection::Ascending => 'a',
            SortDirection::Descending => 'd',
        };
        let value_repr = match &soft_limit.last_value {
            None => "-".to_owned(),
            Some(Value::Int(v)) => format!("i{v}"),
            Some(Value::Float(v)) => format!("f{v}"),
            Some(Value::Text(v)) => format!("t{}", data_encoding::BASE32HEX_NOPAD.encode(v.as_bytes())),
            Some(_) => "-".to_owned(),
        };
        let raw = format!(
            "{}:{}:{}:{}",
            data_encoding::BASE32HEX_NOPAD.encode(soft_limit.field.as_bytes()),
            direction,
            soft_limit.limit,
            value_repr,
        );
        Self(raw)
    }

    pub fn decode(&self) -> Result<SoftLimit, ContinueTokenError> {
        let mut parts = self.0.splitn(4, ':');
        let field = parts.next().ok_or(ContinueTokenError::Malformed)?;
        let field = data_encoding::BASE32HEX_NOPAD
            .decode(field.as_bytes())
            .map_err(|_| ContinueTokenError::Malformed)?;
        let field = String::from_utf8(field).map_err(|_| ContinueTokenError::Malformed)?;
        let direction = match parts.next() {
            Some("a") => SortDirection::Ascending,
            Some("d") => SortDirection::Descending,
            _ => return Err(ContinueTokenError::Malformed),
        };
        let limit: PaginationLimit = parts
            .next()
            .ok_or(ContinueTokenError::Malformed)?
            .parse()
            .map_err(|_| ContinueTokenError::Malformed)?;
        let value_repr = parts.next().ok_or(ContinueTokenError::Malformed)?;
        let last_value = match value_repr.split_at_checked(1) {
            Some(("-", "")) => None,
            Some(("i", rest)) => Some(Value::Int(
                rest.parse().map_err(|_| ContinueTokenError::Malformed)?,
            )),
            Some(("f", rest)) => Some(Value::Float(
                rest.parse().map_err(|_| ContinueTokenError::Malformed)?,
            )),
            Some(("t", rest)) => {
                let bytes = data_encoding::BASE32HEX_NOPAD
                    .decode(rest.as_bytes())
                    .map_err(|_| ContinueTokenError::Malformed)?;
                Some(Value::Text(
                    String::from_utf8(bytes).map_err(|_| ContinueTokenError::Malformed)?,
                ))
            }
            _ => return Err(ContinueTokenError::Malformed),
        };
        Ok(SoftLimit {
            field: field.into(),
            direction,
            limit,
            last_value,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<ContinueToken> for String {
    fn from(token: ContinueToken) -> Self {
        token.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_token_round_trips_first_page() {
        let soft_limit = SoftLimit::first_page("name", SortDirection::Ascending, 30);
        let token = ContinueToken::encode(&soft_limit);
        assert_eq!(token.decode().unwrap(), soft_limit);
    }

    #[test]
    fn continue_token_round_trips_text_cursor() {
        let soft_limit = SoftLimit::first_page("name", SortDirection::Ascending, 30)
            .next_page(Value::Text("user_030".to_owned()));
        let token = ContinueToken::encode(&soft_limit);
        assert_eq!(token.decode().unwrap(), soft_limit);
    }

    #[test]
    fn malformed_token_is_rejected() {
        let token = ContinueToken("not-a-token".to_owned());
        assert!(token.decode().is_err());
    }
}
