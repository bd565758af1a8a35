// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// Quote a bare identifier (spec.md §4.3 "writes identifiers wrapped in
/// double quotes"). Wildcards are never quoted; call sites special-case
/// `*` instead of routing it through here.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Table-qualified field reference: `table."field"`.
#[must_use]
pub fn quote_qualified(table: &str, field: &str) -> String {
    format!("{table}.{}", quote_ident(field))
}

/// `expr AS "alias"`.
#[must_use]
pub fn quote_alias(expr: &str, alias: &str) -> String {
    format!("{expr} AS {}", quote_ident(alias))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifier() {
        assert_eq!(quote_ident("name"), "\"name\"");
    }

    #[test]
    fn escapes_embedded_quote() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn qualifies_field() {
        assert_eq!(quote_qualified("users", "email"), "users.\"email\"");
    }
}
