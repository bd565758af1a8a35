// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

use stratum_core::query::Comparison;
use stratum_core::value::Value;
use stratum_driver::ParamValue;

use crate::buffer::Buffer;

fn infix(comparison: Comparison) -> Option<&'static str> {
    match comparison {
        Comparison::LessThan => Some("<"),
        Comparison::LessOrEqual => Some("<="),
        Comparison::Equal => Some("="),
        Comparison::NotEqual => Some("!="),
        Comparison::GreaterOrEqual => Some(">="),
        Comparison::GreaterThan => Some(">"),
        Comparison::Includes => Some("@@"),
        _ => None,
    }
}

#[must_use]
pub fn comparison_sql(comparison: Comparison) -> &'static str {
    infix(comparison).unwrap_or("=")
}

/// Write one `field OP value(s)` fragment (no leading/trailing whitespace
/// beyond what's needed between tokens), per spec.md §4.3's supported
/// comparison set and §4.6 WHERE-composition step 3 (scalar-vs-array
/// equality rewritten to `IN`/`NOT IN` upstream, before this is called).
pub(crate) fn write_predicate(
    buffer: &mut Buffer,
    field_sql: &str,
    comparison: Comparison,
    value1: Option<Value>,
    value2: Option<Value>,
) {
    match comparison {
        Comparison::IsNull => {
            buffer.write_str(field_sql);
            buffer.write_str(" IS NULL");
        }
        Comparison::IsNotNull => {
            buffer.write_str(field_sql);
            buffer.write_str(" IS NOT NULL");
        }
        Comparison::Between { closed } | Comparison::NotBetween { closed } => {
            let negate = matches!(comparison, Comparison::NotBetween { .. });
            let v1 = value1.expect("BETWEEN requires a lower bound");
            let v2 = value2.expect("BETWEEN requires an upper bound");
            if closed {
                if negate {
                    buffer.write_str("NOT ");
                }
                buffer.write_str(field_sql);
                buffer.write_str(" BETWEEN ?");
                let i1 = buffer.push_param(ParamValue::from(&v1));
                buffer.write_str(&i1.to_string());
                buffer.write_str(" AND ?");
                let i2 = buffer.push_param(ParamValue::from(&v2));
                buffer.write_str(&i2.to_string());
            } else {
                // SQL has no exclusive BETWEEN; compose it from two
                // strict comparisons instead.
                let (lo, hi) = if negate { ("<=", ">=") } else { (">", "<") };
                let joiner = if negate { " OR " } else { " AND " };
                buffer.write_str("(");
                buffer.write_str(field_sql);
                buffer.write_str(" ");
                buffer.write_str(lo);
                buffer.write_str(" ?");
                let i1 = buffer.push_param(ParamValue::from(&v1));
                buffer.write_str(&i1.to_string());
                buffer.write_str(joiner);
                buffer.write_str(field_sql);
                buffer.write_str(" ");
                buffer.write_str(hi);
                buffer.write_str(" ?");
                let i2 = buffer.push_param(ParamValue::from(&v2));
                buffer.write_str(&i2.to_string());
                buffer.write_str(")");
            }
        }
        Comparison::In | Comparison::NotIn => {
            let Value::Array(items) = value1.expect("IN requires an array value") else {
                panic!("IN/NOT IN predicate requires an array value");
            };
            buffer.write_str(field_sql);
            buffer.write_str(if matches!(comparison, Comparison::NotIn) {
                " NOT IN ("
            } else {
                " IN ("
            });
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buffer.write_str(", ");
                }
                buffer.write_str("?");
                let index = buffer.push_param(ParamValue::from(item));
                buffer.write_str(&index.to_string());
            }
            buffer.write_str(")");
        }
        _ => {
            let op = comparison_sql(comparison);
            let value = value1.expect("comparison requires a value");
            buffer.write_str(field_sql);
            buffer.write_str(" ");
            buffer.write_str(op);
            buffer.write_str(" ?");
            let index = buffer.push_param(ParamValue::from(&value));
            buffer.write_str(&index.to_string());
        }
    }
}
