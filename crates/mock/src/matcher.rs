//! Structural subset matching of JSON values
//!
//! `subset_match(expected, actual)` passes when every field present in
//! `expected` is present and equal in `actual`; extra actual fields are
//! ignored. Arrays must have the same length and are compared element by
//! element in order. Numbers compare numerically; every other scalar is
//! compared strictly, so `"4"` never equals `4`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One failing path in a subset match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    /// JSON path of the failing value, rooted at `$`
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.path, self.expected, self.actual
        )
    }
}

/// Match `actual` against `expected` with subset semantics.
///
/// Returns every mismatch found, not just the first, so a failure message
/// shows the whole diff at once.
pub fn subset_match(expected: &Value, actual: &Value) -> Result<(), Vec<Mismatch>> {
    let mut mismatches = Vec::new();
    walk("$", expected, actual, &mut mismatches);

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(mismatches)
    }
}

/// Convenience predicate form of [`subset_match`]
pub fn is_subset(expected: &Value, actual: &Value) -> bool {
    subset_match(expected, actual).is_ok()
}

fn walk(path: &str, expected: &Value, actual: &Value, out: &mut Vec<Mismatch>) {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_value) in exp {
                let child = format!("{}.{}", path, key);
                match act.get(key) {
                    Some(act_value) => walk(&child, exp_value, act_value, out),
                    None => out.push(Mismatch {
                        path: child,
                        expected: render(exp_value),
                        actual: "<missing>".to_string(),
                    }),
                }
            }
        }
        (Value::Array(exp), Value::Array(act)) => {
            if exp.len() != act.len() {
                out.push(Mismatch {
                    path: format!("{}.length", path),
                    expected: exp.len().to_string(),
                    actual: act.len().to_string(),
                });
                return;
            }
            for (i, (e, a)) in exp.iter().zip(act).enumerate() {
                walk(&format!("{}[{}]", path, i), e, a, out);
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            let equal = match (e.as_f64(), a.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => e == a,
            };
            if !equal {
                out.push(mismatch(path, expected, actual));
            }
        }
        _ => {
            if expected != actual {
                out.push(mismatch(path, expected, actual));
            }
        }
    }
}

fn mismatch(path: &str, expected: &Value, actual: &Value) -> Mismatch {
    Mismatch {
        path: path.to_string(),
        expected: render(expected),
        actual: render(actual),
    }
}

fn render(value: &Value) -> String {
    const LIMIT: usize = 120;
    let text = value.to_string();
    if text.chars().count() > LIMIT {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{}...", cut)
    } else {
        text
    }
}
