//! Declarative constraint checks.

use conduit_core::{Constraint, Value, Violation, ViolationKind};

/// Check a coerced value against `constraints`, returning every failure.
///
/// `Length` applies to strings (in chars) and arrays. `Pattern` and `Range`
/// apply to scalars, and element-wise to arrays.
pub fn check(name: &str, value: &Value, constraints: &[Constraint]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for constraint in constraints {
        match constraint {
            Constraint::Required => {
                if is_blank(value) {
                    violations.push(Violation::new(name, ViolationKind::Missing));
                }
            }
            Constraint::Length { min, max } => {
                if let Some(actual) = length(value)
                    && !within(actual, *min, *max)
                {
                    violations.push(Violation::new(
                        name,
                        ViolationKind::Length {
                            min: *min,
                            max: *max,
                            actual,
                        },
                    ));
                }
            }
            Constraint::Pattern(pattern) => {
                let mismatch = scalars(value).any(|item| {
                    item.as_str().is_some_and(|text| {
                        !pattern
                            .find(text)
                            .is_some_and(|m| m.start() == 0 && m.end() == text.len())
                    })
                });
                if mismatch {
                    violations.push(Violation::new(
                        name,
                        ViolationKind::Pattern {
                            pattern: pattern.as_str().to_string(),
                        },
                    ));
                }
            }
            Constraint::Range { min, max } => {
                let outside = scalars(value)
                    .filter_map(Value::as_f64)
                    .find(|actual| !within(*actual, *min, *max));
                if let Some(actual) = outside {
                    violations.push(Violation::new(
                        name,
                        ViolationKind::Range {
                            min: *min,
                            max: *max,
                            actual,
                        },
                    ));
                }
            }
        }
    }
    violations
}

/// Whether a present value still counts as absent for `Required`.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn within<T: PartialOrd + Copy>(actual: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|min| actual >= min) && max.is_none_or(|max| actual <= max)
}

fn scalars(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use regex::Regex;
    use serde_json::json;

    #[test]
    fn test_range_violation() {
        let constraints = [Constraint::Range {
            min: Some(0.0),
            max: Some(150.0),
        }];
        let violations = check("age", &json!(200), &constraints);
        assert_eq!(
            violations,
            vec![Violation::new(
                "age",
                ViolationKind::Range {
                    min: Some(0.0),
                    max: Some(150.0),
                    actual: 200.0
                }
            )]
        );
        assert!(check("age", &json!(150), &constraints).is_empty());
    }

    #[test]
    fn test_length_counts_chars() {
        let constraints = [Constraint::Length {
            min: Some(2),
            max: Some(3),
        }];
        assert!(check("code", &json!("äöü"), &constraints).is_empty());
        assert_eq!(check("code", &json!("a"), &constraints).len(), 1);
        assert_eq!(check("tags", &json!([1, 2, 3, 4]), &constraints).len(), 1);
    }

    #[test]
    fn test_pattern_must_match_whole_value() {
        let constraints = [Constraint::Pattern(Regex::new(r"[a-z]+").unwrap())];
        assert!(check("slug", &json!("abc"), &constraints).is_empty());
        assert_eq!(check("slug", &json!("abc1"), &constraints).len(), 1);
        assert_eq!(check("slugs", &json!(["ok", "NO"]), &constraints).len(), 1);
    }

    #[test]
    fn test_required_rejects_blank() {
        let constraints = [Constraint::Required];
        assert_eq!(
            check("name", &json!("  "), &constraints),
            vec![Violation::new("name", ViolationKind::Missing)]
        );
        assert!(check("name", &json!(0), &constraints).is_empty());
    }

    #[test]
    fn test_open_bounds() {
        let constraints = [Constraint::Range {
            min: None,
            max: Some(10.0),
        }];
        assert!(check("n", &json!(-1000), &constraints).is_empty());
        assert_eq!(check("n", &json!(11), &constraints).len(), 1);
    }
}
