//! Parsing of raw advisory-agent replies.
//!
//! Model output is untrusted and loosely structured. Every function here
//! degrades to an empty or "failed" value instead of returning an error:
//! malformed output means "nothing found", never a crash.

use crate::types::{Category, ColumnMapping, ValidationOutcome};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// `LEFT -> RIGHT`, optionally preceded by a list bullet.
static ARROW_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s+|\d+[.)]\s+)?(.+?)\s*-+>\s*(.+?)\s*$").expect("valid regex")
});

/// Remove surrounding whitespace and markdown code fences.
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// The substring between the first `{` and the last `}`, if both exist.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse a column mapping reply into `standard -> input` pairs.
///
/// Accepted keys are restricted to `valid_standard`, non-null values to
/// `valid_input`. JSON is tried first; if it cannot be decoded into an
/// object, lines of the form `input -> standard` are used instead.
pub fn parse_mapping<S, I>(raw: &str, valid_standard: &[S], valid_input: &[I]) -> ColumnMapping
where
    S: AsRef<str>,
    I: AsRef<str>,
{
    let standard: HashSet<&str> = valid_standard.iter().map(|s| s.as_ref()).collect();
    let input: HashSet<&str> = valid_input.iter().map(|s| s.as_ref()).collect();

    let cleaned = strip_code_fences(raw);
    let candidate = extract_json_object(&cleaned).unwrap_or(&cleaned);

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(pairs)) => {
            let mut mapping = ColumnMapping::new();
            for (key, value) in pairs {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                let value = match value {
                    Value::Null => None,
                    Value::String(s) if input.contains(s.as_str()) => Some(s),
                    other => {
                        warn!("Input column {} not found in dataset", other);
                        continue;
                    }
                };
                if !standard.contains(key) {
                    debug!("Dropping unknown standard column '{}'", key);
                    continue;
                }
                mapping.insert(key, value);
            }
            mapping
        }
        Ok(other) => {
            debug!("Mapping reply is JSON but not an object: {}", other);
            parse_arrow_lines(&cleaned, &standard, &input)
        }
        Err(e) => {
            warn!("Failed to parse JSON mapping reply: {}", e);
            parse_arrow_lines(&cleaned, &standard, &input)
        }
    }
}

fn parse_arrow_lines(text: &str, standard: &HashSet<&str>, input: &HashSet<&str>) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();

    for line in text.lines() {
        let Some(caps) = ARROW_LINE.captures(line) else {
            continue;
        };
        let left = trim_token(&caps[1]);
        let right = trim_token(&caps[2]);

        if input.contains(left) && standard.contains(right) {
            mapping.insert(right, Some(left.to_string()));
        }
    }

    if mapping.is_empty() {
        debug!("No mapping found in reply");
    }
    mapping
}

fn trim_token(token: &str) -> &str {
    token.trim().trim_matches(|c| matches!(c, '"' | '\'' | '`' | ',')).trim()
}

/// Normalize a classification reply to a [`Category`].
///
/// The first of `billing`, `usage`, `support`, `other` found as a substring
/// wins; otherwise the result is [`Category::NoneOfThese`].
pub fn parse_category(raw: &str) -> Category {
    let text = raw.trim().to_lowercase();
    Category::RECOGNIZED
        .into_iter()
        .find(|category| text.contains(category.as_str()))
        .unwrap_or(Category::NoneOfThese)
}

/// Interpret the reply of a validation pass.
///
/// Either a JSON object with a boolean `is_valid` (or `valid`) field, or text
/// whose first non-empty line starts with a verdict word.
pub fn parse_validation(raw: &str) -> ValidationOutcome {
    let cleaned = strip_code_fences(raw);

    if let Some(outcome) = extract_json_object(&cleaned)
        .and_then(|obj| serde_json::from_str::<Value>(obj).ok())
        .and_then(|value| validation_from_json(&value))
    {
        return outcome;
    }

    let mut lines = cleaned.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return ValidationOutcome::invalid("Empty validation reply");
    };

    let verdict: String = first
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let is_valid = matches!(verdict.as_str(), "true" | "valid" | "yes");

    let rest: Vec<&str> = lines.collect();
    let message = if rest.is_empty() {
        first.to_string()
    } else {
        rest.join("\n")
    };

    ValidationOutcome {
        is_valid,
        diagnostic_message: message,
    }
}

fn validation_from_json(value: &Value) -> Option<ValidationOutcome> {
    let obj = value.as_object()?;
    let is_valid = obj
        .get("is_valid")
        .or_else(|| obj.get("valid"))
        .and_then(Value::as_bool)?;
    let message = ["message", "diagnostic_message", "diagnostic", "reason"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();
    Some(ValidationOutcome {
        is_valid,
        diagnostic_message: message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STANDARD: [&str; 2] = ["amount", "date"];
    const INPUT: [&str; 2] = ["invoice_amt", "invoice_date"];

    fn mapping_of(pairs: &[(&str, Option<&str>)]) -> ColumnMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    // -------------------------------------------------------------------------
    // parse_mapping
    // -------------------------------------------------------------------------

    #[test]
    fn test_json_mapping_drops_unknown_standard_names() {
        let raw = r#"{"amount":"invoice_amt","total":"invoice_amt"}"#;
        let mapping = parse_mapping(raw, &STANDARD, &INPUT);
        assert_eq!(mapping, mapping_of(&[("amount", Some("invoice_amt"))]));
    }

    #[test]
    fn test_json_mapping_inside_code_fence_and_prose() {
        let raw = "Here is the mapping:\n```json\n{\n  \"amount\": \"invoice_amt\",\n  \"date\": \"invoice_date\"\n}\n```\nLet me know.";
        let mapping = parse_mapping(raw, &STANDARD, &INPUT);
        assert_eq!(
            mapping,
            mapping_of(&[
                ("amount", Some("invoice_amt")),
                ("date", Some("invoice_date"))
            ])
        );
    }

    #[test]
    fn test_json_null_value_is_kept_as_unset() {
        let raw = r#"{"amount": "invoice_amt", "date": null}"#;
        let mapping = parse_mapping(raw, &STANDARD, &INPUT);
        assert_eq!(
            mapping,
            mapping_of(&[("amount", Some("invoice_amt")), ("date", None)])
        );
    }

    #[test]
    fn test_json_values_outside_dataset_are_dropped() {
        let raw = r#"{"amount": "price", "date": 42, "": "invoice_amt"}"#;
        let mapping = parse_mapping(raw, &STANDARD, &INPUT);
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_arrow_fallback() {
        let mapping = parse_mapping("invoice_amt -> amount\nbadline", &STANDARD, &INPUT);
        assert_eq!(mapping, mapping_of(&[("amount", Some("invoice_amt"))]));
    }

    #[test]
    fn test_arrow_fallback_with_bullets_and_quotes() {
        let raw = "- \"invoice_amt\" -> \"amount\"\n2. `invoice_date` --> `date`";
        let mapping = parse_mapping(raw, &STANDARD, &INPUT);
        assert_eq!(
            mapping,
            mapping_of(&[
                ("amount", Some("invoice_amt")),
                ("date", Some("invoice_date"))
            ])
        );
    }

    #[test]
    fn test_arrow_fallback_rejects_reversed_lines() {
        let mapping = parse_mapping("amount -> invoice_amt", &STANDARD, &INPUT);
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_json_array_falls_back_to_lines() {
        let mapping = parse_mapping(r#"["amount", "invoice_amt"]"#, &STANDARD, &INPUT);
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_garbage_yields_empty_mapping() {
        for raw in ["", "   ", "I could not map these columns", "{ not json }", "}{"] {
            assert!(parse_mapping(raw, &STANDARD, &INPUT).is_empty(), "{raw:?}");
        }
    }

    // -------------------------------------------------------------------------
    // parse_category
    // -------------------------------------------------------------------------

    #[test]
    fn test_category_substring_match() {
        assert_eq!(parse_category("Category: Billing-related"), Category::Billing);
        assert_eq!(parse_category("  USAGE\n"), Category::Usage);
        assert_eq!(parse_category("support"), Category::Support);
        assert_eq!(parse_category("Other"), Category::Other);
    }

    #[test]
    fn test_category_none_of_these() {
        assert_eq!(
            parse_category("I cannot determine this"),
            Category::NoneOfThese
        );
        assert_eq!(parse_category(""), Category::NoneOfThese);
    }

    #[test]
    fn test_category_scan_order_breaks_ties() {
        assert_eq!(
            parse_category("support or billing, hard to say"),
            Category::Billing
        );
        assert_eq!(parse_category("usage? maybe other"), Category::Usage);
    }

    // -------------------------------------------------------------------------
    // parse_validation
    // -------------------------------------------------------------------------

    #[test]
    fn test_validation_text_verdict() {
        let outcome = parse_validation("TRUE\nAll mandatory columns are mapped.");
        assert!(outcome.is_valid);
        assert_eq!(outcome.diagnostic_message, "All mandatory columns are mapped.");

        let outcome = parse_validation("**False** - amount is mapped to a date column");
        assert!(!outcome.is_valid);
        assert_eq!(
            outcome.diagnostic_message,
            "**False** - amount is mapped to a date column"
        );
    }

    #[test]
    fn test_validation_json_verdict() {
        let outcome =
            parse_validation("```json\n{\"is_valid\": false, \"reason\": \"wrong category\"}\n```");
        assert_eq!(outcome, ValidationOutcome::invalid("wrong category"));
    }

    #[test]
    fn test_validation_empty_reply_is_invalid() {
        assert!(!parse_validation("  \n ").is_valid);
    }
}
