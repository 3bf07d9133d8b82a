use crate::model::FieldType;

/// The canonical mark for a selected checkbox.
pub const CHECKED_MARK: &str = "V";

/// Which side of a comparison a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSide {
    /// Ground truth; normalized by the field's type.
    Expected,
    /// Model output; normalized by generic value rules.
    Extracted,
}

/// Canonicalize a field value for comparison.
///
/// Pure: the same input always yields the same output. `None` and `""`
/// both normalize to `""`.
pub fn normalize(value: Option<&str>, field_type: FieldType, side: ValueSide) -> String {
    let value = match value {
        Some(v) => v.trim(),
        None => return String::new(),
    };
    if value.is_empty() {
        return String::new();
    }

    match side {
        ValueSide::Expected => normalize_expected(value, field_type),
        ValueSide::Extracted => normalize_extracted(value, field_type),
    }
}

fn normalize_expected(value: &str, field_type: FieldType) -> String {
    match field_type {
        FieldType::Boolean => {
            if value == CHECKED_MARK || value.eq_ignore_ascii_case("true") {
                CHECKED_MARK.to_string()
            } else {
                String::new()
            }
        }
        FieldType::Numeric | FieldType::MedicalCode => strip_whitespace(value),
        _ if is_spaced_digits(value) => strip_whitespace(value),
        FieldType::Date | FieldType::Text | FieldType::General => strip_punctuation(value),
    }
}

fn normalize_extracted(value: &str, field_type: FieldType) -> String {
    let lower = value.to_lowercase();
    if lower == "true" {
        return CHECKED_MARK.to_string();
    }
    if lower == "false" {
        return String::new();
    }

    if field_type == FieldType::Boolean {
        match lower.as_str() {
            ":selected:" | "selected" | "x" | "v" | "✓" | "✔" | "yes" => {
                return CHECKED_MARK.to_string()
            }
            ":unselected:" | "unselected" | "no" => return String::new(),
            _ => {}
        }
    }

    if is_spaced_digits(value) {
        strip_whitespace(value)
    } else {
        strip_punctuation(value)
    }
}

/// Whether two normalized values match under the field's comparison rule.
pub fn values_match(expected: &str, extracted: &str, field_type: FieldType) -> bool {
    if field_type == FieldType::MedicalCode
        && !expected.is_empty()
        && !extracted.is_empty()
        && (expected.contains(extracted) || extracted.contains(expected))
    {
        return true;
    }
    expected == extracted
}

/// Digits separated by arbitrary whitespace, e.g. "1 2  3".
fn is_spaced_digits(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn strip_punctuation(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '/')
        .collect()
}
