pub mod export;
pub mod ground_truth;
pub mod report;

use crate::artifacts;
use crate::model::{ComparisonRecord, FormRecord, GroundTruthRow};
use crate::normalize::{normalize, values_match, ValueSide};
use crate::schema::{FieldCatalog, PATH_SEPARATOR};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

static NULL: Value = Value::Null;

/// Extracted records keyed by PDF filename; `None` when the artifact exists
/// but could not be read.
pub type ExtractedForms = BTreeMap<String, Option<FormRecord>>;

/// Compare every ground-truth row against the extracted records.
///
/// A missing file, section or field, or an unreadable artifact, yields
/// `extracted_value: None`. Output follows ground-truth order.
pub fn compare(
    ground_truth: &[GroundTruthRow],
    extracted: &ExtractedForms,
    catalog: &FieldCatalog,
) -> Vec<ComparisonRecord> {
    ground_truth
        .iter()
        .map(|row| {
            let field_type = catalog.field_type(&row.section, &row.field);
            let extracted_value = extracted
                .get(&row.filename)
                .and_then(Option::as_ref)
                .and_then(|record| lookup_field(record, &row.section, &row.field));

            let normalized_expected =
                normalize(Some(&row.expected_value), field_type, ValueSide::Expected);
            let normalized_extracted =
                normalize(extracted_value.as_deref(), field_type, ValueSide::Extracted);
            let matches = values_match(&normalized_expected, &normalized_extracted, field_type);

            ComparisonRecord {
                filename: row.filename.clone(),
                section: row.section.clone(),
                field: row.field.clone(),
                expected_value: row.expected_value.clone(),
                extracted_value,
                normalized_expected,
                normalized_extracted,
                matches,
            }
        })
        .collect()
}

/// Find a field's value in a record; `/` in `field` addresses a sub-field.
///
/// Labels may themselves contain `/`, so the whole path is tried as a label
/// first, then each split point from the left as `main/sub`.
pub fn lookup_field(record: &FormRecord, section: &str, field: &str) -> Option<String> {
    let section = record.get(section)?.as_object()?;

    if let Some(value) = find_value(section, field, None) {
        return stringify(value);
    }
    for (pos, _) in field.match_indices(PATH_SEPARATOR) {
        let (main, sub) = (&field[..pos], &field[pos + 1..]);
        if let Some(value) = find_value(section, main, Some(sub)) {
            return stringify(value);
        }
    }
    None
}

fn find_value<'a>(section: &'a Map<String, Value>, main: &str, sub: Option<&str>) -> Option<&'a Value> {
    if let Some(Value::Array(fields)) = section.get("fields") {
        if let Some(value) = find_in_list(fields, main, sub) {
            return Some(value);
        }
    }

    let value = section.get(main)?;
    match sub {
        None if !value.is_object() => Some(value),
        None => None,
        Some(sub) => value.as_object()?.get(sub),
    }
}

fn find_in_list<'a>(fields: &'a [Value], main: &str, sub: Option<&str>) -> Option<&'a Value> {
    let entry = fields.iter().find(|f| label_is(f, main))?;
    match sub {
        None => Some(entry.get("value").unwrap_or(&NULL)),
        Some(sub) => entry
            .get("sub_fields")?
            .as_array()?
            .iter()
            .find(|s| label_is(s, sub))
            .map(|s| s.get("value").unwrap_or(&NULL)),
    }
}

fn label_is(entry: &Value, label: &str) -> bool {
    entry
        .get("label")
        .and_then(Value::as_str)
        .is_some_and(|l| l.trim() == label.trim())
}

/// Render a JSON value the way it is compared: `null` is absent.
pub fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// PDF filenames (`<stem>.pdf`) that have an analysis artifact in `dir`.
pub fn analyzed_filenames(dir: &Path) -> HashSet<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return HashSet::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            name.strip_suffix(artifacts::ANALYSIS_SUFFIX)
                .map(|stem| format!("{stem}.pdf"))
        })
        .collect()
}

/// Keep only ground-truth rows for the given files.
pub fn restrict_to(rows: Vec<GroundTruthRow>, filenames: &HashSet<String>) -> Vec<GroundTruthRow> {
    rows.into_iter()
        .filter(|r| filenames.contains(&r.filename))
        .collect()
}

/// Load the analysis artifact of each distinct filename.
///
/// Files without an artifact are left out; unreadable ones map to `None`.
pub fn load_artifacts<'a>(dir: &Path, filenames: impl IntoIterator<Item = &'a str>) -> ExtractedForms {
    let mut forms = ExtractedForms::new();
    for filename in filenames {
        if forms.contains_key(filename) {
            continue;
        }
        let stem = artifacts::form_stem(Path::new(filename));
        let path = artifacts::analysis_path(dir, &stem);
        if !path.is_file() {
            tracing::debug!(file = %filename, "no analysis artifact");
            continue;
        }
        let record = match artifacts::read_record(&path) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::error!(file = %filename, path = %path.display(), error = %e, "unreadable analysis artifact");
                None
            }
        };
        forms.insert(filename.to_string(), record);
    }
    forms
}
