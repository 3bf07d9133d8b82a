use formscan_core::batch::BatchSummary;
use formscan_core::compare::report::{Report, Stats};
use formscan_core::model::SectionImage;
use formscan_core::schema::FieldCatalog;
use formscan_core::FormOutcome;
use serde_json::Value;
use std::collections::BTreeMap;

pub fn format_outcome(outcome: &FormOutcome) -> String {
    let status = if outcome.reconciled {
        "reconciled"
    } else {
        "first pass only"
    };
    let mut lines = vec![format!("=== {} ({status}) ===", outcome.filename), String::new()];

    for (section, content) in &outcome.final_record {
        lines.push(format!("  [{section}]"));
        for (label, value) in section_rows(content) {
            lines.push(format!("    {label}: {value}"));
        }
    }

    if !outcome.failures.is_empty() {
        lines.push(String::new());
        lines.push("  Failures:".into());
        for failure in &outcome.failures {
            lines.push(format!("    {failure}"));
        }
    }
    lines.push(String::new());
    lines.push(format!("  Written to {}", outcome.analysis_path.display()));
    lines.join("\n")
}

/// Flatten a section into `label: value` rows, sub-fields as `main/sub`.
fn section_rows(content: &Value) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    match content.get("fields").and_then(Value::as_array) {
        Some(fields) => {
            for field in fields {
                let label = field.get("label").and_then(Value::as_str).unwrap_or("?");
                if let Some(value) = field.get("value").filter(|v| !v.is_null()) {
                    rows.push((label.to_string(), display_value(value)));
                }
                let subs = field.get("sub_fields").and_then(Value::as_array);
                for sub in subs.into_iter().flatten() {
                    let sub_label = sub.get("label").and_then(Value::as_str).unwrap_or("?");
                    let value = sub.get("value").unwrap_or(&Value::Null);
                    rows.push((format!("{label}/{sub_label}"), display_value(value)));
                }
            }
        }
        None => {
            if let Some(map) = content.as_object() {
                for (label, value) in map {
                    match value.as_object() {
                        Some(subs) => {
                            for (sub_label, v) in subs {
                                rows.push((format!("{label}/{sub_label}"), display_value(v)));
                            }
                        }
                        None => rows.push((label.clone(), display_value(value))),
                    }
                }
            }
        }
    }
    rows
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".into(),
        Value::String(s) if s.is_empty() => "\"\"".into(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn format_batch(summary: &BatchSummary) -> String {
    let mut lines = vec![format!(
        "Forms found: {}, processed: {}, skipped: {}, failed: {}",
        summary.found,
        summary.processed,
        summary.skipped,
        summary.failed.len()
    )];
    for (stem, error) in &summary.failed {
        lines.push(format!("  failed: {stem}: {error}"));
    }
    if !summary.degraded.is_empty() {
        lines.push(format!("  degraded sections: {}", summary.degraded.join(", ")));
    }
    if !summary.not_reconciled.is_empty() {
        lines.push(format!("  not reconciled: {}", summary.not_reconciled.join(", ")));
    }
    lines.join("\n")
}

pub fn format_sections(sections: &[SectionImage]) -> String {
    let width = sections.iter().map(|s| s.name.len()).max().unwrap_or(7);
    sections
        .iter()
        .map(|s| {
            format!(
                "  {:<width$}  y {:>5}..{:<5}  {}",
                s.name,
                s.y_start,
                s.y_end,
                s.path.display()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_report(report: &Report) -> String {
    let mut lines = vec![
        format!(
            "Overall: {}/{} fields matched ({:.2}%) across {} file(s)",
            report.matched_fields, report.total_fields, report.overall_match_rate, report.total_files
        ),
        String::new(),
    ];
    lines.extend(stats_rows("Section", &report.section_stats));
    lines.push(String::new());
    lines.extend(stats_rows("File", &report.file_stats));
    lines.join("\n")
}

fn stats_rows(title: &str, stats: &BTreeMap<String, Stats>) -> Vec<String> {
    let width = stats
        .keys()
        .map(|k| k.chars().count())
        .max()
        .unwrap_or(0)
        .max(title.len());
    let mut rows = vec![format!(
        "  {title:<width$}  {:>7}  {:>7}  {:>7}",
        "total", "matched", "rate"
    )];
    for (name, s) in stats {
        rows.push(format!(
            "  {name:<width$}  {:>7}  {:>7}  {:>6.2}%",
            s.total, s.matched, s.match_rate
        ));
    }
    rows
}

pub fn format_catalog(catalog: &FieldCatalog) -> String {
    let mut out = String::new();
    let mut current = "";
    for (section, field, ty) in catalog.entries() {
        if section != current {
            if !current.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("=== {section} ===\n"));
            current = section;
        }
        out.push_str(&format!("  {field}  ({ty})\n"));
    }
    out.push_str(&format!("\n{} field(s)", catalog.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_rows_both_shapes() {
        let listed = json!({"fields": [
            {"label": "ת.ז", "value": "123"},
            {"label": "מין", "value": null, "sub_fields": [{"label": "זכר", "value": "V"}]}
        ]});
        assert_eq!(
            section_rows(&listed),
            vec![
                ("ת.ז".to_string(), "123".to_string()),
                ("מין/זכר".to_string(), "V".to_string()),
            ]
        );

        let plain = json!({"שם": "", "מין": {"נקבה": null}});
        assert_eq!(
            section_rows(&plain),
            vec![
                ("שם".to_string(), "\"\"".to_string()),
                ("מין/נקבה".to_string(), "-".to_string()),
            ]
        );
    }

    #[test]
    fn test_format_batch() {
        let summary = BatchSummary {
            found: 3,
            processed: 1,
            skipped: 1,
            failed: vec![("form_3".into(), "pdftoppm failed".into())],
            degraded: vec![],
            not_reconciled: vec!["form_1".into()],
        };
        let text = format_batch(&summary);
        assert!(text.starts_with("Forms found: 3, processed: 1, skipped: 1, failed: 1"));
        assert!(text.contains("failed: form_3: pdftoppm failed"));
        assert!(text.ends_with("not reconciled: form_1"));
    }

    #[test]
    fn test_format_report() {
        let mut section_stats = BTreeMap::new();
        section_stats.insert("section2".to_string(), Stats::new(10, 7));
        let mut file_stats = BTreeMap::new();
        file_stats.insert("form_1.pdf".to_string(), Stats::new(10, 7));
        let report = Report {
            total_files: 1,
            total_fields: 10,
            matched_fields: 7,
            overall_match_rate: 70.0,
            section_stats,
            file_stats,
        };

        let text = format_report(&report);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Overall: 7/10 fields matched (70.00%) across 1 file(s)");
        assert!(lines[3].starts_with("  section2"));
        assert!(lines[3].ends_with("70.00%"));
        assert!(text.ends_with("70.00%"));
    }
}
