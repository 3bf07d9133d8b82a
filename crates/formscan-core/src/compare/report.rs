use crate::model::ComparisonRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Match counts for one group of comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub matched: usize,
    /// Percentage in `[0, 100]`; 0 when `total` is 0.
    pub match_rate: f64,
}

impl Stats {
    pub fn new(total: usize, matched: usize) -> Self {
        Stats {
            total,
            matched,
            match_rate: match_rate(matched, total),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub total_files: usize,
    pub total_fields: usize,
    pub matched_fields: usize,
    pub overall_match_rate: f64,
    pub section_stats: BTreeMap<String, Stats>,
    pub file_stats: BTreeMap<String, Stats>,
}

pub fn match_rate(matched: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64 * 100.0
    }
}

/// Summarize comparison records by section and by file.
pub fn aggregate(records: &[ComparisonRecord]) -> Report {
    let mut sections: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut files: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut filenames = BTreeSet::new();
    let mut matched_fields = 0;

    for record in records {
        let hit = usize::from(record.matches);
        matched_fields += hit;
        filenames.insert(record.filename.as_str());

        let section = sections.entry(record.section.clone()).or_default();
        section.0 += 1;
        section.1 += hit;

        let file = files.entry(record.filename.clone()).or_default();
        file.0 += 1;
        file.1 += hit;
    }

    Report {
        total_files: filenames.len(),
        total_fields: records.len(),
        matched_fields,
        overall_match_rate: match_rate(matched_fields, records.len()),
        section_stats: to_stats(sections),
        file_stats: to_stats(files),
    }
}

fn to_stats(groups: BTreeMap<String, (usize, usize)>) -> BTreeMap<String, Stats> {
    groups
        .into_iter()
        .map(|(name, (total, matched))| (name, Stats::new(total, matched)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(filename: &str, section: &str, matches: bool) -> ComparisonRecord {
        ComparisonRecord {
            filename: filename.into(),
            section: section.into(),
            field: "f".into(),
            expected_value: "x".into(),
            extracted_value: None,
            normalized_expected: "x".into(),
            normalized_extracted: String::new(),
            matches,
        }
    }

    #[test]
    fn test_seven_of_ten_is_seventy_percent() {
        let records: Vec<_> = (0..10)
            .map(|i| record("form_1.pdf", "section2", i < 7))
            .collect();
        let report = aggregate(&records);
        assert_eq!(report.total_fields, 10);
        assert_eq!(report.matched_fields, 7);
        assert_eq!(report.overall_match_rate, 70.0);
        assert_eq!(report.section_stats["section2"], Stats::new(10, 7));
    }

    #[test]
    fn test_groups_by_section_and_file() {
        let records = vec![
            record("form_1.pdf", "header", true),
            record("form_1.pdf", "section2", false),
            record("form_2.pdf", "section2", true),
        ];
        let report = aggregate(&records);
        assert_eq!(report.total_files, 2);
        assert_eq!(report.section_stats["header"].match_rate, 100.0);
        assert_eq!(report.section_stats["section2"].match_rate, 50.0);
        assert_eq!(report.file_stats["form_2.pdf"].total, 1);
        for stats in report.section_stats.values().chain(report.file_stats.values()) {
            assert!(stats.matched <= stats.total);
            assert!((0.0..=100.0).contains(&stats.match_rate));
        }
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let records = vec![
            record("form_1.pdf", "header", true),
            record("form_3.pdf", "section5", false),
        ];
        assert_eq!(aggregate(&records), aggregate(&records));
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&[]);
        assert_eq!(report.total_fields, 0);
        assert_eq!(report.overall_match_rate, 0.0);
        assert!(report.section_stats.is_empty());
    }
}
