use crate::compare::report::{Report, Stats};
use crate::error::FormscanError;
use crate::model::ComparisonRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DETAILED_SHEET: &str = "detailed_results.csv";
pub const SECTION_SHEET: &str = "section_statistics.csv";
pub const FILE_SHEET: &str = "file_statistics.csv";
pub const REPORT_JSON: &str = "report.json";

/// Files written by [`write_sheets`].
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub detailed: PathBuf,
    pub sections: PathBuf,
    pub files: PathBuf,
    pub report: PathBuf,
}

/// Write the detailed records, both statistics tables and the report.
pub fn write_sheets(
    dir: &Path,
    records: &[ComparisonRecord],
    report: &Report,
) -> Result<ExportPaths, FormscanError> {
    std::fs::create_dir_all(dir)?;
    let paths = ExportPaths {
        detailed: dir.join(DETAILED_SHEET),
        sections: dir.join(SECTION_SHEET),
        files: dir.join(FILE_SHEET),
        report: dir.join(REPORT_JSON),
    };

    let mut writer = csv::Writer::from_path(&paths.detailed)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    write_stats(&paths.sections, "section", &report.section_stats)?;
    write_stats(&paths.files, "filename", &report.file_stats)?;

    std::fs::write(&paths.report, serde_json::to_string_pretty(report)?)?;

    tracing::info!(dir = %dir.display(), records = records.len(), "comparison results written");
    Ok(paths)
}

fn write_stats(
    path: &Path,
    key: &str,
    stats: &BTreeMap<String, Stats>,
) -> Result<(), FormscanError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([key, "total", "matched", "match_rate"])?;
    for (name, s) in stats {
        let total = s.total.to_string();
        let matched = s.matched.to_string();
        let rate = format!("{:.2}", s.match_rate);
        writer.write_record([name.as_str(), total.as_str(), matched.as_str(), rate.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
