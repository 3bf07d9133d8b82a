use crate::error::FormscanError;
use crate::model::GroundTruthRow;
use calamine::{open_workbook, Reader, Xlsx};
use std::io::Read;
use std::path::Path;

pub const FILENAME_COLUMN: &str = "filename";
pub const COMPOSITE_COLUMN: &str = "section|field|value";

/// Load ground truth from a CSV file, or the first sheet of an `.xlsx`.
pub fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruthRow>, FormscanError> {
    let is_xlsx = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    let rows = if is_xlsx {
        load_xlsx(path)?
    } else {
        let file = std::fs::File::open(path).map_err(|e| FormscanError::GroundTruth {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        parse_csv(file).map_err(|e| FormscanError::GroundTruth {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    };
    tracing::info!(rows = rows.len(), path = %path.display(), "ground truth loaded");
    Ok(rows)
}

/// Parse ground truth CSV with `filename` and `section|field|value` columns.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<GroundTruthRow>, FormscanError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    let (file_col, composite_col) = locate_columns(headers.iter())?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let filename = record.get(file_col).unwrap_or_default();
        let composite = record.get(composite_col).unwrap_or_default();
        // Line 1 is the header.
        if let Some(row) = build_row(i + 2, filename, composite) {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn load_xlsx(path: &Path) -> Result<Vec<GroundTruthRow>, FormscanError> {
    let err = |reason: String| FormscanError::GroundTruth {
        path: path.to_path_buf(),
        reason,
    };
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e| err(format!("failed to open xlsx: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| err("workbook has no sheets".into()))?
        .map_err(|e| err(format!("failed to read first sheet: {e}")))?;

    let mut sheet_rows = range.rows();
    let header: Vec<String> = sheet_rows
        .next()
        .ok_or_else(|| err("sheet is empty".into()))?
        .iter()
        .map(|c| cell_as_string(c).unwrap_or_default())
        .collect();
    let (file_col, composite_col) =
        locate_columns(header.iter().map(String::as_str)).map_err(|e| err(e.to_string()))?;

    let mut rows = Vec::new();
    for (i, cells) in sheet_rows.enumerate() {
        let filename = cells
            .get(file_col)
            .and_then(cell_as_string)
            .unwrap_or_default();
        let composite = cells
            .get(composite_col)
            .and_then(cell_as_string)
            .unwrap_or_default();
        if let Some(row) = build_row(i + 2, &filename, &composite) {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn locate_columns<'a>(
    headers: impl Iterator<Item = &'a str>,
) -> Result<(usize, usize), FormscanError> {
    let headers: Vec<&str> = headers.map(|h| h.trim().trim_start_matches('\u{feff}')).collect();
    let find = |name: &str| {
        headers.iter().position(|h| *h == name).ok_or_else(|| {
            FormscanError::Config(format!(
                "ground truth is missing the '{name}' column (found: {})",
                headers.join(", ")
            ))
        })
    };
    Ok((find(FILENAME_COLUMN)?, find(COMPOSITE_COLUMN)?))
}

fn build_row(line: usize, filename: &str, composite: &str) -> Option<GroundTruthRow> {
    let filename = filename.trim();
    if filename.is_empty() {
        return None;
    }
    match split_composite(composite) {
        Some((section, field, value)) => Some(GroundTruthRow {
            filename: filename.to_string(),
            section,
            field,
            expected_value: value,
        }),
        None => {
            tracing::warn!(line, value = %composite, "skipping malformed ground truth row");
            None
        }
    }
}

/// Split `section|field|value`. The value may itself contain `|`.
pub fn split_composite(composite: &str) -> Option<(String, String, String)> {
    let mut parts = composite.splitn(3, '|');
    let section = parts.next()?.trim();
    let field = parts.next()?.trim();
    let value = parts.next()?;
    if section.is_empty() || field.is_empty() {
        return None;
    }
    Some((section.to_string(), field.to_string(), value.to_string()))
}

fn cell_as_string(cell: &calamine::Data) -> Option<String> {
    match cell {
        calamine::Data::String(s) => Some(s.clone()),
        calamine::Data::Float(f) if f.fract() == 0.0 => Some(format!("{f:.0}")),
        calamine::Data::Float(f) => Some(f.to_string()),
        calamine::Data::Int(i) => Some(i.to_string()),
        calamine::Data::Bool(b) => Some(b.to_string()),
        calamine::Data::Empty => None,
        _ => Some(format!("{cell}")),
    }
}
