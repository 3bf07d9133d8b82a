use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// The structured answer for one section. Empty when the section failed.
pub type SectionRecord = Map<String, Value>;

/// Section name -> section record, in layout order.
pub type FormRecord = Map<String, Value>;

/// One named band of the section layout, in rendered-pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDef {
    pub name: String,
    pub y_start: u32,
}

/// Ordered section boundaries for page 1 of a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionLayout {
    /// DPI the `y_start` coordinates were authored at, if declared.
    #[serde(default)]
    pub dpi: Option<u32>,
    pub sections: Vec<SectionDef>,
}

/// Computed geometry of a section: `[y_start, y_end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionBand {
    pub name: String,
    pub y_start: u32,
    pub y_end: u32,
}

impl SectionBand {
    pub fn height(&self) -> u32 {
        self.y_end - self.y_start
    }
}

/// A saved crop of the rendered page.
#[derive(Debug, Clone)]
pub struct SectionImage {
    pub name: String,
    pub y_start: u32,
    pub y_end: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    pub row: u32,
    pub column: u32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Engine-agnostic result of one document-analysis call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    pub key_value_pairs: BTreeMap<String, String>,
    pub tables: Vec<Vec<TableCell>>,
    pub paragraphs: Vec<String>,
    pub form_fields: Vec<FormField>,
}

impl OcrResult {
    /// The payload handed to the structuring model for one section.
    pub fn llm_payload(&self) -> Value {
        serde_json::json!({
            "text": self.paragraphs,
            "fields": self.form_fields,
            "key_value_pairs": self.key_value_pairs,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.key_value_pairs.is_empty()
            && self.tables.is_empty()
            && self.paragraphs.is_empty()
            && self.form_fields.is_empty()
    }
}

/// Comparison semantics attached to a schema field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Checkbox; selected is the `V` mark, unselected is empty.
    Boolean,
    /// IDs, phone numbers, postal codes.
    Numeric,
    /// Diagnosis codes; matched by containment.
    MedicalCode,
    Date,
    Text,
    #[default]
    General,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Boolean => "boolean",
            FieldType::Numeric => "numeric",
            FieldType::MedicalCode => "medical_code",
            FieldType::Date => "date",
            FieldType::Text => "text",
            FieldType::General => "general",
        };
        f.write_str(s)
    }
}

impl FieldType {
    pub fn from_str_loose(s: &str) -> Option<FieldType> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "boolean" | "bool" | "checkbox" => Some(FieldType::Boolean),
            "numeric" | "number" | "id" | "phone" => Some(FieldType::Numeric),
            "medical_code" | "diagnosis" => Some(FieldType::MedicalCode),
            "date" => Some(FieldType::Date),
            "text" | "free_text" => Some(FieldType::Text),
            "general" | "string" => Some(FieldType::General),
            _ => None,
        }
    }
}

/// One expected value from the ground-truth master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthRow {
    pub filename: String,
    pub section: String,
    pub field: String,
    pub expected_value: String,
}

/// One (file, field) comparison; the atomic unit of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub filename: String,
    pub section: String,
    pub field: String,
    pub expected_value: String,
    pub extracted_value: Option<String>,
    pub normalized_expected: String,
    pub normalized_extracted: String,
    pub matches: bool,
}
