use crate::error::FormscanError;
use crate::model::{FieldType, SectionLayout};
use crate::schema::FieldSchema;

const FORM_283_SCHEMA_JSON: &str = include_str!("../../../../resources/schema.json");
const FORM_283_SECTIONS_JSON: &str = include_str!("../../../../resources/sections.json");

/// Field schema for the bundled form 283 layout.
pub fn form_283_schema() -> Result<FieldSchema, FormscanError> {
    crate::schema::parse_schema_str(FORM_283_SCHEMA_JSON)
}

/// Section layout for the bundled form 283, authored at 300 DPI.
pub fn form_283_layout() -> Result<SectionLayout, FormscanError> {
    crate::layout::parse_layout_str(FORM_283_SECTIONS_JSON)
}

const MEDICAL_CODE_MARKER: &str = "אבחנה רפואית";

const BOOLEAN_FIELDS: &[&str] = &[
    "מין/זכר",
    "מין/נקבה",
    "מקום התאונה/מפעל",
    "מקום התאונה/ת. דרכים בעבודה",
    "מקום התאונה/ת. דרכים בדרך לעבודה/מהעבודה",
    "מקום התאונה/תאונה בדרך לא רכב",
    "מקום התאונה/אחר",
    "סטטוס חברות בקופת חולים/הנפגע חבר בקופת חולים",
    "סטטוס חברות בקופת חולים/הנפגע אינו חבר בקופת חולים",
    "קופת חולים/כללית",
    "קופת חולים/מאוחדת",
    "קופת חולים/מכבי",
    "קופת חולים/לאומית",
];

const NUMERIC_FIELDS: &[&str] = &["ת.ז", "טלפון קווי", "טלפון נייד", "מיקוד"];

const DATE_FIELDS: &[&str] = &[
    "תאריך מילוי הטופס",
    "תאריך קבלת הטופס בקופה",
    "תאריך הפגיעה",
    "תאריך לידה",
    "בתאריך",
];

const TEXT_FIELDS: &[&str] = &[
    "נסיבות הפגיעה",
    "תיאור התאונה",
    "כתובת מקום התאונה",
    "האיבר שנפגע",
    "שם המבקש",
];

/// Classify a field path (`label` or `label/sub_label`) by name.
///
/// Used for schema entries without an explicit `type` and for ground-truth
/// fields the schema does not declare. Date and text names match as
/// substrings, the rest exactly.
pub fn classify_field_name(field: &str) -> FieldType {
    let field = field.trim();
    if field.contains(MEDICAL_CODE_MARKER) {
        FieldType::MedicalCode
    } else if BOOLEAN_FIELDS.contains(&field) {
        FieldType::Boolean
    } else if NUMERIC_FIELDS.contains(&field) {
        FieldType::Numeric
    } else if DATE_FIELDS.iter().any(|d| field.contains(d)) {
        FieldType::Date
    } else if TEXT_FIELDS.iter().any(|t| field.contains(t)) {
        FieldType::Text
    } else {
        FieldType::General
    }
}
