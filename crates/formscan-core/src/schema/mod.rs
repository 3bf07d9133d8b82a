pub mod builtin;

use crate::error::FormscanError;
use crate::model::FieldType;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Separator between a field label and a sub-field label in field paths.
pub const PATH_SEPARATOR: char = '/';

/// A declared field of a section, with its type resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub label: String,
    pub field_type: FieldType,
    pub sub_fields: Vec<FieldSpec>,
}

/// The fields declared for one section.
#[derive(Debug, Clone)]
pub struct SectionSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    /// The section's schema exactly as written, handed to the model as the
    /// structuring contract.
    pub raw: Value,
}

impl SectionSchema {
    pub fn field(&self, label: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.label == label)
    }
}

/// Per-section field schema, in file order.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    pub sections: Vec<SectionSchema>,
}

impl FieldSchema {
    pub fn section(&self, name: &str) -> Option<&SectionSchema> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Pretty JSON of a section's schema; `{}` for undeclared sections.
    pub fn section_contract(&self, name: &str) -> String {
        let raw = self
            .section(name)
            .map(|s| s.raw.clone())
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::to_string_pretty(&raw).unwrap_or_else(|_| "{}".to_string())
    }

    /// Flatten the schema into a `(section, field path) -> type` lookup.
    pub fn catalog(&self) -> FieldCatalog {
        let mut types = HashMap::new();
        for section in &self.sections {
            for field in &section.fields {
                types.insert((section.name.clone(), field.label.clone()), field.field_type);
                for sub in &field.sub_fields {
                    let path = format!("{}{}{}", field.label, PATH_SEPARATOR, sub.label);
                    types.insert((section.name.clone(), path), sub.field_type);
                }
            }
        }
        FieldCatalog { types }
    }
}

/// Field types resolved once from the schema.
///
/// Fields the schema does not declare fall back to the built-in name
/// classification.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    types: HashMap<(String, String), FieldType>,
}

impl FieldCatalog {
    pub fn field_type(&self, section: &str, field: &str) -> FieldType {
        self.types
            .get(&(section.to_string(), field.to_string()))
            .copied()
            .unwrap_or_else(|| builtin::classify_field_name(field))
    }

    /// All declared fields, sorted by section then field path.
    pub fn entries(&self) -> Vec<(&str, &str, FieldType)> {
        let mut entries: Vec<_> = self
            .types
            .iter()
            .map(|((section, field), ty)| (section.as_str(), field.as_str(), *ty))
            .collect();
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawSection {
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    label: String,
    #[serde(default, rename = "type")]
    field_type: Option<String>,
    #[serde(default)]
    sub_fields: Vec<RawField>,
}

/// Load a field schema from a JSON file.
pub fn load_schema(path: &Path) -> Result<FieldSchema, FormscanError> {
    let content = std::fs::read_to_string(path).map_err(|e| FormscanError::ConfigLoad {
        what: "field schema",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_schema_str(&content).map_err(|e| FormscanError::ConfigLoad {
        what: "field schema",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Parse a field schema from a JSON string, resolving every field type.
pub fn parse_schema_str(json: &str) -> Result<FieldSchema, FormscanError> {
    let root: Map<String, Value> = serde_json::from_str(json)?;
    if root.is_empty() {
        return Err(FormscanError::SchemaInvalid(
            "schema must declare at least one section".into(),
        ));
    }

    let mut sections = Vec::with_capacity(root.len());
    for (name, raw) in root {
        let parsed: RawSection = serde_json::from_value(raw.clone()).map_err(|e| {
            FormscanError::SchemaInvalid(format!("section '{name}': {e}"))
        })?;
        let fields = resolve_fields(&name, None, parsed.fields)?;
        sections.push(SectionSchema { name, fields, raw });
    }

    Ok(FieldSchema { sections })
}

fn resolve_fields(
    section: &str,
    parent: Option<&str>,
    raw: Vec<RawField>,
) -> Result<Vec<FieldSpec>, FormscanError> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(raw.len());

    for field in raw {
        let label = field.label.trim().to_string();
        if label.is_empty() {
            return Err(FormscanError::SchemaInvalid(format!(
                "section '{section}' has a field with an empty label"
            )));
        }
        if !seen.insert(label.clone()) {
            return Err(FormscanError::SchemaInvalid(format!(
                "section '{section}' declares '{label}' twice"
            )));
        }

        let path = match parent {
            Some(p) => format!("{p}{PATH_SEPARATOR}{label}"),
            None => label.clone(),
        };

        let field_type = match field.field_type.as_deref() {
            Some(tag) => FieldType::from_str_loose(tag).ok_or_else(|| {
                FormscanError::SchemaInvalid(format!(
                    "field '{path}' in section '{section}' has unknown type '{tag}'"
                ))
            })?,
            None => builtin::classify_field_name(&path),
        };

        if parent.is_some() && !field.sub_fields.is_empty() {
            return Err(FormscanError::SchemaInvalid(format!(
                "field '{path}' in section '{section}' nests sub-fields more than one level deep"
            )));
        }
        let sub_fields = resolve_fields(section, Some(&label), field.sub_fields)?;

        fields.push(FieldSpec {
            label,
            field_type,
            sub_fields,
        });
    }

    Ok(fields)
}
