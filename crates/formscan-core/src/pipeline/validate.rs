//! Checks model replies against the field schema before they are accepted.
//!
//! Shape errors reject the reply. Labels the schema does not declare are
//! dropped with a warning, unless nothing declared is left.

use crate::model::{FormRecord, SectionRecord};
use crate::schema::{FieldSchema, FieldSpec, SectionSchema};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("reply is not a JSON object")]
    NotAnObject,

    #[error("'fields' must be an array of objects")]
    FieldsNotArray,

    #[error("field entry {index} has no label")]
    MissingLabel { index: usize },

    #[error("field '{label}' has a non-scalar value")]
    NonScalarValue { label: String },

    #[error("sub_fields of '{label}' must be an array of labelled objects")]
    BadSubFields { label: String },

    #[error("reply declares none of the section's fields")]
    NoKnownFields,

    #[error("reply contains none of the form's sections")]
    NoKnownSections,
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Validate one section reply and drop undeclared labels.
///
/// Accepts the `{"fields": [...]}` shape and plain `{"label": value}`
/// objects. With no schema for the section every well-formed label is kept.
pub fn validate_section(
    schema: Option<&SectionSchema>,
    reply: Value,
) -> Result<SectionRecord, ValidationError> {
    let Value::Object(mut object) = reply else {
        return Err(ValidationError::NotAnObject);
    };

    match object.remove("fields") {
        Some(fields) => {
            let fields = validate_field_list(schema, fields)?;
            object.insert("fields".into(), fields);
            Ok(object)
        }
        None => validate_plain(schema, object),
    }
}

fn validate_field_list(
    schema: Option<&SectionSchema>,
    fields: Value,
) -> Result<Value, ValidationError> {
    let Value::Array(entries) = fields else {
        return Err(ValidationError::FieldsNotArray);
    };
    let total = entries.len();

    let mut kept = Vec::with_capacity(total);
    for (index, entry) in entries.into_iter().enumerate() {
        let Value::Object(mut entry) = entry else {
            return Err(ValidationError::FieldsNotArray);
        };
        let label = label_of(&entry).ok_or(ValidationError::MissingLabel { index })?;

        if let Some(value) = entry.get("value") {
            if !is_scalar(value) {
                return Err(ValidationError::NonScalarValue { label });
            }
        }

        let spec = schema.and_then(|s| s.field(&label));
        if schema.is_some() && spec.is_none() {
            tracing::warn!(label = %label, "dropping undeclared field from reply");
            continue;
        }

        if let Some(subs) = entry.remove("sub_fields") {
            let subs = validate_sub_fields(&label, spec, subs)?;
            entry.insert("sub_fields".into(), subs);
        }
        kept.push(Value::Object(entry));
    }

    if total > 0 && kept.is_empty() {
        return Err(ValidationError::NoKnownFields);
    }
    Ok(Value::Array(kept))
}

fn validate_sub_fields(
    parent: &str,
    spec: Option<&FieldSpec>,
    subs: Value,
) -> Result<Value, ValidationError> {
    let bad = || ValidationError::BadSubFields {
        label: parent.to_string(),
    };
    let Value::Array(entries) = subs else {
        return Err(bad());
    };

    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(entry) = entry else {
            return Err(bad());
        };
        let label = label_of(&entry).ok_or_else(bad)?;
        if entry.get("value").is_some_and(|v| !is_scalar(v)) {
            return Err(ValidationError::NonScalarValue {
                label: format!("{parent}/{label}"),
            });
        }
        let declared = match spec {
            Some(spec) => spec.sub_fields.iter().any(|s| s.label == label),
            None => true,
        };
        if declared {
            kept.push(Value::Object(entry));
        } else {
            tracing::warn!(field = %parent, sub_field = %label, "dropping undeclared sub-field from reply");
        }
    }
    Ok(Value::Array(kept))
}

fn validate_plain(
    schema: Option<&SectionSchema>,
    object: Map<String, Value>,
) -> Result<SectionRecord, ValidationError> {
    let total = object.len();
    let mut kept = Map::new();

    for (label, value) in object {
        match &value {
            Value::Object(subs) => {
                if let Some((sub, _)) = subs.iter().find(|(_, v)| !is_scalar(v)) {
                    return Err(ValidationError::NonScalarValue {
                        label: format!("{label}/{sub}"),
                    });
                }
            }
            Value::Array(_) => return Err(ValidationError::NonScalarValue { label }),
            _ => {}
        }

        if schema.is_some_and(|s| s.field(&label).is_none()) {
            tracing::warn!(label = %label, "dropping undeclared field from reply");
            continue;
        }
        kept.insert(label, value);
    }

    if total > 0 && kept.is_empty() {
        return Err(ValidationError::NoKnownFields);
    }
    Ok(kept)
}

fn label_of(entry: &Map<String, Value>) -> Option<String> {
    entry
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

/// Validate a reconciliation reply against the first-pass record.
///
/// Sections come back in first-pass order. A section the reply omits keeps
/// its first-pass value; sections the first pass did not have are ignored.
pub fn validate_form(
    schema: &FieldSchema,
    first_pass: &FormRecord,
    reply: Value,
) -> Result<FormRecord, ValidationError> {
    let Value::Object(mut reply) = reply else {
        return Err(ValidationError::NotAnObject);
    };

    if !first_pass.is_empty() && !first_pass.keys().any(|k| reply.contains_key(k)) {
        return Err(ValidationError::NoKnownSections);
    }

    let mut record = FormRecord::new();
    for (section, previous) in first_pass {
        let value = match reply.remove(section) {
            Some(value) => Value::Object(validate_section(schema.section(section), value)?),
            None => {
                tracing::warn!(section = %section, "reconciliation omitted section, keeping first pass");
                previous.clone()
            }
        };
        record.insert(section.clone(), value);
    }

    for extra in reply.keys() {
        tracing::warn!(section = %extra, "ignoring section not present in first pass");
    }
    Ok(record)
}
