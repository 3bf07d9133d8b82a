use crate::error::FormscanError;
use crate::llm::ChatMessage;
use crate::model::{FormRecord, OcrResult};
use crate::schema::FieldSchema;
use std::path::Path;

/// Instruction prompts for the two structuring passes.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Per-section extraction instructions (first pass).
    pub extraction: String,
    /// Whole-form reconciliation instructions (second pass).
    pub reconciliation: String,
}

impl Prompts {
    pub fn load(extraction_path: &Path, reconciliation_path: &Path) -> Result<Self, FormscanError> {
        Ok(Prompts {
            extraction: read_prompt(extraction_path)?,
            reconciliation: read_prompt(reconciliation_path)?,
        })
    }

    /// System prompt for one section: the instructions followed by the
    /// section's schema.
    pub fn section_prompt(&self, section: &str, schema: &FieldSchema) -> String {
        format!(
            "{}\n\nCurrent section: {}\nSchema for this section:\n{}",
            self.extraction,
            section,
            schema.section_contract(section)
        )
    }

    pub fn extraction_messages(
        &self,
        section: &str,
        schema: &FieldSchema,
        ocr: &OcrResult,
    ) -> Result<Vec<ChatMessage>, FormscanError> {
        let payload = serde_json::to_string(&ocr.llm_payload())?;
        Ok(vec![
            ChatMessage::system(self.section_prompt(section, schema)),
            ChatMessage::user(format!("Here is the scanned text:\n {payload}")),
        ])
    }

    pub fn reconciliation_messages(
        &self,
        first_pass: &FormRecord,
    ) -> Result<Vec<ChatMessage>, FormscanError> {
        let record = serde_json::to_string_pretty(first_pass)?;
        Ok(vec![
            ChatMessage::system(self.reconciliation.clone()),
            ChatMessage::user(format!(
                "Here is the processed form data from the first pass:\n{record}"
            )),
        ])
    }
}

fn read_prompt(path: &Path) -> Result<String, FormscanError> {
    let text = std::fs::read_to_string(path).map_err(|e| FormscanError::ConfigLoad {
        what: "prompt",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(FormscanError::ConfigLoad {
            what: "prompt",
            path: path.to_path_buf(),
            reason: "file is empty".into(),
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::schema::parse_schema_str;
    use serde_json::json;

    fn prompts() -> Prompts {
        Prompts {
            extraction: "Extract.".into(),
            reconciliation: "Reconcile.".into(),
        }
    }

    #[test]
    fn test_section_prompt_embeds_schema() {
        let schema = parse_schema_str(r#"{"section2": {"fields": [{"label": "ת.ז"}]}}"#).unwrap();
        let prompt = prompts().section_prompt("section2", &schema);
        assert!(prompt.starts_with("Extract.\n\nCurrent section: section2\n"));
        assert!(prompt.contains("Schema for this section:\n{"));
        assert!(prompt.contains("ת.ז"));
    }

    #[test]
    fn test_extraction_payload_keeps_hebrew() {
        let schema = parse_schema_str(r#"{"s": {"fields": [{"label": "a"}]}}"#).unwrap();
        let mut ocr = OcrResult::default();
        ocr.paragraphs.push("שם משפחה".into());
        let messages = prompts().extraction_messages("s", &schema, &ocr).unwrap();
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.starts_with("Here is the scanned text:\n {"));
        assert!(messages[1].content.contains("שם משפחה"));
        assert!(messages[1].content.contains("\"key_value_pairs\""));
    }

    #[test]
    fn test_reconciliation_message_is_pretty() {
        let mut record = FormRecord::new();
        record.insert("header".into(), json!({}));
        let messages = prompts().reconciliation_messages(&record).unwrap();
        assert_eq!(messages[0].content, "Reconcile.");
        assert_eq!(
            messages[1].content,
            "Here is the processed form data from the first pass:\n{\n  \"header\": {}\n}"
        );
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "  \n").unwrap();
        assert!(Prompts::load(&empty, &empty).is_err());
        assert!(Prompts::load(&dir.path().join("missing.txt"), &empty).is_err());
    }
}
