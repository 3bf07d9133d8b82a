pub mod prompts;
pub mod validate;

use crate::analyzer::DocumentAnalyzer;
use crate::artifacts;
use crate::error::FormscanError;
use crate::extraction::sections::split_page;
use crate::extraction::PageRenderer;
use crate::layout::check_render_dpi;
use crate::llm::StructuringClient;
use crate::model::{FormRecord, SectionImage, SectionLayout, SectionRecord};
use crate::schema::FieldSchema;
use prompts::Prompts;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_DPI: u32 = 300;

/// Where a form is in the two-pass protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Per-section OCR and structuring.
    Extracting,
    /// Whole-form consistency pass over the first-pass record.
    Reconciling,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::Extracting => "extracting",
            PipelineStage::Reconciling => "reconciling",
            PipelineStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// The step that failed for a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Ocr,
    Structuring,
    Validation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Ocr => "ocr",
            FailureKind::Structuring => "structuring",
            FailureKind::Validation => "validation",
        };
        f.write_str(s)
    }
}

/// A recoverable failure; the affected record part was degraded.
///
/// `section` is `None` for reconciliation failures, which concern the
/// whole form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionFailure {
    pub section: Option<String>,
    pub stage: PipelineStage,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for SectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section {
            Some(section) => write!(f, "{section} ({} {}): {}", self.stage, self.kind, self.message),
            None => write!(f, "form ({} {}): {}", self.stage, self.kind, self.message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormOutcome {
    pub filename: String,
    pub first_pass: FormRecord,
    pub final_record: FormRecord,
    /// False when the final record is the first pass unchanged.
    pub reconciled: bool,
    pub failures: Vec<SectionFailure>,
    pub analysis_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub record: FormRecord,
    pub reconciled: bool,
    pub failure: Option<SectionFailure>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub dpi: u32,
    /// Directory for `<stem>_analysis.json` and `<stem>_first_pass.json`.
    pub output_dir: PathBuf,
    /// Keep section crops under `<output_dir>/sections/<stem>/`.
    pub keep_sections: bool,
}

/// Runs one form through splitting, OCR, structuring and reconciliation.
pub struct FieldExtractionPipeline<'a> {
    renderer: &'a dyn PageRenderer,
    analyzer: &'a dyn DocumentAnalyzer,
    llm: &'a dyn StructuringClient,
    layout: &'a SectionLayout,
    schema: &'a FieldSchema,
    prompts: &'a Prompts,
    options: PipelineOptions,
}

impl<'a> FieldExtractionPipeline<'a> {
    /// Build a pipeline; fails if the layout was authored for another DPI.
    pub fn new(
        renderer: &'a dyn PageRenderer,
        analyzer: &'a dyn DocumentAnalyzer,
        llm: &'a dyn StructuringClient,
        layout: &'a SectionLayout,
        schema: &'a FieldSchema,
        prompts: &'a Prompts,
        options: PipelineOptions,
    ) -> Result<Self, FormscanError> {
        check_render_dpi(layout, options.dpi)?;
        Ok(FieldExtractionPipeline {
            renderer,
            analyzer,
            llm,
            layout,
            schema,
            prompts,
            options,
        })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process one form PDF end to end and persist its artifacts.
    ///
    /// Only rendering and splitting errors are returned; section and
    /// reconciliation failures are reported in the outcome.
    pub fn process_form(&self, pdf_path: &Path) -> Result<FormOutcome, FormscanError> {
        let filename = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = artifacts::form_stem(pdf_path);
        let span = tracing::info_span!("form", file = %filename);
        let _guard = span.enter();

        tracing::info!(
            renderer = self.renderer.backend_name(),
            analyzer = self.analyzer.backend_name(),
            dpi = self.options.dpi,
            "processing form"
        );

        let page = self.renderer.render_first_page(pdf_path, self.options.dpi)?;

        // The temp dir must outlive the OCR calls that read the crops.
        let (_tmp, section_dir) = if self.options.keep_sections {
            (None, self.options.output_dir.join("sections").join(&stem))
        } else {
            let tmp = tempfile::tempdir()?;
            let dir = tmp.path().to_path_buf();
            (Some(tmp), dir)
        };
        let sections = split_page(&page, self.layout, &section_dir)?;

        let (first_pass, mut failures) = self.extract_sections(&sections);

        let checkpoint = artifacts::first_pass_path(&self.options.output_dir, &stem);
        artifacts::write_record(&checkpoint, &first_pass)?;
        tracing::info!(path = %checkpoint.display(), "first pass checkpoint written");

        let outcome = self.reconcile(&first_pass);
        failures.extend(outcome.failure);

        let analysis_path = artifacts::analysis_path(&self.options.output_dir, &stem);
        artifacts::write_record(&analysis_path, &outcome.record)?;

        tracing::info!(
            stage = %PipelineStage::Done,
            reconciled = outcome.reconciled,
            failures = failures.len(),
            path = %analysis_path.display(),
            "form processed"
        );

        Ok(FormOutcome {
            filename,
            first_pass,
            final_record: outcome.record,
            reconciled: outcome.reconciled,
            failures,
            analysis_path,
        })
    }

    /// First pass: OCR and structure every section independently.
    ///
    /// A failing section is recorded as `{}` and does not affect the others.
    pub fn extract_sections(&self, sections: &[SectionImage]) -> (FormRecord, Vec<SectionFailure>) {
        let mut record = FormRecord::new();
        let mut failures = Vec::new();

        for section in sections {
            let span = tracing::info_span!(
                "section",
                section = %section.name,
                stage = %PipelineStage::Extracting
            );
            let _guard = span.enter();

            let value = match self.extract_section(section) {
                Ok(value) => {
                    tracing::info!("section structured");
                    value
                }
                Err((kind, message)) => {
                    tracing::error!(kind = %kind, error = %message, "section failed, recording empty result");
                    failures.push(SectionFailure {
                        section: Some(section.name.clone()),
                        stage: PipelineStage::Extracting,
                        kind,
                        message,
                    });
                    SectionRecord::new()
                }
            };
            record.insert(section.name.clone(), Value::Object(value));
        }

        (record, failures)
    }

    fn extract_section(
        &self,
        section: &SectionImage,
    ) -> Result<SectionRecord, (FailureKind, String)> {
        let ocr = self
            .analyzer
            .analyze(&section.path)
            .map_err(|e| (FailureKind::Ocr, e.to_string()))?;
        if ocr.is_empty() {
            tracing::warn!("OCR found no content");
        }

        let messages = self
            .prompts
            .extraction_messages(&section.name, self.schema, &ocr)
            .map_err(|e| (FailureKind::Structuring, e.to_string()))?;
        let reply = self
            .llm
            .chat_json(&messages)
            .map_err(|e| (FailureKind::Structuring, e.to_string()))?;

        validate::validate_section(self.schema.section(&section.name), reply)
            .map_err(|e| (FailureKind::Validation, e.to_string()))
    }

    /// Second pass over a first-pass record.
    pub fn reconcile(&self, first_pass: &FormRecord) -> ReconcileOutcome {
        reconcile(self.llm, self.schema, self.prompts, first_pass)
    }
}

/// Run the reconciliation pass; any failure yields the first pass unchanged.
pub fn reconcile(
    llm: &dyn StructuringClient,
    schema: &FieldSchema,
    prompts: &Prompts,
    first_pass: &FormRecord,
) -> ReconcileOutcome {
    let span = tracing::info_span!("reconcile", stage = %PipelineStage::Reconciling);
    let _guard = span.enter();

    let attempt = prompts
        .reconciliation_messages(first_pass)
        .map_err(|e| (FailureKind::Structuring, e.to_string()))
        .and_then(|messages| {
            llm.chat_json(&messages)
                .map_err(|e| (FailureKind::Structuring, e.to_string()))
        })
        .and_then(|reply| {
            validate::validate_form(schema, first_pass, reply)
                .map_err(|e| (FailureKind::Validation, e.to_string()))
        });

    match attempt {
        Ok(record) => {
            tracing::info!("reconciliation completed");
            ReconcileOutcome {
                record,
                reconciled: true,
                failure: None,
            }
        }
        Err((kind, message)) => {
            tracing::error!(kind = %kind, error = %message, "reconciliation failed, keeping first pass");
            ReconcileOutcome {
                record: first_pass.clone(),
                reconciled: false,
                failure: Some(SectionFailure {
                    section: None,
                    stage: PipelineStage::Reconciling,
                    kind,
                    message,
                }),
            }
        }
    }
}
