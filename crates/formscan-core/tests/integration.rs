//! Integration tests for the extraction pipeline and comparison end to end.
//!
//! Mock renderer, analyzer and LLM stand in for pdftoppm and the Azure
//! services, so these tests need neither poppler-utils nor network access.

use formscan_core::analyzer::{AnalyzerError, DocumentAnalyzer, ServiceErrorKind};
use formscan_core::artifacts;
use formscan_core::batch::run_batch;
use formscan_core::error::FormscanError;
use formscan_core::extraction::PageRenderer;
use formscan_core::llm::{ChatMessage, LlmError, LlmErrorKind, ResponseMode, StructuringClient};
use formscan_core::model::{OcrResult, SectionDef, SectionLayout};
use formscan_core::pipeline::prompts::Prompts;
use formscan_core::pipeline::{FailureKind, PipelineStage};
use formscan_core::schema::{parse_schema_str, FieldSchema};
use formscan_core::{compare_analyzed_forms, CompareOptions, FieldExtractionPipeline, PipelineOptions};
use image::RgbImage;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const EXTRACTION_PROMPT: &str = "Extract the section.";
const RECONCILIATION_PROMPT: &str = "Reconcile the form.";

struct MockRenderer {
    fail_on: Option<&'static str>,
}

impl PageRenderer for MockRenderer {
    fn render_first_page(&self, pdf_path: &Path, _dpi: u32) -> Result<RgbImage, FormscanError> {
        if self.fail_on.is_some_and(|name| pdf_path.ends_with(name)) {
            return Err(FormscanError::Render {
                path: pdf_path.to_path_buf(),
                reason: "corrupt PDF".into(),
            });
        }
        Ok(RgbImage::new(40, 300))
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

struct MockAnalyzer {
    fail_section: Option<&'static str>,
}

impl DocumentAnalyzer for MockAnalyzer {
    fn analyze(&self, path: &Path) -> Result<OcrResult, AnalyzerError> {
        let section = path.file_stem().unwrap().to_string_lossy().into_owned();
        if self.fail_section == Some(section.as_str()) {
            return Err(AnalyzerError::Service {
                kind: ServiceErrorKind::Server,
                status: 503,
                message: "unavailable".into(),
                retry_after: None,
            });
        }
        assert!(path.is_file(), "section crop should exist while analyzed");
        Ok(OcrResult {
            paragraphs: vec![format!("text of {section}")],
            ..OcrResult::default()
        })
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Reconcile {
    Echo,
    Fail,
}

struct MockLlm {
    reconcile: Reconcile,
    calls: AtomicUsize,
}

impl MockLlm {
    fn new(reconcile: Reconcile) -> Self {
        MockLlm {
            reconcile,
            calls: AtomicUsize::new(0),
        }
    }

    fn section_reply(section: &str) -> Value {
        match section {
            "header" => json!({"fields": [{"label": "תאריך מילוי הטופס", "value": "05.03.2023"}]}),
            "section2" => json!({"fields": [
                {"label": "ת.ז", "value": "0 5 2 1 2 3 4 5 6 7"},
                {"label": "מין", "sub_fields": [
                    {"label": "זכר", "value": "V"},
                    {"label": "נקבה", "value": ""}
                ]}
            ]}),
            "section3" => json!({"fields": [{"label": "תאריך הפגיעה", "value": "01/02/2023"}]}),
            _ => json!({}),
        }
    }
}

impl StructuringClient for MockLlm {
    fn complete(&self, messages: &[ChatMessage], mode: ResponseMode) -> Result<String, LlmError> {
        assert_eq!(mode, ResponseMode::Json);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = &messages[0].content;

        if system == RECONCILIATION_PROMPT {
            return match self.reconcile {
                Reconcile::Echo => {
                    let user = &messages[1].content;
                    let (_, record) = user.split_once("first pass:\n").unwrap();
                    Ok(record.to_string())
                }
                Reconcile::Fail => Err(LlmError::new(LlmErrorKind::Server, "overloaded")),
            };
        }

        assert!(messages[1].content.starts_with("Here is the scanned text:"));
        let section = system
            .split("Current section: ")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap();
        Ok(Self::section_reply(section).to_string())
    }
}

fn layout() -> SectionLayout {
    SectionLayout {
        dpi: Some(300),
        sections: vec![
            SectionDef {
                name: "header".into(),
                y_start: 0,
            },
            SectionDef {
                name: "section2".into(),
                y_start: 100,
            },
            SectionDef {
                name: "section3".into(),
                y_start: 200,
            },
        ],
    }
}

fn schema() -> FieldSchema {
    parse_schema_str(
        r#"{
            "header": {"fields": [{"label": "תאריך מילוי הטופס", "type": "date"}]},
            "section2": {"fields": [
                {"label": "ת.ז", "type": "numeric"},
                {"label": "מין", "sub_fields": [
                    {"label": "זכר", "type": "boolean"},
                    {"label": "נקבה", "type": "boolean"}
                ]}
            ]},
            "section3": {"fields": [{"label": "תאריך הפגיעה", "type": "date"}]}
        }"#,
    )
    .unwrap()
}

fn prompts() -> Prompts {
    Prompts {
        extraction: EXTRACTION_PROMPT.into(),
        reconciliation: RECONCILIATION_PROMPT.into(),
    }
}

fn options(output_dir: &Path) -> PipelineOptions {
    PipelineOptions {
        dpi: 300,
        output_dir: output_dir.to_path_buf(),
        keep_sections: false,
    }
}

// ---------------------------------------------------------------------------
// A failing section degrades to {} without touching the others
// ---------------------------------------------------------------------------
#[test]
fn section_failure_is_isolated() {
    let out = tempfile::tempdir().unwrap();
    let (layout, schema, prompts) = (layout(), schema(), prompts());
    let renderer = MockRenderer { fail_on: None };
    let analyzer = MockAnalyzer {
        fail_section: Some("section3"),
    };
    let llm = MockLlm::new(Reconcile::Echo);
    let pipeline = FieldExtractionPipeline::new(
        &renderer, &analyzer, &llm, &layout, &schema, &prompts, options(out.path()),
    )
    .unwrap();

    let outcome = pipeline.process_form(Path::new("form_1.pdf")).unwrap();

    assert_eq!(outcome.filename, "form_1.pdf");
    assert_eq!(
        outcome.first_pass.keys().collect::<Vec<_>>(),
        vec!["header", "section2", "section3"]
    );
    assert_eq!(outcome.first_pass["section3"], json!({}));
    assert_eq!(
        outcome.first_pass["section2"]["fields"][0]["value"],
        "0 5 2 1 2 3 4 5 6 7"
    );
    assert!(!outcome.first_pass["header"].as_object().unwrap().is_empty());

    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.section.as_deref(), Some("section3"));
    assert_eq!(failure.stage, PipelineStage::Extracting);
    assert_eq!(failure.kind, FailureKind::Ocr);

    assert!(outcome.reconciled);
    // Two sections structured plus one reconciliation call.
    assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
}

// ---------------------------------------------------------------------------
// Reconciliation failure keeps the first pass as the final record
// ---------------------------------------------------------------------------
#[test]
fn reconciliation_failure_falls_back_to_first_pass() {
    let out = tempfile::tempdir().unwrap();
    let (layout, schema, prompts) = (layout(), schema(), prompts());
    let renderer = MockRenderer { fail_on: None };
    let analyzer = MockAnalyzer { fail_section: None };
    let llm = MockLlm::new(Reconcile::Fail);
    let pipeline = FieldExtractionPipeline::new(
        &renderer, &analyzer, &llm, &layout, &schema, &prompts, options(out.path()),
    )
    .unwrap();

    let outcome = pipeline.process_form(Path::new("form_4.pdf")).unwrap();

    assert!(!outcome.reconciled);
    assert_eq!(outcome.final_record, outcome.first_pass);
    let failure = outcome.failures.last().unwrap();
    assert_eq!(failure.section, None);
    assert_eq!(failure.stage, PipelineStage::Reconciling);

    let checkpoint = artifacts::read_record(&artifacts::first_pass_path(out.path(), "form_4")).unwrap();
    let analysis = artifacts::read_record(&outcome.analysis_path).unwrap();
    assert_eq!(checkpoint, outcome.first_pass);
    assert_eq!(analysis, outcome.first_pass);
}

// ---------------------------------------------------------------------------
// ID with spaces in the scan matches compact ground truth
// ---------------------------------------------------------------------------
#[test]
fn id_with_spaces_matches_end_to_end() {
    let out = tempfile::tempdir().unwrap();
    let (layout, schema, prompts) = (layout(), schema(), prompts());
    let renderer = MockRenderer { fail_on: None };
    let analyzer = MockAnalyzer { fail_section: None };
    let llm = MockLlm::new(Reconcile::Echo);
    let pipeline = FieldExtractionPipeline::new(
        &renderer, &analyzer, &llm, &layout, &schema, &prompts, options(out.path()),
    )
    .unwrap();
    pipeline.process_form(Path::new("form_1.pdf")).unwrap();

    let gt_path = out.path().join("master_data.csv");
    std::fs::write(
        &gt_path,
        "filename,section|field|value\n\
         form_1.pdf,section2|ת.ז|0521234567\n\
         form_1.pdf,section2|מין/זכר|V\n\
         form_1.pdf,section2|מין/נקבה|\n\
         form_1.pdf,header|תאריך מילוי הטופס|05032023\n\
         form_1.pdf,section3|תאריך הפגיעה|01.02.2023\n\
         form_2.pdf,section2|ת.ז|123456789\n",
    )
    .unwrap();

    let catalog = schema.catalog();
    let (records, report) =
        compare_analyzed_forms(&gt_path, out.path(), &catalog, &CompareOptions::default()).unwrap();

    // form_2 has no artifact and is left out by default.
    assert_eq!(records.len(), 5);
    let id = &records[0];
    assert_eq!(id.extracted_value.as_deref(), Some("0 5 2 1 2 3 4 5 6 7"));
    assert_eq!(id.normalized_expected, "0521234567");
    assert_eq!(id.normalized_extracted, "0521234567");
    assert!(id.matches);
    assert!(records.iter().all(|r| r.matches));
    assert_eq!(report.total_files, 1);
    assert_eq!(report.overall_match_rate, 100.0);

    let all = CompareOptions { all_files: true };
    let (records, report) = compare_analyzed_forms(&gt_path, out.path(), &catalog, &all).unwrap();
    assert_eq!(records.len(), 6);
    assert_eq!(records[5].extracted_value, None);
    assert_eq!(report.file_stats["form_2.pdf"].match_rate, 0.0);
    assert_eq!(report.total_files, 2);

    // Comparison is recomputed from the same inputs with the same result.
    let (_, again) = compare_analyzed_forms(&gt_path, out.path(), &catalog, &all).unwrap();
    assert_eq!(again, report);
}

// ---------------------------------------------------------------------------
// Batch continues past a failing form and skips analyzed ones on rerun
// ---------------------------------------------------------------------------
#[test]
fn batch_skips_analyzed_and_survives_failures() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    for name in ["form_10.pdf", "form_2.pdf", "form_1.pdf"] {
        std::fs::write(input.path().join(name), b"%PDF-1.4").unwrap();
    }

    let (layout, schema, prompts) = (layout(), schema(), prompts());
    let renderer = MockRenderer {
        fail_on: Some("form_2.pdf"),
    };
    let analyzer = MockAnalyzer { fail_section: None };
    let llm = MockLlm::new(Reconcile::Echo);
    let pipeline = FieldExtractionPipeline::new(
        &renderer, &analyzer, &llm, &layout, &schema, &prompts, options(out.path()),
    )
    .unwrap();

    let summary = run_batch(&pipeline, input.path(), false).unwrap();
    assert_eq!(summary.found, 3);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "form_2");
    assert!(artifacts::analysis_path(out.path(), "form_10").is_file());

    let rerun = run_batch(&pipeline, input.path(), false).unwrap();
    assert_eq!(rerun.skipped, 2);
    assert_eq!(rerun.processed, 0);
    assert_eq!(rerun.failed.len(), 1);

    let forced = run_batch(&pipeline, input.path(), true).unwrap();
    assert_eq!(forced.processed, 2);
    assert_eq!(forced.skipped, 0);
}

// ---------------------------------------------------------------------------
// Kept section crops land under the output directory
// ---------------------------------------------------------------------------
#[test]
fn keep_sections_writes_crops() {
    let out = tempfile::tempdir().unwrap();
    let (layout, schema, prompts) = (layout(), schema(), prompts());
    let renderer = MockRenderer { fail_on: None };
    let analyzer = MockAnalyzer { fail_section: None };
    let llm = MockLlm::new(Reconcile::Echo);
    let mut opts = options(out.path());
    opts.keep_sections = true;
    let pipeline =
        FieldExtractionPipeline::new(&renderer, &analyzer, &llm, &layout, &schema, &prompts, opts)
            .unwrap();

    pipeline.process_form(Path::new("form_7.pdf")).unwrap();

    let dir: PathBuf = out.path().join("sections").join("form_7");
    let crop = image::open(dir.join("section2.png")).unwrap();
    assert_eq!((crop.width(), crop.height()), (40, 100));
}

// ---------------------------------------------------------------------------
// A layout authored for another DPI is rejected before any form runs
// ---------------------------------------------------------------------------
#[test]
fn dpi_mismatch_is_configuration_error() {
    let out = tempfile::tempdir().unwrap();
    let (layout, schema, prompts) = (layout(), schema(), prompts());
    let renderer = MockRenderer { fail_on: None };
    let analyzer = MockAnalyzer { fail_section: None };
    let llm = MockLlm::new(Reconcile::Echo);
    let mut opts = options(out.path());
    opts.dpi = 150;

    let result =
        FieldExtractionPipeline::new(&renderer, &analyzer, &llm, &layout, &schema, &prompts, opts);

    assert!(matches!(result, Err(FormscanError::LayoutInvalid(_))));
}

// ---------------------------------------------------------------------------
// An unwritable output directory ends the batch before any service call
// ---------------------------------------------------------------------------
#[test]
fn unwritable_output_dir_ends_batch() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    for name in ["form_1.pdf", "form_2.pdf"] {
        std::fs::write(input.path().join(name), b"%PDF-1.4").unwrap();
    }
    let blocked = out.path().join("analyzed_forms");
    std::fs::write(&blocked, b"occupied by a file").unwrap();

    let (layout, schema, prompts) = (layout(), schema(), prompts());
    let renderer = MockRenderer { fail_on: None };
    let analyzer = MockAnalyzer { fail_section: None };
    let llm = MockLlm::new(Reconcile::Echo);
    let pipeline = FieldExtractionPipeline::new(
        &renderer, &analyzer, &llm, &layout, &schema, &prompts, options(&blocked),
    )
    .unwrap();

    let result = run_batch(&pipeline, input.path(), false);

    assert!(matches!(result, Err(FormscanError::OutputWrite { .. })));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Medical codes match by containment; spaced digits compare compactly
// ---------------------------------------------------------------------------
#[test]
fn medical_code_and_spaced_digits_compare() {
    let out = tempfile::tempdir().unwrap();
    std::fs::write(
        out.path().join("form_5_analysis.json"),
        json!({
            "section5": {"fields": [
                {"label": "אבחנה רפואית 1", "value": "5839"},
                {"label": "אבחנה רפואית 2", "value": ""}
            ]},
            "section2": {"fields": [
                {"label": "מספר טלפון", "value": "123456789"},
                {"label": "ת.ז", "value": "1 2 3 4 5 6 7 8 9"}
            ]}
        })
        .to_string(),
    )
    .unwrap();
    let gt_path = out.path().join("master_data.csv");
    std::fs::write(
        &gt_path,
        "filename,section|field|value\n\
         form_5.pdf,section5|אבחנה רפואית 1|58390\n\
         form_5.pdf,section5|אבחנה רפואית 2|S72\n\
         form_5.pdf,section2|מספר טלפון|1 2 3 4 5 6 7 8 9\n\
         form_5.pdf,section2|ת.ז|123456789\n",
    )
    .unwrap();

    let catalog = parse_schema_str(
        r#"{
            "section5": {"fields": [
                {"label": "אבחנה רפואית 1", "type": "medical_code"},
                {"label": "אבחנה רפואית 2", "type": "medical_code"}
            ]},
            "section2": {"fields": [
                {"label": "מספר טלפון", "type": "numeric"},
                {"label": "ת.ז", "type": "numeric"}
            ]}
        }"#,
    )
    .unwrap()
    .catalog();

    let (records, report) =
        compare_analyzed_forms(&gt_path, out.path(), &catalog, &CompareOptions::default()).unwrap();

    let matches: Vec<_> = records.iter().map(|r| (r.field.as_str(), r.matches)).collect();
    assert_eq!(
        matches,
        vec![
            ("אבחנה רפואית 1", true),
            ("אבחנה רפואית 2", false),
            ("מספר טלפון", true),
            ("ת.ז", true),
        ]
    );
    assert_eq!(records[2].normalized_expected, "123456789");
    assert_eq!(records[3].normalized_extracted, "123456789");
    assert_eq!(report.section_stats["section5"].matched, 1);
}
