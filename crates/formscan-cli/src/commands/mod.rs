pub mod batch;
pub mod compare;
pub mod process;
pub mod reconcile;
pub mod schema;
pub mod split;

use formscan_core::analyzer::azure::AzureDocumentAnalyzer;
use formscan_core::config::{Credentials, Settings, Tuning};
use formscan_core::error::FormscanError;
use formscan_core::extraction::pdftoppm::PdftoppmRenderer;
use formscan_core::llm::azure_openai::AzureOpenAiClient;
use formscan_core::model::SectionLayout;
use formscan_core::pipeline::prompts::Prompts;
use formscan_core::schema::{builtin, FieldSchema};
use formscan_core::{FieldExtractionPipeline, PipelineOptions};
use std::path::Path;

/// Layout, schema and prompts, loaded once per run.
pub struct Resources {
    pub layout: SectionLayout,
    pub schema: FieldSchema,
    pub prompts: Prompts,
}

impl Resources {
    pub fn load(settings: &Settings) -> Result<Self, FormscanError> {
        Ok(Resources {
            layout: load_layout(settings)?,
            schema: load_schema(settings)?,
            prompts: Prompts::load(&settings.prompt_path, &settings.post_process_prompt_path)?,
        })
    }
}

/// The configured layout, or the bundled form 283 layout when absent.
pub fn load_layout(settings: &Settings) -> Result<SectionLayout, FormscanError> {
    if settings.sections_path.is_file() {
        formscan_core::layout::load_layout(&settings.sections_path)
    } else {
        tracing::info!(
            path = %settings.sections_path.display(),
            "no section layout file, using bundled form 283 layout"
        );
        builtin::form_283_layout()
    }
}

/// The configured schema, or the bundled form 283 schema when absent.
pub fn load_schema(settings: &Settings) -> Result<FieldSchema, FormscanError> {
    if settings.schema_path.is_file() {
        formscan_core::schema::load_schema(&settings.schema_path)
    } else {
        tracing::info!(
            path = %settings.schema_path.display(),
            "no schema file, using bundled form 283 schema"
        );
        builtin::form_283_schema()
    }
}

/// Azure clients built from the environment.
pub struct Clients {
    pub analyzer: AzureDocumentAnalyzer,
    pub llm: AzureOpenAiClient,
}

impl Clients {
    pub fn from_env() -> Result<Self, FormscanError> {
        let credentials = Credentials::from_env()?;
        let tuning = Tuning::from_env()?;
        let retry = tuning.retry_policy();

        let analyzer = AzureDocumentAnalyzer::new(
            &credentials.document_endpoint,
            &credentials.document_key,
            tuning.http_timeout,
        )?
        .with_retry(retry)
        .with_poll_timeout(tuning.poll_timeout);
        let llm = AzureOpenAiClient::new(
            &credentials.openai_endpoint,
            &credentials.openai_api_key,
            tuning.http_timeout,
        )?
        .with_options(tuning.completion)
        .with_retry(retry);

        Ok(Clients { analyzer, llm })
    }
}

/// Build the full pipeline from settings and the environment and hand it to `f`.
pub fn with_pipeline<T, F>(settings: &Settings, keep_sections: bool, f: F) -> Result<T, FormscanError>
where
    F: FnOnce(&FieldExtractionPipeline<'_>) -> Result<T, FormscanError>,
{
    let resources = Resources::load(settings)?;
    let clients = Clients::from_env()?;
    let renderer = renderer()?;
    let pipeline = FieldExtractionPipeline::new(
        &renderer,
        &clients.analyzer,
        &clients.llm,
        &resources.layout,
        &resources.schema,
        &resources.prompts,
        PipelineOptions {
            dpi: settings.dpi,
            output_dir: settings.analyzed_forms_dir.clone(),
            keep_sections,
        },
    )?;
    f(&pipeline)
}

/// The pdftoppm renderer, checked before any form is touched.
pub fn renderer() -> Result<PdftoppmRenderer, FormscanError> {
    let renderer = PdftoppmRenderer::new();
    renderer.ensure_available()?;
    Ok(renderer)
}

pub fn require_file(path: &Path) -> Result<(), FormscanError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(FormscanError::Config(format!(
            "input file not found: {}",
            path.display()
        )))
    }
}
