use crate::analyzer::{AnalyzerError, DocumentAnalyzer, ServiceErrorKind};
use crate::model::{FormField, OcrResult, TableCell};
use crate::retry::RetryPolicy;
use reqwest::blocking::{Client, Response};
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

pub const API_VERSION: &str = "2023-07-31";
pub const MODEL_ID: &str = "prebuilt-document";
pub const POLL_TIMEOUT: Duration = Duration::from_secs(300);
pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Azure Form Recognizer (`prebuilt-document`) over its REST API.
pub struct AzureDocumentAnalyzer {
    client: Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
    poll_timeout: Duration,
}

impl AzureDocumentAnalyzer {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, AnalyzerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyzerError::Transport(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry: RetryPolicy::default(),
            poll_timeout: POLL_TIMEOUT,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, MODEL_ID, API_VERSION
        )
    }

    fn submit(&self, data: &[u8]) -> Result<String, AnalyzerError> {
        let response = self
            .client
            .post(self.analyze_url())
            .header(KEY_HEADER, &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(data.to_vec())
            .send()
            .map_err(transport_error)?;

        let response = check_status(response)?;

        response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AnalyzerError::Malformed("response missing Operation-Location header".into())
            })
    }

    fn poll_until_complete(&self, operation_url: &str) -> Result<AnalyzeResult, AnalyzerError> {
        let deadline = Instant::now() + self.poll_timeout;
        let mut interval = INITIAL_POLL_INTERVAL;

        loop {
            let response = self
                .client
                .get(operation_url)
                .header(KEY_HEADER, &self.api_key)
                .send()
                .map_err(transport_error)?;

            let wait = if response.status().as_u16() == 429 {
                retry_after(&response).unwrap_or(interval)
            } else {
                let body: AnalyzeResponse = check_status(response)?
                    .json()
                    .map_err(|e| AnalyzerError::Malformed(e.to_string()))?;
                match body.status.as_str() {
                    "succeeded" => {
                        return body.analyze_result.ok_or_else(|| {
                            AnalyzerError::Malformed("succeeded without analyzeResult".into())
                        })
                    }
                    "failed" => {
                        let message = body
                            .error
                            .map(|e| format!("{}: {}", e.code, e.message))
                            .unwrap_or_else(|| "service reported failure".into());
                        return Err(AnalyzerError::AnalysisFailed(message));
                    }
                    _ => interval,
                }
            };

            if Instant::now() + wait > deadline {
                return Err(AnalyzerError::Timeout(format!(
                    "polling exceeded {}s",
                    self.poll_timeout.as_secs()
                )));
            }
            std::thread::sleep(wait);
            interval = (interval * 2).min(MAX_POLL_INTERVAL);
        }
    }

    fn analyze_once(&self, data: &[u8]) -> Result<OcrResult, AnalyzerError> {
        let operation_url = self.submit(data)?;
        tracing::debug!(operation = %operation_url, "analysis submitted");
        let result = self.poll_until_complete(&operation_url)?;
        Ok(result.into_ocr_result())
    }
}

impl DocumentAnalyzer for AzureDocumentAnalyzer {
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    fn analyze(&self, path: &Path) -> Result<OcrResult, AnalyzerError> {
        if !path.is_file() {
            return Err(AnalyzerError::NotFound(path.to_path_buf()));
        }
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AnalyzerError::NotFound(path.to_path_buf())
            } else {
                AnalyzerError::Transport(format!("failed to read {}: {e}", path.display()))
            }
        })?;

        let result = self.retry.run("document analysis", || self.analyze_once(&data))?;
        tracing::info!(
            paragraphs = result.paragraphs.len(),
            key_value_pairs = result.key_value_pairs.len(),
            tables = result.tables.len(),
            "document analysis completed"
        );
        Ok(result)
    }

    fn backend_name(&self) -> &str {
        "azure-form-recognizer"
    }
}

fn transport_error(e: reqwest::Error) -> AnalyzerError {
    if e.is_timeout() {
        AnalyzerError::Timeout(e.to_string())
    } else {
        AnalyzerError::Transport(e.to_string())
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn check_status(response: Response) -> Result<Response, AnalyzerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after(&response);
    let message = response.text().unwrap_or_default();
    Err(AnalyzerError::Service {
        kind: ServiceErrorKind::from_status(status.as_u16()),
        status: status.as_u16(),
        message,
        retry_after,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub status: String,
    pub analyze_result: Option<AnalyzeResult>,
    pub error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeResult {
    pub pages: Vec<Page>,
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Table>,
    pub key_value_pairs: Vec<KeyValuePair>,
    pub documents: Vec<AnalyzedDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Page {
    pub page_number: u32,
    pub selection_marks: Vec<SelectionMark>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SelectionMark {
    pub state: String,
    pub confidence: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Paragraph {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Table {
    pub cells: Vec<Cell>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cell {
    pub row_index: u32,
    pub column_index: u32,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct KeyValuePair {
    pub key: Option<Element>,
    pub value: Option<Element>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Element {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzedDocument {
    pub fields: BTreeMap<String, DocumentField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DocumentField {
    #[serde(rename = "type")]
    pub field_type: String,
    pub content: Option<String>,
}

impl AnalyzeResult {
    /// Flatten the service response into the engine-agnostic shape.
    ///
    /// Key-value pairs missing either side are dropped. Selection marks
    /// become form fields named `selection_mark_<page>_<n>` with the mark
    /// state as value.
    pub fn into_ocr_result(self) -> OcrResult {
        let mut key_value_pairs = BTreeMap::new();
        for kv in self.key_value_pairs {
            if let (Some(key), Some(value)) = (kv.key, kv.value) {
                key_value_pairs.insert(key.content, value.content);
            }
        }

        let tables = self
            .tables
            .into_iter()
            .map(|t| {
                t.cells
                    .into_iter()
                    .map(|c| TableCell {
                        row: c.row_index,
                        column: c.column_index,
                        content: c.content,
                    })
                    .collect()
            })
            .collect();

        let paragraphs = self.paragraphs.into_iter().map(|p| p.content).collect();

        let mut form_fields = Vec::new();
        for document in self.documents {
            for (name, field) in document.fields {
                form_fields.push(FormField {
                    name,
                    value: field.content,
                    field_type: field.field_type,
                });
            }
        }
        for page in self.pages {
            for (i, mark) in page.selection_marks.into_iter().enumerate() {
                form_fields.push(FormField {
                    name: format!("selection_mark_{}_{}", page.page_number, i + 1),
                    value: Some(format!(":{}:", mark.state)),
                    field_type: "selectionMark".into(),
                });
            }
        }

        OcrResult {
            key_value_pairs,
            tables,
            paragraphs,
            form_fields,
        }
    }
}
