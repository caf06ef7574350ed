//! REST client for the studio HTTP endpoints.
//!
//! Wraps upload, extraction, project/system registry, diagram import and
//! auto-layout using [`reqwest`]. Uploads are streamed so the caller can
//! observe progress as the multipart body is written.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mde_core::types::DiagramId;
use mde_core::upload::{UploadFile, UploadSelection, MEDIA_TYPE_OCTET_STREAM};
use reqwest::multipart::{Form, Part};
use tokio::sync::RwLock;
use validator::Validate;

use crate::config::{ClientConfig, ConfigError};
use crate::models::{
    CreateProject, CreateSystem, CreatedEntity, ExecuteImportRequest, ExecuteImportResponse,
    ExtractionRequest, ExtractionResponse, ImportResponse, ProjectSummary, SystemSummary,
    TokenRequest, TokenResponse, UploadResponse,
};
use crate::service::{ProgressFn, StudioService};

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

pub const PATH_AUTH_TOKEN: &str = "/v1/auth/token";
pub const PATH_UPLOAD: &str = "/v1/utils/upload-zip";
pub const PATH_EXTRACT: &str = "/v1/utils/extract-jinja";
pub const PATH_EXECUTE_IMPORT: &str = "/v1/utils/execute-import-diagram";
pub const PATH_PROJECTS: &str = "/v1/metadata/projects/";
pub const PATH_SYSTEMS: &str = "/v1/metadata/systems/";
pub const PATH_DIAGRAM_IMPORT: &str = "/v1/diagram/import";

/// Multipart field for an archive upload.
pub const FIELD_ARCHIVE: &str = "file";

/// Multipart flag field sent with folder uploads.
pub const FIELD_IS_ZIP: &str = "is_zip";

/// Size of the chunks an upload body is streamed in.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Path of the auto-layout endpoint for one diagram.
pub fn auto_layout_path(diagram_id: &DiagramId) -> String {
    format!("/v1/diagram/{diagram_id}/auto_layout")
}

/// Multipart field name of the `index`-th file in a folder upload.
pub fn folder_field_name(index: usize) -> String {
    format!("files[{index}]")
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from the studio REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum StudioApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Studio API error ({status}): {body}")]
    ApiError {
        status: u16,
        /// Raw response body for debugging.
        body: String,
        /// `message` / `detail` field of a JSON error body, if any.
        message: Option<String>,
    },

    /// A 2xx response body did not match the expected shape.
    #[error("Unexpected response body: {reason}")]
    Decode { reason: String, body: String },

    /// A request was rejected locally before being sent.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StudioApiError {
    /// Whether the request never produced a response from the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Request(e) if !e.is_decode() && !e.is_status())
    }

    /// The message the server put in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::ApiError { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Completion percentage of `sent` out of `total` bytes, rounded and
/// clamped to 100. An empty body counts as complete.
pub fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let sent = sent.min(total) as u128;
    let total = total as u128;
    ((sent * 100 + total / 2) / total) as u8
}

/// Counts streamed bytes across every part of one upload body.
#[derive(Clone)]
struct ProgressCounter {
    total: u64,
    sent: Arc<AtomicU64>,
    last: Arc<AtomicU8>,
    sink: ProgressFn,
}

impl ProgressCounter {
    fn new(total: u64, sink: ProgressFn) -> Self {
        Self {
            total,
            sent: Arc::new(AtomicU64::new(0)),
            last: Arc::new(AtomicU8::new(0)),
            sink,
        }
    }

    fn advance(&self, bytes: usize) {
        let sent = self.sent.fetch_add(bytes as u64, Ordering::Relaxed) + bytes as u64;
        self.emit(percent_of(sent, self.total));
    }

    /// Report completion once the server has answered.
    fn finish(&self) {
        self.emit(100);
    }

    fn emit(&self, percent: u8) {
        let previous = self.last.fetch_max(percent, Ordering::Relaxed);
        if percent > previous {
            (self.sink)(percent);
        }
    }
}

// ---------------------------------------------------------------------------
// StudioApi
// ---------------------------------------------------------------------------

/// HTTP client for one studio API deployment.
pub struct StudioApi {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl StudioApi {
    /// Create a client from configuration. Does not contact the server.
    pub fn new(config: &ClientConfig) -> Result<Self, StudioApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, config))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            token: RwLock::new(config.token.clone()),
        }
    }

    /// Create a client and, when credentials are configured but no token
    /// is, exchange them for a bearer token.
    pub async fn connect(config: &ClientConfig) -> Result<Self, StudioApiError> {
        let api = Self::new(config)?;
        if config.token.is_none() {
            if let Some(creds) = &config.credentials {
                api.authenticate(&creds.username, &creds.password).await?;
            }
        }
        Ok(api)
    }

    /// Load configuration from the environment and [`connect`](Self::connect).
    pub async fn from_env() -> Result<Self, StudioApiError> {
        let config = ClientConfig::from_dotenv()?;
        Self::connect(&config).await
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange credentials for a bearer token used by later requests.
    ///
    /// Sends `POST /v1/auth/token`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(), StudioApiError> {
        let response = self
            .client
            .post(self.url(PATH_AUTH_TOKEN))
            .json(&TokenRequest { username, password })
            .send()
            .await?;

        let TokenResponse { token } = Self::parse_response(response).await?;
        *self.token.write().await = Some(token);
        tracing::info!(username, "Authenticated with studio API");
        Ok(())
    }

    /// Upload an archive (single `file` part) or a folder (`is_zip=false`
    /// plus one `files[i]` part per file, named by its relative path).
    ///
    /// `progress` is called with non-decreasing percentages while the body
    /// is streamed, ending at 100 when the server responds.
    pub async fn upload(
        &self,
        selection: &UploadSelection,
        progress: ProgressFn,
    ) -> Result<UploadResponse, StudioApiError> {
        let counter = ProgressCounter::new(selection.total_bytes(), progress);

        let form = match selection {
            UploadSelection::Archive(file) => {
                Form::new().part(FIELD_ARCHIVE, file_part(file, file.file_name(), &counter)?)
            }
            UploadSelection::Folder(files) => {
                let mut form = Form::new().text(FIELD_IS_ZIP, "false");
                for (index, file) in files.iter().enumerate() {
                    form = form.part(
                        folder_field_name(index),
                        file_part(file, &file.relative_path, &counter)?,
                    );
                }
                form
            }
        };

        tracing::debug!(
            files = selection.len(),
            bytes = selection.total_bytes(),
            archive = selection.is_archive(),
            "Uploading to studio API"
        );

        let response = self
            .authorized(self.client.post(self.url(PATH_UPLOAD)))
            .await
            .multipart(form)
            .send()
            .await?;

        let parsed: UploadResponse = Self::parse_response(response).await?;
        counter.finish();
        Ok(parsed)
    }

    /// Request extraction of a diagram document.
    ///
    /// Sends `POST /v1/utils/extract-jinja`.
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, StudioApiError> {
        let response = self
            .authorized(self.client.post(self.url(PATH_EXTRACT)))
            .await
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Sends `GET /v1/metadata/projects/`.
    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>, StudioApiError> {
        let response = self
            .authorized(self.client.get(self.url(PATH_PROJECTS)))
            .await
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Sends `GET /v1/metadata/systems/?project={project_id}`.
    pub async fn list_systems(
        &self,
        project_id: &str,
    ) -> Result<Vec<SystemSummary>, StudioApiError> {
        let response = self
            .authorized(self.client.get(self.url(PATH_SYSTEMS)))
            .await
            .query(&[("project", project_id)])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Sends `POST /v1/metadata/projects/`.
    pub async fn create_project(
        &self,
        request: &CreateProject,
    ) -> Result<CreatedEntity, StudioApiError> {
        request
            .validate()
            .map_err(|e| StudioApiError::Validation(e.to_string()))?;

        let response = self
            .authorized(self.client.post(self.url(PATH_PROJECTS)))
            .await
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Sends `POST /v1/metadata/systems/`.
    pub async fn create_system(
        &self,
        request: &CreateSystem,
    ) -> Result<CreatedEntity, StudioApiError> {
        request
            .validate()
            .map_err(|e| StudioApiError::Validation(e.to_string()))?;

        let response = self
            .authorized(self.client.post(self.url(PATH_SYSTEMS)))
            .await
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Persist a diagram document.
    ///
    /// Sends `POST /v1/diagram/import` with the document as the body. Any
    /// 2xx answer is a success; the diagram id is read when the body has one.
    pub async fn import_diagram(
        &self,
        document: &serde_json::Value,
    ) -> Result<ImportResponse, StudioApiError> {
        let response = self
            .authorized(self.client.post(self.url(PATH_DIAGRAM_IMPORT)))
            .await
            .json(document)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        match serde_json::from_str::<ImportResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::debug!(error = %e, "Import response carried no readable diagram id");
                Ok(ImportResponse::default())
            }
        }
    }

    /// Sends `POST /v1/diagram/{diagram_id}/auto_layout`.
    pub async fn auto_layout(
        &self,
        diagram_id: &DiagramId,
        document: &serde_json::Value,
    ) -> Result<(), StudioApiError> {
        let response = self
            .authorized(self.client.post(self.url(&auto_layout_path(diagram_id))))
            .await
            .json(document)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Sends `POST /v1/utils/execute-import-diagram`.
    pub async fn execute_import(
        &self,
        request: ExecuteImportRequest,
    ) -> Result<ExecuteImportResponse, StudioApiError> {
        let response = self
            .authorized(self.client.post(self.url(PATH_EXECUTE_IMPORT)))
            .await
            .json(&request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token, if one is known.
    async fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`StudioApiError::ApiError`]
    /// containing the status, body and server message on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StudioApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let message = server_message(&body);
            return Err(StudioApiError::ApiError {
                status: status.as_u16(),
                body,
                message,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StudioApiError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StudioApiError::Decode {
            reason: e.to_string(),
            body,
        })
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), StudioApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl StudioService for StudioApi {
    async fn upload(
        &self,
        selection: &UploadSelection,
        progress: ProgressFn,
    ) -> Result<UploadResponse, StudioApiError> {
        StudioApi::upload(self, selection, progress).await
    }

    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, StudioApiError> {
        StudioApi::extract(self, request).await
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, StudioApiError> {
        StudioApi::list_projects(self).await
    }

    async fn list_systems(&self, project_id: &str) -> Result<Vec<SystemSummary>, StudioApiError> {
        StudioApi::list_systems(self, project_id).await
    }

    async fn create_project(
        &self,
        request: &CreateProject,
    ) -> Result<CreatedEntity, StudioApiError> {
        StudioApi::create_project(self, request).await
    }

    async fn create_system(&self, request: &CreateSystem) -> Result<CreatedEntity, StudioApiError> {
        StudioApi::create_system(self, request).await
    }

    async fn import_diagram(
        &self,
        document: &serde_json::Value,
    ) -> Result<ImportResponse, StudioApiError> {
        StudioApi::import_diagram(self, document).await
    }

    async fn auto_layout(
        &self,
        diagram_id: &DiagramId,
        document: &serde_json::Value,
    ) -> Result<(), StudioApiError> {
        StudioApi::auto_layout(self, diagram_id, document).await
    }

    async fn execute_import(
        &self,
        request: ExecuteImportRequest,
    ) -> Result<ExecuteImportResponse, StudioApiError> {
        StudioApi::execute_import(self, request).await
    }
}

/// Build a streamed multipart part for one file.
fn file_part(
    file: &UploadFile,
    file_name: &str,
    counter: &ProgressCounter,
) -> Result<Part, StudioApiError> {
    let chunks: Vec<Vec<u8>> = file
        .contents
        .chunks(UPLOAD_CHUNK_SIZE)
        .map(<[u8]>::to_vec)
        .collect();
    let counter = counter.clone();
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        counter.advance(chunk.len());
        Ok::<_, std::io::Error>(chunk)
    }));

    let media_type = if file.media_type.contains('/') {
        file.media_type.as_str()
    } else {
        MEDIA_TYPE_OCTET_STREAM
    };

    let part = Part::stream_with_length(
        reqwest::Body::wrap_stream(stream),
        file.contents.len() as u64,
    )
    .file_name(file_name.to_string())
    .mime_str(media_type)?;
    Ok(part)
}

/// Pull a human-readable message out of a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "detail", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
