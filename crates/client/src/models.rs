//! Request and response bodies for the studio API.

use mde_core::destination::NewEntity;
use mde_core::types::{DiagramId, EntityId};
use mde_core::upload::UploadResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

// ── Upload ───────────────────────────────────────────────────────────

/// Body returned by `POST /v1/utils/upload-zip`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub extract_path: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<UploadResponse> for UploadResult {
    fn from(r: UploadResponse) -> Self {
        Self {
            success: r.success,
            extract_path: r.extract_path,
            message: r.message,
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────

/// Body for `POST /v1/utils/extract-jinja`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub extract_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<EntityId>,
    pub include_method_dependencies: bool,
}

/// Body returned by `POST /v1/utils/extract-jinja`.
///
/// `diagram_json` is the diagram document serialized as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionResponse {
    pub success: bool,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub diagram_json: Option<String>,
}

impl ExtractionResponse {
    /// The diagram payload, if present and non-blank.
    pub fn payload(&self) -> Option<&str> {
        self.diagram_json.as_deref().filter(|s| !s.trim().is_empty())
    }
}

// ── Projects and systems ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub id: EntityId,
    pub name: String,
}

/// Body for `POST /v1/metadata/projects/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CreateProject {
    #[validate(length(min = 1, message = "Project name must not be empty"))]
    pub name: String,
    pub description: String,
}

impl From<&NewEntity> for CreateProject {
    fn from(entity: &NewEntity) -> Self {
        Self {
            name: entity.trimmed_name().to_string(),
            description: entity.description.clone(),
        }
    }
}

/// Body for `POST /v1/metadata/systems/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CreateSystem {
    #[validate(length(min = 1, message = "Project id must not be empty"))]
    pub project: EntityId,
    #[validate(length(min = 1, message = "System name must not be empty"))]
    pub name: String,
    pub description: String,
}

impl CreateSystem {
    pub fn new(project: impl Into<EntityId>, entity: &NewEntity) -> Self {
        Self {
            project: project.into(),
            name: entity.trimmed_name().to_string(),
            description: entity.description.clone(),
        }
    }
}

/// Body returned by the create endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedEntity {
    pub id: EntityId,
}

// ── Import ───────────────────────────────────────────────────────────

/// Body returned by `POST /v1/diagram/import`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportResponse {
    #[serde(default)]
    pub id: Option<DiagramId>,
}

/// Body for `POST /v1/utils/execute-import-diagram`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecuteImportRequest {
    pub include_method_dependency: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteImportResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}
