//! The seam between the workflow controller and the remote studio API.
//!
//! [`StudioApi`](crate::api::StudioApi) is the production implementation.
//! The trait is async and object-safe so tests can substitute fakes.

use std::sync::Arc;

use async_trait::async_trait;
use mde_core::types::DiagramId;
use mde_core::upload::UploadSelection;

use crate::api::StudioApiError;
use crate::models::{
    CreateProject, CreateSystem, CreatedEntity, ExecuteImportRequest, ExecuteImportResponse,
    ExtractionRequest, ExtractionResponse, ImportResponse, ProjectSummary, SystemSummary,
    UploadResponse,
};

/// Receives upload completion percentages (0-100, non-decreasing).
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A progress callback that discards every report.
pub fn ignore_progress() -> ProgressFn {
    Arc::new(|_| {})
}

#[async_trait]
pub trait StudioService: Send + Sync {
    /// Upload an archive or folder. A server-reported failure arrives as
    /// `Ok` with `success: false`; transport and non-2xx errors are `Err`.
    async fn upload(
        &self,
        selection: &UploadSelection,
        progress: ProgressFn,
    ) -> Result<UploadResponse, StudioApiError>;

    /// Turn an extraction path into a diagram document.
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, StudioApiError>;

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, StudioApiError>;

    /// List the systems belonging to one project.
    async fn list_systems(&self, project_id: &str) -> Result<Vec<SystemSummary>, StudioApiError>;

    async fn create_project(&self, request: &CreateProject)
        -> Result<CreatedEntity, StudioApiError>;

    async fn create_system(&self, request: &CreateSystem) -> Result<CreatedEntity, StudioApiError>;

    /// Persist a diagram document. `Ok` means the server answered 2xx.
    async fn import_diagram(
        &self,
        document: &serde_json::Value,
    ) -> Result<ImportResponse, StudioApiError>;

    /// Best-effort layout pass for an imported diagram.
    async fn auto_layout(
        &self,
        diagram_id: &DiagramId,
        document: &serde_json::Value,
    ) -> Result<(), StudioApiError>;

    /// Run the server-side import script against the last upload.
    async fn execute_import(
        &self,
        request: ExecuteImportRequest,
    ) -> Result<ExecuteImportResponse, StudioApiError>;
}
