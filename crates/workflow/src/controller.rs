//! The import workflow state machine.
//!
//! One [`ImportController`] backs one import dialog. It walks a session
//! through `Idle -> Uploading -> AwaitingDestination -> Extracting ->
//! Importing -> Done`, with `Failed` reachable from every step that talks
//! to the server. Each step is a single request; nothing is retried.
//!
//! Session state sits behind a `std::sync::Mutex` that is never held
//! across an `.await`. Every operation captures the session generation
//! before it sends anything and re-checks it when the response arrives;
//! after [`reset`](ImportController::reset) the old generation is gone and
//! the response is dropped with [`WorkflowError::Superseded`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mde_client::api::StudioApiError;
use mde_client::models::{
    CreateProject, CreateSystem, ExecuteImportRequest, ExtractionRequest, ProjectSummary,
    SystemSummary,
};
use mde_client::service::{ProgressFn, StudioService};
use mde_core::destination::{DestinationForm, DestinationSelection, NewEntity, ResolvedDestination};
use mde_core::error::CoreError;
use mde_core::types::{DiagramId, EntityId};
use mde_core::upload::{ExtractionOptions, UploadFile, UploadResult, UploadSelection};
use mde_core::workflow::{
    validate_transition, Notice, WorkflowStep, MSG_DESTINATION_INCOMPLETE,
    MSG_EXECUTE_IMPORT_FAILED, MSG_EXTRACTION_FAILED, MSG_FOLDER_UPLOAD_DISABLED,
    MSG_IMPORT_FAILED, MSG_IMPORT_SUCCEEDED, MSG_NO_EXTRACTION_PATH, MSG_UPLOAD_FAILED_PREFIX,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ControllerConfig;
use crate::error::WorkflowError;
use crate::events::{EventBus, WorkflowEvent};
use crate::progress::{ProgressTracker, UploadProgress};
use crate::ui_state::SharedFlag;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Session {
    generation: u64,
    id: Uuid,
    step: WorkflowStep,
    upload_result: Option<UploadResult>,
    form: DestinationForm,
    options: ExtractionOptions,
    resolved: Option<ResolvedDestination>,
    diagram_id: Option<DiagramId>,
    last_error: Option<WorkflowError>,
    last_notice: Option<Notice>,
    /// Set while a resolve, extract, import or server-import sequence is
    /// waiting on the server.
    request_in_flight: bool,
}

impl Session {
    fn new(generation: u64, options: ExtractionOptions) -> Self {
        Self {
            generation,
            id: Uuid::new_v4(),
            step: WorkflowStep::Idle,
            upload_result: None,
            form: DestinationForm::default(),
            options,
            resolved: None,
            diagram_id: None,
            last_error: None,
            last_notice: None,
            request_in_flight: false,
        }
    }

    fn extract_path(&self) -> Option<String> {
        self.upload_result
            .as_ref()
            .and_then(UploadResult::usable_extract_path)
            .map(str::to_string)
    }
}

/// Point-in-time copy of everything a dialog renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub session_id: Uuid,
    pub step: WorkflowStep,
    pub upload_result: Option<UploadResult>,
    pub destination: DestinationForm,
    pub options: ExtractionOptions,
    pub resolved: Option<ResolvedDestination>,
    pub diagram_id: Option<DiagramId>,
    pub last_error: Option<String>,
    pub last_notice: Option<Notice>,
    pub can_confirm: bool,
    pub progress: UploadProgress,
}

/// Result of a successful import.
#[derive(Debug)]
pub struct ImportOutcome {
    pub diagram_id: Option<DiagramId>,
    pub notice: Notice,
    /// The background layout pass, when the server returned an id.
    pub auto_layout: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// ImportController
// ---------------------------------------------------------------------------

pub struct ImportController {
    service: Arc<dyn StudioService>,
    config: ControllerConfig,
    session: Mutex<Session>,
    progress: ProgressTracker,
    events: EventBus,
    dialog_open: SharedFlag,
}

impl ImportController {
    pub fn new(service: Arc<dyn StudioService>, config: ControllerConfig) -> Self {
        Self {
            service,
            config,
            session: Mutex::new(Session::new(0, config.default_options())),
            progress: ProgressTracker::new(),
            events: EventBus::default(),
            dialog_open: SharedFlag::default(),
        }
    }

    /// Use a flag owned by the host page for the dialog's open state.
    pub fn with_dialog_flag(mut self, flag: SharedFlag) -> Self {
        self.dialog_open = flag;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // ── Upload ───────────────────────────────────────────────────────

    /// Upload files picked by the user. An empty pick does nothing.
    pub async fn select_files(
        &self,
        files: Vec<UploadFile>,
    ) -> Result<Option<UploadResult>, WorkflowError> {
        match UploadSelection::from_files(files) {
            Some(selection) => self.upload(selection).await.map(Some),
            None => Ok(None),
        }
    }

    /// Upload an archive or folder, replacing any earlier upload result.
    ///
    /// Rejected with [`WorkflowError::UploadInFlight`] while another
    /// upload is running. A new progress attempt starts at 0%.
    pub async fn upload(&self, selection: UploadSelection) -> Result<UploadResult, WorkflowError> {
        let (generation, attempt) = {
            let mut session = self.lock();
            if session.step == WorkflowStep::Uploading {
                tracing::debug!(session_id = %session.id, "Upload rejected, another one is in flight");
                return Err(WorkflowError::UploadInFlight);
            }
            self.ensure_no_request(&session)?;
            if !selection.is_archive() && !self.config.allow_folder_upload {
                return Err(self.report(
                    &mut session,
                    WorkflowError::Precondition(MSG_FOLDER_UPLOAD_DISABLED.to_string()),
                ));
            }

            self.transition(&mut session, WorkflowStep::Uploading)?;
            session.upload_result = None;
            session.resolved = None;
            session.diagram_id = None;
            session.last_error = None;
            (session.generation, self.progress.begin_attempt())
        };

        tracing::info!(
            attempt,
            archive = selection.is_archive(),
            files = selection.len(),
            bytes = selection.total_bytes(),
            "Starting upload"
        );

        let outcome = self
            .service
            .upload(&selection, self.progress_callback(attempt))
            .await;

        let mut session = self.current(generation)?;
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(attempt, error = %e, "Upload request failed");
                return Err(self.fail(&mut session, WorkflowError::from_upload(&e)));
            }
        };

        let result = UploadResult::from(response);
        session.upload_result = Some(result.clone());

        if result.usable_extract_path().is_none() {
            let message = non_blank(result.message.as_deref()).unwrap_or_else(|| {
                format!("{MSG_UPLOAD_FAILED_PREFIX}: no extraction path was returned")
            });
            return Err(self.fail(
                &mut session,
                WorkflowError::Server {
                    status: None,
                    message,
                },
            ));
        }

        if self.progress.report(attempt, 100) {
            self.events.publish(WorkflowEvent::UploadProgress {
                attempt,
                percent: 100,
            });
        }
        self.transition(&mut session, WorkflowStep::AwaitingDestination)?;
        let message =
            non_blank(result.message.as_deref()).unwrap_or_else(|| "Upload successful".to_string());
        self.notify(&mut session, Notice::success(message));
        tracing::info!(attempt, extract_path = ?result.extract_path, "Upload finished");

        Ok(result)
    }

    /// Discard the current upload result and return to idle.
    pub fn clear_upload(&self) -> Result<(), WorkflowError> {
        let mut session = self.lock();
        match session.step {
            WorkflowStep::Uploading => return Err(WorkflowError::UploadInFlight),
            step if step.is_busy() => {
                return Err(CoreError::InvalidTransition {
                    from: step,
                    to: WorkflowStep::Idle,
                }
                .into())
            }
            _ => {}
        }

        session.upload_result = None;
        session.resolved = None;
        if session.step != WorkflowStep::Idle {
            self.transition(&mut session, WorkflowStep::Idle)?;
        }
        Ok(())
    }

    // ── Destination and options ──────────────────────────────────────

    /// Edit the destination picker and return whether confirm is now
    /// enabled.
    pub fn update_destination<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut DestinationForm),
    {
        let mut session = self.lock();
        edit(&mut session.form);
        self.events.publish(WorkflowEvent::DestinationChanged {
            complete: session.form.is_complete(),
        });
        self.can_confirm_in(&session)
    }

    pub fn can_confirm(&self) -> bool {
        self.can_confirm_in(&self.lock())
    }

    /// Store extraction options and return the ones that will be sent.
    pub fn set_options(&self, options: ExtractionOptions) -> ExtractionOptions {
        let mut session = self.lock();
        session.options = options;
        self.config.effective_options(options)
    }

    pub async fn load_projects(&self) -> Result<Vec<ProjectSummary>, WorkflowError> {
        self.service.list_projects().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to load projects");
            WorkflowError::from_api(&e)
        })
    }

    pub async fn load_systems(&self, project_id: &str) -> Result<Vec<SystemSummary>, WorkflowError> {
        self.service.list_systems(project_id).await.map_err(|e| {
            tracing::warn!(project_id, error = %e, "Failed to load systems");
            WorkflowError::from_api(&e)
        })
    }

    // ── Extraction and import ────────────────────────────────────────

    /// Run the remaining steps for the current upload: resolve the
    /// destination, extract, import.
    pub async fn confirm(&self) -> Result<ImportOutcome, WorkflowError> {
        let (generation, path, selection, options) = {
            let mut session = self.lock();
            self.ensure_no_request(&session)?;
            let path = session.extract_path();
            let Some(path) = path else {
                return Err(self.report(
                    &mut session,
                    WorkflowError::Precondition(MSG_NO_EXTRACTION_PATH.to_string()),
                ));
            };
            if session.step != WorkflowStep::AwaitingDestination {
                return Err(CoreError::InvalidTransition {
                    from: session.step,
                    to: WorkflowStep::Extracting,
                }
                .into());
            }

            let selection = if self.config.require_destination_selection {
                let complete = session.form.complete_selection();
                match complete {
                    Some(selection) => Some(selection),
                    None => {
                        return Err(self.report(
                            &mut session,
                            WorkflowError::Precondition(MSG_DESTINATION_INCOMPLETE.to_string()),
                        ))
                    }
                }
            } else {
                None
            };

            let generation = self.claim(&mut session);
            (generation, path, selection, session.options)
        };
        let _claim = RequestClaim::new(self, generation);

        let resolved = match selection {
            Some(selection) => Some(self.resolve_in(generation, &selection).await?),
            None => None,
        };
        let diagram = self
            .extract_in(generation, &path, resolved.as_ref(), options)
            .await?;
        self.commit_in(generation, diagram).await
    }

    /// Turn a destination selection into ids, creating the project and
    /// system as needed. Only valid while `AwaitingDestination`; moves the
    /// session into `Extracting`.
    pub async fn resolve_destination(
        &self,
        selection: &DestinationSelection,
    ) -> Result<ResolvedDestination, WorkflowError> {
        let generation = {
            let mut session = self.lock();
            self.ensure_no_request(&session)?;
            if session.step != WorkflowStep::AwaitingDestination {
                return Err(CoreError::InvalidTransition {
                    from: session.step,
                    to: WorkflowStep::Extracting,
                }
                .into());
            }
            self.claim(&mut session)
        };
        let _claim = RequestClaim::new(self, generation);
        self.resolve_in(generation, selection).await
    }

    /// Request the diagram document for an uploaded path. Moves the session
    /// into `Importing` on success.
    pub async fn extract(
        &self,
        path: &str,
        destination: Option<&ResolvedDestination>,
        options: ExtractionOptions,
    ) -> Result<Value, WorkflowError> {
        let generation = self.claim_now()?;
        let _claim = RequestClaim::new(self, generation);
        self.extract_in(generation, path, destination, options).await
    }

    /// Import an extracted diagram and start the layout pass.
    pub async fn commit(&self, diagram: Value) -> Result<ImportOutcome, WorkflowError> {
        let generation = self.claim_now()?;
        let _claim = RequestClaim::new(self, generation);
        self.commit_in(generation, diagram).await
    }

    /// Run the server-side import script for the current upload. The step
    /// does not change.
    pub async fn execute_server_import(&self) -> Result<Notice, WorkflowError> {
        let (generation, request) = {
            let mut session = self.lock();
            self.ensure_no_request(&session)?;
            if session.extract_path().is_none() {
                return Err(self.report(
                    &mut session,
                    WorkflowError::Precondition(MSG_NO_EXTRACTION_PATH.to_string()),
                ));
            }
            if session.step.is_busy() {
                return Err(CoreError::Precondition(format!(
                    "Cannot run the import while {}",
                    session.step.label()
                ))
                .into());
            }
            let options = self.config.effective_options(session.options);
            let request = ExecuteImportRequest {
                include_method_dependency: options.include_method_dependencies,
            };
            (self.claim(&mut session), request)
        };
        let _claim = RequestClaim::new(self, generation);

        let outcome = self.service.execute_import(request).await;

        let mut session = self.current(generation)?;
        match outcome {
            Ok(response) if response.success => {
                let message = non_blank(response.message.as_deref()).unwrap_or_else(|| {
                    format!(
                        "Import diagram executed with method dependency: {}",
                        request.include_method_dependency
                    )
                });
                let notice = Notice::success(message);
                self.notify(&mut session, notice.clone());
                Ok(notice)
            }
            Ok(response) => {
                let message = non_blank(response.message.as_deref())
                    .unwrap_or_else(|| MSG_EXECUTE_IMPORT_FAILED.to_string());
                Err(self.report(
                    &mut session,
                    WorkflowError::Server {
                        status: None,
                        message,
                    },
                ))
            }
            Err(e) => {
                tracing::error!(error = %e, "Execute import request failed");
                Err(self.report(&mut session, WorkflowError::from_api(&e)))
            }
        }
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Start a fresh session. Responses still in flight for the previous
    /// one are discarded when they arrive.
    pub fn reset(&self) {
        let mut session = self.lock();
        let from = session.step;
        let generation = session.generation + 1;
        *session = Session::new(generation, self.config.default_options());
        self.progress.invalidate();

        tracing::info!(session_id = %session.id, generation, "Import session reset");
        if from != WorkflowStep::Idle {
            self.events.publish(WorkflowEvent::StepChanged {
                session_id: session.id,
                from,
                to: WorkflowStep::Idle,
            });
        }
    }

    /// Open the dialog on a fresh session.
    pub fn open(&self) {
        self.reset();
        self.dialog_open.set(true);
    }

    /// Close the dialog, discarding the session.
    pub fn close(&self) {
        self.reset();
        self.dialog_open.set(false);
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn step(&self) -> WorkflowStep {
        self.lock().step
    }

    pub fn session_id(&self) -> Uuid {
        self.lock().id
    }

    pub fn upload_result(&self) -> Option<UploadResult> {
        self.lock().upload_result.clone()
    }

    pub fn last_error(&self) -> Option<WorkflowError> {
        self.lock().last_error.clone()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.lock().last_notice.clone()
    }

    pub fn destination(&self) -> DestinationForm {
        self.lock().form.clone()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let session = self.lock();
        WorkflowSnapshot {
            session_id: session.id,
            step: session.step,
            upload_result: session.upload_result.clone(),
            destination: session.form.clone(),
            options: self.config.effective_options(session.options),
            resolved: session.resolved.clone(),
            diagram_id: session.diagram_id.clone(),
            last_error: session.last_error.as_ref().map(ToString::to_string),
            last_notice: session.last_notice.clone(),
            can_confirm: self.can_confirm_in(&session),
            progress: self.progress.current(),
        }
    }

    pub fn progress(&self) -> watch::Receiver<UploadProgress> {
        self.progress.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn dialog_flag(&self) -> SharedFlag {
        self.dialog_open.clone()
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_no_request(&self, session: &Session) -> Result<(), WorkflowError> {
        if session.request_in_flight {
            tracing::debug!(
                session_id = %session.id,
                step = session.step.as_str(),
                "Rejected while another request is outstanding"
            );
            return Err(WorkflowError::OperationInFlight);
        }
        Ok(())
    }

    /// Mark a request sequence as outstanding and return the generation it
    /// belongs to. Pair with a [`RequestClaim`] once the lock is released.
    fn claim(&self, session: &mut Session) -> u64 {
        session.request_in_flight = true;
        session.generation
    }

    fn claim_now(&self) -> Result<u64, WorkflowError> {
        let mut session = self.lock();
        self.ensure_no_request(&session)?;
        Ok(self.claim(&mut session))
    }

    /// Lock the session if it is still the one `generation` belongs to.
    fn current(&self, generation: u64) -> Result<MutexGuard<'_, Session>, WorkflowError> {
        let session = self.lock();
        if session.generation != generation {
            tracing::debug!(
                expected = generation,
                current = session.generation,
                "Discarding response for a reset session"
            );
            return Err(WorkflowError::Superseded);
        }
        Ok(session)
    }

    fn transition(&self, session: &mut Session, to: WorkflowStep) -> Result<(), WorkflowError> {
        validate_transition(session.step, to)?;
        let from = std::mem::replace(&mut session.step, to);
        tracing::debug!(
            session_id = %session.id,
            from = from.as_str(),
            to = to.as_str(),
            "Workflow step changed"
        );
        self.events.publish(WorkflowEvent::StepChanged {
            session_id: session.id,
            from,
            to,
        });
        Ok(())
    }

    /// Enter `Extracting` unless already there.
    fn enter_extracting(&self, session: &mut Session) -> Result<(), WorkflowError> {
        if session.step == WorkflowStep::Extracting {
            return Ok(());
        }
        self.transition(session, WorkflowStep::Extracting)
    }

    fn notify(&self, session: &mut Session, notice: Notice) {
        session.last_notice = Some(notice.clone());
        self.events.publish(WorkflowEvent::Notice(notice));
    }

    /// Record a failure and its notice without changing the step.
    fn report(&self, session: &mut Session, err: WorkflowError) -> WorkflowError {
        tracing::warn!(
            session_id = %session.id,
            step = session.step.as_str(),
            error = %err,
            "Import workflow failure"
        );
        session.last_error = Some(err.clone());
        self.notify(session, Notice::error(err.to_string()));
        err
    }

    /// Record a failure of the running step and move to `Failed`.
    fn fail(&self, session: &mut Session, err: WorkflowError) -> WorkflowError {
        if let Err(e) = self.transition(session, WorkflowStep::Failed) {
            tracing::debug!(error = %e, "Failure recorded without a step change");
        }
        self.report(session, err)
    }

    fn can_confirm_in(&self, session: &Session) -> bool {
        session.step == WorkflowStep::AwaitingDestination
            && !session.request_in_flight
            && session.extract_path().is_some()
            && (!self.config.require_destination_selection || session.form.is_complete())
    }

    fn progress_callback(&self, attempt: u64) -> ProgressFn {
        let tracker = self.progress.clone();
        let events = self.events.clone();
        Arc::new(move |percent| {
            if tracker.report(attempt, percent) {
                events.publish(WorkflowEvent::UploadProgress {
                    attempt,
                    percent: percent.min(100),
                });
            }
        })
    }

    async fn resolve_in(
        &self,
        generation: u64,
        selection: &DestinationSelection,
    ) -> Result<ResolvedDestination, WorkflowError> {
        {
            let mut session = self.current(generation)?;
            if !selection.is_complete() {
                return Err(self.report(
                    &mut session,
                    WorkflowError::Precondition(MSG_DESTINATION_INCOMPLETE.to_string()),
                ));
            }
            self.enter_extracting(&mut session)?;
        }

        let resolved = match selection {
            DestinationSelection::Existing {
                project_id,
                system_id,
            } => ResolvedDestination {
                project_id: project_id.clone(),
                system_id: system_id.clone(),
            },
            DestinationSelection::NewSystem { project_id, system } => {
                let system_id = self
                    .create_system(generation, project_id, system, false)
                    .await?;
                ResolvedDestination {
                    project_id: project_id.clone(),
                    system_id,
                }
            }
            DestinationSelection::NewProject { project, system } => {
                let project_id = self.create_project(generation, project).await?;
                let system_id = self
                    .create_system(generation, &project_id, system, true)
                    .await?;
                ResolvedDestination {
                    project_id,
                    system_id,
                }
            }
        };

        let mut session = self.current(generation)?;
        tracing::info!(
            project_id = %resolved.project_id,
            system_id = %resolved.system_id,
            created = selection.creation_calls(),
            "Destination resolved"
        );
        session.resolved = Some(resolved.clone());
        Ok(resolved)
    }

    async fn create_project(
        &self,
        generation: u64,
        project: &NewEntity,
    ) -> Result<EntityId, WorkflowError> {
        let outcome = self
            .service
            .create_project(&CreateProject::from(project))
            .await;

        let mut session = self.current(generation)?;
        match outcome {
            Ok(created) => {
                tracing::info!(project_id = %created.id, "Project created");
                Ok(created.id)
            }
            Err(e) => {
                tracing::error!(error = %e, "Project creation failed");
                Err(self.fail(&mut session, WorkflowError::from_api(&e)))
            }
        }
    }

    /// Create a system under `project_id`. When `project_was_created` the
    /// project came from this same resolution and a failure here leaves it
    /// behind.
    async fn create_system(
        &self,
        generation: u64,
        project_id: &str,
        system: &NewEntity,
        project_was_created: bool,
    ) -> Result<EntityId, WorkflowError> {
        let outcome = self
            .service
            .create_system(&CreateSystem::new(project_id, system))
            .await;

        let mut session = self.current(generation)?;
        match outcome {
            Ok(created) => {
                tracing::info!(project_id, system_id = %created.id, "System created");
                Ok(created.id)
            }
            Err(e) if project_was_created => {
                tracing::error!(
                    orphaned_project_id = project_id,
                    error = %e,
                    "System creation failed after its project was created"
                );
                let err = WorkflowError::PartialSequence {
                    created_project: project_id.to_string(),
                    message: WorkflowError::from_api(&e).to_string(),
                };
                Err(self.fail(&mut session, err))
            }
            Err(e) => {
                tracing::error!(project_id, error = %e, "System creation failed");
                Err(self.fail(&mut session, WorkflowError::from_api(&e)))
            }
        }
    }

    async fn extract_in(
        &self,
        generation: u64,
        path: &str,
        destination: Option<&ResolvedDestination>,
        options: ExtractionOptions,
    ) -> Result<Value, WorkflowError> {
        let request = {
            let mut session = self.current(generation)?;
            if session.extract_path().is_none() || path.trim().is_empty() {
                return Err(self.report(
                    &mut session,
                    WorkflowError::Precondition(MSG_NO_EXTRACTION_PATH.to_string()),
                ));
            }
            self.enter_extracting(&mut session)?;

            let options = self.config.effective_options(options);
            ExtractionRequest {
                extract_path: path.to_string(),
                project_id: destination.map(|d| d.project_id.clone()),
                system_id: destination.map(|d| d.system_id.clone()),
                include_method_dependencies: options.include_method_dependencies,
            }
        };

        tracing::info!(
            extract_path = %request.extract_path,
            project_id = ?request.project_id,
            system_id = ?request.system_id,
            include_method_dependencies = request.include_method_dependencies,
            "Requesting diagram extraction"
        );

        let outcome = self.service.extract(&request).await;

        let mut session = self.current(generation)?;
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Extraction request failed");
                return Err(self.fail(&mut session, WorkflowError::from_api(&e)));
            }
        };

        if !response.success {
            let message = non_blank(response.message.as_deref())
                .unwrap_or_else(|| MSG_EXTRACTION_FAILED.to_string());
            return Err(self.fail(
                &mut session,
                WorkflowError::Server {
                    status: None,
                    message,
                },
            ));
        }

        let parsed = match response.payload() {
            Some(payload) => serde_json::from_str::<Value>(payload).map_err(|e| e.to_string()),
            None => Err("no diagram payload".to_string()),
        };
        let diagram = match parsed {
            Ok(diagram) => diagram,
            Err(reason) => {
                tracing::warn!(header = ?response.header, reason = %reason, "Extraction returned no usable diagram");
                let message = non_blank(response.message.as_deref())
                    .unwrap_or_else(|| MSG_EXTRACTION_FAILED.to_string());
                return Err(self.fail(
                    &mut session,
                    WorkflowError::Server {
                        status: None,
                        message,
                    },
                ));
            }
        };

        self.transition(&mut session, WorkflowStep::Importing)?;
        Ok(diagram)
    }

    async fn commit_in(&self, generation: u64, diagram: Value) -> Result<ImportOutcome, WorkflowError> {
        {
            let session = self.current(generation)?;
            if session.step != WorkflowStep::Importing {
                return Err(CoreError::InvalidTransition {
                    from: session.step,
                    to: WorkflowStep::Done,
                }
                .into());
            }
        }

        let outcome = self.service.import_diagram(&diagram).await;

        let mut session = self.current(generation)?;
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Diagram import failed");
                return Err(self.fail(&mut session, import_error(&e)));
            }
        };

        session.diagram_id = response.id.clone();
        self.transition(&mut session, WorkflowStep::Done)?;
        let notice = Notice::success(MSG_IMPORT_SUCCEEDED);
        self.notify(&mut session, notice.clone());
        tracing::info!(diagram_id = ?response.id, "Diagram imported");

        let auto_layout = response
            .id
            .clone()
            .map(|id| self.spawn_auto_layout(id, diagram));

        Ok(ImportOutcome {
            diagram_id: response.id,
            notice,
            auto_layout,
        })
    }

    /// Best-effort layout pass. A failure is logged and published, never
    /// surfaced as a workflow error.
    fn spawn_auto_layout(&self, diagram_id: DiagramId, document: Value) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        tokio::spawn(async move {
            match service.auto_layout(&diagram_id, &document).await {
                Ok(()) => tracing::debug!(diagram_id = %diagram_id, "Auto-layout applied"),
                Err(e) => {
                    tracing::warn!(diagram_id = %diagram_id, error = %e, "Auto-layout failed");
                    events.publish(WorkflowEvent::AutoLayoutFailed {
                        diagram_id,
                        error: e.to_string(),
                    });
                }
            }
        })
    }
}

/// Clears the outstanding-request flag when a sequence ends, however it
/// ends. A claim from a reset session leaves the new session alone.
struct RequestClaim<'a> {
    controller: &'a ImportController,
    generation: u64,
}

impl<'a> RequestClaim<'a> {
    fn new(controller: &'a ImportController, generation: u64) -> Self {
        Self {
            controller,
            generation,
        }
    }
}

impl Drop for RequestClaim<'_> {
    fn drop(&mut self) {
        let mut session = self.controller.lock();
        if session.generation == self.generation {
            session.request_in_flight = false;
        }
    }
}

impl std::fmt::Debug for ImportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportController")
            .field("config", &self.config)
            .field("session", &*self.lock())
            .finish_non_exhaustive()
    }
}

fn non_blank(message: Option<&str>) -> Option<String> {
    message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn import_error(err: &StudioApiError) -> WorkflowError {
    match WorkflowError::from_api(err) {
        WorkflowError::Server { status, .. } if err.server_message().is_none() => {
            WorkflowError::Server {
                status,
                message: MSG_IMPORT_FAILED.to_string(),
            }
        }
        other => other,
    }
}
