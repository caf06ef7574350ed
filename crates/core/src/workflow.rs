//! Import workflow steps, transition rules and user-facing messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Shown when extraction is requested before a successful upload.
pub const MSG_NO_EXTRACTION_PATH: &str =
    "No extraction path available. Please upload a ZIP file first.";

/// Shown when confirming before the destination picker is complete.
pub const MSG_DESTINATION_INCOMPLETE: &str = "Please select or create a project and a system.";

/// Shown when a folder is selected but only archives are accepted.
pub const MSG_FOLDER_UPLOAD_DISABLED: &str = "Folder uploads are not enabled. Please upload a ZIP file.";

/// Shown when extraction fails without a service-provided message.
pub const MSG_EXTRACTION_FAILED: &str = "extraction failed";

/// Shown when a request never reached the server.
pub const MSG_TRANSPORT_FAILURE: &str = "Request failed, please check API connection";

/// Prefix for upload failures that carry no server `success: false` body.
pub const MSG_UPLOAD_FAILED_PREFIX: &str = "Upload failed";

/// Shown when the import call fails without a service-provided message.
pub const MSG_IMPORT_FAILED: &str = "Diagram import failed";

/// Shown when the server-side import script fails without a message.
pub const MSG_EXECUTE_IMPORT_FAILED: &str = "Import diagram execution failed";

/// Shown after a successful import.
pub const MSG_IMPORT_SUCCEEDED: &str = "Diagram imported successfully";

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// The controller's current step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    #[default]
    Idle,
    Uploading,
    AwaitingDestination,
    Extracting,
    Importing,
    Done,
    Failed,
}

impl WorkflowStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::AwaitingDestination => "awaiting_destination",
            Self::Extracting => "extracting",
            Self::Importing => "importing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Human-readable label for the step.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Uploading => "Uploading",
            Self::AwaitingDestination => "Select Destination",
            Self::Extracting => "Extracting",
            Self::Importing => "Importing",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// `Done` and `Failed` end the session until it is reset.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether a network call is outstanding in this step.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Uploading | Self::Extracting | Self::Importing)
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a step transition.
///
/// Steps are strictly sequential: upload, destination, extraction, import.
/// A failed session may retry the upload, an upload may be replaced while
/// the destination is still being chosen, and any step may reset to idle.
pub fn validate_transition(from: WorkflowStep, to: WorkflowStep) -> Result<(), CoreError> {
    use WorkflowStep::*;

    let allowed = match (from, to) {
        (_, Idle) => true,
        (Idle | Failed | AwaitingDestination, Uploading) => true,
        (Uploading, AwaitingDestination | Failed) => true,
        (AwaitingDestination, Extracting) => true,
        (Extracting, Importing | Failed) => true,
        (Importing, Done | Failed) => true,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
}

/// The single user-visible notification produced by an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    pub created_at: Timestamp,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
