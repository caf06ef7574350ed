use mde_client::api::StudioApiError;
use mde_core::error::CoreError;
use mde_core::types::EntityId;
use mde_core::workflow::{MSG_TRANSPORT_FAILURE, MSG_UPLOAD_FAILED_PREFIX};

/// Failures surfaced by the import workflow.
///
/// Every variant renders as the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// No response reached the client.
    #[error("{0}")]
    Transport(String),

    /// The server answered with `success: false` or a non-2xx status.
    #[error("{message}")]
    Server {
        status: Option<u16>,
        message: String,
    },

    /// Detected locally; nothing was sent.
    #[error("{0}")]
    Precondition(String),

    /// The project was created but the system under it was not. The
    /// project stays on the server.
    #[error("{message} (project {created_project} was created and left in place)")]
    PartialSequence {
        created_project: EntityId,
        message: String,
    },

    #[error("An upload is already in progress")]
    UploadInFlight,

    /// Another resolve, extract or import request has not answered yet.
    #[error("Another request is still in progress")]
    OperationInFlight,

    /// The session was reset while the call was in flight; its result
    /// was discarded.
    #[error("The import session was reset before the response arrived")]
    Superseded,

    /// The operation is not valid in the current step.
    #[error(transparent)]
    InvalidState(#[from] CoreError),
}

impl WorkflowError {
    /// Map an API error, keeping a server-provided message verbatim.
    pub fn from_api(err: &StudioApiError) -> Self {
        match err {
            e if e.is_transport() => Self::Transport(MSG_TRANSPORT_FAILURE.to_string()),
            StudioApiError::ApiError {
                status,
                body,
                message,
            } => Self::Server {
                status: Some(*status),
                message: message
                    .clone()
                    .unwrap_or_else(|| format!("Error: {status} - {body}")),
            },
            StudioApiError::Validation(msg) => Self::Precondition(msg.clone()),
            other => Self::Server {
                status: None,
                message: other.to_string(),
            },
        }
    }

    /// Map an upload error, prefixing the message the way upload failures
    /// are reported to the user.
    pub fn from_upload(err: &StudioApiError) -> Self {
        match err {
            StudioApiError::ApiError {
                status,
                body,
                message,
            } => Self::Server {
                status: Some(*status),
                message: format!(
                    "{MSG_UPLOAD_FAILED_PREFIX}: Error: {status} - {}",
                    message.as_deref().unwrap_or(body)
                ),
            },
            e if e.is_transport() => Self::Transport(format!(
                "{MSG_UPLOAD_FAILED_PREFIX}: {MSG_TRANSPORT_FAILURE}"
            )),
            other => match Self::from_api(other) {
                Self::Server { status, message } => Self::Server {
                    status,
                    message: format!("{MSG_UPLOAD_FAILED_PREFIX}: {message}"),
                },
                mapped => mapped,
            },
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, body: &str, message: Option<&str>) -> StudioApiError {
        StudioApiError::ApiError {
            status,
            body: body.to_string(),
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn server_message_is_verbatim() {
        let err = WorkflowError::from_api(&api_error(400, "{}", Some("bad archive")));
        assert_eq!(err.to_string(), "bad archive");
    }

    #[test]
    fn server_without_message_shows_status_and_body() {
        let err = WorkflowError::from_api(&api_error(502, "Bad Gateway", None));
        assert_eq!(err.to_string(), "Error: 502 - Bad Gateway");
    }

    #[test]
    fn upload_errors_are_prefixed() {
        let err = WorkflowError::from_upload(&api_error(413, "", Some("too large")));
        assert_eq!(err.to_string(), "Upload failed: Error: 413 - too large");
    }

    #[test]
    fn validation_becomes_precondition() {
        let err = WorkflowError::from_api(&StudioApiError::Validation("empty".into()));
        assert_eq!(err, WorkflowError::Precondition("empty".into()));
    }

    #[test]
    fn partial_sequence_names_orphan() {
        let err = WorkflowError::PartialSequence {
            created_project: "P9".into(),
            message: "Failed to create system".into(),
        };
        assert!(err.to_string().contains("P9"));
    }
}
