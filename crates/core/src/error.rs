use crate::workflow::WorkflowStep;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A local precondition does not hold; nothing was sent to the network.
    #[error("{0}")]
    Precondition(String),

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: WorkflowStep, to: WorkflowStep },

    #[error("Internal error: {0}")]
    Internal(String),
}
