//! Core types, constants, and pure logic for the studio import workflow.
//!
//! This crate has no I/O and no async. It defines the upload selection,
//! destination selection, workflow step and notification types shared by
//! the HTTP client and the workflow controller.

pub mod destination;
pub mod error;
pub mod types;
pub mod upload;
pub mod workflow;
