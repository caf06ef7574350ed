//! HTTP client library for the studio API.
//!
//! Provides typed request/response models, a [`reqwest`]-based client
//! with streamed multipart uploads, environment-driven configuration,
//! the [`service::StudioService`] trait the workflow controller depends
//! on, and helpers for loading uploads from the local filesystem.

pub mod api;
pub mod config;
pub mod local;
pub mod models;
pub mod service;
