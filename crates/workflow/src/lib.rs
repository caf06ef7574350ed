//! Import workflow controller for the studio.
//!
//! [`controller::ImportController`] drives one import session from file
//! selection through upload, destination resolution, extraction and
//! import. Progress is published on a [`tokio::sync::watch`] channel and
//! step changes and notices on a [`tokio::sync::broadcast`] channel.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod progress;
pub mod ui_state;
