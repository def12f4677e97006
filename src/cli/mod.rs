//! Command-line interface module.
//!
//! This module provides the operator surface for:
//! - Exercising the inference pipeline with sample telemetry
//! - Forcing model and prediction syncs
//! - Checking system status

pub mod commands;
pub mod handlers;

pub use commands::Commands;
pub use handlers::{handle_status, handle_sync_model, handle_sync_predictions, handle_test_inference};
