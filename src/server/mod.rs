//! HTTP server module
//!
//! Accepts connections and routes requests to the upload handler.

use crate::response::TemplateError;
use thiserror::Error;

pub mod http;

pub use http::Server;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Failed to load error template: {0}")]
    TemplateError(#[from] TemplateError),

    #[error("Server error: {0}")]
    RuntimeError(String),
}
