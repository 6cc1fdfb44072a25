//! Response bodies
//!
//! Success is a fixed JSON acknowledgement; failures are rendered from an XML
//! template loaded once at startup.

use serde::Serialize;

pub mod error_template;

pub use error_template::{ErrorTemplate, TemplateError};

/// Status code placed in every error document
pub const ERROR_STATUS_CODE: u16 = 430;

/// Prefix of the message for upload-status failures
pub const UPLOAD_ERROR_PREFIX: &str = "internal error code: ";

/// Prefix of the message for storage failures
pub const STORAGE_ERROR_PREFIX: &str = "storage error: ";

/// JSON acknowledgement sent to the client
#[derive(Debug, Clone, Serialize)]
pub struct Acknowledgement {
    pub message: &'static str,
    pub succeeded: bool,
}

impl Acknowledgement {
    pub const fn success() -> Self {
        Self {
            message: "Good to go",
            succeeded: true,
        }
    }

    /// Serialized body; field order is part of the wire format
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_body_is_exact() {
        assert_eq!(
            Acknowledgement::success().to_body().unwrap(),
            r#"{"message":"Good to go","succeeded":true}"#
        );
    }
}
