//! Upload module
//!
//! Receives the multipart submission, spools the SMS log part to disk and
//! hands the result to the [`handler::UploadHandler`].

use std::fmt;
use thiserror::Error;

pub mod handler;
pub mod multipart;
pub mod spool;

pub use handler::{UploadHandler, UploadOutcome};
pub use multipart::{MultipartReceiver, ReceivedUpload};
pub use spool::SpoolFile;

/// Result of receiving the file part, numbered like the classic
/// upload-subsystem error codes so clients see familiar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// The part was received completely
    Ok,
    /// Part exceeds the server-wide size limit
    IniSize,
    /// Part exceeds the `MAX_FILE_SIZE` declared in the form
    FormSize,
    /// Part was only partially received
    Partial,
    /// No file part under the configured field name
    NoFile,
    /// Spool directory is missing
    NoTmpDir,
    /// Writing the spool file failed
    CantWrite,
}

impl UploadStatus {
    /// Numeric code reported to clients
    pub fn code(self) -> u8 {
        match self {
            UploadStatus::Ok => 0,
            UploadStatus::IniSize => 1,
            UploadStatus::FormSize => 2,
            UploadStatus::Partial => 3,
            UploadStatus::NoFile => 4,
            UploadStatus::NoTmpDir => 6,
            UploadStatus::CantWrite => 7,
        }
    }

    pub fn is_ok(self) -> bool {
        self == UploadStatus::Ok
    }

    /// Label used for metrics and logs
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Ok => "ok",
            UploadStatus::IniSize => "ini_size",
            UploadStatus::FormSize => "form_size",
            UploadStatus::Partial => "partial",
            UploadStatus::NoFile => "no_file",
            UploadStatus::NoTmpDir => "no_tmp_dir",
            UploadStatus::CantWrite => "cant_write",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Spooling errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Spool directory unavailable: {0}")]
    NoTmpDir(std::io::Error),

    #[error("Failed to write spool file: {0}")]
    Write(std::io::Error),

    #[error("Failed to move spool file: {0}")]
    Persist(std::io::Error),
}

impl UploadError {
    /// Upload status this error is reported as
    pub fn status(&self) -> UploadStatus {
        match self {
            UploadError::NoTmpDir(_) => UploadStatus::NoTmpDir,
            UploadError::Write(_) | UploadError::Persist(_) => UploadStatus::CantWrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(UploadStatus::Ok.code(), 0);
        assert_eq!(UploadStatus::IniSize.code(), 1);
        assert_eq!(UploadStatus::FormSize.code(), 2);
        assert_eq!(UploadStatus::Partial.code(), 3);
        assert_eq!(UploadStatus::NoFile.code(), 4);
        assert_eq!(UploadStatus::NoTmpDir.code(), 6);
        assert_eq!(UploadStatus::CantWrite.code(), 7);
    }

    #[test]
    fn test_status_display_is_code() {
        assert_eq!(UploadStatus::NoFile.to_string(), "4");
        assert!(UploadStatus::Ok.is_ok());
        assert!(!UploadStatus::Partial.is_ok());
    }

    #[test]
    fn test_error_status_mapping() {
        let err = UploadError::NoTmpDir(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.status(), UploadStatus::NoTmpDir);
        let err = UploadError::Write(std::io::Error::from(std::io::ErrorKind::Other));
        assert_eq!(err.status(), UploadStatus::CantWrite);
    }
}
