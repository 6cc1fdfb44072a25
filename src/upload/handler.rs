//! Upload handler
//!
//! Turns a [`ReceivedUpload`] into a response: an XML error document when the
//! upload status is non-zero, otherwise the file is moved into the store and
//! the JSON acknowledgement is returned.

use super::{ReceivedUpload, UploadStatus};
use crate::metrics;
use crate::response::{
    Acknowledgement, ErrorTemplate, ERROR_STATUS_CODE, STORAGE_ERROR_PREFIX, UPLOAD_ERROR_PREFIX,
};
use crate::storage::{Clock, SmsLogStore, StorageError, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Plain-text body used when no document could be produced
const FALLBACK_BODY: &str = "internal error";

/// Result of handling one upload
#[derive(Debug)]
pub enum UploadOutcome {
    /// File stored; body is the JSON acknowledgement
    Stored { path: PathBuf, body: String },
    /// Upload status was non-zero; body is the XML error document
    Rejected { status: UploadStatus, body: String },
    /// The file could not be stored; body is the XML error document
    StorageFailed { error: StorageError, body: String },
    /// No response document could be rendered
    Internal,
}

impl UploadOutcome {
    /// HTTP status code for the response
    pub fn http_status(&self) -> u16 {
        match self {
            UploadOutcome::Stored { .. } | UploadOutcome::Rejected { .. } => 200,
            UploadOutcome::StorageFailed { .. } | UploadOutcome::Internal => 500,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            UploadOutcome::Stored { .. } => "application/json",
            UploadOutcome::Rejected { .. } | UploadOutcome::StorageFailed { .. } => {
                "application/xml"
            }
            UploadOutcome::Internal => "text/plain",
        }
    }

    pub fn body(&self) -> &str {
        match self {
            UploadOutcome::Stored { body, .. }
            | UploadOutcome::Rejected { body, .. }
            | UploadOutcome::StorageFailed { body, .. } => body,
            UploadOutcome::Internal => FALLBACK_BODY,
        }
    }

    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            UploadOutcome::Stored { .. } => "stored",
            UploadOutcome::Rejected { status, .. } => status.as_str(),
            UploadOutcome::StorageFailed { .. } => "storage_error",
            UploadOutcome::Internal => "internal_error",
        }
    }
}

/// Handles received uploads
#[derive(Clone)]
pub struct UploadHandler {
    store: SmsLogStore,
    template: ErrorTemplate,
    clock: Arc<dyn Clock>,
}

impl UploadHandler {
    pub fn new(store: SmsLogStore, template: ErrorTemplate) -> Self {
        Self::with_clock(store, template, Arc::new(SystemClock))
    }

    pub fn with_clock(store: SmsLogStore, template: ErrorTemplate, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            template,
            clock,
        }
    }

    pub fn store(&self) -> &SmsLogStore {
        &self.store
    }

    /// Handle a received upload
    pub async fn handle(&self, received: ReceivedUpload) -> UploadOutcome {
        let started = Instant::now();
        let outcome = self.dispatch(received).await;
        metrics::record_upload(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn dispatch(&self, received: ReceivedUpload) -> UploadOutcome {
        let file = match (received.status, received.file) {
            (UploadStatus::Ok, Some(file)) => file,
            (status, _) => {
                let status = if status.is_ok() {
                    UploadStatus::NoFile
                } else {
                    status
                };
                warn!(
                    code = status.code(),
                    client_filename = ?received.client_filename,
                    "Upload rejected"
                );
                let message = format!("{}{}", UPLOAD_ERROR_PREFIX, status.code());
                return match self.template.render(ERROR_STATUS_CODE, &message) {
                    Ok(body) => UploadOutcome::Rejected { status, body },
                    Err(e) => {
                        error!(error = %e, "Failed to render error document");
                        metrics::record_error("template");
                        UploadOutcome::Internal
                    }
                };
            }
        };

        let size = file.size();
        let content_hash = file.content_hash().to_string();
        let at = self.clock.now();

        match self.store.store_async(file, at).await {
            Ok(path) => {
                info!(
                    path = %path.display(),
                    bytes = size,
                    sha256 = %content_hash,
                    client_filename = ?received.client_filename,
                    "Stored SMS log"
                );
                metrics::record_stored_bytes(size);
                match Acknowledgement::success().to_body() {
                    Ok(body) => UploadOutcome::Stored { path, body },
                    Err(e) => {
                        error!(error = %e, "Failed to serialize acknowledgement");
                        UploadOutcome::Internal
                    }
                }
            }
            Err(e) => {
                error!(error = %e, bytes = size, "Failed to store SMS log");
                metrics::record_error("storage");
                let message = format!("{}{}", STORAGE_ERROR_PREFIX, e.reason());
                match self.template.render(ERROR_STATUS_CODE, &message) {
                    Ok(body) => UploadOutcome::StorageFailed { error: e, body },
                    Err(render_error) => {
                        error!(error = %render_error, "Failed to render error document");
                        UploadOutcome::Internal
                    }
                }
            }
        }
    }
}
