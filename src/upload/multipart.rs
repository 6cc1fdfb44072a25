//! Multipart receiver
//!
//! Streams a `multipart/form-data` body, spools the configured file part and
//! derives the [`UploadStatus`] the handler acts on. Parse and I/O failures
//! never escape as errors; they become status codes.

use super::{SpoolFile, UploadStatus};
use crate::config::UploadConfig;
use bytes::Bytes;
use futures::Stream;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Form field a client may send ahead of the file part to lower the size limit
pub const MAX_FILE_SIZE_FIELD: &str = "MAX_FILE_SIZE";

/// Longest `MAX_FILE_SIZE` value accepted, in bytes
pub const MAX_FILE_SIZE_FIELD_LIMIT: u64 = 32;

/// Outcome of receiving one submission
pub struct ReceivedUpload {
    pub status: UploadStatus,
    /// Spooled file part, present only when `status` is `Ok`
    pub file: Option<SpoolFile>,
    /// Filename the client declared for the part
    pub client_filename: Option<String>,
}

impl ReceivedUpload {
    fn failed(status: UploadStatus, client_filename: Option<String>) -> Self {
        Self {
            status,
            file: None,
            client_filename,
        }
    }
}

impl std::fmt::Debug for ReceivedUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceivedUpload")
            .field("status", &self.status)
            .field("file", &self.file.as_ref().map(|s| s.path().to_path_buf()))
            .field("client_filename", &self.client_filename)
            .finish()
    }
}

/// Receives multipart submissions according to [`UploadConfig`]
#[derive(Debug, Clone)]
pub struct MultipartReceiver {
    field_name: String,
    max_file_size: u64,
    spool_dir: PathBuf,
}

impl MultipartReceiver {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            field_name: config.field_name.clone(),
            max_file_size: config.max_file_size,
            spool_dir: config.spool_dir(),
        }
    }

    /// Receive a submission.
    ///
    /// `content_type` is the request's `Content-Type` header; a missing or
    /// non-multipart header is reported as [`UploadStatus::NoFile`].
    pub async fn receive<S, O, E>(&self, content_type: Option<&str>, body: S) -> ReceivedUpload
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let boundary = match content_type.map(multer::parse_boundary) {
            Some(Ok(boundary)) => boundary,
            _ => {
                debug!(content_type = ?content_type, "Request is not multipart/form-data");
                return ReceivedUpload::failed(UploadStatus::NoFile, None);
            }
        };

        let constraints = multer::Constraints::new().size_limit(
            multer::SizeLimit::new().for_field(MAX_FILE_SIZE_FIELD, MAX_FILE_SIZE_FIELD_LIMIT),
        );
        let mut multipart = multer::Multipart::with_constraints(body, boundary, constraints);
        let mut declared_max: Option<u64> = None;
        let mut spooled: Option<SpoolFile> = None;
        let mut client_filename: Option<String> = None;

        loop {
            let mut field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to parse multipart body");
                    return ReceivedUpload::failed(UploadStatus::Partial, client_filename);
                }
            };

            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(MAX_FILE_SIZE_FIELD) => match field.text().await {
                    Ok(text) => match text.trim().parse() {
                        Ok(max) => declared_max = Some(max),
                        Err(_) => warn!(value = %text.trim(), "Ignoring non-numeric MAX_FILE_SIZE"),
                    },
                    Err(e) => {
                        warn!(error = %e, "Failed to read MAX_FILE_SIZE field");
                        return ReceivedUpload::failed(UploadStatus::Partial, client_filename);
                    }
                },
                Some(name) if name == self.field_name && spooled.is_none() => {
                    client_filename = field.file_name().map(str::to_string);

                    let mut spool = match SpoolFile::create_in(&self.spool_dir) {
                        Ok(spool) => spool,
                        Err(e) => {
                            warn!(error = %e, dir = %self.spool_dir.display(), "Cannot spool upload");
                            return ReceivedUpload::failed(e.status(), client_filename);
                        }
                    };

                    loop {
                        let chunk = match field.chunk().await {
                            Ok(Some(chunk)) => chunk,
                            Ok(None) => break,
                            Err(e) => {
                                warn!(error = %e, "File part ended prematurely");
                                return ReceivedUpload::failed(
                                    UploadStatus::Partial,
                                    client_filename,
                                );
                            }
                        };

                        let received = spool.size() + chunk.len() as u64;
                        if received > self.max_file_size {
                            warn!(limit = self.max_file_size, "File part exceeds size limit");
                            return ReceivedUpload::failed(UploadStatus::IniSize, client_filename);
                        }
                        if declared_max.is_some_and(|max| received > max) {
                            warn!(limit = ?declared_max, "File part exceeds MAX_FILE_SIZE");
                            return ReceivedUpload::failed(UploadStatus::FormSize, client_filename);
                        }

                        if let Err(e) = spool.write_chunk(&chunk) {
                            warn!(error = %e, "Failed writing spool file");
                            return ReceivedUpload::failed(e.status(), client_filename);
                        }
                    }

                    match tokio::task::spawn_blocking(move || spool.finish()).await {
                        Ok(Ok(spool)) => spooled = Some(spool),
                        Ok(Err(e)) => {
                            warn!(error = %e, "Failed finishing spool file");
                            return ReceivedUpload::failed(e.status(), client_filename);
                        }
                        Err(e) => {
                            warn!(error = %e, "Spool task failed");
                            return ReceivedUpload::failed(
                                UploadStatus::CantWrite,
                                client_filename,
                            );
                        }
                    }
                }
                other => {
                    if other == Some(self.field_name.as_str()) {
                        warn!(field = %self.field_name, "Ignoring repeated file part");
                    }
                    // Drain parts we don't keep, e.g. the client's description.
                    loop {
                        match field.chunk().await {
                            Ok(Some(_)) => continue,
                            Ok(None) => break,
                            Err(e) => {
                                warn!(error = %e, "Failed draining multipart field");
                                return ReceivedUpload::failed(
                                    UploadStatus::Partial,
                                    client_filename,
                                );
                            }
                        }
                    }
                }
            }
        }

        match spooled {
            Some(file) => ReceivedUpload {
                status: UploadStatus::Ok,
                file: Some(file),
                client_filename,
            },
            None => {
                debug!(field = %self.field_name, "No file part in submission");
                ReceivedUpload::failed(UploadStatus::NoFile, client_filename)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const BOUNDARY: &str = "X-SMSLOG-BOUNDARY";

    fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    fn part(name: &str, filename: Option<&str>, body: &str) -> String {
        let disposition = match filename {
            Some(f) => format!("form-data; name=\"{}\"; filename=\"{}\"", name, f),
            None => format!("form-data; name=\"{}\"", name),
        };
        format!(
            "--{}\r\nContent-Disposition: {}\r\nContent-Type: multipart/form-data\r\n\r\n{}\r\n",
            BOUNDARY, disposition, body
        )
    }

    fn body(parts: &[String]) -> String {
        format!("{}--{}--\r\n", parts.concat(), BOUNDARY)
    }

    fn stream_of(
        body: String,
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures::stream::iter(vec![Ok::<_, Infallible>(Bytes::from(body))])
    }

    fn receiver(dir: &std::path::Path, max: u64) -> MultipartReceiver {
        MultipartReceiver::new(&UploadConfig {
            field_name: "smslog".into(),
            max_file_size: max,
            temp_dir: Some(dir.to_path_buf()),
        })
    }

    #[tokio::test]
    async fn test_receive_file_part() {
        let dir = tempfile::tempdir().unwrap();
        let payload = body(&[
            part("description", None, "SMS file for upload"),
            part("smslog", Some("smslog.csv"), "from,body\n+44,hi\n"),
        ]);

        let received = receiver(dir.path(), 1024)
            .receive(Some(&content_type()), stream_of(payload))
            .await;

        assert_eq!(received.status, UploadStatus::Ok);
        assert_eq!(received.client_filename.as_deref(), Some("smslog.csv"));
        let file = received.file.expect("spooled file");
        assert_eq!(std::fs::read(file.path()).unwrap(), b"from,body\n+44,hi\n");
    }

    #[tokio::test]
    async fn test_missing_file_part() {
        let dir = tempfile::tempdir().unwrap();
        let payload = body(&[part("description", None, "SMS file for upload")]);

        let received = receiver(dir.path(), 1024)
            .receive(Some(&content_type()), stream_of(payload))
            .await;

        assert_eq!(received.status, UploadStatus::NoFile);
        assert!(received.file.is_none());
    }

    #[tokio::test]
    async fn test_not_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let received = receiver(dir.path(), 1024)
            .receive(Some("text/csv"), stream_of("a,b".into()))
            .await;
        assert_eq!(received.status, UploadStatus::NoFile);

        let received = receiver(dir.path(), 1024)
            .receive(None, stream_of("a,b".into()))
            .await;
        assert_eq!(received.status, UploadStatus::NoFile);
    }

    #[tokio::test]
    async fn test_oversize_part() {
        let dir = tempfile::tempdir().unwrap();
        let payload = body(&[part("smslog", Some("smslog.csv"), &"x".repeat(64))]);

        let received = receiver(dir.path(), 16)
            .receive(Some(&content_type()), stream_of(payload))
            .await;

        assert_eq!(received.status, UploadStatus::IniSize);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_declared_max_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let payload = body(&[
            part(MAX_FILE_SIZE_FIELD, None, "8"),
            part("smslog", Some("smslog.csv"), "0123456789"),
        ]);

        let received = receiver(dir.path(), 1024)
            .receive(Some(&content_type()), stream_of(payload))
            .await;

        assert_eq!(received.status, UploadStatus::FormSize);
    }

    #[tokio::test]
    async fn test_oversized_max_file_size_field() {
        let dir = tempfile::tempdir().unwrap();
        let payload = body(&[
            part(MAX_FILE_SIZE_FIELD, None, &"9".repeat(64 * 1024)),
            part("smslog", Some("smslog.csv"), "from,body\n"),
        ]);

        let received = receiver(dir.path(), 1024)
            .receive(Some(&content_type()), stream_of(payload))
            .await;

        assert_eq!(received.status, UploadStatus::Partial);
        assert!(received.file.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_non_numeric_max_file_size_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let payload = body(&[
            part(MAX_FILE_SIZE_FIELD, None, "lots"),
            part("smslog", Some("smslog.csv"), "0123456789"),
        ]);

        let received = receiver(dir.path(), 1024)
            .receive(Some(&content_type()), stream_of(payload))
            .await;

        assert_eq!(received.status, UploadStatus::Ok);
        assert_eq!(received.file.unwrap().size(), 10);
    }

    #[tokio::test]
    async fn test_truncated_body() {
        let dir = tempfile::tempdir().unwrap();
        let mut payload = part("smslog", Some("smslog.csv"), "from,body\n");
        payload.truncate(payload.len() - 4);

        let received = receiver(dir.path(), 1024)
            .receive(Some(&content_type()), stream_of(payload))
            .await;

        assert_eq!(received.status, UploadStatus::Partial);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_spool_dir() {
        let dir = tempfile::tempdir().unwrap();
        let payload = body(&[part("smslog", Some("smslog.csv"), "a")]);

        let received = receiver(&dir.path().join("gone"), 1024)
            .receive(Some(&content_type()), stream_of(payload))
            .await;

        assert_eq!(received.status, UploadStatus::NoTmpDir);
    }
}
