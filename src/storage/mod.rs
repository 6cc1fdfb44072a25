//! Date-partitioned SMS log store
//!
//! Uploads land at `<base>/<YYYY>/<MM>/<DD>/smslog_<YYYYMMDDTHHMMSSZ>.csv`.
//! All dates are UTC and come from an explicit timestamp; nothing here reads
//! or changes the process timezone.

use crate::config::{CollisionPolicy, StorageConfig};
use crate::upload::{SpoolFile, UploadError};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

mod clock;

pub use clock::{Clock, FixedClock, SystemClock};

/// Prefix of every stored filename
pub const FILE_PREFIX: &str = "smslog_";

/// Extension of every stored filename
pub const FILE_EXTENSION: &str = "csv";

/// Timestamp format used in filenames, e.g. `20140416T160152Z`
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to move upload to {path}: {source}")]
    Move { path: PathBuf, source: UploadError },

    #[error("Storage task failed: {0}")]
    Task(String),
}

impl StorageError {
    /// Short description safe to send to clients
    pub fn reason(&self) -> &'static str {
        match self {
            StorageError::CreateDir { .. } => "cannot create directory",
            StorageError::Move { .. } => "cannot move file",
            StorageError::Task(_) => "storage task failed",
        }
    }
}

/// Format a UTC instant as a filename timestamp
pub fn server_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Directory and filename rules for stored uploads
#[derive(Debug, Clone)]
pub struct StorageLayout {
    base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base>/<YYYY>/<MM>/<DD>` for the day of `at`
    pub fn day_dir(&self, at: DateTime<Utc>) -> PathBuf {
        self.base_dir
            .join(at.format("%Y").to_string())
            .join(at.format("%m").to_string())
            .join(at.format("%d").to_string())
    }

    /// `smslog_<timestamp>.csv`
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!("{}{}.{}", FILE_PREFIX, server_timestamp(at), FILE_EXTENSION)
    }

    /// `smslog_<timestamp>_<token>.csv`
    pub fn unique_file_name(&self, at: DateTime<Utc>, token: &str) -> String {
        format!(
            "{}{}_{}.{}",
            FILE_PREFIX,
            server_timestamp(at),
            token,
            FILE_EXTENSION
        )
    }

    /// Full destination path for an upload handled at `at`
    pub fn file_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.day_dir(at).join(self.file_name(at))
    }
}

/// Store that moves spooled uploads into the date-partitioned layout
#[derive(Debug, Clone)]
pub struct SmsLogStore {
    layout: StorageLayout,
    collision: CollisionPolicy,
}

impl SmsLogStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            layout: StorageLayout::new(config.base_dir.clone()),
            collision: config.collision,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Create the day directory for `at`; an existing directory is fine
    pub fn ensure_day_dir(&self, at: DateTime<Utc>) -> Result<PathBuf, StorageError> {
        let dir = self.layout.day_dir(at);
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Move `upload` into place and return its final path.
    ///
    /// Blocking; call from a blocking context.
    pub fn store(&self, upload: SpoolFile, at: DateTime<Utc>) -> Result<PathBuf, StorageError> {
        let dir = self.ensure_day_dir(at)?;
        let path = dir.join(self.layout.file_name(at));

        match self.collision {
            CollisionPolicy::Overwrite => {
                if path.exists() {
                    debug!(path = %path.display(), "Replacing upload stored in the same second");
                }
                upload.persist(&path).map_err(|source| StorageError::Move {
                    path: path.clone(),
                    source,
                })?;
                Ok(path)
            }
            CollisionPolicy::Unique => self.store_unique(upload, &dir, path, at),
        }
    }

    fn store_unique(
        &self,
        upload: SpoolFile,
        dir: &Path,
        first_choice: PathBuf,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, StorageError> {
        let mut upload = upload;
        let mut path = first_choice;
        loop {
            match upload.persist_new(&path) {
                Ok(()) => return Ok(path),
                Err((spool, UploadError::Persist(e))) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let token = uuid::Uuid::new_v4().simple().to_string();
                    let renamed = dir.join(self.layout.unique_file_name(at, &token[..8]));
                    info!(
                        taken = %path.display(),
                        path = %renamed.display(),
                        "Filename already in use, storing under a unique name"
                    );
                    upload = spool;
                    path = renamed;
                }
                Err((_, source)) => return Err(StorageError::Move { path, source }),
            }
        }
    }

    /// [`SmsLogStore::store`] on tokio's blocking pool
    pub async fn store_async(
        &self,
        upload: SpoolFile,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, StorageError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.store(upload, at))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}
