//! Spool file for incoming multipart parts
//!
//! The file part is streamed into a uniquely named file in the spool
//! directory while its SHA-256 digest is computed. Once received, the file is
//! moved into the store with [`SpoolFile::persist`]; a spool file that is
//! never persisted is removed on drop.
//!
//! # Example
//!
//! ```no_run
//! use smslog_receiver::upload::SpoolFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut spool = SpoolFile::create_in(std::env::temp_dir())?;
//! spool.write_chunk(b"address,body\n")?;
//! let spool = spool.finish()?;
//!
//! println!("File: {:?}", spool.path());
//! println!("Size: {} bytes", spool.size());
//! println!("SHA256: {}", spool.content_hash());
//! # Ok(())
//! # }
//! ```

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::UploadError;

/// Received file part waiting to be moved into the store
///
/// Automatically cleaned up when dropped (RAII pattern).
pub struct SpoolFile {
    path: PathBuf,
    file: Option<File>,
    hasher: Option<Sha256>,
    size: u64,
    content_hash: String,
    persisted: bool,
}

impl SpoolFile {
    /// Create an empty spool file in `dir`
    pub fn create_in<P: AsRef<Path>>(dir: P) -> Result<Self, UploadError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(UploadError::NoTmpDir(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", dir.display()),
            )));
        }

        let path = dir.join(format!("smslog-{}.upload", uuid::Uuid::new_v4()));
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(UploadError::NoTmpDir)?;

        Ok(Self {
            path,
            file: Some(file),
            hasher: Some(Sha256::new()),
            size: 0,
            content_hash: String::new(),
            persisted: false,
        })
    }

    /// Append a chunk of the part body
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| UploadError::Write(io::Error::other("spool file already finished")))?;
        file.write_all(chunk).map_err(UploadError::Write)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(chunk);
        }
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// Flush and close the file, fixing its digest
    pub fn finish(mut self) -> Result<Self, UploadError> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(UploadError::Write)?;
            file.sync_all().map_err(UploadError::Write)?;
        }
        if let Some(hasher) = self.hasher.take() {
            self.content_hash = hex::encode(hasher.finalize());
        }
        Ok(self)
    }

    /// Get the path to the spool file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the number of bytes received
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the SHA256 hash of the content (hex encoded), empty until finished
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Move the spool file to `dest`, replacing any existing file.
    ///
    /// Renames when possible and falls back to copy + delete when the
    /// destination lives on another filesystem.
    pub fn persist(mut self, dest: &Path) -> Result<(), UploadError> {
        self.file.take();
        if std::fs::rename(&self.path, dest).is_err() {
            std::fs::copy(&self.path, dest).map_err(UploadError::Persist)?;
            // Drop removes the spool copy.
            return Ok(());
        }
        self.persisted = true;
        Ok(())
    }

    /// Move the spool file to `dest`, failing with `AlreadyExists` if it is taken
    pub fn persist_new(mut self, dest: &Path) -> Result<(), (Self, UploadError)> {
        self.file.take();
        let mut target = match File::options().write(true).create_new(true).open(dest) {
            Ok(file) => file,
            Err(e) => return Err((self, UploadError::Persist(e))),
        };

        // The destination name is now reserved; fill it.
        if std::fs::rename(&self.path, dest).is_ok() {
            self.persisted = true;
            return Ok(());
        }
        let copied = File::open(&self.path).and_then(|mut source| io::copy(&mut source, &mut target));
        if let Err(e) = copied {
            drop(target);
            let _ = std::fs::remove_file(dest);
            return Err((self, UploadError::Persist(e)));
        }
        Ok(())
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        self.file.take();
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up spool file"
                );
            }
        }
    }
}
