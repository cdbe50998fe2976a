//! Bucketed file storage
//!
//! Two flat directories hold uploads and outputs. A file's name is its only
//! identity: `<8-hex token>_<sanitized name>`. Files are written once with
//! `create_new` and only ever removed by an explicit delete.

use crate::config::StorageConfig;
use crate::error::{PhotoboothError, Result};
use crate::services::format::OutputFormatHandler;
use crate::types::{Bucket, DeleteReport, FileError, StoredItem};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Maximum length of a sanitized name, excluding the token prefix
pub const MAX_NAME_LEN: usize = 100;

/// Longest extension (including the dot) kept when a name is shortened
const MAX_EXTENSION_LEN: usize = 16;

/// Name used when sanitizing leaves nothing
pub const DEFAULT_NAME: &str = "image";

/// Number of hex characters in a file token
pub const TOKEN_LEN: usize = 8;

/// Reduce a client-supplied name to a safe basename
///
/// Keeps only the final path component, maps anything outside
/// `[A-Za-z0-9._-]` to `_`, strips `..` sequences and caps the length.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let mapped: String = base
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut sanitized = mapped;
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "");
    }
    let sanitized = cap_length(sanitized);

    if sanitized.is_empty() || sanitized == "." {
        DEFAULT_NAME.to_string()
    } else {
        sanitized
    }
}

/// Shorten the stem so the whole name fits `MAX_NAME_LEN`, keeping the extension
fn cap_length(name: String) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    // ASCII only at this point, byte slicing is char-safe
    let extension = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_LEN => &name[dot..],
        _ => "",
    };
    let stem = name[..MAX_NAME_LEN - extension.len()].trim_end_matches('.');
    format!("{stem}{extension}")
}

/// Whether `filename` is exactly a name `store` could have produced
///
/// Anything sanitization would rewrite is rejected rather than remapped, so a
/// request can never land on a different file than the one it named.
fn is_stored_name(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename.len() <= TOKEN_LEN + 1 + MAX_NAME_LEN
        && !filename.contains("..")
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

/// Final path component of a requested name
fn basename(requested: &str) -> &str {
    requested.rsplit(['/', '\\']).next().unwrap_or_default()
}

/// Generate a fresh random file token
#[must_use]
pub fn new_token() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(TOKEN_LEN)
        .collect()
}

fn is_token(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Manages the uploads and outputs buckets
#[derive(Debug, Clone)]
pub struct StorageManager {
    uploads_dir: PathBuf,
    outputs_dir: PathBuf,
    public_base_url: String,
}

impl StorageManager {
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            uploads_dir: config.uploads_dir.clone(),
            outputs_dir: config.outputs_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Directory backing `bucket`
    #[must_use]
    pub fn bucket_dir(&self, bucket: Bucket) -> &Path {
        match bucket {
            Bucket::Uploads => &self.uploads_dir,
            Bucket::Outputs => &self.outputs_dir,
        }
    }

    /// Public URL a stored file is served under
    #[must_use]
    pub fn public_url(&self, bucket: Bucket, filename: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket.route(), filename)
    }

    /// Create both bucket directories if missing
    ///
    /// # Errors
    /// - Directory creation failures
    pub async fn ensure_layout(&self) -> Result<()> {
        for bucket in [Bucket::Uploads, Bucket::Outputs] {
            let dir = self.bucket_dir(bucket);
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PhotoboothError::file_io_error("create bucket directory", dir, &e))?;
        }
        Ok(())
    }

    /// Persist `bytes` under a fresh token
    ///
    /// # Errors
    /// - `StorageWrite` on I/O failure
    pub async fn store(&self, bucket: Bucket, bytes: &[u8], suggested_name: &str) -> Result<String> {
        let name = sanitize_filename(suggested_name);
        loop {
            let filename = format!("{}_{name}", new_token());
            match self.write_new(bucket, &filename, bytes).await {
                Ok(()) => return Ok(filename),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(filename, "Token collision, retrying");
                },
                Err(e) => return Err(write_error(&filename, &e)),
            }
        }
    }

    /// Persist `bytes` as `<token>_<sanitized name>`
    ///
    /// Never overwrites an existing file.
    ///
    /// # Errors
    /// - `Validation` when `token` is not 8 hex characters
    /// - `StorageWrite` on I/O failure or when the name is taken
    pub async fn store_with_token(
        &self,
        bucket: Bucket,
        bytes: &[u8],
        token: &str,
        name: &str,
    ) -> Result<String> {
        if !is_token(token) {
            return Err(PhotoboothError::validation(format!(
                "Invalid file token '{token}'"
            )));
        }

        let filename = format!("{token}_{}", sanitize_filename(name));
        self.write_new(bucket, &filename, bytes)
            .await
            .map_err(|e| write_error(&filename, &e))?;
        Ok(filename)
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn write_new(&self, bucket: Bucket, filename: &str, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.bucket_dir(bucket).join(filename);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        debug!(path = %path.display(), "Stored file");
        Ok(())
    }

    /// Image files in `bucket`, newest first
    ///
    /// A missing bucket directory lists as empty.
    ///
    /// # Errors
    /// - Directory read failures
    pub async fn list(&self, bucket: Bucket) -> Result<Vec<StoredItem>> {
        let dir = self.bucket_dir(bucket);
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PhotoboothError::file_io_error("list bucket", dir, &e)),
        };

        let mut items = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PhotoboothError::file_io_error("list bucket", dir, &e))?
        {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if !OutputFormatHandler::is_allowed_image(&filename) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let modified_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            items.push(StoredItem {
                url: self.public_url(bucket, &filename),
                filename,
                modified_at,
            });
        }

        items.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(items)
    }

    /// Path of an existing file, or `None` for missing or unsafe names
    pub async fn resolve(&self, bucket: Bucket, filename: &str) -> Option<PathBuf> {
        if !is_stored_name(filename) {
            return None;
        }
        let path = self.bucket_dir(bucket).join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Some(path),
            _ => None,
        }
    }

    /// Read a stored file
    ///
    /// # Errors
    /// - I/O failures other than the file being absent
    pub async fn read(&self, bucket: Bucket, filename: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.resolve(bucket, filename).await else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PhotoboothError::file_io_error("read stored file", &path, &e)),
        }
    }

    /// Best-effort delete of `filenames`
    ///
    /// Each name is reduced to its basename. Missing files and names that are
    /// not valid stored names are skipped silently, so repeating a delete is
    /// harmless.
    #[instrument(skip(self, filenames), fields(requested = filenames.len()))]
    pub async fn delete(&self, bucket: Bucket, filenames: &[String]) -> DeleteReport {
        let mut report = DeleteReport::default();

        for requested in filenames {
            let filename = basename(requested).to_string();
            if !is_stored_name(&filename) {
                debug!(requested = %requested, "Skipping invalid name");
                continue;
            }
            let path = self.bucket_dir(bucket).join(&filename);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.deleted_count += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Delete failed");
                    report.errors.push(FileError {
                        filename,
                        error: e.kind().to_string(),
                    });
                },
            }
        }

        debug!(deleted = report.deleted_count, errors = report.errors.len(), "Bulk delete finished");
        report
    }

    /// Build a gzip-compressed tar of the named files
    ///
    /// Names that do not exist, or are not valid stored names, are skipped.
    ///
    /// # Errors
    /// - Archive construction or file read failures
    #[instrument(skip(self, filenames), fields(requested = filenames.len()))]
    pub async fn bulk_export(&self, bucket: Bucket, filenames: &[String]) -> Result<Vec<u8>> {
        let mut members = Vec::new();
        for requested in filenames {
            let filename = basename(requested).to_string();
            if !is_stored_name(&filename) {
                continue;
            }
            let path = self.bucket_dir(bucket).join(&filename);
            if matches!(tokio::fs::metadata(&path).await, Ok(m) if m.is_file()) {
                members.push((filename, path));
            }
        }
        debug!(members = members.len(), "Building export archive");

        tokio::task::spawn_blocking(move || build_archive(&members))
            .await
            .map_err(|e| PhotoboothError::internal(format!("Export task failed: {e}")))?
    }
}

fn write_error(filename: &str, error: &std::io::Error) -> PhotoboothError {
    warn!(filename, error = %error, "Storage write failed");
    if error.kind() == ErrorKind::AlreadyExists {
        PhotoboothError::storage_write(format!("{filename} already exists"))
    } else {
        PhotoboothError::storage_write(format!("could not write {filename}: {}", error.kind()))
    }
}

fn build_archive(members: &[(String, PathBuf)]) -> Result<Vec<u8>> {
    let mut archive_bytes = Vec::new();
    {
        let gz = flate2::write::GzEncoder::new(&mut archive_bytes, flate2::Compression::default());
        let mut tar = tar::Builder::new(gz);
        for (name, path) in members {
            tar.append_path_with_name(path, name)
                .map_err(|e| PhotoboothError::file_io_error("archive", path, &e))?;
        }
        tar.into_inner()?.finish()?;
    }
    Ok(archive_bytes)
}
