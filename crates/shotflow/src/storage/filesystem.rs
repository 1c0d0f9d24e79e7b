use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, Utc};

use super::ArtifactStorage;
use crate::error::StorageError;

/// Stores artifacts under a local directory that is served at `public_base_url`.
///
/// Files land in `YYYY/MM/` subdirectories.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root_directory: PathBuf,
    public_base_url: String,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root_directory: P, public_base_url: &str) -> Self {
        Self {
            root_directory: root_directory.as_ref().to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Writes `content` and returns the path relative to the root directory.
    pub fn store(&self, content: &[u8], filename: &str) -> Result<PathBuf, StorageError> {
        let now = Utc::now();
        let relative_directory = PathBuf::from(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()));

        let dir_path = self.root_directory.join(&relative_directory);
        ensure_directory(&dir_path)?;

        let stored_name = store_with_atomic_creation(&dir_path, filename, content)?;

        Ok(relative_directory.join(stored_name))
    }

    fn public_url(&self, relative: &Path) -> String {
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("{}/{}", self.public_base_url, parts.join("/"))
    }
}

#[async_trait]
impl ArtifactStorage for FileStorage {
    async fn upload(
        &self,
        content: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let storage = self.clone();
        let name = sanitize_filename(filename);
        let relative = tokio::task::spawn_blocking(move || storage.store(&content, &name))
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))??;

        let url = self.public_url(&relative);
        log::debug!("Stored {} artifact at {}", content_type, url);
        Ok(url)
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Creates the file with `create_new`, appending `_N` to the stem on conflict.
/// Returns the file name that was actually written.
fn store_with_atomic_creation(
    dir_path: &Path,
    filename: &str,
    content: &[u8],
) -> Result<String, StorageError> {
    use std::io::Write;

    let (base, ext) = match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    };

    for counter in 1..=1000 {
        let try_filename = if counter == 1 {
            filename.to_string()
        } else {
            match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            }
        };

        let try_path = dir_path.join(&try_filename);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&try_path)
        {
            Ok(mut file) => {
                file.write_all(content)
                    .map_err(|e| StorageError::WriteFile {
                        path: try_path.clone(),
                        source: e,
                    })?;
                return Ok(try_filename);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(StorageError::WriteFile {
                    path: try_path,
                    source: e,
                });
            }
        }
    }

    Err(StorageError::FileExists(dir_path.join(filename)))
}

/// Keeps only characters that are safe in a URL path segment.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}
