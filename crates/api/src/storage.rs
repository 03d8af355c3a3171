use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

pub const UPLOADS_ROUTE: &str = "/uploads";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Flat directory of uploaded files served under [`UPLOADS_ROUTE`].
#[derive(Debug, Clone)]
pub struct UploadStore {
  root: PathBuf,
}

impl UploadStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Stores `bytes` as `{owner}_{file_name}` and returns its public URL.
  pub async fn save(&self, owner: &str, file_name: &str, bytes: &[u8]) -> ApiResult<String> {
    if bytes.is_empty() {
      return Err(ApiError::InvalidInput("Uploaded file is empty".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
      return Err(ApiError::InvalidInput(format!(
        "File size must be less than {}MB",
        MAX_UPLOAD_BYTES / 1024 / 1024
      )));
    }

    let stored_name = format!("{}_{}", owner, sanitize_file_name(file_name));

    fs::create_dir_all(&self.root).await?;
    fs::write(self.root.join(&stored_name), bytes).await?;

    debug!("Stored upload {} ({} bytes)", stored_name, bytes.len());

    Ok(format!("{UPLOADS_ROUTE}/{stored_name}"))
  }

  /// Content behind a URL returned by [`UploadStore::save`]. `None` when it no longer exists.
  pub async fn read(&self, url: &str) -> ApiResult<Option<Vec<u8>>> {
    let Some(stored_name) = url
      .strip_prefix(UPLOADS_ROUTE)
      .and_then(|rest| rest.strip_prefix('/'))
      .filter(|name| sanitize_file_name(name) == *name)
    else {
      return Err(ApiError::InvalidInput(format!("`{url}` is not an uploaded file")));
    };

    match fs::read(self.root.join(stored_name)).await {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}

// Keeps the last path component and replaces anything outside [A-Za-z0-9._-].
fn sanitize_file_name(file_name: &str) -> String {
  let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();

  let cleaned: String = base
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();

  let cleaned = cleaned.trim_start_matches('.');
  if cleaned.is_empty() {
    "upload".to_string()
  } else {
    cleaned.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sanitize_file_name() {
    assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
    assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
    assert_eq!(sanitize_file_name("C:\\docs\\my cv.pdf"), "my_cv.pdf");
    assert_eq!(sanitize_file_name(".."), "upload");
    assert_eq!(sanitize_file_name(""), "upload");
  }

  #[tokio::test]
  async fn test_save_writes_file_and_returns_url() {
    let dir = tempfile::tempdir().unwrap();
    let store = UploadStore::new(dir.path().join("uploads"));

    let url = store.save("task-1", "evidence.png", b"png").await.unwrap();

    assert_eq!(url, "/uploads/task-1_evidence.png");
    assert_eq!(
      std::fs::read(dir.path().join("uploads/task-1_evidence.png")).unwrap(),
      b"png"
    );
  }

  #[tokio::test]
  async fn test_read_back_saved_upload() {
    let dir = tempfile::tempdir().unwrap();
    let store = UploadStore::new(dir.path());

    let url = store.save("user-1", "cv.txt", b"rust, sql").await.unwrap();

    assert_eq!(store.read(&url).await.unwrap(), Some(b"rust, sql".to_vec()));
    assert_eq!(store.read("/uploads/user-1_gone.txt").await.unwrap(), None);
    assert!(store.read("/uploads/../secrets").await.is_err());
  }

  #[tokio::test]
  async fn test_oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = UploadStore::new(dir.path());
    let bytes = vec![0u8; MAX_UPLOAD_BYTES + 1];

    let err = store.save("task-1", "big.bin", &bytes).await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidInput(_)));
  }
}
