use crate::error::StorageError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Keeps uploaded files on the local filesystem under `root/documents`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn save(
        &self,
        document_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let name = sanitize_file_name(filename)?;
        let directory = self.root.join("documents");
        fs::create_dir_all(&directory).await?;

        let path = directory.join(format!("{document_id}_{name}"));
        fs::write(&path, data).await?;
        Ok(path)
    }

    /// Returns `false` when the file was already gone.
    pub async fn delete(&self, path: &Path) -> Result<bool, StorageError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(StorageError::Io(error)),
        }
    }
}

// Keeps only the final path component so a client-supplied name cannot
// escape the storage root.
fn sanitize_file_name(filename: &str) -> Result<String, StorageError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidName(filename.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_then_delete() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let store = LocalFileStore::new(dir.path());

        let path = store.save("doc-1", "manual.pdf", b"%PDF-1.4").await?;

        assert!(path.ends_with("documents/doc-1_manual.pdf"));
        assert_eq!(std::fs::read(&path)?, b"%PDF-1.4");
        assert!(store.delete(&path).await?);
        assert!(!store.delete(&path).await?);
        Ok(())
    }

    #[tokio::test]
    async fn client_paths_are_flattened() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let store = LocalFileStore::new(dir.path());

        let path = store.save("doc-2", "../../etc/passwd.pdf", b"x").await?;

        assert!(path.starts_with(dir.path().join("documents")));
        assert!(path.ends_with("doc-2_passwd.pdf"));
        Ok(())
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(sanitize_file_name("uploads/").is_err());
        assert!(sanitize_file_name("..").is_err());
    }
}
