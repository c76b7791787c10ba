//! Screenshot output directory

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::HarnessResult;
use crate::flow::ERROR_ARTIFACT_PREFIX;

/// Directory holding the screenshots of a run
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating the directory if absent
    pub fn open(dir: impl Into<PathBuf>) -> HarnessResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<name>.png`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.png", name))
    }

    /// `<dir>/error_<checkpoint>.png`
    pub fn error_path(&self, checkpoint: &str) -> PathBuf {
        self.path_for(&format!("{}{}", ERROR_ARTIFACT_PREFIX, checkpoint))
    }

    /// SHA-256 of a written artifact
    pub fn digest(&self, path: &Path) -> HarnessResult<String> {
        let data = std::fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        Ok(hex::encode(hasher.finalize()))
    }

    /// PNG names currently in the store, sorted
    pub fn list(&self) -> HarnessResult<Vec<String>> {
        let mut names = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(name) = path.file_name() {
                    names.push(name.to_string_lossy().to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("nested/screenshots")).unwrap();
        assert!(store.dir().is_dir());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_paths_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        assert!(store.path_for("qa_list").ends_with("qa_list.png"));
        assert!(store.error_path("qa_list").ends_with("error_qa_list.png"));

        std::fs::write(store.path_for("a"), b"abc").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        assert_eq!(
            store.digest(&store.path_for("a")).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(store.list().unwrap(), vec!["a.png"]);
    }
}
