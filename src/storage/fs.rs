//! Filesystem-backed blob store.
//!
//! Blobs are plain files under a base directory; the optional path becomes a
//! directory hierarchy. Writes are staged through a temp file in the target
//! directory and renamed into place, so a crash mid-write never leaves a
//! partially written key or certificate behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::BlobStore;
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `base_path`, creating the directory if needed.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)
            .map_err(|e| Error::io(e, format!("create store directory {}", base_path.display())))?;
        Ok(Self { base_path })
    }

    fn dir_for(&self, path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(rel) => {
                validate_segments(rel)?;
                Ok(self.base_path.join(rel))
            }
            None => Ok(self.base_path.clone()),
        }
    }

    fn file_for(&self, name: &str, path: Option<&str>) -> Result<PathBuf> {
        validate_segments(name)?;
        Ok(self.dir_for(path)?.join(name))
    }
}

/// Store names come from URL path parameters; refuse anything that could
/// escape the base directory.
fn validate_segments(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation("store path cannot be empty"));
    }
    for segment in value.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(Error::validation(format!("invalid store path '{}'", value)));
        }
    }
    Ok(())
}

impl BlobStore for FileStore {
    fn write(&self, name: &str, value: &[u8], path: Option<&str>) -> Result<()> {
        let dir = self.dir_for(path)?;
        fs::create_dir_all(&dir)
            .map_err(|e| Error::io(e, format!("create directory {}", dir.display())))?;

        let target = dir.join(name);
        let mut staged = NamedTempFile::new_in(&dir)
            .map_err(|e| Error::io(e, format!("stage write in {}", dir.display())))?;
        staged
            .write_all(value)
            .map_err(|e| Error::io(e, format!("write blob {}", target.display())))?;
        staged
            .persist(&target)
            .map_err(|e| Error::io(e.error, format!("persist blob {}", target.display())))?;
        Ok(())
    }

    fn read(&self, name: &str, path: Option<&str>) -> Result<Vec<u8>> {
        let file = self.file_for(name, path)?;
        if !file.is_file() {
            return Err(Error::not_found(format!("{} not found", name)));
        }
        fs::read(&file).map_err(|e| Error::io(e, format!("read blob {}", file.display())))
    }

    fn exists(&self, name: &str, path: Option<&str>) -> bool {
        self.file_for(name, path).map(|file| file.is_file()).unwrap_or(false)
    }

    fn delete(&self, name: &str, path: Option<&str>) -> Result<()> {
        let target = self.file_for(name, path)?;
        if target.is_dir() {
            fs::remove_dir_all(&target)
                .map_err(|e| Error::io(e, format!("delete subtree {}", target.display())))
        } else if target.is_file() {
            fs::remove_file(&target)
                .map_err(|e| Error::io(e, format!("delete blob {}", target.display())))
        } else {
            Err(Error::not_found(format!("{} not found", name)))
        }
    }

    fn list(&self, path: Option<&str>) -> Result<Vec<String>> {
        let dir = self.dir_for(path)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let entries = fs::read_dir(&dir)
            .map_err(|e| Error::io(e, format!("list directory {}", dir.display())))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::io(e, format!("list directory {}", dir.display())))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl FileStore {
    /// Base directory of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path().join("blobs")).expect("open store");
        (dir, store)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (_dir, store) = store();
        store.write("private", b"key-bytes", Some("myca")).unwrap();

        assert!(store.exists("private", Some("myca")));
        assert_eq!(store.read("private", Some("myca")).unwrap(), b"key-bytes");
    }

    #[test]
    fn test_write_replaces_existing_blob() {
        let (_dir, store) = store();
        store.write("cert", b"first", None).unwrap();
        store.write("cert", b"second", None).unwrap();

        assert_eq!(store.read("cert", None).unwrap(), b"second");
    }

    #[test]
    fn test_read_missing_blob_is_not_found() {
        let (_dir, store) = store();
        let err = store.read("nope", None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_delete_subtree() {
        let (_dir, store) = store();
        store.write("private", b"k", Some("myca")).unwrap();
        store.write("parent", b"root", Some("myca")).unwrap();

        store.delete("myca", None).unwrap();
        assert!(!store.exists("private", Some("myca")));
        assert!(!store.exists("parent", Some("myca")));
    }

    #[test]
    fn test_list_is_sorted() {
        let (_dir, store) = store();
        store.write("b", b"2", Some("roles/ca1")).unwrap();
        store.write("a", b"1", Some("roles/ca1")).unwrap();

        assert_eq!(store.list(Some("roles/ca1")).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_list_missing_path_is_empty() {
        let (_dir, store) = store();
        assert!(store.list(Some("roles/none")).unwrap().is_empty());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let (_dir, store) = store();
        assert!(store.write("x", b"v", Some("../escape")).is_err());
        assert!(store.read("..", None).is_err());
        assert!(!store.exists("a/../../b", None));
    }
}
