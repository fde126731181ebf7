use crate::domain::model::StagedFile;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_flat_file_name;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Flat local directory holding one file per source name.
///
/// A scoped area lives in a temporary directory that is removed when the handle
/// is dropped or closed. A persistent area survives the process so stages run
/// by separate invocations can share it.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    scope: Option<TempDir>,
}

impl StagingArea {
    pub fn scoped() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("github-csv-etl-")
            .tempdir()?;
        tracing::debug!("Created scoped staging area at {}", dir.path().display());
        Ok(Self {
            root: dir.path().to_path_buf(),
            scope: Some(dir),
        })
    }

    pub fn persistent(dir: impl Into<PathBuf>) -> Result<Self> {
        let root = dir.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, scope: None })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Local path for `name`; rejects names that would escape the directory.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_flat_file_name("file name", name)?;
        Ok(self.root.join(name))
    }

    /// Writes `data` for `name`, replacing whatever was staged before.
    pub fn write(&self, name: &str, data: Vec<u8>) -> Result<StagedFile> {
        let local_path = self.path_for(name)?;
        fs::write(&local_path, &data)?;
        Ok(StagedFile {
            name: name.to_string(),
            local_path,
            content: data,
        })
    }

    pub fn read(&self, name: &str) -> Result<StagedFile> {
        let local_path = self.path_for(name)?;
        let content = fs::read(&local_path)?;
        Ok(StagedFile {
            name: name.to_string(),
            local_path,
            content,
        })
    }

    /// Deletes the staged copy of `name`. Returns whether there was one.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let local_path = self.path_for(name)?;
        match fs::remove_file(&local_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes staged `.csv` files whose name is not in `keep`, returning what was removed.
    pub fn prune(&self, keep: &[&str]) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.staged_csv_files()? {
            if !keep.contains(&name.as_str()) && self.remove(&name)? {
                removed.push(name);
            }
        }
        Ok(removed)
    }

    /// Names of staged `.csv` files, sorted.
    pub fn staged_csv_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.to_ascii_lowercase().ends_with(".csv") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Releases the area. Scoped areas are deleted; persistent ones are left alone.
    pub fn close(self) -> Result<()> {
        match self.scope {
            Some(dir) => dir.close().map_err(EtlError::IoError),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_overwrites_previous_content() {
        let staging = StagingArea::scoped().unwrap();

        staging.write("a.csv", b"old".to_vec()).unwrap();
        let staged = staging.write("a.csv", b"new".to_vec()).unwrap();

        assert_eq!(fs::read(&staged.local_path).unwrap(), b"new");
        assert_eq!(staging.read("a.csv").unwrap().content, b"new");
        assert_eq!(staging.staged_csv_files().unwrap(), vec!["a.csv"]);
    }

    #[test]
    fn test_rejects_names_outside_area() {
        let staging = StagingArea::scoped().unwrap();
        assert!(staging.write("../escape.csv", b"x".to_vec()).is_err());
        assert!(staging.path_for("nested/a.csv").is_err());
    }

    #[test]
    fn test_remove_and_prune() {
        let staging = StagingArea::scoped().unwrap();
        for name in ["a.csv", "b.csv", "c.csv", "notes.txt"] {
            staging.write(name, b"x".to_vec()).unwrap();
        }

        assert!(staging.remove("a.csv").unwrap());
        assert!(!staging.remove("a.csv").unwrap());

        let removed = staging.prune(&["c.csv"]).unwrap();
        assert_eq!(removed, vec!["b.csv"]);
        assert_eq!(staging.staged_csv_files().unwrap(), vec!["c.csv"]);
        assert!(staging.path().join("notes.txt").exists());
    }

    #[test]
    fn test_scoped_area_removed_on_close() {
        let staging = StagingArea::scoped().unwrap();
        let root = staging.path().to_path_buf();
        staging.write("a.csv", b"x".to_vec()).unwrap();

        staging.close().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_persistent_area_survives_close() {
        let parent = TempDir::new().unwrap();
        let dir = parent.path().join("staging");
        let staging = StagingArea::persistent(&dir).unwrap();
        staging.write("b.CSV", b"x".to_vec()).unwrap();
        staging.write("notes.txt", b"x".to_vec()).unwrap();

        assert_eq!(staging.staged_csv_files().unwrap(), vec!["b.CSV"]);
        staging.close().unwrap();
        assert!(dir.join("b.CSV").exists());
    }
}
