use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::error::OtfsError;

/// Local scratch area: the downloaded archive and its extraction live here between runs.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    pub fn new() -> Result<Self, OtfsError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.cache_dir().join("otfs-provision")).ok()
            })
            .ok_or_else(|| {
                OtfsError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn archive_path(&self) -> Utf8PathBuf {
        self.root.join("download").join("dataset.zip")
    }

    pub fn extract_dir(&self) -> Utf8PathBuf {
        self.root.join("extract")
    }

    pub fn ensure_root(&self) -> Result<(), OtfsError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| OtfsError::Filesystem(format!("{}: {err}", self.root)))?;
        let probe = tempfile::Builder::new()
            .prefix(".otfs-write-check")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| OtfsError::Filesystem(format!("{} is not writable: {err}", self.root)))?;
        drop(probe);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let workspace = Workspace::new_with_root(Utf8PathBuf::from("/tmp/otfs"));
        assert!(workspace.archive_path().ends_with("download/dataset.zip"));
        assert_eq!(workspace.extract_dir(), Utf8PathBuf::from("/tmp/otfs/extract"));
    }

    #[test]
    fn ensure_root_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("nested/work")).unwrap();
        let workspace = Workspace::new_with_root(root.clone());
        workspace.ensure_root().unwrap();
        assert!(root.as_std_path().is_dir());
    }
}
