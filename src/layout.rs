use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::config::DatasetLayout;
use crate::domain::{DownloadArtifact, ExtractedTree};
use crate::error::{LayoutFailure, OtfsError};
use crate::fs_util;

/// Extracts a verified archive into `scratch` and reshapes it so that
/// `<canonical_parent>/<dataset_dir>` holds the dataset.
///
/// Archives sometimes ship the dataset folder without its enclosing parent; that case is moved
/// into place. Any other shape is rejected rather than guessed at.
pub fn normalize(
    artifact: &DownloadArtifact,
    scratch: &Utf8Path,
    layout: &DatasetLayout,
) -> Result<ExtractedTree, OtfsError> {
    if !artifact.verified {
        return Err(OtfsError::Filesystem(format!(
            "refusing to extract unverified archive {}",
            artifact.local_path
        )));
    }

    fs_util::remove_dir_if_exists(scratch.as_std_path())?;
    fs::create_dir_all(scratch.as_std_path())
        .map_err(|err| OtfsError::Filesystem(err.to_string()))?;
    let files = fs_util::extract_zip(artifact.local_path.as_std_path(), scratch.as_std_path())?;
    info!(files, dir = %scratch, "archive extracted");

    let tree = canonicalize(scratch, layout)?;
    check_required(&tree, layout)?;
    Ok(tree)
}

pub fn canonicalize(root: &Utf8Path, layout: &DatasetLayout) -> Result<ExtractedTree, OtfsError> {
    let canonical_subpath = Utf8PathBuf::from(&layout.canonical_parent).join(&layout.dataset_dir);
    let canonical = root.join(&canonical_subpath);
    let tree = ExtractedTree {
        root_path: root.to_path_buf(),
        canonical_subpath: canonical_subpath.clone(),
    };

    if canonical.as_std_path().is_dir() {
        return Ok(tree);
    }

    let inner = root.join(&layout.dataset_dir);
    if inner.as_std_path().is_dir() {
        info!(from = %inner, to = %canonical, "moving dataset under canonical parent");
        fs_util::atomic_rename_dir(inner.as_std_path(), canonical.as_std_path())
            .map_err(|err| OtfsError::Filesystem(err.to_string()))?;
        return Ok(tree);
    }

    Err(LayoutFailure::CanonicalRootMissing {
        expected: canonical_subpath.to_string(),
        inner: layout.dataset_dir.clone(),
    }
    .into())
}

pub fn check_required(tree: &ExtractedTree, layout: &DatasetLayout) -> Result<(), OtfsError> {
    let canonical = tree.canonical_root();
    for name in &layout.required_subdirs {
        let dir = canonical.join(name);
        if !dir.as_std_path().is_dir() {
            return Err(LayoutFailure::MissingSubdirectory(dir.into_std_path_buf()).into());
        }
        if fs_util::count_files(dir.as_std_path())? == 0 {
            return Err(LayoutFailure::EmptySubdirectory(dir.into_std_path_buf()).into());
        }
    }
    Ok(())
}
