use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{OtfsError, VerificationFailure};

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<usize, OtfsError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| OtfsError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(corrupt)?;

    let mut written = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(corrupt)?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(OtfsError::Filesystem(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| OtfsError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| OtfsError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| OtfsError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| OtfsError::Filesystem(err.to_string()))?;
        written += 1;
    }
    Ok(written)
}

/// Reads every entry through the decompressor so CRC mismatches surface without touching disk.
pub fn validate_zip(zip_path: &Path) -> Result<usize, OtfsError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| OtfsError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(corrupt)?;
    if archive.len() == 0 {
        return Err(VerificationFailure::CorruptArchive("archive has no entries".to_string()).into());
    }

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(corrupt)?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| VerificationFailure::CorruptArchive(format!("{}: {err}", entry.name())))?;
    }
    Ok(archive.len())
}

pub fn count_files(root: &Path) -> Result<usize, OtfsError> {
    Ok(walk_dir(root)?.iter().filter(|path| path.is_file()).count())
}

pub fn remove_dir_if_exists(path: &Path) -> Result<(), OtfsError> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|err| OtfsError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

pub fn atomic_rename_dir(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(from, to)
}

fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, OtfsError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(|err| OtfsError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| OtfsError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    Ok(items)
}

fn corrupt(err: zip::result::ZipError) -> OtfsError {
    VerificationFailure::CorruptArchive(err.to_string()).into()
}
