use crate::core::path::flat_name;
use crate::core::{XpmError, XpmResult};
use crate::repository::DistKind;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tar::Archive;
use walkdir::WalkDir;

/// Files unpacked for one package, ready to be moved into place
#[derive(Debug, Clone)]
pub struct StagedPackage {
    /// Scratch directory owning everything below; removed after placement
    pub stage_dir: PathBuf,
    /// Directory that becomes `vendor/<name>`
    pub root: PathBuf,
}

impl StagedPackage {
    pub fn discard(&self) {
        let _ = fs::remove_dir_all(&self.stage_dir); // Ignore cleanup errors
    }
}

/// Unpacks package archives (tar.gz, zip) into a staging area
pub struct PackageExtractor {
    staging_root: PathBuf,
}

impl PackageExtractor {
    pub fn new(staging_root: PathBuf) -> Self {
        Self { staging_root }
    }

    /// Fresh, empty stage directory for a package
    fn prepare(&self, package: &str) -> XpmResult<PathBuf> {
        let stage_dir = self.staging_root.join(flat_name(package));
        if stage_dir.exists() {
            fs::remove_dir_all(&stage_dir)?;
        }
        fs::create_dir_all(stage_dir.join("content"))?;
        Ok(stage_dir)
    }

    /// Unpack archive bytes
    ///
    /// An archive whose entries all sit below one top-level directory has
    /// that directory stripped.
    pub fn extract(&self, package: &str, kind: DistKind, bytes: &[u8]) -> XpmResult<StagedPackage> {
        let stage_dir = self.prepare(package)?;
        let content = stage_dir.join("content");

        let result = match kind {
            DistKind::Tar => Archive::new(GzDecoder::new(Cursor::new(bytes)))
                .unpack(&content)
                .map_err(|e| XpmError::Package(format!("Invalid tar.gz archive: {}", e))),
            DistKind::Zip => zip::ZipArchive::new(Cursor::new(bytes))
                .and_then(|mut archive| archive.extract(&content))
                .map_err(|e| XpmError::Package(format!("Invalid zip archive: {}", e))),
            DistKind::Path => Err(XpmError::Package(
                "Path dists are copied, not extracted".to_string(),
            )),
        };

        let staged = result.and_then(|_| {
            Ok(StagedPackage {
                root: single_root(&content)?,
                stage_dir: stage_dir.clone(),
            })
        });
        if staged.is_err() {
            let _ = fs::remove_dir_all(&stage_dir); // Ignore cleanup errors
        }
        staged
    }

    /// Copy a local package directory into the staging area
    pub fn copy_dir(&self, package: &str, source: &Path) -> XpmResult<StagedPackage> {
        let stage_dir = self.prepare(package)?;
        let content = stage_dir.join("content");

        let result = copy_tree(source, &content);
        if let Err(e) = result {
            let _ = fs::remove_dir_all(&stage_dir); // Ignore cleanup errors
            return Err(e);
        }
        Ok(StagedPackage {
            root: content,
            stage_dir,
        })
    }
}

fn single_root(content: &Path) -> XpmResult<PathBuf> {
    let entries: Vec<PathBuf> = fs::read_dir(content)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    match entries.as_slice() {
        [] => Err(XpmError::Package("Archive is empty".to_string())),
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(content.to_path_buf()),
    }
}

fn copy_tree(source: &Path, dest: &Path) -> XpmResult<()> {
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| XpmError::Path(e.to_string()))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
        } else {
            tracing::debug!("Skipping {}", entry.path().display());
        }
    }
    Ok(())
}
