use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ParcelError, Result};

pub mod merge;
pub mod naming;
pub mod split;
pub mod status;

/// A `<archive>.part.<suffix>` file found on disk.
#[derive(Clone, Debug)]
pub(crate) struct PartFile {
    pub path: PathBuf,
    pub suffix: String,
    pub len: u64,
}

/// Parts of `archive` in file-name (byte) order, which is reassembly order.
pub(crate) fn list_parts(archive: &Path) -> Result<Vec<PartFile>> {
    let prefix = naming::chunk_prefix(archive)?;
    let dir = naming::parent_dir(archive);
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut parts = Vec::new();
    for de in rd {
        let de = de?;
        let name = de.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(suffix) = name.strip_prefix(prefix.as_str()) else {
            continue;
        };
        if suffix.is_empty() || !de.file_type()?.is_file() {
            continue;
        }
        parts.push(PartFile {
            path: naming::chunk_path(archive, suffix),
            suffix: suffix.to_string(),
            len: de.metadata()?.len(),
        });
    }
    parts.sort_by(|a, b| a.suffix.cmp(&b.suffix));
    Ok(parts)
}

/// Base name entries are stored under: the last component of `path`.
pub(crate) fn root_name(path: &Path) -> Result<String> {
    let normalized: PathBuf = path.components().collect();
    normalized
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ParcelError::Config(format!(
                "{} has no usable file name to archive under",
                path.display()
            ))
        })
}

pub(crate) fn not_found(e: std::io::Error, path: &Path) -> ParcelError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ParcelError::NotFound(path.to_path_buf()),
        _ => e.into(),
    }
}
