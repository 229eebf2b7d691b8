use std::path::Path;

use super::merge::{Located, locate};
use super::naming::{self, SuffixScheme};
use crate::domain::{ArchiveStatus, ChunkInfo};
use crate::error::Result;
use crate::policy::ArchiveFormat;

/// Describe what is on disk for `path` without touching anything.
pub fn status(path: &Path, format: Option<ArchiveFormat>) -> Result<ArchiveStatus> {
    let Some(Located {
        format,
        archive,
        parts,
        whole_present,
    }) = locate(path, format)?
    else {
        return Ok(ArchiveStatus::Missing {
            path: path.to_path_buf(),
        });
    };

    if parts.is_empty() {
        let size = std::fs::metadata(&archive)?.len();
        return Ok(ArchiveStatus::Whole {
            path: archive,
            format,
            size,
        });
    }

    let suffixes: Vec<&str> = parts.iter().map(|p| p.suffix.as_str()).collect();
    let problem = naming::validate_sequence(&suffixes)
        .err()
        .map(|e| e.to_string());
    let indices = SuffixScheme::detect(&suffixes).ok().map(|(_, ix)| ix);

    let total = parts.iter().map(|p| p.len).sum();
    let chunks = parts
        .into_iter()
        .enumerate()
        .map(|(pos, p)| ChunkInfo {
            index: indices.as_ref().map_or(pos as u64, |ix| ix[pos]),
            path: p.path,
            suffix: p.suffix,
            len: p.len,
        })
        .collect();

    Ok(ArchiveStatus::Split {
        archive,
        format,
        chunks,
        total,
        problem,
        whole_present,
    })
}
