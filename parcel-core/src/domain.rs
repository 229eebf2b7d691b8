use std::path::PathBuf;

use serde::Serialize;

use crate::codec::PackStats;
use crate::policy::ArchiveFormat;

/// One archive file, whole or as reassembled from its parts.
#[derive(Clone, Debug, Serialize)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub format: ArchiveFormat,
    pub size: u64,
    /// BLAKE3 of the archive bytes, hex.
    pub digest: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChunkInfo {
    pub path: PathBuf,
    pub index: u64,
    pub suffix: String,
    pub len: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SplitReport {
    pub source: PathBuf,
    pub archive: ArchiveInfo,
    /// Empty when the archive was kept whole.
    pub chunks: Vec<ChunkInfo>,
    pub stats: PackStats,
}

impl SplitReport {
    pub fn was_split(&self) -> bool {
        !self.chunks.is_empty()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MergeReport {
    pub target: PathBuf,
    pub archive: ArchiveInfo,
    /// Number of parts concatenated; 0 for a whole archive.
    pub parts: usize,
    /// Entries written while unpacking.
    pub entries: u64,
}

/// What currently sits on disk for a path.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ArchiveStatus {
    Missing {
        path: PathBuf,
    },
    Whole {
        path: PathBuf,
        format: ArchiveFormat,
        size: u64,
    },
    Split {
        archive: PathBuf,
        format: ArchiveFormat,
        chunks: Vec<ChunkInfo>,
        total: u64,
        /// Reason the part sequence cannot be merged, if any.
        problem: Option<String>,
        /// A whole archive sits next to the parts.
        whole_present: bool,
    },
}
