use std::fs::{File, Metadata};
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{ParcelError, Result};
use crate::policy::{ArchiveFormat, ChunkPolicy};

pub mod tarc;
pub mod zipc;

/// Container format that turns a filesystem subtree into one archive file
/// and back.
pub trait ArchiveCodec: Send + Sync {
    fn format(&self) -> ArchiveFormat;

    /// Write `src` into `out` with every entry rooted at `root_name`, so the
    /// archive unpacks to `<dest>/<root_name>`.
    fn pack(&self, src: &Path, root_name: &str, out: File) -> Result<PackStats>;

    /// Unpack `archive` into the existing directory `dest`. Returns the
    /// number of entries written.
    fn unpack(&self, archive: File, dest: &Path) -> Result<u64>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PackStats {
    pub files: u64,
    pub dirs: u64,
    pub skipped: u64,
    /// Uncompressed bytes read from regular files.
    pub input_bytes: u64,
}

pub fn codec_for(policy: &ChunkPolicy) -> Box<dyn ArchiveCodec> {
    codec_for_format(policy.format, policy)
}

pub fn codec_for_format(format: ArchiveFormat, policy: &ChunkPolicy) -> Box<dyn ArchiveCodec> {
    match format {
        ArchiveFormat::Zip => Box::new(zipc::ZipCodec {
            compression: policy.compression,
            level: policy.level,
        }),
        ArchiveFormat::Tar => Box::new(tarc::TarCodec),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Dir,
    File,
    Symlink,
}

pub(crate) struct SourceEntry {
    pub path: PathBuf,
    /// `/`-separated name inside the archive, starting with the root name.
    pub name: String,
    pub kind: EntryKind,
    pub meta: Metadata,
}

/// Walk `src` in a stable (file-name sorted) order without following links.
pub(crate) fn walk_source(src: &Path, root_name: &str) -> Result<Vec<SourceEntry>> {
    let mut out = Vec::new();
    for e in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let e = e.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let rel = e
            .path()
            .strip_prefix(src)
            .map_err(|e| ParcelError::Format(format!("walk escaped source root: {e}")))?;
        let mut name = root_name.to_string();
        for c in rel.components() {
            let part = c.as_os_str().to_str().ok_or_else(|| {
                ParcelError::Format(format!("path is not valid UTF-8: {}", e.path().display()))
            })?;
            name.push('/');
            name.push_str(part);
        }
        let ft = e.file_type();
        let kind = if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else if ft.is_symlink() {
            EntryKind::Symlink
        } else {
            tracing::warn!(path = %e.path().display(), "skipping special file");
            continue;
        };
        let meta = e
            .metadata()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        out.push(SourceEntry {
            path: e.path().to_path_buf(),
            name,
            kind,
            meta,
        });
    }
    Ok(out)
}

pub(crate) fn mode_from(_md: &Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        _md.permissions().mode()
    }
    #[cfg(not(unix))]
    {
        if _md.is_dir() { 0o755 } else { 0o644 }
    }
}

/// Errors raised while reading an archive mean the bytes are bad, unless the
/// filesystem we are writing into is the one refusing.
pub(crate) fn unpack_error(e: std::io::Error) -> ParcelError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::PermissionDenied | ErrorKind::StorageFull | ErrorKind::ReadOnlyFilesystem => {
            ParcelError::Io(e)
        }
        _ => ParcelError::CorruptArchive(e.to_string()),
    }
}
