use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::naming;
use super::{PartFile, list_parts, not_found, root_name};
use crate::codec::codec_for_format;
use crate::domain::{ArchiveInfo, MergeReport};
use crate::error::{ParcelError, Result};
use crate::policy::{ArchiveFormat, ChunkPolicy};
use crate::util::hashing::{HashingWriter, digest_file};

/// Where the archive for a path lives on disk.
pub(crate) struct Located {
    pub format: ArchiveFormat,
    pub archive: PathBuf,
    pub parts: Vec<PartFile>,
    pub whole_present: bool,
}

/// Find `<path>.<ext>.part.*` or `<path>.<ext>`, trying zip before tar when
/// no format is given.
pub(crate) fn locate(path: &Path, format: Option<ArchiveFormat>) -> Result<Option<Located>> {
    let formats: Vec<ArchiveFormat> = match format {
        Some(f) => vec![f],
        None => ArchiveFormat::ALL.to_vec(),
    };
    for f in formats {
        let archive = naming::archive_path(path, f);
        let parts = list_parts(&archive)?;
        let whole_present = archive.is_file();
        if !parts.is_empty() || whole_present {
            return Ok(Some(Located {
                format: f,
                archive,
                parts,
                whole_present,
            }));
        }
    }
    Ok(None)
}

/// Reassemble `<path>.<ext>` from its parts if there are any, unpack it into
/// `path` (replacing what is there) and remove the archive and parts.
///
/// Parts are concatenated in file-name order after checking that their
/// suffixes form an unbroken run. The reassembled bytes are unpacked into a
/// staging directory first; parts and archive are only deleted once the
/// target has been swapped in, so a corrupt archive leaves the inputs as
/// they were.
pub fn maybe_merge_and_decompress(
    path: &Path,
    format: Option<ArchiveFormat>,
) -> Result<MergeReport> {
    let root = root_name(path)?;
    let Located {
        format,
        archive,
        parts,
        whole_present,
    } = locate(path, format)?.ok_or_else(|| {
        ParcelError::NotFound(naming::archive_path(path, format.unwrap_or(ArchiveFormat::Zip)))
    })?;
    let dir = naming::parent_dir(&archive);

    // Keeps a reassembled archive alive (and deleted on drop) until unpacked.
    let mut assembled: Option<NamedTempFile> = None;
    let (size, digest) = if parts.is_empty() {
        info!(archive = %archive.display(), "using whole archive");
        let (digest, size) = digest_file(&archive).map_err(|e| not_found(e, &archive))?;
        (size, digest)
    } else {
        let suffixes: Vec<&str> = parts.iter().map(|p| p.suffix.as_str()).collect();
        naming::validate_sequence(&suffixes)?;
        if whole_present {
            warn!(
                archive = %archive.display(),
                "whole archive sits next to parts; the parts win"
            );
        }
        info!(archive = %archive.display(), parts = parts.len(), "reassembling");
        let (tmp, size, digest) = concat_parts(&parts, dir)?;
        assembled = Some(tmp);
        (size, digest)
    };

    let source = match &assembled {
        Some(tmp) => tmp.reopen()?,
        None => File::open(&archive).map_err(|e| not_found(e, &archive))?,
    };

    let target: PathBuf = path.components().collect();
    let staging = tempfile::Builder::new()
        .prefix(".parcel-")
        .tempdir_in(naming::parent_dir(&target))?;
    let codec = codec_for_format(format, &ChunkPolicy::default());
    debug!(format = %codec.format(), staging = %staging.path().display(), "unpacking");
    let entries = codec.unpack(source, staging.path())?;

    let unpacked = staging.path().join(&root);
    if fs::symlink_metadata(&unpacked).is_err() {
        return Err(ParcelError::CorruptArchive(format!(
            "{} has no top-level entry named {root:?}",
            archive.display()
        )));
    }
    replace_path(&unpacked, &target)?;
    info!(target = %target.display(), entries, "unpacked");

    drop(assembled);
    for p in &parts {
        fs::remove_file(&p.path)?;
        debug!(part = %p.path.display(), "part removed");
    }
    if whole_present {
        fs::remove_file(&archive)?;
    }

    Ok(MergeReport {
        target,
        archive: ArchiveInfo {
            path: archive,
            format,
            size,
            digest: digest.to_hex().to_string(),
        },
        parts: parts.len(),
        entries,
    })
}

/// Concatenate `parts` in order into a temporary file inside `dir`.
pub(crate) fn concat_parts(
    parts: &[PartFile],
    dir: &Path,
) -> Result<(NamedTempFile, u64, blake3::Hash)> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut hasher = blake3::Hasher::new();
    let size = {
        let mut w = HashingWriter::new(BufWriter::new(tmp.as_file_mut()), &mut hasher);
        for p in parts {
            let mut f = File::open(&p.path)?;
            let n = std::io::copy(&mut f, &mut w)?;
            debug!(part = %p.path.display(), len = n, "part appended");
        }
        w.flush()?;
        w.counted
    };
    tmp.as_file().sync_all()?;
    Ok((tmp, size, hasher.finalize()))
}

/// Move `from` onto `to`, removing whatever `to` was before.
fn replace_path(from: &Path, to: &Path) -> Result<()> {
    match fs::symlink_metadata(to) {
        Ok(md) if md.is_dir() => {
            warn!(target = %to.display(), "replacing existing directory");
            fs::remove_dir_all(to)?;
        }
        Ok(_) => {
            warn!(target = %to.display(), "replacing existing file");
            fs::remove_file(to)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::rename(from, to)?;
    Ok(())
}
