use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, warn};

use super::naming::{self, SuffixScheme};
use super::{PartFile, list_parts, not_found, root_name};
use crate::codec::codec_for;
use crate::domain::{ArchiveInfo, ChunkInfo, SplitReport};
use crate::error::{ParcelError, Result};
use crate::policy::ChunkPolicy;
use crate::util::hashing::{HashingReader, digest_file};

/// Compress `path` into `<path>.<ext>` and, when the result is larger than
/// the policy threshold, replace it with `<path>.<ext>.part.*` files of
/// exactly `threshold` bytes (the last one may be shorter).
///
/// The archive is packed into a temporary file in the destination directory
/// and either persisted whole or cut into staged parts that are renamed into
/// place together. Parts or a whole archive from an earlier run are removed
/// only once the new output is in place, so a failure leaves the previous
/// state as it was.
pub fn compress_and_maybe_split(path: &Path, policy: &ChunkPolicy) -> Result<SplitReport> {
    policy.validate()?;
    fs::symlink_metadata(path).map_err(|e| not_found(e, path))?;
    let root = root_name(path)?;
    let archive = naming::archive_path(path, policy.format);
    let dir = naming::parent_dir(&archive);
    let threshold = policy.threshold.bytes();
    let stale = list_parts(&archive)?;

    let codec = codec_for(policy);
    info!(
        source = %path.display(),
        archive = %archive.display(),
        format = %codec.format(),
        "compressing"
    );
    let tmp = NamedTempFile::new_in(dir)?;
    let stats = codec.pack(path, &root, tmp.as_file().try_clone()?)?;
    let size = tmp.as_file().metadata()?.len();
    info!(
        archive = %archive.display(),
        size,
        files = stats.files,
        dirs = stats.dirs,
        input_bytes = stats.input_bytes,
        "archive written"
    );

    if size <= threshold {
        let (digest, _) = digest_file(tmp.path())?;
        tmp.persist(&archive).map_err(|e| ParcelError::Io(e.error))?;
        remove_stale(&stale, &[])?;
        return Ok(SplitReport {
            source: path.to_path_buf(),
            archive: ArchiveInfo {
                path: archive,
                format: policy.format,
                size,
                digest: digest.to_hex().to_string(),
            },
            chunks: Vec::new(),
            stats,
        });
    }

    let scheme = SuffixScheme::new(policy.suffix_style, policy.suffix_length);
    let (chunks, digest) = split_file(tmp.path(), &archive, size, threshold, &scheme)?;
    drop(tmp);
    remove_stale(&stale, &chunks)?;
    if archive.is_file() {
        warn!(archive = %archive.display(), "removing whole archive left by an earlier run");
        fs::remove_file(&archive)?;
    }
    info!(
        archive = %archive.display(),
        parts = chunks.len(),
        "archive written as parts"
    );

    Ok(SplitReport {
        source: path.to_path_buf(),
        archive: ArchiveInfo {
            path: archive,
            format: policy.format,
            size,
            digest: digest.to_hex().to_string(),
        },
        chunks,
        stats,
    })
}

/// Delete parts of an earlier split that the new output did not overwrite.
fn remove_stale(stale: &[PartFile], fresh: &[ChunkInfo]) -> Result<()> {
    for part in stale {
        if fresh.iter().any(|c| c.path == part.path) {
            continue;
        }
        warn!(part = %part.path.display(), "removing part left by an earlier split");
        fs::remove_file(&part.path)?;
    }
    Ok(())
}

/// Cut `source` into parts named after `archive`, next to it. Nothing is
/// visible under a part name until every part has been written.
pub fn split_file(
    source: &Path,
    archive: &Path,
    size: u64,
    part_size: u64,
    scheme: &SuffixScheme,
) -> Result<(Vec<ChunkInfo>, blake3::Hash)> {
    if part_size == 0 {
        return Err(ParcelError::Config("part size must be positive".into()));
    }
    let dir = naming::parent_dir(archive);
    let count = size.div_ceil(part_size);
    let suffixes = (0..count)
        .map(|i| scheme.suffix(i))
        .collect::<Result<Vec<_>>>()?;

    let mut hasher = blake3::Hasher::new();
    let mut staged: Vec<(TempPath, ChunkInfo)> = Vec::with_capacity(suffixes.len());
    {
        let src = File::open(source)?;
        let mut reader = HashingReader::new(BufReader::new(src), &mut hasher);
        for (i, suffix) in suffixes.into_iter().enumerate() {
            let index = i as u64;
            let want = part_size.min(size - index * part_size);
            let mut tmp = NamedTempFile::new_in(dir)?;
            let n = std::io::copy(&mut (&mut reader).take(want), tmp.as_file_mut())?;
            if n != want {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("{} shrank while splitting", source.display()),
                )
                .into());
            }
            tmp.as_file().sync_all()?;
            let path = naming::chunk_path(archive, &suffix);
            debug!(part = %path.display(), len = n, "part staged");
            staged.push((
                tmp.into_temp_path(),
                ChunkInfo {
                    path,
                    index,
                    suffix,
                    len: n,
                },
            ));
        }
    }
    let digest = hasher.finalize();

    let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    let mut chunks = Vec::with_capacity(staged.len());
    for (tmp, info) in staged {
        if let Err(e) = tmp.persist(&info.path) {
            for p in &committed {
                let _ = fs::remove_file(p);
            }
            return Err(e.error.into());
        }
        committed.push(info.path.clone());
        chunks.push(info);
    }
    Ok((chunks, digest))
}
