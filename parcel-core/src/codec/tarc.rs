use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tar::{Archive, Builder, Entry, EntryType};

use super::{ArchiveCodec, EntryKind, PackStats, unpack_error, walk_source};
use crate::error::{ParcelError, Result};
use crate::policy::ArchiveFormat;

const BLOCK: u64 = 512;
/// Two zeroed blocks close every tar stream.
const END_MARKER: u64 = 2 * BLOCK;

pub struct TarCodec;

/// A tar stream cut on a header boundary still parses, so check for the
/// end-of-archive blocks before trusting it.
fn check_end_marker(f: &mut File) -> Result<()> {
    let len = f.seek(SeekFrom::End(0))?;
    if len < END_MARKER || len % BLOCK != 0 {
        return Err(ParcelError::CorruptArchive(format!(
            "tar length {len} is not a whole number of blocks"
        )));
    }
    f.seek(SeekFrom::Start(len - END_MARKER))?;
    let mut tail = [0u8; END_MARKER as usize];
    f.read_exact(&mut tail)?;
    if tail.iter().any(|b| *b != 0) {
        return Err(ParcelError::CorruptArchive(
            "tar end-of-archive marker missing (truncated?)".into(),
        ));
    }
    f.seek(SeekFrom::Start(0))?;
    Ok(())
}

impl ArchiveCodec for TarCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar
    }

    fn pack(&self, src: &Path, root_name: &str, out: File) -> Result<PackStats> {
        let entries = walk_source(src, root_name)?;
        let mut b = Builder::new(out);
        b.follow_symlinks(false);
        let mut stats = PackStats::default();

        for e in &entries {
            match e.kind {
                EntryKind::Dir => {
                    b.append_dir(&e.name, &e.path)?;
                    stats.dirs += 1;
                }
                EntryKind::File => {
                    b.append_path_with_name(&e.path, &e.name)?;
                    stats.input_bytes += e.meta.len();
                    stats.files += 1;
                }
                EntryKind::Symlink => {
                    b.append_path_with_name(&e.path, &e.name)?;
                    stats.files += 1;
                }
            }
        }

        let mut out = b.into_inner()?;
        out.flush()?;
        out.sync_all()?;
        Ok(stats)
    }

    /// Directories are created on demand while their children are written
    /// and get their own mode and mtime last, deepest first, so read-only
    /// directories unpack.
    fn unpack(&self, mut archive: File, dest: &Path) -> Result<u64> {
        check_end_marker(&mut archive)?;
        let mut ar = Archive::new(archive);
        ar.set_preserve_permissions(true);
        ar.set_preserve_mtime(true);
        ar.set_overwrite(true);
        let mut n = 0u64;
        let mut dirs = Vec::new();
        for entry in ar.entries().map_err(unpack_error)? {
            let mut entry = entry.map_err(unpack_error)?;
            if entry.header().entry_type() == EntryType::Directory {
                dirs.push(entry);
                continue;
            }
            unpack_entry(&mut entry, dest)?;
            n += 1;
        }
        dirs.sort_by(|a, b| b.path_bytes().cmp(&a.path_bytes()));
        for mut dir in dirs {
            unpack_entry(&mut dir, dest)?;
            n += 1;
        }
        Ok(n)
    }
}

fn unpack_entry<R: Read>(entry: &mut Entry<'_, R>, dest: &Path) -> Result<()> {
    if !entry.unpack_in(dest).map_err(unpack_error)? {
        return Err(ParcelError::CorruptArchive(format!(
            "entry escapes destination: {}",
            String::from_utf8_lossy(&entry.path_bytes())
        )));
    }
    Ok(())
}
