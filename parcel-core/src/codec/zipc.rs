use std::fs::File;
use std::io::Write;
use std::path::Path;

use time::OffsetDateTime;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use super::{ArchiveCodec, EntryKind, PackStats, mode_from, unpack_error, walk_source};
use crate::error::{ParcelError, Result};
use crate::policy::{ArchiveFormat, Compression};

pub struct ZipCodec {
    pub compression: Compression,
    pub level: Option<i64>,
}

fn method(c: Compression) -> CompressionMethod {
    match c {
        Compression::Deflate => CompressionMethod::Deflated,
        Compression::Zstd => CompressionMethod::Zstd,
        Compression::Store => CompressionMethod::Stored,
    }
}

fn zip_mtime(md: &std::fs::Metadata) -> Option<DateTime> {
    let t = OffsetDateTime::from(md.modified().ok()?);
    DateTime::from_date_and_time(
        u16::try_from(t.year()).ok()?,
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
    )
    .ok()
}

fn pack_error(e: ZipError) -> ParcelError {
    match e {
        ZipError::Io(e) => ParcelError::Io(e),
        other => ParcelError::Format(format!("zip: {other}")),
    }
}

fn read_error(e: ZipError) -> ParcelError {
    match e {
        ZipError::Io(e) => unpack_error(e),
        other => ParcelError::CorruptArchive(format!("zip: {other}")),
    }
}

impl ArchiveCodec for ZipCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn pack(&self, src: &Path, root_name: &str, out: File) -> Result<PackStats> {
        let entries = walk_source(src, root_name)?;
        let mut zw = ZipWriter::new(out);
        let base = SimpleFileOptions::default()
            .compression_method(method(self.compression))
            .compression_level(self.level);
        let mut stats = PackStats::default();

        for e in &entries {
            let mut opts = base.unix_permissions(mode_from(&e.meta));
            if let Some(dt) = zip_mtime(&e.meta) {
                opts = opts.last_modified_time(dt);
            }
            match e.kind {
                EntryKind::Dir => {
                    zw.add_directory(e.name.as_str(), opts).map_err(pack_error)?;
                    stats.dirs += 1;
                }
                EntryKind::File => {
                    let len = e.meta.len();
                    opts = opts.large_file(len >= u32::MAX as u64);
                    zw.start_file(e.name.as_str(), opts).map_err(pack_error)?;
                    let mut f = File::open(&e.path)?;
                    stats.input_bytes += std::io::copy(&mut f, &mut zw)?;
                    stats.files += 1;
                }
                EntryKind::Symlink => {
                    // (symlinks are not carried in zip output)
                    tracing::warn!(path = %e.path.display(), "skipping symlink");
                    stats.skipped += 1;
                }
            }
        }

        let mut out = zw.finish().map_err(pack_error)?;
        out.flush()?;
        out.sync_all()?;
        Ok(stats)
    }

    fn unpack(&self, archive: File, dest: &Path) -> Result<u64> {
        let mut za = ZipArchive::new(archive).map_err(read_error)?;
        za.extract(dest).map_err(read_error)?;
        Ok(za.len() as u64)
    }
}
