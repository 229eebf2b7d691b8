use std::fs;
use std::path::{Path, PathBuf};

use parcel_core::chunk::naming;
use parcel_core::{
    ArchiveFormat, ArchiveStatus, ByteSize, ChunkPolicy, Compression, ParcelError,
    compress_and_maybe_split, maybe_merge_and_decompress, status,
};
use tempfile::TempDir;

/// Deterministic incompressible bytes.
fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut x = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            (x >> 24) as u8
        })
        .collect()
}

fn make_tree(root: &Path) -> PathBuf {
    let data = root.join("data");
    fs::create_dir_all(data.join("nested/deeper")).unwrap();
    fs::create_dir_all(data.join("empty")).unwrap();
    fs::write(data.join("a.bin"), noise(20_000, 1)).unwrap();
    fs::write(data.join("nested/b.txt"), b"hello parcel\n".repeat(200)).unwrap();
    fs::write(data.join("nested/deeper/c.bin"), noise(15_000, 2)).unwrap();
    data
}

/// Relative path -> file contents (None for directories).
fn snapshot(root: &Path) -> Vec<(PathBuf, Option<Vec<u8>>)> {
    let mut out = Vec::new();
    for e in walkdir::WalkDir::new(root).sort_by_file_name() {
        let e = e.unwrap();
        let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
        let body = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
        out.push((rel, body));
    }
    out
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn policy(format: ArchiveFormat, threshold: u64) -> ChunkPolicy {
    ChunkPolicy {
        threshold: ByteSize(threshold),
        format,
        compression: Compression::Store,
        ..ChunkPolicy::default()
    }
}

/// Size of the whole archive the policy produces, leaving it on disk.
fn measure(src: &Path, format: ArchiveFormat) -> u64 {
    let r = compress_and_maybe_split(src, &policy(format, u64::MAX)).unwrap();
    assert!(!r.was_split());
    r.archive.size
}

fn round_trip(format: ArchiveFormat) {
    let dir = TempDir::new().unwrap();
    let data = make_tree(dir.path());
    let before = snapshot(&data);

    let report = compress_and_maybe_split(&data, &policy(format, 8 * 1024)).unwrap();
    assert!(report.was_split());
    assert_eq!(report.stats.files, 3);
    assert!(!naming::archive_path(&data, format).exists());

    fs::remove_dir_all(&data).unwrap();
    let merged = maybe_merge_and_decompress(&data, Some(format)).unwrap();
    assert_eq!(merged.parts, report.chunks.len());
    assert_eq!(merged.archive.digest, report.archive.digest);
    assert_eq!(merged.archive.size, report.archive.size);
    assert_eq!(snapshot(&data), before);
    assert_eq!(listing(dir.path()), vec!["data".to_string()]);
}

#[test]
fn zip_round_trip() {
    round_trip(ArchiveFormat::Zip);
}

#[test]
fn tar_round_trip() {
    round_trip(ArchiveFormat::Tar);
}

#[test]
fn deflate_and_zstd_round_trip() {
    for compression in [Compression::Deflate, Compression::Zstd] {
        let dir = TempDir::new().unwrap();
        let data = make_tree(dir.path());
        let before = snapshot(&data);
        let p = ChunkPolicy {
            compression,
            level: Some(3),
            ..ChunkPolicy::default()
        };
        compress_and_maybe_split(&data, &p).unwrap();
        fs::remove_dir_all(&data).unwrap();
        maybe_merge_and_decompress(&data, None).unwrap();
        assert_eq!(snapshot(&data), before, "{compression:?}");
    }
}

#[test]
fn threshold_boundary() {
    for format in ArchiveFormat::ALL {
        let dir = TempDir::new().unwrap();
        let data = make_tree(dir.path());
        let n = measure(&data, format);

        let at = compress_and_maybe_split(&data, &policy(format, n)).unwrap();
        assert!(!at.was_split(), "{format}: size == threshold keeps one archive");
        assert_eq!(at.archive.size, n);

        let over = compress_and_maybe_split(&data, &policy(format, n - 1)).unwrap();
        assert_eq!(over.chunks.len(), 2, "{format}");
        assert_eq!(over.chunks[0].len, n - 1);
        assert_eq!(over.chunks[1].len, 1);
        assert!(!naming::archive_path(&data, format).exists());
    }
}

#[test]
fn three_parts_named_aa_ab_ac() {
    let dir = TempDir::new().unwrap();
    let data = make_tree(dir.path());
    let n = measure(&data, ArchiveFormat::Zip);
    let threshold = n.div_ceil(3);

    let r = compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, threshold)).unwrap();
    let suffixes: Vec<&str> = r.chunks.iter().map(|c| c.suffix.as_str()).collect();
    assert_eq!(suffixes, ["aa", "ab", "ac"]);
    assert!(r.chunks.iter().all(|c| c.len <= threshold));
    assert_eq!(r.chunks.iter().map(|c| c.len).sum::<u64>(), n);
    assert_eq!(
        listing(dir.path()),
        ["data", "data.zip.part.aa", "data.zip.part.ab", "data.zip.part.ac"]
    );

    // Concatenated parts are byte-identical to the unsplit archive.
    let mut joined = Vec::new();
    for c in &r.chunks {
        joined.extend(fs::read(&c.path).unwrap());
    }
    assert_eq!(blake3::hash(&joined).to_hex().to_string(), r.archive.digest);
}

#[test]
fn small_source_stays_whole() {
    let dir = TempDir::new().unwrap();
    let small = dir.path().join("small");
    fs::create_dir(&small).unwrap();
    fs::write(small.join("x.txt"), b"tiny").unwrap();

    let r = compress_and_maybe_split(&small, &ChunkPolicy::default()).unwrap();
    assert!(!r.was_split());
    assert_eq!(listing(dir.path()), ["small", "small.zip"]);

    fs::write(small.join("x.txt"), b"changed").unwrap();
    let m = maybe_merge_and_decompress(&small, None).unwrap();
    assert_eq!(m.parts, 0);
    assert_eq!(fs::read(small.join("x.txt")).unwrap(), b"tiny");
    assert_eq!(listing(dir.path()), ["small"]);
}

#[test]
fn single_file_source() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("weights.bin");
    let body = noise(30_000, 9);
    fs::write(&file, &body).unwrap();

    let r = compress_and_maybe_split(&file, &policy(ArchiveFormat::Tar, 10_000)).unwrap();
    assert!(r.was_split());
    fs::remove_file(&file).unwrap();

    maybe_merge_and_decompress(&file, None).unwrap();
    assert_eq!(fs::read(&file).unwrap(), body);
}

#[test]
fn wrong_part_order_fails_and_keeps_inputs() {
    let dir = TempDir::new().unwrap();
    let data = make_tree(dir.path());
    let n = measure(&data, ArchiveFormat::Zip);
    let r = compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, n.div_ceil(3))).unwrap();
    assert_eq!(r.chunks.len(), 3);

    let (a, b) = (&r.chunks[0].path, &r.chunks[1].path);
    let swap = dir.path().join("swap");
    fs::rename(a, &swap).unwrap();
    fs::rename(b, a).unwrap();
    fs::rename(&swap, b).unwrap();

    let before = snapshot(&data);
    let err = maybe_merge_and_decompress(&data, None).unwrap_err();
    assert!(matches!(err, ParcelError::CorruptArchive(_)), "{err}");
    assert_eq!(err.exit_code(), 3);
    for c in &r.chunks {
        assert!(c.path.exists(), "parts survive a failed merge");
    }
    assert_eq!(snapshot(&data), before, "target untouched");
}

#[test]
fn truncated_part_set_is_corrupt() {
    for format in ArchiveFormat::ALL {
        let dir = TempDir::new().unwrap();
        let data = make_tree(dir.path());
        let n = measure(&data, format);
        let r = compress_and_maybe_split(&data, &policy(format, n.div_ceil(3))).unwrap();
        fs::remove_file(&r.chunks[2].path).unwrap();

        let err = maybe_merge_and_decompress(&data, Some(format)).unwrap_err();
        assert!(matches!(err, ParcelError::CorruptArchive(_)), "{format}: {err}");
    }
}

#[test]
fn gap_in_sequence_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let data = make_tree(dir.path());
    let n = measure(&data, ArchiveFormat::Zip);
    let r = compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, n.div_ceil(3))).unwrap();
    fs::remove_file(&r.chunks[1].path).unwrap();

    let st = status(&data, None).unwrap();
    match st {
        ArchiveStatus::Split { problem, chunks, .. } => {
            assert_eq!(chunks.len(), 2);
            assert!(problem.unwrap().contains("ab"));
        }
        other => panic!("unexpected status {other:?}"),
    }

    let err = maybe_merge_and_decompress(&data, None).unwrap_err();
    assert!(matches!(err, ParcelError::CorruptArchive(_)), "{err}");
    assert!(r.chunks[0].path.exists());
    assert!(r.chunks[2].path.exists());
}

#[test]
fn merge_on_nothing_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ghost = dir.path().join("ghost");

    let err = maybe_merge_and_decompress(&ghost, None).unwrap_err();
    assert!(matches!(err, ParcelError::NotFound(_)), "{err}");
    assert_eq!(err.exit_code(), 2);
    assert!(listing(dir.path()).is_empty());

    assert!(matches!(
        status(&ghost, None).unwrap(),
        ArchiveStatus::Missing { .. }
    ));
}

#[test]
fn split_of_missing_path_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = compress_and_maybe_split(&dir.path().join("nope"), &ChunkPolicy::default())
        .unwrap_err();
    assert!(matches!(err, ParcelError::NotFound(_)));
    assert!(listing(dir.path()).is_empty());
}

#[test]
fn resplit_removes_stale_parts() {
    let dir = TempDir::new().unwrap();
    let data = make_tree(dir.path());
    let n = measure(&data, ArchiveFormat::Zip);

    let many = compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, n / 6)).unwrap();
    assert!(many.chunks.len() >= 6);
    let few = compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, n.div_ceil(2))).unwrap();
    assert_eq!(few.chunks.len(), 2);
    assert_eq!(
        listing(dir.path()),
        ["data", "data.zip.part.aa", "data.zip.part.ab"]
    );

    let whole = compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, u64::MAX)).unwrap();
    assert!(!whole.was_split());
    assert_eq!(listing(dir.path()), ["data", "data.zip"]);
}

#[test]
fn status_reports_whole_and_split() {
    let dir = TempDir::new().unwrap();
    let data = make_tree(dir.path());
    let n = measure(&data, ArchiveFormat::Tar);

    match status(&data, None).unwrap() {
        ArchiveStatus::Whole { format, size, .. } => {
            assert_eq!(format, ArchiveFormat::Tar);
            assert_eq!(size, n);
        }
        other => panic!("unexpected status {other:?}"),
    }

    compress_and_maybe_split(&data, &policy(ArchiveFormat::Tar, n.div_ceil(2))).unwrap();
    match status(&data, Some(ArchiveFormat::Tar)).unwrap() {
        ArchiveStatus::Split {
            chunks,
            total,
            problem,
            whole_present,
            ..
        } => {
            assert_eq!(chunks.len(), 2);
            assert_eq!(total, n);
            assert!(problem.is_none());
            assert!(!whole_present);
        }
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn merge_replaces_existing_target() {
    let dir = TempDir::new().unwrap();
    let data = make_tree(dir.path());
    let before = snapshot(&data);
    compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, 10_000)).unwrap();

    fs::write(data.join("stray.txt"), b"not in the archive").unwrap();
    fs::remove_file(data.join("a.bin")).unwrap();

    maybe_merge_and_decompress(&data, None).unwrap();
    assert_eq!(snapshot(&data), before);
}

#[cfg(unix)]
#[test]
fn permissions_survive() {
    use std::os::unix::fs::PermissionsExt;

    for format in ArchiveFormat::ALL {
        let dir = TempDir::new().unwrap();
        let data = make_tree(dir.path());
        let script = data.join("run.sh");
        fs::write(&script, b"#!/bin/sh\necho hi\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let secret = data.join("nested/b.txt");
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o600)).unwrap();

        compress_and_maybe_split(&data, &policy(format, 10_000)).unwrap();
        fs::remove_dir_all(&data).unwrap();
        maybe_merge_and_decompress(&data, Some(format)).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&script), 0o755, "{format}");
        assert_eq!(mode(&secret), 0o600, "{format}");
    }
}

#[cfg(unix)]
#[test]
fn read_only_directory_round_trips() {
    use std::os::unix::fs::PermissionsExt;

    let set_mode = |p: &Path, m: u32| fs::set_permissions(p, fs::Permissions::from_mode(m)).unwrap();

    for format in ArchiveFormat::ALL {
        let dir = TempDir::new().unwrap();
        let data = make_tree(dir.path());
        let ro = data.join("ro");
        fs::create_dir(&ro).unwrap();
        fs::write(ro.join("inside.txt"), b"locked in").unwrap();
        set_mode(&ro, 0o555);

        compress_and_maybe_split(&data, &policy(format, 10_000)).unwrap();
        set_mode(&ro, 0o755);
        fs::remove_dir_all(&data).unwrap();

        let merged = maybe_merge_and_decompress(&data, Some(format));
        let restored = fs::metadata(&ro).map(|m| m.permissions().mode() & 0o777);
        if ro.exists() {
            // Let TempDir clean up.
            set_mode(&ro, 0o755);
        }
        merged.unwrap_or_else(|e| panic!("{format}: {e}"));
        assert_eq!(restored.unwrap(), 0o555, "{format}");
        assert_eq!(fs::read(ro.join("inside.txt")).unwrap(), b"locked in");
        assert_eq!(listing(dir.path()), ["data"], "{format}");
    }
}

/// A file name the archive writers refuse makes packing fail after the
/// walk has started.
#[cfg(target_os = "linux")]
fn add_unpackable_file(data: &Path) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;

    let bad = data.join(std::ffi::OsStr::from_bytes(b"bad-\xff-name"));
    fs::write(&bad, b"x").unwrap();
    bad
}

#[cfg(target_os = "linux")]
#[test]
fn failed_resplit_keeps_previous_parts() {
    let dir = TempDir::new().unwrap();
    let data = make_tree(dir.path());
    let before = snapshot(&data);
    let n = measure(&data, ArchiveFormat::Zip);
    let first = compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, n / 6)).unwrap();
    assert!(first.chunks.len() >= 6);
    let on_disk = listing(dir.path());

    let bad = add_unpackable_file(&data);
    let err = compress_and_maybe_split(&data, &policy(ArchiveFormat::Zip, n.div_ceil(2)))
        .unwrap_err();
    assert!(matches!(err, ParcelError::Format(_)), "{err}");
    assert_eq!(listing(dir.path()), on_disk, "no part removed, no temp file left");
    for c in &first.chunks {
        assert_eq!(fs::metadata(&c.path).unwrap().len(), c.len);
    }

    fs::remove_file(&bad).unwrap();
    fs::remove_dir_all(&data).unwrap();
    maybe_merge_and_decompress(&data, None).unwrap();
    assert_eq!(snapshot(&data), before);
}

#[cfg(target_os = "linux")]
#[test]
fn failed_split_keeps_previous_whole_archive() {
    for format in ArchiveFormat::ALL {
        let dir = TempDir::new().unwrap();
        let data = make_tree(dir.path());
        let n = measure(&data, format);
        let archive = naming::archive_path(&data, format);
        let digest = blake3::hash(&fs::read(&archive).unwrap());

        add_unpackable_file(&data);
        let err = compress_and_maybe_split(&data, &policy(format, n / 3)).unwrap_err();
        assert!(matches!(err, ParcelError::Format(_)), "{format}: {err}");

        let ext = format.ext();
        assert_eq!(listing(dir.path()), ["data".to_string(), format!("data.{ext}")]);
        assert_eq!(blake3::hash(&fs::read(&archive).unwrap()), digest);
    }
}

#[test]
fn policy_from_yaml() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("policy.yaml");
    fs::write(
        &cfg,
        "threshold: 64KiB\nformat: tar\nsuffix_style: numeric\nsuffix_length: 4\n",
    )
    .unwrap();
    let p = ChunkPolicy::load(&cfg).unwrap();
    assert_eq!(p.threshold.bytes(), 64 * 1024);
    assert_eq!(p.format, ArchiveFormat::Tar);

    let data = make_tree(dir.path());
    let r = compress_and_maybe_split(&data, &ChunkPolicy {
        threshold: ByteSize(10_000),
        ..p
    })
    .unwrap();
    assert_eq!(r.chunks[0].suffix, "0000");
    assert_eq!(r.chunks[1].suffix, "0001");
    fs::remove_dir_all(&data).unwrap();
    maybe_merge_and_decompress(&data, None).unwrap();
    assert!(data.join("nested/deeper/c.bin").is_file());

    fs::write(&cfg, "threshold: 1M\nthreshhold: 2M\n").unwrap();
    assert!(matches!(ChunkPolicy::load(&cfg), Err(ParcelError::Config(_))));
}
