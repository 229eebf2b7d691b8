//! File names shared by split and merge: `<path>.<ext>` for the whole
//! archive and `<path>.<ext>.part.<suffix>` for its parts.
//!
//! Suffixes follow GNU `split`: with no fixed width they start two digits
//! wide (`aa`..`yz`) and widen by two on overflow with a run of the last
//! digit as prefix (`zaaa`..`zyzz`, `zzaaaa`..), so byte-wise name order is
//! always part order.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{ParcelError, Result};
use crate::policy::{ArchiveFormat, SuffixStyle};

pub const PART_MARKER: &str = ".part.";

/// `<path>.<ext>`. Trailing separators and `.` components are dropped first,
/// so `data/` and `./data` both map next to the directory.
pub fn archive_path(path: &Path, format: ArchiveFormat) -> PathBuf {
    let normalized: PathBuf = path.components().collect();
    let mut s = normalized.into_os_string();
    s.push(".");
    s.push(format.ext());
    PathBuf::from(s)
}

pub fn chunk_path(archive: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(archive.as_os_str());
    s.push(PART_MARKER);
    s.push(suffix);
    PathBuf::from(s)
}

/// File-name prefix every part of `archive` starts with.
pub fn chunk_prefix(archive: &Path) -> Result<String> {
    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            ParcelError::Format(format!("archive name not valid UTF-8: {}", archive.display()))
        })?;
    Ok(format!("{name}{PART_MARKER}"))
}

/// Directory holding `p`; `.` for bare relative names.
pub fn parent_dir(p: &Path) -> &Path {
    match p.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SuffixScheme {
    pub style: SuffixStyle,
    /// `None` = auto-widening.
    pub width: Option<usize>,
}

impl Default for SuffixScheme {
    fn default() -> Self {
        Self {
            style: SuffixStyle::Alphabetic,
            width: None,
        }
    }
}

impl SuffixScheme {
    pub fn new(style: SuffixStyle, width: Option<usize>) -> Self {
        Self { style, width }
    }

    fn radix(&self) -> u64 {
        match self.style {
            SuffixStyle::Alphabetic => 26,
            SuffixStyle::Numeric => 10,
        }
    }

    fn digit(&self, d: u64) -> char {
        let base = match self.style {
            SuffixStyle::Alphabetic => b'a',
            SuffixStyle::Numeric => b'0',
        };
        (base + d as u8) as char
    }

    fn value(&self, c: char) -> Option<u64> {
        match self.style {
            SuffixStyle::Alphabetic if c.is_ascii_lowercase() => Some((c as u8 - b'a') as u64),
            SuffixStyle::Numeric if c.is_ascii_digit() => Some((c as u8 - b'0') as u64),
            _ => None,
        }
    }

    fn push_digits(&self, out: &mut String, mut n: u64, width: usize) {
        let r = self.radix();
        let mut buf = vec![self.digit(0); width];
        for slot in buf.iter_mut().rev() {
            *slot = self.digit(n % r);
            n /= r;
        }
        out.extend(buf);
    }

    /// Number of names at auto-width level `k` (`k` leading last-digits).
    fn level_len(&self, k: u32) -> Option<u64> {
        let r = self.radix();
        r.checked_pow(k + 1)?.checked_mul(r - 1)
    }

    pub fn suffix(&self, index: u64) -> Result<String> {
        let r = self.radix();
        let mut out = String::new();
        match self.width {
            Some(w) => {
                let capacity = u32::try_from(w)
                    .ok()
                    .and_then(|w| r.checked_pow(w))
                    .unwrap_or(u64::MAX);
                if index >= capacity {
                    return Err(ParcelError::Format(format!(
                        "part #{index} does not fit a {w}-character suffix"
                    )));
                }
                self.push_digits(&mut out, index, w);
            }
            None => {
                let mut idx = index;
                let mut k = 0u32;
                loop {
                    let n = self
                        .level_len(k)
                        .ok_or_else(|| ParcelError::Format("suffix overflow".into()))?;
                    if idx < n {
                        break;
                    }
                    idx -= n;
                    k += 1;
                }
                let tail_mod = r.pow(k + 1);
                for _ in 0..k {
                    out.push(self.digit(r - 1));
                }
                out.push(self.digit(idx / tail_mod));
                self.push_digits(&mut out, idx % tail_mod, k as usize + 1);
            }
        }
        Ok(out)
    }

    /// Inverse of [`suffix`](Self::suffix); `None` if `s` is not a name this
    /// scheme produces.
    pub fn index_of(&self, s: &str) -> Option<u64> {
        let r = self.radix();
        let digits: Vec<u64> = s.chars().map(|c| self.value(c)).collect::<Option<_>>()?;
        let fold = |ds: &[u64]| {
            ds.iter()
                .try_fold(0u64, |acc, d| acc.checked_mul(r)?.checked_add(*d))
        };
        match self.width {
            Some(w) => (digits.len() == w).then(|| fold(&digits)).flatten(),
            None => {
                let k = digits.iter().take_while(|d| **d == r - 1).count();
                if digits.len() != 2 * k + 2 {
                    return None;
                }
                let mut base = 0u64;
                for level in 0..k as u32 {
                    base = base.checked_add(self.level_len(level)?)?;
                }
                let lead = digits[k];
                let tail = fold(&digits[k + 1..])?;
                let within = lead.checked_mul(r.checked_pow(k as u32 + 1)?)?.checked_add(tail)?;
                base.checked_add(within)
            }
        }
    }

    /// Work out which scheme produced `suffixes` and map each to its index.
    pub fn detect(suffixes: &[&str]) -> Result<(SuffixScheme, Vec<u64>)> {
        let first = suffixes
            .first()
            .ok_or_else(|| ParcelError::CorruptArchive("no parts".into()))?;
        let style = if first.chars().all(|c| c.is_ascii_digit()) {
            SuffixStyle::Numeric
        } else {
            SuffixStyle::Alphabetic
        };

        let auto = SuffixScheme::new(style, None);
        if let Some(ix) = suffixes
            .iter()
            .map(|s| auto.index_of(s))
            .collect::<Option<Vec<u64>>>()
        {
            return Ok((auto, ix));
        }
        let fixed = SuffixScheme::new(style, Some(first.len()));
        if let Some(ix) = suffixes
            .iter()
            .map(|s| fixed.index_of(s))
            .collect::<Option<Vec<u64>>>()
        {
            return Ok((fixed, ix));
        }
        Err(ParcelError::CorruptArchive(format!(
            "unrecognised part suffixes: {}",
            suffixes.join(", ")
        )))
    }
}

/// Check that `suffixes`, already in name order, form one unbroken run from
/// the first part. Numeric runs may start at 0 or 1.
pub fn validate_sequence(suffixes: &[&str]) -> Result<SuffixScheme> {
    let (scheme, ix) = SuffixScheme::detect(suffixes)?;
    let start = ix[0];
    let start_ok = match scheme.style {
        SuffixStyle::Alphabetic => start == 0,
        SuffixStyle::Numeric => start <= 1,
    };
    if !start_ok {
        let want = scheme.suffix(0)?;
        return Err(ParcelError::CorruptArchive(format!(
            "missing part {want:?} (sequence starts at {:?})",
            suffixes[0]
        )));
    }
    for (pos, &got) in ix.iter().enumerate() {
        let expected = start + pos as u64;
        if got != expected {
            let want = scheme.suffix(expected)?;
            return Err(ParcelError::CorruptArchive(format!(
                "missing part {want:?} before {:?}",
                suffixes[pos]
            )));
        }
    }
    Ok(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha() -> SuffixScheme {
        SuffixScheme::default()
    }

    #[test]
    fn alphabetic_suffixes_follow_split() {
        let s = alpha();
        assert_eq!(s.suffix(0).unwrap(), "aa");
        assert_eq!(s.suffix(1).unwrap(), "ab");
        assert_eq!(s.suffix(25).unwrap(), "az");
        assert_eq!(s.suffix(26).unwrap(), "ba");
        assert_eq!(s.suffix(649).unwrap(), "yz");
        assert_eq!(s.suffix(650).unwrap(), "zaaa");
        assert_eq!(s.suffix(650 + 25 * 26 * 26).unwrap(), "zzaaaa");
    }

    #[test]
    fn numeric_suffixes_widen_after_89() {
        let s = SuffixScheme::new(SuffixStyle::Numeric, None);
        assert_eq!(s.suffix(0).unwrap(), "00");
        assert_eq!(s.suffix(89).unwrap(), "89");
        assert_eq!(s.suffix(90).unwrap(), "9000");
    }

    #[test]
    fn name_order_is_part_order_across_widening() {
        let s = alpha();
        let names: Vec<String> = (0..20_000).map(|i| s.suffix(i).unwrap()).collect();
        for w in names.windows(2) {
            assert!(w[0] < w[1], "{} !< {}", w[0], w[1]);
        }
        for (i, n) in names.iter().enumerate().step_by(97) {
            assert_eq!(s.index_of(n), Some(i as u64));
        }
    }

    #[test]
    fn fixed_width_exhausts() {
        let s = SuffixScheme::new(SuffixStyle::Alphabetic, Some(1));
        assert_eq!(s.suffix(25).unwrap(), "z");
        assert!(s.suffix(26).is_err());
        assert_eq!(s.index_of("aa"), None);
    }

    #[test]
    fn detects_fixed_width_runs() {
        let (scheme, ix) = SuffixScheme::detect(&["aaa", "aab", "aac"]).unwrap();
        assert_eq!(scheme.width, Some(3));
        assert_eq!(ix, vec![0, 1, 2]);
    }

    #[test]
    fn gap_is_reported() {
        let err = validate_sequence(&["aa", "ab", "ad"]).unwrap_err();
        match err {
            ParcelError::CorruptArchive(msg) => assert!(msg.contains("\"ac\""), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(validate_sequence(&["ab", "ac"]).is_err());
        assert!(validate_sequence(&["aa", "ab", "ac"]).is_ok());
        assert!(validate_sequence(&["001", "002"]).is_ok());
    }

    #[test]
    fn paths() {
        let a = archive_path(Path::new("runs/data/"), ArchiveFormat::Zip);
        assert_eq!(a, PathBuf::from("runs/data.zip"));
        assert_eq!(chunk_path(&a, "ab"), PathBuf::from("runs/data.zip.part.ab"));
        assert_eq!(chunk_prefix(&a).unwrap(), "data.zip.part.");
        assert_eq!(parent_dir(Path::new("data.zip")), Path::new("."));
    }
}
