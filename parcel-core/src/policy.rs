use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ParcelError, Result};

/// 100 MiB, the part size used for transfers.
pub const DEFAULT_THRESHOLD: u64 = 100 * 1024 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    Zip,
    Tar,
}

impl ArchiveFormat {
    /// Order tried when the caller does not name a format.
    pub const ALL: [ArchiveFormat; 2] = [ArchiveFormat::Zip, ArchiveFormat::Tar];

    pub fn ext(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ext())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ParcelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            other => Err(ParcelError::Config(format!(
                "unknown archive format {other:?} (expected zip or tar)"
            ))),
        }
    }
}

/// Entry compression inside a zip archive. Tar archives are always stored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Zstd,
    Store,
}

impl FromStr for Compression {
    type Err = ParcelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "deflate" | "deflated" => Ok(Compression::Deflate),
            "zstd" => Ok(Compression::Zstd),
            "store" | "stored" | "none" => Ok(Compression::Store),
            other => Err(ParcelError::Config(format!(
                "unknown compression {other:?} (expected deflate, zstd or store)"
            ))),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuffixStyle {
    #[default]
    Alphabetic,
    Numeric,
}

impl FromStr for SuffixStyle {
    type Err = ParcelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "alphabetic" | "alpha" => Ok(SuffixStyle::Alphabetic),
            "numeric" | "digits" => Ok(SuffixStyle::Numeric),
            other => Err(ParcelError::Config(format!("unknown suffix style {other:?}"))),
        }
    }
}

/// Byte count that deserializes from either an integer or a string such as
/// `"100MiB"` / `"100M"` (binary) or `"100MB"` (decimal).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
        let mut v = self.0 as f64;
        let mut unit = 0;
        while v >= 1024.0 && unit < UNITS.len() - 1 {
            v /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            write!(f, "{} B", self.0)
        } else {
            write!(f, "{v:.1} {}", UNITS[unit])
        }
    }
}

impl FromStr for ByteSize {
    type Err = ParcelError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        if digits.is_empty() {
            return Err(ParcelError::Config(format!("invalid size {s:?}")));
        }
        let n: u64 = digits
            .parse()
            .map_err(|e| ParcelError::Config(format!("invalid size {s:?}: {e}")))?;
        let mult: u64 = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kib" => 1 << 10,
            "kb" => 1_000,
            "m" | "mib" => 1 << 20,
            "mb" => 1_000_000,
            "g" | "gib" => 1 << 30,
            "gb" => 1_000_000_000,
            "t" | "tib" => 1 << 40,
            "tb" => 1_000_000_000_000,
            other => {
                return Err(ParcelError::Config(format!("unknown size unit {other:?}")));
            }
        };
        n.checked_mul(mult)
            .map(ByteSize)
            .ok_or_else(|| ParcelError::Config(format!("size {s:?} overflows")))
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }
        match Raw::deserialize(d)? {
            Raw::Int(n) => Ok(ByteSize(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// How archives are produced and cut into parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkPolicy {
    /// Archives strictly larger than this are split into parts of this size.
    pub threshold: ByteSize,
    pub format: ArchiveFormat,
    pub compression: Compression,
    /// Codec level; `None` keeps the codec default.
    pub level: Option<i64>,
    pub suffix_style: SuffixStyle,
    /// Fixed suffix width. When unset the width starts at 2 and grows the way
    /// GNU `split` does, keeping lexicographic order.
    pub suffix_length: Option<usize>,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            threshold: ByteSize(DEFAULT_THRESHOLD),
            format: ArchiveFormat::Zip,
            compression: Compression::default(),
            level: None,
            suffix_style: SuffixStyle::default(),
            suffix_length: None,
        }
    }
}

impl ChunkPolicy {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ParcelError::NotFound(path.to_path_buf()),
            _ => e.into(),
        })?;
        let policy: ChunkPolicy = serde_yaml_ng::from_str(&text)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold.0 == 0 {
            return Err(ParcelError::Config("threshold must be positive".into()));
        }
        if let Some(0) = self.suffix_length {
            return Err(ParcelError::Config("suffix_length must be positive".into()));
        }
        if self.format == ArchiveFormat::Tar && self.compression != Compression::default() {
            tracing::warn!(
                compression = ?self.compression,
                "tar archives are stored uncompressed; compression setting ignored"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_and_decimal_sizes() {
        assert_eq!("100M".parse::<ByteSize>().unwrap().0, DEFAULT_THRESHOLD);
        assert_eq!("100MiB".parse::<ByteSize>().unwrap().0, DEFAULT_THRESHOLD);
        assert_eq!("100MB".parse::<ByteSize>().unwrap().0, 100_000_000);
        assert_eq!("4096".parse::<ByteSize>().unwrap().0, 4096);
        assert_eq!("2 g".parse::<ByteSize>().unwrap().0, 2 << 30);
        assert!("MiB".parse::<ByteSize>().is_err());
        assert!("12 parsecs".parse::<ByteSize>().is_err());
    }

    #[test]
    fn policy_from_yaml_overrides_defaults() {
        let p: ChunkPolicy = serde_yaml_ng::from_str("threshold: 1GiB\nformat: tar\n").unwrap();
        assert_eq!(p.threshold.0, 1 << 30);
        assert_eq!(p.format, ArchiveFormat::Tar);
        assert_eq!(p.compression, Compression::Deflate);
        assert_eq!(p.suffix_length, None);

        let p: ChunkPolicy = serde_yaml_ng::from_str("threshold: 1024\n").unwrap();
        assert_eq!(p.threshold.0, 1024);
    }

    #[test]
    fn rejects_zero_threshold() {
        let p = ChunkPolicy {
            threshold: ByteSize(0),
            ..Default::default()
        };
        assert!(matches!(p.validate(), Err(ParcelError::Config(_))));
    }

    #[test]
    fn byte_size_display() {
        assert_eq!(ByteSize(512).to_string(), "512 B");
        assert_eq!(ByteSize(DEFAULT_THRESHOLD).to_string(), "100.0 MiB");
    }
}
