#![forbid(unsafe_code)]

pub mod error;
pub mod policy;

pub mod util {
    pub mod hashing;
}

pub mod codec;
pub mod domain;

pub mod chunk;

pub mod run;
pub mod template;

// Re-exports: stable API surface
pub use chunk::merge::maybe_merge_and_decompress;
pub use chunk::split::compress_and_maybe_split;
pub use chunk::status::status;
pub use domain::{ArchiveStatus, MergeReport, SplitReport};
pub use error::{ParcelError, Result};
pub use policy::{ArchiveFormat, ByteSize, ChunkPolicy, Compression, SuffixStyle};
pub use run::RunConfig;
