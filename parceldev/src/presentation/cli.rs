use clap::{Parser, Subcommand};
use parcel_core::run::Stage;
use parcel_core::{ArchiveFormat, ByteSize, Compression};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "parcel: archive chunking and fine-tuning run tooling", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compress a file or directory into <path>.<ext>, splitting it into parts when too large
    Split {
        path: PathBuf,
        /// Part size; archives larger than this are split (e.g. 100M, 2GiB, 500MB)
        #[arg(long)]
        threshold: Option<ByteSize>,
        /// zip or tar
        #[arg(long)]
        format: Option<ArchiveFormat>,
        /// Zip entry compression: deflate, zstd or store
        #[arg(long)]
        compression: Option<Compression>,
        /// Compression level for the chosen method
        #[arg(long, allow_negative_numbers = true)]
        level: Option<i64>,
        /// YAML chunk policy; flags given on the command line win
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Reassemble <path>.<ext>.part.* (or use <path>.<ext>) and unpack into <path>
    Merge {
        path: PathBuf,
        /// Only look for this format instead of probing zip then tar
        #[arg(long)]
        format: Option<ArchiveFormat>,
    },

    /// Show whether <path> is archived whole, split, or not at all
    Status {
        path: PathBuf,
        #[arg(long)]
        format: Option<ArchiveFormat>,
        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    #[command(subcommand)]
    /// Fine-tuning run configurations
    Run(RunCommands),

    #[command(subcommand)]
    /// Chat templates known to run configurations
    Template(TemplateCommands),
}

#[derive(Subcommand)]
pub enum RunCommands {
    /// Validate a run file and print the launcher options
    Render {
        config: PathBuf,
        /// Print the option map as JSON instead of `--key value` lines
        #[arg(long)]
        json: bool,
    },

    /// Validate a run file and start the launcher
    Launch {
        config: PathBuf,
        /// Print the command line instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a preset run file (sft or dpo) as YAML
    Preset {
        stage: Stage,
        #[arg(long)]
        model: String,
        #[arg(long)]
        output: String,
        #[arg(long, default_value = "qwen")]
        template: String,
        /// Dataset name; repeat for several
        #[arg(long = "dataset", default_value = "identity")]
        datasets: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List registered template names
    List,

    /// Print one template as JSON
    Show { name: String },

    /// Render a conversation JSON file with a template
    Render {
        name: String,
        conversation: PathBuf,
        /// Override the BOS token text
        #[arg(long, default_value = "<s>")]
        bos: String,
        /// Override the EOS token text
        #[arg(long, default_value = "</s>")]
        eos: String,
    },
}
