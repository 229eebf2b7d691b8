//! `merge_archive <path>`: reassemble parts (if any) and unpack into `path`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(version, about = "Reassemble split parts and unpack the archive")]
struct Args {
    path: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    parceldev::init_logging();
    parceldev::exit_with(parceldev::application::handlers::handle_merge(args.path, None))
}
