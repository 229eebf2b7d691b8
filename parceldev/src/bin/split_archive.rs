//! `split_archive <path>`: compress with the default 100 MiB threshold.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(version, about = "Compress a path and split the archive into 100 MiB parts")]
struct Args {
    path: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    parceldev::init_logging();
    parceldev::exit_with(parceldev::application::handlers::handle_split(
        args.path,
        Default::default(),
    ))
}
