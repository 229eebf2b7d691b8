use std::process::ExitCode;

fn main() -> ExitCode {
    parceldev::init_logging();
    parceldev::exit_with(parceldev::application::run())
}
