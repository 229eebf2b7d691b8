pub mod application;
pub mod presentation {
    pub mod cli;
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// `info` level. Events go to stderr so stdout stays machine-readable.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Repeated calls (tests, several entry points) are a no-op.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Shared `main` body: log setup, run, map errors onto the exit status.
pub fn exit_with(result: parcel_core::Result<()>) -> std::process::ExitCode {
    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::ExitCode::from(e.exit_code())
        }
    }
}
