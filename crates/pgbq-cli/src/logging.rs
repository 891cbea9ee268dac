use tracing_subscriber::EnvFilter;

/// Set up the tracing subscriber for an export run.
///
/// `RUST_LOG` takes precedence when set; otherwise the `--log-level` flag
/// value becomes the filter directive. Events go to stderr so progress and
/// final statistics never mix with anything piped from stdout.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
