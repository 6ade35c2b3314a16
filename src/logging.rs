use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set, by `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,globus_transfer=debug,globus=debug",
        _ => "debug",
    }
}

/// Install the stderr subscriber. Called once from `main`; a second call
/// fails instead of replacing the first subscriber.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
}
