use tracing_subscriber::EnvFilter;

/// Maps the level names the tool historically accepted onto `tracing` levels.
pub fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "verbose" => "debug".to_string(),
        "notice" | "http" => "info".to_string(),
        "silly" => "trace".to_string(),
        "" => "info".to_string(),
        other => other.to_string(),
    }
}

pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(normalize_level(level)).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the stderr subscriber. A second call is ignored.
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
