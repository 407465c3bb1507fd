//! Tracing setup for the Bleachers binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events pass the default filter at the configured level.
const CHAT_TARGETS: [&str; 2] = ["bleachers_server", "bleachers_shared"];

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the chat crates and `binary_name` log at
/// `default_log_level` (the server's `--log-level`, `BLEACHERS_LOG_LEVEL`), and
/// HTTP request spans from `tower_http` at `info`.
///
/// ```ignore
/// use bleachers_shared::logger::setup_logger;
///
/// // in src/bin/server.rs, after parsing the CLI arguments
/// setup_logger(env!("CARGO_BIN_NAME"), "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_filter(binary_name: &str, level: &str) -> String {
    let binary = binary_name.replace('-', "_");
    let mut targets: Vec<&str> = CHAT_TARGETS.to_vec();
    if !targets.contains(&binary.as_str()) {
        targets.push(&binary);
    }
    let mut directives: Vec<String> = targets
        .into_iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    directives.push("tower_http=info".to_string());
    directives.join(",")
}
