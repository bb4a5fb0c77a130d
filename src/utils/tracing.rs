use std::str::FromStr;

use anyhow::anyhow;
use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

/// Installs a stderr subscriber whose level comes from `LOG_LEVEL`.
///
/// `default_level` applies when the variable is unset or unparsable, so
/// command output on stdout stays clean unless asked otherwise.
pub fn init_tracing(default_level: Level) {
    let log_level = std::env::var("LOG_LEVEL")
        .map_err(|e| anyhow!("LOG_LEVEL environment variable is not set: {}", e))
        .and_then(|l| Level::from_str(&l).map_err(|e| anyhow!("Invalid log level: {}", e)))
        .unwrap_or(default_level);

    let subscriber = Subscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
}
