//! Logging setup.
//!
//! The config `log_level` seeds the default filter; `RUST_LOG` always wins
//! so a misbehaving install can be inspected without touching the config.

use anyhow::{bail, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// `log_level` is the config value: one of `debug`, `info`, `error`.
pub fn init(log_level: &str) -> Result<()> {
    let default_filter = match log_level {
        "debug" => "greenwaked=debug,greenwake_common=debug",
        "info" => "greenwaked=info,greenwake_common=info",
        "error" => "greenwaked=error,greenwake_common=error",
        other => bail!("invalid log_level '{other}' (expected debug, info or error)"),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_level() {
        // Only the validation path is testable here; installing the global
        // subscriber twice in one test binary would panic.
        assert!(init("verbose").is_err());
    }
}
