//! Diagnostic logging for batch runs.
//!
//! The CLI owns stdout: per-file status lines and the summary are printed
//! there and may be piped or diffed between runs. Tracing events (flag
//! lookups, compiler invocations, filing errors) therefore go to stderr,
//! either as plain text or as JSON lines for log collectors.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global stderr subscriber. `RUST_LOG` overrides `level`.
/// Later calls are ignored, so tests may call this freely.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
