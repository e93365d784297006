//! Logging setup.
//!
//! The executor emits `tracing` events at two levels: the runner logs the
//! physical plan it is about to execute at `debug`, and non-fatal
//! conditions (a scan naming an unknown label or relationship type) are
//! `warn` events. Both carry structured fields and nest under the
//! [`statement_span`] the runner enters for each run.
//!
//! Filtering is driven by the `CORVUS_LOG` environment variable, an
//! `EnvFilter` directive string (`info` when unset, e.g.
//! `CORVUS_LOG=corvus_executor::executor=debug`). Setting
//! `CORVUS_LOG_FORMAT=json` switches the output from single-line text to
//! line-delimited JSON for log aggregators.

use tracing::Span;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human-readable output
    #[default]
    Text,
    /// Line-delimited JSON
    Json,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    /// The format selected by `CORVUS_LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("CORVUS_LOG_FORMAT").ok().as_deref())
    }
}

/// Installs the global subscriber from the environment.
///
/// Safe to call more than once; only the first installation wins, later
/// calls are no-ops.
pub fn init() {
    init_with(LogFormat::from_env(), "info");
}

/// Installs the global subscriber with an explicit format and a fallback
/// level used when `CORVUS_LOG` is unset.
pub fn init_with(format: LogFormat, default_level: &str) {
    let filter =
        EnvFilter::try_from_env("CORVUS_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = fmt().with_env_filter(filter);
    let installed = match format {
        LogFormat::Text => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    // Err here means a subscriber is already installed, which is fine.
    drop(installed);
}

/// The span the runner enters for one statement; plan and commit events
/// from the execution of that statement nest under it.
pub fn statement_span(kind: &'static str) -> Span {
    tracing::debug_span!("statement", kind)
}
