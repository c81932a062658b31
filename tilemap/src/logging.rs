//! Logging initialization using `tracing` and `tracing-subscriber`.
//!
//! Controlled by two environment variables:
//! - `RUST_LOG`: log level filtering (standard `EnvFilter` syntax)
//! - `TILEMAP_FORMAT`: output format (`full`, `compact`, `pretty`, `json`)

use std::str::FromStr;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _, Registry};

/// Log output format, selected with `TILEMAP_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, single-line logs.
    Full,
    /// A shorter variant of [`Full`](Self::Full).
    Compact,
    /// Multi-line logs for local debugging.
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "pretty" | "verbose" => Ok(Self::Pretty),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: full, compact, pretty, json"
            )),
        }
    }
}

/// Builds the filter string from `RUST_LOG`.
///
/// Without `RUST_LOG` the server and its core library log at `info`. A level set
/// for `tilemap=` is mirrored to `tilemap_core=` unless that one is set as well.
#[must_use]
pub fn log_filter(rust_log: Option<String>) -> String {
    const PREFIX: &str = "tilemap=";
    let Some(rust_log) = rust_log else {
        return "tilemap=info,tilemap_core=info".to_string();
    };
    if rust_log.contains("tilemap_core=") {
        return rust_log;
    }
    match rust_log.split(',').find_map(|s| s.strip_prefix(PREFIX)) {
        Some(level) => format!("{rust_log},tilemap_core={level}"),
        None => rust_log,
    }
}

/// Installs the global subscriber and bridges `log` records into `tracing`.
pub fn init_tracing(filter: &str, format: Option<String>) {
    let _ = tracing_log::LogTracer::builder()
        .with_interest_cache(tracing_log::InterestCacheConfig::default())
        .init();

    let env_filter = EnvFilter::from_str(filter).unwrap_or_else(|_| {
        eprintln!("Warning: Invalid filter string '{filter}' passed, falling back to debug");
        EnvFilter::new("debug")
    });

    let format = format
        .and_then(|s| {
            s.parse::<LogFormat>()
                .map_err(|e| eprintln!("Warning: {e}"))
                .ok()
        })
        .unwrap_or_default();

    let res = match format {
        LogFormat::Full => Registry::default()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_span_events(FmtSpan::NONE)
                    .with_filter(env_filter),
            )
            .try_init(),
        LogFormat::Compact => Registry::default()
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_span_events(FmtSpan::NONE)
                    .with_filter(env_filter),
            )
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_filter(env_filter),
            )
            .try_init(),
        LogFormat::Json => Registry::default()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::NONE)
                    .with_filter(env_filter),
            )
            .try_init(),
    };
    if let Err(e) = res {
        eprintln!("Warning: unable to install the log subscriber: {e}");
    }
}
