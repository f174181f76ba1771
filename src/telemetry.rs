//! Tracing setup.
//!
//! - LOG_LEVEL: EnvFilter directives; falls back to `DEFAULT_DIRECTIVES`.
//! - LOG_FORMAT: "pretty" (default), "compact" or "json".
//!
//! Workflow transitions log under the `workflow` target, server lifecycle and sessions under
//! `codecraft`. The tower-http TraceLayer adds one span per request on top of this.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,workflow=debug,codecraft=debug,tower_http=info,axum=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn from_env_value(v: Option<&str>) -> Self {
        match v.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Each arm yields a different subscriber type, so init inside the match.
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.init(),
    }
}
