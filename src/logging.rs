use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Variable consulted before `RUST_LOG` for the log filter.
pub const LOG_ENV: &str = "IQ_REPORT_LOG";

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for results.
pub fn init_tracing(verbose: bool, log_level: Option<&str>, log_json: bool) -> Result<()> {
    let level = match (verbose, log_level) {
        (_, Some(level)) => level,
        (true, None) => "debug",
        (false, None) => "warn",
    };

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(directive(level)));

    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }
    Ok(())
}

fn directive(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("iq_report={}", level)
    }
}
