use object_reporter_core::stack::ENV_LOG_FILTER;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the JSON log subscriber used by both functions. CloudWatch adds
/// its own ingestion time, so events carry no timestamp.
pub fn init_tracing() {
    let filter = log_filter(std::env::var(ENV_LOG_FILTER).ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_current_span(false)
        .without_time()
        .try_init();
}

/// Falls back to `info` when the directives are missing or unparsable.
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("  ")).to_string(), "info");
    }

    #[test]
    fn keeps_valid_directives() {
        assert_eq!(
            log_filter(Some("object_reporter_lambda=debug")).to_string(),
            "object_reporter_lambda=debug"
        );
    }
}
