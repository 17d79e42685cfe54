use anyhow::Context;
use config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Build the filter directive string from the logging configuration
pub fn filter_directives(logging_config: &LoggingConfig) -> String {
    let mut filter = logging_config.level.clone();

    // Sorted so the directive string is stable across runs
    let mut modules: Vec<_> = logging_config.modules.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter.push_str(&format!(",{}={}", module, level));
    }

    filter
}

/// Install the global tracing subscriber
pub fn init_tracing(logging_config: &LoggingConfig) -> anyhow::Result<()> {
    let directives = filter_directives(logging_config);
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter '{directives}'"))?;

    // Initialize tracing based on the format specified in config
    let installed = match logging_config.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        "compact" => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
