//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
/// Later sources override earlier ones key by key, so a file that only sets
/// `enumerator.dispose_timeout_ms` keeps every other default.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("enumerator.dispose_timeout_ms", 5_000i64)?
        .set_default("blocking.worker_threads", 0i64)?
        .set_default("blocking.thread_name", "stepwise-blocking")
}
