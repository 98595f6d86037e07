//! Environment source: `STEPWISE__ENUMERATOR__DISPOSE_TIMEOUT_MS=250` sets
//! `enumerator.dispose_timeout_ms`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("STEPWISE")
            .separator("__")
            .try_parsing(true),
    )
}
