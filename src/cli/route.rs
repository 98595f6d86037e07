//! CLI route: single route table and run context. Builds sequences from
//! command arguments and drains them on a private runtime.

use crate::cancel::CancellationSignal;
use crate::cli::output::{format_report, DrainOutcome, DrainReport};
use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, StepwiseConfig};
use crate::enumerator::EnumeratorOptions;
use crate::error::SequenceError;
use crate::sequence::Sequence;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Arguments of the `count` command.
#[derive(Debug, Clone)]
struct CountRequest {
    from: i64,
    to: i64,
    delay_ms: u64,
    take: Option<usize>,
    fail_after: Option<usize>,
    single_use: bool,
}

/// Runtime context for CLI execution: loaded configuration and the tokio
/// runtime commands run on.
pub struct RunContext {
    config: StepwiseConfig,
    runtime: tokio::runtime::Runtime,
}

impl RunContext {
    /// Load configuration (explicit file if given) and start a runtime.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, SequenceError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Self::with_config(config)
    }

    pub fn with_config(config: StepwiseConfig) -> Result<Self, SequenceError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_time()
            .build()
            .map_err(|e| SequenceError::Config(format!("Failed to start runtime: {}", e)))?;
        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> &StepwiseConfig {
        &self.config
    }

    /// Execute a command and return its rendered output.
    pub fn execute(&self, command: &Commands) -> Result<String, SequenceError> {
        match command {
            Commands::Count {
                from,
                to,
                delay_ms,
                take,
                fail_after,
                single_use,
                format,
            } => {
                let request = CountRequest {
                    from: *from,
                    to: *to,
                    delay_ms: *delay_ms,
                    take: *take,
                    fail_after: *fail_after,
                    single_use: *single_use,
                };
                let report = self.runtime.block_on(self.run_count(request))?;
                format_report(&report, format)
            }
            Commands::Replay { items, format } => {
                let report = self.runtime.block_on(self.run_replay(items.clone()))?;
                format_report(&report, format)
            }
        }
    }

    async fn run_count(&self, request: CountRequest) -> Result<DrainReport, SequenceError> {
        info!(from = request.from, to = request.to, "Running count sequence");
        let produced = Arc::new(AtomicU64::new(0));
        let CountRequest {
            from,
            to,
            delay_ms,
            fail_after,
            ..
        } = request;

        let sequence = Sequence::new({
            let produced = Arc::clone(&produced);
            move |emitter| {
                let produced = Arc::clone(&produced);
                async move {
                    for (index, value) in (from..=to).enumerate() {
                        if delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        }
                        if fail_after == Some(index) {
                            anyhow::bail!("producer failed after {} value(s)", index);
                        }
                        produced.fetch_add(1, Ordering::SeqCst);
                        emitter.emit(value).await?;
                    }
                    Ok(())
                }
            }
        })
        .with_options(EnumeratorOptions::from(&self.config.enumerator));
        let sequence = if request.single_use {
            sequence.single_use()
        } else {
            sequence
        };

        let signal = CancellationSignal::new();
        let mut enumerator = sequence.get_enumerator(&signal).await?;
        let mut items = Vec::new();
        let outcome = loop {
            if request.take.map_or(false, |take| items.len() >= take) {
                enumerator.dispose().await;
                break DrainOutcome::Disposed;
            }
            if !enumerator.move_next(&signal).await? {
                break DrainOutcome::Completed;
            }
            if let Some(value) = enumerator.current() {
                items.push(value.to_string());
            }
        };
        debug!(items = items.len(), outcome = ?outcome, "Count sequence drained");

        let second_enumeration = if request.single_use {
            Some(match sequence.get_enumerator(&signal).await {
                Ok(_) => "accepted".to_string(),
                Err(e) => format!("rejected ({})", e),
            })
        } else {
            None
        };

        Ok(DrainReport {
            items,
            produced: produced.load(Ordering::SeqCst),
            outcome,
            second_enumeration,
        })
    }

    async fn run_replay(&self, items: Vec<String>) -> Result<DrainReport, SequenceError> {
        let sequence = Sequence::from_vec(items)
            .with_options(EnumeratorOptions::from(&self.config.enumerator));
        let replayed = sequence.collect(&CancellationSignal::none()).await?;
        Ok(DrainReport {
            produced: replayed.len() as u64,
            items: replayed,
            outcome: DrainOutcome::Completed,
            second_enumeration: None,
        })
    }
}
