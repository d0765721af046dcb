//! Batch executor for independent code entries
//!
//! Uses Rayon for work-stealing parallelism with configurable limits.
//! Compilation of independent entries is embarrassingly parallel: each owns
//! its own scope tree and builder, so the driver only decides how failures
//! propagate.

use rayon::prelude::*;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Configuration for batch compilation
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of parallel workers (default: num_cpus)
    pub max_parallelism: usize,
    /// Halt on the first failing entry vs compile everything and aggregate
    pub fail_fast: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            fail_fast: false,
        }
    }
}

/// Aggregated result of a non-fail-fast batch
#[derive(Debug)]
pub struct BatchReport<T> {
    /// Outputs of the entries that compiled, in input order
    pub compiled: Vec<T>,
    /// Input index and error of each entry that failed
    pub failures: Vec<(usize, Error)>,
}

impl<T> BatchReport<T> {
    /// True when every entry compiled
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compiles a batch of independent code entries
///
/// `compile` runs once per entry on a worker thread and must not share
/// mutable state between entries; an entry's failure aborts that entry only.
/// With `fail_fast` the first error is returned and remaining results are
/// discarded; otherwise every entry runs and failures are aggregated with
/// their input indices.
pub fn compile_batch<E, T, F>(
    entries: Vec<E>,
    compile: F,
    config: BatchConfig,
) -> Result<BatchReport<T>>
where
    E: Send + Sync,
    T: Send,
    F: Fn(&E) -> Result<T> + Send + Sync,
{
    if entries.is_empty() {
        return Ok(BatchReport {
            compiled: Vec::new(),
            failures: Vec::new(),
        });
    }

    // Single entry - no parallelism needed
    if entries.len() == 1 {
        return match compile(&entries[0]) {
            Ok(output) => Ok(BatchReport {
                compiled: vec![output],
                failures: Vec::new(),
            }),
            Err(e) if config.fail_fast => Err(e),
            Err(e) => Ok(BatchReport {
                compiled: Vec::new(),
                failures: vec![(0, e)],
            }),
        };
    }

    let compile = Arc::new(compile);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_parallelism.min(entries.len()))
        .build()
        .map_err(|e| Error::compiler(format!("failed to create thread pool: {}", e)))?;

    let results: Vec<(usize, Result<T>)> = pool.install(|| {
        entries
            .par_iter()
            .enumerate()
            .map(|(index, entry)| (index, compile(entry)))
            .collect()
    });

    let mut report = BatchReport {
        compiled: Vec::new(),
        failures: Vec::new(),
    };
    for (index, result) in results {
        match result {
            Ok(output) => report.compiled.push(output),
            Err(e) if config.fail_fast => return Err(e),
            Err(e) => report.failures.push((index, e)),
        }
    }

    tracing::debug!(
        compiled = report.compiled.len(),
        failed = report.failures.len(),
        "batch compilation finished"
    );
    Ok(report)
}
