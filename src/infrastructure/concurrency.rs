//! Thread pool setup for batch analysis.

use anyhow::Result;
use tracing::info;

/// Initialize the global rayon thread pool. `jobs == 0` uses every core.
pub fn init_thread_pool(jobs: usize) -> Result<()> {
    let cores = num_cpus::get();
    let workers = if jobs == 0 { cores } else { jobs };

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("solpattern-worker-{index}"))
        .build_global()?;

    info!(workers, cores, "thread pool initialized");

    Ok(())
}
