//! Metric collection: startup source discovery plus per-tick sampling.

pub mod gpu;
pub mod locate;
pub mod mock;
pub mod parser;
pub mod sampler;
pub mod traits;

use std::path::PathBuf;

use tracing::debug;

use crate::config::CollectorConfig;
use crate::model::{MetricSnapshot, ResolvedSources};

use gpu::GpuTelemetry;
use locate::SourceLocator;
use sampler::{CollectError, SampleState, Sampler};
use traits::{CommandRunner, FileSystem};

/// The assembled collector: resolved sources, a vendor GPU reader and the
/// differential state, driven once per tick by the daemon.
pub struct StatCollector<F> {
    sampler: Sampler<F>,
    sources: ResolvedSources,
    gpu: Box<dyn GpuTelemetry>,
    state: SampleState,
}

impl<F: FileSystem + Clone + 'static> StatCollector<F> {
    /// Runs source discovery once and assembles the collector.
    pub fn new<R: CommandRunner + Clone + 'static>(
        fs: F,
        runner: R,
        config: &CollectorConfig,
        proc_path: impl Into<PathBuf>,
        sys_path: impl Into<PathBuf>,
    ) -> Self {
        let sys_path = sys_path.into();

        let locator = SourceLocator::new(fs.clone(), runner.clone(), sys_path.clone());
        let sources = locator.locate(config);

        let gpu = gpu::for_kind(config.gpu, fs.clone(), runner, sys_path.clone());
        let sampler = Sampler::new(fs, proc_path, sys_path, config.net_interface.clone());

        Self {
            sampler,
            sources,
            gpu,
            state: SampleState::new(),
        }
    }

    /// Collects one snapshot, advancing the differential baselines.
    ///
    /// On error all baselines are discarded, so the next successful tick
    /// behaves like a first tick and reports zero deltas instead of a
    /// delta spanning the failed interval.
    pub fn collect_snapshot(&mut self) -> Result<MetricSnapshot, CollectError> {
        match self
            .sampler
            .sample(&self.sources, self.gpu.as_ref(), &mut self.state)
        {
            Ok(snapshot) => {
                debug!(?snapshot, "collected snapshot");
                Ok(snapshot)
            }
            Err(err) => {
                self.state.reset();
                Err(err)
            }
        }
    }

    /// The sources resolved at startup.
    pub fn sources(&self) -> &ResolvedSources {
        &self.sources
    }
}
