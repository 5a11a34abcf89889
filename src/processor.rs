use std::time::Duration;

use log::info;
use thiserror::Error;

use crate::{
    dispatch::Processor,
    memory::{DEFAULT_SAMPLING_INTERVAL, MemoryProbe, measure_peak},
    stats::Statistics,
    storage::{SampleStore, StoreError, TestResult},
};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("test_runs id {0} not found")]
    NotFound(i64),

    #[error("fetch task window failed: {0}")]
    TaskWindow(#[source] StoreError),

    #[error("fetch samples failed: {0}")]
    Samples(#[source] StoreError),

    #[error("insert test_result failed: {0}")]
    Record(#[source] StoreError),

    #[error("lookup test run failed: {0}")]
    Lookup(#[source] StoreError),
}

/// Computes statistics for one test run and stores them.
pub struct TestRunProcessor<S: SampleStore, M: MemoryProbe> {
    store: S,
    probe: M,
    sampling_interval: Duration,
}

impl<S: SampleStore, M: MemoryProbe> TestRunProcessor<S, M> {
    pub fn new(store: S, probe: M) -> Self {
        Self {
            store,
            probe,
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
        }
    }

    pub fn with_sampling_interval(mut self, interval: Duration) -> Self {
        self.sampling_interval = interval;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn run(&mut self, test_run_id: i64) -> Result<TestResult, ProcessError> {
        let exists = self
            .store
            .test_run_exists(test_run_id)
            .map_err(ProcessError::Lookup)?;
        if !exists {
            return Err(ProcessError::NotFound(test_run_id));
        }

        let window = self
            .store
            .task_window(test_run_id)
            .map_err(ProcessError::TaskWindow)?;
        let samples = self
            .store
            .samples(window)
            .map_err(ProcessError::Samples)?;

        let measurement = measure_peak(&self.probe, self.sampling_interval, || {
            Statistics::calculate(&samples)
        });
        let result = TestResult {
            statistics: measurement.value,
            duration: measurement.elapsed,
            memory_bytes: measurement.peak_bytes,
        };

        self.store
            .record_result(test_run_id, &result)
            .map_err(ProcessError::Record)?;

        info!(
            "processed test_run={test_run_id} samples={} duration={:.6}s memory_bytes={}",
            samples.len(),
            result.duration.as_secs_f64(),
            result.memory_bytes
        );
        Ok(result)
    }
}

impl<S: SampleStore, M: MemoryProbe> Processor for TestRunProcessor<S, M> {
    type Error = ProcessError;

    fn process(&mut self, id: i64) -> Result<(), ProcessError> {
        self.run(id).map(|_| ())
    }
}
