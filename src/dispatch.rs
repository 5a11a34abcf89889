use std::{collections::HashSet, fmt::Display};

use log::{info, warn};

use crate::job::Job;

/// Job classes processed when nothing else is configured.
pub const DEFAULT_CLASSES: [&str; 2] = ["RubyWorker", "GoWorker"];

/// Unit of work invoked once per accepted job.
pub trait Processor {
    type Error: Display;

    fn process(&mut self, id: i64) -> Result<(), Self::Error>;
}

/// Why a popped payload was not handed to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    InvalidJson,
    UnknownClass(String),
    MissingIdentifier,
}

/// Outcome of dispatching one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Processed(i64),
    Failed(i64),
    Skipped(Skip),
}

/// Filters jobs by class and runs the processor, never letting a single job
/// take the polling loop down.
pub struct Dispatcher<P: Processor> {
    classes: HashSet<String>,
    processor: P,
}

impl<P: Processor> Dispatcher<P> {
    pub fn new<I, S>(classes: I, processor: P) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            processor,
        }
    }

    pub fn with_default_classes(processor: P) -> Self {
        Self::new(DEFAULT_CLASSES, processor)
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn dispatch(&mut self, key: &str, payload: &str) -> Dispatch {
        let job = match Job::decode(payload) {
            Ok(job) => job,
            Err(e) => {
                warn!("invalid job json: {e}");
                return Dispatch::Skipped(Skip::InvalidJson);
            }
        };

        if !self.classes.contains(&job.class) {
            info!("skipping job class={}", job.class);
            return Dispatch::Skipped(Skip::UnknownClass(job.class));
        }

        let id = match job.identifier() {
            Ok(0) => {
                warn!("job missing test_run_id: {payload}");
                return Dispatch::Skipped(Skip::MissingIdentifier);
            }
            Ok(id) => id,
            Err(e) => {
                warn!("job missing test_run_id ({e}): {payload}");
                return Dispatch::Skipped(Skip::MissingIdentifier);
            }
        };

        info!(
            "popped key={key} job_queue={} class={} test_run_id={id}",
            job.queue, job.class
        );
        match self.processor.process(id) {
            Ok(()) => Dispatch::Processed(id),
            Err(e) => {
                warn!(
                    "process error key={key} class={} test_run_id={id} err={e}",
                    job.class
                );
                Dispatch::Failed(id)
            }
        }
    }
}
