use std::{
    io::{Read, Write},
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::{
    dispatch::{Dispatch, Dispatcher, Processor},
    protocol::{Popped, TransportError},
};

use super::Session;

/// Seconds the server waits for a job before answering with nil.
pub const DEFAULT_POP_WAIT_SECS: u64 = 5;
/// Idle time after which a liveness line is logged.
pub const DEFAULT_IDLE_HEARTBEAT: Duration = Duration::from_secs(60);

/// Counters for one polling session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub timeouts: u64,
    pub jobs: u64,
    pub heartbeats: u64,
}

/// Issues blocking pops against one queue and feeds jobs to the dispatcher.
#[derive(Debug, Clone)]
pub struct QueuePoller {
    queue: String,
    wait_secs: u64,
    idle_heartbeat: Duration,
    stats: PollStats,
}

impl QueuePoller {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            wait_secs: DEFAULT_POP_WAIT_SECS,
            idle_heartbeat: DEFAULT_IDLE_HEARTBEAT,
            stats: PollStats::default(),
        }
    }

    pub fn with_wait_secs(mut self, wait_secs: u64) -> Self {
        self.wait_secs = wait_secs;
        self
    }

    pub fn with_idle_heartbeat(mut self, idle: Duration) -> Self {
        self.idle_heartbeat = idle;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Counters of the current (or last) session.
    pub fn stats(&self) -> PollStats {
        self.stats
    }

    /// Pops until the session breaks. Only returns on a write or decode
    /// error; the session must be dropped afterwards.
    pub fn run<T, P>(
        &mut self,
        session: &mut Session<T>,
        dispatcher: &mut Dispatcher<P>,
    ) -> TransportError
    where
        T: Read + Write,
        P: Processor,
    {
        self.stats = PollStats::default();
        let mut last_activity = Instant::now();

        loop {
            let popped = match session.transport.blocking_pop(&self.queue, self.wait_secs) {
                Ok(popped) => popped,
                Err(e) => return e,
            };

            match popped {
                Popped::Timeout => {
                    self.stats.timeouts += 1;
                    if last_activity.elapsed() >= self.idle_heartbeat {
                        info!("idle (no jobs) queue={}", self.queue);
                        self.stats.heartbeats += 1;
                        last_activity = Instant::now();
                    }
                }
                Popped::Job { key, payload } => {
                    self.stats.jobs += 1;
                    last_activity = Instant::now();

                    match dispatcher.dispatch(&key, &payload) {
                        Dispatch::Skipped(reason) => debug!("job skipped: {reason:?}"),
                        outcome => debug!("job finished: {outcome:?}"),
                    }
                }
            }
        }
    }
}
