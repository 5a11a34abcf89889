//! Peak resident memory sampling.
//!
//! [`measure_peak`] runs a unit of work on the calling thread while a second,
//! scoped thread polls a [`MemoryProbe`] at a fixed interval. The two only
//! share an atomic maximum. The sampler is told to stop over a channel, takes
//! one last reading and is joined before the peak is read.
use std::{
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::{Duration, Instant},
};

use log::trace;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_millis(10);

/// Reads the current resident set size of this process, in bytes.
/// Returns `0` when the value is unavailable.
pub trait MemoryProbe: Sync {
    fn resident_bytes(&self) -> u64;
}

/// [`MemoryProbe`] backed by `sysinfo`.
pub struct SysinfoProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn resident_bytes(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let Ok(mut system) = self.system.lock() else {
            return 0;
        };

        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::new().with_memory(),
        );
        system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

/// Result of a measured unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement<T> {
    pub value: T,
    pub elapsed: Duration,
    pub peak_bytes: u64,
}

/// Runs `work` and reports its result, wall time and the highest resident
/// memory reading observed from just before it started until it finished.
pub fn measure_peak<P, T, F>(probe: &P, interval: Duration, work: F) -> Measurement<T>
where
    P: MemoryProbe,
    F: FnOnce() -> T,
{
    let peak = AtomicU64::new(probe.resident_bytes());
    let (stop, stopped) = mpsc::channel::<()>();

    let (value, elapsed) = thread::scope(|scope| {
        let peak = &peak;
        let sampler = scope.spawn(move || {
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        peak.fetch_max(probe.resident_bytes(), Ordering::Relaxed);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            peak.fetch_max(probe.resident_bytes(), Ordering::Relaxed);
        });

        let start = Instant::now();
        let value = work();
        let elapsed = start.elapsed();

        drop(stop);
        if sampler.join().is_err() {
            trace!("memory sampler panicked");
        }
        (value, elapsed)
    });

    Measurement {
        value,
        elapsed,
        peak_bytes: peak.into_inner(),
    }
}
