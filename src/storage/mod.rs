//! Sample storage.
//!
//! Test runs point (through their handler) at a task, and the task describes
//! a page of the `samples` table. This module reads that page and writes the
//! computed statistics back into `test_results`.
//!
//! # Key Components
//!
//! - [`SampleStore`]: the operations the processor needs from a store.
//! - [`TaskWindow`]: a normalized page/per-page pair.
//! - [`PgSampleStore`]: PostgreSQL implementation.
mod pg;

pub use pg::PgSampleStore;

use std::time::Duration;

use crate::stats::Statistics;

pub use error::StoreError;

/// A page of samples. Both values are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskWindow {
    page: i64,
    per_page: i64,
}

impl TaskWindow {
    /// Missing or non-positive values fall back to 1.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: normalize_positive(page, 1),
            per_page: normalize_positive(per_page, 1),
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    /// `(limit, offset)` for a query over rows ordered by id.
    pub fn limit_offset(&self) -> (i64, i64) {
        (self.per_page, (self.page - 1) * self.per_page)
    }
}

impl Default for TaskWindow {
    fn default() -> Self {
        Self::new(None, None)
    }
}

pub fn normalize_positive(value: Option<i64>, fallback: i64) -> i64 {
    match value {
        Some(v) if v > 0 => v,
        _ => fallback,
    }
}

/// Everything recorded for one processed test run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistics: Statistics,
    pub duration: Duration,
    pub memory_bytes: u64,
}

pub trait SampleStore {
    /// Whether the test run exists. A failed lookup is an error, not `false`.
    fn test_run_exists(&mut self, test_run_id: i64) -> Result<bool, StoreError>;

    /// Window of the task the test run belongs to; defaults when none is found.
    fn task_window(&mut self, test_run_id: i64) -> Result<TaskWindow, StoreError>;

    /// Non-null sample values inside `window`, ordered by id.
    fn samples(&mut self, window: TaskWindow) -> Result<Vec<f64>, StoreError>;

    fn record_result(&mut self, test_run_id: i64, result: &TestResult) -> Result<(), StoreError>;
}

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum StoreError {
        #[error("[store][{action}] query failed: {source}")]
        Query {
            action: &'static str,
            #[source]
            source: postgres::Error,
        },

        #[error("[store] connection failed: {0}")]
        Connect(#[source] postgres::Error),

        #[error("[store][{action}] {reason}")]
        Backend {
            action: &'static str,
            reason: String,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_limit_offset() {
        assert_eq!(TaskWindow::new(Some(3), Some(5)).limit_offset(), (5, 10));
        assert_eq!(TaskWindow::new(Some(1), Some(20)).limit_offset(), (20, 0));
    }

    #[test]
    fn window_defaults() {
        assert_eq!(TaskWindow::new(Some(-1), Some(0)).limit_offset(), (1, 0));
        assert_eq!(TaskWindow::new(None, None), TaskWindow::default());
        assert_eq!(TaskWindow::default().page(), 1);
        assert_eq!(TaskWindow::default().per_page(), 1);
    }

    #[test]
    fn normalize() {
        assert_eq!(normalize_positive(Some(7), 1), 7);
        assert_eq!(normalize_positive(Some(0), 2), 2);
        assert_eq!(normalize_positive(None, 3), 3);
    }
}
