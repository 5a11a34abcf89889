use log::{debug, trace};
use postgres::{Client, NoTls};

use super::{SampleStore, StoreError, TaskWindow, TestResult};

const EXISTS_TEST_RUN: &str = "SELECT EXISTS(SELECT 1 FROM test_runs WHERE id = $1::bigint)";

const TASK_WINDOW: &str = "
SELECT tasks.page::bigint, tasks.per_page::bigint
FROM tasks
JOIN handlers ON handlers.task_id = tasks.id
JOIN test_runs ON test_runs.handler_id = handlers.id
WHERE test_runs.id = $1::bigint
LIMIT 1";

const SAMPLES: &str =
    "SELECT value::float8 FROM samples ORDER BY id ASC LIMIT $1::bigint OFFSET $2::bigint";

const INSERT_RESULT: &str = "
INSERT INTO test_results
  (test_run_id, mean, median, q1, q3, min, max, standard_deviation, duration, memory, created_at, updated_at)
VALUES ($1::bigint, $2::float8, $3::float8, $4::float8, $5::float8, $6::float8, $7::float8, $8::float8, $9::float8, $10::float8, NOW(), NOW())";

/// [`SampleStore`] over a single blocking PostgreSQL connection.
pub struct PgSampleStore {
    client: Client,
}

impl PgSampleStore {
    /// Connects using a libpq style DSN or a `postgres://` URL.
    pub fn connect(dsn: &str) -> Result<Self, StoreError> {
        let client = Client::connect(dsn, NoTls).map_err(StoreError::Connect)?;
        Ok(Self { client })
    }

    /// Round-trips a trivial query to make sure the server is reachable.
    pub fn ping(&mut self) -> Result<(), StoreError> {
        self.client
            .simple_query("SELECT 1")
            .map_err(|source| StoreError::Query {
                action: "ping",
                source,
            })?;
        Ok(())
    }
}

impl SampleStore for PgSampleStore {
    fn test_run_exists(&mut self, test_run_id: i64) -> Result<bool, StoreError> {
        let row = self
            .client
            .query_one(EXISTS_TEST_RUN, &[&test_run_id])
            .map_err(|source| StoreError::Query {
                action: "test run exists",
                source,
            })?;
        Ok(row.get(0))
    }

    fn task_window(&mut self, test_run_id: i64) -> Result<TaskWindow, StoreError> {
        let row = self
            .client
            .query_opt(TASK_WINDOW, &[&test_run_id])
            .map_err(|source| StoreError::Query {
                action: "task window",
                source,
            })?;

        let window = match row {
            Some(row) => TaskWindow::new(row.get(0), row.get(1)),
            None => {
                debug!("no task found for test_run={test_run_id}; using defaults");
                TaskWindow::default()
            }
        };
        Ok(window)
    }

    fn samples(&mut self, window: TaskWindow) -> Result<Vec<f64>, StoreError> {
        let (limit, offset) = window.limit_offset();
        trace!("fetching samples limit={limit} offset={offset}");

        let rows = self
            .client
            .query(SAMPLES, &[&limit, &offset])
            .map_err(|source| StoreError::Query {
                action: "samples",
                source,
            })?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get::<_, Option<f64>>(0))
            .collect())
    }

    fn record_result(&mut self, test_run_id: i64, result: &TestResult) -> Result<(), StoreError> {
        let st = &result.statistics;
        let duration = result.duration.as_secs_f64();
        let memory = result.memory_bytes as f64;

        self.client
            .execute(
                INSERT_RESULT,
                &[
                    &test_run_id,
                    &st.mean,
                    &st.median,
                    &st.q1,
                    &st.q3,
                    &st.min,
                    &st.max,
                    &st.std_dev,
                    &duration,
                    &memory,
                ],
            )
            .map_err(|source| StoreError::Query {
                action: "insert test result",
                source,
            })?;
        Ok(())
    }
}
