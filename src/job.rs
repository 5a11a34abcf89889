//! Queue job payloads.
//!
//! Jobs arrive as JSON objects in the Sidekiq layout:
//!
//! ```json
//! {"class": "GoWorker", "queue": "default", "args": [42]}
//! ```
//!
//! Only the first argument matters to this worker; it carries the identifier
//! of the test run to process, either as a JSON number or as a quoted string.
//!
//! # Example
//! ```rust
//! use stats_worker::job::Job;
//!
//! let job = Job::decode(r#"{"class":"GoWorker","queue":"default","args":["17"]}"#).unwrap();
//! assert_eq!(job.identifier().unwrap(), 17);
//! ```
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("job has no arguments")]
    MissingArgument,

    #[error("empty string argument")]
    EmptyArgument,

    #[error("invalid integer argument '{0}'")]
    InvalidInteger(String),

    #[error("unsupported argument: {0}")]
    Unsupported(String),
}

/// A decoded job. Missing fields default to empty values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Job {
    pub fn decode(payload: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Coerces the first argument into an identifier.
    pub fn identifier(&self) -> Result<i64, JobError> {
        let arg = self.args.first().ok_or(JobError::MissingArgument)?;
        parse_identifier(arg)
    }
}

/// Accepts a JSON integer or a string holding a base-10 integer.
pub fn parse_identifier(value: &Value) -> Result<i64, JobError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| JobError::InvalidInteger(n.to_string())),
        Value::String(s) if s.is_empty() => Err(JobError::EmptyArgument),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| JobError::InvalidInteger(s.clone())),
        other => Err(JobError::Unsupported(other.to_string())),
    }
}
