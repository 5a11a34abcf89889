pub mod config;
pub mod dispatch;
pub mod job;
pub mod memory;
pub mod processor;
pub mod protocol;
pub mod stats;
pub mod storage;
pub mod worker;

#[cfg(test)]
mod testing;

pub use dispatch::{Dispatcher, Processor};
pub use processor::TestRunProcessor;
pub use stats::Statistics;
