//! Collector Layer
//!
//! Background sampling collectors for managed devices. One worker thread per
//! collector instance; a controller starts the worker, signals stop, joins,
//! and re-raises any failure captured on the worker thread.
//!
//! # Architecture
//!
//! - [`PollCollector`]: periodic request/response sampling via a [`SampleSource`]
//! - [`StreamCollector`]: continuous feed from an owned external process,
//!   filtered line by line via a [`LineFilter`]
//! - [`CommandProbe`] / [`TraceLineFilter`]: the standard strategies backing
//!   the two shapes
//!
//! # Example
//!
//! ```rust,no_run
//! use sonde::{CommandProbe, LocalShellExecutor, PollCollector, SessionWriter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(LocalShellExecutor);
//! let probe = CommandProbe::new(executor, "cat /sys/class/thermal/thermal_zone5/temp");
//! let writer = SessionWriter::new("/tmp/temperature.json");
//! let mut collector = PollCollector::new("temperature", Duration::from_millis(250), probe, writer);
//!
//! collector.start()?;
//! // ... workload runs ...
//! collector.stop()?;
//! # Ok(())
//! # }
//! ```

mod poll;
mod stream;
mod traits;

pub use poll::PollCollector;
pub use stream::{StreamCollector, TraceLineFilter};
pub use traits::{
    CollectorError, CommandProbe, LineFilter, SampleSource, UNRESPONSIVE_WARN_THRESHOLD,
};
