//! Sonde - Background Device Telemetry Sampling
//!
//! This crate provides background collectors that repeatedly query a managed
//! device for a reading on a fixed period, buffer the readings in memory, and
//! flush them to durable storage when sampling stops. It can be used as a
//! library by a test-run orchestrator, or exercised standalone with the
//! `sonde` executable.
//!
//! # Architecture
//!
//! - **Executors**: command execution against the device (consumed interface)
//! - **Collectors**: the polling loop / streaming feed, stop/join lifecycle,
//!   captured-failure delivery
//! - **Session output**: batch JSON documents and line-oriented record logs
//! - **Instruments**: the setup/start/stop/update_result hooks a host
//!   framework drives
//! - **Config**: YAML collector definitions with an include directory
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
//! let probe = CommandProbe::new(executor, "cat /proc/loadavg");
//! let mut collector = PollCollector::new(
//!     "loadavg",
//!     Duration::from_millis(250),
//!     probe,
//!     SessionWriter::new("loadavg.json"),
//! );
//!
//! collector.start()?;
//! std::thread::sleep(Duration::from_secs(2));
//! collector.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod executor;
pub mod instrument;
pub mod session;

pub use collector::{
    CollectorError, CommandProbe, LineFilter, PollCollector, SampleSource, StreamCollector,
    TraceLineFilter, UNRESPONSIVE_WARN_THRESHOLD,
};
pub use config::{AppConfig, CollectorsConfig, ConfigError, PollConfig, TraceConfig};
pub use executor::{CommandExecutor, ExecError, LocalShellExecutor};
pub use instrument::{
    CollectorKind, Instrument, InstrumentError, PollInstrument, SessionContext, TraceInstrument,
};
pub use session::{LineSink, Sample, SessionError, SessionWriter};
