//! Host-framework instrument surface.
//!
//! An external test-iteration orchestrator drives measurement through four
//! hook points: `setup` (once per session, with the session context),
//! `start`, `stop`, and `update_result`. The instruments here are thin
//! adapters wiring those hooks to a collector; registration, parameter
//! declaration and workload metadata stay with the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::collector::{
    CollectorError, CommandProbe, PollCollector, StreamCollector, TraceLineFilter,
};
use crate::config::{PollConfig, TraceConfig, expand_env_vars};
use crate::executor::{CommandExecutor, ExecError};
use crate::session::SessionWriter;

/// The two collector shapes an instrument can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CollectorKind {
    /// Periodic request/response sampling.
    Poll,
    /// Continuous feed from an owned external process.
    Trace,
}

/// Per-session context supplied by the host framework.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Directory receiving this session's output artifacts.
    pub output_dir: PathBuf,
}

impl SessionContext {
    /// Create a context writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

/// Errors raised by instrument hooks.
#[derive(Debug, Error)]
pub enum InstrumentError {
    /// The underlying collector failed.
    #[error(transparent)]
    Collector(#[from] CollectorError),

    /// A device setup command failed (e.g. enabling a trace event).
    #[error("device setup command failed: {0}")]
    Setup(#[from] ExecError),

    /// Invalid trace filter pattern.
    #[error("invalid trace filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A hook was invoked before `setup`.
    #[error("instrument '{0}' was not set up before use")]
    NotSetUp(String),
}

/// Lifecycle hooks invoked by the external orchestrator.
pub trait Instrument {
    /// Instrument name; also names the session output file.
    fn name(&self) -> &str;

    /// Which collector shape this instrument hosts.
    fn kind(&self) -> CollectorKind;

    /// Prepare the session: resolve output paths, configure the device,
    /// build the collector.
    fn setup(&mut self, ctx: &SessionContext) -> Result<(), InstrumentError>;

    /// Begin collection.
    fn start(&mut self) -> Result<(), InstrumentError>;

    /// End collection; re-raises a failure captured during the session.
    fn stop(&mut self) -> Result<(), InstrumentError>;

    /// Post-session result processing hook. Most instruments have nothing to
    /// add here.
    fn update_result(&mut self) -> Result<(), InstrumentError> {
        Ok(())
    }
}

/// Instrument hosting a periodic command-polling collector.
pub struct PollInstrument<E: CommandExecutor> {
    config: PollConfig,
    executor: Arc<E>,
    collector: Option<PollCollector<CommandProbe<E>>>,
}

impl<E: CommandExecutor> PollInstrument<E> {
    /// Create an instrument from its configuration and a device executor.
    pub fn new(config: PollConfig, executor: Arc<E>) -> Self {
        Self {
            config,
            executor,
            collector: None,
        }
    }
}

impl<E: CommandExecutor> Instrument for PollInstrument<E> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> CollectorKind {
        CollectorKind::Poll
    }

    fn setup(&mut self, ctx: &SessionContext) -> Result<(), InstrumentError> {
        let outfile = ctx.output_dir.join(format!("{}.json", self.config.name));
        let command = expand_env_vars(&self.config.command);
        let probe = CommandProbe::new(Arc::clone(&self.executor), command);
        self.collector = Some(PollCollector::new(
            self.config.name.as_str(),
            self.config.period,
            probe,
            SessionWriter::new(outfile),
        ));
        Ok(())
    }

    fn start(&mut self) -> Result<(), InstrumentError> {
        if !self.config.enabled {
            return Ok(());
        }
        tracing::debug!(instrument = %self.config.name, "starting collection");
        let collector = self
            .collector
            .as_mut()
            .ok_or_else(|| InstrumentError::NotSetUp(self.config.name.clone()))?;
        collector.start()?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), InstrumentError> {
        if !self.config.enabled {
            return Ok(());
        }
        let Some(collector) = self.collector.as_mut() else {
            return Ok(());
        };
        tracing::debug!(instrument = %self.config.name, "stopping collection");
        collector.stop()?;
        Ok(())
    }
}

/// Instrument hosting a streaming trace collector.
///
/// Setup enables the session's event categories on the device (built-in
/// defaults merged with the configured list) before the feed starts.
pub struct TraceInstrument<E> {
    config: TraceConfig,
    executor: Arc<E>,
    collector: Option<StreamCollector<TraceLineFilter>>,
}

impl<E: CommandExecutor> TraceInstrument<E> {
    /// Create an instrument from its configuration and a device executor.
    pub fn new(config: TraceConfig, executor: Arc<E>) -> Self {
        Self {
            config,
            executor,
            collector: None,
        }
    }
}

impl<E: CommandExecutor> Instrument for TraceInstrument<E> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> CollectorKind {
        CollectorKind::Trace
    }

    fn setup(&mut self, ctx: &SessionContext) -> Result<(), InstrumentError> {
        for event in self.config.effective_events() {
            self.executor.execute(&format!("trace enable {event}"))?;
        }

        let filter = match self.config.pattern {
            Some(ref pattern) => TraceLineFilter::new(pattern)?,
            None => TraceLineFilter::default(),
        };
        let outfile = ctx.output_dir.join(format!("{}.log", self.config.name));
        let command = expand_env_vars(&self.config.stream_command);
        self.collector = Some(StreamCollector::new(
            self.config.name.as_str(),
            command,
            filter,
            outfile,
        ));
        Ok(())
    }

    fn start(&mut self) -> Result<(), InstrumentError> {
        if !self.config.enabled {
            return Ok(());
        }
        tracing::debug!(instrument = %self.config.name, "starting collection");
        let collector = self
            .collector
            .as_mut()
            .ok_or_else(|| InstrumentError::NotSetUp(self.config.name.clone()))?;
        collector.start()?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), InstrumentError> {
        if !self.config.enabled {
            return Ok(());
        }
        let Some(collector) = self.collector.as_mut() else {
            return Ok(());
        };
        tracing::debug!(instrument = %self.config.name, "stopping collection");
        collector.stop()?;
        Ok(())
    }
}
