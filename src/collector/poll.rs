//! Periodic command-polling collector.
//!
//! One worker thread per collector instance: poll the device at a fixed
//! period, buffer the readings, flush the whole buffer on exit. Exactly two
//! primitives cross the thread boundary — the stop signal (written by the
//! controller, read by the worker) and the unresponsive counter (written by
//! the worker, read by the controller after join). The worker result travels
//! through the `JoinHandle` and is consumed exactly once by `stop()`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;

use crate::collector::traits::{report_unresponsive, CollectorError, SampleSource};
use crate::session::{Sample, SessionWriter};

/// Lifecycle states of a collector session.
///
/// `start` is only valid from `Created`, `stop` from `Running`; there is no
/// way back to `Running`. A collector is created per session and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Scheduled-sampling collector driven by a pluggable [`SampleSource`].
///
/// The controller side of the pattern: owns the worker's execution context,
/// the stop signal and the unresponsive counter, and performs the join in
/// [`stop`](Self::stop).
pub struct PollCollector<S: SampleSource> {
    name: String,
    period: Duration,
    stop_signal: Arc<AtomicBool>,
    unresponsive: Arc<AtomicU32>,
    source: Option<S>,
    writer: Option<SessionWriter>,
    handle: Option<JoinHandle<Result<(), CollectorError>>>,
    state: Lifecycle,
}

impl<S: SampleSource> PollCollector<S> {
    /// Create a collector sampling `source` every `period`.
    ///
    /// A zero period is legal and yields tight polling. The loop does not
    /// compensate for drift: effective cadence is work time plus `period`.
    pub fn new(
        name: impl Into<String>,
        period: Duration,
        source: S,
        writer: SessionWriter,
    ) -> Self {
        Self {
            name: name.into(),
            period,
            stop_signal: Arc::new(AtomicBool::new(false)),
            unresponsive: Arc::new(AtomicU32::new(0)),
            source: Some(source),
            writer: Some(writer),
            handle: None,
            state: Lifecycle::Created,
        }
    }

    /// Collector name (used for the worker thread name and log fields).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of recoverable faults observed so far this session.
    pub fn unresponsive_count(&self) -> u32 {
        self.unresponsive.load(Ordering::Acquire)
    }

    /// Launch the polling loop on its own thread.
    ///
    /// # Errors
    /// Returns [`CollectorError::AlreadyStarted`] when called on a collector
    /// that is not freshly created; a second loop is never spawned.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.state != Lifecycle::Created {
            return Err(CollectorError::AlreadyStarted(self.name.clone()));
        }
        let (Some(source), Some(writer)) = (self.source.take(), self.writer.take()) else {
            return Err(CollectorError::AlreadyStarted(self.name.clone()));
        };

        // Fresh session: reset the signal before the worker exists, so a
        // stop() racing the spawn can never be lost.
        self.stop_signal.store(false, Ordering::Release);

        let worker = PollWorker {
            name: self.name.clone(),
            period: self.period,
            stop_signal: Arc::clone(&self.stop_signal),
            unresponsive: Arc::clone(&self.unresponsive),
            source,
            writer,
            samples: Vec::new(),
        };
        let handle = thread::Builder::new()
            .name(format!("collector-{}", self.name))
            .spawn(move || worker.run())
            .map_err(|e| CollectorError::Spawn {
                what: "collector thread",
                source: e,
            })?;

        self.handle = Some(handle);
        self.state = Lifecycle::Running;
        tracing::debug!(collector = %self.name, period = ?self.period, "collection started");
        Ok(())
    }

    /// Request termination and block until the worker has fully exited.
    ///
    /// After the join, the unresponsive count is reported (warn above the
    /// threshold, debug otherwise) and a failure captured on the worker is
    /// re-raised here, exactly once. Calling `stop` again on an already
    /// stopped collector returns `Ok` — the failure was already delivered.
    pub fn stop(&mut self) -> Result<(), CollectorError> {
        let Some(handle) = self.handle.take() else {
            tracing::debug!(collector = %self.name, "stop requested but collector is not running");
            return Ok(());
        };
        self.state = Lifecycle::Stopped;
        self.stop_signal.store(true, Ordering::Release);

        let result = handle
            .join()
            .map_err(|_| CollectorError::Panicked(self.name.clone()))?;
        report_unresponsive(&self.name, self.unresponsive.load(Ordering::Acquire));
        result?;
        tracing::debug!(collector = %self.name, "collection complete");
        Ok(())
    }

    /// Whether the polling loop's thread is still active.
    ///
    /// Hosts use this before `stop` to detect sessions that already ended on
    /// their own (note that `stop` must still be called to consume a captured
    /// failure and is safe on a finished worker).
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<S: SampleSource> std::fmt::Debug for PollCollector<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollCollector")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Worker side of the collector; owns the sample buffer exclusively until the
/// thread exits.
struct PollWorker<S> {
    name: String,
    period: Duration,
    stop_signal: Arc<AtomicBool>,
    unresponsive: Arc<AtomicU32>,
    source: S,
    writer: SessionWriter,
    samples: Vec<Sample>,
}

impl<S: SampleSource> PollWorker<S> {
    fn run(mut self) -> Result<(), CollectorError> {
        let outcome = self.poll_loop();

        // Finalize runs on every exit path. A flush failure must not mask the
        // first loop failure; first one wins.
        let flushed = self.writer.write_batch(&self.samples);
        match (outcome, flushed) {
            (Err(e), flush) => {
                if let Err(fe) = flush {
                    tracing::warn!(collector = %self.name, error = %fe, "session flush failed after worker error");
                }
                Err(e)
            }
            (Ok(()), Err(fe)) => Err(CollectorError::Session(fe)),
            (Ok(()), Ok(())) => {
                tracing::debug!(collector = %self.name, samples = self.samples.len(), "session data written");
                Ok(())
            }
        }
    }

    fn poll_loop(&mut self) -> Result<(), CollectorError> {
        while !self.stop_signal.load(Ordering::Acquire) {
            let ts = Utc::now();
            match self.source.sample() {
                Ok(payload) => self.samples.push(Sample::at(ts, payload)),
                Err(e) if e.is_transport_fatal() => {
                    tracing::error!(collector = %self.name, error = %e, "device stopped responding, aborting collection");
                    return Err(CollectorError::Device(e));
                }
                Err(e) => {
                    tracing::warn!(collector = %self.name, error = %e, "exception on collector thread");
                    self.unresponsive.fetch_add(1, Ordering::AcqRel);
                    return Err(CollectorError::Worker {
                        collector: self.name.clone(),
                        source: e,
                    });
                }
            }
            thread::sleep(self.period);
        }
        tracing::debug!(collector = %self.name, "collection stopped");
        Ok(())
    }
}
