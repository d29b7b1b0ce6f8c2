//! Streaming collector over a continuously-emitting feed process.
//!
//! Where the polling collector asks the device for a reading on a period, the
//! streaming collector owns an external process (e.g. a device log reader),
//! consumes its output line by line, and writes each successfully parsed line
//! through to the session sink immediately. Resource ownership extends beyond
//! the worker thread to the feed process handle: `stop()` terminates the
//! process (unblocking a reader stuck on the pipe) before joining.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};

use regex::Regex;

use crate::collector::traits::{report_unresponsive, CollectorError, LineFilter};
use crate::executor::ExecError;
use crate::session::LineSink;

/// Default pattern for kernel trace feed lines.
///
/// Matches the device log format `MM-DD HH:MM:SS.mmm  pid  tid L Kernel-Trace: record`
/// and captures the record portion.
const KERNEL_TRACE_PATTERN: &str =
    r"^\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d+\s+\d+\s+\d+\s+[A-Z]\s+Kernel-Trace\s*:\s*(.+)$";

/// Regex-based line filter for trace feeds.
///
/// Keeps lines matching the pattern and emits the first capture group as the
/// record; everything else is dropped (and logged by the collector).
#[derive(Debug, Clone)]
pub struct TraceLineFilter {
    pattern: Regex,
}

impl TraceLineFilter {
    /// Build a filter from a custom pattern with one capture group.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Default for TraceLineFilter {
    fn default() -> Self {
        static COMPILED: OnceLock<Regex> = OnceLock::new();
        let pattern = COMPILED.get_or_init(|| {
            Regex::new(KERNEL_TRACE_PATTERN).expect("failed to compile kernel trace pattern")
        });
        Self {
            pattern: pattern.clone(),
        }
    }
}

impl LineFilter for TraceLineFilter {
    fn filter(&mut self, line: &str) -> Option<String> {
        let caps = self.pattern.captures(line.trim_end())?;
        caps.get(1).map(|m| m.as_str().to_string())
    }
}

/// Lifecycle states of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Collector consuming a continuous external feed.
///
/// The feed command is run through the shell with piped stdout; the stdout
/// handle moves to the worker thread while the process handle stays with the
/// controller so `stop()` can terminate it. Termination reaches the direct
/// child only: a feed that forks long-lived children should `exec` into the
/// long-running command so the kill unblocks the reader.
pub struct StreamCollector<F: LineFilter> {
    name: String,
    command: String,
    sink_path: PathBuf,
    filter: Option<F>,
    stop_signal: Arc<AtomicBool>,
    unresponsive: Arc<AtomicU32>,
    handle: Option<JoinHandle<Result<(), CollectorError>>>,
    child: Option<Child>,
    state: Lifecycle,
}

impl<F: LineFilter> StreamCollector<F> {
    /// Create a streaming collector running `command` and writing parsed
    /// records to `sink_path`.
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        filter: F,
        sink_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            sink_path: sink_path.into(),
            filter: Some(filter),
            stop_signal: Arc::new(AtomicBool::new(false)),
            unresponsive: Arc::new(AtomicU32::new(0)),
            handle: None,
            child: None,
            state: Lifecycle::Created,
        }
    }

    /// Collector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of lines the filter rejected so far this session.
    pub fn unresponsive_count(&self) -> u32 {
        self.unresponsive.load(Ordering::Acquire)
    }

    /// Spawn the feed process and launch the line loop on its own thread.
    ///
    /// # Errors
    /// Returns [`CollectorError::AlreadyStarted`] when called on a collector
    /// that is not freshly created, and [`CollectorError::Spawn`] if the feed
    /// process or the worker thread cannot be launched.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.state != Lifecycle::Created {
            return Err(CollectorError::AlreadyStarted(self.name.clone()));
        }
        let Some(filter) = self.filter.take() else {
            return Err(CollectorError::AlreadyStarted(self.name.clone()));
        };

        self.stop_signal.store(false, Ordering::Release);

        // Sink before process: if the sink cannot be opened there is nothing
        // to clean up yet.
        let sink = LineSink::create(&self.sink_path)?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CollectorError::Spawn {
                what: "stream feed process",
                source: e,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| CollectorError::Spawn {
            what: "stream feed stdout",
            source: std::io::Error::other("stdout was not captured"),
        })?;

        let worker = StreamWorker {
            name: self.name.clone(),
            stop_signal: Arc::clone(&self.stop_signal),
            unresponsive: Arc::clone(&self.unresponsive),
            stdout,
            filter,
            sink,
        };
        let handle = match thread::Builder::new()
            .name(format!("collector-{}", self.name))
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CollectorError::Spawn {
                    what: "collector thread",
                    source: e,
                });
            }
        };

        self.child = Some(child);
        self.handle = Some(handle);
        self.state = Lifecycle::Running;
        tracing::debug!(collector = %self.name, command = %self.command, "stream collection started");
        Ok(())
    }

    /// Request termination: terminate the owned feed process, then join the
    /// worker and deliver its result.
    ///
    /// Killing the process first guarantees a reader blocked on the pipe
    /// observes end-of-feed and can exit; the join then completes. Calling
    /// `stop` again on an already stopped collector returns `Ok`.
    pub fn stop(&mut self) -> Result<(), CollectorError> {
        let Some(handle) = self.handle.take() else {
            tracing::debug!(collector = %self.name, "stop requested but collector is not running");
            return Ok(());
        };
        self.state = Lifecycle::Stopped;
        self.stop_signal.store(true, Ordering::Release);

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::debug!(collector = %self.name, error = %e, "stream feed process already exited");
            }
            if let Err(e) = child.wait() {
                tracing::warn!(collector = %self.name, error = %e, "failed to reap stream feed process");
            }
        }

        let result = handle
            .join()
            .map_err(|_| CollectorError::Panicked(self.name.clone()))?;
        report_unresponsive(&self.name, self.unresponsive.load(Ordering::Acquire));
        result?;
        tracing::debug!(collector = %self.name, "collection complete");
        Ok(())
    }

    /// Whether the line loop's thread is still active.
    ///
    /// A finished worker (feed ended on its own) still needs `stop()` to
    /// consume a captured failure; `stop` is safe in that case.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<F: LineFilter> std::fmt::Debug for StreamCollector<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCollector")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Worker side: reads the feed line by line and writes parsed records through.
struct StreamWorker<F> {
    name: String,
    stop_signal: Arc<AtomicBool>,
    unresponsive: Arc<AtomicU32>,
    stdout: ChildStdout,
    filter: F,
    sink: LineSink,
}

impl<F: LineFilter> StreamWorker<F> {
    fn run(self) -> Result<(), CollectorError> {
        let Self {
            name,
            stop_signal,
            unresponsive,
            stdout,
            mut filter,
            mut sink,
        } = self;

        let mut outcome: Result<(), CollectorError> = Ok(());
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            if stop_signal.load(Ordering::Acquire) {
                break;
            }
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    // A pipe error after the feed was killed is the normal
                    // stop path, not a fault.
                    if stop_signal.load(Ordering::Acquire) {
                        break;
                    }
                    tracing::warn!(collector = %name, error = %e, "exception on collector thread");
                    outcome = Err(CollectorError::Worker {
                        collector: name.clone(),
                        source: ExecError::Io(e),
                    });
                    break;
                }
            };
            match filter.filter(&line) {
                Some(record) => {
                    if let Err(e) = sink.append(&record) {
                        tracing::warn!(collector = %name, error = %e, "exception on collector thread");
                        outcome = Err(CollectorError::Session(e));
                        break;
                    }
                }
                None => {
                    tracing::warn!(collector = %name, line = %line, "line was not parsed, dropping");
                    unresponsive.fetch_add(1, Ordering::AcqRel);
                }
            }
        }
        if outcome.is_ok() {
            tracing::debug!(collector = %name, records = sink.records_written(), "stream collection stopped");
        }

        // Finalize runs on every exit path; a flush failure must not mask the
        // first loop failure.
        let flushed = sink.finish();
        match (outcome, flushed) {
            (Err(e), flush) => {
                if let Err(fe) = flush {
                    tracing::warn!(collector = %name, error = %fe, "session flush failed after worker error");
                }
                Err(e)
            }
            (Ok(()), Err(fe)) => Err(CollectorError::Session(fe)),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_until_finished<F: LineFilter>(collector: &StreamCollector<F>) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while collector.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!collector.is_running(), "worker did not finish in time");
    }

    #[test]
    fn test_default_filter_extracts_record() {
        let mut filter = TraceLineFilter::default();
        let record = filter
            .filter("01-17 12:34:56.789  1234  1234 I Kernel-Trace: cpu_frequency: state=1200000 cpu_id=0")
            .unwrap();
        assert_eq!(record, "cpu_frequency: state=1200000 cpu_id=0");
    }

    #[test]
    fn test_default_filter_rejects_other_tags() {
        let mut filter = TraceLineFilter::default();
        assert!(filter
            .filter("01-17 12:34:56.789  1234  1234 I ActivityManager: resumed")
            .is_none());
        assert!(filter.filter("garbage").is_none());
    }

    #[test]
    fn test_stream_session_filters_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("trace.log");

        let feed = r"printf 'trace: one\nmalformed\ntrace: two\ntrace: three\ntrace: four\n'";
        let filter = TraceLineFilter::new(r"^trace: (.+)$").unwrap();
        let mut collector = StreamCollector::new("trace-test", feed, filter, &out);

        collector.start().unwrap();
        wait_until_finished(&collector);
        collector.stop().unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let records: Vec<&str> = content.lines().collect();
        assert_eq!(records, vec!["one", "two", "three", "four"]);
        assert_eq!(collector.unresponsive_count(), 1);
    }

    #[test]
    fn test_stop_terminates_blocked_feed() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("trace.log");

        // Feed emits one line, then blocks; stop must unblock the reader by
        // terminating the process. `exec` keeps the feed a single process so
        // the kill reaches the holder of the pipe.
        let feed = r#"printf 'trace: first\n'; exec sleep 30"#;
        let filter = TraceLineFilter::new(r"^trace: (.+)$").unwrap();
        let mut collector = StreamCollector::new("trace-block", feed, filter, &out);

        collector.start().unwrap();
        thread::sleep(Duration::from_millis(200));

        let begun = Instant::now();
        collector.stop().unwrap();
        assert!(begun.elapsed() < Duration::from_secs(5));

        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(content, "first\n");
    }

    #[test]
    fn test_stream_double_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("trace.log");
        let filter = TraceLineFilter::new(r"^(.+)$").unwrap();
        let mut collector = StreamCollector::new("trace-twice", "printf ''", filter, &out);

        collector.start().unwrap();
        assert!(matches!(
            collector.start(),
            Err(CollectorError::AlreadyStarted(_))
        ));
        collector.stop().unwrap();
    }
}
