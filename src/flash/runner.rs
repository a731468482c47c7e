use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::FlashError;

/// How often the supervisor checks whether the child has exited.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still collected after the child has exited. Helper
/// processes that inherited the pipes are not waited for beyond this.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

/// Progress of a running flash task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashEvent {
    /// One line from stdout or stderr.
    Output(String),
    /// Sent once, after the process has exited.
    Finished(FlashReport),
}

/// Outcome of one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// stdout and stderr, interleaved in arrival order.
    pub output: String,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl FlashReport {
    pub fn success(&self) -> bool {
        !self.cancelled && self.exit_code == Some(0)
    }
}

/// A tool process running in the background.
pub struct FlashTask {
    events: Receiver<FlashEvent>,
    child: Arc<Mutex<Child>>,
    cancelled: Arc<AtomicBool>,
    supervisor: Option<JoinHandle<()>>,
    started: Instant,
}

fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read `stream` line by line into `tx` until EOF.
fn forward_lines(stream: Box<dyn Read + Send>, tx: Sender<String>) {
    let reader = BufReader::new(stream);
    for chunk in reader.split(b'\n') {
        let Ok(chunk) = chunk else { break };
        let line = String::from_utf8_lossy(&chunk);
        if tx.send(line.trim_end_matches('\r').to_string()).is_err() {
            break;
        }
    }
}

fn record(line: String, output: &mut String, events: &Sender<FlashEvent>) {
    output.push_str(&line);
    output.push('\n');
    // 受信側が破棄されていても出力の収集は続ける
    let _ = events.send(FlashEvent::Output(line));
}

fn supervise(
    child: Arc<Mutex<Child>>,
    cancelled: Arc<AtomicBool>,
    lines: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
    events: Sender<FlashEvent>,
    started: Instant,
) {
    let mut output = String::new();

    let exit_code = loop {
        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => record(line, &mut output, &events),
            Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
            Err(RecvTimeoutError::Timeout) => {}
        }
        match lock(&child).try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "lost track of flash process");
                break None;
            }
        }
    };

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match lines.recv_timeout(remaining) {
            Ok(line) => record(line, &mut output, &events),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("output pipes still open after exit, not waiting");
                break;
            }
        }
    }
    // 読み取りスレッドはパイプが閉じた時点で終わる
    drop(readers);

    let report = FlashReport {
        exit_code,
        output,
        elapsed: started.elapsed(),
        cancelled: cancelled.load(Ordering::SeqCst),
    };
    tracing::info!(
        exit_code = ?report.exit_code,
        elapsed_ms = report.elapsed.as_millis() as u64,
        cancelled = report.cancelled,
        "flash process finished"
    );
    let _ = events.send(FlashEvent::Finished(report));
}

impl FlashTask {
    /// Start `program` with `args`, capturing both output streams.
    pub fn spawn(program: impl AsRef<OsStr>, args: &[String]) -> Result<Self, FlashError> {
        let program = program.as_ref();
        let started = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FlashError::Spawn {
                program: program.to_string_lossy().into_owned(),
                source,
            })?;
        tracing::debug!(pid = child.id(), "flash process started");

        let (line_tx, line_rx) = mpsc::channel();
        let streams: [Option<Box<dyn Read + Send>>; 2] = [
            child.stdout.take().map(|s| Box::new(s) as Box<dyn Read + Send>),
            child.stderr.take().map(|s| Box::new(s) as Box<dyn Read + Send>),
        ];
        let readers: Vec<JoinHandle<()>> = streams
            .into_iter()
            .flatten()
            .map(|stream| {
                let tx = line_tx.clone();
                thread::spawn(move || forward_lines(stream, tx))
            })
            .collect();
        drop(line_tx);

        let child = Arc::new(Mutex::new(child));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let supervisor = {
            let child = Arc::clone(&child);
            let cancelled = Arc::clone(&cancelled);
            thread::spawn(move || supervise(child, cancelled, line_rx, readers, tx, started))
        };

        Ok(Self {
            events: rx,
            child,
            cancelled,
            supervisor: Some(supervisor),
            started,
        })
    }

    /// Event stream; ends after [`FlashEvent::Finished`].
    pub fn events(&self) -> &Receiver<FlashEvent> {
        &self.events
    }

    /// Kill the process. The final report is marked as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Err(e) = lock(&self.child).kill() {
            tracing::debug!(error = %e, "kill after exit");
        }
    }

    /// Block until the process exits, passing each output line to `on_line`.
    pub fn wait(mut self, mut on_line: impl FnMut(&str)) -> FlashReport {
        let mut report = None;
        for event in self.events.iter() {
            match event {
                FlashEvent::Output(line) => on_line(&line),
                FlashEvent::Finished(r) => {
                    report = Some(r);
                    break;
                }
            }
        }
        if let Some(handle) = self.supervisor.take() {
            let _ = handle.join();
        }
        report.unwrap_or_else(|| FlashReport {
            exit_code: None,
            output: String::new(),
            elapsed: self.started.elapsed(),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        })
    }
}
