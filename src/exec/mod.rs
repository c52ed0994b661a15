//! Running graphs through the external `gpt` command-line tool.
//!
//! The tool reports progress as bare `NN%` tokens without a trailing
//! newline, so its output cannot be consumed line-wise: [`OutputParser`]
//! accumulates characters and classifies either a completed line (error or
//! console info) or a trailing progress token the moment it appears.
use std::io::{Read, Write as _};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::error::{Error, Result};

/// Receives console output and progress while a graph runs.
pub trait ProgressSink {
    fn push_info(&mut self, line: &str);
    fn report_error(&mut self, line: &str);
    fn set_progress(&mut self, percent: u8);
}

fn progress_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2,3})%$").expect("hard-coded pattern"))
}

/// Incremental classifier for the tool's console stream.
#[derive(Debug, Default)]
pub struct OutputParser {
    buffer: String,
}

impl OutputParser {
    pub fn new() -> Self {
        OutputParser::default()
    }

    pub fn push_str(&mut self, text: &str, sink: &mut dyn ProgressSink) {
        for ch in text.chars() {
            self.push(ch, sink);
        }
    }

    pub fn push(&mut self, ch: char, sink: &mut dyn ProgressSink) {
        if ch == '\n' {
            let line = self.buffer.trim_end_matches('\r');
            if line.contains("Error: ") {
                sink.report_error(line);
            } else if !line.trim().is_empty() {
                sink.push_info(line);
            }
            self.buffer.clear();
            return;
        }
        self.buffer.push(ch);
        if let Some(caps) = progress_pattern().captures(&self.buffer) {
            let percent: u16 = caps[1].parse().unwrap_or(0);
            sink.set_progress(percent.min(100) as u8);
            self.buffer.clear();
        }
    }
}

/// Outcome of one tool invocation. A clean exit does not by itself mean the
/// graph produced its outputs; callers check the destination files.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub command: String,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Executes graph XML with `gpt <graph> -e -q <threads>`, streaming console
/// output into a [`ProgressSink`].
#[derive(Debug, Clone)]
pub struct GptRunner {
    gpt: PathBuf,
    threads: u32,
    timeout: Option<Duration>,
}

impl GptRunner {
    pub fn new(gpt: impl Into<PathBuf>, threads: u32) -> Self {
        GptRunner {
            gpt: gpt.into(),
            threads,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Writes `graph_xml` to a fresh temporary file and runs the tool on
    /// it. Concurrent runs never share a graph file.
    pub fn run(&self, graph_xml: &str, sink: &mut dyn ProgressSink) -> Result<ExecutionReport> {
        let mut graph_file = tempfile::Builder::new()
            .prefix("gpf-")
            .suffix(".xml")
            .tempfile()?;
        graph_file.write_all(graph_xml.as_bytes())?;
        graph_file.flush()?;

        let command = format!(
            "\"{}\" \"{}\" -e -q {}",
            self.gpt.display(),
            graph_file.path().display(),
            self.threads
        );
        info!(%command, "launching gpt");
        sink.push_info(&command);

        let started_at = Utc::now();
        let mut child = Command::new(&self.gpt)
            .arg(graph_file.path())
            .arg("-e")
            .arg("-q")
            .arg(self.threads.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx.clone());
        }
        drop(tx);
        // the readers are never joined: both channel ends closing is the
        // completion signal, and on a timeout they may outlive this call

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut parser = OutputParser::new();
        loop {
            let wait = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) => remaining,
                    None => {
                        return self.abort_timed_out(&mut child);
                    }
                },
                None => Duration::from_secs(3600),
            };
            match rx.recv_timeout(wait) {
                Ok(chunk) => parser.push_str(&String::from_utf8_lossy(&chunk), sink),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if deadline.is_some() {
                        return self.abort_timed_out(&mut child);
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = match deadline {
            Some(deadline) => {
                let remaining = deadline
                    .checked_duration_since(Instant::now())
                    .unwrap_or(Duration::ZERO);
                match child.wait_timeout(remaining)? {
                    Some(status) => status,
                    None => {
                        child.kill()?;
                        child.wait()?;
                        return Err(Error::Timeout {
                            seconds: self.timeout.unwrap_or_default().as_secs(),
                        });
                    }
                }
            }
            None => child.wait()?,
        };
        sink.set_progress(100);

        let report = ExecutionReport {
            command,
            exit_code: status.code(),
            started_at,
            finished_at: Utc::now(),
        };
        if report.exited_cleanly() {
            debug!(elapsed = ?(report.finished_at - report.started_at), "gpt finished");
        } else {
            warn!(code = ?report.exit_code, "gpt exited with a failure status");
        }
        Ok(report)
    }

    /// The tool is a launcher script whose java child inherits the output
    /// pipes, so the reader threads can stay blocked long after the direct
    /// child is dead. They are left detached; the error returns immediately.
    fn abort_timed_out(&self, child: &mut std::process::Child) -> Result<ExecutionReport> {
        child.kill()?;
        child.wait()?;
        Err(Error::Timeout {
            seconds: self.timeout.unwrap_or_default().as_secs(),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R, tx: mpsc::Sender<Vec<u8>>) {
    let _ = thread::spawn(move || {
        let mut buf = [0u8; 512];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Sink that relays the stream to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    last_progress: Option<u8>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink::default()
    }
}

impl ProgressSink for ConsoleSink {
    fn push_info(&mut self, line: &str) {
        println!("{line}");
    }

    fn report_error(&mut self, line: &str) {
        eprintln!("{line}");
    }

    fn set_progress(&mut self, percent: u8) {
        if self.last_progress != Some(percent) {
            self.last_progress = Some(percent);
            println!("{percent}%");
        }
    }
}
