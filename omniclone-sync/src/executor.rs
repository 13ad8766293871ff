//! Child-process execution of an [`Invocation`].
//!
//! Invocations are not time-boxed: a child that never exits blocks the run.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;

use crate::invocation::Invocation;

/// How the child ended. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs invocations. The runner only sees this seam, so tests substitute a
/// recording fake for the real child process.
pub trait Executor {
    /// `Err` means the child could not be started at all.
    fn execute(&mut self, invocation: &Invocation) -> std::io::Result<ExitReport>;
}

/// Spawns the sync tool and forwards its stdout and stderr to the log line
/// by line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(&mut self, invocation: &Invocation) -> std::io::Result<ExitReport> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let label = tool_label(&invocation.program);
        let stderr_pump = child.stderr.take().map(|stderr| {
            let label = label.clone();
            thread::spawn(move || forward_lines(stderr, &label))
        });
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, &label);
        }
        if let Some(handle) = stderr_pump {
            let _ = handle.join();
        }

        let status = child.wait()?;
        Ok(ExitReport {
            code: status.code(),
        })
    }
}

fn forward_lines(stream: impl Read, label: &str) {
    for line in BufReader::new(stream).lines() {
        match line {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    tracing::info!("[{label}] {line}");
                }
            }
            Err(err) => {
                tracing::warn!("[{label}] output stream error: {err}");
                break;
            }
        }
    }
}

fn tool_label(program: &str) -> String {
    std::path::Path::new(program)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_owned())
}
