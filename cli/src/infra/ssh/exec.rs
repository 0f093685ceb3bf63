//! Buffered and streamed command execution over [`SshConnection`].
//!
//! Both modes share one pump: a blocking worker that drains stdout and stderr
//! without blocking on either, so the remote process never stalls on a full
//! pipe.

use std::io::{ErrorKind, Read};
use std::time::Duration;

use anyhow::{Context, Result};
use ssh2::{Channel, Session};
use tokio::sync::mpsc;

use crate::application::ports::RemoteShell;
use crate::domain::error::DeployError;
use crate::domain::remote::{CommandOutput, OutputLine, StreamKind};
use crate::infra::ssh::connect::SshConnection;

const READ_BUF_SIZE: usize = 32 * 1024;
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Splits a byte stream into lines. `\r\n` and `\n` both end a line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append `chunk` and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// The unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}

/// Restores blocking mode when the pump exits, on every path.
struct NonBlocking<'a>(&'a Session);

impl<'a> NonBlocking<'a> {
    fn enter(session: &'a Session) -> Self {
        session.set_blocking(false);
        Self(session)
    }
}

impl Drop for NonBlocking<'_> {
    fn drop(&mut self) {
        self.0.set_blocking(true);
    }
}

/// The two output streams of a running remote command.
pub trait OutputStreams {
    /// Non-blocking read; `WouldBlock` means nothing is ready yet.
    fn read_from(&mut self, kind: StreamKind, buf: &mut [u8]) -> std::io::Result<usize>;

    /// True once the remote side has closed both streams.
    fn at_eof(&self) -> bool;
}

impl OutputStreams for Channel {
    fn read_from(&mut self, kind: StreamKind, buf: &mut [u8]) -> std::io::Result<usize> {
        let id = match kind {
            StreamKind::Stdout => 0,
            StreamKind::Stderr => 1,
        };
        self.stream(id).read(buf)
    }

    fn at_eof(&self) -> bool {
        self.eof()
    }
}

fn transport(context: &str, err: impl std::fmt::Display) -> DeployError {
    DeployError::Transport(format!("{context}: {err}"))
}

/// Open a channel, start `command`, drain both streams into `sink`, and
/// return the exit status.
fn pump(
    session: &Session,
    command: &str,
    mut sink: impl FnMut(StreamKind, &[u8]),
) -> Result<i32, DeployError> {
    let mut channel = session
        .channel_session()
        .map_err(|e| transport("failed to open SSH channel", e))?;
    channel
        .exec(command)
        .map_err(|e| transport("failed to start remote command", e))?;

    {
        let _mode = NonBlocking::enter(session);
        drain(&mut channel, &mut sink)?;
    }

    channel
        .wait_close()
        .map_err(|e| transport("failed to close SSH channel", e))?;
    channel
        .exit_status()
        .map_err(|e| transport("failed to read exit status", e))
}

/// Read stdout and stderr alternately until both are exhausted. A stream
/// with nothing ready never holds up the other one.
///
/// # Errors
///
/// Returns [`DeployError::Transport`] on any read error other than
/// `WouldBlock` or `Interrupted`.
pub fn drain(
    streams: &mut impl OutputStreams,
    sink: &mut impl FnMut(StreamKind, &[u8]),
) -> Result<(), DeployError> {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let mut progressed = false;
        for kind in [StreamKind::Stdout, StreamKind::Stderr] {
            match streams.read_from(kind, &mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    sink(kind, &buf[..n]);
                    progressed = true;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => progressed = true,
                Err(e) => return Err(transport("failed to read remote output", e)),
            }
        }
        if !progressed {
            if streams.at_eof() {
                return Ok(());
            }
            std::thread::sleep(IDLE_BACKOFF);
        }
    }
}

/// Turns raw chunks from both streams into whole lines, keeping the full
/// stderr for the error report.
#[derive(Debug, Default)]
pub struct LineSplitter {
    stdout: LineBuffer,
    stderr: LineBuffer,
    stderr_all: Vec<u8>,
}

impl LineSplitter {
    pub fn feed(&mut self, kind: StreamKind, chunk: &[u8], emit: &mut impl FnMut(OutputLine)) {
        let lines = match kind {
            StreamKind::Stdout => self.stdout.push(chunk),
            StreamKind::Stderr => {
                self.stderr_all.extend_from_slice(chunk);
                self.stderr.push(chunk)
            }
        };
        for text in lines {
            emit(OutputLine { stream: kind, text });
        }
    }

    /// Flush unterminated tails and return everything seen on stderr.
    pub fn finish(mut self, emit: &mut impl FnMut(OutputLine)) -> String {
        if let Some(text) = self.stdout.finish() {
            emit(OutputLine {
                stream: StreamKind::Stdout,
                text,
            });
        }
        if let Some(text) = self.stderr.finish() {
            emit(OutputLine {
                stream: StreamKind::Stderr,
                text,
            });
        }
        String::from_utf8_lossy(&self.stderr_all).into_owned()
    }
}

impl RemoteShell for SshConnection {
    async fn run_buffered(&self, command: &str) -> Result<CommandOutput> {
        let session = self.session()?;
        let command = command.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let exit_code = pump(&session, &command, |kind, chunk| match kind {
                StreamKind::Stdout => stdout.extend_from_slice(chunk),
                StreamKind::Stderr => stderr.extend_from_slice(chunk),
            })?;
            Ok::<_, DeployError>(CommandOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code,
            })
        })
        .await
        .context("remote command task panicked")?
        .map_err(Into::into)
    }

    async fn run_streamed(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(OutputLine),
    ) -> Result<()> {
        let session = self.session()?;
        let command = command.to_string();
        let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();

        let worker = tokio::task::spawn_blocking(move || {
            let mut splitter = LineSplitter::default();
            // A closed receiver only means nobody is listening any more.
            let mut emit = |line: OutputLine| {
                let _ = tx.send(line);
            };
            let exit_code = pump(&session, &command, |kind, chunk| {
                splitter.feed(kind, chunk, &mut emit);
            })?;
            let stderr = splitter.finish(&mut emit);
            Ok::<_, DeployError>((exit_code, stderr))
        });

        while let Some(line) = rx.recv().await {
            on_line(line);
        }

        let (exit_code, stderr) = worker.await.context("remote command task panicked")??;
        CommandOutput {
            stdout: String::new(),
            stderr,
            exit_code,
        }
        .into_result()?;
        Ok(())
    }
}
