//! Tag-1 codec that pipes the compressed bytes through an external program.
//!
//! The program reads the compressed stream on stdin and writes the
//! decompressed bytes to stdout. A missing program, a non-zero exit and a
//! timeout all report [`DecompressError::Unavailable`].

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{DecompressError, LegacyCodec};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long stdout may stay open once the program itself has exited.
/// Descendants that inherited the pipe can hold it past that.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

pub struct ExternalCodec {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalCodec {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String], timeout: Duration) -> Result<Self, DecompressError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| DecompressError::Unavailable("no external command configured".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    fn spawn(&self) -> Result<Child, DecompressError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DecompressError::Unavailable(format!("{}: {}", self.program, e)))
    }

    fn wait(&self, child: &mut Child) -> Result<(), DecompressError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => {
                    return Err(DecompressError::Unavailable(format!(
                        "{} exited with {}",
                        self.program, status
                    )));
                }
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DecompressError::Unavailable(format!(
                        "{} timed out after {:?}",
                        self.program, self.timeout
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(DecompressError::Unavailable(format!(
                        "{}: {}",
                        self.program, e
                    )));
                }
            }
        }
    }
}

impl LegacyCodec for ExternalCodec {
    fn name(&self) -> &'static str {
        "external"
    }

    fn decode(&self, compressed: &[u8], declared_len: usize) -> Result<Vec<u8>, DecompressError> {
        debug!(program = %self.program, len = compressed.len(), "Running external decompressor");
        let mut child = self.spawn()?;

        // Feed stdin and drain stdout on their own threads so neither pipe can block the child.
        // Neither thread is joined: a descendant holding a pipe would block the join.
        let mut stdin = child.stdin.take();
        let input = compressed.to_vec();
        thread::spawn(move || {
            if let Some(pipe) = stdin.as_mut() {
                let _ = pipe.write_all(&input);
            }
        });
        let mut stdout = child.stdout.take();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut out = Vec::with_capacity(declared_len);
            if let Some(pipe) = stdout.as_mut() {
                let _ = pipe.read_to_end(&mut out);
            }
            let _ = tx.send(out);
        });

        self.wait(&mut child)?;
        rx.recv_timeout(DRAIN_GRACE).map_err(|_| {
            DecompressError::Unavailable(format!(
                "{} left its output open after exiting",
                self.program
            ))
        })
    }
}
