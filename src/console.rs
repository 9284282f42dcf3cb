// Copyright (c) 2026 SBF-Debug Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Line-oriented control of an external process (debugger or harness).
//!
//! Everything above this module only needs `send(line)` and a stream of
//! output lines, so the session logic runs unchanged against a fake in tests.

use std::process::Stdio;
use std::sync::Mutex;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::DebugError;

/// Lines buffered for slow subscribers before they start lagging.
const OUTPUT_BACKLOG: usize = 1024;

pub trait Console: Send + Sync {
    /// Short name used in logs and errors ("debugger", "harness").
    fn name(&self) -> &str;

    /// Queue one command line for the process's stdin.
    fn send(&self, line: &str) -> Result<(), DebugError>;

    /// Output lines (stdout and stderr interleaved) from now on. The first
    /// call also sees everything printed since the process started.
    fn subscribe(&self) -> broadcast::Receiver<String>;

    /// Flips to `true` (or closes) once the process is gone.
    fn exited(&self) -> watch::Receiver<bool>;
}

/// A child process driven through its stdio pipes.
///
/// The child is killed when this value is dropped.
pub struct ConsoleProcess {
    name: String,
    input: mpsc::UnboundedSender<String>,
    output: broadcast::Sender<String>,
    first_output: Mutex<Option<broadcast::Receiver<String>>>,
    exited: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ConsoleProcess {
    pub fn spawn(name: &str, mut cmd: Command) -> Result<Self, DebugError> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        let mut child = cmd
            .spawn()
            .map_err(|source| DebugError::ProcessSpawn { program, source })?;
        info!("Started {} (pid {:?})", name, child.id());

        let (output, first_rx) = broadcast::channel(OUTPUT_BACKLOG);
        let (input, mut input_rx) = mpsc::unbounded_channel::<String>();
        let (exit_tx, exited) = watch::channel(false);
        let mut tasks = Vec::new();

        if let Some(mut stdin) = child.stdin.take() {
            let name = name.to_string();
            tasks.push(tokio::spawn(async move {
                while let Some(line) = input_rx.recv().await {
                    debug!("[{}] << {}", name, line);
                    let written = async {
                        stdin.write_all(line.as_bytes()).await?;
                        stdin.write_all(b"\n").await?;
                        stdin.flush().await
                    };
                    if let Err(e) = written.await {
                        warn!("[{}] stdin closed: {}", name, e);
                        break;
                    }
                }
            }));
        }
        if let Some(stdout) = child.stdout.take() {
            tasks.push(tokio::spawn(forward_lines(
                name.to_string(),
                stdout,
                output.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            tasks.push(tokio::spawn(forward_lines(
                name.to_string(),
                stderr,
                output.clone(),
            )));
        }

        // Owns the child: aborting this task drops it, which kills the process.
        let proc_name = name.to_string();
        tasks.push(tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!("{} exited with {}", proc_name, status),
                Err(e) => warn!("{} wait failed: {}", proc_name, e),
            }
            let _ = exit_tx.send(true);
        }));

        Ok(Self {
            name: name.to_string(),
            input,
            output,
            first_output: Mutex::new(Some(first_rx)),
            exited,
            tasks,
        })
    }
}

async fn forward_lines<R>(name: String, reader: R, output: broadcast::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!("[{}] {}", name, line);
                // No subscribers is fine; the line is still logged.
                let _ = output.send(line);
            }
            Ok(None) => break,
            Err(e) => {
                debug!("[{}] output read error: {}", name, e);
                break;
            }
        }
    }
}

impl Console for ConsoleProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, line: &str) -> Result<(), DebugError> {
        if *self.exited.borrow() {
            return Err(DebugError::ConsoleClosed(self.name.clone()));
        }
        self.input
            .send(line.to_string())
            .map_err(|_| DebugError::ConsoleClosed(self.name.clone()))
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        let first = self
            .first_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        first.unwrap_or_else(|| self.output.subscribe())
    }

    fn exited(&self) -> watch::Receiver<bool> {
        self.exited.clone()
    }
}

impl Drop for ConsoleProcess {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        debug!("{} torn down", self.name);
    }
}

/// Resolves once the console reports its process gone.
pub async fn wait_for_exit(mut exited: watch::Receiver<bool>) {
    while !*exited.borrow_and_update() {
        if exited.changed().await.is_err() {
            return;
        }
    }
}
