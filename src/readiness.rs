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

//! Bounded waits for external processes that never say "ready".
//!
//! Neither the debugger nor the harness has a readiness handshake, so we watch
//! their output for a known line and give up after a timeout. A plain settle
//! delay is kept for the one spot where nothing observable happens. An output
//! wait also ends as soon as the process exits. Waits are cancelled by dropping
//! the future (the session task gets aborted).

use std::time::Duration;

use log::debug;
use regex::Regex;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::console::{wait_for_exit, Console};
use crate::error::DebugError;

#[derive(Debug, Clone)]
pub enum Readiness {
    /// Wait for an output line matching `pattern`, at most `timeout`.
    Output { pattern: Regex, timeout: Duration },
    /// Wait a fixed amount of time.
    Settle(Duration),
}

impl Readiness {
    pub fn output(pattern: &str, timeout: Duration) -> Result<Self, regex::Error> {
        Ok(Readiness::Output {
            pattern: Regex::new(pattern)?,
            timeout,
        })
    }

    /// Wait on `console`, reading lines from `output` (subscribed before the
    /// command that triggers the awaited line was sent).
    pub async fn wait(
        &self,
        what: &str,
        console: &dyn Console,
        output: &mut broadcast::Receiver<String>,
    ) -> Result<(), DebugError> {
        match self {
            Readiness::Settle(delay) => {
                if !delay.is_zero() {
                    debug!("Settling {:?} before {}", delay, what);
                    tokio::time::sleep(*delay).await;
                }
                Ok(())
            }
            Readiness::Output { pattern, timeout } => {
                let exited = console.exited();
                let watched = async {
                    // Buffered lines are checked before the exit flag.
                    tokio::select! {
                        biased;
                        line = wait_for_line(console.name(), pattern, output) => line,
                        _ = wait_for_exit(exited) => Err(DebugError::ProcessExited {
                            process: console.name().to_string(),
                        }),
                    }
                };
                let line = tokio::time::timeout(*timeout, watched)
                    .await
                    .map_err(|_| DebugError::ReadinessTimeout {
                        what: what.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })??;
                debug!("Ready: {} ({})", what, line);
                Ok(())
            }
        }
    }
}

async fn wait_for_line(
    process: &str,
    pattern: &Regex,
    output: &mut broadcast::Receiver<String>,
) -> Result<String, DebugError> {
    loop {
        match output.recv().await {
            Ok(line) if pattern.is_match(&line) => return Ok(line),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!("Skipped {} lines of {} output", skipped, process)
            }
            Err(RecvError::Closed) => {
                return Err(DebugError::ProcessExited {
                    process: process.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleProcess;
    use tokio::process::Command;
    use tokio::sync::watch;

    /// Console whose output and exit are driven by the test.
    struct Scripted {
        output: broadcast::Sender<String>,
        exit: watch::Sender<bool>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                output: broadcast::channel(16).0,
                exit: watch::channel(false).0,
            }
        }
    }

    impl Console for Scripted {
        fn name(&self) -> &str {
            "debugger"
        }

        fn send(&self, _line: &str) -> Result<(), DebugError> {
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<String> {
            self.output.subscribe()
        }

        fn exited(&self) -> watch::Receiver<bool> {
            self.exit.subscribe()
        }
    }

    #[tokio::test]
    async fn matching_line_completes_wait() {
        let console = Scripted::new();
        let mut rx = console.subscribe();
        console.output.send("Welcome to lldb".to_string()).unwrap();
        console
            .output
            .send("Current executable set to '/ws/vault.debug' (sbf).".to_string())
            .unwrap();
        let ready = Readiness::output("Current executable set to", Duration::from_secs(1)).unwrap();
        ready.wait("target", &console, &mut rx).await.unwrap();
    }

    #[tokio::test]
    async fn ready_line_printed_before_exit_still_counts() {
        let console = Scripted::new();
        let mut rx = console.subscribe();
        console.output.send("Process 1 stopped".to_string()).unwrap();
        console.exit.send_replace(true);
        let ready = Readiness::output(r"Process \d+ stopped", Duration::from_secs(1)).unwrap();
        ready.wait("remote attach", &console, &mut rx).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out() {
        let console = Scripted::new();
        let mut rx = console.subscribe();
        let ready = Readiness::output(r"Process \d+ stopped", Duration::from_secs(3)).unwrap();
        let err = ready
            .wait("remote attach", &console, &mut rx)
            .await
            .unwrap_err();
        match err {
            DebugError::ReadinessTimeout { what, timeout_ms } => {
                assert_eq!(what, "remote attach");
                assert_eq!(timeout_ms, 3000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn exit_flag_ends_the_wait() {
        let console = Scripted::new();
        let mut rx = console.subscribe();
        console.output.send("starting".to_string()).unwrap();
        console.exit.send_replace(true);
        let ready = Readiness::output("listening", Duration::from_secs(30)).unwrap();
        match ready.wait("harness", &console, &mut rx).await {
            Err(DebugError::ProcessExited { process }) => assert_eq!(process, "debugger"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn dying_process_is_reported_before_the_timeout() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo booting; exit 1");
        let console = ConsoleProcess::spawn("debugger", cmd).unwrap();
        let mut rx = console.subscribe();
        let ready = Readiness::output("Current executable set to", Duration::from_secs(30)).unwrap();

        let started = tokio::time::Instant::now();
        let result = ready.wait("target load", &console, &mut rx).await;
        assert!(
            matches!(result, Err(DebugError::ProcessExited { .. })),
            "unexpected {result:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_ignores_output() {
        let console = Scripted::new();
        let mut rx = console.subscribe();
        let start = tokio::time::Instant::now();
        Readiness::Settle(Duration::from_millis(250))
            .wait("replay", &console, &mut rx)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
