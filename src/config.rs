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

//! Tool locations, the remote endpoint and readiness timing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::readiness::Readiness;
use crate::utils::home_dir;

pub const DEFAULT_REMOTE_ENDPOINT: &str = "127.0.0.1:9001";

const TARGET_READY_PATTERN: &str = "Current executable set to";
const HARNESS_READY_PATTERN: &str = r"(?i)waiting for .*connection|listening";
const ATTACH_READY_PATTERN: &str = r"Process \d+ stopped";

/// `~/.local/share/solana/install/active_release/bin`
fn solana_bin_dir() -> PathBuf {
    home_dir()
        .join(".local")
        .join("share")
        .join("solana")
        .join("install")
        .join("active_release")
        .join("bin")
}

fn default_debugger() -> PathBuf {
    solana_bin_dir()
        .join("sdk")
        .join("sbf")
        .join("dependencies")
        .join("platform-tools")
        .join("llvm")
        .join("bin")
        .join("solana-lldb")
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cargo: PathBuf,
    pub objdump: PathBuf,
    pub debugger: PathBuf,
    pub harness: PathBuf,
    /// Ledger directory handed to the harness, relative to the workspace.
    pub ledger: String,
    /// Where the harness serves the remote-debug protocol.
    pub remote_endpoint: String,
    pub target_ready: Readiness,
    pub harness_ready: Readiness,
    pub attach_ready: Readiness,
    /// Pause between deleting stale breakpoints and re-adding them after an
    /// attach. There is nothing to observe here, so it stays a plain delay.
    pub replay_settle: Readiness,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cargo: PathBuf::from("cargo"),
            objdump: PathBuf::from("llvm-objdump"),
            debugger: default_debugger(),
            harness: solana_bin_dir().join("agave-ledger-tool"),
            ledger: "ledger".to_string(),
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            target_ready: Readiness::output(TARGET_READY_PATTERN, Duration::from_secs(15))
                .expect("static regex"),
            harness_ready: Readiness::output(HARNESS_READY_PATTERN, Duration::from_secs(30))
                .expect("static regex"),
            attach_ready: Readiness::output(ATTACH_READY_PATTERN, Duration::from_secs(15))
                .expect("static regex"),
            replay_settle: Readiness::Settle(Duration::from_millis(250)),
        }
    }
}

/// Options for the `serve` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Enable debug output
    #[arg(short = 'd', long = "debug", default_value_t = false)]
    pub debug: bool,

    /// Also write logs to files in this directory
    #[arg(long = "log-dir")]
    pub log_dir: Option<PathBuf>,

    /// Cargo executable used for `cargo build-sbf`
    #[arg(long = "cargo")]
    pub cargo: Option<PathBuf>,

    /// Disassembler used to build the symbol map
    #[arg(long = "objdump")]
    pub objdump: Option<PathBuf>,

    /// Symbolic debugger executable (solana-lldb)
    #[arg(long = "debugger")]
    pub debugger: Option<PathBuf>,

    /// Remote execution harness executable (agave-ledger-tool)
    #[arg(long = "harness")]
    pub harness: Option<PathBuf>,

    /// Remote-debug endpoint exposed by the harness
    #[arg(long = "remote", default_value = DEFAULT_REMOTE_ENDPOINT)]
    pub remote_endpoint: String,

    /// Max wait for the debugger to load the target, in ms
    #[arg(long = "target-timeout-ms", default_value_t = 15_000)]
    pub target_timeout_ms: u64,

    /// Max wait for the harness to start its remote-debug server, in ms
    #[arg(long = "harness-timeout-ms", default_value_t = 30_000)]
    pub harness_timeout_ms: u64,

    /// Harness output line that signals it is ready for an attach
    #[arg(long = "harness-ready", default_value = HARNESS_READY_PATTERN)]
    pub harness_ready_pattern: String,

    /// Max wait for the remote attach to stop the process, in ms
    #[arg(long = "attach-timeout-ms", default_value_t = 15_000)]
    pub attach_timeout_ms: u64,

    /// Pause between deleting and re-adding breakpoints after an attach, in ms
    #[arg(long = "replay-settle-ms", default_value_t = 250)]
    pub replay_settle_ms: u64,
}

impl ServeArgs {
    pub fn to_config(&self) -> Result<SessionConfig> {
        let defaults = SessionConfig::default();
        Ok(SessionConfig {
            cargo: self.cargo.clone().unwrap_or(defaults.cargo),
            objdump: self.objdump.clone().unwrap_or(defaults.objdump),
            debugger: self.debugger.clone().unwrap_or(defaults.debugger),
            harness: self.harness.clone().unwrap_or(defaults.harness),
            ledger: defaults.ledger,
            remote_endpoint: self.remote_endpoint.clone(),
            target_ready: Readiness::output(
                TARGET_READY_PATTERN,
                Duration::from_millis(self.target_timeout_ms),
            )?,
            harness_ready: Readiness::output(
                &self.harness_ready_pattern,
                Duration::from_millis(self.harness_timeout_ms),
            )
            .with_context(|| format!("invalid --harness-ready `{}`", self.harness_ready_pattern))?,
            attach_ready: Readiness::output(
                ATTACH_READY_PATTERN,
                Duration::from_millis(self.attach_timeout_ms),
            )?,
            replay_settle: Readiness::Settle(Duration::from_millis(self.replay_settle_ms)),
        })
    }
}
