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

//! The external programs a session drives.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::info;
use tokio::process::Command;

use crate::config::SessionConfig;
use crate::console::{Console, ConsoleProcess};
use crate::error::DebugError;
use crate::symbol_map::{SymbolMap, SymbolMapBuilder};
use crate::workspace::ProjectSelection;

pub trait Toolchain: Send + Sync + 'static {
    /// Build the selected program with debug info.
    fn build(
        &self,
        project: &ProjectSelection,
    ) -> impl Future<Output = Result<(), DebugError>> + Send;

    /// Disassemble `binary` into a fresh symbol map.
    fn symbol_map(&self, binary: &Path)
        -> impl Future<Output = Result<SymbolMap, DebugError>> + Send;

    /// Start the symbolic debugger with nothing loaded.
    fn launch_debugger(
        &self,
        debugger: &Path,
    ) -> impl Future<Output = Result<Box<dyn Console>, DebugError>> + Send;

    /// Start the harness running `module` against an instruction input. It
    /// serves the remote-debug protocol once it is up.
    fn launch_harness(
        &self,
        project: &ProjectSelection,
        module: &Path,
        input: &Path,
    ) -> impl Future<Output = Result<Box<dyn Console>, DebugError>> + Send;
}

/// `cargo build-sbf`, `llvm-objdump`, `solana-lldb` and `agave-ledger-tool`.
pub struct SbfToolchain {
    cargo: PathBuf,
    symbols: SymbolMapBuilder,
    harness: PathBuf,
    ledger: String,
}

impl SbfToolchain {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cargo: config.cargo.clone(),
            symbols: SymbolMapBuilder::new(config.objdump.clone()),
            harness: config.harness.clone(),
            ledger: config.ledger.clone(),
        }
    }
}

impl Toolchain for SbfToolchain {
    async fn build(&self, project: &ProjectSelection) -> Result<(), DebugError> {
        info!(
            "Building {} ({})",
            project.sub_project.package_name,
            project.sub_project.manifest.display()
        );
        let output = Command::new(&self.cargo)
            .arg("build-sbf")
            .arg("--debug")
            .arg("--manifest-path")
            .arg(&project.sub_project.manifest)
            .current_dir(&project.root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DebugError::BuildFailure {
                stderr: format!("failed to run {}: {}", self.cargo.display(), e),
            })?;
        if !output.status.success() {
            return Err(DebugError::BuildFailure {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn symbol_map(&self, binary: &Path) -> Result<SymbolMap, DebugError> {
        self.symbols.build(binary).await
    }

    async fn launch_debugger(&self, debugger: &Path) -> Result<Box<dyn Console>, DebugError> {
        let console = ConsoleProcess::spawn("debugger", Command::new(debugger))?;
        Ok(Box::new(console))
    }

    async fn launch_harness(
        &self,
        project: &ProjectSelection,
        module: &Path,
        input: &Path,
    ) -> Result<Box<dyn Console>, DebugError> {
        let mut cmd = Command::new(&self.harness);
        cmd.arg("program")
            .arg("run")
            .arg(module)
            .arg("--ledger")
            .arg(&self.ledger)
            .arg("--mode")
            .arg("debugger")
            .arg("-i")
            .arg(input)
            .current_dir(&project.root);
        let console = ConsoleProcess::spawn("harness", cmd)?;
        Ok(Box::new(console))
    }
}
