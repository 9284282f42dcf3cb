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

//! One debug session: the processes it owns and the two long pipelines that
//! move it forward (startup and attach).
//!
//! Both pipelines take the session (or what will become it) by value and hand
//! it back when done, so the orchestrator never sees a half-built session.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::config::SessionConfig;
use crate::console::Console;
use crate::error::DebugError;
use crate::helper_requests::EditorBreakpoint;
use crate::locator::FunctionLocator;
use crate::symbol_map::SymbolMap;
use crate::sync::{BreakpointSynchronizer, Resolution, SourceProvider, SyncReport};
use crate::toolchain::Toolchain;
use crate::workspace::{discover_artifacts, Artifacts, ProjectSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Building,
    ArtifactDiscovery,
    SymbolMapping,
    DebuggerLaunch,
    TargetLoaded,
    RemoteAttached,
    BreakpointSync,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Building => "Building",
            SessionState::ArtifactDiscovery => "ArtifactDiscovery",
            SessionState::SymbolMapping => "SymbolMapping",
            SessionState::DebuggerLaunch => "DebuggerLaunch",
            SessionState::TargetLoaded => "TargetLoaded",
            SessionState::RemoteAttached => "RemoteAttached",
            SessionState::BreakpointSync => "BreakpointSync",
            SessionState::Failed => "Failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn session_id(generation: u64) -> String {
    format!("session-{}", generation)
}

pub struct Session {
    pub generation: u64,
    pub state: SessionState,
    pub project: ProjectSelection,
    pub artifacts: Artifacts,
    pub symbols: SymbolMap,
    /// On-disk copy of `symbols`; removed when the session is dropped.
    symbol_file: NamedTempFile,
    pub debugger: Box<dyn Console>,
    /// Present from the first `runInstruction` on. Replaced on every run.
    pub harness: Option<Box<dyn Console>>,
    pub breakpoints: BreakpointSynchronizer,
    pub remote_attached: bool,
}

impl Session {
    pub fn id(&self) -> String {
        session_id(self.generation)
    }

    pub fn symbol_file(&self) -> &Path {
        self.symbol_file.path()
    }

    pub fn function_at(
        &self,
        bp: &EditorBreakpoint,
        locator: &dyn FunctionLocator,
        sources: &dyn SourceProvider,
    ) -> Result<String, DebugError> {
        Resolution {
            locator,
            sources,
            symbols: &self.symbols,
            policy: &self.project.policy,
        }
        .function_at(bp)
    }

    pub fn remove_breakpoint(&mut self, editor_id: &str) -> Result<Option<u32>, DebugError> {
        self.breakpoints.remove(editor_id, self.debugger.as_ref())
    }

    /// Set every editor breakpoint that is not already mapped.
    pub fn apply_breakpoints<'b>(
        &mut self,
        breakpoints: impl IntoIterator<Item = &'b EditorBreakpoint>,
        locator: &dyn FunctionLocator,
        sources: &dyn SourceProvider,
    ) -> SyncReport {
        let resolution = Resolution {
            locator,
            sources,
            symbols: &self.symbols,
            policy: &self.project.policy,
        };
        self.breakpoints
            .apply_all(breakpoints, &resolution, self.debugger.as_ref())
    }

    pub fn resume(&self) -> Result<(), DebugError> {
        if !self.remote_attached {
            return Err(DebugError::NotAttached);
        }
        self.debugger.send("continue")
    }
}

/// `target create` argument, quoted when the path has spaces.
fn target_arg(path: &Path) -> String {
    let s = path.display().to_string();
    if s.contains(char::is_whitespace) {
        format!("\"{}\"", s)
    } else {
        s
    }
}

/// Build, disassemble and load the target. The returned session is in
/// `TargetLoaded` with an empty breakpoint map numbered from 1.
pub async fn start<T, R>(
    toolchain: &T,
    config: &SessionConfig,
    project: ProjectSelection,
    debugger_path: PathBuf,
    generation: u64,
    report: R,
) -> Result<Session, DebugError>
where
    T: Toolchain,
    R: Fn(SessionState) + Send + Sync,
{
    report(SessionState::Building);
    toolchain.build(&project).await?;

    report(SessionState::ArtifactDiscovery);
    let artifacts =
        discover_artifacts(&project.deploy_dir(), &project.sub_project.package_name).await?;
    debug!(
        "Artifacts: {} / {}",
        artifacts.debug_binary.display(),
        artifacts.loadable_module.display()
    );

    report(SessionState::SymbolMapping);
    let symbols = toolchain.symbol_map(&artifacts.debug_binary).await?;
    let symbol_file = symbols
        .persist()
        .map_err(|e| DebugError::SymbolMapGenerationFailure(e.to_string()))?;
    info!(
        "{} function symbols mapped to {}",
        symbols.len(),
        symbol_file.path().display()
    );

    report(SessionState::DebuggerLaunch);
    let debugger = toolchain.launch_debugger(&debugger_path).await?;
    let mut output = debugger.subscribe();
    debugger.send(&format!("target create {}", target_arg(&artifacts.debug_binary)))?;
    config
        .target_ready
        .wait("target load", debugger.as_ref(), &mut output)
        .await?;

    Ok(Session {
        generation,
        state: SessionState::TargetLoaded,
        project,
        artifacts,
        symbols,
        symbol_file,
        debugger,
        harness: None,
        breakpoints: BreakpointSynchronizer::new(),
        remote_attached: false,
    })
}

/// Run the harness on `input` and (re)attach the debugger to it.
///
/// Attaching invalidates whatever the debugger had set, so every mapped
/// breakpoint is deleted here and the caller re-adds them from the editor's
/// set. The deletions are returned as `(editor_id, sequence)`.
pub async fn attach<T, R>(
    mut session: Session,
    toolchain: &T,
    config: &SessionConfig,
    input: PathBuf,
    report: R,
) -> Result<(Session, Vec<(String, u32)>), DebugError>
where
    T: Toolchain,
    R: Fn(SessionState) + Send + Sync,
{
    // The previous harness holds the endpoint.
    session.harness = None;
    let harness = toolchain
        .launch_harness(&session.project, &session.artifacts.loadable_module, &input)
        .await?;
    let mut harness_output = harness.subscribe();
    config
        .harness_ready
        .wait("harness", harness.as_ref(), &mut harness_output)
        .await?;
    session.harness = Some(harness);

    if session.remote_attached {
        session.debugger.send("process detach")?;
        session.remote_attached = false;
    }
    let mut output = session.debugger.subscribe();
    session
        .debugger
        .send(&format!("gdb-remote {}", config.remote_endpoint))?;
    config
        .attach_ready
        .wait("remote attach", session.debugger.as_ref(), &mut output)
        .await?;
    session.remote_attached = true;
    session.state = SessionState::RemoteAttached;
    report(SessionState::RemoteAttached);

    let deleted = session.breakpoints.delete_all(session.debugger.as_ref())?;
    config
        .replay_settle
        .wait("breakpoint replay", session.debugger.as_ref(), &mut output)
        .await?;
    Ok((session, deleted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_are_stable() {
        assert_eq!(SessionState::TargetLoaded.as_str(), "TargetLoaded");
        assert_eq!(SessionState::BreakpointSync.to_string(), "BreakpointSync");
        assert_eq!(session_id(3), "session-3");
    }

    #[test]
    fn target_paths_with_spaces_are_quoted() {
        assert_eq!(
            target_arg(Path::new("/ws/target/deploy/vault.debug")),
            "/ws/target/deploy/vault.debug"
        );
        assert_eq!(
            target_arg(Path::new("/my ws/vault.debug")),
            "\"/my ws/vault.debug\""
        );
    }
}
