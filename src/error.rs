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

//! Error taxonomy for debug sessions.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building, attaching or synchronizing a debug session.
///
/// Most variants are terminal for the transition that raised them. The
/// breakpoint-scoped variants (see [`DebugError::is_breakpoint_scoped`]) only
/// reject the one breakpoint.
#[derive(Debug, Error)]
pub enum DebugError {
    /// The on-chain program failed to build.
    #[error("build failed: {stderr}")]
    BuildFailure {
        /// Raw diagnostic text from the build tool.
        stderr: String,
    },

    /// An expected build artifact is missing from the output directory.
    #[error("no `{prefix}*{extension}` artifact in {}", .dir.display())]
    ArtifactNotFound {
        dir: PathBuf,
        prefix: String,
        extension: String,
    },

    /// The disassembler failed or produced no function symbols.
    #[error("symbol map generation failed: {0}")]
    SymbolMapGenerationFailure(String),

    /// No symbol in the map matches the function.
    #[error("no symbol found for function `{function}`")]
    SymbolNotFound { function: String },

    /// More than one distinct symbol matches the function.
    #[error("function `{function}` matches {} symbols: {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousSymbol {
        function: String,
        candidates: Vec<String>,
    },

    /// The breakpoint line is not inside any function body.
    #[error("line {line} in {path} is not inside a function")]
    NotInsideFunction { path: String, line: u32 },

    /// A command needs a live session and there is none.
    #[error("no live debug session")]
    NoLiveSession,

    /// The user dismissed the sub-project prompt or picked an unknown entry.
    #[error("sub-project selection cancelled")]
    SubProjectSelectionCancelled,

    /// No Cargo manifest with a package name was found in the workspace.
    #[error("could not find a package name in any Cargo.toml under {}", .workspace.display())]
    NoPackageFound { workspace: PathBuf },

    /// The instruction input file for the harness does not exist.
    #[error("instruction input file not found: {}", .path.display())]
    InstructionInputNotFound { path: PathBuf },

    /// No instruction name could be derived for a harness run.
    #[error("no instruction selected: {0}")]
    NoInstructionSelected(String),

    /// The live session has not been attached to a remote harness yet.
    #[error("debugger is not attached to a remote target")]
    NotAttached,

    /// The session is still starting up or attaching.
    #[error("session is busy ({state})")]
    SessionBusy { state: String },

    /// A readiness wait ran out of time.
    #[error("timed out after {timeout_ms} ms waiting for {what}")]
    ReadinessTimeout { what: String, timeout_ms: u64 },

    /// A watched process closed its output before becoming ready.
    #[error("{process} exited before becoming ready")]
    ProcessExited { process: String },

    /// An external process could not be started.
    #[error("failed to start {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The debugger's input pipe is gone.
    #[error("{0} console is closed")]
    ConsoleClosed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DebugError {
    /// Stable identifier reported to the editor alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            DebugError::BuildFailure { .. } => "BuildFailure",
            DebugError::ArtifactNotFound { .. } => "ArtifactNotFound",
            DebugError::SymbolMapGenerationFailure(_) => "SymbolMapGenerationFailure",
            DebugError::SymbolNotFound { .. } => "SymbolNotFound",
            DebugError::AmbiguousSymbol { .. } => "AmbiguousSymbol",
            DebugError::NotInsideFunction { .. } => "NotInsideFunction",
            DebugError::NoLiveSession => "NoLiveSession",
            DebugError::SubProjectSelectionCancelled => "SubProjectSelectionCancelled",
            DebugError::NoPackageFound { .. } => "NoPackageFound",
            DebugError::InstructionInputNotFound { .. } => "InstructionInputNotFound",
            DebugError::NoInstructionSelected(_) => "NoInstructionSelected",
            DebugError::NotAttached => "NotAttached",
            DebugError::SessionBusy { .. } => "SessionBusy",
            DebugError::ReadinessTimeout { .. } => "ReadinessTimeout",
            DebugError::ProcessExited { .. } => "ProcessExited",
            DebugError::ProcessSpawn { .. } => "ProcessSpawn",
            DebugError::ConsoleClosed(_) => "ConsoleClosed",
            DebugError::Io(_) => "Io",
        }
    }

    /// Breakpoint-scoped errors leave the rest of the session untouched.
    /// During a sync pass `Io` can only come from reading one breakpoint's
    /// source file.
    pub fn is_breakpoint_scoped(&self) -> bool {
        matches!(
            self,
            DebugError::SymbolNotFound { .. }
                | DebugError::AmbiguousSymbol { .. }
                | DebugError::NotInsideFunction { .. }
                | DebugError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_failure_carries_stderr() {
        let err = DebugError::BuildFailure {
            stderr: "error[E0425]: cannot find value `x`".into(),
        };
        assert_eq!(
            err.to_string(),
            "build failed: error[E0425]: cannot find value `x`"
        );
        assert_eq!(err.code(), "BuildFailure");
    }

    #[test]
    fn artifact_not_found_display() {
        let err = DebugError::ArtifactNotFound {
            dir: PathBuf::from("/ws/target/deploy"),
            prefix: "my_vault".into(),
            extension: ".debug".into(),
        };
        assert_eq!(
            err.to_string(),
            "no `my_vault*.debug` artifact in /ws/target/deploy"
        );
    }

    #[test]
    fn ambiguous_symbol_lists_candidates() {
        let err = DebugError::AmbiguousSymbol {
            function: "init".into(),
            candidates: vec!["a::global::init".into(), "b::global::init".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("matches 2 symbols"));
        assert!(msg.contains("b::global::init"));
    }

    #[test]
    fn breakpoint_scoped_errors() {
        assert!(DebugError::SymbolNotFound {
            function: "f".into()
        }
        .is_breakpoint_scoped());
        assert!(DebugError::NotInsideFunction {
            path: "lib.rs".into(),
            line: 3
        }
        .is_breakpoint_scoped());
        assert!(DebugError::Io(std::io::Error::other("gone")).is_breakpoint_scoped());
        assert!(!DebugError::NoLiveSession.is_breakpoint_scoped());
        assert!(!DebugError::ConsoleClosed("debugger".into()).is_breakpoint_scoped());
        assert!(!DebugError::BuildFailure {
            stderr: String::new()
        }
        .is_breakpoint_scoped());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DebugError = io_err.into();
        assert_eq!(err.code(), "Io");
        assert_eq!(err.to_string(), "gone");
    }
}
