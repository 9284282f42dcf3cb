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

//! Keeps the debugger's breakpoint numbering in step with editor breakpoints.
//!
//! The debugger numbers breakpoints 1, 2, 3... in the order they are set and
//! deletes them by number. We mirror that numbering locally so an editor
//! removal can be turned into `breakpoint delete <n>`. Numbers are never
//! handed out twice within a session. If the debugger ever disagrees (for
//! example because a `set` failed on its side) our mapping still wins.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::Path;

use log::{debug, warn};

use crate::console::Console;
use crate::error::DebugError;
use crate::helper_requests::EditorBreakpoint;
use crate::locator::FunctionLocator;
use crate::resolver::{self, BreakpointTarget, NamingPolicy};
use crate::symbol_map::SymbolMap;
use crate::utils::canonicalize_path;

/// Where breakpoint source text comes from.
pub trait SourceProvider: Send + Sync {
    fn read_source(&self, path: &Path) -> io::Result<String>;
}

/// Reads sources straight from disk.
pub struct FsSources;

impl SourceProvider for FsSources {
    fn read_source(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Everything needed to turn an editor breakpoint into a debugger target.
pub struct Resolution<'a> {
    pub locator: &'a dyn FunctionLocator,
    pub sources: &'a dyn SourceProvider,
    pub symbols: &'a SymbolMap,
    pub policy: &'a NamingPolicy,
}

impl Resolution<'_> {
    /// Name of the function enclosing the breakpoint.
    pub fn function_at(&self, bp: &EditorBreakpoint) -> Result<String, DebugError> {
        let path = canonicalize_path(&bp.source_path);
        let source = self.sources.read_source(&path)?;
        self.locator
            .locate(&source, bp.line)
            .ok_or_else(|| DebugError::NotInsideFunction {
                path: path.display().to_string(),
                line: bp.line,
            })
    }

    pub fn target_for(&self, bp: &EditorBreakpoint) -> Result<BreakpointTarget, DebugError> {
        let function = self.function_at(bp)?;
        resolver::resolve(self.symbols, &function, self.policy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub editor_id: String,
    pub sequence: u32,
    pub command: String,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub registered: Vec<Registered>,
    pub rejected: Vec<(String, DebugError)>,
}

#[derive(Debug)]
pub struct BreakpointSynchronizer {
    by_editor: HashMap<String, u32>,
    by_sequence: BTreeMap<u32, String>,
    next_sequence: u32,
}

impl Default for BreakpointSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointSynchronizer {
    pub fn new() -> Self {
        Self {
            by_editor: HashMap::new(),
            by_sequence: BTreeMap::new(),
            next_sequence: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.by_editor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_editor.is_empty()
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    pub fn sequence_of(&self, editor_id: &str) -> Option<u32> {
        self.by_editor.get(editor_id).copied()
    }

    /// Editor ids in the order their breakpoints were set.
    pub fn editor_ids(&self) -> Vec<&str> {
        self.by_sequence.values().map(String::as_str).collect()
    }

    /// Resolve and set one breakpoint.
    ///
    /// Returns `Ok(None)` when the editor id is already mapped. On error nothing
    /// is sent and no number is consumed.
    pub fn add(
        &mut self,
        bp: &EditorBreakpoint,
        resolution: &Resolution<'_>,
        console: &dyn Console,
    ) -> Result<Option<Registered>, DebugError> {
        if let Some(seq) = self.sequence_of(&bp.id) {
            debug!("Breakpoint {} already set as #{}", bp.id, seq);
            return Ok(None);
        }
        let target = resolution.target_for(bp)?;
        let command = target.set_command();
        console.send(&command)?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.by_editor.insert(bp.id.clone(), sequence);
        self.by_sequence.insert(sequence, bp.id.clone());
        debug!("Breakpoint {} -> #{} ({})", bp.id, sequence, command);
        Ok(Some(Registered {
            editor_id: bp.id.clone(),
            sequence,
            command,
        }))
    }

    /// Delete one breakpoint by editor id. Unknown ids were never registered
    /// and are ignored.
    pub fn remove(
        &mut self,
        editor_id: &str,
        console: &dyn Console,
    ) -> Result<Option<u32>, DebugError> {
        let Some(sequence) = self.sequence_of(editor_id) else {
            return Ok(None);
        };
        console.send(&format!("breakpoint delete {}", sequence))?;
        self.by_editor.remove(editor_id);
        self.by_sequence.remove(&sequence);
        Ok(Some(sequence))
    }

    /// Delete every mapped breakpoint. Numbering is not reset: the debugger
    /// process is the same one, so used numbers stay used.
    pub fn delete_all(
        &mut self,
        console: &dyn Console,
    ) -> Result<Vec<(String, u32)>, DebugError> {
        let mut deleted = Vec::with_capacity(self.by_sequence.len());
        while let Some((&sequence, _)) = self.by_sequence.first_key_value() {
            console.send(&format!("breakpoint delete {}", sequence))?;
            if let Some(editor_id) = self.by_sequence.remove(&sequence) {
                self.by_editor.remove(&editor_id);
                deleted.push((editor_id, sequence));
            }
        }
        Ok(deleted)
    }

    /// Set every breakpoint in `breakpoints`, collecting per-breakpoint failures.
    pub fn apply_all<'b>(
        &mut self,
        breakpoints: impl IntoIterator<Item = &'b EditorBreakpoint>,
        resolution: &Resolution<'_>,
        console: &dyn Console,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for bp in breakpoints {
            match self.add(bp, resolution, console) {
                Ok(Some(registered)) => report.registered.push(registered),
                Ok(None) => {}
                Err(e) => {
                    warn!("Breakpoint {} not set: {}", bp.id, e);
                    report.rejected.push((bp.id.clone(), e));
                }
            }
        }
        report
    }
}
