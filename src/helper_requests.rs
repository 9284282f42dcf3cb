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

use serde::{Deserialize, Serialize};

// Request and event types for the editor ↔ helper communication. The editor
// extension spawns the helper and exchanges Content-Length framed JSON over
// stdio. Field names are snake_case on the wire; request and event kinds are
// discriminated by `req` and `type` respectively.

/**
 * A breakpoint as the editor knows it. The helper never changes these, it only
 * mirrors the editor's current set. `line` is 1-based. `source_path` may be a
 * plain path or a `file://` URI.
 */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ts_rs::TS)]
#[ts(export, export_to = "bindings/")]
pub struct EditorBreakpoint {
    pub id: String,
    pub source_path: String,
    pub line: u32,
}

/**
 * Requests from the editor. Every request carries the editor's `seq` so errors
 * can be correlated, but none of them get a direct response: outcomes arrive as
 * `HelperEvent`s.
 */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ts_rs::TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "req", rename_all = "camelCase")]
pub enum HelperRequest {
    /// Start (or restart) a debug session for the workspace.
    Start {
        seq: u64,
        workspace: String,
        /// Pre-selects the sub-project in multi-program workspaces.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sub_project: Option<String>,
        /// Overrides the configured debugger executable.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        debugger_path: Option<String>,
    },

    /// Answer to a `SelectSubProject` event. `None` cancels.
    SelectSubProject {
        seq: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Incremental change to the editor's breakpoint set.
    BreakpointsChanged {
        seq: u64,
        #[serde(default)]
        added: Vec<EditorBreakpoint>,
        #[serde(default)]
        removed: Vec<String>,
    },

    /// Launch the harness for one instruction and attach the debugger to it.
    RunInstruction {
        seq: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instruction: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        breakpoint_id: Option<String>,
    },

    /// Resume the attached process, or start a new session if none is live.
    Continue { seq: u64 },

    /// Tear down the live session.
    Stop { seq: u64 },
}

impl HelperRequest {
    pub fn seq(&self) -> u64 {
        match self {
            HelperRequest::Start { seq, .. }
            | HelperRequest::SelectSubProject { seq, .. }
            | HelperRequest::BreakpointsChanged { seq, .. }
            | HelperRequest::RunInstruction { seq, .. }
            | HelperRequest::Continue { seq }
            | HelperRequest::Stop { seq } => *seq,
        }
    }
}

/**
 * Events generated by the helper process and sent to the editor.
 * Uses internally-tagged enum serialization so each variant has a 'type' field.
 * In TypeScript, this becomes a discriminated union for type-safe event handling.
 */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ts_rs::TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum HelperEvent {
    /// The session moved to a new state (see `SessionState`).
    StateChanged { session_id: String, state: String },

    /// The workspace holds several programs; the editor must answer with
    /// `selectSubProject`.
    SelectSubProject {
        session_id: String,
        options: Vec<String>,
    },

    /// A breakpoint was set in the debugger.
    BreakpointRegistered {
        session_id: String,
        breakpoint_id: String,
        sequence: u32,
        command: String,
    },

    /// A breakpoint could not be set; the session carries on without it.
    BreakpointRejected {
        session_id: String,
        breakpoint_id: String,
        code: String,
        message: String,
    },

    /// A breakpoint was deleted from the debugger.
    BreakpointDeleted {
        session_id: String,
        breakpoint_id: String,
        sequence: u32,
    },

    /// Error message
    Error {
        session_id: String,
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },

    /// Diagnostic/log message (typically only shown if verbose logging enabled)
    Log {
        session_id: String,
        level: String, // "trace", "debug", "info", "warn", "error"
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_request_from_json() {
        let req: HelperRequest = serde_json::from_value(json!({
            "req": "start",
            "seq": 1,
            "workspace": "/home/dev/vault",
        }))
        .unwrap();
        assert_eq!(
            req,
            HelperRequest::Start {
                seq: 1,
                workspace: "/home/dev/vault".into(),
                sub_project: None,
                debugger_path: None,
            }
        );
    }

    #[test]
    fn breakpoints_changed_defaults_missing_lists() {
        let req: HelperRequest = serde_json::from_value(json!({
            "req": "breakpointsChanged",
            "seq": 7,
            "added": [{"id": "bp-1", "source_path": "/ws/src/lib.rs", "line": 42}],
        }))
        .unwrap();
        match req {
            HelperRequest::BreakpointsChanged { added, removed, .. } => {
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].line, 42);
                assert!(removed.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn event_is_tagged_by_type() {
        let event = HelperEvent::BreakpointRegistered {
            session_id: "session-1".into(),
            breakpoint_id: "bp-1".into(),
            sequence: 1,
            command: "breakpoint set --address 0x120".into(),
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "BreakpointRegistered");
        assert_eq!(v["sequence"], 1);
    }

    #[test]
    fn error_event_omits_missing_details() {
        let event = HelperEvent::Error {
            session_id: "session-2".into(),
            code: "NoLiveSession".into(),
            message: "no live debug session".into(),
            details: None,
        };
        let v = serde_json::to_value(&event).unwrap();
        assert!(v.get("details").is_none());
    }
}
