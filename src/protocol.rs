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

//! Event builders and the notification envelope for helper → editor messages.

use std::error::Error;

use serde_json::{json, Value};

use crate::error::DebugError;
use crate::helper_requests::HelperEvent;
use crate::session::SessionState;

/// Wrap an event in a JSON-RPC notification envelope for sending to the editor.
pub fn wrap_event_as_notification(event: &HelperEvent) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "HelperEvent",
        "params": event
    })
}

pub fn state_changed(session_id: &str, state: SessionState) -> HelperEvent {
    HelperEvent::StateChanged {
        session_id: session_id.to_string(),
        state: state.as_str().to_string(),
    }
}

/// Error event; `details` carries the underlying cause when there is one.
pub fn error_event(session_id: &str, err: &DebugError) -> HelperEvent {
    HelperEvent::Error {
        session_id: session_id.to_string(),
        code: err.code().to_string(),
        message: err.to_string(),
        details: err.source().map(|cause| cause.to_string()),
    }
}

pub fn breakpoint_rejected(session_id: &str, breakpoint_id: &str, err: &DebugError) -> HelperEvent {
    HelperEvent::BreakpointRejected {
        session_id: session_id.to_string(),
        breakpoint_id: breakpoint_id.to_string(),
        code: err.code().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn notification_envelope() {
        let v = wrap_event_as_notification(&state_changed("session-1", SessionState::Building));
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["method"], "HelperEvent");
        assert_eq!(v["params"]["type"], "StateChanged");
        assert_eq!(v["params"]["state"], "Building");
    }

    #[test]
    fn spawn_error_details_carry_the_io_cause() {
        let err = DebugError::ProcessSpawn {
            program: "solana-lldb".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        match error_event("session-4", &err) {
            HelperEvent::Error { code, details, .. } => {
                assert_eq!(code, "ProcessSpawn");
                assert_eq!(details.as_deref(), Some("No such file or directory"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejection_uses_error_code() {
        let err = DebugError::SymbolNotFound {
            function: "process_deposit".into(),
        };
        match breakpoint_rejected("session-1", "bp-9", &err) {
            HelperEvent::BreakpointRejected {
                breakpoint_id,
                code,
                ..
            } => {
                assert_eq!(breakpoint_id, "bp-9");
                assert_eq!(code, "SymbolNotFound");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
