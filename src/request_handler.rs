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

//! Request parsing and dispatch for the stdin reader.

use crate::helper_requests::HelperRequest;
use log::{error, warn};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

const KNOWN_REQUESTS: [&str; 6] = [
    "start",
    "selectSubProject",
    "breakpointsChanged",
    "runInstruction",
    "continue",
    "stop",
];

/// Parse a request from the editor based on its 'req' discriminant.
///
/// Unknown or malformed requests are logged and skipped; they never stop the
/// reader.
pub fn parse_request(msg: &Value) -> Option<HelperRequest> {
    // Peek at the 'req' discriminant to tell unknown kinds from bad payloads
    let req_type = msg.get("req").and_then(|v| v.as_str());
    match req_type {
        Some(kind) if KNOWN_REQUESTS.contains(&kind) => {
            match serde_json::from_value::<HelperRequest>(msg.clone()) {
                Ok(req) => Some(req),
                Err(e) => {
                    warn!("Failed to parse {} request: {}", kind, e);
                    None
                }
            }
        }
        _ => {
            warn!("Unknown request type: {:?}", req_type);
            None
        }
    }
}

/// Forward a parsed request to the orchestrator. Returns false once the
/// orchestrator is gone.
pub fn dispatch_request(msg: &Value, req_tx: &UnboundedSender<HelperRequest>) -> bool {
    let Some(req) = parse_request(msg) else {
        return true;
    };
    if req_tx.send(req).is_err() {
        error!("Orchestrator stopped; dropping requests");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[test]
    fn known_request_parses() {
        let req = parse_request(&json!({"req": "continue", "seq": 3})).unwrap();
        assert_eq!(req, HelperRequest::Continue { seq: 3 });
    }

    #[test]
    fn unknown_and_malformed_requests_are_skipped() {
        assert!(parse_request(&json!({"req": "disassemble", "seq": 1})).is_none());
        assert!(parse_request(&json!({"seq": 1})).is_none());
        assert!(parse_request(&json!({"req": "start", "seq": 1})).is_none());
    }

    #[test]
    fn dispatch_stops_when_receiver_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        assert!(dispatch_request(&json!({"req": "stop", "seq": 1}), &tx));
        assert!(dispatch_request(&json!({"req": "bogus"}), &tx));
        drop(rx);
        assert!(!dispatch_request(&json!({"req": "stop", "seq": 2}), &tx));
    }
}
