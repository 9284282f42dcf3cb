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

//! Turns a function name into something the debugger can break on.

use std::fmt;

use regex::Regex;

use crate::error::DebugError;
use crate::symbol_map::{SymbolMap, SymbolMapEntry};
use crate::utils::artifact_prefix;

/// Anchor namespaces instruction handlers under `global::<name>`.
pub const ANCHOR_NAMESPACE: &str = "global";

/// How function names appear in the symbol table, chosen once per session
/// from the project layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingPolicy {
    /// Handlers live under a discriminator namespace. Breakpoints are set by
    /// the address of the matching symbol. Symbols under `crate_prefix`
    /// (the program being debugged) win over same-named handlers pulled in
    /// from other program crates.
    Mangled {
        namespace: String,
        crate_prefix: Option<String>,
    },
    /// Plain (`#[no_mangle]`) function names. Breakpoints are set by name,
    /// since the harness may relocate raw addresses after load.
    Raw,
}

impl NamingPolicy {
    pub fn anchor() -> Self {
        NamingPolicy::Mangled {
            namespace: ANCHOR_NAMESPACE.to_string(),
            crate_prefix: None,
        }
    }

    /// Anchor naming for the program built from `package_name`.
    pub fn anchor_for(package_name: &str) -> Self {
        NamingPolicy::Mangled {
            namespace: ANCHOR_NAMESPACE.to_string(),
            crate_prefix: Some(artifact_prefix(package_name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointTarget {
    Address(String),
    Name(String),
}

impl BreakpointTarget {
    /// The debugger line that sets a breakpoint on this target.
    pub fn set_command(&self) -> String {
        match self {
            BreakpointTarget::Address(addr) => format!("breakpoint set --address {}", addr),
            BreakpointTarget::Name(name) => format!("breakpoint set --name {}", name),
        }
    }
}

impl fmt::Display for BreakpointTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakpointTarget::Address(addr) => write!(f, "{}", addr),
            BreakpointTarget::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Resolve `function` against the symbol map under `policy`.
///
/// Under [`NamingPolicy::Mangled`] a symbol matches when it contains
/// `<namespace>::<function>` followed by `::` or the end of the name, so `foo`
/// never matches `foobar`. Symbols naming the handler itself (optionally with
/// a trailing `::h<hash>`) win over nested items such as closures, and
/// symbols under the policy's crate prefix win over the rest. If the winners
/// disagree on the address the result is [`DebugError::AmbiguousSymbol`].
pub fn resolve(
    map: &SymbolMap,
    function: &str,
    policy: &NamingPolicy,
) -> Result<BreakpointTarget, DebugError> {
    match policy {
        NamingPolicy::Mangled {
            namespace,
            crate_prefix,
        } => resolve_mangled(map, function, namespace, crate_prefix.as_deref()),
        NamingPolicy::Raw => {
            if map
                .entries()
                .iter()
                .any(|e| e.symbol_name.contains(function))
            {
                Ok(BreakpointTarget::Name(function.to_string()))
            } else {
                Err(DebugError::SymbolNotFound {
                    function: function.to_string(),
                })
            }
        }
    }
}

fn resolve_mangled(
    map: &SymbolMap,
    function: &str,
    namespace: &str,
    crate_prefix: Option<&str>,
) -> Result<BreakpointTarget, DebugError> {
    let qualified = format!("{}::{}", regex::escape(namespace), regex::escape(function));
    let boundary = Regex::new(&format!("{}(::|$)", qualified)).expect("escaped pattern");
    let direct = Regex::new(&format!("{}(::h[0-9a-f]{{16}})?$", qualified)).expect("escaped pattern");

    let matches: Vec<&SymbolMapEntry> = map
        .entries()
        .iter()
        .filter(|e| boundary.is_match(&e.symbol_name))
        .collect();
    let exact: Vec<&SymbolMapEntry> = matches
        .iter()
        .copied()
        .filter(|e| direct.is_match(&e.symbol_name))
        .collect();
    let mut winners = if exact.is_empty() { matches } else { exact };
    if let Some(prefix) = crate_prefix {
        let owned = format!("{}::", prefix);
        let local: Vec<&SymbolMapEntry> = winners
            .iter()
            .copied()
            .filter(|e| e.symbol_name.starts_with(&owned))
            .collect();
        if !local.is_empty() {
            winners = local;
        }
    }

    let Some(first) = winners.first() else {
        return Err(DebugError::SymbolNotFound {
            function: function.to_string(),
        });
    };
    if winners.iter().any(|e| e.address != first.address) {
        return Err(DebugError::AmbiguousSymbol {
            function: function.to_string(),
            candidates: winners
                .iter()
                .map(|e| format!("{} @ {}", e.symbol_name, e.address))
                .collect(),
        });
    }
    Ok(BreakpointTarget::Address(format_address(&first.address)))
}

fn format_address(raw: &str) -> String {
    if raw.starts_with("0x") || raw.starts_with("0X") {
        raw.to_string()
    } else {
        format!("0x{}", raw)
    }
}
