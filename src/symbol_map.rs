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

//! Function symbol map built from the disassembler's symbol table dump.
//!
//! We run `llvm-objdump -t --demangle` against the `.debug` artifact and keep
//! only function symbols. Each entry is the address token exactly as objdump
//! printed it and the (demangled) symbol name. The map is rebuilt from scratch
//! for every session and scanned linearly by the resolver; it is small enough
//! that an index buys nothing.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info};
use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::error::DebugError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMapEntry {
    pub address: String,
    pub symbol_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    entries: Vec<SymbolMapEntry>,
}

impl SymbolMap {
    pub fn new(entries: Vec<SymbolMapEntry>) -> Self {
        Self { entries }
    }

    /// Parse `llvm-objdump -t` output, keeping lines flagged `F` (function).
    ///
    /// A symbol line looks like
    /// `0000000000000120 g     F .text  0000000000000068 entrypoint`: address,
    /// one or more flag tokens, section, size, then the name. Only the leading
    /// address and the trailing name are kept. Names can contain spaces once
    /// demangled (`<T as Trait>::f`), so everything after the size is the name.
    pub fn parse_objdump(text: &str) -> Self {
        let mut entries = Vec::new();
        for line in text.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.len() < 5 || !is_hex(words[0]) {
                continue;
            }
            // Flags occupy at most a few tokens right after the address.
            let Some(flag_idx) = words[1..words.len().min(4)]
                .iter()
                .position(|w| *w == "F")
                .map(|i| i + 1)
            else {
                continue;
            };
            let name_idx = flag_idx + 3;
            if words.len() <= name_idx {
                continue;
            }
            let raw_name = words[name_idx..].join(" ");
            entries.push(SymbolMapEntry {
                address: words[0].to_string(),
                symbol_name: demangle_if_needed(&raw_name),
            });
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[SymbolMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the map as `<address> <symbol>` lines.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(w, "{} {}", entry.address, entry.symbol_name)?;
        }
        w.flush()
    }

    /// Persist the map to a fresh temp file. The file is removed when the
    /// returned handle is dropped, which ties its lifetime to the session.
    pub fn persist(&self) -> io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("function_address_map")
            .suffix(".txt")
            .tempfile()?;
        self.write_to(io::BufWriter::new(file.as_file_mut()))?;
        Ok(file)
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

// objdump only demangles when it knows the scheme; catch what slips through.
fn demangle_if_needed(name: &str) -> String {
    if name.starts_with("_ZN") || name.starts_with("_R") {
        if let Ok(demangled) = rustc_demangle::try_demangle(name) {
            return demangled.to_string();
        }
    }
    name.to_string()
}

/// Runs the disassembler and turns its output into a [`SymbolMap`].
pub struct SymbolMapBuilder {
    objdump: PathBuf,
}

impl SymbolMapBuilder {
    pub fn new(objdump: impl Into<PathBuf>) -> Self {
        Self {
            objdump: objdump.into(),
        }
    }

    /// Dump the symbol table of `binary`. Never cached: every call runs the tool.
    pub async fn dump(&self, binary: &Path) -> Result<String, DebugError> {
        debug!(
            "Running {} -t {} --demangle",
            self.objdump.display(),
            binary.display()
        );
        let output = Command::new(&self.objdump)
            .arg("-t")
            .arg(binary)
            .arg("--demangle")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                DebugError::SymbolMapGenerationFailure(format!(
                    "failed to run {}: {}",
                    self.objdump.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(DebugError::SymbolMapGenerationFailure(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn build(&self, binary: &Path) -> Result<SymbolMap, DebugError> {
        let text = self.dump(binary).await?;
        let map = SymbolMap::parse_objdump(&text);
        if map.is_empty() {
            return Err(DebugError::SymbolMapGenerationFailure(format!(
                "no function symbols in {}",
                binary.display()
            )));
        }
        info!(
            "Symbol map built: {} functions from {}",
            map.len(),
            binary.display()
        );
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
/ws/target/deploy/vault.debug:\tfile format elf64-bpf

SYMBOL TABLE:
0000000000000000 l    df *ABS*\t0000000000000000 lib.rs
0000000000000120 l     F .text\t0000000000000068 vault::__private::__global::process_deposit::h0123456789abcdef
00000000000001a8 l     F .text\t0000000000000030 vault::helpers::fee
0000000000000400 l     O .rodata\t0000000000000010 FEE_TABLE
0000000000000560 g     F .text\t00000000000000f0 entrypoint
0000000000000000         *UND*\t0000000000000000 abort
";

    #[test]
    fn keeps_only_function_symbols() {
        let map = SymbolMap::parse_objdump(DUMP);
        let names: Vec<&str> = map
            .entries()
            .iter()
            .map(|e| e.symbol_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "vault::__private::__global::process_deposit::h0123456789abcdef",
                "vault::helpers::fee",
                "entrypoint",
            ]
        );
        assert_eq!(map.entries()[0].address, "0000000000000120");
        assert_eq!(map.entries()[2].address, "0000000000000560");
    }

    #[test]
    fn names_with_spaces_are_kept_whole() {
        let dump = "00000000000002f0 l     F .text\t0000000000000020 <vault::State as core::fmt::Debug>::fmt\n";
        let map = SymbolMap::parse_objdump(dump);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.entries()[0].symbol_name,
            "<vault::State as core::fmt::Debug>::fmt"
        );
    }

    #[test]
    fn mangled_leftovers_are_demangled() {
        let dump =
            "0000000000000010 l     F .text\t0000000000000008 _ZN5vault7process17h0123456789abcdefE\n";
        let map = SymbolMap::parse_objdump(dump);
        assert_eq!(
            map.entries()[0].symbol_name,
            "vault::process::h0123456789abcdef"
        );
    }

    #[test]
    fn empty_dump_gives_empty_map() {
        let map = SymbolMap::parse_objdump("SYMBOL TABLE:\n");
        assert!(map.is_empty());
    }

    #[test]
    fn persisted_file_has_one_line_per_entry() {
        let map = SymbolMap::parse_objdump(DUMP);
        let file = map.persist().unwrap();
        let path = file.path().to_path_buf();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with(
            "0000000000000120 vault::__private::__global::process_deposit::h0123456789abcdef\n"
        ));
        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_disassembler_is_a_generation_failure() {
        let builder = SymbolMapBuilder::new("/nonexistent/llvm-objdump");
        let err = builder
            .build(Path::new("/nonexistent/vault.debug"))
            .await
            .unwrap_err();
        assert!(matches!(err, DebugError::SymbolMapGenerationFailure(_)));
    }
}
