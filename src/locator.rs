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

//! Maps a source line to the name of the function that encloses it.

use regex::Regex;

/// Anything that can answer "which function is this line in".
///
/// Lines are 1-based, the way editors report them.
pub trait FunctionLocator: Send + Sync {
    fn locate(&self, source: &str, line: u32) -> Option<String>;
}

/// Brace-depth scanner.
///
/// Every line containing `fn <ident>` starts a new "current function" and
/// resets the depth to zero; every line then adjusts the depth by its net
/// count of `{` and `}`. A line is inside the current function when the depth
/// is positive after that line has been processed.
///
/// This is not a parser. Braces inside string literals or comments, and the
/// word `fn` inside them, will throw the count off. Nested functions and
/// closures are attributed to the innermost `fn` seen so far.
pub struct BraceDepthLocator {
    fn_def: Regex,
}

impl Default for BraceDepthLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BraceDepthLocator {
    pub fn new() -> Self {
        Self {
            fn_def: Regex::new(r"fn\s+(\w+)").expect("static regex"),
        }
    }
}

impl FunctionLocator for BraceDepthLocator {
    fn locate(&self, source: &str, line: u32) -> Option<String> {
        let mut depth: i64 = 0;
        let mut current: Option<&str> = None;

        for (idx, text) in source.lines().enumerate() {
            if let Some(caps) = self.fn_def.captures(text) {
                current = caps.get(1).map(|m| m.as_str());
                depth = 0;
            }
            for ch in text.chars() {
                match ch {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
            }
            if idx + 1 == line as usize {
                return if depth > 0 {
                    current.map(str::to_string)
                } else {
                    None
                };
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
use anchor_lang::prelude::*;

pub fn process_deposit(amount: u64) -> Result<()> {
    let fee = amount / 100;
    if fee > 0 {
        msg!(\"fee {}\", fee);
    }
    Ok(())
}

const LIMIT: u64 = 10;
";

    #[test]
    fn lines_inside_body_resolve() {
        let locator = BraceDepthLocator::new();
        for line in 4..=8 {
            assert_eq!(
                locator.locate(SOURCE, line).as_deref(),
                Some("process_deposit"),
                "line {line}"
            );
        }
    }

    #[test]
    fn lines_outside_body_do_not_resolve() {
        let locator = BraceDepthLocator::new();
        for line in [1, 2, 9, 10, 11] {
            assert_eq!(locator.locate(SOURCE, line), None, "line {line}");
        }
    }

    #[test]
    fn definition_line_counts_when_it_opens_the_body() {
        let locator = BraceDepthLocator::new();
        assert_eq!(
            locator.locate(SOURCE, 3).as_deref(),
            Some("process_deposit")
        );

        let split = "fn split(a: u8)\n{\n    a;\n}\n";
        assert_eq!(locator.locate(split, 1), None);
        assert_eq!(locator.locate(split, 2).as_deref(), Some("split"));
        assert_eq!(locator.locate(split, 3).as_deref(), Some("split"));
        assert_eq!(locator.locate(split, 4), None);
    }

    #[test]
    fn line_before_any_definition() {
        let locator = BraceDepthLocator::new();
        let src = "mod a {\n    const X: u8 = 1;\n}\nfn later() {\n}\n";
        assert_eq!(locator.locate(src, 2), None);
    }

    #[test]
    fn nested_definitions_take_innermost() {
        let locator = BraceDepthLocator::new();
        let src = "\
#[program]
pub mod vault {
    use super::*;

    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
        Ok(())
    }

    pub fn withdraw(ctx: Context<Withdraw>, amount: u64) -> Result<()> {
        require!(amount > 0, VaultError::Zero);
        Ok(())
    }
}
";
        assert_eq!(locator.locate(src, 3), None);
        assert_eq!(locator.locate(src, 6).as_deref(), Some("initialize"));
        assert_eq!(locator.locate(src, 10).as_deref(), Some("withdraw"));
        assert_eq!(locator.locate(src, 12), None);
    }

    #[test]
    fn line_past_end_of_file() {
        let locator = BraceDepthLocator::new();
        assert_eq!(locator.locate(SOURCE, 500), None);
        assert_eq!(locator.locate("", 1), None);
    }
}
