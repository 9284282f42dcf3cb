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

/// Global debug flag and logger setup
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Result;
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Initialize the debug flag. Must be called once at startup.
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.set(enabled).ok();
}

/// Check if debug mode is enabled
pub fn is_debug() -> bool {
    *DEBUG_ENABLED.get().unwrap_or(&false)
}

/// Start logging to stderr (stdout carries the protocol). `RUST_LOG` wins over
/// the `--debug` default. Keep the returned handle alive for the whole run.
pub fn init_logging(debug: bool, log_dir: Option<&Path>) -> Result<LoggerHandle> {
    set_debug(debug);
    let level = if debug { "debug" } else { "info" };
    let logger = Logger::try_with_env_or_str(level)?.format(flexi_logger::detailed_format);
    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir).basename("sbf-debug-helper"))
            .duplicate_to_stderr(Duplicate::All),
        None => logger.log_to_stderr(),
    };
    Ok(logger.start()?)
}
