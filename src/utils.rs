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

use std::env;
use std::path::{Path, PathBuf};

use urlencoding::decode;

/// Normalize an editor-supplied source location into a filesystem path.
///
/// Accepts plain paths and `file://` URIs (percent-encoded). Relative paths
/// are taken against the current directory. The result is canonicalized with
/// `dunce` when the file exists, so Windows paths lose their `\\?\` prefix.
pub fn canonicalize_path(source_path: &str) -> PathBuf {
    let mut path_str = source_path.to_string();

    if let Some(rest) = path_str.strip_prefix("file://") {
        let decoded = decode(rest)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| rest.to_string());
        path_str = decoded;

        // file:///C:/... arrives as /C:/...
        if cfg!(windows) && path_str.starts_with('/') && path_str.chars().nth(2) == Some(':') {
            path_str.remove(0);
        }
    }

    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().unwrap_or_default().join(path)
    };

    dunce::canonicalize(&absolute).unwrap_or(absolute)
}

/// Build artifacts are named after the package with `-` replaced by `_`.
pub fn artifact_prefix(package_name: &str) -> String {
    package_name.replace('-', "_")
}

/// `$HOME`, falling back to the current directory.
pub fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_uri_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("my lib.rs");
        std::fs::write(&file, "fn main() {}\n").unwrap();

        let uri = format!(
            "file://{}",
            file.to_string_lossy().replace(' ', "%20")
        );
        assert_eq!(
            canonicalize_path(&uri),
            dunce::canonicalize(&file).unwrap()
        );
    }

    #[test]
    fn missing_file_keeps_absolute_path() {
        let p = canonicalize_path("/definitely/not/here/lib.rs");
        assert_eq!(p, PathBuf::from("/definitely/not/here/lib.rs"));
    }

    #[test]
    fn prefix_replaces_dashes() {
        assert_eq!(artifact_prefix("anchor-multi-program"), "anchor_multi_program");
        assert_eq!(artifact_prefix("vault"), "vault");
    }
}
