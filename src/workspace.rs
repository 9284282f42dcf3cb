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

//! Workspace layout: which program to build, where its artifacts land and
//! where instruction inputs live.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

use crate::error::DebugError;
use crate::resolver::NamingPolicy;
use crate::utils::artifact_prefix;

/// Native layouts keep the program manifest in one of these places, checked
/// in order.
const NATIVE_MANIFESTS: [&str; 3] = ["program/src/Cargo.toml", "program/Cargo.toml", "Cargo.toml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// Plain Solana program (including Steel).
    Native,
    /// Anchor workspace with one or more programs under `programs/`.
    Anchor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubProject {
    /// Directory name under `programs/` (or the package name for native).
    pub name: String,
    pub package_name: String,
    pub manifest: PathBuf,
}

#[derive(Deserialize)]
struct Manifest {
    package: Option<PackageSection>,
}

#[derive(Deserialize)]
struct PackageSection {
    name: Option<String>,
}

/// Package name declared by a Cargo manifest, if it has one.
fn package_name(manifest: &Path) -> Option<String> {
    let text = fs::read_to_string(manifest).ok()?;
    match toml::from_str::<Manifest>(&text) {
        Ok(m) => m.package.and_then(|p| p.name),
        Err(e) => {
            warn!("Failed to parse {}: {}", manifest.display(), e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub kind: LayoutKind,
    pub sub_projects: Vec<SubProject>,
}

impl Workspace {
    pub fn discover(root: &Path) -> Result<Self, DebugError> {
        for rel in NATIVE_MANIFESTS {
            let manifest = root.join(rel);
            if let Some(package) = package_name(&manifest) {
                debug!("Native layout: {} from {}", package, manifest.display());
                return Ok(Self {
                    root: root.to_path_buf(),
                    kind: LayoutKind::Native,
                    sub_projects: vec![SubProject {
                        name: package.clone(),
                        package_name: package,
                        manifest,
                    }],
                });
            }
        }

        let mut sub_projects = Vec::new();
        if let Ok(entries) = fs::read_dir(root.join("programs")) {
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            dirs.sort();
            for dir in dirs {
                let manifest = dir.join("Cargo.toml");
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match package_name(&manifest) {
                    Some(package_name) => sub_projects.push(SubProject {
                        name,
                        package_name,
                        manifest,
                    }),
                    None => warn!("Skipping programs/{}: no package name in Cargo.toml", name),
                }
            }
        }

        if sub_projects.is_empty() {
            return Err(DebugError::NoPackageFound {
                workspace: root.to_path_buf(),
            });
        }
        debug!("Anchor layout with {} program(s)", sub_projects.len());
        Ok(Self {
            root: root.to_path_buf(),
            kind: LayoutKind::Anchor,
            sub_projects,
        })
    }

    pub fn naming_policy(&self, sub_project: &SubProject) -> NamingPolicy {
        match self.kind {
            LayoutKind::Native => NamingPolicy::Raw,
            LayoutKind::Anchor => NamingPolicy::anchor_for(&sub_project.package_name),
        }
    }

    /// More than one buildable program means the user has to pick one.
    pub fn needs_selection(&self) -> bool {
        self.sub_projects.len() > 1
    }

    pub fn options(&self) -> Vec<String> {
        self.sub_projects.iter().map(|s| s.name.clone()).collect()
    }

    /// Pick the sub-project to debug. With a single candidate `choice` is
    /// ignored; otherwise it must name one of [`Workspace::options`].
    pub fn select(&self, choice: Option<&str>) -> Result<ProjectSelection, DebugError> {
        let sub_project = if self.needs_selection() {
            let choice = choice.ok_or(DebugError::SubProjectSelectionCancelled)?;
            self.sub_projects
                .iter()
                .find(|s| s.name == choice)
                .ok_or(DebugError::SubProjectSelectionCancelled)?
        } else {
            &self.sub_projects[0]
        };
        Ok(ProjectSelection {
            root: self.root.clone(),
            policy: self.naming_policy(sub_project),
            sub_project: sub_project.clone(),
            scoped_inputs: self.needs_selection(),
        })
    }
}

/// The program chosen for this session. Persists until the session ends.
#[derive(Debug, Clone)]
pub struct ProjectSelection {
    pub root: PathBuf,
    pub policy: NamingPolicy,
    pub sub_project: SubProject,
    /// Inputs live in a per-program subdirectory in multi-program workspaces.
    pub scoped_inputs: bool,
}

impl ProjectSelection {
    pub fn deploy_dir(&self) -> PathBuf {
        self.root.join("target").join("deploy")
    }

    /// `<root>/input/[<sub_project>/]<instruction>.json`
    pub fn instruction_input(&self, instruction: &str) -> PathBuf {
        let mut path = self.root.join("input");
        if self.scoped_inputs {
            path.push(&self.sub_project.name);
        }
        path.push(format!("{}.json", instruction));
        path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// ELF with debug info; loaded by the debugger and disassembled.
    pub debug_binary: PathBuf,
    /// Deployable module; executed by the harness.
    pub loadable_module: PathBuf,
}

/// Find the build outputs for `package_name` in `deploy_dir`.
pub async fn discover_artifacts(
    deploy_dir: &Path,
    package_name: &str,
) -> Result<Artifacts, DebugError> {
    let prefix = artifact_prefix(package_name);
    let mut files = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(deploy_dir).await {
        while let Some(entry) = entries.next_entry().await? {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();

    let find = |extension: &str| -> Result<PathBuf, DebugError> {
        let exact = format!("{}{}", prefix, extension);
        files
            .iter()
            .find(|f| **f == exact)
            .or_else(|| {
                files
                    .iter()
                    .find(|f| f.starts_with(&prefix) && f.ends_with(extension))
            })
            .map(|f| deploy_dir.join(f))
            .ok_or_else(|| DebugError::ArtifactNotFound {
                dir: deploy_dir.to_path_buf(),
                prefix: prefix.clone(),
                extension: extension.to_string(),
            })
    };

    Ok(Artifacts {
        debug_binary: find(".debug")?,
        loadable_module: find(".so")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn package(name: &str) -> String {
        format!("[package]\nname = \"{}\"\nversion = \"0.1.0\"\n", name)
    }

    #[test]
    fn native_program_manifest_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "program/Cargo.toml", &package("token-swap"));
        write(dir.path(), "Cargo.toml", &package("root-crate"));

        let ws = Workspace::discover(dir.path()).unwrap();
        assert_eq!(ws.kind, LayoutKind::Native);
        assert_eq!(ws.sub_projects[0].package_name, "token-swap");
        assert_eq!(ws.naming_policy(&ws.sub_projects[0]), NamingPolicy::Raw);
        assert!(!ws.needs_selection());
    }

    #[test]
    fn anchor_workspace_lists_programs() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Cargo.toml",
            "[workspace]\nmembers = [\"programs/*\"]\n",
        );
        write(dir.path(), "programs/program-b/Cargo.toml", &package("program-b"));
        write(dir.path(), "programs/program-a/Cargo.toml", &package("program-a"));
        fs::create_dir_all(dir.path().join("programs/notes")).unwrap();

        let ws = Workspace::discover(dir.path()).unwrap();
        assert_eq!(ws.kind, LayoutKind::Anchor);
        assert_eq!(ws.options(), vec!["program-a", "program-b"]);
        assert!(ws.needs_selection());
        assert_eq!(
            ws.select(Some("program-a")).unwrap().policy,
            NamingPolicy::anchor_for("program-a")
        );
    }

    #[test]
    fn selection_is_required_for_multi_program() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "programs/a/Cargo.toml", &package("prog-a"));
        write(dir.path(), "programs/b/Cargo.toml", &package("prog-b"));
        let ws = Workspace::discover(dir.path()).unwrap();

        assert!(matches!(
            ws.select(None),
            Err(DebugError::SubProjectSelectionCancelled)
        ));
        assert!(matches!(
            ws.select(Some("c")),
            Err(DebugError::SubProjectSelectionCancelled)
        ));
        let sel = ws.select(Some("b")).unwrap();
        assert_eq!(sel.sub_project.package_name, "prog-b");
        assert_eq!(
            sel.instruction_input("say_hello"),
            dir.path().join("input/b/say_hello.json")
        );
    }

    #[test]
    fn single_program_inputs_are_not_scoped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "programs/vault/Cargo.toml", &package("vault"));
        let sel = Workspace::discover(dir.path())
            .unwrap()
            .select(Some("ignored"))
            .unwrap();
        assert_eq!(
            sel.instruction_input("process_deposit"),
            dir.path().join("input/process_deposit.json")
        );
        assert_eq!(sel.deploy_dir(), dir.path().join("target/deploy"));
    }

    #[test]
    fn empty_workspace_has_no_package() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Workspace::discover(dir.path()),
            Err(DebugError::NoPackageFound { .. })
        ));
    }

    #[tokio::test]
    async fn artifacts_match_normalized_prefix() {
        let dir = TempDir::new().unwrap();
        for f in [
            "my_vault-keypair.json",
            "my_vault.debug",
            "my_vault.so",
            "my_vault_v2.so",
            "other.so",
        ] {
            write(dir.path(), f, "");
        }
        let artifacts = discover_artifacts(dir.path(), "my-vault").await.unwrap();
        assert_eq!(artifacts.debug_binary, dir.path().join("my_vault.debug"));
        assert_eq!(artifacts.loadable_module, dir.path().join("my_vault.so"));
    }

    #[tokio::test]
    async fn missing_debug_artifact() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "vault.so", "");
        let err = discover_artifacts(dir.path(), "vault").await.unwrap_err();
        match err {
            DebugError::ArtifactNotFound { extension, .. } => assert_eq!(extension, ".debug"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_deploy_dir() {
        let dir = TempDir::new().unwrap();
        let err = discover_artifacts(&dir.path().join("target/deploy"), "vault")
            .await
            .unwrap_err();
        assert!(matches!(err, DebugError::ArtifactNotFound { .. }));
    }
}
