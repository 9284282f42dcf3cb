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

//! The session orchestrator.
//!
//! A single task owns the (at most one) session and handles editor requests
//! one at a time. Startup and attach are slow, so they run as spawned tasks
//! that hold the session by value while the orchestrator sits in `Busy`. Each
//! task reports back over an internal channel tagged with the generation it
//! was started for; anything from an older generation is dropped, which also
//! tears down the processes it carried.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::console::wait_for_exit;
use crate::debug;
use crate::error::DebugError;
use crate::helper_requests::{EditorBreakpoint, HelperEvent, HelperRequest};
use crate::locator::{BraceDepthLocator, FunctionLocator};
use crate::protocol;
use crate::session::{self, session_id, Session, SessionState};
use crate::sync::{FsSources, SourceProvider, SyncReport};
use crate::toolchain::Toolchain;
use crate::utils::canonicalize_path;
use crate::workspace::{ProjectSelection, Workspace};

/// Parameters of the last `start`, reused when `continue` has to begin a new
/// session.
#[derive(Debug, Clone)]
struct StartParams {
    workspace: String,
    sub_project: Option<String>,
    debugger_path: Option<String>,
}

enum Internal {
    Progress {
        generation: u64,
        state: SessionState,
    },
    Started {
        generation: u64,
        result: Result<Session, DebugError>,
    },
    Attached {
        generation: u64,
        result: Result<(Session, Vec<(String, u32)>), DebugError>,
    },
    DebuggerExited {
        generation: u64,
    },
}

enum Slot {
    Idle,
    AwaitingSelection {
        workspace: Workspace,
        debugger_path: PathBuf,
    },
    /// A spawned task owns the session.
    Busy {
        state: SessionState,
        task: JoinHandle<()>,
    },
    Live(Session),
    Failed,
}

impl Slot {
    fn state(&self) -> SessionState {
        match self {
            Slot::Idle | Slot::AwaitingSelection { .. } => SessionState::Idle,
            Slot::Busy { state, .. } => *state,
            Slot::Live(session) => session.state,
            Slot::Failed => SessionState::Failed,
        }
    }
}

pub struct Orchestrator<T: Toolchain> {
    toolchain: Arc<T>,
    config: Arc<SessionConfig>,
    locator: Box<dyn FunctionLocator>,
    sources: Box<dyn SourceProvider>,
    events: mpsc::UnboundedSender<HelperEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    slot: Slot,
    generation: u64,
    /// The editor's breakpoints, in the order they were added. Outlives
    /// sessions; every new session and every attach is synced from it.
    editor: Vec<EditorBreakpoint>,
    last_start: Option<StartParams>,
}

impl<T: Toolchain> Orchestrator<T> {
    pub fn new(
        toolchain: T,
        config: SessionConfig,
        events: mpsc::UnboundedSender<HelperEvent>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            toolchain: Arc::new(toolchain),
            config: Arc::new(config),
            locator: Box::new(BraceDepthLocator::new()),
            sources: Box::new(FsSources),
            events,
            internal_tx,
            internal_rx,
            slot: Slot::Idle,
            generation: 0,
            editor: Vec::new(),
            last_start: None,
        }
    }

    /// Handle requests until the request channel closes, then tear down.
    pub async fn run(mut self, mut requests: mpsc::UnboundedReceiver<HelperRequest>) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                Some(msg) = self.internal_rx.recv() => self.handle_internal(msg),
            }
        }
        info!("Request channel closed, shutting down");
        self.teardown();
    }

    fn session_id(&self) -> String {
        session_id(self.generation)
    }

    fn emit(&self, event: HelperEvent) {
        if self.events.send(event).is_err() {
            debug!("Event dropped: no listener");
        }
    }

    fn emit_state(&self, state: SessionState) {
        self.emit(protocol::state_changed(&self.session_id(), state));
    }

    fn emit_error(&self, err: &DebugError) {
        self.emit(protocol::error_event(&self.session_id(), err));
    }

    /// Editor-visible diagnostics, only in debug mode.
    fn emit_log(&self, level: &str, message: String) {
        if debug::is_debug() {
            self.emit(HelperEvent::Log {
                session_id: self.session_id(),
                level: level.to_string(),
                message,
            });
        }
    }

    fn fail(&mut self, err: DebugError) {
        warn!("{} failed: {}", self.session_id(), err);
        self.teardown();
        self.slot = Slot::Failed;
        self.emit_error(&err);
        self.emit_state(SessionState::Failed);
    }

    /// Drop whatever session exists. Aborting a busy task drops the session it
    /// holds, which kills its processes.
    fn teardown(&mut self) {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Busy { task, .. } => task.abort(),
            Slot::Live(session) => {
                debug!("Tearing down {}", session.id());
                drop(session);
            }
            _ => {}
        }
    }

    fn handle_request(&mut self, request: HelperRequest) {
        debug!("Request #{}: {:?}", request.seq(), request);
        match request {
            HelperRequest::Start {
                workspace,
                sub_project,
                debugger_path,
                ..
            } => self.start(StartParams {
                workspace,
                sub_project,
                debugger_path,
            }),
            HelperRequest::SelectSubProject { name, .. } => self.select_sub_project(name),
            HelperRequest::BreakpointsChanged { added, removed, .. } => {
                self.breakpoints_changed(added, removed)
            }
            HelperRequest::RunInstruction {
                instruction,
                breakpoint_id,
                ..
            } => self.run_instruction(instruction, breakpoint_id),
            HelperRequest::Continue { .. } => self.resume(),
            HelperRequest::Stop { .. } => {
                self.teardown();
                self.emit_state(SessionState::Idle);
            }
        }
    }

    fn start(&mut self, params: StartParams) {
        self.teardown();
        self.generation += 1;
        self.last_start = Some(params.clone());
        info!("Starting {} for {}", self.session_id(), params.workspace);

        let root = canonicalize_path(&params.workspace);
        let debugger_path = params
            .debugger_path
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.debugger.clone());
        let workspace = match Workspace::discover(&root) {
            Ok(ws) => ws,
            Err(e) => return self.fail(e),
        };

        if workspace.needs_selection() && params.sub_project.is_none() {
            let options = workspace.options();
            self.slot = Slot::AwaitingSelection {
                workspace,
                debugger_path,
            };
            self.emit(HelperEvent::SelectSubProject {
                session_id: self.session_id(),
                options,
            });
            return;
        }
        match workspace.select(params.sub_project.as_deref()) {
            Ok(project) => self.spawn_startup(project, debugger_path),
            Err(e) => self.fail(e),
        }
    }

    fn select_sub_project(&mut self, name: Option<String>) {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::AwaitingSelection {
                workspace,
                debugger_path,
            } => match workspace.select(name.as_deref()) {
                Ok(project) => {
                    if let Some(last) = self.last_start.as_mut() {
                        last.sub_project = Some(project.sub_project.name.clone());
                    }
                    self.spawn_startup(project, debugger_path)
                }
                Err(e) => self.fail(e),
            },
            other => {
                warn!("Sub-project selection with no pending prompt ignored");
                self.slot = other;
            }
        }
    }

    fn reporter(&self, generation: u64) -> impl Fn(SessionState) + Send + Sync + 'static {
        let tx = self.internal_tx.clone();
        move |state| {
            let _ = tx.send(Internal::Progress { generation, state });
        }
    }

    fn spawn_startup(&mut self, project: ProjectSelection, debugger_path: PathBuf) {
        let generation = self.generation;
        let toolchain = Arc::clone(&self.toolchain);
        let config = Arc::clone(&self.config);
        let tx = self.internal_tx.clone();
        let report = self.reporter(generation);
        let task = tokio::spawn(async move {
            let result = session::start(
                toolchain.as_ref(),
                &config,
                project,
                debugger_path,
                generation,
                report,
            )
            .await;
            let _ = tx.send(Internal::Started { generation, result });
        });
        self.slot = Slot::Busy {
            state: SessionState::Idle,
            task,
        };
    }

    fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::Progress { generation, state } => {
                if generation != self.generation {
                    return;
                }
                if let Slot::Busy { state: current, .. } = &mut self.slot {
                    *current = state;
                    self.emit_state(state);
                }
            }
            Internal::Started { generation, result } => {
                if generation != self.generation || !matches!(self.slot, Slot::Busy { .. }) {
                    debug!("Dropping stale startup of {}", session_id(generation));
                    return;
                }
                match result {
                    Ok(session) => self.on_started(session),
                    Err(e) => self.fail(e),
                }
            }
            Internal::Attached { generation, result } => {
                if generation != self.generation || !matches!(self.slot, Slot::Busy { .. }) {
                    debug!("Dropping stale attach of {}", session_id(generation));
                    return;
                }
                match result {
                    Ok((session, deleted)) => self.on_attached(session, deleted),
                    Err(e) => self.fail(e),
                }
            }
            Internal::DebuggerExited { generation } => {
                if generation != self.generation {
                    return;
                }
                if matches!(self.slot, Slot::Live(_) | Slot::Busy { .. }) {
                    info!("Debugger for {} exited, clearing session", self.session_id());
                    self.teardown();
                    self.emit_log("info", "debugger exited".to_string());
                    self.emit_state(SessionState::Idle);
                }
            }
        }
    }

    fn watch_debugger(&self, session: &Session) {
        let tx = self.internal_tx.clone();
        let generation = session.generation;
        let exited = session.debugger.exited();
        tokio::spawn(async move {
            wait_for_exit(exited).await;
            let _ = tx.send(Internal::DebuggerExited { generation });
        });
    }

    fn on_started(&mut self, mut session: Session) {
        info!(
            "{} loaded {} (symbol map {})",
            session.id(),
            session.artifacts.debug_binary.display(),
            session.symbol_file().display()
        );
        self.watch_debugger(&session);
        self.emit_state(SessionState::TargetLoaded);

        let report = session.apply_breakpoints(
            &self.editor,
            self.locator.as_ref(),
            self.sources.as_ref(),
        );
        self.slot = Slot::Live(session);
        self.publish(report);
    }

    fn on_attached(&mut self, mut session: Session, deleted: Vec<(String, u32)>) {
        let sid = session.id();
        for (breakpoint_id, sequence) in deleted {
            self.emit(HelperEvent::BreakpointDeleted {
                session_id: sid.clone(),
                breakpoint_id,
                sequence,
            });
        }

        let report = session.apply_breakpoints(
            &self.editor,
            self.locator.as_ref(),
            self.sources.as_ref(),
        );
        session.state = SessionState::BreakpointSync;
        self.slot = Slot::Live(session);
        self.publish(report);
        self.emit_state(SessionState::BreakpointSync);
    }

    /// Report a sync pass. Anything beyond a single breakpoint ends the session.
    fn publish(&mut self, report: SyncReport) {
        let sid = self.session_id();
        for reg in report.registered {
            self.emit_log("debug", format!("#{} {}", reg.sequence, reg.command));
            self.emit(HelperEvent::BreakpointRegistered {
                session_id: sid.clone(),
                breakpoint_id: reg.editor_id,
                sequence: reg.sequence,
                command: reg.command,
            });
        }
        let mut fatal = None;
        for (breakpoint_id, err) in report.rejected {
            if !err.is_breakpoint_scoped() {
                fatal = Some(err);
                continue;
            }
            self.emit(protocol::breakpoint_rejected(&sid, &breakpoint_id, &err));
        }
        if let Some(err) = fatal {
            self.fail(err);
        }
    }

    fn breakpoints_changed(&mut self, added: Vec<EditorBreakpoint>, removed: Vec<String>) {
        self.editor.retain(|bp| !removed.contains(&bp.id));
        for bp in &added {
            match self.editor.iter_mut().find(|e| e.id == bp.id) {
                Some(existing) => *existing = bp.clone(),
                None => self.editor.push(bp.clone()),
            }
        }

        let sid = self.session_id();
        let state = self.slot.state();
        let Slot::Live(session) = &mut self.slot else {
            debug!("Breakpoint change recorded; session is {}", state);
            return;
        };

        // A re-sent id means the breakpoint moved: delete the old one first.
        let moved: Vec<String> = added
            .iter()
            .filter(|bp| session.breakpoints.sequence_of(&bp.id).is_some())
            .map(|bp| bp.id.clone())
            .collect();
        let mut deleted = Vec::new();
        let mut fatal = None;
        for id in removed.iter().chain(moved.iter()) {
            match session.remove_breakpoint(id) {
                Ok(Some(sequence)) => deleted.push(HelperEvent::BreakpointDeleted {
                    session_id: sid.clone(),
                    breakpoint_id: id.clone(),
                    sequence,
                }),
                Ok(None) => {}
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }
        }
        let report = match fatal {
            None => Some(session.apply_breakpoints(
                &added,
                self.locator.as_ref(),
                self.sources.as_ref(),
            )),
            Some(_) => None,
        };

        for event in deleted {
            self.emit(event);
        }
        if let Some(report) = report {
            self.publish(report);
        }
        if let Some(err) = fatal {
            self.fail(err);
        }
    }

    /// Instruction to run: explicit, else the function holding the given
    /// breakpoint, else the function holding the only breakpoint.
    fn instruction_for(
        &self,
        session: &Session,
        instruction: Option<String>,
        breakpoint_id: Option<String>,
    ) -> Result<String, DebugError> {
        if let Some(name) = instruction {
            return Ok(name);
        }
        let bp = match breakpoint_id {
            Some(id) => self.editor.iter().find(|bp| bp.id == id).ok_or_else(|| {
                DebugError::NoInstructionSelected(format!("unknown breakpoint `{}`", id))
            })?,
            None => match self.editor.as_slice() {
                [only] => only,
                [] => {
                    return Err(DebugError::NoInstructionSelected(
                        "no breakpoints set".to_string(),
                    ))
                }
                _ => {
                    return Err(DebugError::NoInstructionSelected(
                        "several breakpoints set; pick one".to_string(),
                    ))
                }
            },
        };
        session.function_at(bp, self.locator.as_ref(), self.sources.as_ref())
    }

    fn run_instruction(&mut self, instruction: Option<String>, breakpoint_id: Option<String>) {
        let session = match &self.slot {
            Slot::Live(session) => session,
            Slot::Busy { state, .. } => {
                return self.emit_error(&DebugError::SessionBusy {
                    state: state.to_string(),
                })
            }
            _ => return self.emit_error(&DebugError::NoLiveSession),
        };

        let input = match self
            .instruction_for(session, instruction, breakpoint_id)
            .map(|name| session.project.instruction_input(&name))
        {
            Ok(input) => input,
            Err(e) => return self.emit_error(&e),
        };
        if !input.is_file() {
            return self.emit_error(&DebugError::InstructionInputNotFound { path: input });
        }

        let Slot::Live(session) = std::mem::replace(&mut self.slot, Slot::Idle) else {
            return;
        };
        info!("Running {} against {}", session.id(), input.display());
        let state = session.state;
        let generation = self.generation;
        let toolchain = Arc::clone(&self.toolchain);
        let config = Arc::clone(&self.config);
        let tx = self.internal_tx.clone();
        let report = self.reporter(generation);
        let task = tokio::spawn(async move {
            let result = session::attach(session, toolchain.as_ref(), &config, input, report).await;
            let _ = tx.send(Internal::Attached { generation, result });
        });
        self.slot = Slot::Busy { state, task };
    }

    fn resume(&mut self) {
        match &self.slot {
            Slot::Live(session) => {
                if let Err(e) = session.resume() {
                    match e {
                        DebugError::ConsoleClosed(_) => self.fail(e),
                        _ => self.emit_error(&e),
                    }
                }
            }
            Slot::Busy { state, .. } => self.emit_error(&DebugError::SessionBusy {
                state: state.to_string(),
            }),
            Slot::Idle | Slot::AwaitingSelection { .. } | Slot::Failed => {
                match self.last_start.clone() {
                    Some(params) => self.start(params),
                    None => self.emit_error(&DebugError::NoLiveSession),
                }
            }
        }
    }
}
