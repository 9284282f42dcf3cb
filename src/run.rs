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

//! Entry points for the `serve` and `resolve` subcommands.

use std::path::PathBuf;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use log::{error, info};
use tokio::sync::mpsc;

use crate::config::ServeArgs;
use crate::helper_requests::HelperEvent;
use crate::locator::{BraceDepthLocator, FunctionLocator};
use crate::orchestrator::Orchestrator;
use crate::protocol::wrap_event_as_notification;
use crate::request_handler::dispatch_request;
use crate::resolver::{self, NamingPolicy};
use crate::symbol_map::SymbolMapBuilder;
use crate::toolchain::SbfToolchain;
use crate::transport::{write_json_locked, FramedReader};

/// Serve editor requests on stdin until it closes.
pub async fn serve(args: ServeArgs) -> Result<()> {
    let config = args.to_config()?;
    info!(
        "Serving on stdio (debugger {}, remote {})",
        config.debugger.display(),
        config.remote_endpoint
    );

    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<HelperEvent>();

    // Blocking reads stay off the runtime.
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let mut reader = FramedReader::stdin();
            loop {
                match reader.read_message() {
                    Ok(Some(msg)) => {
                        if !dispatch_request(&msg, &req_tx) {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        error!("Error reading message: {}", e);
                        break;
                    }
                }
            }
        })
        .context("failed to start stdin reader")?;

    let writer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Err(e) = write_json_locked(&wrap_event_as_notification(&event)) {
                error!("Failed to write event: {}", e);
            }
        }
    });

    let toolchain = SbfToolchain::new(&config);
    Orchestrator::new(toolchain, config, event_tx)
        .run(req_rx)
        .await;
    writer.await.context("event writer panicked")?;
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// Anchor programs: match `global::<fn>` and set by address
    Mangled,
    /// Native programs: set by function name
    Raw,
}

/// Options for the `resolve` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Source file holding the breakpoint
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// 1-based line number
    #[arg(short = 'l', long = "line")]
    pub line: u32,

    /// Debug binary to disassemble
    #[arg(short = 'b', long = "binary")]
    pub binary: PathBuf,

    #[arg(long = "policy", value_enum, default_value_t = PolicyArg::Mangled)]
    pub policy: PolicyArg,

    /// Package whose handlers win when several programs define the same one
    #[arg(long = "package")]
    pub package: Option<String>,

    /// Disassembler used to build the symbol map
    #[arg(long = "objdump", default_value = "llvm-objdump")]
    pub objdump: PathBuf,
}

/// Print the `breakpoint set` command for a source position.
pub async fn resolve(args: ResolveArgs) -> Result<()> {
    let source = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let function = BraceDepthLocator::new()
        .locate(&source, args.line)
        .ok_or_else(|| {
            anyhow!(
                "line {} of {} is not inside a function",
                args.line,
                args.file.display()
            )
        })?;

    let symbols = SymbolMapBuilder::new(args.objdump).build(&args.binary).await?;
    let policy = match args.policy {
        PolicyArg::Mangled => match &args.package {
            Some(package) => NamingPolicy::anchor_for(package),
            None => NamingPolicy::anchor(),
        },
        PolicyArg::Raw => NamingPolicy::Raw,
    };
    let target = resolver::resolve(&symbols, &function, &policy)?;
    info!("{}:{} is in `{}`", args.file.display(), args.line, function);
    println!("{}", target.set_command());
    Ok(())
}
