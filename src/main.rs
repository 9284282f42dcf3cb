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

use anyhow::Result;
use clap::{Parser, Subcommand};

use sbf_debug_helper::config::ServeArgs;
use sbf_debug_helper::debug::init_logging;
use sbf_debug_helper::run::{self, ResolveArgs};

#[derive(Parser, Debug)]
#[command(name = "sbf-debug-helper", version, about = "Source-level debugging for Solana SBF programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the session orchestrator over stdio
    Serve(ServeArgs),
    /// Resolve one source line to a breakpoint command
    Resolve(ResolveArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => {
            let _logger = init_logging(args.debug, args.log_dir.as_deref())?;
            run::serve(args).await
        }
        Commands::Resolve(args) => {
            let _logger = init_logging(false, None)?;
            run::resolve(args).await
        }
    }
}
