// Crate root: declare modules and control visibility
pub mod config;
pub mod console;
pub mod debug;
pub mod error;
pub mod helper_requests;
pub mod locator;
pub mod orchestrator;
pub mod protocol;
pub mod readiness;
pub mod request_handler;
pub mod resolver;
pub mod run;
pub mod session;
pub mod symbol_map;
pub mod sync;
pub mod toolchain;
pub mod transport;
pub mod utils;
pub mod workspace;

// Re-export commonly used API from the library for binaries/tests
pub use error::DebugError;
pub use orchestrator::Orchestrator;
pub use toolchain::Toolchain;
