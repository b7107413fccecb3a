//! # pybox-engine
//!
//! Execution-and-capture engine for isolated Python invocations.
//!
//! This crate takes a block of untrusted Python source text, runs it to
//! completion or failure inside a fresh worker process, and returns the
//! textual output (with a diagnostic appended on failure) as a single
//! string. No fault ever crosses the gateway boundary as an error.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   pybox-engine (host)                    │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │    Gateway      │────▶│  Semaphore (bounded      │   │
//! │  │   - execute()   │     │  concurrent invocations) │   │
//! │  │   - run()       │     └──────────────────────────┘   │
//! │  └─────────────────┘                                    │
//! │           │                                              │
//! │           ▼                                              │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │ ExecutionContext│────▶│  scratch dir + scrubbed  │   │
//! │  │  (per call)     │     │  environment             │   │
//! │  └─────────────────┘     └──────────────────────────┘   │
//! │           │                                              │
//! │           ▼                                              │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │     Runner      │────▶│  CaptureChannel          │   │
//! │  │  - spawn worker │     │  (ordered stdout sink)   │   │
//! │  │  - enforce      │     └──────────────────────────┘   │
//! │  │    deadline     │                                    │
//! │  └─────────────────┘                                    │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//!                           │ stdin: source   stdout: output
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │           worker process (python3 -I -u -X utf8)         │
//! │       driver: compile → exec in a fresh namespace        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use pybox_engine::{EngineConfig, Gateway};
//!
//! # async fn example() -> pybox_engine::Result<()> {
//! let config = EngineConfig::builder()
//!     .timeout(std::time::Duration::from_secs(10))
//!     .build()?;
//!
//! let gateway = Gateway::new(config);
//!
//! // Always a string, success or failure.
//! let result = gateway.execute("print('Hello from pybox!')").await;
//! assert!(result.contains("Hello from pybox!"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - **Isolation**: every invocation runs in its own worker process with a
//!   fresh namespace, private scratch directory, and scrubbed environment.
//!   Concurrent invocations never observe each other's bindings or output.
//! - **Ordered capture**: output is recorded in write order, including any
//!   output produced before an unhandled fault.
//! - **No escaping faults**: parse errors, runtime exceptions, and resource
//!   violations are normalized into diagnostic text appended to whatever
//!   output was captured.
//! - **Hard deadlines**: a worker that outlives its deadline is killed, not
//!   asked to stop.

mod capture;
mod config;
mod context;
mod error;
mod fault;
mod gateway;
mod runner;

pub use capture::CaptureChannel;
pub use config::{EngineConfig, EngineConfigBuilder};
pub use context::{ExecutionContext, InvocationId};
pub use error::{EngineError, Result};
pub use fault::{Fault, FaultKind};
pub use gateway::{Execution, Gateway, GatewayStats, StatsSnapshot};
