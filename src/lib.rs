//! QASM Executor Server: asynchronous circuit jobs on simulated quantum computers
//!
//! Clients submit an OpenQASM 2.0 program and a shot count to a named virtual
//! computer, get a job id back immediately, and poll that id until the job
//! is done or has failed.
//!
//! # Overview
//!
//! - [`ComputerRegistry`] / [`Computer`]: fixed targets, each with a fake
//!   queue time drawn once at startup
//! - [`JobManager`]: creates jobs and answers status queries
//! - [`JobRecord`] / [`JobStatus`]: write-once job state shared with pollers
//! - [`Executor`] / [`Program`]: the pluggable circuit execution seam
//! - [`QasmExecutor`]: built-in OpenQASM 2.0 state-vector simulator
//! - [`api::router`]: the axum HTTP surface
//!
//! # Lifecycle
//!
//! ```text
//!   POST /start_job/{computer} ──→ create_job() ──→ job_id
//!                                       │
//!                                       └─ spawn ─→ parse ─→ queue delay ─→ shots ─→ Done | Failed
//!   GET /job/{job_id} ──→ job_result() ──→ Running | Done | Failed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use qasm_executor_server::{JobManager, JobPayload, QasmExecutor, ServerConfig};
//!
//! # async fn demo() -> qasm_executor_server::ServerResult<()> {
//! let registry = ServerConfig::default().build_registry()?;
//! let jobs = JobManager::new(Arc::new(QasmExecutor::new()));
//!
//! let computer = registry.find("GladOs").expect("default computer");
//! let source = "OPENQASM 2.0; qreg q[1]; creg c[1]; U(pi/2,0,pi) q[0]; measure q -> c;";
//! let id = jobs.create_job(computer, JobPayload::new(source, 10))?;
//!
//! let status = jobs
//!     .wait(&id, Duration::from_secs(1), Duration::from_secs(120))
//!     .await?;
//! println!("{status}");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod computer;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod manager;
pub mod qasm;
pub mod runner;

pub use api::{AppState, StartJobResponse};
pub use computer::{Computer, ComputerRegistry};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use executor::{ExecError, ExecResult, Executor, Program, execute_shots};
pub use job::{JobId, JobRecord, JobStatus, JobStatusResponse, StatusKind};
pub use manager::{DEFAULT_MAX_SHOTS, JobManager};
pub use qasm::{Limits, QasmExecutor};
pub use runner::JobPayload;
