//! Background execution of a single job.
//!
//! ```text
//!   parse ──✗──→ Failed("QASM parse error: …")
//!     │
//!   queue delay (computer.queue_time)
//!     │
//!   shots on blocking pool ──✗──→ Failed("execution error: …")
//!     │
//!   Done(results)
//! ```
//!
//! The runner is the only writer of its job's record and publishes the
//! terminal status exactly once. Every failure path, including a panicking
//! executor, ends in `Failed`; a job is never abandoned in `Running`.

use std::sync::Arc;

use serde::Deserialize;
use tokio::task;

use crate::computer::Computer;
use crate::executor::{Executor, execute_shots};
use crate::job::{JobId, JobRecord, JobStatus};

/// Work submitted for one job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobPayload {
    /// Program text (OpenQASM 2.0 for the built-in executor).
    pub qasm: String,
    /// Number of independent repetitions.
    pub num_shots: u32,
}

impl JobPayload {
    pub fn new(qasm: impl Into<String>, num_shots: u32) -> Self {
        Self {
            qasm: qasm.into(),
            num_shots,
        }
    }
}

/// Run a job to completion and publish its terminal status on `record`.
pub async fn run_job(
    job_id: JobId,
    computer: Arc<Computer>,
    payload: JobPayload,
    record: Arc<JobRecord>,
    executor: Arc<dyn Executor>,
) {
    let status = execute(&job_id, &computer, payload, executor).await;
    match &status {
        JobStatus::Done { results } => {
            tracing::info!(
                job_id = %job_id,
                computer = %computer.name(),
                shots = results.len(),
                "Job done"
            );
        }
        JobStatus::Failed { error } => {
            tracing::info!(
                job_id = %job_id,
                computer = %computer.name(),
                error = %error,
                "Job failed"
            );
        }
        JobStatus::Running => {}
    }
    record.finish(status);
}

async fn execute(
    job_id: &JobId,
    computer: &Computer,
    payload: JobPayload,
    executor: Arc<dyn Executor>,
) -> JobStatus {
    let JobPayload { qasm, num_shots } = payload;

    let parsed = task::spawn_blocking(move || executor.parse(&qasm)).await;
    let program = match parsed {
        Ok(Ok(program)) => program,
        Ok(Err(e)) => {
            tracing::warn!(job_id = %job_id, error = %e, "Rejected program");
            return JobStatus::Failed {
                error: format!("QASM parse error: {e}"),
            };
        }
        Err(e) => return execution_fault(job_id, &e.to_string()),
    };
    tracing::debug!(
        job_id = %job_id,
        queue_time = ?computer.queue_time(),
        "Program parsed, queueing"
    );

    tokio::time::sleep(computer.queue_time()).await;

    match task::spawn_blocking(move || execute_shots(program.as_ref(), num_shots)).await {
        Ok(Ok(results)) => JobStatus::Done { results },
        Ok(Err(e)) => execution_fault(job_id, &e.to_string()),
        Err(e) => execution_fault(job_id, &e.to_string()),
    }
}

fn execution_fault(job_id: &JobId, detail: &str) -> JobStatus {
    tracing::error!(job_id = %job_id, error = %detail, "Execution fault");
    JobStatus::Failed {
        error: format!("execution error: {detail}"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::executor::{ExecError, ExecResult, Program};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Executor whose programs are a single keyword:
    /// `count` yields the shot index, `fail` errors on the second shot,
    /// `panic` panics, `split` yields two outcomes. Anything else is a parse error.
    pub(crate) struct ScriptedExecutor;

    struct Scripted {
        kind: String,
        shots: AtomicUsize,
    }

    impl Program for Scripted {
        fn run_once(&self) -> ExecResult<Vec<String>> {
            let n = self.shots.fetch_add(1, Ordering::Relaxed);
            match self.kind.as_str() {
                "count" => Ok(vec![n.to_string()]),
                "fail" if n >= 1 => Err(ExecError::Execution("detector offline".into())),
                "fail" => Ok(vec!["0".into()]),
                "split" => Ok(vec!["0".into(), "1".into()]),
                _ => panic!("simulator crashed"),
            }
        }
    }

    impl Executor for ScriptedExecutor {
        fn name(&self) -> &str {
            "scripted"
        }

        fn parse(&self, source: &str) -> ExecResult<Box<dyn Program>> {
            match source.trim() {
                kind @ ("count" | "fail" | "panic" | "split") => Ok(Box::new(Scripted {
                    kind: kind.to_string(),
                    shots: AtomicUsize::new(0),
                })),
                "parse-panic" => panic!("parser crashed"),
                other => Err(ExecError::parse(1, format!("unknown program '{other}'"))),
            }
        }
    }

    async fn run(program: &str, shots: u32, queue_time: Duration) -> JobStatus {
        let record = Arc::new(JobRecord::new("TARS", shots));
        run_job(
            JobId::generate(),
            Arc::new(Computer::new("TARS", queue_time)),
            JobPayload::new(program, shots),
            Arc::clone(&record),
            Arc::new(ScriptedExecutor),
        )
        .await;
        record.status()
    }

    #[tokio::test]
    async fn test_results_in_shot_order() {
        let status = run("count", 5, Duration::ZERO).await;
        assert_eq!(
            status,
            JobStatus::Done {
                results: vec!["0", "1", "2", "3", "4"].into_iter().map(String::from).collect()
            }
        );
    }

    #[tokio::test]
    async fn test_zero_shots_done_empty() {
        let status = run("count", 0, Duration::ZERO).await;
        assert_eq!(status, JobStatus::Done { results: vec![] });
    }

    #[tokio::test]
    async fn test_parse_error_fails_job() {
        let status = run("garbage", 10, Duration::ZERO).await;
        let error = status.error().unwrap();
        assert!(error.starts_with("QASM parse error: "));
        assert!(error.contains("unknown program 'garbage'"));
        assert!(status.results().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_error_skips_queue_delay() {
        let start = tokio::time::Instant::now();
        let status = run("garbage", 10, Duration::from_secs(60)).await;
        assert!(!status.is_success());
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_execution_error_fails_without_partial_results() {
        let status = run("fail", 3, Duration::ZERO).await;
        assert_eq!(
            status,
            JobStatus::Failed {
                error: "execution error: detector offline".into()
            }
        );
    }

    #[tokio::test]
    async fn test_multiple_outcomes_fail_job() {
        let status = run("split", 1, Duration::ZERO).await;
        assert!(status.error().unwrap().contains("exactly one outcome"));
    }

    #[tokio::test]
    async fn test_panicking_executor_fails_job() {
        let status = run("panic", 1, Duration::ZERO).await;
        assert!(status.error().unwrap().starts_with("execution error: "));

        let status = run("parse-panic", 1, Duration::ZERO).await;
        assert!(status.error().unwrap().starts_with("execution error: "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_delay_applies() {
        let record = Arc::new(JobRecord::new("HAL-9000", 1));
        let handle = tokio::spawn(run_job(
            JobId::generate(),
            Arc::new(Computer::new("HAL-9000", Duration::from_secs(30))),
            JobPayload::new("count", 1),
            Arc::clone(&record),
            Arc::new(ScriptedExecutor),
        ));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(record.status(), JobStatus::Running);

        handle.await.unwrap();
        assert!(record.status().is_success());
    }
}
