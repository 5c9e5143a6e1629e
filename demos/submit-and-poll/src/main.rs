//! Submit a Bell-pair circuit in-process and poll until it finishes.
//!
//! Also shows how a custom [`Executor`] plugs into the job manager: the
//! `coin` executor ignores its program text and flips a fair coin per shot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use qasm_executor_server::{
    ExecResult, Executor, JobManager, JobPayload, Program, QasmExecutor, ServerConfig,
};

const BELL: &str = r#"
OPENQASM 2.0;
include "qelib1.inc";
qreg q[2];
creg c[2];
h q[0];
cx q[0],q[1];
measure q -> c;
"#;

/// Deterministic "coin" that alternates heads and tails.
struct CoinProgram {
    flips: AtomicU64,
}

impl Program for CoinProgram {
    fn run_once(&self) -> ExecResult<Vec<String>> {
        let n = self.flips.fetch_add(1, Ordering::Relaxed);
        Ok(vec![if n % 2 == 0 { "H" } else { "T" }.to_string()])
    }
}

struct CoinExecutor;

impl Executor for CoinExecutor {
    fn name(&self) -> &str {
        "coin"
    }

    fn parse(&self, _source: &str) -> ExecResult<Box<dyn Program>> {
        Ok(Box::new(CoinProgram {
            flips: AtomicU64::new(0),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = ServerConfig::default()
        .with_max_queue_time(Duration::from_secs(3))
        .with_seed(7)
        .build_registry()?;

    println!("Computers:");
    for computer in registry.list() {
        println!("  {:<10} queue {}s", computer.name(), computer.queue_time().as_secs());
    }

    let glados = registry.find("GladOs").ok_or("GladOs is not registered")?;

    let jobs = JobManager::new(Arc::new(QasmExecutor::new()));
    let id = jobs.create_job(glados.clone(), JobPayload::new(BELL, 50))?;
    println!("\nSubmitted Bell circuit to {} as job {id}", glados.name());

    let status = jobs
        .wait(&id, Duration::from_millis(250), Duration::from_secs(30))
        .await?;
    println!("Job {id}: {status}");
    if let Some(results) = status.results() {
        let pairs = results.iter().filter(|r| *r == "00" || *r == "11").count();
        println!("  {pairs}/{} shots were correlated", results.len());
    }

    let coins = JobManager::new(Arc::new(CoinExecutor));
    let id = coins.create_job(glados, JobPayload::new("ignored", 6))?;
    let status = coins
        .wait(&id, Duration::from_millis(250), Duration::from_secs(30))
        .await?;
    println!("\nCoin job {id}: {:?}", status.results().unwrap_or_default());

    Ok(())
}
