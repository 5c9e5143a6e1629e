//! Server configuration: listen address, computers, and per-job limits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::computer::{ComputerRegistry, DEFAULT_COMPUTERS, DEFAULT_MAX_QUEUE_TIME};
use crate::error::ServerResult;
use crate::executor::Executor;
use crate::manager::{DEFAULT_MAX_SHOTS, JobManager};
use crate::qasm::{DEFAULT_MAX_INSTRUCTIONS, DEFAULT_MAX_QUBITS, QasmExecutor};

/// Runtime configuration for the executor server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Names of the virtual computers to register.
    pub computers: Vec<String>,
    /// Upper bound for each computer's randomized queue time.
    pub max_queue_time: Duration,
    /// Seed for queue-time sampling. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Largest circuit the built-in executor accepts.
    pub max_qubits: usize,
    /// Most operations a program may expand to.
    pub max_instructions: usize,
    /// Largest `num_shots` a job may request.
    pub max_shots: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            computers: DEFAULT_COMPUTERS.iter().map(|s| s.to_string()).collect(),
            max_queue_time: DEFAULT_MAX_QUEUE_TIME,
            seed: None,
            max_qubits: DEFAULT_MAX_QUBITS,
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
            max_shots: DEFAULT_MAX_SHOTS,
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_computers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.computers = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_queue_time(mut self, max_queue_time: Duration) -> Self {
        self.max_queue_time = max_queue_time;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_qubits(mut self, max_qubits: usize) -> Self {
        self.max_qubits = max_qubits;
        self
    }

    pub fn with_max_instructions(mut self, max_instructions: usize) -> Self {
        self.max_instructions = max_instructions;
        self
    }

    pub fn with_max_shots(mut self, max_shots: u32) -> Self {
        self.max_shots = max_shots;
        self
    }

    /// Build the built-in executor with this configuration's limits.
    pub fn build_executor(&self) -> QasmExecutor {
        QasmExecutor::new()
            .with_max_qubits(self.max_qubits)
            .with_max_instructions(self.max_instructions)
    }

    /// Build a job manager around `executor` with this configuration's shot cap.
    pub fn build_manager(&self, executor: Arc<dyn Executor>) -> JobManager {
        JobManager::new(executor).with_max_shots(self.max_shots)
    }

    /// Draw the queue times and build the computer registry.
    pub fn build_registry(&self) -> ServerResult<ComputerRegistry> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        ComputerRegistry::randomized(self.computers.iter().cloned(), self.max_queue_time, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;

    #[test]
    fn server_config_default() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:8000");
        assert_eq!(cfg.computers, ["GladOs", "HAL-9000", "TARS", "Quanti"]);
        assert_eq!(cfg.max_queue_time, Duration::from_secs(60));
        assert!(cfg.seed.is_none());
        assert_eq!(cfg.max_qubits, 20);
        assert_eq!(cfg.max_instructions, 100_000);
        assert_eq!(cfg.max_shots, 100_000);
    }

    #[test]
    fn server_config_builders() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let cfg = ServerConfig::new(addr)
            .with_computers(["A", "B"])
            .with_max_queue_time(Duration::from_secs(5))
            .with_seed(42)
            .with_max_qubits(8)
            .with_max_instructions(500)
            .with_max_shots(64);
        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.computers, ["A", "B"]);
        assert_eq!(cfg.max_queue_time, Duration::from_secs(5));
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.max_qubits, 8);
        assert_eq!(cfg.max_instructions, 500);
        assert_eq!(cfg.max_shots, 64);
    }

    #[test]
    fn build_executor_and_manager_apply_limits() {
        let cfg = ServerConfig::default()
            .with_max_qubits(3)
            .with_max_instructions(7)
            .with_max_shots(9);
        let executor = cfg.build_executor();
        assert_eq!(executor.max_qubits(), 3);
        assert_eq!(executor.limits().max_instructions, 7);

        let jobs = cfg.build_manager(Arc::new(executor));
        assert_eq!(jobs.max_shots(), 9);
    }

    #[test]
    fn build_registry_seeded() {
        let cfg = ServerConfig::default().with_seed(9);
        let a = cfg.build_registry().unwrap();
        let b = cfg.build_registry().unwrap();
        for (x, y) in a.list().iter().zip(b.list()) {
            assert_eq!(x.queue_time(), y.queue_time());
        }
    }

    #[test]
    fn build_registry_rejects_duplicates() {
        let cfg = ServerConfig::default().with_computers(["TARS", "TARS"]);
        assert!(matches!(
            cfg.build_registry(),
            Err(ServerError::Configuration(_))
        ));
    }
}
