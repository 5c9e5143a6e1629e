use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use qasm_executor_server::api::{self, AppState};
use qasm_executor_server::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "qasm-executor-server")]
#[command(version)]
#[command(about = "Run OpenQASM jobs on simulated quantum computers")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "EXECUTOR_LISTEN", default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    /// Computer names (comma-separated)
    #[arg(
        long,
        env = "EXECUTOR_COMPUTERS",
        value_delimiter = ',',
        default_value = "GladOs,HAL-9000,TARS,Quanti"
    )]
    computers: Vec<String>,

    /// Upper bound for each computer's queue time, in seconds
    #[arg(long, env = "EXECUTOR_MAX_QUEUE_TIME", default_value = "60")]
    max_queue_time: u64,

    /// Seed for queue-time sampling (random if omitted)
    #[arg(long, env = "EXECUTOR_SEED")]
    seed: Option<u64>,

    /// Largest number of qubits a submitted program may declare
    #[arg(long, env = "EXECUTOR_MAX_QUBITS", default_value = "20")]
    max_qubits: usize,

    /// Most operations a submitted program may expand to
    #[arg(long, env = "EXECUTOR_MAX_INSTRUCTIONS", default_value = "100000")]
    max_instructions: usize,

    /// Largest shot count a single job may request
    #[arg(long, env = "EXECUTOR_MAX_SHOTS", default_value = "100000")]
    max_shots: u32,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let config = ServerConfig::new(self.listen)
            .with_computers(self.computers)
            .with_max_queue_time(Duration::from_secs(self.max_queue_time))
            .with_max_qubits(self.max_qubits)
            .with_max_instructions(self.max_instructions)
            .with_max_shots(self.max_shots);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    let registry = config.build_registry()?;
    for computer in registry.list() {
        tracing::info!(
            computer = %computer.name(),
            queue_time_secs = computer.queue_time().as_secs(),
            "Registered computer"
        );
    }

    let executor = config.build_executor();
    let state = AppState::new(registry, config.build_manager(Arc::new(executor)));

    let listener = TcpListener::bind(config.listen_addr).await?;
    api::serve(listener, state, shutdown_signal()).await?;

    tracing::info!("Executor API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received interrupt, shutting down");
}
