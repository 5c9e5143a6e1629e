//! Built-in OpenQASM 2.0 executor.
//!
//! Programs are parsed and flattened once per job. Each shot then replays
//! the flattened circuit on a fresh state vector, so mid-circuit
//! measurements, resets and classically conditioned gates behave like
//! single-shot hardware runs.

mod lexer;
mod parser;
mod simulator;

pub use parser::parse_program;
pub use simulator::Circuit;

use crate::executor::{ExecResult, Executor, Program};

/// Largest circuit the executor accepts by default.
pub const DEFAULT_MAX_QUBITS: usize = 20;

/// Default cap on gate expansion work for one program.
pub const DEFAULT_MAX_INSTRUCTIONS: usize = 100_000;

/// Bounds a program must fit in to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Total qubits across all quantum registers.
    pub max_qubits: usize,
    /// Gate applications and primitives produced while expanding the program.
    pub max_instructions: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_qubits: DEFAULT_MAX_QUBITS,
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
        }
    }
}

/// State-vector simulator for OpenQASM 2.0 programs.
#[derive(Debug, Clone, Default)]
pub struct QasmExecutor {
    limits: Limits,
}

impl QasmExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of qubits a program may declare.
    pub fn with_max_qubits(mut self, max_qubits: usize) -> Self {
        self.limits.max_qubits = max_qubits;
        self
    }

    /// Limit how many operations a program may expand to.
    pub fn with_max_instructions(mut self, max_instructions: usize) -> Self {
        self.limits.max_instructions = max_instructions;
        self
    }

    pub fn max_qubits(&self) -> usize {
        self.limits.max_qubits
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }
}

impl Executor for QasmExecutor {
    fn name(&self) -> &str {
        "qasm-statevector"
    }

    fn parse(&self, source: &str) -> ExecResult<Box<dyn Program>> {
        let circuit = parse_program(source, self.limits)?;
        Ok(Box::new(QasmProgram { circuit }))
    }
}

struct QasmProgram {
    circuit: Circuit,
}

impl Program for QasmProgram {
    fn run_once(&self) -> ExecResult<Vec<String>> {
        Ok(vec![self.circuit.run_shot(&mut rand::thread_rng())])
    }
}
