//! Dense state-vector simulation of a flattened circuit.
//!
//! Qubit `k` is bit `k` of the amplitude index. Every gate has already been
//! reduced to a single-qubit unitary or a CX by the parser, so the simulator
//! only knows four operations.
//!
//! Outcome strings follow the usual counts-key convention: classical
//! registers are printed last-declared first, separated by a space, and each
//! register is printed most significant bit first. Measuring `q[0] = 1` into
//! a two-bit register `c` gives `"01"`.

use std::f64::consts::PI;

use num_complex::Complex64;
use rand::Rng;

/// Row-major 2×2 unitary.
pub(crate) type Matrix2 = [Complex64; 4];

/// Matrix of the built-in `U(theta, phi, lambda)` gate.
pub(crate) fn u_matrix(theta: f64, phi: f64, lambda: f64) -> Matrix2 {
    let (sin, cos) = (theta / 2.0).sin_cos();
    [
        Complex64::new(cos, 0.0),
        -Complex64::from_polar(sin, lambda),
        Complex64::from_polar(sin, phi),
        Complex64::from_polar(cos, phi + lambda),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    Unitary { qubit: usize, matrix: Matrix2 },
    Cx { control: usize, target: usize },
    Measure { qubit: usize, clbit: usize },
    Reset { qubit: usize },
}

/// Gate guard from `if (creg == value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Condition {
    pub creg: usize,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Instruction {
    pub op: Op,
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClassicalRegister {
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

/// A circuit ready to simulate.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    pub(crate) num_qubits: usize,
    pub(crate) num_clbits: usize,
    pub(crate) cregs: Vec<ClassicalRegister>,
    pub(crate) instructions: Vec<Instruction>,
}

impl Circuit {
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn num_clbits(&self) -> usize {
        self.num_clbits
    }

    /// Number of flattened instructions (after gate expansion).
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Simulate one shot from `|0…0⟩` and render the classical bits.
    pub fn run_shot<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut state = StateVector::new(self.num_qubits);
        let mut clbits = vec![false; self.num_clbits];

        for instruction in &self.instructions {
            if let Some(cond) = instruction.condition {
                if self.register_value(&clbits, cond.creg) != cond.value {
                    continue;
                }
            }
            match instruction.op {
                Op::Unitary { qubit, ref matrix } => state.apply_unitary(qubit, matrix),
                Op::Cx { control, target } => state.apply_cx(control, target),
                Op::Measure { qubit, clbit } => clbits[clbit] = state.measure(qubit, rng),
                Op::Reset { qubit } => state.reset(qubit, rng),
            }
        }

        self.render(&clbits)
    }

    fn register_value(&self, clbits: &[bool], creg: usize) -> u64 {
        let reg = &self.cregs[creg];
        clbits[reg.offset..reg.offset + reg.size]
            .iter()
            .enumerate()
            .filter(|&(_, &bit)| bit)
            .fold(0u64, |acc, (i, _)| acc | (1u64 << i))
    }

    fn render(&self, clbits: &[bool]) -> String {
        self.cregs
            .iter()
            .rev()
            .map(|reg| {
                clbits[reg.offset..reg.offset + reg.size]
                    .iter()
                    .rev()
                    .map(|&bit| if bit { '1' } else { '0' })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub(crate) struct StateVector {
    amps: Vec<Complex64>,
}

impl StateVector {
    pub fn new(num_qubits: usize) -> Self {
        let mut amps = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
        amps[0] = Complex64::new(1.0, 0.0);
        Self { amps }
    }

    pub fn apply_unitary(&mut self, qubit: usize, m: &Matrix2) {
        let bit = 1 << qubit;
        for i in 0..self.amps.len() {
            if i & bit == 0 {
                let j = i | bit;
                let (a0, a1) = (self.amps[i], self.amps[j]);
                self.amps[i] = m[0] * a0 + m[1] * a1;
                self.amps[j] = m[2] * a0 + m[3] * a1;
            }
        }
    }

    pub fn apply_cx(&mut self, control: usize, target: usize) {
        let (cbit, tbit) = (1 << control, 1 << target);
        for i in 0..self.amps.len() {
            if i & cbit != 0 && i & tbit == 0 {
                self.amps.swap(i, i | tbit);
            }
        }
    }

    /// Probability of reading `1` on `qubit`.
    pub fn probability_one(&self, qubit: usize) -> f64 {
        let bit = 1 << qubit;
        self.amps
            .iter()
            .enumerate()
            .filter(|(i, _)| i & bit != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum()
    }

    /// Projective measurement; collapses the state.
    pub fn measure<R: Rng + ?Sized>(&mut self, qubit: usize, rng: &mut R) -> bool {
        let p1 = self.probability_one(qubit);
        let one = if p1 < EPSILON {
            false
        } else if p1 > 1.0 - EPSILON {
            true
        } else {
            rng.gen_bool(p1)
        };

        let bit = 1 << qubit;
        let norm = (if one { p1 } else { 1.0 - p1 }).sqrt();
        for (i, amp) in self.amps.iter_mut().enumerate() {
            if (i & bit != 0) == one {
                *amp /= norm;
            } else {
                *amp = Complex64::new(0.0, 0.0);
            }
        }
        one
    }

    pub fn reset<R: Rng + ?Sized>(&mut self, qubit: usize, rng: &mut R) {
        if self.measure(qubit, rng) {
            self.apply_unitary(qubit, &u_matrix(PI, 0.0, PI));
        }
    }
}
