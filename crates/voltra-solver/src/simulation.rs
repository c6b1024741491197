//! The simulation facade: owns the solution matrix and solver workspaces.

use voltra_core::{Circuit, NodeId};
use voltra_maths::{LuPair, Matrix};

use crate::dc;
use crate::error::Result;
use crate::transient::{self, TransientParams};

/// A complete simulation run over one circuit.
///
/// Owns the `(size × steps)` solution matrix, the LU workspace and the
/// substitution scratch column; all three are allocated once here and
/// reused for every factorisation of the run. Column `n` of the solution
/// holds the converged unknowns of time step `n`; column 0 holds the DC
/// operating point when DC analysis is enabled, zeros otherwise.
#[derive(Debug)]
pub struct Simulation {
    circuit: Circuit,
    params: TransientParams,
    perform_dc: bool,
    solution: Matrix<f64>,
    lu: LuPair<f64>,
    scratch: Matrix<f64>,
}

impl Simulation {
    /// Finalise the circuit's stamps, size the workspaces and push the
    /// timestep into every element.
    pub fn new(mut circuit: Circuit, params: TransientParams, perform_dc: bool) -> Self {
        circuit.finalise();
        circuit.elements.set_timestep(params.dt);

        let size = circuit.size();
        let steps = params.steps();
        Self {
            circuit,
            params,
            perform_dc,
            solution: Matrix::zeros(size, steps),
            lu: LuPair::new(size),
            scratch: Matrix::zeros(size, 1),
        }
    }

    /// Run DC analysis (unless disabled) followed by the transient loop.
    pub fn run(&mut self) -> Result<()> {
        if self.perform_dc {
            dc::solve_operating_point(&mut self.circuit, &mut self.solution)?;
        }
        transient::run(
            &mut self.circuit,
            &mut self.solution,
            &self.params,
            &mut self.lu,
            &mut self.scratch,
        )
    }

    pub fn params(&self) -> &TransientParams {
        &self.params
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// The raw solution matrix: one column per time step.
    pub fn solution(&self) -> &Matrix<f64> {
        &self.solution
    }

    pub fn steps(&self) -> usize {
        self.solution.cols()
    }

    /// Voltage of `node` at time step `step` (ground reads zero).
    pub fn voltage(&self, node: NodeId, step: usize) -> f64 {
        node.matrix_index()
            .map_or(0.0, |i| self.solution[(i, step)])
    }

    /// Branch current `k` (1-based) at time step `step`.
    pub fn current(&self, k: usize, step: usize) -> f64 {
        self.solution[(self.circuit.num_nodes() + k - 1, step)]
    }

    /// The full waveform of one node.
    pub fn voltage_waveform(&self, node: NodeId) -> Vec<f64> {
        (0..self.steps()).map(|n| self.voltage(node, n)).collect()
    }
}
