//! Transient analysis: the Newton–Raphson time loop.

use std::time::Instant;

use voltra_core::{CacheState, Circuit};
use voltra_maths::{LuPair, Matrix};

use crate::error::{Error, Result};

/// Newton–Raphson iteration cap per time step. When the cap is reached
/// the last iterate is accepted and a warning is logged; the solution
/// matrix is never altered beyond the iterate already written.
pub const MAX_NEWTON_ITERATIONS: usize = 32;

/// Largest per-unknown change at which an iterate counts as converged.
pub const CONVERGENCE_THRESHOLD: f64 = 1e-12;

/// Transient analysis parameters from the `.transient(t0, tEnd, dt)`
/// directive.
#[derive(Debug, Clone, Copy)]
pub struct TransientParams {
    pub t_start: f64,
    pub t_stop: f64,
    pub dt: f64,
}

impl TransientParams {
    /// Number of solution columns, including the initial one.
    pub fn steps(&self) -> usize {
        ((self.t_stop - self.t_start) / self.dt) as usize
    }
}

/// Run the transient loop over columns `1..steps` of `solution`.
///
/// Per step: iterate Newton–Raphson on the non-linear stamp, factoring
/// and solving into a scratch column, copy the iterate into the solution
/// column *before* the convergence check (so the next stamp linearises
/// around the newest values), and stop on `maxDiff < 1e−12` or the cap.
/// Between iterations only the non-linear cache layer is discarded;
/// between steps the element states advance and the dynamic layer goes
/// too. After the first step the static layer is invalidated once, which
/// lets the pole–residue S-parameter blocks re-derive their constants
/// under the second-order discretisation.
pub fn run(
    circuit: &mut Circuit,
    solution: &mut Matrix<f64>,
    params: &TransientParams,
    lu: &mut LuPair<f64>,
    scratch: &mut Matrix<f64>,
) -> Result<()> {
    let size = circuit.size();
    let steps = params.steps();
    let dt = params.dt;
    let mut iterate = Matrix::zeros(size, 1);

    let started = Instant::now();
    for n in 1..steps {
        let mut converged = false;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let stamp = circuit.elements.generate_nonlinear_stamp(solution, n, dt);
            stamp.g.lu_pair_into(lu).map_err(|_| Error::SingularTransient {
                step: n,
                time: n as f64 * dt,
            })?;
            lu.left_divide(&stamp.s, scratch, &mut iterate)?;

            let mut max_diff = 0.0_f64;
            for k in 0..size {
                max_diff = max_diff.max((solution[(k, n)] - iterate[(k, 0)]).abs());
                solution[(k, n)] = iterate[(k, 0)];
            }

            if max_diff < CONVERGENCE_THRESHOLD {
                converged = true;
                break;
            }
            circuit.elements.demote(CacheState::DynamicFresh);
        }

        if !converged {
            log::warn!(
                "Newton-Raphson hit the {MAX_NEWTON_ITERATIONS}-iteration cap at step {n}; \
                 accepting the last iterate"
            );
        }

        circuit.elements.update_time_step(solution, n, dt);
        if n == 1 {
            circuit.elements.demote(CacheState::Stale);
        }
    }
    log::info!("transient loop ({} steps) in {:?}", steps, started.elapsed());

    Ok(())
}
