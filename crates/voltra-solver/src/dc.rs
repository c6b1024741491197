//! DC operating-point analysis.

use std::time::Instant;

use voltra_core::Circuit;
use voltra_maths::{LuPair, Matrix};

use crate::error::{Error, Result};

/// Fixed Newton iteration count for the DC loop.
pub const DC_ITERATIONS: usize = 35;

/// Compute the DC operating point and seed the transient state.
///
/// The DC system is larger than the transient one: every inductor becomes
/// a zero-volt branch with its own current unknown so its bias current is
/// part of the solution. Each iteration rebuilds the DC stamp around the
/// current candidate, factors and replaces the candidate wholesale; the
/// iteration count is fixed rather than tolerance-driven.
///
/// On completion the node-voltage/current head of the DC vector is copied
/// into column 0 of `solution` and every element ingests its DC state.
pub fn solve_operating_point(circuit: &mut Circuit, solution: &mut Matrix<f64>) -> Result<()> {
    let num_currents = circuit.num_currents();
    let transient_size = circuit.size();
    let dc_size = transient_size + circuit.num_dc_currents();

    let mut dc_solution = Matrix::zeros(dc_size, 1);
    let mut scratch = Matrix::zeros(dc_size, 1);
    let mut lu = LuPair::new(dc_size);

    let started = Instant::now();
    for iteration in 0..DC_ITERATIONS {
        let stamp = circuit.elements.generate_dc_stamp(&dc_solution, num_currents);
        stamp
            .g
            .lu_pair_into(&mut lu)
            .map_err(|_| Error::SingularDc { iteration })?;
        lu.left_divide(&stamp.s, &mut scratch, &mut dc_solution)?;
    }

    for k in 0..transient_size {
        solution[(k, 0)] = dc_solution[(k, 0)];
    }
    circuit.elements.update_dc_state(&dc_solution, num_currents);

    log::info!("DC operating point in {:?}", started.elapsed());
    Ok(())
}
