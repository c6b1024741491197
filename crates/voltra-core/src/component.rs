//! The polymorphic component contract.

use voltra_maths::Matrix;

use crate::node::NodeId;
use crate::stamp::Stamp;

/// Voltage across a node pair read from column `col` of the solution
/// matrix. Ground terminals contribute zero.
pub fn branch_voltage(solution: &Matrix<f64>, col: usize, pos: NodeId, neg: NodeId) -> f64 {
    let mut v = 0.0;
    if let Some(i) = pos.matrix_index() {
        v += solution[(i, col)];
    }
    if let Some(j) = neg.matrix_index() {
        v -= solution[(j, col)];
    }
    v
}

/// A circuit element that can contribute to the MNA system.
///
/// Every method is defaulted to a no-op so an element implements exactly
/// the layers it participates in:
///
/// - [`add_static_stamp`](Component::add_static_stamp): contributions
///   independent of time and solution (resistors, DC sources, KVL rows).
/// - [`add_dynamic_stamp`](Component::add_dynamic_stamp): contributions
///   depending on the time step and *previous* solution columns (companion
///   models, time-varying sources, S-parameter convolutions).
/// - [`add_nonlinear_stamp`](Component::add_nonlinear_stamp):
///   contributions linearised around the *current* Newton–Raphson iterate
///   (column `step` of the solution matrix).
/// - [`add_dc_stamp`](Component::add_dc_stamp): the DC-analysis variant:
///   capacitors open, inductors short through a DC-only current unknown,
///   non-linear elements linearised around column 0.
///
/// State updates run once per accepted time step
/// ([`update_state`](Component::update_state)) or once after the DC loop
/// ([`update_dc_state`](Component::update_dc_state)); both receive the
/// `size_g_a` of the stamp they were solved against so they can reach
/// branch-current entries of the solution.
pub trait Component: std::fmt::Debug + Send + Sync {
    /// The designator from the netlist, e.g. `R1`.
    fn designator(&self) -> &str;

    /// The nodes this element touches, for the node→element map.
    fn nodes(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn add_static_stamp(&self, _stamp: &mut Stamp) {}

    fn add_dynamic_stamp(
        &self,
        _stamp: &mut Stamp,
        _solution: &Matrix<f64>,
        _step: usize,
        _dt: f64,
    ) {
    }

    fn add_nonlinear_stamp(
        &self,
        _stamp: &mut Stamp,
        _solution: &Matrix<f64>,
        _step: usize,
        _dt: f64,
    ) {
    }

    fn add_dc_stamp(&self, _stamp: &mut Stamp, _solution: &Matrix<f64>, _num_currents: usize) {}

    fn update_state(&mut self, _solution: &Matrix<f64>, _step: usize, _dt: f64, _size_g_a: usize) {
    }

    fn update_dc_state(&mut self, _solution: &Matrix<f64>, _size_g_a: usize, _num_currents: usize) {
    }

    /// One-off recomputation of timestep-dependent constants.
    fn set_timestep(&mut self, _dt: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_voltage_reads_column() {
        let mut sol = Matrix::zeros(3, 2);
        sol[(0, 1)] = 5.0;
        sol[(1, 1)] = 2.0;

        let v = branch_voltage(&sol, 1, NodeId::new(1), NodeId::new(2));
        assert_eq!(v, 3.0);

        // ground terminal contributes nothing
        let v = branch_voltage(&sol, 1, NodeId::new(1), NodeId::GROUND);
        assert_eq!(v, 5.0);
        let v = branch_voltage(&sol, 0, NodeId::new(1), NodeId::GROUND);
        assert_eq!(v, 0.0);
    }
}
