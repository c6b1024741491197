//! Passive elements: resistor, capacitor, inductor.

use voltra_core::{branch_voltage, Component, NodeId, Stamp};
use voltra_maths::Matrix;

/// An ideal resistor.
///
/// A group-I resistor stamps a conductance between its nodes. A group-II
/// resistor (requested with a trailing flag in the netlist) instead gets
/// its own branch-current unknown: `±1` couplings plus `−R` on the branch
/// diagonal, which makes the branch current directly observable in the
/// output table.
#[derive(Debug, Clone)]
pub struct Resistor {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    value: f64,
    /// 1-based branch-current index; only meaningful when `group1` is false.
    current_index: usize,
    group1: bool,
}

impl Resistor {
    pub fn new(designator: impl Into<String>, n1: NodeId, n2: NodeId, value: f64) -> Self {
        Self {
            designator: designator.into(),
            n1,
            n2,
            value,
            current_index: 0,
            group1: true,
        }
    }

    /// Group-II variant with an explicit branch-current unknown.
    pub fn group2(
        designator: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        value: f64,
        current_index: usize,
    ) -> Self {
        Self {
            designator: designator.into(),
            n1,
            n2,
            value,
            current_index,
            group1: false,
        }
    }

    pub fn conductance(&self) -> f64 {
        1.0 / self.value
    }
}

impl Component for Resistor {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn add_static_stamp(&self, stamp: &mut Stamp) {
        if self.group1 {
            stamp.stamp_conductance(
                self.n1.matrix_index(),
                self.n2.matrix_index(),
                self.conductance(),
            );
        } else {
            let row = stamp.current_row(self.current_index);
            stamp.stamp_branch(self.n1.matrix_index(), self.n2.matrix_index(), row);
            stamp.g[(row, row)] += -self.value;
        }
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, _num_currents: usize) {
        self.add_static_stamp(stamp);
    }
}

/// An ideal capacitor, discretised with a companion model.
///
/// Trapezoidal rule: `G_eq = 2C/dt`, `I_eq = i(n−1) + G_eq·u(n−1)`, with
/// the current state advanced after each accepted step. Backward Euler:
/// `G_eq = C/dt`, `I_eq = C·u(n−1)/dt`, no current state. At DC the
/// capacitor is an open circuit; a tiny `1e−9` self-conductance on each
/// terminal keeps isolated nodes out of the null space.
#[derive(Debug, Clone)]
pub struct Capacitor {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    value: f64,
    last_current: f64,
    trapezoidal: bool,
}

impl Capacitor {
    pub fn new(designator: impl Into<String>, n1: NodeId, n2: NodeId, value: f64) -> Self {
        Self {
            designator: designator.into(),
            n1,
            n2,
            value,
            last_current: 0.0,
            trapezoidal: true,
        }
    }

    /// Switch to the backward-Euler companion model.
    pub fn backward_euler(mut self) -> Self {
        self.trapezoidal = false;
        self
    }
}

impl Component for Capacitor {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn add_dynamic_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, step: usize, dt: f64) {
        let u0 = branch_voltage(solution, step - 1, self.n1, self.n2);

        let (g_eq, i_eq) = if self.trapezoidal {
            let g_eq = 2.0 * self.value / dt;
            (g_eq, self.last_current + g_eq * u0)
        } else {
            (self.value / dt, self.value * u0 / dt)
        };

        stamp.stamp_conductance(self.n1.matrix_index(), self.n2.matrix_index(), g_eq);
        stamp.add_rhs(self.n1.matrix_index(), self.n2.matrix_index(), i_eq);
    }

    fn update_state(&mut self, solution: &Matrix<f64>, step: usize, dt: f64, _size_g_a: usize) {
        if self.trapezoidal {
            let u0 = branch_voltage(solution, step - 1, self.n1, self.n2);
            let u1 = branch_voltage(solution, step, self.n1, self.n2);
            let g_eq = 2.0 * self.value / dt;
            self.last_current = g_eq * u1 - (self.last_current + g_eq * u0);
        }
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, _num_currents: usize) {
        // open circuit, small tie to the reference for stability
        if let Some(i) = self.n1.matrix_index() {
            stamp.g[(i, i)] += 1e-9;
        }
        if let Some(j) = self.n2.matrix_index() {
            stamp.g[(j, j)] += 1e-9;
        }
    }
}

/// An ideal inductor, trapezoidal companion model.
///
/// `G_eq = dt/(2L)`, `I_eq = i(n−1) + G_eq·u(n−1)` flowing n1→n2. At DC
/// the inductor is a short circuit realised as a zero-volt branch through
/// a DC-only current unknown, which also makes the initial inductor
/// current available to [`update_dc_state`](Component::update_dc_state).
#[derive(Debug, Clone)]
pub struct Inductor {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    value: f64,
    last_current: f64,
    /// 1-based index among the DC-only current unknowns.
    dc_current_index: usize,
}

impl Inductor {
    pub fn new(
        designator: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        value: f64,
        dc_current_index: usize,
    ) -> Self {
        Self {
            designator: designator.into(),
            n1,
            n2,
            value,
            last_current: 0.0,
            dc_current_index,
        }
    }
}

impl Component for Inductor {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn add_dynamic_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, step: usize, dt: f64) {
        let u0 = branch_voltage(solution, step - 1, self.n1, self.n2);
        let g_eq = dt / (2.0 * self.value);
        let i_eq = self.last_current + g_eq * u0;

        stamp.stamp_conductance(self.n1.matrix_index(), self.n2.matrix_index(), g_eq);
        stamp.add_rhs(self.n1.matrix_index(), self.n2.matrix_index(), -i_eq);
    }

    fn update_state(&mut self, solution: &Matrix<f64>, step: usize, dt: f64, _size_g_a: usize) {
        let u0 = branch_voltage(solution, step - 1, self.n1, self.n2);
        let u1 = branch_voltage(solution, step, self.n1, self.n2);
        let g_eq = dt / (2.0 * self.value);
        self.last_current = g_eq * u1 + (self.last_current + g_eq * u0);
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, num_currents: usize) {
        let row = stamp.size_g_a + num_currents + self.dc_current_index - 1;
        stamp.stamp_branch(self.n1.matrix_index(), self.n2.matrix_index(), row);
    }

    fn update_dc_state(&mut self, solution: &Matrix<f64>, size_g_a: usize, num_currents: usize) {
        self.last_current =
            solution[(size_g_a + num_currents + self.dc_current_index - 1, 0)];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistor_group1_stamp() {
        let mut stamp = Stamp::new(2, 0);
        let r = Resistor::new("R1", NodeId::new(1), NodeId::new(2), 1000.0);
        r.add_static_stamp(&mut stamp);

        assert!((stamp.g[(0, 0)] - 1e-3).abs() < 1e-15);
        assert!((stamp.g[(1, 1)] - 1e-3).abs() < 1e-15);
        assert!((stamp.g[(0, 1)] + 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_resistor_group2_stamp() {
        let mut stamp = Stamp::new(2, 1);
        let r = Resistor::group2("R1", NodeId::new(1), NodeId::new(2), 50.0, 1);
        r.add_static_stamp(&mut stamp);

        assert_eq!(stamp.g[(0, 2)], 1.0);
        assert_eq!(stamp.g[(2, 0)], 1.0);
        assert_eq!(stamp.g[(1, 2)], -1.0);
        assert_eq!(stamp.g[(2, 1)], -1.0);
        assert_eq!(stamp.g[(2, 2)], -50.0);
        assert_eq!(stamp.g[(0, 0)], 0.0, "no conductance in group II");
    }

    #[test]
    fn test_capacitor_trapezoidal_companion() {
        // previous voltage 2.5V across 1uF, dt = 1us: G_eq = 2, I_eq = 5
        let mut cap = Capacitor::new("C1", NodeId::new(1), NodeId::GROUND, 1e-6);
        let mut sol = Matrix::zeros(1, 3);
        sol[(0, 0)] = 2.5;

        let mut stamp = Stamp::new(1, 0);
        cap.add_dynamic_stamp(&mut stamp, &sol, 1, 1e-6);
        assert!((stamp.g[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((stamp.s[(0, 0)] - 5.0).abs() < 1e-12);

        // after the step settles at 3.0V: i = G_eq*u1 - (i_prev + G_eq*u0)
        sol[(0, 1)] = 3.0;
        cap.update_state(&sol, 1, 1e-6, 1);
        assert!((cap.last_current - (2.0 * 3.0 - 5.0)).abs() < 1e-12);
    }

    #[test]
    fn test_capacitor_backward_euler_companion() {
        let cap = Capacitor::new("C1", NodeId::new(1), NodeId::GROUND, 1e-6).backward_euler();
        let mut sol = Matrix::zeros(1, 2);
        sol[(0, 0)] = 2.0;

        let mut stamp = Stamp::new(1, 0);
        cap.add_dynamic_stamp(&mut stamp, &sol, 1, 1e-6);
        assert!((stamp.g[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((stamp.s[(0, 0)] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_capacitor_current_tracks_du_dt() {
        // drive the capacitor with a known linear ramp and check the
        // companion current reproduces i = C du/dt in difference form
        let c = 4.7e-9;
        let dt = 1e-7;
        let slope = 2.0e6; // V/s
        let steps = 50;

        let mut sol = Matrix::zeros(1, steps);
        for n in 0..steps {
            sol[(0, n)] = slope * n as f64 * dt;
        }

        let mut cap = Capacitor::new("C1", NodeId::new(1), NodeId::GROUND, c);
        // the trapezoidal state satisfies (i(n) + i(n−1))/2 = C·Δu/dt
        let mut prev_current = 0.0;
        for n in 1..steps {
            cap.update_state(&sol, n, dt, 1);
            let average = 0.5 * (cap.last_current + prev_current);
            let expected = c * (sol[(0, n)] - sol[(0, n - 1)]) / dt;
            assert!(
                (average - expected).abs() < 1e-12,
                "step {n}: {average} != {expected}"
            );
            prev_current = cap.last_current;
        }
    }

    #[test]
    fn test_inductor_companion_and_state() {
        let mut ind = Inductor::new("L1", NodeId::new(1), NodeId::GROUND, 1e-3, 1);
        let mut sol = Matrix::zeros(1, 3);
        sol[(0, 0)] = 1.0;

        let dt = 1e-6;
        let g_eq = dt / (2.0 * 1e-3);
        let mut stamp = Stamp::new(1, 0);
        ind.add_dynamic_stamp(&mut stamp, &sol, 1, dt);
        assert!((stamp.g[(0, 0)] - g_eq).abs() < 1e-18);
        // I_eq flows out of n1
        assert!((stamp.s[(0, 0)] + g_eq * 1.0).abs() < 1e-18);

        sol[(0, 1)] = 1.0;
        ind.update_state(&sol, 1, dt, 1);
        assert!((ind.last_current - 2.0 * g_eq).abs() < 1e-18);
    }

    #[test]
    fn test_inductor_dc_short_and_state_pickup() {
        let mut ind = Inductor::new("L1", NodeId::new(1), NodeId::new(2), 1e-3, 1);
        // 2 nodes, 1 transient current, 1 DC current
        let mut stamp = Stamp::new(2, 2);
        let sol = Matrix::zeros(4, 1);
        ind.add_dc_stamp(&mut stamp, &sol, 1);

        // branch row sits past the transient currents
        assert_eq!(stamp.g[(0, 3)], 1.0);
        assert_eq!(stamp.g[(3, 0)], 1.0);
        assert_eq!(stamp.g[(1, 3)], -1.0);

        let mut dc = Matrix::zeros(4, 1);
        dc[(3, 0)] = 0.125;
        ind.update_dc_state(&dc, 2, 1);
        assert_eq!(ind.last_current, 0.125);
    }

    #[test]
    fn test_capacitor_dc_open() {
        let cap = Capacitor::new("C1", NodeId::new(1), NodeId::new(2), 1e-6);
        let mut stamp = Stamp::new(2, 0);
        let sol = Matrix::zeros(2, 1);
        cap.add_dc_stamp(&mut stamp, &sol, 0);
        assert_eq!(stamp.g[(0, 0)], 1e-9);
        assert_eq!(stamp.g[(1, 1)], 1e-9);
        assert_eq!(stamp.g[(0, 1)], 0.0);
    }
}
