//! Voltage-dependent capacitor.

use voltra_core::{branch_voltage, Component, NodeId, Stamp};
use voltra_maths::Matrix;

/// A non-linear capacitor `C(u) = Cp + Co·(1 + tanh(P₁₀ + P₁₁·u))`.
///
/// Discretised with the trapezoidal rule and linearised around the
/// current iterate:
///
/// ```text
/// i     = C(u)·(2(u − u_last)/dt − i_last/C_last)
/// di/du = C'(u)·(2(u − u_last)/dt − i_last/C_last) + 2C(u)/dt
/// ```
///
/// State carried across steps: `u_last`, `i_last` and `C_last`.
#[derive(Debug, Clone)]
pub struct NonLinearCapacitor {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    c_p: f64,
    c_o: f64,
    p_10: f64,
    p_11: f64,

    u_last: f64,
    i_last: f64,
    c_last: f64,
}

impl NonLinearCapacitor {
    pub fn new(
        designator: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        c_p: f64,
        c_o: f64,
        p_10: f64,
        p_11: f64,
    ) -> Self {
        let c_last = c_p + c_o * (1.0 + p_10.tanh());
        Self {
            designator: designator.into(),
            n1,
            n2,
            c_p,
            c_o,
            p_10,
            p_11,
            u_last: 0.0,
            i_last: 0.0,
            c_last,
        }
    }

    pub fn capacitance(&self, u: f64) -> f64 {
        self.c_p + self.c_o * (1.0 + (self.p_10 + self.p_11 * u).tanh())
    }

    fn capacitance_slope(&self, u: f64) -> f64 {
        self.c_o * self.p_11 / (self.p_10 + self.p_11 * u).cosh().powi(2)
    }

    fn trapezoidal_current(&self, u: f64, dt: f64) -> f64 {
        self.capacitance(u) * (2.0 * (u - self.u_last) / dt - self.i_last / self.c_last)
    }
}

impl Component for NonLinearCapacitor {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn add_nonlinear_stamp(
        &self,
        stamp: &mut Stamp,
        solution: &Matrix<f64>,
        step: usize,
        dt: f64,
    ) {
        let u = branch_voltage(solution, step, self.n1, self.n2);

        let i = self.trapezoidal_current(u, dt);
        let di = self.capacitance_slope(u)
            * (2.0 * (u - self.u_last) / dt - self.i_last / self.c_last)
            + 2.0 * self.capacitance(u) / dt;

        let g_eq = di;
        let i_eq = i - g_eq * u;

        stamp.stamp_conductance(self.n1.matrix_index(), self.n2.matrix_index(), g_eq);
        stamp.add_rhs(self.n1.matrix_index(), self.n2.matrix_index(), -i_eq);
    }

    fn update_state(&mut self, solution: &Matrix<f64>, step: usize, dt: f64, _size_g_a: usize) {
        let u = branch_voltage(solution, step, self.n1, self.n2);
        self.i_last = self.trapezoidal_current(u, dt);
        self.c_last = self.capacitance(u);
        self.u_last = u;
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

    fn update_dc_state(&mut self, solution: &Matrix<f64>, _size_g_a: usize, _num_currents: usize) {
        let u = branch_voltage(solution, 0, self.n1, self.n2);
        self.i_last = 0.0;
        self.c_last = self.capacitance(u);
        self.u_last = u;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltra_maths::autodiff::DiffVar;

    fn test_cap() -> NonLinearCapacitor {
        NonLinearCapacitor::new("CN1", NodeId::new(1), NodeId::GROUND, 1e-9, 0.5e-9, 0.0, 0.5)
    }

    #[test]
    fn test_capacitance_curve() {
        let cap = test_cap();
        // tanh(0) = 0 at u = 0
        assert!((cap.capacitance(0.0) - 1.5e-9).abs() < 1e-24);
        // saturates towards Cp + 2Co
        assert!((cap.capacitance(50.0) - 2.0e-9).abs() < 1e-15);
        assert!((cap.capacitance(-50.0) - 1.0e-9).abs() < 1e-15);
    }

    #[test]
    fn test_slope_matches_autodiff() {
        let cap = test_cap();
        for u_op in [-2.0, -0.3, 0.0, 0.7, 3.0] {
            let u = DiffVar::<1>::variable(u_op, 0);
            let c = (cap.p_10 + cap.p_11 * u).tanh() * cap.c_o + (cap.c_p + cap.c_o);
            assert!(
                (cap.capacitance_slope(u_op) - c[1]).abs() < 1e-22,
                "slope mismatch at {u_op}"
            );
            assert!((cap.capacitance(u_op) - c[0]).abs() < 1e-22);
        }
    }

    #[test]
    fn test_stamp_reduces_to_linear_for_flat_curve() {
        // with Co = 0 the device is a plain capacitor: G_eq = 2C/dt
        let cap =
            NonLinearCapacitor::new("CN1", NodeId::new(1), NodeId::GROUND, 2e-9, 0.0, 0.0, 0.5);
        let sol = Matrix::zeros(1, 1);
        let mut stamp = Stamp::new(1, 0);
        let dt = 1e-6;
        cap.add_nonlinear_stamp(&mut stamp, &sol, 0, dt);
        assert!((stamp.g[(0, 0)] - 2.0 * 2e-9 / dt).abs() < 1e-12);
    }

    #[test]
    fn test_dc_state_pickup() {
        let mut cap = test_cap();
        let mut dc = Matrix::zeros(1, 1);
        dc[(0, 0)] = 1.0;
        cap.update_dc_state(&dc, 1, 0);
        assert_eq!(cap.u_last, 1.0);
        assert_eq!(cap.i_last, 0.0);
        assert!((cap.c_last - cap.capacitance(1.0)).abs() < 1e-24);
    }
}
