//! Exponential junction diode.

use voltra_core::{branch_voltage, Component, NodeId, Stamp};
use voltra_maths::Matrix;

/// Diode model parameters.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (A).
    pub i_sat: f64,
    /// Thermal voltage (V).
    pub v_t: f64,
    /// Emission coefficient.
    pub eta: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            i_sat: 2.52e-9,
            v_t: 25.8563e-3,
            eta: 2.0,
        }
    }
}

impl DiodeParams {
    /// Junction voltage above which the exponential is evaluated at the
    /// clamp instead: `η·V_T · ln(η·V_T / (I_sat·√2))`.
    pub fn v_crit(&self) -> f64 {
        let nvt = self.eta * self.v_t;
        nvt * (nvt / (self.i_sat * std::f64::consts::SQRT_2)).ln()
    }
}

/// An exponential diode, anode `n1`, cathode `n2`.
///
/// Stamped as the Norton linearisation around the current iterate:
/// `G_eq = I_sat/(η·V_T) · exp(v/(η·V_T))`,
/// `I_eq = I_sat·(exp(v/(η·V_T)) − 1) − G_eq·v`. The controlling voltage
/// is clamped at `V_crit` so `exp` cannot overflow.
#[derive(Debug, Clone)]
pub struct Diode {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    params: DiodeParams,
    v_crit: f64,
}

impl Diode {
    pub fn new(designator: impl Into<String>, n1: NodeId, n2: NodeId) -> Self {
        Self::with_params(designator, n1, n2, DiodeParams::default())
    }

    pub fn with_params(
        designator: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        params: DiodeParams,
    ) -> Self {
        let v_crit = params.v_crit();
        Self {
            designator: designator.into(),
            n1,
            n2,
            params,
            v_crit,
        }
    }

    /// Norton equivalent `(G_eq, I_eq)` at junction voltage `v`.
    pub fn linearise(&self, v: f64) -> (f64, f64) {
        let v = v.min(self.v_crit);
        let nvt = self.params.eta * self.params.v_t;
        let exp_term = (v / nvt).exp();
        let g_eq = self.params.i_sat / nvt * exp_term;
        let i_eq = self.params.i_sat * (exp_term - 1.0) - g_eq * v;
        (g_eq, i_eq)
    }
}

impl Component for Diode {
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
        _dt: f64,
    ) {
        let v = branch_voltage(solution, step, self.n1, self.n2);
        let (g_eq, i_eq) = self.linearise(v);

        stamp.stamp_conductance(self.n1.matrix_index(), self.n2.matrix_index(), g_eq);
        stamp.add_rhs(self.n1.matrix_index(), self.n2.matrix_index(), -i_eq);
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, _num_currents: usize) {
        self.add_nonlinear_stamp(stamp, solution, 0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltra_maths::autodiff::DiffVar;

    #[test]
    fn test_forward_bias_conducts() {
        let d = Diode::new("D1", NodeId::new(1), NodeId::GROUND);
        let (g, i_eq) = d.linearise(0.7);
        assert!(g > 1e-4, "forward conductance too small: {g}");
        // Norton current is negative of the large linear extrapolation
        assert!(i_eq < 0.0);
    }

    #[test]
    fn test_reverse_bias_blocks() {
        let d = Diode::new("D1", NodeId::new(1), NodeId::GROUND);
        let (g, _) = d.linearise(-5.0);
        assert!(g < 1e-7, "reverse conductance should be tiny: {g}");
    }

    #[test]
    fn test_clamp_prevents_overflow() {
        let d = Diode::new("D1", NodeId::new(1), NodeId::GROUND);
        let (g, i_eq) = d.linearise(100.0);
        assert!(g.is_finite());
        assert!(i_eq.is_finite());
        // clamped result equals the evaluation at V_crit
        let (g_crit, i_crit) = d.linearise(d.v_crit);
        assert_eq!(g, g_crit);
        assert_eq!(i_eq, i_crit);
    }

    #[test]
    fn test_conductance_matches_autodiff() {
        // the stamped G_eq must equal dI/dV of the device equation
        let d = Diode::new("D1", NodeId::new(1), NodeId::GROUND);
        let p = DiodeParams::default();
        for v_op in [-0.3, 0.0, 0.2, 0.4, 0.55] {
            let nvt = p.eta * p.v_t;
            let v = DiffVar::<1>::variable(v_op, 0);
            let i = p.i_sat * ((v / nvt).exp() - 1.0);

            let (g_eq, i_eq) = d.linearise(v_op);
            assert!((g_eq - i[1]).abs() < 1e-12, "G mismatch at {v_op}");
            assert!((i_eq - (i[0] - i[1] * v_op)).abs() < 1e-12, "I mismatch at {v_op}");
        }
    }

    #[test]
    fn test_stamp_pattern() {
        let d = Diode::new("D1", NodeId::new(1), NodeId::new(2));
        let mut sol = Matrix::zeros(2, 1);
        sol[(0, 0)] = 0.6;
        let mut stamp = Stamp::new(2, 0);
        d.add_nonlinear_stamp(&mut stamp, &sol, 0, 0.0);

        let (g_eq, i_eq) = d.linearise(0.6);
        assert!((stamp.g[(0, 0)] - g_eq).abs() < 1e-15);
        assert!((stamp.g[(1, 1)] - g_eq).abs() < 1e-15);
        assert!((stamp.g[(0, 1)] + g_eq).abs() < 1e-15);
        assert!((stamp.s[(0, 0)] + i_eq).abs() < 1e-15);
        assert!((stamp.s[(1, 0)] - i_eq).abs() < 1e-15);
    }
}
