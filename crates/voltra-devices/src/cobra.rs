//! COBRA FET drain-current source.
//!
//! The COBRA large-signal FET equation is awkward to differentiate by
//! hand (its exponent is itself a function of the controlling voltages),
//! so this element is written the way the autodiff facility intends:
//! seed one [`DiffVar`] per controlling voltage, evaluate the equation
//! once, and read the value plus both partials straight into the Norton
//! stamp.

use voltra_core::{branch_voltage, Component, NodeId, Stamp};
use voltra_maths::autodiff::DiffVar;
use voltra_maths::Matrix;

const ALPHA: f64 = 1.3;
const BETA0: f64 = 0.42;
const GAMMA: f64 = 0.0005;
const DELTA: f64 = 0.3;
const XI: f64 = 0.06;
const LAMBDA: f64 = 1.5;
const MU: f64 = 0.0;
const ZETA: f64 = 0.18;
const VTO: f64 = -2.4;

/// A non-linear current source from `n1` to `n2` controlled by two
/// remote voltage pairs: `r1 = V(r1+) − V(r1−)` acts as the gate-source
/// voltage, `r2 = V(r2+) − V(r2−)` as the drain-source voltage.
#[derive(Debug, Clone)]
pub struct CobraSource {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    r1_pos: NodeId,
    r1_neg: NodeId,
    r2_pos: NodeId,
    r2_neg: NodeId,
}

impl CobraSource {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        designator: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        r1_pos: NodeId,
        r1_neg: NodeId,
        r2_pos: NodeId,
        r2_neg: NodeId,
    ) -> Self {
        Self {
            designator: designator.into(),
            n1,
            n2,
            r1_pos,
            r1_neg,
            r2_pos,
            r2_neg,
        }
    }

    /// Drain current and its partials w.r.t. `(r1, r2)`.
    pub fn drain_current(r1: f64, r2: f64) -> DiffVar<2> {
        let v_gs = DiffVar::<2>::variable(r1, 0);
        let v_ds = DiffVar::<2>::variable(r2, 1);

        let vgst = v_gs - (1.0 + BETA0 * BETA0) * VTO + GAMMA * v_ds;
        let veff = 0.5 * (vgst + (vgst.powf(2.0) + DELTA * DELTA).sqrt());
        let power = LAMBDA / (1.0 + MU * v_ds.powf(2.0) + XI * veff);
        let area = ALPHA * v_ds * (1.0 + ZETA * veff);
        let ids_lim = BETA0 * veff.pow(power);
        ids_lim * area.tanh()
    }
}

impl Component for CobraSource {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2, self.r1_pos, self.r1_neg, self.r2_pos, self.r2_neg]
    }

    fn add_nonlinear_stamp(
        &self,
        stamp: &mut Stamp,
        solution: &Matrix<f64>,
        step: usize,
        _dt: f64,
    ) {
        let r1 = branch_voltage(solution, step, self.r1_pos, self.r1_neg);
        let r2 = branch_voltage(solution, step, self.r2_pos, self.r2_neg);

        let idrain = Self::drain_current(r1, r2);
        let i_ds_eq = idrain[0] - idrain[1] * r1 - idrain[2] * r2;

        let (r1p, r1n) = (self.r1_pos.matrix_index(), self.r1_neg.matrix_index());
        let (r2p, r2n) = (self.r2_pos.matrix_index(), self.r2_neg.matrix_index());

        if let Some(n1) = self.n1.matrix_index() {
            stamp.s[(n1, 0)] += -i_ds_eq;
            if let Some(i) = r1p {
                stamp.g[(n1, i)] += idrain[1];
            }
            if let Some(i) = r1n {
                stamp.g[(n1, i)] += -idrain[1];
            }
            if let Some(i) = r2p {
                stamp.g[(n1, i)] += idrain[2];
            }
            if let Some(i) = r2n {
                stamp.g[(n1, i)] += -idrain[2];
            }
        }

        if let Some(n2) = self.n2.matrix_index() {
            stamp.s[(n2, 0)] += i_ds_eq;
            if let Some(i) = r1p {
                stamp.g[(n2, i)] += -idrain[1];
            }
            if let Some(i) = r1n {
                stamp.g[(n2, i)] += idrain[1];
            }
            if let Some(i) = r2p {
                stamp.g[(n2, i)] += -idrain[2];
            }
            if let Some(i) = r2n {
                stamp.g[(n2, i)] += idrain[2];
            }
        }
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, _num_currents: usize) {
        self.add_nonlinear_stamp(stamp, solution, 0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partials_match_finite_differences() {
        let h = 1e-6;
        for (r1, r2) in [(0.0, 0.1), (-1.0, 2.0), (0.5, 1.5), (-2.0, 0.5)] {
            let i = CobraSource::drain_current(r1, r2);

            let d1 = (CobraSource::drain_current(r1 + h, r2)[0]
                - CobraSource::drain_current(r1 - h, r2)[0])
                / (2.0 * h);
            let d2 = (CobraSource::drain_current(r1, r2 + h)[0]
                - CobraSource::drain_current(r1, r2 - h)[0])
                / (2.0 * h);

            assert!(
                (i[1] - d1).abs() < 1e-5,
                "∂I/∂r1 mismatch at ({r1}, {r2}): {} vs {d1}",
                i[1]
            );
            assert!(
                (i[2] - d2).abs() < 1e-5,
                "∂I/∂r2 mismatch at ({r1}, {r2}): {} vs {d2}",
                i[2]
            );
        }
    }

    #[test]
    fn test_zero_vds_gives_zero_current() {
        // tanh(α·V_ds·…) kills the current at V_ds = 0
        let i = CobraSource::drain_current(0.5, 0.0);
        assert!(i[0].abs() < 1e-15);
    }

    #[test]
    fn test_current_increases_with_gate_drive() {
        let low = CobraSource::drain_current(-1.0, 1.0)[0];
        let high = CobraSource::drain_current(1.0, 1.0)[0];
        assert!(high > low, "{high} should exceed {low}");
    }

    #[test]
    fn test_stamp_couples_sense_pairs() {
        let src = CobraSource::new(
            "IN1",
            NodeId::new(1),
            NodeId::new(2),
            NodeId::new(3),
            NodeId::GROUND,
            NodeId::new(4),
            NodeId::GROUND,
        );
        let mut sol = Matrix::zeros(4, 1);
        sol[(2, 0)] = 0.5; // r1
        sol[(3, 0)] = 1.0; // r2

        let mut stamp = Stamp::new(4, 0);
        src.add_nonlinear_stamp(&mut stamp, &sol, 0, 0.0);

        let i = CobraSource::drain_current(0.5, 1.0);
        assert!((stamp.g[(0, 2)] - i[1]).abs() < 1e-15);
        assert!((stamp.g[(0, 3)] - i[2]).abs() < 1e-15);
        assert!((stamp.g[(1, 2)] + i[1]).abs() < 1e-15);
        assert!((stamp.g[(1, 3)] + i[2]).abs() < 1e-15);
        // output nodes receive opposite injections
        assert!((stamp.s[(0, 0)] + stamp.s[(1, 0)]).abs() < 1e-15);
    }
}
