//! Ebers–Moll bipolar transistors.

use voltra_core::{Component, NodeId, Stamp};
use voltra_maths::Matrix;

/// Ebers–Moll model parameters, shared by NPN and PNP.
#[derive(Debug, Clone)]
pub struct BjtParams {
    /// Forward current gain α_F.
    pub alpha_f: f64,
    /// Reverse current gain α_R.
    pub alpha_r: f64,
    /// Emitter junction saturation current (A).
    pub i_es: f64,
    /// Emitter junction thermal voltage (V).
    pub v_te: f64,
    /// Collector junction saturation current (A).
    pub i_cs: f64,
    /// Collector junction thermal voltage (V).
    pub v_tc: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            alpha_f: 0.99,
            alpha_r: 0.02,
            i_es: 2e-14,
            v_te: 26e-3,
            i_cs: 99e-14,
            v_tc: 26e-3,
        }
    }
}

impl BjtParams {
    fn v_be_crit(&self) -> f64 {
        self.v_te * (self.v_te / (self.i_es * std::f64::consts::SQRT_2)).ln()
    }

    fn v_bc_crit(&self) -> f64 {
        self.v_tc * (self.v_tc / (self.i_cs * std::f64::consts::SQRT_2)).ln()
    }
}

fn solution_voltage(solution: &Matrix<f64>, col: usize, node: NodeId) -> f64 {
    node.matrix_index().map_or(0.0, |i| solution[(i, col)])
}

/// An NPN transistor with terminals collector, base, emitter.
#[derive(Debug, Clone)]
pub struct Npn {
    designator: String,
    c: NodeId,
    b: NodeId,
    e: NodeId,
    params: BjtParams,
    v_be_crit: f64,
    v_bc_crit: f64,
}

impl Npn {
    pub fn new(designator: impl Into<String>, c: NodeId, b: NodeId, e: NodeId) -> Self {
        Self::with_params(designator, c, b, e, BjtParams::default())
    }

    pub fn with_params(
        designator: impl Into<String>,
        c: NodeId,
        b: NodeId,
        e: NodeId,
        params: BjtParams,
    ) -> Self {
        let v_be_crit = params.v_be_crit();
        let v_bc_crit = params.v_bc_crit();
        Self {
            designator: designator.into(),
            c,
            b,
            e,
            params,
            v_be_crit,
            v_bc_crit,
        }
    }
}

impl Component for Npn {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.c, self.b, self.e]
    }

    fn add_nonlinear_stamp(
        &self,
        stamp: &mut Stamp,
        solution: &Matrix<f64>,
        step: usize,
        _dt: f64,
    ) {
        let p = &self.params;
        let vb = solution_voltage(solution, step, self.b);
        let v_be = (vb - solution_voltage(solution, step, self.e)).min(self.v_be_crit);
        let v_bc = (vb - solution_voltage(solution, step, self.c)).min(self.v_bc_crit);

        let e_be = (v_be / p.v_te).exp();
        let e_bc = (v_bc / p.v_tc).exp();

        let i_e = -p.i_es * (e_be - 1.0) + p.alpha_r * p.i_cs * (e_bc - 1.0);
        let i_c = p.alpha_f * p.i_es * (e_be - 1.0) - p.i_cs * (e_bc - 1.0);

        let g_ee = p.i_es / p.v_te * e_be;
        let g_ec = p.alpha_r * p.i_cs / p.v_tc * e_bc;
        let g_ce = p.alpha_f * p.i_es / p.v_te * e_be;
        let g_cc = p.i_cs / p.v_tc * e_bc;

        let i_e_eq = i_e + g_ee * v_be - g_ec * v_bc;
        let i_c_eq = i_c - g_ce * v_be + g_cc * v_bc;

        let (cp, bp, ep) = (
            self.c.matrix_index(),
            self.b.matrix_index(),
            self.e.matrix_index(),
        );

        if let Some(e) = ep {
            stamp.g[(e, e)] += g_ee;
            stamp.s[(e, 0)] += -i_e_eq;
            if let Some(c) = cp {
                stamp.g[(e, c)] += -g_ec;
            }
            if let Some(b) = bp {
                stamp.g[(e, b)] += g_ec - g_ee;
            }
        }

        if let Some(c) = cp {
            stamp.g[(c, c)] += g_cc;
            stamp.s[(c, 0)] += -i_c_eq;
            if let Some(e) = ep {
                stamp.g[(c, e)] += -g_ce;
            }
            if let Some(b) = bp {
                stamp.g[(c, b)] += g_ce - g_cc;
            }
        }

        if let Some(b) = bp {
            stamp.g[(b, b)] += g_cc + g_ee - g_ce - g_ec;
            stamp.s[(b, 0)] += i_e_eq + i_c_eq;
            if let Some(e) = ep {
                stamp.g[(b, e)] += g_ce - g_ee;
            }
            if let Some(c) = cp {
                stamp.g[(b, c)] += g_ec - g_cc;
            }
        }
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, _num_currents: usize) {
        self.add_nonlinear_stamp(stamp, solution, 0, 0.0);
    }
}

/// A PNP transistor with terminals collector, base, emitter.
///
/// Forward bias is at negative junction voltages, so the exponentials are
/// `exp(−v/V_T)` and the clamps bound the voltages from *below* at
/// `−V_crit`.
#[derive(Debug, Clone)]
pub struct Pnp {
    designator: String,
    c: NodeId,
    b: NodeId,
    e: NodeId,
    params: BjtParams,
    v_be_crit: f64,
    v_bc_crit: f64,
}

impl Pnp {
    pub fn new(designator: impl Into<String>, c: NodeId, b: NodeId, e: NodeId) -> Self {
        Self::with_params(designator, c, b, e, BjtParams::default())
    }

    pub fn with_params(
        designator: impl Into<String>,
        c: NodeId,
        b: NodeId,
        e: NodeId,
        params: BjtParams,
    ) -> Self {
        let v_be_crit = params.v_be_crit();
        let v_bc_crit = params.v_bc_crit();
        Self {
            designator: designator.into(),
            c,
            b,
            e,
            params,
            v_be_crit,
            v_bc_crit,
        }
    }
}

impl Component for Pnp {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.c, self.b, self.e]
    }

    fn add_nonlinear_stamp(
        &self,
        stamp: &mut Stamp,
        solution: &Matrix<f64>,
        step: usize,
        _dt: f64,
    ) {
        let p = &self.params;
        let vb = solution_voltage(solution, step, self.b);
        let v_be = (vb - solution_voltage(solution, step, self.e)).max(-self.v_be_crit);
        let v_bc = (vb - solution_voltage(solution, step, self.c)).max(-self.v_bc_crit);

        let i_f = p.i_cs * ((-v_bc / p.v_tc).exp() - 1.0);
        let i_r = p.i_es * ((-v_be / p.v_te).exp() - 1.0);
        let di_f = -(p.i_cs / p.v_tc) * (-v_bc / p.v_tc).exp();
        let di_r = -(p.i_es / p.v_te) * (-v_be / p.v_te).exp();

        let i_e = i_r - p.alpha_f * i_f;
        let i_b = (p.alpha_f - 1.0) * i_f + (p.alpha_r - 1.0) * i_r;
        let i_c = i_f - p.alpha_r * i_r;

        let g_ee = di_f;
        let g_ec = -p.alpha_r * di_r;
        let g_ce = -p.alpha_f * di_f;
        let g_cc = di_r;
        let g_be = (p.alpha_r - 1.0) * di_r;
        let g_bc = (p.alpha_f - 1.0) * di_f;

        let i_e_eq = i_e - g_ee * v_be - g_ec * v_bc;
        let i_c_eq = i_c - g_ce * v_be - g_cc * v_bc;
        let i_b_eq = i_b - g_be * v_be - g_bc * v_bc;

        let (cp, bp, ep) = (
            self.c.matrix_index(),
            self.b.matrix_index(),
            self.e.matrix_index(),
        );

        if let Some(e) = ep {
            stamp.g[(e, e)] += -g_ee;
            stamp.s[(e, 0)] += -i_e_eq;
            if let Some(c) = cp {
                stamp.g[(e, c)] += -g_ec;
            }
            if let Some(b) = bp {
                stamp.g[(e, b)] += g_ec + g_ee;
            }
        }

        if let Some(c) = cp {
            stamp.g[(c, c)] += -g_cc;
            stamp.s[(c, 0)] += -i_c_eq;
            if let Some(e) = ep {
                stamp.g[(c, e)] += -g_ce;
            }
            if let Some(b) = bp {
                stamp.g[(c, b)] += g_ce + g_cc;
            }
        }

        if let Some(b) = bp {
            stamp.g[(b, b)] += g_be + g_bc;
            stamp.s[(b, 0)] += -i_b_eq;
            if let Some(e) = ep {
                stamp.g[(b, e)] += -g_be;
            }
            if let Some(c) = cp {
                stamp.g[(b, c)] += -g_bc;
            }
        }
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, _num_currents: usize) {
        self.add_nonlinear_stamp(stamp, solution, 0, 0.0);
    }
}
