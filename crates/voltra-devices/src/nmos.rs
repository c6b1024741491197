//! Non-linear NMOS FET model.
//!
//! The channel is a tanh saturation curve `i_ds = β·tanh(α·(u_gs − u_gd))`
//! and the gate is loaded by two voltage-dependent capacitances of the
//! same `Cp + Co·(1 + tanh(P₁₀ + P₁₁·u))` family as
//! [`NonLinearCapacitor`](crate::NonLinearCapacitor), discretised with the
//! trapezoidal rule. All conductances below are partials with respect to
//! the *junction* voltages `u_gd`/`u_gs`; the stamped matrix entries
//! compose them with `∂u/∂v` per terminal, which flips the sign pattern
//! relative to a terminal-voltage formulation.

use voltra_core::{Component, NodeId, Stamp};
use voltra_maths::Matrix;

/// NMOS model constants.
#[derive(Debug, Clone)]
pub struct NmosParams {
    pub c_gs_p: f64,
    pub c_gs_o: f64,
    pub p_s10: f64,
    pub p_s11: f64,
    pub c_gd_p: f64,
    pub c_gd_o: f64,
    pub p_d10: f64,
    pub p_d11: f64,
    /// Channel saturation current scale.
    pub beta_ds: f64,
    /// Channel tanh steepness.
    pub alpha_ds: f64,
}

impl Default for NmosParams {
    fn default() -> Self {
        Self {
            c_gs_p: 0.01,
            c_gs_o: 0.5,
            p_s10: 0.0,
            p_s11: 0.5,
            c_gd_p: 0.5,
            c_gd_o: 1.0,
            p_d10: -1.0,
            p_d11: 0.4,
            beta_ds: 1.3,
            alpha_ds: 0.42,
        }
    }
}

impl NmosParams {
    fn c_gd(&self, u_gd: f64) -> f64 {
        self.c_gd_p + self.c_gd_o * (1.0 + (self.p_d10 + self.p_d11 * u_gd).tanh())
    }

    fn c_gs(&self, u_gs: f64) -> f64 {
        self.c_gs_p + self.c_gs_o * (1.0 + (self.p_s10 + self.p_s11 * u_gs).tanh())
    }
}

/// An NMOS transistor with terminals drain, gate, source.
#[derive(Debug, Clone)]
pub struct Nmos {
    designator: String,
    d: NodeId,
    g: NodeId,
    s: NodeId,
    params: NmosParams,

    u_gd_last: f64,
    u_gs_last: f64,
    i_gd_last: f64,
    i_gs_last: f64,
    c_gd_last: f64,
    c_gs_last: f64,
}

impl Nmos {
    pub fn new(designator: impl Into<String>, d: NodeId, g: NodeId, s: NodeId) -> Self {
        Self::with_params(designator, d, g, s, NmosParams::default())
    }

    pub fn with_params(
        designator: impl Into<String>,
        d: NodeId,
        g: NodeId,
        s: NodeId,
        params: NmosParams,
    ) -> Self {
        let c_gd_last = params.c_gd(0.0);
        let c_gs_last = params.c_gs(0.0);
        Self {
            designator: designator.into(),
            d,
            g,
            s,
            params,
            u_gd_last: 0.0,
            u_gs_last: 0.0,
            i_gd_last: 0.0,
            i_gs_last: 0.0,
            c_gd_last,
            c_gs_last,
        }
    }

    fn junction_voltages(&self, solution: &Matrix<f64>, col: usize) -> (f64, f64) {
        let vg = self.g.matrix_index().map_or(0.0, |i| solution[(i, col)]);
        let vs = self.s.matrix_index().map_or(0.0, |i| solution[(i, col)]);
        let vd = self.d.matrix_index().map_or(0.0, |i| solution[(i, col)]);
        (vg - vd, vg - vs) // (u_gd, u_gs)
    }
}

impl Component for Nmos {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.d, self.g, self.s]
    }

    fn add_nonlinear_stamp(
        &self,
        stamp: &mut Stamp,
        solution: &Matrix<f64>,
        step: usize,
        dt: f64,
    ) {
        let p = &self.params;
        let (u_gd, u_gs) = self.junction_voltages(solution, step);

        let c_gd = p.c_gd(u_gd);
        let c_gs = p.c_gs(u_gs);
        let d_c_gd = p.c_gd_o * p.p_d11 / (p.p_d10 + p.p_d11 * u_gd).cosh().powi(2);
        let d_c_gs = p.c_gs_o * p.p_s11 / (p.p_s10 + p.p_s11 * u_gs).cosh().powi(2);

        let channel = p.alpha_ds * (u_gs - u_gd);
        let i_ds = p.beta_ds * channel.tanh();
        let di_ds_d = -p.beta_ds * p.alpha_ds / channel.cosh().powi(2);
        let di_ds_s = p.beta_ds * p.alpha_ds / channel.cosh().powi(2);

        // trapezoidal gate-capacitor currents linearised at the iterate
        let i_gd = c_gd * (2.0 * (u_gd - self.u_gd_last) / dt - self.i_gd_last / self.c_gd_last);
        let i_gs = c_gs * (2.0 * (u_gs - self.u_gs_last) / dt - self.i_gs_last / self.c_gs_last);

        let i_d = -i_gd + i_ds;
        let i_s = -i_gs - i_ds;
        let i_g = i_gs + i_gd;

        let di_gd = d_c_gd
            * (2.0 * (u_gd - self.u_gd_last) / dt - self.i_gd_last / self.c_gd_last)
            + 2.0 * c_gd / dt;
        let di_gs = d_c_gs
            * (2.0 * (u_gs - self.u_gs_last) / dt - self.i_gs_last / self.c_gs_last)
            + 2.0 * c_gs / dt;

        let g_dd = -di_gd + di_ds_d;
        let g_sd = -di_ds_d;
        let g_gd = di_gd;

        let g_ds = di_ds_d;
        let g_ss = -di_gs - di_ds_s;
        let g_gs = di_gs;

        let i_d_eq = i_d - g_dd * u_gd - g_ds * u_gs;
        let i_s_eq = i_s - g_sd * u_gd - g_ss * u_gs;
        let i_g_eq = i_g - g_gd * u_gd - g_gs * u_gs;

        let (dp, gp, sp) = (
            self.d.matrix_index(),
            self.g.matrix_index(),
            self.s.matrix_index(),
        );

        if let Some(d) = dp {
            stamp.g[(d, d)] += -g_dd;
            stamp.s[(d, 0)] += -i_d_eq;
            if let Some(s) = sp {
                stamp.g[(d, s)] += -g_ds;
            }
            if let Some(g) = gp {
                stamp.g[(d, g)] += g_dd + g_ds;
            }
        }

        if let Some(s) = sp {
            stamp.g[(s, s)] += -g_ss;
            stamp.s[(s, 0)] += -i_s_eq;
            if let Some(d) = dp {
                stamp.g[(s, d)] += -g_sd;
            }
            if let Some(g) = gp {
                stamp.g[(s, g)] += g_sd + g_ss;
            }
        }

        if let Some(g) = gp {
            stamp.g[(g, g)] += g_gd + g_gs;
            stamp.s[(g, 0)] += -i_g_eq;
            if let Some(d) = dp {
                stamp.g[(g, d)] += -g_gd;
            }
            if let Some(s) = sp {
                stamp.g[(g, s)] += -g_gs;
            }
        }
    }

    fn update_state(&mut self, solution: &Matrix<f64>, step: usize, dt: f64, _size_g_a: usize) {
        let p = &self.params;
        let (u_gd, u_gs) = self.junction_voltages(solution, step);

        let c_gd = p.c_gd(u_gd);
        let c_gs = p.c_gs(u_gs);

        self.i_gd_last =
            c_gd * (2.0 * (u_gd - self.u_gd_last) / dt - self.i_gd_last / self.c_gd_last);
        self.i_gs_last =
            c_gs * (2.0 * (u_gs - self.u_gs_last) / dt - self.i_gs_last / self.c_gs_last);

        self.c_gd_last = c_gd;
        self.c_gs_last = c_gs;
        self.u_gd_last = u_gd;
        self.u_gs_last = u_gs;
    }
}
