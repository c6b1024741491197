//! S-parameter block backed by a pole–residue fit.
//!
//! Each ordered port pair `(p, c)` carries a rational model
//! `S_pc(s) = d + Σ_ρ r_ρ/(s − pole_ρ)`. Instead of convolving an
//! impulse response, the block keeps one complex state `x_ρ` per pole and
//! advances it recursively each time step. The incident wave over a step
//! is approximated piecewise-linearly for the very first step (two
//! samples available) and piecewise-quadratically afterwards; the
//! corresponding per-pole weights `(λ, μ, ν)` are precomputed whenever
//! the discretisation order or the time step changes.

use std::fs;
use std::path::Path;

use num_complex::Complex;

use voltra_core::{Component, NodeId, Stamp};
use voltra_maths::Matrix;

use crate::error::{Error, Result};
use crate::sparam::PortSpec;

type C64 = Complex<f64>;

/// The rational model and discretisation state for one port pair.
#[derive(Debug, Clone, Default)]
struct PoleResidueSet {
    poles: Vec<C64>,
    residues: Vec<C64>,
    remainder: C64,

    /// Per-pole weight of the newest incident-wave sample.
    lambda_p: Vec<C64>,
    /// Per-pole weight of the previous sample.
    mu_p: Vec<C64>,
    /// Per-pole weight of the second-previous sample (second order only).
    nu_p: Vec<C64>,
    /// `exp(pole·dt)` per pole.
    exp_a: Vec<C64>,

    /// Summed weights across poles.
    lambda: C64,
    mu: C64,
    nu: C64,

    /// Recursive per-pole history state.
    x: Vec<C64>,
}

impl PoleResidueSet {
    fn new(poles: Vec<C64>, residues: Vec<C64>, remainder: C64) -> Self {
        let count = poles.len();
        Self {
            poles,
            residues,
            remainder,
            lambda_p: vec![C64::new(0.0, 0.0); count],
            mu_p: vec![C64::new(0.0, 0.0); count],
            nu_p: vec![C64::new(0.0, 0.0); count],
            exp_a: vec![C64::new(0.0, 0.0); count],
            lambda: C64::new(0.0, 0.0),
            mu: C64::new(0.0, 0.0),
            nu: C64::new(0.0, 0.0),
            x: vec![C64::new(0.0, 0.0); count],
        }
    }
}

#[derive(Debug, Clone)]
struct PrPort {
    spec: PortSpec,
    /// `1/(1 − λ_pp − d_pp)`.
    beta: C64,
    /// Thevenin resistance `z_ref·(1 + λ_pp + d_pp)·β`.
    r: C64,
    /// Cross-port coupling factors, indexed by the far port.
    alpha: Vec<C64>,
    /// Models of the responses *into* this port, indexed by the far port.
    from: Vec<PoleResidueSet>,
}

/// An N-port S-parameter block in the pole–residue formulation.
#[derive(Debug, Clone)]
pub struct SParameterBlockPR {
    designator: String,
    ports: Vec<PrPort>,
    num_ports: usize,
    first_order: bool,
    z_ref: f64,
}

/// One port pair's model as read from a table file.
#[derive(Debug, Clone)]
pub struct RawPoleResidue {
    pub remainder: C64,
    pub poles: Vec<C64>,
    pub residues: Vec<C64>,
}

/// Load a pole–residue table: first non-comment line is `z_ref`, then per
/// ordered port pair a remainder line, a poles line and a residues line,
/// each holding `(re, im)` scalar pairs.
pub fn load_table(path: &Path, num_ports: usize) -> Result<(f64, Vec<Vec<RawPoleResidue>>)> {
    let text = fs::read_to_string(path).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })?;

    let mut lines = text.lines().filter(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#') && !trimmed.starts_with('!')
    });

    let parse_pairs = |line: &str| -> Result<Vec<C64>> {
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|_| Error::format(path, format!("not a number: {token:?}")))
            })
            .collect::<Result<_>>()?;
        if values.len() % 2 != 0 {
            return Err(Error::format(path, "odd number of scalars in (re, im) line"));
        }
        Ok(values.chunks(2).map(|c| C64::new(c[0], c[1])).collect())
    };

    let z_ref: f64 = lines
        .next()
        .ok_or_else(|| Error::format(path, "missing z_ref line"))?
        .trim()
        .parse()
        .map_err(|_| Error::format(path, "bad z_ref line"))?;

    let mut table = Vec::with_capacity(num_ports);
    for a in 0..num_ports {
        let mut row = Vec::with_capacity(num_ports);
        for c in 0..num_ports {
            let remainder_line = lines
                .next()
                .ok_or_else(|| Error::format(path, format!("missing remainder for ({a},{c})")))?;
            let remainder = *parse_pairs(remainder_line)?
                .first()
                .ok_or_else(|| Error::format(path, "empty remainder line"))?;

            let poles = parse_pairs(
                lines
                    .next()
                    .ok_or_else(|| Error::format(path, format!("missing poles for ({a},{c})")))?,
            )?;
            let residues = parse_pairs(
                lines.next().ok_or_else(|| {
                    Error::format(path, format!("missing residues for ({a},{c})"))
                })?,
            )?;
            if poles.len() != residues.len() {
                return Err(Error::format(path, "pole/residue count mismatch"));
            }
            row.push(RawPoleResidue {
                remainder,
                poles,
                residues,
            });
        }
        table.push(row);
    }

    Ok((z_ref, table))
}

impl SParameterBlockPR {
    /// Build from per-pair rational models. `models[a][c]` is the response
    /// into port `a` from port `c`.
    pub fn from_models(
        designator: impl Into<String>,
        specs: Vec<PortSpec>,
        models: Vec<Vec<RawPoleResidue>>,
        z_ref: f64,
    ) -> Self {
        let num_ports = specs.len();
        let ports = specs
            .into_iter()
            .zip(models)
            .map(|(spec, row)| PrPort {
                spec,
                beta: C64::new(0.0, 0.0),
                r: C64::new(0.0, 0.0),
                alpha: vec![C64::new(0.0, 0.0); num_ports],
                from: row
                    .into_iter()
                    .map(|raw| PoleResidueSet::new(raw.poles, raw.residues, raw.remainder))
                    .collect(),
            })
            .collect();

        Self {
            designator: designator.into(),
            ports,
            num_ports,
            first_order: true,
            z_ref,
        }
    }

    /// Build from a pole–residue table file.
    pub fn from_file(
        designator: impl Into<String>,
        specs: Vec<PortSpec>,
        path: &Path,
    ) -> Result<Self> {
        let (z_ref, table) = load_table(path, specs.len())?;
        Ok(Self::from_models(designator, specs, table, z_ref))
    }

    /// Incident wave at `port` read from solution column `col`.
    fn a_wave(&self, port: usize, solution: &Matrix<f64>, col: usize, size_g_a: usize) -> f64 {
        let spec = &self.ports[port].spec;
        let mut v = 0.0;
        if let Some(i) = spec.positive.matrix_index() {
            v += solution[(i, col)];
        }
        if let Some(j) = spec.negative.matrix_index() {
            v -= solution[(j, col)];
        }
        let current = solution[(size_g_a + spec.current_index - 1, col)];
        (v + current * self.z_ref) / (2.0 * self.z_ref.sqrt())
    }

    /// History term of port `p`: the advanced pole states plus the lagged
    /// incident-wave contributions of every port.
    fn history(&self, p: usize, solution: &Matrix<f64>, step: usize, size_g_a: usize) -> C64 {
        let mut sum = C64::new(0.0, 0.0);
        for c in 0..self.num_ports {
            let set = &self.ports[p].from[c];
            for rho in 0..set.poles.len() {
                sum += set.x[rho] * set.exp_a[rho];
            }
            sum += set.mu * self.a_wave(c, solution, step - 1, size_g_a);
            if step > 1 {
                sum += set.nu * self.a_wave(c, solution, step - 2, size_g_a);
            }
        }
        sum * 2.0 * self.z_ref.sqrt()
    }

    /// Equivalent source voltage of port `p`.
    fn v_p(&self, p: usize, solution: &Matrix<f64>, step: usize, size_g_a: usize) -> f64 {
        (self.history(p, solution, step, size_g_a) * self.ports[p].beta).re
    }

    /// Port constants derived from the summed weights of the diagonal and
    /// cross responses.
    fn set_constants(&mut self) {
        let z_ref = self.z_ref;
        for p in 0..self.num_ports {
            let own = self.ports[p].from[p].lambda + self.ports[p].from[p].remainder;
            let beta = (C64::new(1.0, 0.0) - own).inv();
            self.ports[p].beta = beta;
            self.ports[p].r = z_ref * (C64::new(1.0, 0.0) + own) * beta;

            for c in 0..self.num_ports {
                self.ports[p].alpha[c] = if c == p {
                    C64::new(0.0, 0.0)
                } else {
                    (self.ports[p].from[c].lambda + self.ports[p].from[c].remainder) * beta
                };
            }
        }
    }

    /// Piecewise-linear (first order) weights; used for the first step
    /// where only two samples of the incident wave exist.
    fn set_first_order(&mut self, dt: f64) {
        self.first_order = true;
        for port in &mut self.ports {
            for set in &mut port.from {
                set.lambda = C64::new(0.0, 0.0);
                set.mu = C64::new(0.0, 0.0);
                set.nu = C64::new(0.0, 0.0);
                for rho in 0..set.poles.len() {
                    let pole = set.poles[rho];
                    let residue = set.residues[rho];
                    let a = pole * dt;
                    let ea = a.exp();
                    let scale = -(residue / pole);

                    set.lambda_p[rho] = scale * (C64::new(1.0, 0.0) + (C64::new(1.0, 0.0) - ea) / a);
                    set.lambda += set.lambda_p[rho];

                    set.mu_p[rho] = scale * ((ea - C64::new(1.0, 0.0)) / a - ea);
                    set.mu += set.mu_p[rho];

                    set.nu_p[rho] = C64::new(0.0, 0.0);
                }
            }
        }
        self.set_constants();
    }

    /// Piecewise-quadratic (second order) weights; used from the second
    /// step onwards.
    fn set_second_order(&mut self, dt: f64) {
        self.first_order = false;
        for port in &mut self.ports {
            for set in &mut port.from {
                set.lambda = C64::new(0.0, 0.0);
                set.mu = C64::new(0.0, 0.0);
                set.nu = C64::new(0.0, 0.0);
                for rho in 0..set.poles.len() {
                    let pole = set.poles[rho];
                    let residue = set.residues[rho];
                    let a = pole * dt;
                    let ea = a.exp();
                    let one = C64::new(1.0, 0.0);
                    let scale = -(residue / pole);

                    set.lambda_p[rho] =
                        scale * ((one - ea) / (a * a) + (C64::new(3.0, 0.0) - ea) / (2.0 * a) + one);
                    set.lambda += set.lambda_p[rho];

                    set.mu_p[rho] =
                        scale * (-2.0 * (one - ea) / (a * a) - 2.0 * a.inv() - ea);
                    set.mu += set.mu_p[rho];

                    set.nu_p[rho] =
                        scale * ((one - ea) / (a * a) + (one + ea) / (2.0 * a));
                    set.nu += set.nu_p[rho];
                }
            }
        }
        self.set_constants();
    }
}

impl Component for SParameterBlockPR {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.ports
            .iter()
            .flat_map(|p| [p.spec.positive, p.spec.negative])
            .collect()
    }

    fn add_static_stamp(&self, stamp: &mut Stamp) {
        for (p, port) in self.ports.iter().enumerate() {
            let row = stamp.current_row(port.spec.current_index);
            stamp.g[(row, row)] += (-port.r).re;
            stamp.stamp_branch(
                port.spec.positive.matrix_index(),
                port.spec.negative.matrix_index(),
                row,
            );

            for (c, other) in self.ports.iter().enumerate() {
                if c == p {
                    continue;
                }
                if let Some(i) = other.spec.positive.matrix_index() {
                    stamp.g[(row, i)] += (-port.alpha[c]).re;
                }
                if let Some(j) = other.spec.negative.matrix_index() {
                    stamp.g[(row, j)] += port.alpha[c].re;
                }
                let other_row = stamp.current_row(other.spec.current_index);
                stamp.g[(row, other_row)] += (-self.z_ref * port.alpha[c]).re;
            }
        }
    }

    fn add_dynamic_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, step: usize, _dt: f64) {
        let size_g_a = stamp.size_g_a;
        for (p, port) in self.ports.iter().enumerate() {
            let row = stamp.current_row(port.spec.current_index);
            stamp.s[(row, 0)] += self.v_p(p, solution, step, size_g_a);
        }
    }

    fn update_state(&mut self, solution: &Matrix<f64>, step: usize, dt: f64, size_g_a: usize) {
        for p in 0..self.num_ports {
            for c in 0..self.num_ports {
                let a_now = self.a_wave(c, solution, step, size_g_a);
                let a_prev = self.a_wave(c, solution, step - 1, size_g_a);
                let a_prev2 = if step > 1 {
                    self.a_wave(c, solution, step - 2, size_g_a)
                } else {
                    0.0
                };

                let first_order = self.first_order;
                let set = &mut self.ports[p].from[c];
                for rho in 0..set.poles.len() {
                    set.x[rho] = set.x[rho] * set.exp_a[rho]
                        + set.lambda_p[rho] * a_now
                        + set.mu_p[rho] * a_prev;
                    if !first_order {
                        set.x[rho] += set.nu_p[rho] * a_prev2;
                    }
                }
            }
        }

        // enough history for the quadratic fit exists after the first step
        if self.first_order && step >= 1 {
            self.set_second_order(dt);
        }
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, _num_currents: usize) {
        let num_ports = self.num_ports;
        let mut x_sum = vec![C64::new(0.0, 0.0); num_ports * num_ports];
        for p in 0..num_ports {
            for c in 0..num_ports {
                let set = &self.ports[p].from[c];
                for rho in 0..set.poles.len() {
                    x_sum[p * num_ports + c] += -(set.lambda_p[rho] + set.mu_p[rho])
                        / (set.exp_a[rho] - C64::new(1.0, 0.0));
                }
                x_sum[p * num_ports + c] += set.remainder;
            }
        }

        for (p, port) in self.ports.iter().enumerate() {
            let row = stamp.current_row(port.spec.current_index);
            let own = x_sum[p * num_ports + p];
            let beta = (C64::new(1.0, 0.0) - own).inv();

            stamp.g[(row, row)] += (-self.z_ref * (C64::new(1.0, 0.0) + own) * beta).re;
            stamp.stamp_branch(
                port.spec.positive.matrix_index(),
                port.spec.negative.matrix_index(),
                row,
            );

            for (c, other) in self.ports.iter().enumerate() {
                if c == p {
                    continue;
                }
                let coupling = x_sum[p * num_ports + c] * beta;
                if let Some(i) = other.spec.positive.matrix_index() {
                    stamp.g[(row, i)] += (-coupling).re;
                }
                if let Some(j) = other.spec.negative.matrix_index() {
                    stamp.g[(row, j)] += coupling.re;
                }
                let other_row = stamp.current_row(other.spec.current_index);
                stamp.g[(row, other_row)] += (-self.z_ref * coupling).re;
            }
        }
    }

    fn set_timestep(&mut self, dt: f64) {
        for port in &mut self.ports {
            for set in &mut port.from {
                for rho in 0..set.poles.len() {
                    set.exp_a[rho] = (set.poles[rho] * dt).exp();
                }
            }
        }
        if self.first_order {
            self.set_first_order(dt);
        } else {
            self.set_second_order(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn single_pole_block(pole: C64, residue: C64, remainder: C64) -> SParameterBlockPR {
        let raw = RawPoleResidue {
            remainder,
            poles: vec![pole],
            residues: vec![residue],
        };
        SParameterBlockPR::from_models(
            "SVP1",
            vec![PortSpec {
                positive: NodeId::new(1),
                negative: NodeId::GROUND,
                current_index: 1,
            }],
            vec![vec![raw]],
            50.0,
        )
    }

    #[test]
    fn test_weight_sums_recover_dc_response() {
        // for both discretisation orders the weights satisfy
        // λ + μ + ν = −(r/pole)·(1 − e^a), which makes the DC x-sum
        // collapse to S(0) − d = −r/pole exactly
        let pole = C64::new(-2.0e9, 1.0e9);
        let residue = C64::new(5.0e8, -3.0e8);
        let mut block = single_pole_block(pole, residue, C64::new(0.0, 0.0));
        let dt = 1e-11;
        block.set_timestep(dt);

        let expected = -(residue / pole) * (C64::new(1.0, 0.0) - (pole * dt).exp());

        let set = &block.ports[0].from[0];
        let first_sum = set.lambda + set.mu + set.nu;
        assert!((first_sum - expected).norm() < expected.norm() * 1e-12);

        // with first-order weights (the ones DC analysis runs under) the
        // x-sum reduction is exact: −(λ + μ)/(e^a − 1) = −r/pole
        let dc = -(set.lambda_p[0] + set.mu_p[0]) / (set.exp_a[0] - C64::new(1.0, 0.0));
        let s_dc = -(residue / pole);
        assert!((dc - s_dc).norm() < s_dc.norm() * 1e-12);

        block.set_second_order(dt);
        let set = &block.ports[0].from[0];
        let second_sum = set.lambda + set.mu + set.nu;
        assert!((second_sum - expected).norm() < expected.norm() * 1e-9);
    }

    #[test]
    fn test_constants_from_remainder_only() {
        // no poles, remainder 0.5 on the diagonal: β = 2, R = 150
        let raw = RawPoleResidue {
            remainder: C64::new(0.5, 0.0),
            poles: Vec::new(),
            residues: Vec::new(),
        };
        let mut block = SParameterBlockPR::from_models(
            "SVP1",
            vec![PortSpec {
                positive: NodeId::new(1),
                negative: NodeId::GROUND,
                current_index: 1,
            }],
            vec![vec![raw]],
            50.0,
        );
        block.set_timestep(1e-9);

        assert!((block.ports[0].beta - C64::new(2.0, 0.0)).norm() < 1e-12);
        assert!((block.ports[0].r - C64::new(150.0, 0.0)).norm() < 1e-9);

        let mut stamp = Stamp::new(1, 1);
        block.add_static_stamp(&mut stamp);
        assert!((stamp.g[(1, 1)] + 150.0).abs() < 1e-9);
        assert_eq!(stamp.g[(0, 1)], 1.0);
    }

    #[test]
    fn test_switches_to_second_order_after_first_step() {
        let mut block =
            single_pole_block(C64::new(-1.0e9, 0.0), C64::new(1.0e9, 0.0), C64::new(0.0, 0.0));
        block.set_timestep(1e-11);
        assert!(block.first_order);

        // 1 node + 1 branch current, 3 columns of history
        let sol = Matrix::zeros(2, 3);
        block.update_state(&sol, 1, 1e-11, 1);
        assert!(!block.first_order, "should switch after step 1");
        // nu is populated once second order is active
        assert!(block.ports[0].from[0].nu.norm() > 0.0);
    }

    #[test]
    fn test_state_advances_with_input() {
        let mut block =
            single_pole_block(C64::new(-1.0e9, 0.0), C64::new(1.0e9, 0.0), C64::new(0.0, 0.0));
        let dt = 1e-11;
        block.set_timestep(dt);

        let mut sol = Matrix::zeros(2, 3);
        sol[(0, 1)] = 1.0; // 1V at the port, zero current

        // capture the first-order weight: update_state switches to the
        // second-order set after advancing x
        let lambda_first = block.ports[0].from[0].lambda_p[0];
        block.update_state(&sol, 1, dt, 1);

        let a1 = 1.0 / (2.0 * 50.0_f64.sqrt());
        let set = &block.ports[0].from[0];
        // x = λ·a(1) + μ·a(0), a(0) = 0
        let expected = lambda_first * a1;
        assert!((set.x[0] - expected).norm() < 1e-15);
    }

    #[test]
    fn test_table_loader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "! fitted 1-port").unwrap();
        writeln!(file, "50").unwrap();
        writeln!(file, "0.1 0.0").unwrap();
        writeln!(file, "-1e9 2e9  -1e9 -2e9").unwrap();
        writeln!(file, "3e8 1e8   3e8 -1e8").unwrap();
        file.flush().unwrap();

        let (z_ref, table) = load_table(file.path(), 1).unwrap();
        assert_eq!(z_ref, 50.0);
        assert_eq!(table[0][0].poles.len(), 2);
        assert_eq!(table[0][0].poles[1], C64::new(-1e9, -2e9));
        assert_eq!(table[0][0].residues[0], C64::new(3e8, 1e8));
        assert_eq!(table[0][0].remainder, C64::new(0.1, 0.0));
    }

    #[test]
    fn test_table_loader_count_mismatch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "50").unwrap();
        writeln!(file, "0.0 0.0").unwrap();
        writeln!(file, "-1e9 0.0").unwrap();
        writeln!(file, "3e8 0.0  1e8 0.0").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_table(file.path(), 1),
            Err(Error::Format { .. })
        ));
    }
}
