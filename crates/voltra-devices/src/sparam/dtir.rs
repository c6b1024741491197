//! S-parameter block backed by a pruned discrete-time impulse response.

use std::path::Path;

use num_complex::Complex;

use voltra_core::{Component, NodeId, Stamp};
use voltra_maths::causal::force_causal;
use voltra_maths::Matrix;

use crate::error::Result;
use crate::sparam::touchstone;
use crate::sparam::PortSpec;

/// Per-port derived constants.
#[derive(Debug, Clone)]
struct Port {
    spec: PortSpec,
    /// Thevenin resistance `β·z_ref·(1 + s_pp(0))`.
    r: f64,
    /// `1/(1 − s_pp(0))`.
    beta: f64,
    /// Instantaneous reflection row: `s0[c] = h_pc(0)`.
    s0: Vec<f64>,
}

/// The pruned impulse-response sequences for every ordered port pair,
/// flattened into shared arrays with per-pair `(offset, len)` spans.
#[derive(Debug, Clone)]
struct ImpulseTable {
    num_ports: usize,
    data: Vec<f64>,
    time: Vec<f64>,
    spans: Vec<(usize, usize)>,
}

impl ImpulseTable {
    fn span(&self, p: usize, c: usize) -> (usize, usize) {
        self.spans[p * self.num_ports + c]
    }

    fn len(&self, p: usize, c: usize) -> usize {
        self.span(p, c).1
    }

    fn data(&self, p: usize, c: usize, k: usize) -> f64 {
        let (offset, len) = self.span(p, c);
        debug_assert!(k < len);
        self.data[offset + k]
    }

    fn time(&self, p: usize, c: usize, k: usize) -> f64 {
        let (offset, len) = self.span(p, c);
        debug_assert!(k < len);
        self.time[offset + k]
    }
}

/// An N-port S-parameter block in the DTIR formulation.
///
/// Preprocessing runs the causality enforcer per port pair, prunes
/// impulse-response entries below `fracMaxToKeep · max(1, max |h|)`
/// (always keeping index 0) and precomputes each port's Thevenin
/// constants. At simulation time the static stamp carries the resistive
/// network and instantaneous cross-couplings; the dynamic stamp adds the
/// convolution of the pruned response with the incident-wave history,
/// interpolated from prior solution columns.
#[derive(Debug, Clone)]
pub struct SParameterBlock {
    designator: String,
    ports: Vec<Port>,
    table: ImpulseTable,
    z_ref: f64,
}

impl SParameterBlock {
    /// Build from sampled S-parameters. `s[a][b][k]` is S_ab at frequency
    /// `freqs[k]`.
    pub fn from_sampled(
        designator: impl Into<String>,
        specs: Vec<PortSpec>,
        freqs: &[f64],
        s: &[Vec<Vec<Complex<f64>>>],
        z_ref: f64,
        frac_max_to_keep: f64,
    ) -> Self {
        let designator = designator.into();
        let num_ports = specs.len();
        let full_length = 2 * freqs.len() - 2;

        let mut table = ImpulseTable {
            num_ports,
            data: Vec::new(),
            time: Vec::new(),
            spans: vec![(0, 0); num_ports * num_ports],
        };

        for a in 0..num_ports {
            for b in 0..num_ports {
                let causal = force_causal(freqs, &s[a][b]);

                let mut threshold = 1.0_f64;
                for &entry in &causal.data {
                    threshold = threshold.max(entry.abs());
                }
                threshold *= frac_max_to_keep;

                let offset = table.data.len();
                for (n, &entry) in causal.data.iter().enumerate() {
                    if n == 0 || entry.abs() > threshold {
                        table.data.push(entry);
                        table.time.push(if n == 0 {
                            0.0
                        } else {
                            n as f64 * causal.ts - causal.tau
                        });
                    }
                }
                let kept = table.data.len() - offset;
                table.spans[a * num_ports + b] = (offset, kept);

                log::info!(
                    "{designator}: pruned {} of {} DTIR entries for pair ({a},{b}) below {threshold:e}",
                    full_length - kept,
                    full_length,
                );
            }
        }

        let ports = specs
            .iter()
            .enumerate()
            .map(|(a, &spec)| {
                let s0: Vec<f64> = (0..num_ports).map(|b| table.data(a, b, 0)).collect();
                let beta = 1.0 / (1.0 - table.data(a, a, 0));
                let r = beta * z_ref * (1.0 + table.data(a, a, 0));
                Port { spec, r, beta, s0 }
            })
            .collect();

        Self {
            designator,
            ports,
            table,
            z_ref,
        }
    }

    /// Build from a Touchstone file (reference impedance 50 Ω).
    pub fn from_touchstone(
        designator: impl Into<String>,
        specs: Vec<PortSpec>,
        path: &Path,
        frac_max_to_keep: f64,
    ) -> Result<Self> {
        let data = touchstone::load(path, specs.len())?;
        Ok(Self::from_sampled(
            designator,
            specs,
            &data.freqs,
            &data.s,
            data.z_ref,
            frac_max_to_keep,
        ))
    }

    /// Incident-wave value at `port` for the convolution, linearly
    /// interpolated between the two solution columns straddling
    /// `n − t/dt`. Samples at or before column 0, and samples whose upper
    /// neighbour would touch the in-progress column `n`, contribute zero.
    fn a_wave_conv_value(
        &self,
        port: usize,
        solution: &Matrix<f64>,
        n: usize,
        s_time_point: f64,
        dt: f64,
        size_g_a: usize,
    ) -> f64 {
        let index = n as f64 - s_time_point / dt;
        if index <= 0.0 {
            return 0.0;
        }

        let floor = index as usize;
        if floor == 0 || floor + 1 >= n {
            return 0.0;
        }
        let mix = index - floor as f64;

        let spec = &self.ports[port].spec;
        let mut upper = 0.0;
        let mut lower = 0.0;
        if let Some(i) = spec.positive.matrix_index() {
            upper += solution[(i, floor + 1)];
            lower += solution[(i, floor)];
        }
        if let Some(j) = spec.negative.matrix_index() {
            upper -= solution[(j, floor + 1)];
            lower -= solution[(j, floor)];
        }
        let current_row = size_g_a + spec.current_index - 1;
        let current = (solution[(current_row, floor + 1)] - solution[(current_row, floor)]) * mix
            + solution[(current_row, floor)];

        (upper - lower) * mix + lower + current * self.z_ref
    }

    /// Equivalent source voltage of port `p`: the convolution of every
    /// port's incident-wave history with the pruned response, scaled by
    /// `β_p`.
    fn v_p(&self, p: usize, solution: &Matrix<f64>, n: usize, dt: f64, size_g_a: usize) -> f64 {
        let mut sum = 0.0;
        for c in 0..self.ports.len() {
            for k in 1..self.table.len(p, c) {
                sum += self.a_wave_conv_value(c, solution, n, self.table.time(p, c, k), dt, size_g_a)
                    * self.table.data(p, c, k);
            }
        }
        self.ports[p].beta * sum
    }
}

impl Component for SParameterBlock {
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
            stamp.g[(row, row)] += -port.r;
            stamp.stamp_branch(
                port.spec.positive.matrix_index(),
                port.spec.negative.matrix_index(),
                row,
            );

            for (c, other) in self.ports.iter().enumerate() {
                if c == p {
                    continue;
                }
                let alpha = port.beta * port.s0[c];
                if let Some(i) = other.spec.positive.matrix_index() {
                    stamp.g[(row, i)] += -alpha;
                }
                if let Some(j) = other.spec.negative.matrix_index() {
                    stamp.g[(row, j)] += alpha;
                }
                let other_row = stamp.current_row(other.spec.current_index);
                stamp.g[(row, other_row)] += -self.z_ref * alpha;
            }
        }
    }

    fn add_dynamic_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, step: usize, dt: f64) {
        let size_g_a = stamp.size_g_a;
        for (p, port) in self.ports.iter().enumerate() {
            let row = stamp.current_row(port.spec.current_index);
            stamp.s[(row, 0)] += self.v_p(p, solution, step, dt, size_g_a);
        }
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, _num_currents: usize) {
        // the whole tail of the response participates at DC: the port
        // resistance and couplings are re-derived from the summed
        // response, and V_p is zero
        for (p, port) in self.ports.iter().enumerate() {
            let row = stamp.current_row(port.spec.current_index);

            let spp_sum: f64 = (0..self.table.len(p, p))
                .map(|k| self.table.data(p, p, k))
                .sum();
            let r_prime =
                port.beta * self.z_ref * (1.0 + spp_sum) / (1.0 - port.beta * spp_sum);
            stamp.g[(row, row)] += -r_prime;
            stamp.stamp_branch(
                port.spec.positive.matrix_index(),
                port.spec.negative.matrix_index(),
                row,
            );

            for (c, other) in self.ports.iter().enumerate() {
                if c == p {
                    continue;
                }
                let alpha = port.beta * port.s0[c];
                let tail: f64 = (0..self.table.len(p, c))
                    .map(|k| self.table.data(p, c, k))
                    .sum();
                let alpha_prime =
                    (port.beta * tail + alpha) / (1.0 - port.beta * spp_sum);

                if let Some(i) = other.spec.positive.matrix_index() {
                    stamp.g[(row, i)] += -alpha_prime;
                }
                if let Some(j) = other.spec.negative.matrix_index() {
                    stamp.g[(row, j)] += alpha_prime;
                }
                let other_row = stamp.current_row(other.spec.current_index);
                stamp.g[(row, other_row)] += -self.z_ref * alpha_prime;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 2-port whose S-matrix is `[[0, 1], [1, 0]]` at every frequency:
    /// an ideal thru connection.
    fn thru_block() -> SParameterBlock {
        let freqs: Vec<f64> = (0..5).map(|i| i as f64 * 1e9).collect();
        let one = vec![Complex::new(1.0, 0.0); 5];
        let zero = vec![Complex::new(0.0, 0.0); 5];
        let s = vec![vec![zero.clone(), one.clone()], vec![one, zero]];

        SParameterBlock::from_sampled(
            "S1",
            vec![
                PortSpec {
                    positive: NodeId::new(1),
                    negative: NodeId::GROUND,
                    current_index: 1,
                },
                PortSpec {
                    positive: NodeId::new(2),
                    negative: NodeId::GROUND,
                    current_index: 2,
                },
            ],
            &freqs,
            &s,
            50.0,
            0.01,
        )
    }

    #[test]
    fn test_thru_port_constants() {
        let block = thru_block();
        // S_pp = 0: beta = 1, R = z_ref
        assert!((block.ports[0].beta - 1.0).abs() < 1e-12);
        assert!((block.ports[0].r - 50.0).abs() < 1e-9);
        // the cross impulse response is a delta at index 0
        assert!((block.ports[0].s0[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pruning_keeps_index_zero() {
        let block = thru_block();
        // S11 response is identically zero but index 0 must survive
        assert_eq!(block.table.len(0, 0), 1);
        assert_eq!(block.table.data(0, 0, 0), 0.0);
        // the thru response collapses to the single delta tap
        assert_eq!(block.table.len(0, 1), 1);
    }

    #[test]
    fn test_static_stamp_layout() {
        let block = thru_block();
        let mut stamp = Stamp::new(2, 2);
        block.add_static_stamp(&mut stamp);

        // port 1 branch row: -R on the diagonal, ±1 wiring
        assert!((stamp.g[(2, 2)] + 50.0).abs() < 1e-9);
        assert_eq!(stamp.g[(0, 2)], 1.0);
        assert_eq!(stamp.g[(2, 0)], 1.0);

        // cross-coupling: alpha = beta * s0 = 1
        assert!((stamp.g[(2, 1)] + 1.0).abs() < 1e-9);
        assert!((stamp.g[(2, 3)] + 50.0).abs() < 1e-9);
        assert!((stamp.g[(3, 0)] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dc_stamp_resistance_for_delta_response() {
        // with a matched port (S_pp = 0 everywhere) the DC port
        // resistance reduces to z_ref, matching the static stamp
        let block = thru_block();
        let mut static_stamp = Stamp::new(2, 2);
        let mut dc_stamp = Stamp::new(2, 2);
        let sol = Matrix::zeros(4, 1);
        block.add_static_stamp(&mut static_stamp);
        block.add_dc_stamp(&mut dc_stamp, &sol, 2);

        assert!((dc_stamp.g[(2, 2)] + 50.0).abs() < 1e-9);
        assert!((dc_stamp.g[(2, 2)] - static_stamp.g[(2, 2)]).abs() < 1e-9);
        assert_eq!(dc_stamp.g[(0, 2)], 1.0);
        assert_eq!(dc_stamp.g[(2, 0)], 1.0);

        // the DC cross-alpha folds the summed tail on top of the
        // instantaneous tap: for a delta thru it is twice the static one
        assert!((dc_stamp.g[(2, 1)] + 2.0).abs() < 1e-9);
        // V_p is zero at DC
        assert_eq!(dc_stamp.s[(2, 0)], 0.0);
    }

    #[test]
    fn test_convolution_guards() {
        let block = thru_block();
        let mut sol = Matrix::zeros(4, 6);
        for n in 0..6 {
            sol[(0, n)] = 1.0; // constant incident voltage at port 1
        }
        let dt = 1e-10;

        // sample time far beyond the available history
        let v = block.a_wave_conv_value(0, &sol, 2, 1.0, dt, 2);
        assert_eq!(v, 0.0);

        // floor lands on column 0
        let v = block.a_wave_conv_value(0, &sol, 2, 1.5e-10, dt, 2);
        assert_eq!(v, 0.0);

        // floor + 1 would touch the in-progress column
        let v = block.a_wave_conv_value(0, &sol, 3, 0.5e-10, dt, 2);
        assert_eq!(v, 0.0);

        // a valid mid-history sample interpolates the wave
        let v = block.a_wave_conv_value(0, &sol, 5, 2.5e-10, dt, 2);
        assert!((v - 1.0).abs() < 1e-12);
    }
}
