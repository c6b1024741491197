//! Independent sources: DC, sinusoidal and time-series driven.

use std::fs;
use std::path::Path;

use voltra_core::{Component, NodeId, Stamp};
use voltra_maths::Matrix;

use crate::error::{Error, Result};

/// An ideal DC current source. Current flows through the source from `n1`
/// to `n2`, i.e. it pushes current into `n2`.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    value: f64,
}

impl CurrentSource {
    pub fn new(designator: impl Into<String>, n1: NodeId, n2: NodeId, value: f64) -> Self {
        Self {
            designator: designator.into(),
            n1,
            n2,
            value,
        }
    }
}

impl Component for CurrentSource {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn add_static_stamp(&self, stamp: &mut Stamp) {
        stamp.add_rhs(self.n1.matrix_index(), self.n2.matrix_index(), -self.value);
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, _num_currents: usize) {
        self.add_static_stamp(stamp);
    }
}

/// An ideal DC voltage source with its own branch-current unknown.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    value: f64,
    current_index: usize,
}

impl VoltageSource {
    pub fn new(
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
        }
    }
}

impl Component for VoltageSource {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn add_static_stamp(&self, stamp: &mut Stamp) {
        let row = stamp.current_row(self.current_index);
        stamp.stamp_branch(self.n1.matrix_index(), self.n2.matrix_index(), row);
        stamp.s[(row, 0)] += self.value;
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, _num_currents: usize) {
        self.add_static_stamp(stamp);
    }
}

/// A sinusoidal voltage source: `offset + V·sin(2π·f·t + φ)`, with the
/// phase given in degrees.
#[derive(Debug, Clone)]
pub struct SinusoidalVoltageSource {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    current_index: usize,
    amplitude: f64,
    frequency: f64,
    offset: f64,
    phase_degrees: f64,
}

impl SinusoidalVoltageSource {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        designator: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        amplitude: f64,
        frequency: f64,
        offset: f64,
        phase_degrees: f64,
        current_index: usize,
    ) -> Self {
        Self {
            designator: designator.into(),
            n1,
            n2,
            current_index,
            amplitude,
            frequency,
            offset,
            phase_degrees,
        }
    }

    fn value_at(&self, t: f64) -> f64 {
        self.offset
            + self.amplitude
                * (2.0 * std::f64::consts::PI * self.frequency * t
                    + std::f64::consts::PI * self.phase_degrees / 180.0)
                    .sin()
    }
}

impl Component for SinusoidalVoltageSource {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn add_dynamic_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, step: usize, dt: f64) {
        let row = stamp.current_row(self.current_index);
        stamp.stamp_branch(self.n1.matrix_index(), self.n2.matrix_index(), row);
        stamp.s[(row, 0)] += self.value_at(step as f64 * dt);
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, _num_currents: usize) {
        // the waveform evaluated at t = 0
        self.add_dynamic_stamp(stamp, solution, 0, 0.0);
    }
}

/// A voltage source driven by tabulated `(t, v)` samples.
///
/// The table is extended periodically (`t mod t_last`) and linearly
/// interpolated between samples. A cursor into the table is cached and
/// advanced once per accepted time step so the per-stamp search is O(1)
/// for monotone time.
#[derive(Debug, Clone)]
pub struct TimeSeriesVoltageSource {
    designator: String,
    n1: NodeId,
    n2: NodeId,
    current_index: usize,
    times: Vec<f64>,
    values: Vec<f64>,
    cursor: usize,
}

impl TimeSeriesVoltageSource {
    pub fn new(
        designator: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        times: Vec<f64>,
        values: Vec<f64>,
        current_index: usize,
    ) -> Self {
        assert_eq!(times.len(), values.len());
        assert!(times.len() >= 2, "a time series needs at least two samples");
        Self {
            designator: designator.into(),
            n1,
            n2,
            current_index,
            times,
            values,
            cursor: 0,
        }
    }

    /// Load samples from a text file. Lines not starting with a digit are
    /// skipped; each remaining line holds a time and a value separated by
    /// whitespace, comma or semicolon. Times are scaled by `timescale`.
    pub fn from_file(
        designator: impl Into<String>,
        n1: NodeId,
        n2: NodeId,
        timescale: f64,
        path: &Path,
        current_index: usize,
    ) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;

        let mut times = Vec::new();
        let mut values = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim_start();
            if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            let mut fields = trimmed
                .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .filter(|f| !f.is_empty());
            let time = fields
                .next()
                .and_then(|f| f.parse::<f64>().ok())
                .ok_or_else(|| Error::format(path, format!("bad time sample: {line:?}")))?;
            let value = fields
                .next()
                .and_then(|f| f.parse::<f64>().ok())
                .ok_or_else(|| Error::format(path, format!("bad value sample: {line:?}")))?;
            times.push(time * timescale);
            values.push(value);
        }

        if times.len() < 2 {
            return Err(Error::format(path, "time series needs at least two samples"));
        }
        Ok(Self::new(designator, n1, n2, times, values, current_index))
    }

    fn wrapped_time(&self, t: f64) -> f64 {
        t % *self.times.last().expect("non-empty series")
    }

    /// Advance `from` until it brackets `t_mod`, wrapping at the end.
    fn seek(&self, mut from: usize, t_mod: f64) -> usize {
        let len = self.times.len();
        while t_mod > self.times[(from + 1) % len]
            || (from != 0 && t_mod < self.times[from - 1])
        {
            from = (from + 1) % len;
        }
        from
    }

    fn lerp(&self, low: usize, t: f64) -> f64 {
        let len = self.times.len();
        let dt = self.times[(low + 1) % len] - self.times[low];
        let dv = self.values[(low + 1) % len] - self.values[low];
        self.values[low] + dv * (t - self.times[low]) / dt
    }

    fn value_at(&self, t: f64) -> f64 {
        let t_mod = self.wrapped_time(t);
        let low = self.seek(self.cursor, t_mod);
        self.lerp(low, t_mod)
    }
}

impl Component for TimeSeriesVoltageSource {
    fn designator(&self) -> &str {
        &self.designator
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.n1, self.n2]
    }

    fn add_dynamic_stamp(&self, stamp: &mut Stamp, _solution: &Matrix<f64>, step: usize, dt: f64) {
        let row = stamp.current_row(self.current_index);
        stamp.stamp_branch(self.n1.matrix_index(), self.n2.matrix_index(), row);
        stamp.s[(row, 0)] += self.value_at(step as f64 * dt);
    }

    fn update_state(&mut self, _solution: &Matrix<f64>, step: usize, dt: f64, _size_g_a: usize) {
        let t_mod = self.wrapped_time(step as f64 * dt);
        self.cursor = self.seek(self.cursor, t_mod);
    }

    fn add_dc_stamp(&self, stamp: &mut Stamp, solution: &Matrix<f64>, _num_currents: usize) {
        self.add_dynamic_stamp(stamp, solution, 0, 0.0);
    }
}
