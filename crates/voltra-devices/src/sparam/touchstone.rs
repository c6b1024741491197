//! Touchstone-like S-parameter file reader.
//!
//! Lines starting with `#` (option line) or `!` (comment) are skipped;
//! the option line is not interpreted, so frequencies are taken as given.
//! Each data row holds the frequency followed by `numPorts²` `(re, im)`
//! pairs in column-major port order; rows may wrap across physical lines.
//! The reference impedance is fixed at 50 Ω.

use std::fs;
use std::path::Path;

use num_complex::Complex;

use crate::error::{Error, Result};

/// Reference impedance assumed for Touchstone data.
pub const Z_REF: f64 = 50.0;

/// Sampled S-parameters on a uniform frequency grid.
#[derive(Debug, Clone)]
pub struct TouchstoneData {
    pub freqs: Vec<f64>,
    /// `s[a][b][k]` is S_ab at frequency sample `k`.
    pub s: Vec<Vec<Vec<Complex<f64>>>>,
    pub z_ref: f64,
}

/// Load an `num_ports`-port Touchstone file.
pub fn load(path: &Path, num_ports: usize) -> Result<TouchstoneData> {
    let text = fs::read_to_string(path).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })?;

    let mut numbers = text
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.starts_with('#') && !trimmed.starts_with('!')
        })
        .flat_map(str::split_whitespace)
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| Error::format(path, format!("not a number: {token:?}")))
        });

    let mut freqs = Vec::new();
    let mut s = vec![vec![Vec::new(); num_ports]; num_ports];

    while let Some(freq) = numbers.next() {
        freqs.push(freq?);
        // column-major: the row-index port varies fastest
        for b in 0..num_ports {
            for a in 0..num_ports {
                let re = numbers
                    .next()
                    .ok_or_else(|| Error::format(path, "truncated S-parameter row"))??;
                let im = numbers
                    .next()
                    .ok_or_else(|| Error::format(path, "truncated S-parameter row"))??;
                s[a][b].push(Complex::new(re, im));
            }
        }
    }

    if freqs.len() < 2 {
        return Err(Error::format(path, "need at least two frequency samples"));
    }

    Ok(TouchstoneData {
        freqs,
        s,
        z_ref: Z_REF,
    })
}
