//! Causality enforcement for sampled frequency responses.
//!
//! A tabulated S-parameter is rarely exactly causal: its phase does not
//! quite correspond to any realisable delay, and naively mirroring and
//! inverse-transforming it produces an impulse response with energy at
//! negative time. The fix implemented here finds a residual group delay
//! `tau` such that the de-phased response
//!
//! ```text
//! F_i = (h_i − k) · exp(−j·2π·f_i·tau)
//! ```
//!
//! is numerically real at the last (Nyquist) sample, mirrors the result
//! into a Hermitian-symmetric length `2F − 2` spectrum, and inverse-DFTs
//! it into a real impulse response sampled at `Ts = 1/((2F−2)·Δf)`. The
//! constant `k` is chosen so the DC value of the causal response equals
//! `k` itself.
//!
//! `tau` is found by Newton iteration with a finite-difference slope on
//! the weighted-real-part zero condition `f0(tau) = 0`.

use num_complex::Complex;
use std::f64::consts::PI;

use crate::dft::idft;

/// Convergence tolerance on `f0(tau)²`.
const TAU_TOLERANCE: f64 = 1e-7;
/// Iteration cap for the `tau` search.
const TAU_MAX_ITERATIONS: usize = 30;
/// Finite-difference step for the `f0` slope.
const TAU_FD_STEP: f64 = 1e-8;
/// Below this imaginary part at the last sample the response counts as
/// already phase-consistent and `tau` is pinned to zero.
const IMAG_THRESHOLD: f64 = 1e-5;

/// A causal discrete-time impulse response.
#[derive(Debug, Clone)]
pub struct CausalData {
    /// Residual group delay removed from the response.
    pub tau: f64,
    /// Sample spacing of `data`: `1/((2F−2)·Δf)`.
    pub ts: f64,
    /// Real impulse response, length `2F − 2`.
    pub data: Vec<f64>,
}

/// De-phased response sample `F_i`.
fn de_phased(freq: &[f64], data: &[Complex<f64>], tau: f64, k: f64, i: usize) -> Complex<f64> {
    (data[i] - k) * Complex::new(0.0, -2.0 * PI * freq[i] * tau).exp()
}

/// DC offset `k` making the causal response's DC value equal `k`.
fn dc_offset(freq: &[f64], data: &[Complex<f64>], tau: f64) -> f64 {
    let last = *data.last().expect("empty response");
    let f_last = *freq.last().expect("empty grid");
    last.re - last.im / (2.0 * PI * f_last * tau).tan()
}

/// Zero condition for the `tau` search: a trapezoid-weighted sum of the
/// real parts of the de-phased spectrum.
fn f0(freq: &[f64], data: &[Complex<f64>], tau: f64) -> f64 {
    let count = freq.len();
    let k = dc_offset(freq, data, tau);
    let mut sum = de_phased(freq, data, tau, k, 0).re;
    for i in 1..count - 1 {
        sum += 2.0 * de_phased(freq, data, tau, k, i).re;
    }
    sum += de_phased(freq, data, tau, k, count - 1).re;
    sum * 1e3 / (2 * count - 2) as f64
}

/// Find the group delay by Newton iteration on `f0(tau) = 0`.
pub fn group_delay(freq: &[f64], data: &[Complex<f64>]) -> f64 {
    let mut guess = 1e-8;
    for _ in 0..TAU_MAX_ITERATIONS {
        let current = f0(freq, data, guess);
        if current * current < TAU_TOLERANCE {
            break;
        }
        let slope = (f0(freq, data, guess + TAU_FD_STEP) - current) / TAU_FD_STEP;
        guess -= current / slope;
    }
    guess
}

/// Enforce causality on `F` equidistant samples of a frequency response.
///
/// Returns the group delay, the time-domain sample spacing and the real
/// impulse response of length `2F − 2`. If the last sample is already
/// numerically real the search is skipped and `tau = 0`.
pub fn force_causal(freq: &[f64], data: &[Complex<f64>]) -> CausalData {
    let count = freq.len();
    assert!(count >= 2, "need at least two frequency samples");
    let length = 2 * count - 2;
    let ts = 1.0 / (length as f64 * (freq[1] - freq[0]));

    let mut hermitian = vec![Complex::new(0.0, 0.0); length];
    let already_real = data.last().expect("empty response").im.abs() < IMAG_THRESHOLD;

    let (tau, k) = if already_real {
        for i in 0..count - 1 {
            hermitian[i] = data[i];
        }
        for i in 1..count {
            hermitian[length - i] = data[i].conj();
        }
        (0.0, 0.0)
    } else {
        let tau = group_delay(freq, data);
        let k = dc_offset(freq, data, tau);
        for i in 0..count - 1 {
            hermitian[i] = de_phased(freq, data, tau, k, i);
        }
        for i in 1..count {
            hermitian[length - i] = de_phased(freq, data, tau, k, i).conj();
        }
        (tau, k)
    };

    let impulse = idft(&hermitian);
    let mut out = CausalData {
        tau,
        ts,
        data: impulse.iter().map(|c| c.re).collect(),
    };
    if !already_real {
        out.data[0] = k;
    }
    out
}
