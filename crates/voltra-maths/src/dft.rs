//! Discrete Fourier transforms.
//!
//! The causality pipeline inverse-transforms Hermitian spectra of length
//! `2F − 2`, which is generally not a power of two, so [`dft`] and [`idft`]
//! are direct O(n²) evaluations valid for any length. [`fft`] / [`ifft`]
//! are radix-2 decimation-in-time variants for power-of-two lengths.
//!
//! Conventions: forward transforms use `exp(−j·2π·kn/N)`; inverse
//! transforms use the conjugate kernel and divide by `N`.

use num_complex::Complex;
use std::f64::consts::PI;

/// `exp(−j·2π·numerator/denominator)`.
fn root_of_unity(numerator: f64, denominator: usize) -> Complex<f64> {
    Complex::new(0.0, -2.0 * PI * numerator / denominator as f64).exp()
}

/// Direct DFT of a real sequence, any length.
pub fn dft(input: &[f64]) -> Vec<Complex<f64>> {
    let len = input.len();
    let mut out = vec![Complex::new(0.0, 0.0); len];
    for (k, bin) in out.iter_mut().enumerate() {
        for (n, &x) in input.iter().enumerate() {
            *bin += x * root_of_unity((k * n) as f64, len);
        }
    }
    out
}

/// Direct inverse DFT, any length.
pub fn idft(input: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let len = input.len();
    let mut out = vec![Complex::new(0.0, 0.0); len];
    for (n, sample) in out.iter_mut().enumerate() {
        for (k, &bin) in input.iter().enumerate() {
            *sample += bin * root_of_unity(-((k * n) as f64), len);
        }
        *sample /= len as f64;
    }
    out
}

/// Radix-2 FFT of a real sequence.
///
/// # Panics
/// Panics if the length is not a power of two.
pub fn fft(input: &[f64]) -> Vec<Complex<f64>> {
    assert!(
        input.len().is_power_of_two(),
        "radix-2 FFT requires a power-of-two length, got {}",
        input.len()
    );
    let complex: Vec<Complex<f64>> = input.iter().map(|&x| Complex::new(x, 0.0)).collect();
    radix2(&complex, 1.0)
}

/// Radix-2 inverse FFT.
///
/// # Panics
/// Panics if the length is not a power of two.
pub fn ifft(input: &[Complex<f64>]) -> Vec<Complex<f64>> {
    assert!(
        input.len().is_power_of_two(),
        "radix-2 FFT requires a power-of-two length, got {}",
        input.len()
    );
    let len = input.len();
    let mut out = radix2(input, -1.0);
    for sample in &mut out {
        *sample /= len as f64;
    }
    out
}

/// Decimation-in-time butterfly. `dir` is +1 for forward, −1 for inverse.
fn radix2(input: &[Complex<f64>], dir: f64) -> Vec<Complex<f64>> {
    let len = input.len();
    if len == 1 {
        return vec![input[0]];
    }

    let even: Vec<Complex<f64>> = input.iter().step_by(2).copied().collect();
    let odd: Vec<Complex<f64>> = input.iter().skip(1).step_by(2).copied().collect();
    let even = radix2(&even, dir);
    let odd = radix2(&odd, dir);

    let mut out = vec![Complex::new(0.0, 0.0); len];
    for i in 0..len / 2 {
        let twiddle = root_of_unity(dir * i as f64, len) * odd[i];
        out[i] = even[i] + twiddle;
        out[i + len / 2] = even[i] - twiddle;
    }
    out
}
