//! Numeric foundations for the Voltra circuit simulator.
//!
//! This crate carries the dense linear algebra the MNA engine is built on,
//! plus the supporting numerics that do not know anything about circuits:
//!
//! - [`Matrix`] / [`LuPair`]: row-major dense storage with an in-place
//!   partial-pivoting LU factorisation and forward/back substitution. All
//!   solve buffers are caller-owned so the Newton–Raphson loop can factor
//!   and solve thousands of times without allocating.
//! - [`autodiff::DiffVar`]: forward-mode dual numbers with a fixed number
//!   of partials, used by the strongly non-linear device models to obtain
//!   value and Jacobian in a single evaluation.
//! - [`dft`]: plain and radix-2 Fourier transforms. The causality pipeline
//!   works on length `2F - 2` spectra which are rarely a power of two, so
//!   the O(n²) transforms are first-class here, not a fallback.
//! - [`causal`]: turns a sampled frequency response into a causal,
//!   real-valued discrete-time impulse response plus a group delay.
//!
//! Matrix scalars are generic over [`Scalar`], implemented for `f64` and
//! `Complex<f64>`; pivot selection always compares magnitudes, which is the
//! modulus for complex values.

pub mod autodiff;
pub mod causal;
pub mod dft;
pub mod error;
pub mod matrix;

pub use error::{Error, Result};
pub use matrix::{LuPair, Matrix, Scalar};
