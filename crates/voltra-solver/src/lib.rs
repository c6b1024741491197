//! Simulation drivers for the Voltra circuit simulator.
//!
//! Two phases, both driving the element registry's cached stamps through
//! the dense LU solver:
//!
//! - [`dc`]: the DC operating point: a fixed-iteration Newton loop over
//!   the DC stamp, with inductors shorted through extra current unknowns
//!   that exist only in this phase. The result seeds column 0 of the
//!   solution matrix and the elements' initial state.
//! - [`transient`]: the time loop: per step, Newton–Raphson around the
//!   non-linear stamp with the factorisation and scratch buffers reused
//!   across all iterations.
//!
//! [`Simulation`] owns the solution matrix and the solver workspaces and
//! sequences the two phases.

pub mod dc;
pub mod error;
pub mod simulation;
pub mod transient;

pub use error::{Error, Result};
pub use simulation::Simulation;
pub use transient::TransientParams;
