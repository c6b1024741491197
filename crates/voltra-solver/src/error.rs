//! Error types for voltra-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("singular MNA matrix in DC analysis (iteration {iteration})")]
    SingularDc { iteration: usize },

    #[error("singular MNA matrix at time step {step} (t = {time:e} s)")]
    SingularTransient { step: usize, time: f64 },

    #[error(transparent)]
    Maths(#[from] voltra_maths::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
