//! S-parameter block elements.
//!
//! Two formulations of the same idea, embedding a frequency-domain N-port
//! into a time-domain MNA solve:
//!
//! - [`dtir::SParameterBlock`] inverse-transforms the sampled response
//!   into a pruned discrete-time impulse response and convolves it with
//!   the port's incident-wave history each step.
//! - [`pole_residue::SParameterBlockPR`] uses a pole–residue fit of the
//!   response and advances one complex state per pole per step, trading
//!   the convolution for a recursive update.
//!
//! Both present each port as a Thevenin source: a resistance `R_p` and
//! controlled couplings in the static stamp, plus a history-dependent
//! source voltage `V_p` in the dynamic stamp.

pub mod dtir;
pub mod pole_residue;
pub mod touchstone;

use voltra_core::NodeId;

/// Where a port of an S-parameter block connects and which branch current
/// it owns.
#[derive(Debug, Clone, Copy)]
pub struct PortSpec {
    pub positive: NodeId,
    pub negative: NodeId,
    /// 1-based branch-current index.
    pub current_index: usize,
}
