//! Core circuit representation for the Voltra simulator.
//!
//! The abstractions here connect the numeric layer to the device models:
//!
//! - [`NodeId`]: a circuit node; node 0 is the ground/reference and is not
//!   part of the matrix (its row is implied by KCL).
//! - [`Stamp`](stamp::Stamp): the preallocated `(G, s)` pair all elements
//!   accumulate into. `G` is partitioned into a group-I block (node
//!   voltages) and a group-II block (explicit branch currents).
//! - [`Component`](component::Component): the polymorphic element
//!   contract: static, dynamic, non-linear and DC stamp hooks plus the
//!   per-step state updates.
//! - [`CircuitElements`](elements::CircuitElements): owns every element,
//!   partitioned into static/dynamic/non-linear strata, and caches three
//!   levels of assembled stamp so a Newton–Raphson iteration only redoes
//!   the non-linear layer.
//! - [`Circuit`](circuit::Circuit): registry plus unknown counters; what
//!   the netlist parser hands to the solver.
//!
//! # Modified Nodal Analysis
//!
//! The system solved each step is `G·x = s` where `x` stacks the node
//! voltages (group I) over the branch currents of voltage-source-like
//! elements (group II). Every element contributes *additively* to `G` and
//! `s`; combining two elements equals summing their isolated stamps, which
//! is what makes the layered stamp caching sound.

pub mod circuit;
pub mod component;
pub mod elements;
pub mod node;
pub mod stamp;

pub use circuit::Circuit;
pub use component::{branch_voltage, Component};
pub use elements::{CacheState, CircuitElements, Stratum};
pub use node::NodeId;
pub use stamp::Stamp;
