//! Circuit element models for the Voltra simulator.
//!
//! Every element implements [`voltra_core::Component`] and participates in
//! the stamp layers it needs:
//!
//! | Element | static | dynamic | non-linear | DC |
//! |---|---|---|---|---|
//! | [`Resistor`] | ✓ | | | same as static |
//! | [`VoltageSource`], [`CurrentSource`] | ✓ | | | same as static |
//! | [`SinusoidalVoltageSource`], [`TimeSeriesVoltageSource`] | | ✓ | | waveform at `t = 0` |
//! | [`Capacitor`], [`Inductor`] | | ✓ | | open / short |
//! | [`Diode`], [`Npn`], [`Pnp`], [`Nmos`], [`NonLinearCapacitor`], [`CobraSource`] | | | ✓ | linearised at column 0 |
//! | [`SParameterBlock`] | ✓ | ✓ | | reduced DC network |
//! | [`SParameterBlockPR`] | ✓ | ✓ | | reduced DC network |
//!
//! Non-linear junction models clamp their controlling voltages at a
//! per-device critical voltage so `exp` cannot overflow; that is the only
//! in-device error recovery, everything else surfaces as [`Error`].

pub mod bjt;
pub mod cobra;
pub mod diode;
pub mod error;
pub mod nl_capacitor;
pub mod nmos;
pub mod passive;
pub mod sources;
pub mod sparam;

pub use bjt::{BjtParams, Npn, Pnp};
pub use cobra::CobraSource;
pub use diode::{Diode, DiodeParams};
pub use error::{Error, Result};
pub use nl_capacitor::NonLinearCapacitor;
pub use nmos::{Nmos, NmosParams};
pub use passive::{Capacitor, Inductor, Resistor};
pub use sources::{
    CurrentSource, SinusoidalVoltageSource, TimeSeriesVoltageSource, VoltageSource,
};
pub use sparam::dtir::SParameterBlock;
pub use sparam::pole_residue::SParameterBlockPR;
pub use sparam::PortSpec;
