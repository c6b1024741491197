//! Netlist parsing for the Voltra simulator.
//!
//! The netlist is line-oriented UTF-8 text. Lines beginning with `%` are
//! comments, lines beginning with `.` are directives, and every other
//! non-empty line describes one element: a type prefix, a designator
//! suffix, then whitespace-separated fields. Node `0` is the reference.
//!
//! ```text
//! % half-wave clipper
//! VS1 1 0 2 1000 0 0
//! R1 1 2 1000
//! D1 2 0
//! .transient(0, 2e-3, 1e-6)
//! .graph(2)
//! .outputFile("clipper.tsv")
//! ```
//!
//! Parsing produces a [`voltra_core::Circuit`] with every element placed
//! in its stratum and all current unknowns allocated, plus the
//! [`Analysis`] commands for the driver. Data files referenced by
//! elements (Touchstone, pole–residue tables, time series) are loaded
//! here as well, with relative paths resolved against the netlist's
//! directory.

pub mod error;
pub mod netlist;

pub use error::{Error, Result};
pub use netlist::{parse, Analysis, ParsedNetlist, TransientCommand};
