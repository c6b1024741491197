//! The assembled circuit: element registry plus unknown counters.

use crate::elements::CircuitElements;
use crate::node::NodeId;

/// A parsed circuit ready for simulation.
///
/// Tracks the three unknown counts the MNA system is sized from: node
/// voltages (group I), transient branch currents (group II) and the extra
/// branch currents that exist only during DC analysis (inductors become
/// shorts there). Current indices are handed out 1-based, matching the
/// `−1` offset convention used by every stamp.
#[derive(Debug)]
pub struct Circuit {
    pub elements: CircuitElements,
    num_nodes: usize,
    num_currents: usize,
    num_dc_currents: usize,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    pub fn new() -> Self {
        Self {
            elements: CircuitElements::new(),
            // an empty netlist still sizes one node
            num_nodes: 1,
            num_currents: 0,
            num_dc_currents: 0,
        }
    }

    /// Number of node-voltage unknowns.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of transient branch-current unknowns.
    pub fn num_currents(&self) -> usize {
        self.num_currents
    }

    /// Number of DC-only branch-current unknowns.
    pub fn num_dc_currents(&self) -> usize {
        self.num_dc_currents
    }

    /// Dimension of the transient MNA system.
    pub fn size(&self) -> usize {
        self.num_nodes + self.num_currents
    }

    /// Raise the node count to cover `node`.
    pub fn register_node(&mut self, node: NodeId) {
        self.num_nodes = self.num_nodes.max(node.as_u32() as usize);
    }

    /// Allocate the next transient branch-current unknown (1-based).
    pub fn allocate_current(&mut self) -> usize {
        self.num_currents += 1;
        self.num_currents
    }

    /// Allocate the next DC-only branch-current unknown (1-based).
    pub fn allocate_dc_current(&mut self) -> usize {
        self.num_dc_currents += 1;
        self.num_dc_currents
    }

    /// Size the registry's stamps from the final unknown counts. Call once
    /// after the last element is added.
    pub fn finalise(&mut self) {
        self.elements
            .set_stamp_size(self.num_nodes, self.num_currents, self.num_dc_currents);
    }
}
