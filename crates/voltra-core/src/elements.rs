//! The element registry and its layered stamp caches.

use std::collections::BTreeMap;

use voltra_maths::Matrix;

use crate::component::Component;
use crate::node::NodeId;
use crate::stamp::Stamp;

/// How much of the layered stamp cache is currently valid.
///
/// The levels form a ladder: each level implies the ones below it, and
/// every invalidation in the driver is a downward [`demote`]. Between
/// Newton–Raphson iterations only the non-linear layer is discarded
/// (`DynamicFresh`); between time steps the dynamic layer goes too
/// (`StaticFresh`); a structural change drops everything (`Stale`).
///
/// [`demote`]: CircuitElements::demote
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheState {
    Stale,
    StaticFresh,
    DynamicFresh,
    NonLinearFresh,
}

/// Which of the three ordered element collections an element lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stratum {
    Static,
    Dynamic,
    NonLinear,
}

/// Owns every circuit element and the four preallocated stamps.
///
/// Elements are partitioned into three strata visited in insertion order:
/// purely static elements, dynamic (time/history-dependent) elements and
/// non-linear elements. Each stratum may contribute a static skeleton, so
/// the static pass visits all three.
#[derive(Debug, Default)]
pub struct CircuitElements {
    static_elements: Vec<Box<dyn Component>>,
    dynamic_elements: Vec<Box<dyn Component>>,
    nonlinear_elements: Vec<Box<dyn Component>>,

    static_stamp: Stamp,
    dynamic_stamp: Stamp,
    nonlinear_stamp: Stamp,
    dc_stamp: Stamp,

    freshness: CacheState,

    /// Node → elements-touching-it back-references for diagnostics. The
    /// registry owns the elements; this map must not, so it stores
    /// `(stratum, index)` pairs.
    node_map: BTreeMap<NodeId, Vec<(Stratum, usize)>>,
}

impl Default for CacheState {
    fn default() -> Self {
        CacheState::Stale
    }
}

impl CircuitElements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements across all strata.
    pub fn len(&self) -> usize {
        self.static_elements.len() + self.dynamic_elements.len() + self.nonlinear_elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn freshness(&self) -> CacheState {
        self.freshness
    }

    pub fn add_static(&mut self, component: Box<dyn Component>) {
        self.register_nodes(Stratum::Static, self.static_elements.len(), component.as_ref());
        self.static_elements.push(component);
        self.freshness = CacheState::Stale;
    }

    pub fn add_dynamic(&mut self, component: Box<dyn Component>) {
        self.register_nodes(Stratum::Dynamic, self.dynamic_elements.len(), component.as_ref());
        self.dynamic_elements.push(component);
        self.freshness = CacheState::Stale;
    }

    pub fn add_nonlinear(&mut self, component: Box<dyn Component>) {
        self.register_nodes(
            Stratum::NonLinear,
            self.nonlinear_elements.len(),
            component.as_ref(),
        );
        self.nonlinear_elements.push(component);
        self.freshness = CacheState::Stale;
    }

    fn register_nodes(&mut self, stratum: Stratum, index: usize, component: &dyn Component) {
        for node in component.nodes() {
            self.node_map.entry(node).or_default().push((stratum, index));
        }
    }

    /// The elements connected to `node`, for diagnostics.
    pub fn components_at(&self, node: NodeId) -> Vec<&dyn Component> {
        self.node_map
            .get(&node)
            .map(|refs| {
                refs.iter()
                    .map(|&(stratum, index)| match stratum {
                        Stratum::Static => self.static_elements[index].as_ref(),
                        Stratum::Dynamic => self.dynamic_elements[index].as_ref(),
                        Stratum::NonLinear => self.nonlinear_elements[index].as_ref(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resize all four stamps for a netlist with the given unknown counts.
    /// Invalidates every cache level.
    pub fn set_stamp_size(
        &mut self,
        num_nodes: usize,
        num_currents: usize,
        num_dc_currents: usize,
    ) {
        self.static_stamp = Stamp::new(num_nodes, num_currents);
        self.dynamic_stamp = Stamp::new(num_nodes, num_currents);
        self.nonlinear_stamp = Stamp::new(num_nodes, num_currents);
        self.dc_stamp = Stamp::new(num_nodes, num_currents + num_dc_currents);
        self.freshness = CacheState::Stale;
    }

    /// Drop the cache down to at most `level`.
    pub fn demote(&mut self, level: CacheState) {
        self.freshness = self.freshness.min(level);
    }

    /// Rebuild the static stamp from every element's static contribution.
    pub fn generate_static_stamp(&mut self) -> &Stamp {
        self.static_stamp.clear();
        for component in &self.static_elements {
            component.add_static_stamp(&mut self.static_stamp);
        }
        for component in &self.dynamic_elements {
            component.add_static_stamp(&mut self.static_stamp);
        }
        for component in &self.nonlinear_elements {
            component.add_static_stamp(&mut self.static_stamp);
        }
        self.freshness = CacheState::StaticFresh;
        &self.static_stamp
    }

    /// Static stamp plus the dynamic contributions for time step `step`.
    pub fn generate_dynamic_stamp(
        &mut self,
        solution: &Matrix<f64>,
        step: usize,
        dt: f64,
    ) -> &Stamp {
        if self.freshness < CacheState::StaticFresh {
            self.generate_static_stamp();
        }
        self.dynamic_stamp.copy_from(&self.static_stamp);
        for component in &self.dynamic_elements {
            component.add_dynamic_stamp(&mut self.dynamic_stamp, solution, step, dt);
        }
        for component in &self.nonlinear_elements {
            component.add_dynamic_stamp(&mut self.dynamic_stamp, solution, step, dt);
        }
        self.freshness = CacheState::DynamicFresh;
        &self.dynamic_stamp
    }

    /// Dynamic stamp plus the non-linear contributions linearised at the
    /// current iterate (column `step`).
    pub fn generate_nonlinear_stamp(
        &mut self,
        solution: &Matrix<f64>,
        step: usize,
        dt: f64,
    ) -> &Stamp {
        if self.freshness < CacheState::DynamicFresh {
            self.generate_dynamic_stamp(solution, step, dt);
        }
        self.nonlinear_stamp.copy_from(&self.dynamic_stamp);
        for component in &self.nonlinear_elements {
            component.add_nonlinear_stamp(&mut self.nonlinear_stamp, solution, step, dt);
        }
        self.freshness = CacheState::NonLinearFresh;
        &self.nonlinear_stamp
    }

    /// Rebuild the DC stamp from scratch. The DC stamp is not cached; the
    /// DC loop regenerates it every iteration.
    pub fn generate_dc_stamp(&mut self, solution: &Matrix<f64>, num_currents: usize) -> &Stamp {
        self.dc_stamp.clear();
        for component in &self.static_elements {
            component.add_dc_stamp(&mut self.dc_stamp, solution, num_currents);
        }
        for component in &self.dynamic_elements {
            component.add_dc_stamp(&mut self.dc_stamp, solution, num_currents);
        }
        for component in &self.nonlinear_elements {
            component.add_dc_stamp(&mut self.dc_stamp, solution, num_currents);
        }
        &self.dc_stamp
    }

    /// Advance element state after time step `step` converged, and drop
    /// the dynamic and non-linear cache layers.
    pub fn update_time_step(&mut self, solution: &Matrix<f64>, step: usize, dt: f64) {
        self.demote(CacheState::StaticFresh);
        let size_g_a = self.static_stamp.size_g_a;
        for component in &mut self.dynamic_elements {
            component.update_state(solution, step, dt, size_g_a);
        }
        for component in &mut self.nonlinear_elements {
            component.update_state(solution, step, dt, size_g_a);
        }
    }

    /// Propagate the DC solution into element state (inductor initial
    /// currents, non-linear capacitor initial voltages, ...).
    pub fn update_dc_state(&mut self, solution: &Matrix<f64>, num_currents: usize) {
        let size_g_a = self.dc_stamp.size_g_a;
        for component in &mut self.static_elements {
            component.update_dc_state(solution, size_g_a, num_currents);
        }
        for component in &mut self.dynamic_elements {
            component.update_dc_state(solution, size_g_a, num_currents);
        }
        for component in &mut self.nonlinear_elements {
            component.update_dc_state(solution, size_g_a, num_currents);
        }
    }

    /// Push the simulation timestep into every element.
    pub fn set_timestep(&mut self, dt: f64) {
        for component in &mut self.static_elements {
            component.set_timestep(dt);
        }
        for component in &mut self.dynamic_elements {
            component.set_timestep(dt);
        }
        for component in &mut self.nonlinear_elements {
            component.set_timestep(dt);
        }
    }

    pub fn static_stamp(&self) -> &Stamp {
        &self.static_stamp
    }

    pub fn dc_stamp(&self) -> &Stamp {
        &self.dc_stamp
    }
}
