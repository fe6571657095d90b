//! The difference-logic propagator: bridges the host solver's callbacks to
//! the incremental graph, maintains the per-thread trails and translates
//! negative cycles into learnt clauses.

use crate::collections::ref_store::RefPool;
use crate::core::{EdgeId, IntCst, Lit, VertexId};
use crate::graph::{DifferenceLogicGraph, Edge, EdgeTable, GraphConfig};
use crate::solver::{PropagateControl, PropagateInit, Propagator};
use crate::stats::{Stats, ThreadStats};
use crate::theory::{DiffAtom, TheoryError, DIFF_ATOM, SHOW_ASSIGNMENT_ATOM};
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Data shared by all solver threads, immutable once initialization is done.
#[derive(Default)]
struct Shared {
    edges: EdgeTable,
    vertices: RefPool<VertexId, String>,
    /// The edges gated by each solver literal. A literal may gate several
    /// edges when distinct atoms were mapped to the same solver literal.
    edges_by_lit: HashMap<Lit, Vec<EdgeId>>,
}

/// Mutable state of a single solver thread.
struct ThreadState {
    graph: DifferenceLogicGraph,
    /// Literals received from the solver since the last reset, in assignment order.
    edge_trail: Vec<Lit>,
    /// Cursor into `edge_trail`: everything before it was fed to the graph.
    propagated: usize,
    stats: ThreadStats,
}

impl ThreadState {
    fn new(config: GraphConfig) -> Self {
        ThreadState {
            graph: DifferenceLogicGraph::new(config),
            edge_trail: Vec::new(),
            propagated: 0,
            stats: ThreadStats::default(),
        }
    }
}

/// A theory propagator maintaining the conjunction of the difference
/// constraints currently assigned true by the host solver.
///
/// Thread safety is achieved by partitioning: the edge table, literal index
/// and vertex names are frozen at the end of `init`, while each solver thread
/// works on its own graph and trail. The per-thread mutexes are uncontended,
/// they only make that partitioning explicit to the compiler.
pub struct DifferenceLogicPropagator {
    config: GraphConfig,
    shared: Shared,
    states: Vec<Mutex<ThreadState>>,
    show_assignment: bool,
    init_time: Duration,
}

impl DifferenceLogicPropagator {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        DifferenceLogicPropagator {
            config,
            shared: Default::default(),
            states: Vec::new(),
            show_assignment: false,
            init_time: Duration::default(),
        }
    }

    pub fn num_edges(&self) -> usize {
        self.shared.edges.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.shared.vertices.len()
    }

    /// True if the program carries the `&show_assignment` directive.
    pub fn show_assignment(&self) -> bool {
        self.show_assignment
    }

    /// The vertex values witnessing the constraints currently active on the
    /// given thread, in interning order. Vertices that did not participate in
    /// any active constraint are omitted.
    pub fn assignment(&self, thread: usize) -> Vec<(&str, IntCst)> {
        let state = self.state(thread);
        self.shared
            .vertices
            .entries()
            .filter(|&(id, _)| state.graph.node_value_defined(id))
            .map(|(id, name)| (name.as_str(), state.graph.node_value(id)))
            .collect()
    }

    /// Prints the assignment of the given thread to standard output.
    pub fn print_assignment(&self, thread: usize) {
        println!("with assignment:");
        println!(
            "{}",
            self.assignment(thread)
                .iter()
                .map(|(name, value)| format!("{name}:{value}"))
                .format(" ")
        );
    }

    /// Snapshot of the accumulated timings. The overall wall time is owned by
    /// the embedding program and left zero here.
    pub fn stats(&self) -> Stats {
        Stats {
            total: Duration::default(),
            init: self.init_time,
            per_thread: (0..self.states.len()).map(|t| self.state(t).stats.clone()).collect(),
        }
    }

    fn state(&self, thread: usize) -> MutexGuard<'_, ThreadState> {
        self.states[thread].lock().expect("a solver thread panicked")
    }

    /// Feeds the unpropagated tail of the trail to the graph, learning a
    /// clause as soon as a negative cycle appears.
    fn check_consistency(&self, ctl: &mut dyn PropagateControl, state: &mut ThreadState) -> bool {
        while state.propagated < state.edge_trail.len() {
            let lit = state.edge_trail[state.propagated];
            let gated = self.shared.edges_by_lit.get(&lit).map_or(&[] as &[EdgeId], |e| e.as_slice());
            for &edge in gated {
                if let Err(cycle) = state.graph.add_edge(edge, &self.shared.edges) {
                    let clause: Vec<Lit> = cycle.edges().iter().map(|&e| !self.shared.edges[e].lit).collect();
                    debug!(
                        "negative cycle of length {} on thread {}, learning {:?}",
                        cycle.len(),
                        ctl.thread_id(),
                        clause
                    );
                    if !ctl.add_clause(&clause) || !ctl.propagate() {
                        return false;
                    }
                    // The solver accepted the clause without conflicting: it
                    // will backjump before asking us anything else. Hand
                    // control back, the trail is rebuilt on the next callback.
                    return true;
                }
            }
            state.propagated += 1;
        }
        true
    }
}

impl Default for DifferenceLogicPropagator {
    fn default() -> Self {
        Self::new()
    }
}

impl Propagator for DifferenceLogicPropagator {
    fn init(&mut self, init: &mut dyn PropagateInit) -> Result<(), TheoryError> {
        let start = Instant::now();
        for atom in init.theory_atoms() {
            match atom.name() {
                Some(DIFF_ATOM) => {
                    let lit = init.solver_literal(atom.literal);
                    let diff = DiffAtom::parse(&atom)?;
                    let from = self.shared.vertices.intern(diff.u.as_str());
                    let to = self.shared.vertices.intern(diff.v.as_str());
                    let id = self.shared.edges.push(Edge {
                        from,
                        to,
                        weight: diff.bound,
                        lit,
                    });
                    self.shared.edges_by_lit.entry(lit).or_default().push(id);
                    init.add_watch(lit);
                }
                Some(SHOW_ASSIGNMENT_ATOM) => self.show_assignment = true,
                _ => {}
            }
        }
        let config = self.config.clone();
        self.states = (0..init.num_threads())
            .map(|_| Mutex::new(ThreadState::new(config.clone())))
            .collect();
        debug!(
            "initialized {} edges over {} vertices for {} threads",
            self.num_edges(),
            self.num_vertices(),
            self.states.len()
        );
        self.init_time += start.elapsed();
        Ok(())
    }

    fn propagate(&self, ctl: &mut dyn PropagateControl, changes: &[Lit]) -> bool {
        let mut state = self.state(ctl.thread_id());
        let start = Instant::now();
        state.edge_trail.extend_from_slice(changes);
        let result = self.check_consistency(ctl, &mut state);
        state.stats.propagate += start.elapsed();
        result
    }

    fn undo(&self, ctl: &dyn PropagateControl, changes: &[Lit]) {
        let mut state = self.state(ctl.thread_id());
        let start = Instant::now();
        debug_assert!(changes.len() <= state.edge_trail.len());
        let kept = state.edge_trail.len() - changes.len();
        state.edge_trail.truncate(kept);
        // Potentials are not rolled back incrementally: the graph is rebuilt
        // from the remaining trail on the next propagation.
        state.propagated = 0;
        state.graph.reset();
        state.stats.undo += start.elapsed();
    }
}
