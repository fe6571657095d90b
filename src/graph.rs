//! Incremental feasibility checking of difference constraints.
//!
//! The active constraints form a weighted directed graph in which each vertex
//! carries a potential `pi` such that every active edge `u --w--> v`
//! satisfies `pi(u) + w - pi(v) >= 0`. Such a potential function exists iff
//! the graph has no negative-weight cycle, and reading the assignment
//! `value(v) = -pi(v)` then satisfies every constraint
//! `value(from) - value(to) <= w`.
//!
//! Adding an edge only ever requires repairing the potentials downstream of
//! its target, which is done with a priority queue over the potential
//! deficits (the reduced cost `gamma`). Once the network reaches an
//! inconsistent state the offending edge is rejected and the only way to
//! remove previously added edges is a full [`DifferenceLogicGraph::reset`].

use crate::collections::ref_store::RefVec;
use crate::core::{EdgeId, IntCst, Lit, VertexId};
use env_param::EnvParam;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// When true, every successful edge addition revalidates the potential
/// function over the entire active edge set. Very expensive, for debugging.
pub static EXTENSIVE_CHECKS: EnvParam<bool> = EnvParam::new("DILOGIC_EXTENSIVE_CHECKS", "false");

/// Tuning knobs of the graph.
///
/// The default value of all parameters can be set through environment variables.
#[derive(Clone, Debug)]
pub struct GraphConfig {
    /// If true, extensive and very expensive self checks are made after each
    /// successful edge addition.
    pub extensive_checks: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            extensive_checks: EXTENSIVE_CHECKS.get(),
        }
    }
}

/// An immutable difference constraint `value(from) - value(to) <= weight`,
/// gated by the solver literal `lit`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
    pub weight: IntCst,
    pub lit: Lit,
}

/// The append-only table of all edges, populated at initialization and
/// shared read-only afterwards. An edge's id is its index in the table.
pub type EdgeTable = RefVec<EdgeId, Edge>;

/// Mutable per-vertex state.
///
/// `gamma` and `changed` are scratch state of a single [`DifferenceLogicGraph::add_edge`]
/// call and are zero/false between calls.
struct Node {
    /// Active outgoing edges.
    outgoing: Vec<EdgeId>,
    /// Current potential, or `None` if the vertex has not participated in any
    /// active edge since the last reset.
    potential: Option<IntCst>,
    /// During relaxation, the incoming edge that produced the best slack;
    /// used to reconstruct negative cycles.
    last_edge: Option<EdgeId>,
    /// Pending potential change (always <= 0 while queued).
    gamma: IntCst,
    /// True once the pending change has been applied in this call.
    changed: bool,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            outgoing: Vec::new(),
            potential: None,
            last_edge: None,
            gamma: 0,
            changed: false,
        }
    }
}

/// Queue entry of the relaxation: the vertex and its pending slack.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
struct NodeUpdate {
    node: VertexId,
    gamma: IntCst,
}

impl PartialOrd for NodeUpdate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeUpdate {
    fn cmp(&self, other: &Self) -> Ordering {
        // max-heap on the reversed slack: the most negative slack pops first
        Reverse(self.gamma).cmp(&Reverse(other.gamma))
    }
}

/// Edge ids forming a directed cycle whose weights sum to a negative value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegativeCycle(Vec<EdgeId>);

impl NegativeCycle {
    pub fn edges(&self) -> &[EdgeId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Incremental negative-cycle detector over a shared edge table.
///
/// The graph is the mutable, single-threaded part of the reasoner: it owns
/// the per-vertex potentials and adjacency while the edges themselves live in
/// an [`EdgeTable`] owned by the caller.
pub struct DifferenceLogicGraph {
    config: GraphConfig,
    nodes: RefVec<VertexId, Node>,
    /// Pending relaxations, most negative slack first.
    queue: BinaryHeap<NodeUpdate>,
    /// Vertices whose potential was written in the current call, with their
    /// previous value. Replayed backwards when the edge is rejected.
    touched: Vec<(VertexId, Option<IntCst>)>,
}

impl DifferenceLogicGraph {
    pub fn new(config: GraphConfig) -> Self {
        DifferenceLogicGraph {
            config,
            nodes: Default::default(),
            queue: Default::default(),
            touched: Vec::new(),
        }
    }

    /// True if the vertex has participated in an active edge since the last reset.
    pub fn node_value_defined(&self, v: VertexId) -> bool {
        self.nodes.contains(v) && self.nodes[v].potential.is_some()
    }

    /// Value of the vertex in the satisfying assignment, i.e. its negated potential.
    ///
    /// Only meaningful when [`Self::node_value_defined`] holds.
    pub fn node_value(&self, v: VertexId) -> IntCst {
        -self.potential(v)
    }

    fn potential(&self, v: VertexId) -> IntCst {
        self.nodes[v].potential.expect("potential read before initialization")
    }

    /// Attempts to activate the edge `uv`.
    ///
    /// If the active set extended with `uv` remains feasible, the edge is
    /// committed and the potentials are updated to witness feasibility.
    /// Otherwise the graph is left exactly as before the call and the
    /// negative-weight cycle introduced by `uv` is returned.
    pub fn add_edge(&mut self, uv_id: EdgeId, edges: &EdgeTable) -> Result<(), NegativeCycle> {
        debug_assert!(self.queue.is_empty());
        debug_assert!(self.touched.is_empty());
        let uv = edges[uv_id];
        self.nodes.fill_with(uv.from.max(uv.to), Node::default);
        for vertex in [uv.from, uv.to] {
            if self.nodes[vertex].potential.is_none() {
                self.nodes[vertex].potential = Some(0);
                self.touched.push((vertex, None));
            }
        }

        // slack of the new edge under the current potentials: if non-negative
        // the edge is already satisfied, otherwise the target must decrease
        let slack = self.potential(uv.from) + uv.weight - self.potential(uv.to);
        self.nodes[uv.to].gamma = slack;
        if slack < 0 {
            self.nodes[uv.to].last_edge = Some(uv_id);
            self.queue.push(NodeUpdate {
                node: uv.to,
                gamma: slack,
            });
        }

        // Propagate the deficit in increasing order of slack. Reaching the
        // source of the new edge with a deficit would close a negative cycle
        // through it, so the loop stops as soon as its slack leaves zero.
        while self.nodes[uv.from].gamma == 0 {
            let Some(NodeUpdate { node: s_id, gamma }) = self.queue.pop() else {
                break;
            };
            if self.nodes[s_id].changed {
                // stale queue entry, the vertex was already repaired
                continue;
            }
            debug_assert_eq!(self.nodes[s_id].gamma, gamma);
            let previous = self.nodes[s_id].potential;
            let applied = previous.expect("relaxed vertex without a potential") + gamma;
            let s = &mut self.nodes[s_id];
            s.potential = Some(applied);
            s.gamma = 0;
            s.changed = true;
            self.touched.push((s_id, previous));

            for i in 0..self.nodes[s_id].outgoing.len() {
                let st_id = self.nodes[s_id].outgoing[i];
                let st = edges[st_id];
                let t = &mut self.nodes[st.to];
                if t.changed {
                    continue;
                }
                let slack = applied + st.weight - t.potential.expect("active vertex without a potential");
                if slack < t.gamma {
                    t.gamma = slack;
                    t.last_edge = Some(st_id);
                    self.queue.push(NodeUpdate {
                        node: st.to,
                        gamma: slack,
                    });
                }
            }
        }

        let result = if self.nodes[uv.from].gamma < 0 {
            // walk the relaxation parents backwards from the target until the
            // cycle closes on it, gathering the offending edges
            let mut cycle = Vec::new();
            let mut edge = self.nodes[uv.to].last_edge.expect("unreached cycle vertex");
            cycle.push(edge);
            let mut next = edges[edge].from;
            while next != uv.to {
                edge = self.nodes[next].last_edge.expect("unreached cycle vertex");
                cycle.push(edge);
                next = edges[edge].from;
            }
            Err(NegativeCycle(cycle))
        } else {
            self.nodes[uv.from].outgoing.push(uv_id);
            Ok(())
        };

        // clear the scratch state: the slack of the target (which may never
        // have been queued) and of everything still in the queue
        self.nodes[uv.to].gamma = 0;
        while let Some(NodeUpdate { node, .. }) = self.queue.pop() {
            self.nodes[node].gamma = 0;
        }
        match &result {
            Ok(()) => {
                for (vertex, _) in self.touched.drain(..) {
                    self.nodes[vertex].changed = false;
                }
                if self.config.extensive_checks {
                    self.check_potentials(edges);
                }
            }
            Err(_) => {
                // the edge is rejected: restore the potentials so that the
                // committed state is exactly the one before the call
                for (vertex, previous) in self.touched.drain(..).rev() {
                    let node = &mut self.nodes[vertex];
                    node.potential = previous;
                    node.changed = false;
                }
            }
        }
        result
    }

    /// Discards all per-vertex state. O(V).
    pub fn reset(&mut self) {
        debug_assert!(self.queue.is_empty());
        debug_assert!(self.touched.is_empty());
        self.nodes.clear();
    }

    /// Validates the potential function over the whole active edge set.
    fn check_potentials(&self, edges: &EdgeTable) {
        for (_, node) in self.nodes.entries() {
            for &e in &node.outgoing {
                let edge = edges[e];
                assert!(
                    self.potential(edge.from) + edge.weight - self.potential(edge.to) >= 0,
                    "potential function does not cover active edge {e:?}"
                );
            }
        }
    }
}

impl Default for DifferenceLogicGraph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}
