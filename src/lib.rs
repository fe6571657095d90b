//! Difference-logic reasoning for CDCL solvers.
//!
//! A difference constraint bounds the difference of two integer variables:
//! `u - v <= k`. When a host solver associates such constraints to Boolean
//! literals, the conjunction of the currently-true constraints is satisfiable
//! iff the corresponding weighted graph has no negative cycle. This crate
//! provides:
//!  - [`graph::DifferenceLogicGraph`]: an incremental negative-cycle detector
//!    based on vertex potentials, where each edge addition only repairs the
//!    part of the graph it invalidates;
//!  - [`propagator::DifferenceLogicPropagator`]: a theory propagator feeding
//!    the graph from the host solver's propagate/undo callbacks and learning
//!    a conflict clause from each negative cycle;
//!  - [`theory`]: the vocabulary of `&diff { u - v } <= k` atoms surfaced by
//!    the host grounder.
//!
//! The host solver itself is external and interacts with the propagator
//! through the traits of the [`solver`] module.

pub mod collections;
pub mod core;
pub mod graph;
pub mod propagator;
pub mod solver;
pub mod stats;
pub mod theory;
