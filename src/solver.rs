//! Interface to the host CDCL solver.
//!
//! The host solver, and the grounder feeding it, are external: this module
//! only fixes the callback surface between them and a theory propagator. The
//! host implements [`PropagateInit`] and [`PropagateControl`]; the crate's
//! [`crate::propagator::DifferenceLogicPropagator`] implements [`Propagator`].

use crate::core::Lit;
use crate::theory::{TheoryAtom, TheoryError};

/// Services available to a propagator while the host sets up solving.
pub trait PropagateInit {
    /// The grounded theory atoms of the problem.
    fn theory_atoms(&self) -> Vec<TheoryAtom>;

    /// Maps a program literal (as recorded in a [`TheoryAtom`]) to the
    /// corresponding solver literal.
    fn solver_literal(&self, lit: Lit) -> Lit;

    /// Requests `propagate` to be called back whenever `lit` becomes true.
    fn add_watch(&mut self, lit: Lit);

    /// Number of solver threads that will run in parallel.
    fn num_threads(&self) -> usize;
}

/// Services available to a propagator during solving, bound to one solver thread.
pub trait PropagateControl {
    /// The solver thread this callback runs on, in `0..num_threads`.
    fn thread_id(&self) -> usize;

    /// Adds a learnt clause to the solver.
    ///
    /// Returns false if the solver decided to stop propagation, in which case
    /// the propagator must give control back immediately.
    fn add_clause(&mut self, clause: &[Lit]) -> bool;

    /// Asks the solver to propagate the consequences of newly added clauses.
    ///
    /// Returns false if propagation leads to a conflict the solver wants to
    /// handle itself.
    fn propagate(&mut self) -> bool;
}

/// Callbacks of a theory propagator, invoked by the host solver.
pub trait Propagator {
    /// Called once before solving starts, on a single thread.
    fn init(&mut self, init: &mut dyn PropagateInit) -> Result<(), TheoryError>;

    /// Called with the literals newly assigned true on the thread identified
    /// by `ctl`. Within one thread, literals arrive in assignment order.
    ///
    /// Returns false to report that the solver must back out of the current
    /// state (e.g. after a rejected clause).
    fn propagate(&self, ctl: &mut dyn PropagateControl, changes: &[Lit]) -> bool;

    /// Called on backtracking with the literals being unassigned, in the
    /// thread identified by `ctl`.
    fn undo(&self, ctl: &dyn PropagateControl, changes: &[Lit]);
}
