use dilogic::core::{IntCst, Lit};
use dilogic::propagator::DifferenceLogicPropagator;
use dilogic::solver::{PropagateControl, PropagateInit, Propagator};
use dilogic::theory::{TheoryAtom, TheoryElement, TheoryError, TheoryTerm};
use std::collections::HashMap;

/// Stand-in for the host grounder and solver at initialization time: hands
/// out the grounded atoms, maps program literals to themselves and records
/// the requested watches.
struct MockInit {
    atoms: Vec<TheoryAtom>,
    watches: Vec<Lit>,
    threads: usize,
}

impl MockInit {
    fn new(atoms: Vec<TheoryAtom>, threads: usize) -> Self {
        MockInit {
            atoms,
            watches: Vec::new(),
            threads,
        }
    }
}

impl PropagateInit for MockInit {
    fn theory_atoms(&self) -> Vec<TheoryAtom> {
        self.atoms.clone()
    }

    fn solver_literal(&self, lit: Lit) -> Lit {
        lit
    }

    fn add_watch(&mut self, lit: Lit) {
        self.watches.push(lit);
    }

    fn num_threads(&self) -> usize {
        self.threads
    }
}

/// Stand-in for one solver thread during search: records learnt clauses.
struct MockControl {
    thread: usize,
    clauses: Vec<Vec<Lit>>,
    accept_clauses: bool,
}

impl MockControl {
    fn new(thread: usize) -> Self {
        MockControl {
            thread,
            clauses: Vec::new(),
            accept_clauses: true,
        }
    }
}

impl PropagateControl for MockControl {
    fn thread_id(&self) -> usize {
        self.thread
    }

    fn add_clause(&mut self, clause: &[Lit]) -> bool {
        self.clauses.push(clause.to_vec());
        self.accept_clauses
    }

    fn propagate(&mut self) -> bool {
        true
    }
}

fn lit(l: i32) -> Lit {
    Lit::from_raw(l)
}

/// The grounded form of `&diff { u - v } <= k` gated by literal `l`.
fn diff(u: &str, v: &str, k: IntCst, l: i32) -> TheoryAtom {
    let guard = if k < 0 {
        TheoryTerm::function("-", vec![TheoryTerm::Number(-k)])
    } else {
        TheoryTerm::Number(k)
    };
    TheoryAtom {
        term: TheoryTerm::symbol("diff"),
        elements: vec![TheoryElement {
            tuple: vec![TheoryTerm::function(
                "-",
                vec![TheoryTerm::symbol(u), TheoryTerm::symbol(v)],
            )],
        }],
        guard: Some(("<=".to_string(), guard)),
        literal: lit(l),
    }
}

fn show_assignment_directive(l: i32) -> TheoryAtom {
    TheoryAtom {
        term: TheoryTerm::symbol("show_assignment"),
        elements: vec![],
        guard: None,
        literal: lit(l),
    }
}

fn initialized(atoms: Vec<TheoryAtom>, threads: usize) -> (DifferenceLogicPropagator, MockInit) {
    let mut propagator = DifferenceLogicPropagator::new();
    let mut init = MockInit::new(atoms, threads);
    propagator.init(&mut init).unwrap();
    (propagator, init)
}

fn values(propagator: &DifferenceLogicPropagator, thread: usize) -> HashMap<String, IntCst> {
    propagator
        .assignment(thread)
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn sorted(mut clause: Vec<Lit>) -> Vec<Lit> {
    clause.sort();
    clause
}

#[test]
fn test_init_registers_edges_and_watches() {
    let atoms = vec![
        diff("a", "b", 3, 1),
        diff("b", "c", -1, 2),
        show_assignment_directive(3),
    ];
    let (propagator, init) = initialized(atoms, 2);
    assert_eq!(propagator.num_edges(), 2);
    assert_eq!(propagator.num_vertices(), 3);
    assert!(propagator.show_assignment());
    // the directive is not watched, only the difference constraints are
    assert_eq!(init.watches, vec![lit(1), lit(2)]);
}

#[test]
fn test_init_rejects_malformed_atom() {
    let mut bad = diff("a", "b", 3, 1);
    bad.guard = Some(("<=".to_string(), TheoryTerm::symbol("k")));
    let mut propagator = DifferenceLogicPropagator::new();
    let mut init = MockInit::new(vec![bad], 1);
    assert!(matches!(
        propagator.init(&mut init),
        Err(TheoryError::MalformedAtom(_))
    ));
}

#[test]
fn test_single_feasible_constraint() {
    let (propagator, _) = initialized(vec![diff("a", "b", 3, 1)], 1);
    let ctl = &mut MockControl::new(0);
    assert!(propagator.propagate(ctl, &[lit(1)]));
    assert!(ctl.clauses.is_empty());

    let vals = values(&propagator, 0);
    assert!(vals["a"] - vals["b"] <= 3);
}

#[test]
fn test_unassigned_constraints_leave_no_trace() {
    let atoms = vec![diff("a", "b", 0, 1), diff("c", "d", 5, 2)];
    let (propagator, _) = initialized(atoms, 1);
    let ctl = &mut MockControl::new(0);
    assert!(propagator.propagate(ctl, &[lit(1)]));

    let vals = values(&propagator, 0);
    assert_eq!(vals.get("a"), Some(&0));
    assert_eq!(vals.get("b"), Some(&0));
    assert_eq!(vals.get("c"), None);
    assert_eq!(vals.get("d"), None);
}

#[test]
fn test_negative_two_cycle_learns_clause() {
    let atoms = vec![diff("a", "b", 1, 1), diff("b", "a", -2, 2)];
    let (propagator, _) = initialized(atoms, 1);
    let ctl = &mut MockControl::new(0);

    // the clause is accepted by the solver, so the propagator reports
    // success and defers to the solver's backjump
    assert!(propagator.propagate(ctl, &[lit(1), lit(2)]));
    assert_eq!(ctl.clauses.len(), 1);
    assert_eq!(sorted(ctl.clauses[0].clone()), vec![lit(-2), lit(-1)]);
}

#[test]
fn test_solver_rejection_is_surfaced() {
    let atoms = vec![diff("a", "b", 1, 1), diff("b", "a", -2, 2)];
    let (propagator, _) = initialized(atoms, 1);
    let ctl = &mut MockControl::new(0);
    ctl.accept_clauses = false;
    assert!(!propagator.propagate(ctl, &[lit(1), lit(2)]));
}

#[test]
fn test_negative_self_loop() {
    let (propagator, _) = initialized(vec![diff("a", "a", -1, 1)], 1);
    let ctl = &mut MockControl::new(0);
    assert!(propagator.propagate(ctl, &[lit(1)]));
    assert_eq!(ctl.clauses, vec![vec![lit(-1)]]);
}

#[test]
fn test_chain_closed_by_negative_edge() {
    let atoms = vec![
        diff("a", "b", 1, 1),
        diff("b", "c", 1, 2),
        diff("c", "a", -3, 3),
    ];
    let (propagator, _) = initialized(atoms, 1);
    let ctl = &mut MockControl::new(0);
    assert!(propagator.propagate(ctl, &[lit(1), lit(2), lit(3)]));
    assert_eq!(ctl.clauses.len(), 1);
    assert_eq!(
        sorted(ctl.clauses[0].clone()),
        vec![lit(-3), lit(-2), lit(-1)]
    );
}

#[test]
fn test_backtrack_to_feasible_branch() {
    // either a - b <= 1, or the inconsistent pair {a - b <= -5, b - a <= -5}
    let atoms = vec![
        diff("a", "b", 1, 1),
        diff("a", "b", -5, 2),
        diff("b", "a", -5, 3),
    ];
    let (propagator, _) = initialized(atoms, 1);
    let ctl = &mut MockControl::new(0);

    assert!(propagator.propagate(ctl, &[lit(2), lit(3)]));
    assert_eq!(ctl.clauses.len(), 1);
    assert_eq!(sorted(ctl.clauses[0].clone()), vec![lit(-3), lit(-2)]);

    // the solver backjumps over the failed branch and tries the other one
    propagator.undo(ctl, &[lit(2), lit(3)]);
    assert!(propagator.propagate(ctl, &[lit(1)]));
    assert_eq!(ctl.clauses.len(), 1);

    let vals = values(&propagator, 0);
    assert!(vals["a"] - vals["b"] <= 1);
}

#[test]
fn test_undo_rebuilds_from_trail() {
    let atoms = vec![diff("a", "b", 2, 1), diff("b", "c", -4, 2)];
    let (propagator, _) = initialized(atoms, 1);
    let ctl = &mut MockControl::new(0);

    assert!(propagator.propagate(ctl, &[lit(1)]));
    assert!(propagator.propagate(ctl, &[lit(2)]));
    let with_both = values(&propagator, 0);
    assert_eq!(with_both.len(), 3);

    propagator.undo(ctl, &[lit(2)]);
    // the graph is rebuilt lazily: values reappear on the next propagation
    assert!(propagator.propagate(ctl, &[]));
    let rebuilt = values(&propagator, 0);
    assert_eq!(rebuilt.len(), 2);
    assert!(rebuilt["a"] - rebuilt["b"] <= 2);

    // replaying the dropped literal reproduces the earlier assignment
    assert!(propagator.propagate(ctl, &[lit(2)]));
    assert_eq!(values(&propagator, 0), with_both);

    propagator.undo(ctl, &[lit(1), lit(2)]);
    assert!(propagator.propagate(ctl, &[]));
    assert!(values(&propagator, 0).is_empty());
}

#[test]
fn test_one_literal_gating_several_edges() {
    let atoms = vec![diff("a", "b", 1, 7), diff("b", "c", 2, 7)];
    let (propagator, _) = initialized(atoms, 1);
    let ctl = &mut MockControl::new(0);
    assert!(propagator.propagate(ctl, &[lit(7)]));

    let vals = values(&propagator, 0);
    assert_eq!(vals.len(), 3);
    assert!(vals["a"] - vals["b"] <= 1);
    assert!(vals["b"] - vals["c"] <= 2);
}

#[test]
fn test_threads_are_independent() {
    let atoms = vec![diff("a", "b", 1, 1), diff("b", "a", -2, 2)];
    let (propagator, _) = initialized(atoms, 2);

    let ctl0 = &mut MockControl::new(0);
    assert!(propagator.propagate(ctl0, &[lit(1), lit(2)]));
    assert_eq!(ctl0.clauses.len(), 1);

    // the conflict on thread 0 must not leak into thread 1
    let ctl1 = &mut MockControl::new(1);
    assert!(propagator.propagate(ctl1, &[lit(1)]));
    assert!(ctl1.clauses.is_empty());
    let vals = values(&propagator, 1);
    assert!(vals["a"] - vals["b"] <= 1);
}

#[test]
fn test_stats_cover_all_threads() {
    let atoms = vec![diff("a", "b", 1, 1)];
    let (propagator, _) = initialized(atoms, 2);
    let ctl = &mut MockControl::new(0);
    assert!(propagator.propagate(ctl, &[lit(1)]));
    propagator.undo(ctl, &[lit(1)]);

    let stats = propagator.stats();
    assert_eq!(stats.per_thread.len(), 2);
    let printed = stats.to_string();
    assert!(printed.starts_with("total: "));
    assert!(printed.contains("  total[0]: "));
    assert!(printed.contains("  total[1]: "));
}
