//! Grounder-facing vocabulary: the theory declaration understood by the host
//! grounder and the data model of the grounded atoms it surfaces.
//!
//! A difference constraint is written `&diff { u - v } <= k` where `u` and
//! `v` are arbitrary ground terms naming vertices and `k` is an integer
//! constant, possibly wrapped in a unary minus.

use crate::core::{IntCst, Lit};
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Theory declaration to be added to the base program of the host grounder.
pub const THEORY_DECLARATION: &str = r#"#theory dl {
    term          { };
    constant      { - : 1, unary };
    diff_term     { - : 1, binary, left };
    &diff/0           : diff_term, { <= }, constant, any;
    &show_assignment/0 : term, directive
}."#;

/// Name of the theory atoms carrying a difference constraint.
pub const DIFF_ATOM: &str = "diff";

/// Name of the directive atom requesting assignments to be printed with each model.
pub const SHOW_ASSIGNMENT_ATOM: &str = "show_assignment";

/// A ground theory term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TheoryTerm {
    Number(IntCst),
    Symbol(String),
    Function(String, Vec<TheoryTerm>),
}

impl TheoryTerm {
    pub fn function(name: &str, args: Vec<TheoryTerm>) -> TheoryTerm {
        TheoryTerm::Function(name.to_string(), args)
    }

    pub fn symbol(name: &str) -> TheoryTerm {
        TheoryTerm::Symbol(name.to_string())
    }

    /// Name of the term: the symbol itself or the function name.
    pub fn name(&self) -> Option<&str> {
        match self {
            TheoryTerm::Number(_) => None,
            TheoryTerm::Symbol(s) => Some(s),
            TheoryTerm::Function(f, _) => Some(f),
        }
    }
}

impl Display for TheoryTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TheoryTerm::Number(n) => write!(f, "{n}"),
            TheoryTerm::Symbol(s) => write!(f, "{s}"),
            TheoryTerm::Function(name, args) => write!(f, "{}({})", name, args.iter().format(",")),
        }
    }
}

/// One element of a theory atom, e.g. the `u - v` part of `&diff { u - v }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TheoryElement {
    pub tuple: Vec<TheoryTerm>,
}

/// A grounded theory atom, as surfaced by the host grounder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TheoryAtom {
    /// The atom name part, e.g. `diff` in `&diff { ... }`.
    pub term: TheoryTerm,
    pub elements: Vec<TheoryElement>,
    /// Operator and right-hand side, e.g. `("<=", 3)`.
    pub guard: Option<(String, TheoryTerm)>,
    /// Program literal associated with the atom, to be mapped to a solver
    /// literal at initialization.
    pub literal: Lit,
}

impl TheoryAtom {
    pub fn name(&self) -> Option<&str> {
        self.term.name()
    }
}

/// Errors raised while translating theory atoms at initialization.
#[derive(Debug, Error)]
pub enum TheoryError {
    #[error("malformed `diff` atom: {0}")]
    MalformedAtom(String),
    #[error("unsupported guard operator `{0}` in `diff` atom")]
    UnsupportedGuard(String),
}

/// The difference constraint `u - v <= bound` extracted from a `&diff` atom.
///
/// Vertex names are the printed form of the ground terms, so that e.g.
/// `bound(t(1))` and `bound(t(2))` name distinct vertices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffAtom {
    pub u: String,
    pub v: String,
    pub bound: IntCst,
}

impl DiffAtom {
    /// Extracts the difference constraint of a grounded `&diff` atom.
    ///
    /// The guard constant is accepted either as a bare integer or as a unary
    /// minus application `-(n)`. A strict guard `<` is rewritten into
    /// `<= bound - 1`, which is equivalent over the integers.
    pub fn parse(atom: &TheoryAtom) -> Result<DiffAtom, TheoryError> {
        let malformed = |what: &str| TheoryError::MalformedAtom(format!("{what} in `{atom:?}`"));

        let (op, guard) = atom.guard.as_ref().ok_or_else(|| malformed("missing guard"))?;
        let bound = match guard {
            TheoryTerm::Number(n) => *n,
            TheoryTerm::Function(minus, args) if minus == "-" && args.len() == 1 => match &args[0] {
                TheoryTerm::Number(n) => -n,
                _ => return Err(malformed("non-numeric negated guard")),
            },
            _ => return Err(malformed("non-numeric guard")),
        };
        let bound = match op.as_str() {
            "<=" => bound,
            "<" => bound - 1,
            _ => return Err(TheoryError::UnsupportedGuard(op.clone())),
        };

        let [element] = atom.elements.as_slice() else {
            return Err(malformed("expected a single element"));
        };
        let [term] = element.tuple.as_slice() else {
            return Err(malformed("expected a single tuple term"));
        };
        match term {
            TheoryTerm::Function(minus, args) if minus == "-" && args.len() == 2 => Ok(DiffAtom {
                u: args[0].to_string(),
                v: args[1].to_string(),
                bound,
            }),
            _ => Err(malformed("element is not a difference of two terms")),
        }
    }
}
