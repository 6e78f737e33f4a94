//! Error types
//!
//! Three error kinds, one per collaborator, in the manner of the teacher
//! lineage's per-subsystem error modules: a `thiserror`-derived enum for
//! each of parsing, schema validation, and evaluation, rather than one
//! catch-all error type.

use crate::ast::Query;
use thiserror::Error;

/// Surface-syntax violation. Raised only by the parser; never by the
/// evaluator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unbalanced parentheses in query")]
    UnbalancedParens,

    #[error("empty atom or operator application")]
    EmptyAtom,

    #[error("operator '{operator}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        operator: String,
        expected: String,
        got: usize,
    },

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("variable '{0}' is bound by a quantifier inside the scope of another quantifier binding the same name")]
    ShadowedVariable(String),

    #[error("empty input")]
    EmptyInput,
}

/// Arity mismatch at store population time. Raised only by
/// [`crate::store::Store::add`]; cannot arise during evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("relation '{relation}' has arity {expected}, but tuple {tuple:?} has arity {got}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        got: usize,
        tuple: Vec<String>,
    },

    #[error("probability {0} for relation '{1}' is outside [0, 1]")]
    ProbabilityOutOfRange(f64, String),
}

/// The evaluator's single operational failure mode: the query could not
/// be decomposed by the lifted rule set (R1-R7) and is reported unsafe
/// rather than approximated. Permanent and deterministic for a given
/// `(query, store schema)` pair; retrying does not help.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("query is intractable for the lifted evaluator: {query}")]
    Intractable { query: Query },

    #[error("inclusion-exclusion expansion of {disjuncts} disjuncts exceeds the configured ceiling of {ceiling}")]
    InclusionExclusionCeilingExceeded { disjuncts: usize, ceiling: usize },
}

impl EvalError {
    pub fn intractable(query: &Query) -> Self {
        EvalError::Intractable {
            query: query.clone(),
        }
    }
}
