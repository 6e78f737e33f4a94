//! Query AST
//!
//! A typed algebraic representation of first-order logic queries over a
//! tuple-independent probabilistic database: atoms, n-ary boolean
//! connectives, negation, and the two quantifiers.
//!
//! Nodes are immutable once built. [`crate::analysis::rewrite`] and the
//! other analysis functions never mutate a `Query` in place; they return a
//! freshly constructed tree.

use std::fmt;

/// A named logic variable. Equality and hashing are by name: two
/// `Variable`s with the same name are the same variable, regardless of
/// where in the tree they occur.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(pub String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Variable(s.to_string())
    }
}

/// A term occurring in an atom: either a variable or a ground constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Var(Variable),
    Const(String),
}

impl Term {
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Const(_))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Var(v) => Some(v),
            Term::Const(_) => None,
        }
    }

    pub fn as_constant(&self) -> Option<&str> {
        match self {
            Term::Const(c) => Some(c),
            Term::Var(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{v}"),
            Term::Const(c) => write!(f, "{c}"),
        }
    }
}

/// A relation atom, e.g. `R(x, a)`.
///
/// Equality and hashing are by `(relation, terms)`, matching the data
/// model's invariant that atoms compare structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub relation: String,
    pub terms: Vec<Term>,
}

impl Atom {
    pub fn new(relation: impl Into<String>, terms: Vec<Term>) -> Self {
        Atom {
            relation: relation.into(),
            terms,
        }
    }

    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// True if every term in the atom is a ground constant.
    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(Term::is_constant)
    }

    /// The ground tuple backing a store lookup. Panics if the atom is not
    /// ground; callers must check [`Atom::is_ground`] first (R1 in the
    /// evaluator does this before calling).
    pub fn ground_tuple(&self) -> Vec<String> {
        self.terms
            .iter()
            .map(|t| t.as_constant().expect("ground atom").to_string())
            .collect()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.relation)?;
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, ")")
    }
}

/// A first-order logic query over the probabilistic database.
///
/// Conjunction and disjunction are n-ary: the implementer's choice noted
/// by the data model is resolved here in favor of n-ary children, since
/// R4's decomposition and R6's inclusion-exclusion both operate over a
/// list of children directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    Atom(Atom),
    Negation(Box<Query>),
    Conjunction(Vec<Query>),
    Disjunction(Vec<Query>),
    Exists(Variable, Box<Query>),
    Forall(Variable, Box<Query>),
}

impl Query {
    pub fn atom(relation: impl Into<String>, terms: Vec<Term>) -> Self {
        Query::Atom(Atom::new(relation, terms))
    }

    pub fn not(inner: Query) -> Self {
        Query::Negation(Box::new(inner))
    }

    pub fn and(children: Vec<Query>) -> Self {
        Query::Conjunction(children)
    }

    pub fn or(children: Vec<Query>) -> Self {
        Query::Disjunction(children)
    }

    pub fn exists(var: impl Into<Variable>, inner: Query) -> Self {
        Query::Exists(var.into(), Box::new(inner))
    }

    pub fn forall(var: impl Into<Variable>, inner: Query) -> Self {
        Query::Forall(var.into(), Box::new(inner))
    }

    /// True if this node is an atom.
    pub fn is_atom(&self) -> bool {
        matches!(self, Query::Atom(_))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Atom(a) => write!(f, "{a}"),
            Query::Negation(q) => write!(f, "not({q})"),
            Query::Conjunction(cs) => {
                write!(f, "and(")?;
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
            Query::Disjunction(cs) => {
                write!(f, "or(")?;
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
            Query::Exists(v, q) => write!(f, "exist({v}, {q})"),
            Query::Forall(v, q) => write!(f, "forall({v}, {q})"),
        }
    }
}
