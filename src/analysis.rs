//! Query analysis
//!
//! Pure syntactic predicates over the [`Query`] AST. None of these
//! functions consult the [`crate::store::Store`]; they are total
//! functions of the query alone, in the spirit of the teacher lineage's
//! `Atom`/`BodyPredicate` inherent methods (`variables()`, `is_safe()`)
//! that answer structural questions without touching any data.

use crate::ast::{Atom, Query, Term, Variable};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Depth-first collection of every atom occurrence in `q`. Duplicates
/// are preserved -- callers that need a set deduplicate themselves, since
/// some callers (inclusion-exclusion cancellation) are multiset-sensitive.
pub fn atoms(q: &Query) -> Vec<Atom> {
    let mut out = Vec::new();
    collect_atoms(q, &mut out);
    out
}

fn collect_atoms(q: &Query, out: &mut Vec<Atom>) {
    match q {
        Query::Atom(a) => out.push(a.clone()),
        Query::Negation(inner) => collect_atoms(inner, out),
        Query::Conjunction(cs) | Query::Disjunction(cs) => {
            for c in cs {
                collect_atoms(c, out);
            }
        }
        Query::Exists(_, inner) | Query::Forall(_, inner) => collect_atoms(inner, out),
    }
}

/// The set of relation names occurring anywhere in `q`.
pub fn relations(q: &Query) -> BTreeSet<String> {
    atoms(q).into_iter().map(|a| a.relation).collect()
}

/// Variables occurring in some atom of `q` that are not bound by an
/// enclosing `Exists`/`Forall`.
pub fn free_variables(q: &Query) -> BTreeSet<Variable> {
    let mut bound = BTreeSet::new();
    let mut out = BTreeSet::new();
    collect_free_variables(q, &mut bound, &mut out);
    out
}

fn collect_free_variables(q: &Query, bound: &mut BTreeSet<Variable>, out: &mut BTreeSet<Variable>) {
    match q {
        Query::Atom(a) => {
            for t in &a.terms {
                if let Term::Var(v) = t {
                    if !bound.contains(v) {
                        out.insert(v.clone());
                    }
                }
            }
        }
        Query::Negation(inner) => collect_free_variables(inner, bound, out),
        Query::Conjunction(cs) | Query::Disjunction(cs) => {
            for c in cs {
                collect_free_variables(c, bound, out);
            }
        }
        Query::Exists(v, inner) | Query::Forall(v, inner) => {
            let newly_bound = bound.insert(v.clone());
            collect_free_variables(inner, bound, out);
            if newly_bound {
                bound.remove(v);
            }
        }
    }
}

/// Structural substitution: every occurrence of `variable` anywhere in
/// `q` is replaced by the ground constant `constant`. Quantifier-bound
/// variables are not alpha-renamed: if `variable` names a bound variable
/// of an inner quantifier, that binder's name now simply matches the
/// substituted-for name, which is the caller's responsibility (as the
/// parser rejects shadowing up front, this situation cannot arise from
/// parsed input).
///
/// Always returns a freshly built tree; `q` is not mutated.
pub fn rewrite(q: &Query, variable: &Variable, constant: &str) -> Query {
    match q {
        Query::Atom(a) => Query::Atom(rewrite_atom(a, variable, constant)),
        Query::Negation(inner) => Query::Negation(Box::new(rewrite(inner, variable, constant))),
        Query::Conjunction(cs) => {
            Query::Conjunction(cs.iter().map(|c| rewrite(c, variable, constant)).collect())
        }
        Query::Disjunction(cs) => {
            Query::Disjunction(cs.iter().map(|c| rewrite(c, variable, constant)).collect())
        }
        Query::Exists(v, inner) => Query::Exists(v.clone(), Box::new(rewrite(inner, variable, constant))),
        Query::Forall(v, inner) => Query::Forall(v.clone(), Box::new(rewrite(inner, variable, constant))),
    }
}

fn rewrite_atom(atom: &Atom, variable: &Variable, constant: &str) -> Atom {
    let terms = atom
        .terms
        .iter()
        .map(|t| match t {
            Term::Var(v) if v == variable => Term::Const(constant.to_string()),
            other => other.clone(),
        })
        .collect();
    Atom::new(atom.relation.clone(), terms)
}

/// Two atoms are unifiable when their relations match and no pair of
/// ground constants at the same position disagree. A variable unifies
/// with anything.
pub fn unifiable(a1: &Atom, a2: &Atom) -> bool {
    if a1.relation != a2.relation || a1.arity() != a2.arity() {
        return false;
    }
    a1.terms.iter().zip(a2.terms.iter()).all(|(t1, t2)| match (t1, t2) {
        (Term::Const(c1), Term::Const(c2)) => c1 == c2,
        _ => true,
    })
}

/// True iff no atom of `q1` unifies with any atom of `q2`: the events
/// "q1 holds" and "q2 holds" are then probabilistically independent
/// under the tuple-independent distribution.
pub fn independent(q1: &Query, q2: &Query) -> bool {
    let atoms1 = atoms(q1);
    let atoms2 = atoms(q2);
    atoms1
        .iter()
        .all(|a1| atoms2.iter().all(|a2| !unifiable(a1, a2)))
}

/// `variable` is a separator of `q` iff every atom of `q` contains it
/// exactly once, and for each relation occurring in `q` there is a
/// single position at which every atom of that relation carries it.
///
/// An empty atom set (a vacuous quantifier body, e.g. an empty
/// conjunction) vacuously satisfies both conditions, so `variable` is
/// considered a separator of it; R5 then folds over an empty domain.
pub fn separator_variable(variable: &Variable, q: &Query) -> bool {
    let qatoms = atoms(q);

    let mut position_by_relation: HashMap<&str, usize> = HashMap::new();

    for atom in &qatoms {
        let mut occurrences = atom
            .terms
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, Term::Var(v) if v == variable));

        let (position, _) = match occurrences.next() {
            Some(first) => first,
            None => return false,
        };
        if occurrences.next().is_some() {
            // Occurs more than once in this atom.
            return false;
        }

        match position_by_relation.get(atom.relation.as_str()) {
            Some(&expected) if expected != position => return false,
            Some(_) => {}
            None => {
                position_by_relation.insert(atom.relation.as_str(), position);
            }
        }
    }

    true
}

/// `q` is hierarchical iff, for every pair of free variables `(x, y)`,
/// their atom-coverage sets `A(x)`, `A(y)` are nested or disjoint (a
/// laminar family). This is a necessary condition for lifted safety of
/// the positive conjunctive fragment.
pub fn hierarchical(q: &Query) -> bool {
    let free = free_variables(q);
    let qatoms = atoms(q);

    let coverage: BTreeMap<&Variable, BTreeSet<usize>> = free
        .iter()
        .map(|v| {
            let covering: BTreeSet<usize> = qatoms
                .iter()
                .enumerate()
                .filter(|(_, a)| atom_contains(a, v))
                .map(|(i, _)| i)
                .collect();
            (v, covering)
        })
        .collect();

    let vars: Vec<&Variable> = free.iter().collect();
    for i in 0..vars.len() {
        for j in (i + 1)..vars.len() {
            let a = &coverage[vars[i]];
            let b = &coverage[vars[j]];
            let nested = a.is_subset(b) || b.is_subset(a);
            let disjoint = a.is_disjoint(b);
            if !nested && !disjoint {
                return false;
            }
        }
    }
    true
}

fn atom_contains(atom: &Atom, variable: &Variable) -> bool {
    atom.terms.iter().any(|t| matches!(t, Term::Var(v) if v == variable))
}

/// Applies the distributive law to a disjunction whose children are
/// atoms or conjunctions: `or(and(a1,a2), b) == and(or(a1,b), or(a2,b))`.
/// If no child is a conjunction, `q` is returned unchanged.
pub fn push_disjunction(q: Query) -> Query {
    let Query::Disjunction(children) = q else {
        return q;
    };

    let has_conjunction = children.iter().any(|c| matches!(c, Query::Conjunction(_)));
    if !has_conjunction {
        return Query::Disjunction(children);
    }

    let factors: Vec<Vec<Query>> = children
        .into_iter()
        .map(|c| match c {
            Query::Conjunction(cs) => cs,
            other => vec![other],
        })
        .collect();

    let product = cartesian_product(&factors);
    Query::Conjunction(
        product
            .into_iter()
            .map(Query::Disjunction)
            .collect(),
    )
}

fn cartesian_product(factors: &[Vec<Query>]) -> Vec<Vec<Query>> {
    let mut result: Vec<Vec<Query>> = vec![Vec::new()];
    for factor in factors {
        let mut next = Vec::with_capacity(result.len() * factor.len());
        for prefix in &result {
            for item in factor {
                let mut combo = prefix.clone();
                combo.push(item.clone());
                next.push(combo);
            }
        }
        result = next;
    }
    result
}

/// Pushes negation through `q` to its De Morgan dual: conjunction and
/// disjunction swap (with children negated in turn), quantifiers swap,
/// and a double negation cancels back to its argument unchanged. An atom
/// becomes its `Negation`. Unlike wrapping `q` in a single `Negation`,
/// this never leaves an opaque negated compound behind -- which is what
/// lets R7 terminate: its dual's disjuncts are conjunctions of atoms
/// rather than negations of whatever connective the child happened to be.
pub fn negate(q: &Query) -> Query {
    match q {
        Query::Atom(_) => Query::Negation(Box::new(q.clone())),
        Query::Negation(inner) => inner.as_ref().clone(),
        Query::Conjunction(cs) => Query::Disjunction(cs.iter().map(negate).collect()),
        Query::Disjunction(cs) => Query::Conjunction(cs.iter().map(negate).collect()),
        Query::Exists(v, inner) => Query::Forall(v.clone(), Box::new(negate(inner))),
        Query::Forall(v, inner) => Query::Exists(v.clone(), Box::new(negate(inner))),
    }
}

/// Removes existential quantifier nodes, leaving a quantifier-free query
/// whose previously bound variables are now free. Universal quantifiers
/// are left in place. Used before inclusion-exclusion (R6) to normalize
/// onto quantifier-free disjunctive-normal form.
pub fn strip_existentials(q: Query) -> Query {
    match q {
        Query::Exists(_, inner) => strip_existentials(*inner),
        Query::Negation(inner) => Query::Negation(Box::new(strip_existentials(*inner))),
        Query::Conjunction(cs) => {
            Query::Conjunction(cs.into_iter().map(strip_existentials).collect())
        }
        Query::Disjunction(cs) => {
            Query::Disjunction(cs.into_iter().map(strip_existentials).collect())
        }
        Query::Forall(v, inner) => Query::Forall(v, Box::new(strip_existentials(*inner))),
        atom @ Query::Atom(_) => atom,
    }
}

/// Groups `children` into maximal classes such that any two subqueries
/// in different classes are independent, via union-find over pairs with
/// `independent(..) == false`.
pub fn decompose(children: &[Query]) -> Vec<Vec<Query>> {
    let n = children.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    fn union(parent: &mut [usize], x: usize, y: usize) {
        let rx = find(parent, x);
        let ry = find(parent, y);
        if rx != ry {
            parent[ry] = rx;
        }
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if !independent(&children[i], &children[j]) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<Query>> = BTreeMap::new();
    for (i, child) in children.iter().enumerate() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(child.clone());
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Query;

    fn var(name: &str) -> Term {
        Term::Var(Variable::new(name))
    }
    fn cst(name: &str) -> Term {
        Term::Const(name.to_string())
    }

    #[test]
    fn atoms_collects_duplicates() {
        let q = Query::and(vec![
            Query::atom("R", vec![cst("a")]),
            Query::atom("R", vec![cst("a")]),
        ]);
        assert_eq!(atoms(&q).len(), 2);
    }

    #[test]
    fn free_variables_excludes_bound() {
        let inner = Query::atom("R", vec![var("x"), cst("p")]);
        let q = Query::exists("x", inner);
        assert!(free_variables(&q).is_empty());
    }

    #[test]
    fn free_variables_includes_unbound() {
        let q = Query::atom("S", vec![var("z")]);
        let free = free_variables(&q);
        assert_eq!(free.len(), 1);
        assert!(free.contains(&Variable::new("z")));
    }

    #[test]
    fn rewrite_replaces_all_occurrences() {
        let q = Query::and(vec![
            Query::atom("R", vec![var("x")]),
            Query::atom("S", vec![var("x"), cst("p")]),
        ]);
        let rewritten = rewrite(&q, &Variable::new("x"), "a");
        assert_eq!(
            rewritten,
            Query::and(vec![
                Query::atom("R", vec![cst("a")]),
                Query::atom("S", vec![cst("a"), cst("p")]),
            ])
        );
    }

    #[test]
    fn rewrite_idempotent_after_first_substitution() {
        let q = Query::atom("R", vec![var("x")]);
        let once = rewrite(&q, &Variable::new("x"), "a");
        let twice = rewrite(&once, &Variable::new("x"), "b");
        assert_eq!(once, twice);
    }

    #[test]
    fn unifiable_variable_matches_anything() {
        let a1 = Atom::new("R", vec![var("x")]);
        let a2 = Atom::new("R", vec![cst("a")]);
        assert!(unifiable(&a1, &a2));
    }

    #[test]
    fn unifiable_conflicting_constants() {
        let a1 = Atom::new("R", vec![cst("a")]);
        let a2 = Atom::new("R", vec![cst("b")]);
        assert!(!unifiable(&a1, &a2));
    }

    #[test]
    fn unifiable_different_relations() {
        let a1 = Atom::new("R", vec![cst("a")]);
        let a2 = Atom::new("S", vec![cst("a")]);
        assert!(!unifiable(&a1, &a2));
    }

    #[test]
    fn independent_disjoint_relations() {
        let q1 = Query::atom("R", vec![cst("a")]);
        let q2 = Query::atom("S", vec![cst("b")]);
        assert!(independent(&q1, &q2));
    }

    #[test]
    fn independent_is_false_for_self() {
        let q = Query::atom("R", vec![cst("a")]);
        assert!(!independent(&q, &q));
    }

    #[test]
    fn separator_variable_basic() {
        let q = Query::and(vec![
            Query::atom("R", vec![var("x")]),
            Query::atom("S", vec![var("x"), cst("p")]),
        ]);
        assert!(separator_variable(&Variable::new("x"), &q));
    }

    #[test]
    fn separator_variable_rejects_inconsistent_position() {
        let q = Query::and(vec![
            Query::atom("S", vec![var("x"), cst("p")]),
            Query::atom("S", vec![cst("p"), var("x")]),
        ]);
        assert!(!separator_variable(&Variable::new("x"), &q));
    }

    #[test]
    fn separator_variable_vacuously_true_for_empty_conjunction() {
        let q = Query::and(vec![]);
        assert!(separator_variable(&Variable::new("x"), &q));
    }

    #[test]
    fn separator_variable_rejects_repeated_occurrence() {
        let q = Query::atom("T", vec![var("x"), var("x")]);
        assert!(!separator_variable(&Variable::new("x"), &q));
    }

    #[test]
    fn hierarchical_nested() {
        let q = Query::and(vec![
            Query::atom("R", vec![var("x")]),
            Query::atom("S", vec![var("x"), var("y")]),
        ]);
        assert!(hierarchical(&q));
    }

    #[test]
    fn non_hierarchical_is_rejected() {
        let q = Query::and(vec![
            Query::atom("R", vec![var("x")]),
            Query::atom("S", vec![var("x"), var("y")]),
            Query::atom("T", vec![var("y")]),
        ]);
        // coverage(x) = {R,S}, coverage(y) = {S,T}: neither nested nor disjoint.
        assert!(!hierarchical(&q));
    }

    #[test]
    fn decompose_splits_independent_groups() {
        let children = vec![
            Query::atom("R", vec![cst("a")]),
            Query::atom("S", vec![cst("b")]),
        ];
        let groups = decompose(&children);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn decompose_keeps_dependent_atoms_together() {
        let children = vec![
            Query::atom("R", vec![var("x")]),
            Query::atom("R", vec![var("x")]),
            Query::atom("S", vec![cst("b")]),
        ];
        let groups = decompose(&children);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn push_disjunction_distributes() {
        let q = Query::or(vec![
            Query::and(vec![Query::atom("A", vec![]), Query::atom("B", vec![])]),
            Query::atom("C", vec![]),
        ]);
        let pushed = push_disjunction(q);
        match pushed {
            Query::Conjunction(cs) => assert_eq!(cs.len(), 2),
            other => panic!("expected conjunction, got {other}"),
        }
    }

    #[test]
    fn push_disjunction_unchanged_without_conjunction_child() {
        let q = Query::or(vec![Query::atom("A", vec![]), Query::atom("B", vec![])]);
        let pushed = push_disjunction(q.clone());
        assert_eq!(pushed, q);
    }

    #[test]
    fn negate_atom_is_negation() {
        let a = Query::atom("R", vec![cst("a")]);
        assert_eq!(negate(&a), Query::not(a));
    }

    #[test]
    fn negate_cancels_double_negation() {
        let a = Query::atom("R", vec![cst("a")]);
        assert_eq!(negate(&Query::not(a.clone())), a);
    }

    #[test]
    fn negate_conjunction_is_disjunction_of_negations() {
        let a = Query::atom("A", vec![]);
        let b = Query::atom("B", vec![]);
        let dual = negate(&Query::and(vec![a.clone(), b.clone()]));
        assert_eq!(dual, Query::or(vec![Query::not(a), Query::not(b)]));
    }

    #[test]
    fn negate_disjunction_is_conjunction_of_negations() {
        let a = Query::atom("A", vec![]);
        let b = Query::atom("B", vec![]);
        let dual = negate(&Query::or(vec![a.clone(), b.clone()]));
        assert_eq!(dual, Query::and(vec![Query::not(a), Query::not(b)]));
    }

    #[test]
    fn negate_swaps_quantifiers() {
        let inner = Query::atom("R", vec![var("x")]);
        let dual = negate(&Query::exists("x", inner.clone()));
        assert_eq!(dual, Query::forall("x", Query::not(inner)));
    }

    #[test]
    fn strip_existentials_frees_bound_variables() {
        let q = Query::exists("x", Query::atom("R", vec![var("x")]));
        let stripped = strip_existentials(q);
        assert_eq!(free_variables(&stripped).len(), 1);
    }

    #[test]
    fn strip_existentials_leaves_forall() {
        let q = Query::forall("x", Query::atom("R", vec![var("x")]));
        let stripped = strip_existentials(q.clone());
        assert_eq!(stripped, q);
    }
}
