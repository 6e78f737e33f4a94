//! Lifted probabilistic evaluator
//!
//! The recursive inference procedure that computes `Pr[Q]` against a
//! [`Store`] by repeatedly decomposing `Q` using the pure predicates in
//! [`crate::analysis`], bottoming out in ground-atom lookups. Rules
//! R1-R8 are tried in order; the first applicable one fires. This is the
//! hard engineering of the crate -- everything else is a collaborator.

use crate::analysis::{atoms, decompose, free_variables, negate, push_disjunction, rewrite, separator_variable, strip_existentials};
use crate::ast::{Query, Term, Variable};
use crate::config::EvaluatorConfig;
use crate::error::EvalError;
use crate::store::Store;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

/// Evaluates `query` against `store`, following the configured
/// inclusion-exclusion ceiling. Returns `Err(EvalError::Intractable)`
/// when no rule in R1-R7 applies, or
/// `Err(EvalError::InclusionExclusionCeilingExceeded)` when R6's
/// disjunct count exceeds `config.inclusion_exclusion_ceiling`.
pub fn eval(query: &Query, store: &Store, config: &EvaluatorConfig) -> Result<f64, EvalError> {
    eval_at(query, store, config, 0)
}

fn eval_at(query: &Query, store: &Store, config: &EvaluatorConfig, depth: usize) -> Result<f64, EvalError> {
    trace!(depth, %query, "evaluating");

    match query {
        // R1 -- ground atom.
        Query::Atom(a) if a.is_ground() => {
            let p = store.get(&a.relation, &a.ground_tuple());
            trace!(depth, rule = "R1", relation = %a.relation, probability = p, "ground atom");
            Ok(p)
        }

        // An atom with a free variable and no enclosing separator
        // elimination can reach here directly (e.g. the whole query is a
        // bare non-ground atom); no rule resolves it.
        Query::Atom(_) => Err(EvalError::intractable(query)),

        // R2 -- negation.
        Query::Negation(inner) => {
            let p = eval_at(inner, store, config, depth + 1)?;
            trace!(depth, rule = "R2", "negation");
            Ok(1.0 - p)
        }

        Query::Conjunction(children) => eval_conjunction(children, store, config, depth),
        Query::Disjunction(children) => eval_disjunction(children, store, config, depth),

        Query::Exists(v, inner) => eval_quantifier(v, inner, true, query, store, config, depth),
        Query::Forall(v, inner) => eval_quantifier(v, inner, false, query, store, config, depth),
    }
}

fn eval_conjunction(
    children: &[Query],
    store: &Store,
    config: &EvaluatorConfig,
    depth: usize,
) -> Result<f64, EvalError> {
    let children = flatten_conjunction(children);

    if has_complementary_literals(&children) {
        // An atom and its own negation both present: unsatisfiable under
        // every valuation, regardless of the store.
        return Ok(0.0);
    }
    if children.is_empty() {
        return Ok(1.0);
    }
    if children.len() == 1 {
        return eval_at(&children[0], store, config, depth + 1);
    }

    let groups = decompose(&children);
    if groups.len() > 1 {
        // R3/R4 -- independent decomposition: multiply group results.
        trace!(depth, rule = "R4", groups = groups.len(), "independent conjunction decomposition");
        let mut product = 1.0;
        for group in groups {
            let sub = wrap(Query::Conjunction, group);
            product *= eval_at(&sub, store, config, depth + 1)?;
        }
        Ok(product)
    } else {
        // R7 only resolves dependence that's already ground -- by
        // construction a safe, fully quantified query never reaches this
        // point with a free variable still standing, since its binder
        // would already have been eliminated by R5. A free variable here
        // means no separator ever covered it: unsafe, not ground-dependent.
        let whole = Query::Conjunction(children.clone());
        if !free_variables(&whole).is_empty() {
            return Err(EvalError::intractable(&whole));
        }

        // R7 -- reduce via the De Morgan dual, then R6. `negate` pushes
        // the negation all the way to each child's atoms instead of
        // wrapping a bare `Negation` around it, so a disjunctive child
        // becomes a conjunction of negated atoms rather than an opaque
        // negated disjunction; `push_disjunction` is then a no-op unless
        // the dual mixes bare literals with such conjunctions, in which
        // case it folds them into the same shape. Either way the terms
        // R6 sums over are conjunctions of atoms, which `decompose`/R1
        // resolve directly instead of re-entering R7.
        trace!(depth, rule = "R7", "conjunction via inclusion-exclusion dual");
        let dual_children: Vec<Query> = children.iter().map(negate).collect();
        let disjuncts = match push_disjunction(Query::Disjunction(dual_children.clone())) {
            Query::Disjunction(ds) => ds,
            _ => dual_children,
        };
        let dual_result = eval_inclusion_exclusion(&disjuncts, store, config, depth + 1)?;
        Ok(1.0 - dual_result)
    }
}

/// True if `children` contains some atom alongside its own exact
/// negation -- a contradiction no rule can resolve by decomposition
/// alone, since an atom and its negation always unify with each other.
fn has_complementary_literals(children: &[Query]) -> bool {
    children.iter().any(|c| match c {
        Query::Negation(inner) if matches!(inner.as_ref(), Query::Atom(_)) => {
            children.iter().any(|other| other == inner.as_ref())
        }
        _ => false,
    })
}

fn eval_disjunction(
    children: &[Query],
    store: &Store,
    config: &EvaluatorConfig,
    depth: usize,
) -> Result<f64, EvalError> {
    let children = flatten_disjunction(children);

    if has_complementary_literals(&children) {
        // An atom and its own negation both present: a tautology, true
        // under every valuation.
        return Ok(1.0);
    }
    if children.is_empty() {
        return Ok(0.0);
    }
    if children.len() == 1 {
        return eval_at(&children[0], store, config, depth + 1);
    }

    let groups = decompose(&children);
    if groups.len() > 1 {
        // R3/R4 -- independent decomposition: complement-product.
        trace!(depth, rule = "R4", groups = groups.len(), "independent disjunction decomposition");
        let mut complement_product = 1.0;
        for group in groups {
            let sub = wrap(Query::Disjunction, group);
            complement_product *= 1.0 - eval_at(&sub, store, config, depth + 1)?;
        }
        Ok(1.0 - complement_product)
    } else {
        // Same groundedness precondition as R7, see eval_conjunction.
        let whole = Query::Disjunction(children.clone());
        if !free_variables(&whole).is_empty() {
            return Err(EvalError::intractable(&whole));
        }

        // R6 -- inclusion-exclusion.
        eval_inclusion_exclusion(&children, store, config, depth)
    }
}

/// Splices nested `Conjunction` children into their parent (AND is
/// associative) and removes structurally identical duplicates (AND is
/// idempotent: `p and p == p`). Collapsing duplicates this way is what
/// keeps R7 terminating: an inclusion-exclusion full-subset term that
/// reconjoins every (negated) child would otherwise recreate the exact
/// dependency structure that sent it to R7 in the first place.
fn flatten_conjunction(children: &[Query]) -> Vec<Query> {
    let mut flat = Vec::new();
    for child in children {
        match child {
            Query::Conjunction(cs) => flat.extend(flatten_conjunction(cs)),
            other => flat.push(other.clone()),
        }
    }
    flat.sort_by_key(ToString::to_string);
    flat.dedup();
    flat
}

/// The disjunctive counterpart of [`flatten_conjunction`]: splices nested
/// `Disjunction` children and removes duplicates (OR is associative and
/// idempotent too), for the same termination reason applied to R6.
fn flatten_disjunction(children: &[Query]) -> Vec<Query> {
    let mut flat = Vec::new();
    for child in children {
        match child {
            Query::Disjunction(cs) => flat.extend(flatten_disjunction(cs)),
            other => flat.push(other.clone()),
        }
    }
    flat.sort_by_key(ToString::to_string);
    flat.dedup();
    flat
}

/// Wraps a decomposed group of one or more children back into a
/// connective node; single-member groups bypass the wrapper, per R4.
fn wrap(make: fn(Vec<Query>) -> Query, mut group: Vec<Query>) -> Query {
    if group.len() == 1 {
        group.pop().expect("single-member group")
    } else {
        make(group)
    }
}

/// R6: `eval(C1 or .. or Ck) = sum over nonempty S subset of {1..k} of
/// (-1)^(|S|+1) * eval(and of Ci in S)`, after stripping existentials
/// from each disjunct and cancelling syntactically identical terms
/// (tracked as a signed multiplicity per canonical combination rather
/// than recursing on every subset independently).
fn eval_inclusion_exclusion(
    children: &[Query],
    store: &Store,
    config: &EvaluatorConfig,
    depth: usize,
) -> Result<f64, EvalError> {
    let k = children.len();
    if k > config.inclusion_exclusion_ceiling {
        return Err(EvalError::InclusionExclusionCeilingExceeded {
            disjuncts: k,
            ceiling: config.inclusion_exclusion_ceiling,
        });
    }

    trace!(depth, rule = "R6", disjuncts = k, "inclusion-exclusion expansion");

    let normalized: Vec<Query> = children.iter().map(|c| strip_existentials(c.clone())).collect();

    // Accumulate signed coefficients per canonical (sorted, deduplicated
    // by structural equality) conjunction, so that subsets which reduce
    // to the same underlying formula cancel instead of being evaluated
    // (and recursed into) twice.
    let mut coefficients: HashMap<Vec<Query>, i64> = HashMap::new();
    for subset_mask in 1u32..(1u32 << k) {
        let mut combo: Vec<Query> = Vec::new();
        for (i, child) in normalized.iter().enumerate() {
            if subset_mask & (1 << i) != 0 {
                combo.push(child.clone());
            }
        }
        let sign: i64 = if combo.len() % 2 == 1 { 1 } else { -1 };
        combo.sort_by_key(ToString::to_string);
        combo.dedup();
        *coefficients.entry(combo).or_insert(0) += sign;
    }

    let mut sum = 0.0;
    for (combo, coefficient) in coefficients {
        if coefficient == 0 {
            continue;
        }
        let conjunction = wrap(Query::Conjunction, combo);
        let term = eval_at(&conjunction, store, config, depth + 1)?;
        sum += coefficient as f64 * term;
    }

    Ok(sum)
}

fn eval_quantifier(
    variable: &Variable,
    inner: &Query,
    is_exists: bool,
    original: &Query,
    store: &Store,
    config: &EvaluatorConfig,
    depth: usize,
) -> Result<f64, EvalError> {
    if !separator_variable(variable, inner) {
        return Err(EvalError::intractable(original));
    }

    let domain = separator_domain(variable, inner, store);
    trace!(
        depth,
        rule = "R5",
        variable = %variable,
        quantifier = if is_exists { "exists" } else { "forall" },
        domain_size = domain.len(),
        "separator elimination"
    );

    if is_exists {
        let mut complement_product = 1.0;
        for constant in &domain {
            let rewritten = rewrite(inner, variable, constant);
            complement_product *= 1.0 - eval_at(&rewritten, store, config, depth + 1)?;
        }
        Ok(1.0 - complement_product)
    } else {
        let mut product = 1.0;
        for constant in &domain {
            let rewritten = rewrite(inner, variable, constant);
            product *= eval_at(&rewritten, store, config, depth + 1)?;
        }
        Ok(product)
    }
}

/// The active domain restricted to the positions at which `variable`
/// occurs in `query` -- sound because `separator_variable` guarantees a
/// single, relation-consistent position.
fn separator_domain(variable: &Variable, query: &Query, store: &Store) -> BTreeSet<String> {
    let mut positions: BTreeSet<(String, usize)> = BTreeSet::new();
    for atom in atoms(query) {
        if let Some(pos) = atom.terms.iter().position(|t| matches!(t, Term::Var(v) if v == variable)) {
            positions.insert((atom.relation.clone(), pos));
        }
    }

    let mut domain = BTreeSet::new();
    for (relation, position) in positions {
        domain.extend(store.values_at(&relation, position));
    }
    domain
}
