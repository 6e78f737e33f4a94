//! Surface-syntax query parser
//!
//! A hand-written recursive-descent parser, in the manner of the teacher
//! lineage's own Datalog parser: manual character scanning and string
//! slicing rather than a parser-combinator or grammar-generator crate.
//! No external parsing dependency is pulled in for a grammar this small.
//!
//! Two surface syntaxes are accepted:
//!
//! - The canonical prefix form: `atom(...)`, `and(...)`, `or(...)`,
//!   `not(q)`, `exist(v, q)`, `forall(v, q)`, arbitrarily nested.
//! - Quantifier-list sugar: `"v1, v2 | R(v1, v2), S(z)"`, short for
//!   `exist(v1, exist(v2, and(R(v1, v2), S(z))))`. Identifiers left of
//!   `|` are bound; identifiers in term position elsewhere resolve to a
//!   bound variable if in scope, otherwise they are ground constants.

use crate::ast::{Query, Term, Variable};
use crate::error::ParseError;
use std::collections::BTreeSet;

/// Parses `input` as a query, trying quantifier-list sugar first (it is
/// unambiguous: the canonical prefix form never contains a top-level
/// `|`) and falling back to the canonical prefix form.
pub fn parse(input: &str) -> Result<Query, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    match find_top_level_pipe(input) {
        Some(pipe_at) => parse_sugar(&input[..pipe_at], &input[pipe_at + 1..]),
        None => parse_prefix(input, &BTreeSet::new()),
    }
}

/// Finds the byte index of a `|` that occurs outside any parentheses.
fn find_top_level_pipe(input: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '|' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_sugar(vars: &str, body: &str) -> Result<Query, ParseError> {
    let var_names: Vec<&str> = vars.split(',').map(str::trim).collect();
    if var_names.iter().any(|v| v.is_empty()) {
        return Err(ParseError::EmptyAtom);
    }

    let mut scope = BTreeSet::new();
    for name in &var_names {
        if !scope.insert(name.to_string()) {
            return Err(ParseError::ShadowedVariable(name.to_string()));
        }
    }

    let atom_strings = split_top_level_commas(body.trim())?;
    if atom_strings.is_empty() {
        return Err(ParseError::EmptyAtom);
    }
    let atoms: Vec<Query> = atom_strings
        .iter()
        .map(|s| parse_prefix(s.trim(), &scope))
        .collect::<Result<_, _>>()?;

    let body = if atoms.len() == 1 {
        atoms.into_iter().next().expect("single atom")
    } else {
        Query::Conjunction(atoms)
    };

    Ok(var_names
        .into_iter()
        .rev()
        .fold(body, |inner, name| Query::exists(name, inner)))
}

/// Parses the canonical prefix form, resolving bare identifiers against
/// `scope` (the set of variable names bound by an enclosing `exist`/
/// `forall` seen so far while descending).
fn parse_prefix(input: &str, scope: &BTreeSet<String>) -> Result<Query, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::EmptyAtom);
    }

    if !input.contains('(') {
        return Ok(Query::atom(input.to_string(), Vec::new()));
    }

    let (operator, children) = split_operator(input)?;

    match operator.as_str() {
        "not" => {
            if children.len() != 1 {
                return Err(ParseError::ArityMismatch {
                    operator: "not".to_string(),
                    expected: "1".to_string(),
                    got: children.len(),
                });
            }
            Ok(Query::not(parse_prefix(&children[0], scope)?))
        }
        "and" => {
            let parsed = children
                .iter()
                .map(|c| parse_prefix(c, scope))
                .collect::<Result<_, _>>()?;
            Ok(Query::Conjunction(parsed))
        }
        "or" => {
            let parsed = children
                .iter()
                .map(|c| parse_prefix(c, scope))
                .collect::<Result<_, _>>()?;
            Ok(Query::Disjunction(parsed))
        }
        "exist" | "forall" => {
            if children.len() != 2 {
                return Err(ParseError::ArityMismatch {
                    operator: operator.clone(),
                    expected: "2".to_string(),
                    got: children.len(),
                });
            }
            let var_name = children[0].trim().to_string();
            if var_name.is_empty() {
                return Err(ParseError::EmptyAtom);
            }
            if scope.contains(&var_name) {
                return Err(ParseError::ShadowedVariable(var_name));
            }
            let mut inner_scope = scope.clone();
            inner_scope.insert(var_name.clone());
            let inner = parse_prefix(&children[1], &inner_scope)?;
            Ok(if operator == "exist" {
                Query::exists(var_name.as_str(), inner)
            } else {
                Query::forall(var_name.as_str(), inner)
            })
        }
        relation => {
            if relation.is_empty() {
                return Err(ParseError::EmptyAtom);
            }
            let terms = children
                .iter()
                .map(|c| parse_term(c, scope))
                .collect::<Result<_, _>>()?;
            Ok(Query::atom(relation.to_string(), terms))
        }
    }
}

fn parse_term(input: &str, scope: &BTreeSet<String>) -> Result<Term, ParseError> {
    let name = input.trim();
    if name.is_empty() {
        return Err(ParseError::EmptyAtom);
    }
    if scope.contains(name) {
        Ok(Term::Var(Variable::new(name)))
    } else {
        Ok(Term::Const(name.to_string()))
    }
}

/// Splits `operator(child1, child2, ...)` into the operator name and the
/// top-level (paren-depth-respecting) comma-separated child strings.
fn split_operator(input: &str) -> Result<(String, Vec<String>), ParseError> {
    let open = input.find('(').ok_or(ParseError::EmptyAtom)?;
    if !input.ends_with(')') {
        return Err(ParseError::UnbalancedParens);
    }
    let operator = input[..open].trim().to_string();
    let inner = &input[open + 1..input.len() - 1];
    let children = split_top_level_commas(inner)?;
    Ok((operator, children))
}

/// Splits `input` on commas that occur at paren-depth zero, mirroring
/// the teacher lineage's `split_by_comma`. Empty input yields no
/// children (a zero-arity atom or connective).
fn split_top_level_commas(input: &str) -> Result<Vec<String>, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ParseError::UnbalancedParens);
                }
            }
            ',' if depth == 0 => {
                parts.push(input[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ParseError::UnbalancedParens);
    }
    parts.push(input[start..].trim().to_string());
    Ok(parts)
}
