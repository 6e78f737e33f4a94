//! Probability store
//!
//! An associative table mapping `(relation, ground-tuple) -> probability`,
//! with per-relation arity enforcement and domain-enumeration queries.
//! This is a collaborator, not the object of this crate's study: it is
//! read-only for the duration of any evaluation and holds no inference
//! logic of its own.

use crate::error::SchemaError;
use std::collections::{BTreeMap, BTreeSet};

/// A keyed probability table for a tuple-independent probabilistic
/// database.
#[derive(Debug, Clone, Default)]
pub struct Store {
    probabilities: BTreeMap<(String, Vec<String>), f64>,
    arities: BTreeMap<String, usize>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Records a ground tuple's probability for `relation`.
    ///
    /// Fails with [`SchemaError::ArityMismatch`] if `relation` has already
    /// recorded tuples of a different arity, and with
    /// [`SchemaError::ProbabilityOutOfRange`] if `probability` is outside
    /// `[0, 1]`.
    pub fn add(
        &mut self,
        relation: impl Into<String>,
        tuple: Vec<String>,
        probability: f64,
    ) -> Result<(), SchemaError> {
        let relation = relation.into();

        if !(0.0..=1.0).contains(&probability) {
            return Err(SchemaError::ProbabilityOutOfRange(probability, relation));
        }

        match self.arities.get(&relation) {
            Some(&arity) if arity != tuple.len() => {
                return Err(SchemaError::ArityMismatch {
                    relation,
                    expected: arity,
                    got: tuple.len(),
                    tuple,
                });
            }
            Some(_) => {}
            None => {
                self.arities.insert(relation.clone(), tuple.len());
            }
        }

        self.probabilities.insert((relation, tuple), probability);
        Ok(())
    }

    /// Looks up a ground tuple's probability. Missing entries are
    /// probability `0.0` -- the closed-world assumption of TIPD, not an
    /// error.
    pub fn get(&self, relation: &str, tuple: &[String]) -> f64 {
        self.probabilities
            .get(&(relation.to_string(), tuple.to_vec()))
            .copied()
            .unwrap_or(0.0)
    }

    /// The arity recorded for `relation`, if any tuple has been added.
    pub fn arity_of(&self, relation: &str) -> Option<usize> {
        self.arities.get(relation).copied()
    }

    /// The full active domain: every constant appearing anywhere in any
    /// stored tuple.
    pub fn values(&self) -> BTreeSet<String> {
        self.probabilities
            .keys()
            .flat_map(|(_, tuple)| tuple.iter().cloned())
            .collect()
    }

    /// The active domain restricted to position `position` of `relation`
    /// -- used by R5 to bound separator-variable enumeration to values
    /// that can actually make the rewritten subquery non-trivial.
    pub fn values_at(&self, relation: &str, position: usize) -> BTreeSet<String> {
        self.probabilities
            .keys()
            .filter(|(r, _)| r == relation)
            .filter_map(|(_, tuple)| tuple.get(position).cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_add() {
        let mut store = Store::new();
        store
            .add("R", vec!["a".to_string()], 0.4)
            .expect("add should succeed");
        assert_eq!(store.get("R", &["a".to_string()]), 0.4);
        assert_eq!(store.get("R", &["b".to_string()]), 0.0);
    }

    #[test]
    fn arity_mismatch_rejected() {
        let mut store = Store::new();
        store
            .add("R", vec!["x".to_string(), "y".to_string()], 0.5)
            .unwrap();
        let err = store
            .add("R", vec!["u".to_string(), "v".to_string(), "w".to_string()], 0.5)
            .unwrap_err();
        assert!(matches!(err, SchemaError::ArityMismatch { .. }));
        // The first tuple's probability must be unaffected.
        assert_eq!(store.get("R", &["x".to_string(), "y".to_string()]), 0.5);
    }

    #[test]
    fn probability_out_of_range_rejected() {
        let mut store = Store::new();
        let err = store.add("R", vec!["a".to_string()], 1.5).unwrap_err();
        assert!(matches!(err, SchemaError::ProbabilityOutOfRange(_, _)));
    }

    #[test]
    fn domain_enumeration() {
        let mut store = Store::new();
        store.add("r1", vec!["x".to_string(), "y".to_string()], 0.5).unwrap();
        store
            .add("r2", vec!["u".to_string(), "v".to_string(), "w".to_string()], 0.8)
            .unwrap();
        let expected: BTreeSet<String> = ["x", "y", "u", "v", "w"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.values(), expected);
    }

    #[test]
    fn values_at_position_restricts_to_relation() {
        let mut store = Store::new();
        store.add("R", vec!["a".to_string()], 0.5).unwrap();
        store.add("R", vec!["b".to_string()], 0.5).unwrap();
        store
            .add("S", vec!["a".to_string(), "p".to_string()], 0.6)
            .unwrap();
        let expected: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.values_at("R", 0), expected);
        let expected_s: BTreeSet<String> = ["p"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.values_at("S", 1), expected_s);
    }
}
