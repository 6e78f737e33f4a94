//! # tipd
//!
//! A lifted probabilistic inference engine over a tuple-independent
//! probabilistic database (TIPD): every fact is an independent Bernoulli
//! random variable, and a query's probability is computed by a recursive
//! rule set rather than by grounding out possible worlds.
//!
//! ## Pipeline
//!
//! ```text
//! surface syntax
//!     ↓
//! [parser]               → Query (ast::Query)
//!     ↓
//! [analysis]              → independence / safety / separator-variable facts
//!     ↓
//! [evaluator]              → Pr[Query] against a Store, using rules R1-R8
//! ```
//!
//! `store` holds the probability table the evaluator reads from;
//! `config` and `error` are collaborators used throughout the pipeline
//! rather than stages of it.
//!
//! ## Example
//!
//! ```
//! use tipd::{config::Config, evaluator, parser, store::Store};
//!
//! let mut store = Store::new();
//! store.add("smokes", vec!["alice".to_string()], 0.3).unwrap();
//!
//! let query = parser::parse("smokes(alice)").unwrap();
//! let config = Config::default();
//! let probability = evaluator::eval(&query, &store, &config.evaluator).unwrap();
//! assert_eq!(probability, 0.3);
//! ```

pub mod analysis;
pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod store;

pub use ast::{Atom, Query, Term, Variable};
pub use config::Config;
pub use error::{EvalError, ParseError, SchemaError};
pub use store::Store;
