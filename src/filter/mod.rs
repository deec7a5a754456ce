//! Filter expressions, evaluation and ordering
//!
//! Every read issued by this crate (keyed lookups, list pages, counts,
//! condition re-evaluation) is expressed as a `Filter` plus optional
//! `OrderKey`s. Endpoints evaluate them with `FilterEvaluator` and
//! `EntrySorter`.

mod ast;
mod eval;
mod sorter;

pub use ast::{Column, CompareOp, Filter, OrderKey, Predicate, SortDirection};
pub use eval::FilterEvaluator;
pub use sorter::EntrySorter;
