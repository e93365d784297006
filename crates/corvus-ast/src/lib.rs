//! # Corvus AST
//!
//! The abstract syntax tree consumed by the CorvusDB planner and evaluator.
//!
//! The expression grammar is a closed sum: every expression kind the
//! evaluator understands is a variant of [`Expression`], so a new kind is a
//! compile error everywhere it is not handled.

mod ast;

pub use ast::*;
