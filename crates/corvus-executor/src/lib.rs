//! # Corvus Executor
//!
//! The execution core of CorvusDB: the runtime value model, the Cypher
//! expression evaluator, the data-frame abstraction and the pull-based
//! physical operator pipeline, wired together by [`Runner`].
//!
//! Execution is single-threaded and pull-based: a physical plan is
//! interpreted into a lazy row stream, the runner drains it, and buffered
//! writes are committed to the graph model exactly once per successful run.

pub mod aggregate;
pub mod cmp;
pub mod eval;
pub mod executor;
pub mod frame;
pub mod functions;
pub mod logging;
pub mod plan;
pub mod planner;
pub mod runner;
pub mod value;

pub use eval::{ExecutionContext, ExpressionContext};
pub use executor::Executor;
pub use frame::{DataFrame, Row, Schema};
pub use functions::ProcedureRegistry;
pub use plan::{LogicalPlan, PhysicalPlan};
pub use planner::Planner;
pub use runner::{NoopOptimizer, Optimizer, QueryResult, Runner};
pub use value::{PathValue, Value};

use thiserror::Error;

/// Errors that can occur during planning or execution.
///
/// Every variant is fatal to the current query: partial results are
/// discarded and buffered writes are never committed. The one non-error
/// condition in this area, an unknown label or relationship type, is a
/// `tracing` warning and an empty scan, not an `ExecutionError`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A variable was referenced but never bound
    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    /// A parameter was referenced but not supplied
    #[error("unknown parameter: ${0}")]
    UnknownParameter(String),

    /// An operation received a value of the wrong type
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A temporal property accessor is not defined for the value
    #[error("unsupported temporal accessor: {0}")]
    UnsupportedTemporalAccessor(String),

    /// An argument was out of range or otherwise invalid
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No procedure registered under the name
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),

    /// A procedure was invoked with the wrong number of arguments
    #[error("procedure {name} expects {expected} argument(s), got {actual}")]
    ProcedureArity {
        name: String,
        expected: String,
        actual: usize,
    },

    /// A non-aggregating expression reached the aggregating evaluator
    #[error("non-aggregating expression in aggregate context: {0}")]
    NonAggregatingInAggregateContext(String),

    /// The planner produced or received something it cannot handle
    #[error("planning error: {0}")]
    Planning(String),

    /// Passthrough from the graph model
    #[error("graph error: {0}")]
    Graph(#[from] corvus_graph::GraphError),
}

/// Result type for execution operations.
pub type Result<T> = std::result::Result<T, ExecutionError>;
