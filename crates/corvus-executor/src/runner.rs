//! Query orchestration.
//!
//! [`Runner`] owns the graph and the procedure registry, takes a statement
//! AST through planning, optimization and execution, drains the root frame,
//! and commits the write journal exactly once per successful run. On any
//! error the journal is discarded and the graph is untouched.

use crate::eval::{ExecutionContext, Parameters};
use crate::executor::Executor;
use crate::frame::{DataFrame, Row, Schema};
use crate::functions::ProcedureRegistry;
use crate::plan::{LogicalPlan, PhysicalPlan};
use crate::planner::Planner;
use crate::value::Value;
use crate::Result;
use corvus_ast::{Query, Statement};
use corvus_graph::GraphModel;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

// =============================================================================
// Optimizer hook
// =============================================================================

/// A physical-plan rewriter. The engine itself ships only the identity
/// implementation; hosts plug their own rule sets in.
pub trait Optimizer {
    /// Rewrites a physical plan into an equivalent, hopefully cheaper one.
    fn optimize(&self, plan: PhysicalPlan) -> PhysicalPlan;
}

/// The identity optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOptimizer;

impl Optimizer for NoopOptimizer {
    fn optimize(&self, plan: PhysicalPlan) -> PhysicalPlan {
        plan
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Executes statements against an owned graph model.
pub struct Runner<G: GraphModel> {
    graph: G,
    procedures: ProcedureRegistry,
    optimizer: Box<dyn Optimizer>,
}

impl<G: GraphModel> Runner<G> {
    /// A runner over the graph with the standard library and no
    /// optimization rules.
    pub fn new(graph: G) -> Self {
        Self {
            graph,
            procedures: ProcedureRegistry::standard(),
            optimizer: Box::new(NoopOptimizer),
        }
    }

    /// Replaces the procedure registry.
    pub fn with_procedures(mut self, procedures: ProcedureRegistry) -> Self {
        self.procedures = procedures;
        self
    }

    /// Plugs in an optimizer.
    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// The underlying graph.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Consumes the runner, returning the graph.
    pub fn into_graph(self) -> G {
        self.graph
    }

    /// Runs a single query.
    pub fn run_query(&mut self, query: Query, params: Parameters) -> Result<QueryResult> {
        self.run(&Statement::Query(query), params)
    }

    /// Runs a statement: plan, optimize, execute, drain, commit.
    pub fn run(&mut self, statement: &Statement, params: Parameters) -> Result<QueryResult> {
        let _span = crate::logging::statement_span(match statement {
            Statement::Query(_) => "query",
            Statement::Union { .. } => "union",
        })
        .entered();
        let planner = Planner::new(&self.procedures);
        let logical = planner.plan_statement(statement)?;
        let physical = planner.physical(&logical)?;
        let optimized = self.optimizer.optimize(physical.clone());
        debug!(plan = %optimized, "executing physical plan");

        let schema = optimized.schema(&Schema::empty())?;

        let (rows, journal) = {
            let exec = ExecutionContext::new(&self.graph, &self.procedures, params);
            let executor = Executor::new(&exec);
            let frame = executor.execute(&optimized, DataFrame::unit())?;
            let collected = frame.collect();
            drop(frame);
            drop(executor);
            // An execution error drops the journal here, uncommitted.
            (collected?, exec.journal.into_inner())
        };

        let mut stats = BTreeMap::new();
        stats.insert("rows".to_string(), rows.len().to_string());
        if !journal.is_empty() {
            let summary = self.graph.commit(journal)?;
            stats.insert(
                "nodes_created".to_string(),
                summary.nodes_created.to_string(),
            );
            stats.insert("rels_created".to_string(), summary.rels_created.to_string());
            stats.insert(
                "properties_set".to_string(),
                summary.properties_set.to_string(),
            );
            stats.insert(
                "nodes_deleted".to_string(),
                summary.nodes_deleted.to_string(),
            );
            stats.insert("rels_deleted".to_string(), summary.rels_deleted.to_string());
        }

        Ok(QueryResult {
            schema,
            rows,
            stats,
            ast: statement.clone(),
            logical,
            physical,
            optimized,
        })
    }
}

// =============================================================================
// QueryResult
// =============================================================================

/// The materialized result of one statement, with every intermediate plan
/// attached for debugging and test assertions.
#[derive(Debug, Clone)]
pub struct QueryResult {
    schema: Schema,
    rows: Vec<Row>,
    stats: BTreeMap<String, String>,
    ast: Statement,
    logical: LogicalPlan,
    physical: PhysicalPlan,
    optimized: PhysicalPlan,
}

impl QueryResult {
    /// Column names, in the root operator's schema order.
    pub fn columns(&self) -> Vec<&str> {
        self.schema.names().collect()
    }

    /// The result schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The raw rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows were produced.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as name-to-value maps, in result order.
    pub fn records(&self) -> impl Iterator<Item = BTreeMap<&str, &Value>> + '_ {
        self.rows.iter().map(move |row| {
            self.schema
                .names()
                .zip(row.iter())
                .collect::<BTreeMap<&str, &Value>>()
        })
    }

    /// An owned copy that can be handed out and traversed independently.
    /// Rows are already materialized, so this is a plain clone.
    pub fn cache(&self) -> QueryResult {
        self.clone()
    }

    /// Execution statistics (row count, commit counters).
    pub fn stats(&self) -> &BTreeMap<String, String> {
        &self.stats
    }

    /// The statement this result came from.
    pub fn ast(&self) -> &Statement {
        &self.ast
    }

    /// The logical plan.
    pub fn logical_plan(&self) -> &LogicalPlan {
        &self.logical
    }

    /// The physical plan before optimization.
    pub fn physical_plan(&self) -> &PhysicalPlan {
        &self.physical
    }

    /// The physical plan that actually ran.
    pub fn optimized_plan(&self) -> &PhysicalPlan {
        &self.optimized
    }

    /// The rows as a JSON array of objects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    serde_json::Value::Object(
                        self.schema
                            .names()
                            .zip(row.iter())
                            .map(|(n, v)| (n.to_string(), v.to_json()))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    /// Renders at most `limit` rows as a bordered table.
    pub fn show(&self, limit: usize) -> String {
        let mut out = String::new();
        self.render(&mut out, Some(limit))
            .unwrap_or_else(|_| out.clear());
        out
    }

    fn render(&self, f: &mut impl fmt::Write, limit: Option<usize>) -> fmt::Result {
        if self.schema.is_empty() {
            return writeln!(f, "(no columns)");
        }
        let shown = limit.unwrap_or(self.rows.len()).min(self.rows.len());

        // Column widths over the header and the shown rows.
        let mut widths: Vec<usize> = self.schema.names().map(str::len).collect();
        for row in &self.rows[..shown] {
            for (i, value) in row.iter().enumerate() {
                widths[i] = widths[i].max(format!("{}", value).len());
            }
        }

        let header: Vec<String> = self
            .schema
            .names()
            .enumerate()
            .map(|(i, n)| format!("{:width$}", n, width = widths[i]))
            .collect();
        writeln!(f, "| {} |", header.join(" | "))?;

        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "|-{}-|", sep.join("-|-"))?;

        for row in &self.rows[..shown] {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{:width$}", format!("{}", v), width = widths[i]))
                .collect();
            writeln!(f, "| {} |", cells.join(" | "))?;
        }

        if shown < self.rows.len() {
            writeln!(f, "... ({} more row(s))", self.rows.len() - shown)?;
        }
        writeln!(f, "{} row(s)", self.rows.len())?;
        Ok(())
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, None)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_ast::{
        Clause, Expression as E, MatchClause, NodePattern, Pattern, ReturnClause, ReturnItem,
        SetClause, SetItem,
    };
    use corvus_graph::InMemoryGraph;

    fn people() -> InMemoryGraph {
        InMemoryGraph::builder()
            .add_labeled_node(0, "Person", [("name", "Alice")])
            .add_labeled_node(1, "Person", [("name", "Bob")])
            .build()
    }

    fn match_return(items: Vec<ReturnItem>) -> Query {
        Query::new(vec![
            Clause::Match(MatchClause {
                patterns: vec![Pattern::single(NodePattern::labeled("n", "Person"))],
                where_clause: None,
            }),
            Clause::Return(ReturnClause::items(items)),
        ])
    }

    #[test]
    fn test_run_simple_match() {
        let mut runner = Runner::new(people());
        let result = runner
            .run_query(
                match_return(vec![ReturnItem::property("n", "name")]),
                Parameters::new(),
            )
            .unwrap();
        assert_eq!(result.columns(), vec!["n.name"]);
        assert_eq!(result.row_count(), 2);

        let names: Vec<_> = result
            .records()
            .map(|r| (*r.get("n.name").unwrap()).clone())
            .collect();
        assert!(names.contains(&Value::Str("Alice".into())));
        assert!(names.contains(&Value::Str("Bob".into())));
    }

    #[test]
    fn test_result_exposes_every_plan() {
        let mut runner = Runner::new(people());
        let result = runner
            .run_query(
                match_return(vec![ReturnItem::variable("n")]),
                Parameters::new(),
            )
            .unwrap();
        assert!(matches!(result.ast(), Statement::Query(_)));
        assert!(format!("{}", result.logical_plan()).contains("Scan"));
        assert!(format!("{}", result.physical_plan()).contains("NodeByLabelScan"));
        assert_eq!(
            format!("{}", result.physical_plan()),
            format!("{}", result.optimized_plan())
        );
    }

    #[test]
    fn test_show_limits_rows() {
        let mut runner = Runner::new(people());
        let result = runner
            .run_query(
                match_return(vec![ReturnItem::property("n", "name")]),
                Parameters::new(),
            )
            .unwrap();
        let table = result.show(1);
        assert!(table.contains("n.name"));
        assert!(table.contains("1 more row(s)"), "{}", table);
        assert!(table.contains("2 row(s)"));
    }

    #[test]
    fn test_cache_is_traversable_repeatedly() {
        let mut runner = Runner::new(people());
        let result = runner
            .run_query(
                match_return(vec![ReturnItem::property("n", "name")]),
                Parameters::new(),
            )
            .unwrap();
        let cached = result.cache();
        assert_eq!(cached.records().count(), 2);
        assert_eq!(cached.records().count(), 2);
    }

    #[test]
    fn test_set_commits_once_after_drain() {
        let mut runner = Runner::new(people());
        let query = Query::new(vec![
            Clause::Match(MatchClause {
                patterns: vec![Pattern::single(NodePattern::labeled("n", "Person"))],
                where_clause: None,
            }),
            Clause::Set(SetClause {
                items: vec![SetItem {
                    variable: "n".into(),
                    key: "checked".into(),
                    value: E::bool(true),
                }],
            }),
            Clause::Return(ReturnClause::items(vec![ReturnItem::variable("n")])),
        ]);
        let result = runner.run_query(query, Parameters::new()).unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.stats().get("properties_set"), Some(&"2".to_string()));

        // The commit is visible to the next query.
        let next = runner
            .run_query(
                match_return(vec![ReturnItem::property("n", "checked")]),
                Parameters::new(),
            )
            .unwrap();
        for record in next.records() {
            assert_eq!(**record.get("n.checked").unwrap(), Value::Bool(true));
        }
    }

    #[test]
    fn test_failed_query_discards_writes() {
        let mut runner = Runner::new(people());
        // SET n.bad to a node value: the property write is buffered for
        // Alice, then unwrapping fails; nothing may be committed.
        let query = Query::new(vec![
            Clause::Match(MatchClause {
                patterns: vec![Pattern::single(NodePattern::labeled("n", "Person"))],
                where_clause: None,
            }),
            Clause::Set(SetClause {
                items: vec![SetItem {
                    variable: "n".into(),
                    key: "bad".into(),
                    value: E::var("n"),
                }],
            }),
            Clause::Return(ReturnClause::items(vec![ReturnItem::variable("n")])),
        ]);
        assert!(runner.run_query(query, Parameters::new()).is_err());

        let check = runner
            .run_query(
                match_return(vec![ReturnItem::property("n", "bad")]),
                Parameters::new(),
            )
            .unwrap();
        for record in check.records() {
            assert_eq!(**record.get("n.bad").unwrap(), Value::Null);
        }
    }
}
