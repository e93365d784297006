//! Query planning.
//!
//! Translates a statement AST into a logical plan, then lowers the logical
//! plan into a physical one. The pass that matters most for correctness is
//! the projection split: items containing aggregating calls become the
//! aggregation set, the rest become grouping keys, so the evaluator never
//! sees an aggregate in a scalar position.

use crate::aggregate::contains_aggregate;
use crate::functions::ProcedureRegistry;
use crate::plan::{LogicalPlan, PhysicalPlan};
use crate::{ExecutionError, Result};
use corvus_ast::{
    Clause, Expression, MatchClause, NodePattern, PathStep, Pattern, Query, RelPattern,
    ReturnItem, SortItem, Statement,
};

/// Query planner: AST to logical to physical plans.
pub struct Planner<'a> {
    procedures: &'a ProcedureRegistry,
}

impl<'a> Planner<'a> {
    /// Creates a planner using the given registry to classify aggregates.
    pub fn new(procedures: &'a ProcedureRegistry) -> Self {
        Self { procedures }
    }

    // =========================================================================
    // Logical planning
    // =========================================================================

    /// Plans a statement.
    pub fn plan_statement(&self, statement: &Statement) -> Result<LogicalPlan> {
        match statement {
            Statement::Query(query) => self.plan_query(query),
            Statement::Union { left, right, all } => Ok(LogicalPlan::Union {
                left: Box::new(self.plan_statement(left)?),
                right: Box::new(self.plan_statement(right)?),
                all: *all,
            }),
        }
    }

    fn plan_query(&self, query: &Query) -> Result<LogicalPlan> {
        if query.clauses.is_empty() {
            return Err(ExecutionError::Planning("empty query".into()));
        }
        let mut steps = Vec::new();
        let mut counter = 0usize;

        for clause in &query.clauses {
            match clause {
                Clause::Match(c) => {
                    steps.extend(self.plan_match(c, &mut counter)?);
                }
                Clause::OptionalMatch(c) => {
                    let inner = sequence(self.plan_match(c, &mut counter)?);
                    steps.push(LogicalPlan::Apply {
                        inner: Box::new(inner),
                        optional: true,
                    });
                }
                Clause::Create(c) => {
                    for pattern in &c.patterns {
                        steps.push(LogicalPlan::Create {
                            pattern: pattern.clone(),
                        });
                    }
                }
                Clause::Merge(c) => {
                    steps.push(LogicalPlan::Merge {
                        pattern: c.pattern.clone(),
                    });
                }
                Clause::Set(c) => {
                    steps.push(LogicalPlan::SetProperties {
                        items: c.items.clone(),
                    });
                }
                Clause::Delete(c) => {
                    steps.push(LogicalPlan::Delete {
                        detach: c.detach,
                        items: c.items.clone(),
                    });
                }
                Clause::Unwind(c) => {
                    steps.push(LogicalPlan::Unwind {
                        expression: c.expression.clone(),
                        alias: c.alias.clone(),
                    });
                }
                Clause::With(c) => {
                    steps.extend(self.plan_projection(
                        &c.items,
                        c.distinct,
                        c.order_by.as_deref(),
                        c.skip,
                        c.limit,
                        c.where_clause.as_ref(),
                    )?);
                }
                Clause::Return(c) => {
                    steps.extend(self.plan_projection(
                        &c.items,
                        c.distinct,
                        c.order_by.as_deref(),
                        c.skip,
                        c.limit,
                        None,
                    )?);
                }
            }
        }

        Ok(sequence(steps))
    }

    /// Plans one MATCH clause into scan/expand/filter steps.
    fn plan_match(&self, clause: &MatchClause, counter: &mut usize) -> Result<Vec<LogicalPlan>> {
        if clause.patterns.is_empty() {
            return Err(ExecutionError::Planning(
                "MATCH requires at least one pattern".into(),
            ));
        }
        let mut steps = Vec::new();
        for pattern in &clause.patterns {
            self.plan_pattern(pattern, counter, &mut steps)?;
        }
        if let Some(ref predicate) = clause.where_clause {
            steps.push(LogicalPlan::Filter {
                predicate: predicate.clone(),
            });
        }
        Ok(steps)
    }

    fn plan_pattern(
        &self,
        pattern: &Pattern,
        counter: &mut usize,
        steps: &mut Vec<LogicalPlan>,
    ) -> Result<()> {
        let path_bound = pattern.variable.is_some();
        let start_var = bind_name(&pattern.start, counter);

        // An unconstrained start of a relationship chain becomes a
        // relationship scan binding both endpoints at once; everything else
        // starts from a node scan.
        let start_unconstrained =
            pattern.start.labels.is_empty() && pattern.start.properties.is_empty();
        let mut chain = pattern.chain.iter();
        let mut current = start_var.clone();
        let mut path_step_vars: Vec<(bool, String)> = vec![(true, start_var.clone())];

        if start_unconstrained && !pattern.chain.is_empty() {
            let (rel, node) = chain.next().ok_or_else(|| {
                ExecutionError::Planning("pattern chain vanished during planning".into())
            })?;
            let rel_var = rel_name(rel, path_bound, counter);
            let to_var = bind_name(node, counter);
            steps.push(LogicalPlan::RelationshipScan {
                from: current.clone(),
                rel: rel_var.clone(),
                to: to_var.clone(),
                types: rel.types.clone(),
                direction: rel.direction,
            });
            push_node_filters(node, &to_var, steps);
            push_rel_filters(rel, rel_var.as_deref(), steps);
            if let Some(rv) = rel_var {
                path_step_vars.push((false, rv));
            }
            path_step_vars.push((true, to_var.clone()));
            current = to_var;
        } else {
            steps.push(LogicalPlan::Scan {
                variable: start_var.clone(),
                labels: pattern.start.labels.clone(),
                properties: pattern.start.properties.clone(),
            });
        }

        for (rel, node) in chain {
            let rel_var = rel_name(rel, path_bound, counter);
            let to_var = bind_name(node, counter);
            steps.push(LogicalPlan::Expand {
                from: current.clone(),
                rel: rel_var.clone(),
                to: to_var.clone(),
                types: rel.types.clone(),
                direction: rel.direction,
            });
            push_node_filters(node, &to_var, steps);
            push_rel_filters(rel, rel_var.as_deref(), steps);
            if let Some(rv) = rel_var {
                path_step_vars.push((false, rv));
            }
            path_step_vars.push((true, to_var.clone()));
            current = to_var;
        }

        if let Some(ref path_var) = pattern.variable {
            steps.push(LogicalPlan::BindPath {
                variable: path_var.clone(),
                step: build_path_step(&path_step_vars),
            });
        }
        Ok(())
    }

    /// Plans a WITH/RETURN boundary.
    ///
    /// Items are split into grouping keys and aggregations when any item
    /// aggregates; ORDER BY keys naming output columns are rewritten to
    /// simple variable references, and keys that only make sense against
    /// the pre-projection rows push the sort below the projection.
    fn plan_projection(
        &self,
        items: &[ReturnItem],
        distinct: bool,
        order_by: Option<&[SortItem]>,
        skip: Option<i64>,
        limit: Option<i64>,
        where_clause: Option<&Expression>,
    ) -> Result<Vec<LogicalPlan>> {
        let mut steps = Vec::new();

        let has_aggregate = items
            .iter()
            .any(|item| contains_aggregate(&item.expression, self.procedures));

        if has_aggregate {
            let (groupings, aggregations): (Vec<_>, Vec<_>) = items
                .iter()
                .cloned()
                .partition(|item| !contains_aggregate(&item.expression, self.procedures));
            steps.push(LogicalPlan::Aggregate {
                groupings,
                aggregations,
            });
        } else {
            steps.push(LogicalPlan::Project {
                items: items.to_vec(),
            });
        }

        if distinct {
            steps.push(LogicalPlan::Distinct);
        }

        if let Some(predicate) = where_clause {
            steps.push(LogicalPlan::Filter {
                predicate: predicate.clone(),
            });
        }

        if let Some(keys) = order_by {
            let rewritten = rewrite_sort_keys(keys, items);
            match rewritten {
                Some(keys) => steps.push(LogicalPlan::OrderBy { keys }),
                None if !has_aggregate => {
                    // Sort against the pre-projection rows.
                    steps.insert(
                        0,
                        LogicalPlan::OrderBy {
                            keys: keys.to_vec(),
                        },
                    );
                }
                None => {
                    return Err(ExecutionError::Planning(
                        "ORDER BY keys must appear among the returned items when aggregating"
                            .into(),
                    ))
                }
            }
        }

        if let Some(n) = skip {
            steps.push(LogicalPlan::Skip { count: n });
        }
        if let Some(n) = limit {
            steps.push(LogicalPlan::Limit { count: n });
        }

        Ok(steps)
    }

    // =========================================================================
    // Physical planning
    // =========================================================================

    /// Lowers a logical plan to a physical one, choosing scan strategies.
    pub fn physical(&self, logical: &LogicalPlan) -> Result<PhysicalPlan> {
        Ok(match logical {
            LogicalPlan::Sequence { steps } => PhysicalPlan::Sequence {
                steps: steps
                    .iter()
                    .map(|s| self.physical(s))
                    .collect::<Result<Vec<_>>>()?,
            },
            LogicalPlan::Scan {
                variable,
                labels,
                properties,
            } => {
                if labels.is_empty() && properties.is_empty() {
                    PhysicalPlan::AllNodeScan {
                        variable: variable.clone(),
                    }
                } else {
                    PhysicalPlan::NodeByLabelScan {
                        variable: variable.clone(),
                        labels: labels.clone(),
                        properties: properties.clone(),
                    }
                }
            }
            LogicalPlan::RelationshipScan {
                from,
                rel,
                to,
                types,
                direction,
            } => PhysicalPlan::RelationshipScan {
                from: from.clone(),
                rel: rel.clone(),
                to: to.clone(),
                types: types.clone(),
                direction: *direction,
            },
            LogicalPlan::Expand {
                from,
                rel,
                to,
                types,
                direction,
            } => PhysicalPlan::Expand {
                from: from.clone(),
                rel: rel.clone(),
                to: to.clone(),
                types: types.clone(),
                direction: *direction,
            },
            LogicalPlan::BindPath { variable, step } => PhysicalPlan::BindPath {
                variable: variable.clone(),
                step: step.clone(),
            },
            LogicalPlan::Filter { predicate } => PhysicalPlan::Filter {
                predicate: predicate.clone(),
            },
            LogicalPlan::Project { items } => PhysicalPlan::Project {
                items: items.clone(),
            },
            LogicalPlan::Aggregate {
                groupings,
                aggregations,
            } => PhysicalPlan::Aggregate {
                groupings: groupings.clone(),
                aggregations: aggregations.clone(),
            },
            LogicalPlan::OrderBy { keys } => PhysicalPlan::OrderBy {
                keys: keys
                    .iter()
                    .map(|k| (k.expression.clone(), k.descending))
                    .collect(),
            },
            LogicalPlan::Skip { count } => PhysicalPlan::Skip { count: *count },
            LogicalPlan::Limit { count } => PhysicalPlan::Limit { count: *count },
            LogicalPlan::Distinct => PhysicalPlan::Distinct,
            LogicalPlan::Unwind { expression, alias } => PhysicalPlan::Unwind {
                expression: expression.clone(),
                alias: alias.clone(),
            },
            LogicalPlan::Union { left, right, all } => PhysicalPlan::Union {
                left: Box::new(self.physical(left)?),
                right: Box::new(self.physical(right)?),
                all: *all,
            },
            LogicalPlan::Apply { inner, optional } => PhysicalPlan::Apply {
                inner: Box::new(self.physical(inner)?),
                optional: *optional,
            },
            LogicalPlan::Create { pattern } => PhysicalPlan::Create {
                pattern: pattern.clone(),
            },
            LogicalPlan::Merge { pattern } => PhysicalPlan::Merge {
                pattern: pattern.clone(),
            },
            LogicalPlan::SetProperties { items } => PhysicalPlan::SetProperties {
                items: items.clone(),
            },
            LogicalPlan::Delete { detach, items } => PhysicalPlan::Delete {
                detach: *detach,
                items: items.clone(),
            },
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn sequence(mut steps: Vec<LogicalPlan>) -> LogicalPlan {
    if steps.len() == 1 {
        steps.remove(0)
    } else {
        LogicalPlan::Sequence { steps }
    }
}

fn bind_name(node: &NodePattern, counter: &mut usize) -> String {
    node.variable.clone().unwrap_or_else(|| {
        *counter += 1;
        format!("_anon{}", counter)
    })
}

/// A relationship variable: its own name when present, a generated one when
/// the enclosing pattern binds a path (the path needs every hop).
fn rel_name(rel: &RelPattern, path_bound: bool, counter: &mut usize) -> Option<String> {
    match (&rel.variable, path_bound) {
        (Some(v), _) => Some(v.clone()),
        (None, true) => {
            *counter += 1;
            Some(format!("_anon{}", counter))
        }
        (None, false) => None,
    }
}

fn push_node_filters(node: &NodePattern, variable: &str, steps: &mut Vec<LogicalPlan>) {
    if !node.labels.is_empty() {
        steps.push(LogicalPlan::Filter {
            predicate: Expression::HasLabels {
                subject: Box::new(Expression::var(variable)),
                labels: node.labels.clone(),
            },
        });
    }
    for (key, value) in &node.properties {
        steps.push(LogicalPlan::Filter {
            predicate: Expression::compare(
                corvus_ast::ComparisonOp::Eq,
                Expression::property(Expression::var(variable), key.clone()),
                value.clone(),
            ),
        });
    }
}

fn push_rel_filters(rel: &RelPattern, rel_var: Option<&str>, steps: &mut Vec<LogicalPlan>) {
    if rel.properties.is_empty() {
        return;
    }
    let Some(rel_var) = rel_var else {
        return;
    };
    for (key, value) in &rel.properties {
        steps.push(LogicalPlan::Filter {
            predicate: Expression::compare(
                corvus_ast::ComparisonOp::Eq,
                Expression::property(Expression::var(rel_var), key.clone()),
                value.clone(),
            ),
        });
    }
}

fn build_path_step(vars: &[(bool, String)]) -> PathStep {
    let mut step = PathStep::Nil;
    for (is_node, var) in vars.iter().rev() {
        step = if *is_node {
            PathStep::Node {
                variable: var.clone(),
                next: Box::new(step),
            }
        } else {
            PathStep::Relationship {
                variable: var.clone(),
                next: Box::new(step),
            }
        };
    }
    step
}

/// Rewrites ORDER BY keys that name projected columns into references to
/// those columns. Returns `None` when any key cannot be resolved against
/// the projection.
fn rewrite_sort_keys(keys: &[SortItem], items: &[ReturnItem]) -> Option<Vec<SortItem>> {
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let rendered = format!("{}", key.expression);
        let column = items.iter().find_map(|item| {
            let name = item.output_name();
            if rendered == name || rendered == format!("{}", item.expression) {
                Some(name)
            } else {
                None
            }
        })?;
        out.push(SortItem {
            expression: Expression::Variable(column),
            descending: key.descending,
        });
    }
    Some(out)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_ast::{Expression as E, ReturnClause};

    fn planner_test<F: FnOnce(Planner<'_>)>(f: F) {
        let procedures = ProcedureRegistry::standard();
        f(Planner::new(&procedures));
    }

    fn match_return(pattern: Pattern, items: Vec<ReturnItem>) -> Statement {
        Statement::Query(Query::new(vec![
            Clause::Match(MatchClause {
                patterns: vec![pattern],
                where_clause: None,
            }),
            Clause::Return(ReturnClause::items(items)),
        ]))
    }

    #[test]
    fn test_label_scan_selection() {
        planner_test(|planner| {
            let stmt = match_return(
                Pattern::single(NodePattern::labeled("n", "Person")),
                vec![ReturnItem::variable("n")],
            );
            let physical = planner
                .physical(&planner.plan_statement(&stmt).unwrap())
                .unwrap();
            let rendered = format!("{}", physical);
            assert!(rendered.contains("NodeByLabelScan(n:Person)"), "{}", rendered);
        });
    }

    #[test]
    fn test_all_node_scan_for_unlabeled() {
        planner_test(|planner| {
            let stmt = match_return(
                Pattern::single(NodePattern::var("n")),
                vec![ReturnItem::variable("n")],
            );
            let physical = planner
                .physical(&planner.plan_statement(&stmt).unwrap())
                .unwrap();
            assert!(format!("{}", physical).contains("AllNodeScan(n)"));
        });
    }

    #[test]
    fn test_projection_split_on_aggregates() {
        planner_test(|planner| {
            let stmt = match_return(
                Pattern::single(NodePattern::var("n")),
                vec![
                    ReturnItem::property("n", "name"),
                    ReturnItem {
                        expression: E::CountStar,
                        alias: None,
                    },
                ],
            );
            let logical = planner.plan_statement(&stmt).unwrap();
            let rendered = format!("{}", logical);
            assert!(
                rendered.contains("Aggregate(by: [n.name], aggs: [count(*)])"),
                "{}",
                rendered
            );
        });
    }

    #[test]
    fn test_unconstrained_chain_start_uses_relationship_scan() {
        planner_test(|planner| {
            let pattern = Pattern {
                variable: None,
                start: NodePattern::var("a"),
                chain: vec![(
                    RelPattern::outgoing_typed("KNOWS").named("r"),
                    NodePattern::labeled("b", "Person"),
                )],
            };
            let stmt = match_return(pattern, vec![ReturnItem::variable("r")]);
            let logical = planner.plan_statement(&stmt).unwrap();
            let rendered = format!("{}", logical);
            assert!(rendered.contains("RelationshipScan"), "{}", rendered);
            // The target's label becomes a filter after the scan.
            assert!(rendered.contains("Filter(b:Person)"), "{}", rendered);
        });
    }

    #[test]
    fn test_labeled_chain_start_uses_scan_then_expand() {
        planner_test(|planner| {
            let pattern = Pattern {
                variable: None,
                start: NodePattern::labeled("a", "Person"),
                chain: vec![(RelPattern::outgoing(), NodePattern::var("b"))],
            };
            let stmt = match_return(pattern, vec![ReturnItem::variable("b")]);
            let logical = planner.plan_statement(&stmt).unwrap();
            let rendered = format!("{}", logical);
            assert!(rendered.contains("Scan(a:Person)"), "{}", rendered);
            assert!(rendered.contains("Expand"), "{}", rendered);
        });
    }

    #[test]
    fn test_sort_key_rewriting() {
        planner_test(|planner| {
            // RETURN n.name ORDER BY n.name: the key resolves to the output
            // column and sorts after the projection.
            let stmt = Statement::Query(Query::new(vec![
                Clause::Match(MatchClause {
                    patterns: vec![Pattern::single(NodePattern::var("n"))],
                    where_clause: None,
                }),
                Clause::Return(ReturnClause {
                    items: vec![ReturnItem::property("n", "name")],
                    distinct: false,
                    order_by: Some(vec![SortItem::asc(E::property(E::var("n"), "name"))]),
                    skip: None,
                    limit: None,
                }),
            ]));
            let logical = planner.plan_statement(&stmt).unwrap();
            let LogicalPlan::Sequence { steps } = logical else {
                panic!("expected a sequence");
            };
            let project_pos = steps
                .iter()
                .position(|s| matches!(s, LogicalPlan::Project { .. }))
                .unwrap();
            let order_pos = steps
                .iter()
                .position(|s| matches!(s, LogicalPlan::OrderBy { .. }))
                .unwrap();
            assert!(order_pos > project_pos);

            // ORDER BY n.age with only n.name returned sorts before the
            // projection instead.
            let stmt = Statement::Query(Query::new(vec![
                Clause::Match(MatchClause {
                    patterns: vec![Pattern::single(NodePattern::var("n"))],
                    where_clause: None,
                }),
                Clause::Return(ReturnClause {
                    items: vec![ReturnItem::property("n", "name")],
                    distinct: false,
                    order_by: Some(vec![SortItem::asc(E::property(E::var("n"), "age"))]),
                    skip: None,
                    limit: None,
                }),
            ]));
            let logical = planner.plan_statement(&stmt).unwrap();
            let LogicalPlan::Sequence { steps } = logical else {
                panic!("expected a sequence");
            };
            let project_pos = steps
                .iter()
                .position(|s| matches!(s, LogicalPlan::Project { .. }))
                .unwrap();
            let order_pos = steps
                .iter()
                .position(|s| matches!(s, LogicalPlan::OrderBy { .. }))
                .unwrap();
            assert!(order_pos < project_pos);
        });
    }

    #[test]
    fn test_optional_match_becomes_optional_apply() {
        planner_test(|planner| {
            let stmt = Statement::Query(Query::new(vec![
                Clause::Match(MatchClause {
                    patterns: vec![Pattern::single(NodePattern::labeled("a", "Person"))],
                    where_clause: None,
                }),
                Clause::OptionalMatch(MatchClause {
                    patterns: vec![Pattern {
                        variable: None,
                        start: NodePattern::var("a"),
                        chain: vec![(
                            RelPattern::outgoing_typed("KNOWS"),
                            NodePattern::var("b"),
                        )],
                    }],
                    where_clause: None,
                }),
                Clause::Return(ReturnClause::items(vec![ReturnItem::variable("b")])),
            ]));
            let logical = planner.plan_statement(&stmt).unwrap();
            assert!(format!("{}", logical).contains("OptionalApply"));
        });
    }

    #[test]
    fn test_union_statement() {
        planner_test(|planner| {
            let single = |label: &str| {
                Box::new(Statement::Query(Query::new(vec![
                    Clause::Match(MatchClause {
                        patterns: vec![Pattern::single(NodePattern::labeled("n", label))],
                        where_clause: None,
                    }),
                    Clause::Return(ReturnClause::items(vec![ReturnItem::property(
                        "n", "name",
                    )])),
                ])))
            };
            let stmt = Statement::Union {
                left: single("Person"),
                right: single("Company"),
                all: false,
            };
            let physical = planner
                .physical(&planner.plan_statement(&stmt).unwrap())
                .unwrap();
            assert!(format!("{}", physical).starts_with("Union("));
        });
    }

    #[test]
    fn test_path_binding_plans_bind_path() {
        planner_test(|planner| {
            let pattern = Pattern {
                variable: Some("p".into()),
                start: NodePattern::labeled("a", "Person"),
                chain: vec![(
                    RelPattern::outgoing_typed("KNOWS"),
                    NodePattern::var("b"),
                )],
            };
            let stmt = match_return(pattern, vec![ReturnItem::variable("p")]);
            let logical = planner.plan_statement(&stmt).unwrap();
            assert!(format!("{}", logical).contains("BindPath(p)"));
        });
    }
}
