//! Aggregating evaluation.
//!
//! [`aggregate_eval`] folds an aggregating expression over the per-row
//! contexts of one group: argument values are collected across the group
//! (deduplicated under DISTINCT) and the procedure is invoked once with the
//! collected list. The planner routes expressions here; a non-aggregating
//! expression reaching this path is a hard error.

use crate::eval::{self, ExpressionContext};
use crate::functions::ProcedureRegistry;
use crate::value::Value;
use crate::{ExecutionError, Result};
use corvus_ast::Expression;
use std::collections::HashSet;

/// Folds an aggregating expression over a group of per-row contexts.
///
/// `base` supplies the procedure registry; it matters when the group is
/// empty (global aggregation over no rows), where each aggregator returns
/// its identity: `count` 0, `sum` 0, `collect` [], the rest null.
pub fn aggregate_eval(
    expr: &Expression,
    contexts: &[ExpressionContext<'_>],
    base: &ExpressionContext<'_>,
) -> Result<Value> {
    match expr {
        Expression::CountStar => Ok(Value::Int(contexts.len() as i64)),

        Expression::FunctionCall {
            name,
            args,
            distinct,
        } => {
            let proc = base.exec.procedures.lookup(name, args.len())?;
            if !proc.is_aggregating() {
                return Err(ExecutionError::NonAggregatingInAggregateContext(
                    name.to_string(),
                ));
            }
            if *distinct && !proc.distinct_allowed() {
                return Err(ExecutionError::InvalidArgument(format!(
                    "DISTINCT is not accepted by {}",
                    name
                )));
            }
            let arg = args.first().ok_or_else(|| ExecutionError::ProcedureArity {
                name: name.to_string(),
                expected: "1".into(),
                actual: 0,
            })?;

            let mut collected = Vec::with_capacity(contexts.len());
            if *distinct {
                let mut seen = HashSet::new();
                for ctx in contexts {
                    let v = eval::eval(arg, ctx)?;
                    if seen.insert(v.group_key()) {
                        collected.push(v);
                    }
                }
            } else {
                for ctx in contexts {
                    collected.push(eval::eval(arg, ctx)?);
                }
            }
            proc.call(&[Value::List(collected)])
        }

        other => Err(ExecutionError::NonAggregatingInAggregateContext(format!(
            "{}",
            other
        ))),
    }
}

/// True if the expression contains an aggregating call anywhere. The
/// planner uses this to split projection items into grouping keys and
/// aggregations.
pub fn contains_aggregate(expr: &Expression, registry: &ProcedureRegistry) -> bool {
    match expr {
        Expression::CountStar => true,
        Expression::FunctionCall { name, args, .. } => {
            registry.is_aggregating(name) || args.iter().any(|a| contains_aggregate(a, registry))
        }
        Expression::Literal(_) | Expression::Variable(_) | Expression::Parameter(_) => false,
        Expression::Property { subject, .. } => contains_aggregate(subject, registry),
        Expression::ContainerIndex { container, index } => {
            contains_aggregate(container, registry) || contains_aggregate(index, registry)
        }
        Expression::Arithmetic { left, right, .. }
        | Expression::Comparison { left, right, .. }
        | Expression::StringMatch { left, right, .. } => {
            contains_aggregate(left, registry) || contains_aggregate(right, registry)
        }
        Expression::And(l, r) | Expression::Or(l, r) => {
            contains_aggregate(l, registry) || contains_aggregate(r, registry)
        }
        Expression::Not(e) | Expression::IsNull(e) | Expression::IsNotNull(e) => {
            contains_aggregate(e, registry)
        }
        Expression::Ands(es) | Expression::Ors(es) | Expression::ListLiteral(es) => {
            es.iter().any(|e| contains_aggregate(e, registry))
        }
        Expression::In { item, list } => {
            contains_aggregate(item, registry) || contains_aggregate(list, registry)
        }
        Expression::HasLabels { subject, .. } => contains_aggregate(subject, registry),
        Expression::Case {
            subject,
            alternatives,
            default,
        } => {
            subject
                .as_ref()
                .is_some_and(|s| contains_aggregate(s, registry))
                || alternatives
                    .iter()
                    .any(|(w, t)| contains_aggregate(w, registry) || contains_aggregate(t, registry))
                || default
                    .as_ref()
                    .is_some_and(|d| contains_aggregate(d, registry))
        }
        Expression::MapLiteral(pairs) => pairs.iter().any(|(_, e)| contains_aggregate(e, registry)),
        Expression::PathExpression(_) => false,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{ExecutionContext, Parameters};
    use corvus_ast::Expression as E;
    use corvus_graph::InMemoryGraph;

    fn graph() -> InMemoryGraph {
        InMemoryGraph::builder()
            .add_labeled_node(1, "Person", [("name", "Alex")])
            .add_labeled_node(2, "Person", [("name", "Alex"), ("age", "10")])
            .build()
    }

    fn with_base<F: FnOnce(&ExpressionContext<'_>)>(g: &InMemoryGraph, f: F) {
        let procs = ProcedureRegistry::standard();
        let exec = ExecutionContext::new(g, &procs, Parameters::new());
        let base = ExpressionContext::new(&exec);
        f(&base);
    }

    #[test]
    fn test_count_star_counts_contexts() {
        let g = graph();
        with_base(&g, |base| {
            let ctxs = vec![
                base.with_var("x", Value::Int(1)),
                base.with_var("x", Value::Int(2)),
            ];
            assert_eq!(
                aggregate_eval(&E::CountStar, &ctxs, base).unwrap(),
                Value::Int(2)
            );
        });
    }

    #[test]
    fn test_count_skips_nulls_and_distinct_dedups() {
        let g = graph();
        with_base(&g, |base| {
            let ctxs: Vec<_> = [Value::Int(1), Value::Int(1), Value::Null, Value::Int(2)]
                .into_iter()
                .map(|v| base.with_var("x", v))
                .collect();

            let count = E::call("count", vec![E::var("x")]);
            assert_eq!(aggregate_eval(&count, &ctxs, base).unwrap(), Value::Int(3));

            let distinct_count = E::FunctionCall {
                name: corvus_ast::FunctionName::bare("count"),
                args: vec![E::var("x")],
                distinct: true,
            };
            assert_eq!(
                aggregate_eval(&distinct_count, &ctxs, base).unwrap(),
                Value::Int(2)
            );
        });
    }

    #[test]
    fn test_collect_preserves_order() {
        let g = graph();
        with_base(&g, |base| {
            let ctxs: Vec<_> = [Value::Int(3), Value::Int(1), Value::Int(2)]
                .into_iter()
                .map(|v| base.with_var("x", v))
                .collect();

            let collect = E::call("collect", vec![E::var("x")]);
            assert_eq!(
                aggregate_eval(&collect, &ctxs, base).unwrap(),
                Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)])
            );
        });
    }

    #[test]
    fn test_non_aggregating_expression_is_rejected() {
        let g = graph();
        with_base(&g, |base| {
            let ctxs = vec![base.with_var("x", Value::Int(1))];

            assert!(matches!(
                aggregate_eval(&E::var("x"), &ctxs, base),
                Err(ExecutionError::NonAggregatingInAggregateContext(_))
            ));
            assert!(matches!(
                aggregate_eval(&E::call("toLower", vec![E::var("x")]), &ctxs, base),
                Err(ExecutionError::NonAggregatingInAggregateContext(_))
            ));
        });
    }

    #[test]
    fn test_empty_group_identities() {
        let g = graph();
        with_base(&g, |base| {
            assert_eq!(
                aggregate_eval(&E::CountStar, &[], base).unwrap(),
                Value::Int(0)
            );
            assert_eq!(
                aggregate_eval(&E::call("count", vec![E::var("x")]), &[], base).unwrap(),
                Value::Int(0)
            );
            assert_eq!(
                aggregate_eval(&E::call("sum", vec![E::var("x")]), &[], base).unwrap(),
                Value::Int(0)
            );
            assert_eq!(
                aggregate_eval(&E::call("collect", vec![E::var("x")]), &[], base).unwrap(),
                Value::List(vec![])
            );
            assert_eq!(
                aggregate_eval(&E::call("min", vec![E::var("x")]), &[], base).unwrap(),
                Value::Null
            );
        });
    }

    #[test]
    fn test_distinct_rejected_where_not_accepted() {
        let g = graph();
        with_base(&g, |base| {
            let ctxs = vec![base.with_var("x", Value::Int(1))];
            let distinct_min = E::FunctionCall {
                name: corvus_ast::FunctionName::bare("min"),
                args: vec![E::var("x")],
                distinct: true,
            };
            assert!(matches!(
                aggregate_eval(&distinct_min, &ctxs, base),
                Err(ExecutionError::InvalidArgument(_))
            ));
        });
    }

    #[test]
    fn test_contains_aggregate() {
        let registry = ProcedureRegistry::standard();
        assert!(contains_aggregate(&E::CountStar, &registry));
        assert!(contains_aggregate(
            &E::call("count", vec![E::var("x")]),
            &registry
        ));
        assert!(contains_aggregate(
            &E::arith(
                corvus_ast::ArithmeticOp::Add,
                E::call("sum", vec![E::var("x")]),
                E::int(1)
            ),
            &registry
        ));
        assert!(!contains_aggregate(&E::var("x"), &registry));
        assert!(!contains_aggregate(
            &E::call("toLower", vec![E::var("x")]),
            &registry
        ));
    }
}
