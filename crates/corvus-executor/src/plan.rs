//! Execution plan types.
//!
//! Both plan layers are step pipelines: a `Sequence` threads a row stream
//! through its steps, with `Union` and `Apply` as the branching nodes.
//! [`PhysicalPlan::schema`] computes every node's output schema from its
//! input schema, which is how the planner and runner agree on result
//! columns without any shared mutable state.

use crate::eval::type_of;
use crate::frame::Schema;
use crate::{ExecutionError, Result};
use corvus_ast::{Expression, Pattern, ReturnItem, SetItem, SortItem};
use corvus_core::{CypherType, Direction};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Logical Plan
// =============================================================================

/// A logical execution plan: the query's intent, before scan selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalPlan {
    /// Steps executed in order, each consuming the previous one's rows
    Sequence { steps: Vec<LogicalPlan> },
    /// Bind nodes matching labels and inline properties
    Scan {
        variable: String,
        labels: Vec<String>,
        properties: Vec<(String, Expression)>,
    },
    /// Bind all relationships of the given types with their endpoints
    RelationshipScan {
        from: String,
        rel: Option<String>,
        to: String,
        types: Vec<String>,
        direction: Direction,
    },
    /// Traverse one hop from a bound node
    Expand {
        from: String,
        rel: Option<String>,
        to: String,
        types: Vec<String>,
        direction: Direction,
    },
    /// Bind a whole matched path to a variable
    BindPath {
        variable: String,
        step: corvus_ast::PathStep,
    },
    /// Three-valued row filter
    Filter { predicate: Expression },
    /// Projection boundary
    Project { items: Vec<ReturnItem> },
    /// Grouped aggregation
    Aggregate {
        groupings: Vec<ReturnItem>,
        aggregations: Vec<ReturnItem>,
    },
    /// Sort
    OrderBy { keys: Vec<SortItem> },
    /// Offset
    Skip { count: i64 },
    /// Row limit
    Limit { count: i64 },
    /// Row deduplication
    Distinct,
    /// List expansion
    Unwind { expression: Expression, alias: String },
    /// Concatenation of two plans over the same columns
    Union {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        all: bool,
    },
    /// Correlated per-row execution of the inner plan
    Apply {
        inner: Box<LogicalPlan>,
        optional: bool,
    },
    /// Instantiate a pattern
    Create { pattern: Pattern },
    /// Match a pattern, creating it when absent
    Merge { pattern: Pattern },
    /// Property assignments
    SetProperties { items: Vec<SetItem> },
    /// Entity deletion
    Delete { detach: bool, items: Vec<String> },
}

// =============================================================================
// Physical Plan
// =============================================================================

/// A physical execution plan, directly interpretable against the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicalPlan {
    /// Steps executed in order, each consuming the previous one's rows
    Sequence { steps: Vec<PhysicalPlan> },
    /// Scan every node
    AllNodeScan { variable: String },
    /// Scan nodes carrying the labels, with inline property filters
    NodeByLabelScan {
        variable: String,
        labels: Vec<String>,
        properties: Vec<(String, Expression)>,
    },
    /// Scan relationships by type, binding both endpoints
    RelationshipScan {
        from: String,
        rel: Option<String>,
        to: String,
        types: Vec<String>,
        direction: Direction,
    },
    /// Traverse one hop from a bound node
    Expand {
        from: String,
        rel: Option<String>,
        to: String,
        types: Vec<String>,
        direction: Direction,
    },
    /// Bind a whole matched path to a variable
    BindPath {
        variable: String,
        step: corvus_ast::PathStep,
    },
    /// Three-valued row filter
    Filter { predicate: Expression },
    /// Projection boundary
    Project { items: Vec<ReturnItem> },
    /// Grouped aggregation
    Aggregate {
        groupings: Vec<ReturnItem>,
        aggregations: Vec<ReturnItem>,
    },
    /// Buffered sort: `(expression, descending)`
    OrderBy { keys: Vec<(Expression, bool)> },
    /// Streaming offset
    Skip { count: i64 },
    /// Streaming limit
    Limit { count: i64 },
    /// Order-preserving deduplication
    Distinct,
    /// One output row per list element
    Unwind { expression: Expression, alias: String },
    /// Left rows then right rows; deduplicated unless `all`
    Union {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        all: bool,
    },
    /// Correlated per-row execution of the inner plan; `optional` pads with
    /// nulls when the inner plan produces nothing
    Apply {
        inner: Box<PhysicalPlan>,
        optional: bool,
    },
    /// Buffer pattern instantiation into the write journal
    Create { pattern: Pattern },
    /// Match the pattern, buffering creation when absent
    Merge { pattern: Pattern },
    /// Buffer property assignments
    SetProperties { items: Vec<SetItem> },
    /// Buffer entity deletion
    Delete { detach: bool, items: Vec<String> },
}

impl PhysicalPlan {
    /// Computes the output schema of this node given its input schema.
    pub fn schema(&self, input: &Schema) -> Result<Schema> {
        match self {
            PhysicalPlan::Sequence { steps } => {
                let mut schema = input.clone();
                for step in steps {
                    schema = step.schema(&schema)?;
                }
                Ok(schema)
            }

            PhysicalPlan::AllNodeScan { variable }
            | PhysicalPlan::NodeByLabelScan { variable, .. } => {
                if input.contains(variable) {
                    Ok(input.clone())
                } else {
                    input.extended(vec![(variable.clone(), CypherType::Node)])
                }
            }

            PhysicalPlan::RelationshipScan { from, rel, to, .. }
            | PhysicalPlan::Expand { from, rel, to, .. } => {
                let mut extra = Vec::new();
                if !input.contains(from) {
                    extra.push((from.clone(), CypherType::Node));
                }
                if let Some(rel) = rel {
                    if !input.contains(rel) {
                        extra.push((rel.clone(), CypherType::Relationship));
                    }
                }
                if !input.contains(to) {
                    extra.push((to.clone(), CypherType::Node));
                }
                input.extended(extra)
            }

            PhysicalPlan::BindPath { variable, .. } => {
                input.extended(vec![(variable.clone(), CypherType::Path)])
            }

            PhysicalPlan::Filter { .. }
            | PhysicalPlan::OrderBy { .. }
            | PhysicalPlan::Skip { .. }
            | PhysicalPlan::Limit { .. }
            | PhysicalPlan::Distinct => Ok(input.clone()),

            PhysicalPlan::Project { items } => {
                let env = input.type_env();
                Schema::new(
                    items
                        .iter()
                        .map(|item| (item.output_name(), type_of(&item.expression, &env)))
                        .collect(),
                )
            }

            PhysicalPlan::Aggregate {
                groupings,
                aggregations,
            } => {
                let env = input.type_env();
                Schema::new(
                    groupings
                        .iter()
                        .chain(aggregations.iter())
                        .map(|item| (item.output_name(), type_of(&item.expression, &env)))
                        .collect(),
                )
            }

            PhysicalPlan::Unwind { expression, alias } => {
                let env = input.type_env();
                let elem = match type_of(expression, &env) {
                    CypherType::List(elem) => *elem,
                    _ => CypherType::Any,
                };
                input.extended(vec![(alias.clone(), elem)])
            }

            PhysicalPlan::Union { left, right, .. } => {
                let ls = left.schema(&Schema::empty())?;
                let rs = right.schema(&Schema::empty())?;
                if ls != rs {
                    return Err(ExecutionError::TypeMismatch(format!(
                        "UNION sides have different columns: [{}] vs [{}]",
                        ls.names().collect::<Vec<_>>().join(", "),
                        rs.names().collect::<Vec<_>>().join(", ")
                    )));
                }
                Ok(ls)
            }

            PhysicalPlan::Apply { inner, .. } => inner.schema(input),

            PhysicalPlan::Create { pattern } | PhysicalPlan::Merge { pattern } => {
                let mut schema = input.clone();
                let mut extra = Vec::new();
                for node in pattern.nodes() {
                    if let Some(ref var) = node.variable {
                        if !schema.contains(var) && !extra.iter().any(|(n, _)| n == var) {
                            extra.push((var.clone(), CypherType::Node));
                        }
                    }
                }
                for (rel, _) in &pattern.chain {
                    if let Some(ref var) = rel.variable {
                        if !schema.contains(var) && !extra.iter().any(|(n, _)| n == var) {
                            extra.push((var.clone(), CypherType::Relationship));
                        }
                    }
                }
                schema = schema.extended(extra)?;
                Ok(schema)
            }

            PhysicalPlan::SetProperties { .. } | PhysicalPlan::Delete { .. } => Ok(input.clone()),
        }
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalPlan::Sequence { steps } => {
                writeln!(f, "Sequence [")?;
                for step in steps {
                    writeln!(f, "  {}", step)?;
                }
                write!(f, "]")
            }
            LogicalPlan::Scan {
                variable, labels, ..
            } => {
                if labels.is_empty() {
                    write!(f, "Scan({})", variable)
                } else {
                    write!(f, "Scan({}:{})", variable, labels.join(":"))
                }
            }
            LogicalPlan::RelationshipScan {
                from, rel, to, types, direction,
            } => write!(
                f,
                "RelationshipScan(({}){}[{}:{}]({}))",
                from,
                direction,
                rel.as_deref().unwrap_or(""),
                types.join("|"),
                to
            ),
            LogicalPlan::Expand {
                from, rel, to, types, direction,
            } => write!(
                f,
                "Expand(({}){}[{}:{}]({}))",
                from,
                direction,
                rel.as_deref().unwrap_or(""),
                types.join("|"),
                to
            ),
            LogicalPlan::BindPath { variable, .. } => write!(f, "BindPath({})", variable),
            LogicalPlan::Filter { predicate } => write!(f, "Filter({})", predicate),
            LogicalPlan::Project { items } => {
                let cols: Vec<_> = items.iter().map(|i| i.output_name()).collect();
                write!(f, "Project({})", cols.join(", "))
            }
            LogicalPlan::Aggregate {
                groupings,
                aggregations,
            } => {
                let g: Vec<_> = groupings.iter().map(|i| i.output_name()).collect();
                let a: Vec<_> = aggregations.iter().map(|i| i.output_name()).collect();
                write!(f, "Aggregate(by: [{}], aggs: [{}])", g.join(", "), a.join(", "))
            }
            LogicalPlan::OrderBy { keys } => {
                let parts: Vec<_> = keys
                    .iter()
                    .map(|k| {
                        format!(
                            "{}{}",
                            k.expression,
                            if k.descending { " DESC" } else { "" }
                        )
                    })
                    .collect();
                write!(f, "OrderBy({})", parts.join(", "))
            }
            LogicalPlan::Skip { count } => write!(f, "Skip({})", count),
            LogicalPlan::Limit { count } => write!(f, "Limit({})", count),
            LogicalPlan::Distinct => write!(f, "Distinct"),
            LogicalPlan::Unwind { expression, alias } => {
                write!(f, "Unwind({} AS {})", expression, alias)
            }
            LogicalPlan::Union { left, right, all } => {
                write!(
                    f,
                    "Union{}({}, {})",
                    if *all { "All" } else { "" },
                    left,
                    right
                )
            }
            LogicalPlan::Apply { inner, optional } => {
                write!(
                    f,
                    "{}Apply({})",
                    if *optional { "Optional" } else { "" },
                    inner
                )
            }
            LogicalPlan::Create { pattern } => write!(f, "Create({})", pattern),
            LogicalPlan::Merge { pattern } => write!(f, "Merge({})", pattern),
            LogicalPlan::SetProperties { items } => {
                let parts: Vec<_> = items
                    .iter()
                    .map(|i| format!("{}.{} = {}", i.variable, i.key, i.value))
                    .collect();
                write!(f, "Set({})", parts.join(", "))
            }
            LogicalPlan::Delete { detach, items } => write!(
                f,
                "{}Delete({})",
                if *detach { "Detach" } else { "" },
                items.join(", ")
            ),
        }
    }
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalPlan::Sequence { steps } => {
                writeln!(f, "Sequence [")?;
                for (i, step) in steps.iter().enumerate() {
                    writeln!(f, "  {}: {}", i, step)?;
                }
                write!(f, "]")
            }
            PhysicalPlan::AllNodeScan { variable } => write!(f, "AllNodeScan({})", variable),
            PhysicalPlan::NodeByLabelScan {
                variable,
                labels,
                properties,
            } => {
                write!(f, "NodeByLabelScan({}:{}", variable, labels.join(":"))?;
                if !properties.is_empty() {
                    let props: Vec<_> = properties
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k, v))
                        .collect();
                    write!(f, " {{{}}}", props.join(", "))?;
                }
                write!(f, ")")
            }
            PhysicalPlan::RelationshipScan {
                from, rel, to, types, direction,
            } => write!(
                f,
                "RelationshipScan(({}){}[{}:{}]({}))",
                from,
                direction,
                rel.as_deref().unwrap_or(""),
                types.join("|"),
                to
            ),
            PhysicalPlan::Expand {
                from, rel, to, types, direction,
            } => write!(
                f,
                "Expand(({}){}[{}:{}]({}))",
                from,
                direction,
                rel.as_deref().unwrap_or(""),
                types.join("|"),
                to
            ),
            PhysicalPlan::BindPath { variable, .. } => write!(f, "BindPath({})", variable),
            PhysicalPlan::Filter { predicate } => write!(f, "Filter({})", predicate),
            PhysicalPlan::Project { items } => {
                let cols: Vec<_> = items.iter().map(|i| i.output_name()).collect();
                write!(f, "Project({})", cols.join(", "))
            }
            PhysicalPlan::Aggregate {
                groupings,
                aggregations,
            } => {
                let g: Vec<_> = groupings.iter().map(|i| i.output_name()).collect();
                let a: Vec<_> = aggregations.iter().map(|i| i.output_name()).collect();
                write!(f, "Aggregate(by: [{}], aggs: [{}])", g.join(", "), a.join(", "))
            }
            PhysicalPlan::OrderBy { keys } => {
                let parts: Vec<_> = keys
                    .iter()
                    .map(|(e, desc)| format!("{}{}", e, if *desc { " DESC" } else { "" }))
                    .collect();
                write!(f, "OrderBy({})", parts.join(", "))
            }
            PhysicalPlan::Skip { count } => write!(f, "Skip({})", count),
            PhysicalPlan::Limit { count } => write!(f, "Limit({})", count),
            PhysicalPlan::Distinct => write!(f, "Distinct"),
            PhysicalPlan::Unwind { expression, alias } => {
                write!(f, "Unwind({} AS {})", expression, alias)
            }
            PhysicalPlan::Union { left, right, all } => write!(
                f,
                "Union{}({}, {})",
                if *all { "All" } else { "" },
                left,
                right
            ),
            PhysicalPlan::Apply { inner, optional } => write!(
                f,
                "{}Apply({})",
                if *optional { "Optional" } else { "" },
                inner
            ),
            PhysicalPlan::Create { pattern } => write!(f, "Create({})", pattern),
            PhysicalPlan::Merge { pattern } => write!(f, "Merge({})", pattern),
            PhysicalPlan::SetProperties { items } => {
                let parts: Vec<_> = items
                    .iter()
                    .map(|i| format!("{}.{} = {}", i.variable, i.key, i.value))
                    .collect();
                write!(f, "Set({})", parts.join(", "))
            }
            PhysicalPlan::Delete { detach, items } => write!(
                f,
                "{}Delete({})",
                if *detach { "Detach" } else { "" },
                items.join(", ")
            ),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_ast::Expression as E;

    #[test]
    fn test_scan_schema() {
        let plan = PhysicalPlan::AllNodeScan {
            variable: "n".into(),
        };
        let schema = plan.schema(&Schema::empty()).unwrap();
        assert_eq!(schema.columns(), &[("n".to_string(), CypherType::Node)]);
        // Re-scanning a bound variable does not duplicate the column.
        assert_eq!(plan.schema(&schema).unwrap(), schema);
    }

    #[test]
    fn test_expand_schema_appends_missing_columns() {
        let scan = PhysicalPlan::AllNodeScan {
            variable: "a".into(),
        };
        let expand = PhysicalPlan::Expand {
            from: "a".into(),
            rel: Some("r".into()),
            to: "b".into(),
            types: vec!["KNOWS".into()],
            direction: Direction::Outgoing,
        };
        let plan = PhysicalPlan::Sequence {
            steps: vec![scan, expand],
        };
        let schema = plan.schema(&Schema::empty()).unwrap();
        let names: Vec<_> = schema.names().map(str::to_string).collect();
        assert_eq!(names, vec!["a", "r", "b"]);
        assert_eq!(
            schema.columns()[1],
            ("r".to_string(), CypherType::Relationship)
        );
    }

    #[test]
    fn test_project_schema_uses_inference() {
        let plan = PhysicalPlan::Project {
            items: vec![
                ReturnItem::aliased(E::int(1), "one"),
                ReturnItem::aliased(E::CountStar, "n"),
            ],
        };
        let schema = plan.schema(&Schema::empty()).unwrap();
        assert_eq!(
            schema.columns(),
            &[
                ("one".to_string(), CypherType::Integer),
                ("n".to_string(), CypherType::Integer)
            ]
        );
    }

    #[test]
    fn test_union_schema_mismatch_is_error() {
        let left = PhysicalPlan::Project {
            items: vec![ReturnItem::aliased(E::int(1), "a")],
        };
        let right = PhysicalPlan::Project {
            items: vec![ReturnItem::aliased(E::int(1), "b")],
        };
        let union = PhysicalPlan::Union {
            left: Box::new(left),
            right: Box::new(right),
            all: true,
        };
        assert!(matches!(
            union.schema(&Schema::empty()),
            Err(ExecutionError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_plan_display() {
        let plan = PhysicalPlan::Sequence {
            steps: vec![
                PhysicalPlan::NodeByLabelScan {
                    variable: "n".into(),
                    labels: vec!["Person".into()],
                    properties: vec![],
                },
                PhysicalPlan::Filter {
                    predicate: E::compare(
                        corvus_ast::ComparisonOp::Gt,
                        E::property(E::var("n"), "age"),
                        E::int(10),
                    ),
                },
            ],
        };
        let rendered = format!("{}", plan);
        assert!(rendered.contains("NodeByLabelScan(n:Person)"));
        assert!(rendered.contains("Filter(n.age > 10)"));
    }
}
