//! Plan interpretation.
//!
//! The executor turns a physical plan into a lazy [`DataFrame`]: streaming
//! steps wrap the incoming frame, scans and expands reach into the graph
//! model, and mutation steps buffer into the query's write journal while
//! passing their rows through. Execution is single-threaded and pull-based;
//! nothing runs until the runner drains the root frame.

use crate::eval::{self, ExecutionContext, ExpressionContext};
use crate::frame::{row_ctx, DataFrame, Row, Schema};
use crate::plan::PhysicalPlan;
use crate::value::Value;
use crate::{ExecutionError, Result};
use corvus_ast::{Expression, Pattern};
use corvus_core::{Direction, Label, NodeId, PropertyValue};
use corvus_graph::{NodeRecord, RelRecord, WriteOp};
use std::collections::HashMap;
use tracing::warn;

/// Interprets physical plans over a graph and an expression context.
#[derive(Clone)]
pub struct Executor<'a> {
    base: ExpressionContext<'a>,
}

impl<'a> Executor<'a> {
    /// Creates an executor over the given per-query context.
    pub fn new(exec: &'a ExecutionContext<'a>) -> Self {
        Self {
            base: ExpressionContext::new(exec),
        }
    }

    /// Executes a plan step against an incoming frame.
    pub fn execute(&self, plan: &'a PhysicalPlan, input: DataFrame<'a>) -> Result<DataFrame<'a>> {
        match plan {
            PhysicalPlan::Sequence { steps } => {
                let mut frame = input;
                for step in steps {
                    frame = self.execute(step, frame)?;
                }
                Ok(frame)
            }

            PhysicalPlan::AllNodeScan { variable } => self.scan(plan, input, variable, &[], &[]),

            PhysicalPlan::NodeByLabelScan {
                variable,
                labels,
                properties,
            } => {
                let labels: Vec<Label> = labels.iter().map(Label::new).collect();
                for label in &labels {
                    if !self.base.exec.graph.has_label(label) {
                        warn!(label = label.as_str(), "scan names an unknown label");
                    }
                }
                self.scan(plan, input, variable, &labels, properties)
            }

            PhysicalPlan::RelationshipScan {
                from,
                rel,
                to,
                types,
                direction,
            } => self.relationship_scan(plan, input, from, rel.as_deref(), to, types, *direction),

            PhysicalPlan::Expand {
                from,
                rel,
                to,
                types,
                direction,
            } => self.expand(plan, input, from, rel.as_deref(), to, types, *direction),

            PhysicalPlan::BindPath { variable, step } => {
                let schema = plan.schema(input.schema())?;
                let expr = Expression::PathExpression(step.clone());
                let ctx = self.base.clone();
                let parent = input;
                Ok(DataFrame::from_source(schema, move || {
                    let ctx = ctx.clone();
                    let expr = expr.clone();
                    let in_schema = parent.schema().clone();
                    Box::new(parent.rows().map(move |row| {
                        let mut row = row?;
                        let rc = row_ctx(&ctx, &in_schema, &row);
                        row.push(eval::eval(&expr, &rc)?);
                        Ok(row)
                    }))
                }))
            }

            PhysicalPlan::Filter { predicate } => input.filter(predicate, &self.base),
            PhysicalPlan::Project { items } => input.project(items, &self.base),
            PhysicalPlan::Aggregate {
                groupings,
                aggregations,
            } => input.group_by(groupings, aggregations, &self.base),
            PhysicalPlan::OrderBy { keys } => input.order_by(keys, &self.base),
            PhysicalPlan::Skip { count } => input.skip(*count),
            PhysicalPlan::Limit { count } => input.take(*count),
            PhysicalPlan::Distinct => Ok(input.distinct()),

            PhysicalPlan::Unwind { expression, .. } => {
                let schema = plan.schema(input.schema())?;
                let ctx = self.base.clone();
                let expression = expression.clone();
                let parent = input;
                Ok(DataFrame::from_source(schema, move || {
                    let ctx = ctx.clone();
                    let expression = expression.clone();
                    let in_schema = parent.schema().clone();
                    Box::new(parent.rows().flat_map(move |row| -> Vec<Result<Row>> {
                        let row = match row {
                            Ok(row) => row,
                            Err(e) => return vec![Err(e)],
                        };
                        let rc = row_ctx(&ctx, &in_schema, &row);
                        match eval::eval(&expression, &rc) {
                            Ok(Value::List(items)) => items
                                .into_iter()
                                .map(|item| {
                                    let mut out = row.clone();
                                    out.push(item);
                                    Ok(out)
                                })
                                .collect(),
                            Ok(Value::Null) => Vec::new(),
                            Ok(other) => {
                                let mut out = row;
                                out.push(other);
                                vec![Ok(out)]
                            }
                            Err(e) => vec![Err(e)],
                        }
                    }))
                }))
            }

            PhysicalPlan::Union { left, right, all } => {
                let left = self.execute(left, DataFrame::unit())?;
                let right = self.execute(right, DataFrame::unit())?;
                let chained = left.chain(&right)?;
                Ok(if *all { chained } else { chained.distinct() })
            }

            PhysicalPlan::Apply { inner, optional } => {
                let out_schema = plan.schema(input.schema())?;
                let added = out_schema.len() - input.schema().len();
                let executor = self.clone();
                let inner: &'a PhysicalPlan = inner;
                let optional = *optional;
                let parent = input;
                Ok(DataFrame::from_source(out_schema, move || {
                    let executor = executor.clone();
                    let in_schema = parent.schema().clone();
                    Box::new(parent.rows().flat_map(move |row| -> Vec<Result<Row>> {
                        let row = match row {
                            Ok(row) => row,
                            Err(e) => return vec![Err(e)],
                        };
                        let seed = DataFrame::from_rows(in_schema.clone(), vec![row.clone()]);
                        let produced = executor
                            .execute(inner, seed)
                            .and_then(|frame| frame.collect());
                        match produced {
                            Ok(rows) if rows.is_empty() && optional => {
                                let mut out = row;
                                out.extend(std::iter::repeat(Value::Null).take(added));
                                vec![Ok(out)]
                            }
                            Ok(rows) => rows.into_iter().map(Ok).collect(),
                            Err(e) => vec![Err(e)],
                        }
                    }))
                }))
            }

            PhysicalPlan::Create { pattern } => self.create(plan, input, pattern),
            PhysicalPlan::Merge { pattern } => self.merge(plan, input, pattern),

            // Mutation steps are eager: buffered writes must happen for
            // every input row even when a downstream limit stops pulling.
            PhysicalPlan::SetProperties { items } => {
                let ctx = self.base.clone();
                let items = items.to_vec();
                let parent = input.clone();
                Ok(DataFrame::from_source(input.schema().clone(), move || {
                    let compute = || -> Result<Vec<Row>> {
                        let mut out = Vec::new();
                        for row in parent.rows() {
                            let row = row?;
                            let rc = row_ctx(&ctx, parent.schema(), &row);
                            for item in &items {
                                let target =
                                    rc.var(&item.variable).cloned().ok_or_else(|| {
                                        ExecutionError::UnboundVariable(item.variable.clone())
                                    })?;
                                let value = eval::eval(&item.value, &rc)?.unwrap()?;
                                let mut journal = ctx.exec.journal.borrow_mut();
                                match target {
                                    Value::Node(n) => {
                                        journal.set_node_property(n.id, item.key.clone(), value)
                                    }
                                    Value::Rel(r) => {
                                        journal.set_rel_property(r.id, item.key.clone(), value)
                                    }
                                    Value::Null => {}
                                    other => {
                                        return Err(ExecutionError::TypeMismatch(format!(
                                            "SET expects a node or relationship, got {}",
                                            other.runtime_type()
                                        )))
                                    }
                                }
                            }
                            out.push(row);
                        }
                        Ok(out)
                    };
                    match compute() {
                        Ok(rows) => Box::new(rows.into_iter().map(Ok)),
                        Err(e) => Box::new(std::iter::once(Err(e))),
                    }
                }))
            }

            PhysicalPlan::Delete { detach, items } => {
                let ctx = self.base.clone();
                let items = items.to_vec();
                let detach = *detach;
                let parent = input.clone();
                Ok(DataFrame::from_source(input.schema().clone(), move || {
                    let compute = || -> Result<Vec<Row>> {
                        let mut out = Vec::new();
                        for row in parent.rows() {
                            let row = row?;
                            let rc = row_ctx(&ctx, parent.schema(), &row);
                            for item in &items {
                                let target = rc.var(item).cloned().ok_or_else(|| {
                                    ExecutionError::UnboundVariable(item.clone())
                                })?;
                                let mut journal = ctx.exec.journal.borrow_mut();
                                match target {
                                    Value::Node(n) => journal.delete_node(n.id, detach),
                                    Value::Rel(r) => journal.delete_rel(r.id),
                                    Value::Null => {}
                                    other => {
                                        return Err(ExecutionError::TypeMismatch(format!(
                                            "DELETE expects a node or relationship, got {}",
                                            other.runtime_type()
                                        )))
                                    }
                                }
                            }
                            out.push(row);
                        }
                        Ok(out)
                    };
                    match compute() {
                        Ok(rows) => Box::new(rows.into_iter().map(Ok)),
                        Err(e) => Box::new(std::iter::once(Err(e))),
                    }
                }))
            }
        }
    }

    // =========================================================================
    // Scans
    // =========================================================================

    fn scan(
        &self,
        plan: &PhysicalPlan,
        input: DataFrame<'a>,
        variable: &str,
        labels: &[Label],
        properties: &[(String, Expression)],
    ) -> Result<DataFrame<'a>> {
        let schema = plan.schema(input.schema())?;
        let bound = input.schema().contains(variable);
        let ctx = self.base.clone();
        let labels = labels.to_vec();
        let properties = properties.to_vec();
        let variable = variable.to_string();
        let parent = input;

        Ok(DataFrame::from_source(schema, move || {
            let ctx = ctx.clone();
            let labels = labels.clone();
            let properties = properties.clone();
            let variable = variable.clone();
            let in_schema = parent.schema().clone();
            Box::new(parent.rows().flat_map(move |row| -> Vec<Result<Row>> {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => return vec![Err(e)],
                };
                let rc = row_ctx(&ctx, &in_schema, &row);
                let props = match eval_property_filters(&properties, &rc) {
                    Ok(Some(props)) => props,
                    Ok(None) => return Vec::new(),
                    Err(e) => return vec![Err(e)],
                };

                if bound {
                    // Re-matching an already bound variable: keep the row
                    // only if the binding still satisfies the pattern.
                    let value = rc.var(&variable).cloned().unwrap_or(Value::Null);
                    return match value {
                        Value::Node(node) => {
                            let ok = labels.iter().all(|l| node.has_label(l))
                                && props.iter().all(|(k, v)| node.property(k) == Some(v));
                            if ok {
                                vec![Ok(row)]
                            } else {
                                Vec::new()
                            }
                        }
                        Value::Null => Vec::new(),
                        other => vec![Err(ExecutionError::TypeMismatch(format!(
                            "pattern rebinds {} which holds {}",
                            variable,
                            other.runtime_type()
                        )))],
                    };
                }

                let nodes: Vec<NodeRecord> =
                    ctx.exec.graph.nodes(&labels, &props).collect();
                nodes
                    .into_iter()
                    .map(|node| {
                        let mut out = row.clone();
                        out.push(Value::Node(node));
                        Ok(out)
                    })
                    .collect()
            }))
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn relationship_scan(
        &self,
        plan: &PhysicalPlan,
        input: DataFrame<'a>,
        from: &str,
        rel: Option<&str>,
        to: &str,
        types: &[String],
        direction: Direction,
    ) -> Result<DataFrame<'a>> {
        let schema = plan.schema(input.schema())?;
        let types: Vec<Label> = types.iter().map(Label::new).collect();
        self.warn_unknown_types(&types);

        let ctx = self.base.clone();
        let from = from.to_string();
        let rel = rel.map(str::to_string);
        let to = to.to_string();
        let parent = input;

        Ok(DataFrame::from_source(schema, move || {
            let ctx = ctx.clone();
            let types = types.clone();
            let from = from.clone();
            let rel = rel.clone();
            let to = to.clone();
            let in_schema = parent.schema().clone();
            Box::new(parent.rows().flat_map(move |row| -> Vec<Result<Row>> {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => return vec![Err(e)],
                };
                let graph = ctx.exec.graph;
                let rels: Vec<RelRecord> = graph.relationships(&types).collect();
                let mut out = Vec::new();
                for record in rels {
                    let mut orientations: Vec<(NodeId, NodeId)> = Vec::new();
                    match direction {
                        Direction::Outgoing => orientations.push((record.start, record.end)),
                        Direction::Incoming => orientations.push((record.end, record.start)),
                        Direction::Both => {
                            orientations.push((record.start, record.end));
                            if record.start != record.end {
                                orientations.push((record.end, record.start));
                            }
                        }
                    }
                    for (src, dst) in orientations {
                        let (Some(src), Some(dst)) =
                            (graph.node_by_id(src), graph.node_by_id(dst))
                        else {
                            continue;
                        };
                        match extend_bindings(
                            &row,
                            &in_schema,
                            &[
                                (from.as_str(), Value::Node(src)),
                                (
                                    rel.as_deref().unwrap_or(""),
                                    Value::Rel(record.clone()),
                                ),
                                (to.as_str(), Value::Node(dst)),
                            ],
                        ) {
                            Ok(Some(extended)) => out.push(Ok(extended)),
                            Ok(None) => {}
                            Err(e) => out.push(Err(e)),
                        }
                    }
                }
                out
            }))
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        plan: &PhysicalPlan,
        input: DataFrame<'a>,
        from: &str,
        rel: Option<&str>,
        to: &str,
        types: &[String],
        direction: Direction,
    ) -> Result<DataFrame<'a>> {
        let schema = plan.schema(input.schema())?;
        let types: Vec<Label> = types.iter().map(Label::new).collect();
        self.warn_unknown_types(&types);

        let ctx = self.base.clone();
        let from = from.to_string();
        let rel = rel.map(str::to_string);
        let to = to.to_string();
        let parent = input;

        Ok(DataFrame::from_source(schema, move || {
            let ctx = ctx.clone();
            let types = types.clone();
            let from = from.clone();
            let rel = rel.clone();
            let to = to.clone();
            let in_schema = parent.schema().clone();
            Box::new(parent.rows().flat_map(move |row| -> Vec<Result<Row>> {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => return vec![Err(e)],
                };
                let rc = row_ctx(&ctx, &in_schema, &row);
                let source = match rc.var(&from) {
                    Some(Value::Node(node)) => node.clone(),
                    Some(Value::Null) | None => return Vec::new(),
                    Some(other) => {
                        return vec![Err(ExecutionError::TypeMismatch(format!(
                            "cannot expand from {} of type {}",
                            from,
                            other.runtime_type()
                        )))]
                    }
                };
                let hops: Vec<(RelRecord, NodeRecord)> = ctx
                    .exec
                    .graph
                    .expand(source.id, direction, &types)
                    .collect();
                let mut out = Vec::new();
                for (record, far) in hops {
                    match extend_bindings(
                        &row,
                        &in_schema,
                        &[
                            (rel.as_deref().unwrap_or(""), Value::Rel(record)),
                            (to.as_str(), Value::Node(far)),
                        ],
                    ) {
                        Ok(Some(extended)) => out.push(Ok(extended)),
                        Ok(None) => {}
                        Err(e) => out.push(Err(e)),
                    }
                }
                out
            }))
        }))
    }

    fn warn_unknown_types(&self, types: &[Label]) {
        for t in types {
            if !self.base.exec.graph.has_rel_type(t) {
                warn!(
                    rel_type = t.as_str(),
                    "pattern names an unknown relationship type"
                );
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    fn create(
        &self,
        plan: &PhysicalPlan,
        input: DataFrame<'a>,
        pattern: &Pattern,
    ) -> Result<DataFrame<'a>> {
        let schema = plan.schema(input.schema())?;
        let ctx = self.base.clone();
        let pattern = pattern.clone();
        let out_schema = schema.clone();
        let parent = input;

        Ok(DataFrame::from_source(schema, move || {
            let compute = || -> Result<Vec<Row>> {
                let in_len = parent.schema().len();
                let mut rows = Vec::new();
                for row in parent.rows() {
                    let row = row?;
                    let rc = row_ctx(&ctx, parent.schema(), &row);
                    let created = instantiate_pattern(&pattern, &rc)?;
                    // Extend in the output schema's column order.
                    let mut out = row;
                    for (name, _) in out_schema.columns().iter().skip(in_len) {
                        let value = created.get(name.as_str()).cloned().ok_or_else(|| {
                            ExecutionError::Planning(format!(
                                "created pattern did not bind '{}'",
                                name
                            ))
                        })?;
                        out.push(value);
                    }
                    rows.push(out);
                }
                Ok(rows)
            };
            match compute() {
                Ok(rows) => Box::new(rows.into_iter().map(Ok)),
                Err(e) => Box::new(std::iter::once(Err(e))),
            }
        }))
    }

    fn merge(
        &self,
        plan: &PhysicalPlan,
        input: DataFrame<'a>,
        pattern: &Pattern,
    ) -> Result<DataFrame<'a>> {
        let schema = plan.schema(input.schema())?;
        let ctx = self.base.clone();
        let pattern = pattern.clone();
        let out_schema = schema.clone();
        let parent = input;

        Ok(DataFrame::from_source(schema, move || {
            let compute = || -> Result<Vec<Row>> {
                let in_len = parent.schema().len();
                let mut rows = Vec::new();
                for row in parent.rows() {
                    let row = row?;
                    let rc = row_ctx(&ctx, parent.schema(), &row);
                    for bindings in merge_pattern(&pattern, &rc)? {
                        let mut out = row.clone();
                        for (name, _) in out_schema.columns().iter().skip(in_len) {
                            let value =
                                bindings.get(name.as_str()).cloned().ok_or_else(|| {
                                    ExecutionError::Planning(format!(
                                        "merged pattern did not bind '{}'",
                                        name
                                    ))
                                })?;
                            out.push(value);
                        }
                        rows.push(out);
                    }
                }
                Ok(rows)
            };
            match compute() {
                Ok(rows) => Box::new(rows.into_iter().map(Ok)),
                Err(e) => Box::new(std::iter::once(Err(e))),
            }
        }))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Evaluates inline property filters. `None` means a filter evaluated to
/// null, which can never match.
fn eval_property_filters(
    properties: &[(String, Expression)],
    rc: &ExpressionContext<'_>,
) -> Result<Option<Vec<(String, PropertyValue)>>> {
    let mut out = Vec::with_capacity(properties.len());
    for (key, expr) in properties {
        let value = eval::eval(expr, rc)?;
        if value.is_null() {
            return Ok(None);
        }
        out.push((key.clone(), value.unwrap()?));
    }
    Ok(Some(out))
}

/// Extends a row with `(name, value)` bindings, honoring columns that are
/// already bound: a bound name must agree with the candidate value (by
/// entity id) or the candidate is discarded. Empty names are skipped.
fn extend_bindings(
    row: &Row,
    schema: &Schema,
    bindings: &[(&str, Value)],
) -> Result<Option<Row>> {
    let mut out = row.clone();
    for (name, value) in bindings {
        if name.is_empty() {
            continue;
        }
        if let Some(idx) = schema.index_of(name) {
            let agrees = match (&row[idx], value) {
                (Value::Node(a), Value::Node(b)) => a.id == b.id,
                (Value::Rel(a), Value::Rel(b)) => a.id == b.id,
                (Value::Null, _) => false,
                _ => false,
            };
            if !agrees {
                return Ok(None);
            }
        } else {
            out.push(value.clone());
        }
    }
    Ok(Some(out))
}

/// Creates every element of a pattern into the journal, resolving already
/// bound endpoints from the row context. Returns the variables bound by
/// the instantiation.
fn instantiate_pattern(
    pattern: &Pattern,
    rc: &ExpressionContext<'_>,
) -> Result<HashMap<String, Value>> {
    let mut bound: HashMap<String, Value> = HashMap::new();

    let mut current = resolve_or_create_node(&pattern.start, rc, &mut bound)?;
    for (rel, node) in &pattern.chain {
        let next = resolve_or_create_node(node, rc, &mut bound)?;
        let (start, end) = match rel.direction {
            Direction::Outgoing => (current.id, next.id),
            Direction::Incoming => (next.id, current.id),
            Direction::Both => {
                return Err(ExecutionError::InvalidArgument(
                    "CREATE requires a directed relationship".into(),
                ))
            }
        };
        let rel_type = match rel.types.as_slice() {
            [] => None,
            [single] => Some(Label::new(single)),
            _ => {
                return Err(ExecutionError::InvalidArgument(
                    "CREATE accepts at most one relationship type".into(),
                ))
            }
        };
        let mut props = std::collections::BTreeMap::new();
        for (key, expr) in &rel.properties {
            let value = eval::eval(expr, rc)?;
            if !value.is_null() {
                props.insert(key.clone(), value.unwrap()?);
            }
        }
        let record = rc
            .exec
            .journal
            .borrow_mut()
            .create_rel(start, end, rel_type, props);
        if let Some(ref var) = rel.variable {
            bound.insert(var.clone(), Value::Rel(record));
        }
        current = next;
    }
    Ok(bound)
}

/// A CREATE endpoint: an already bound node, or a fresh one buffered into
/// the journal.
fn resolve_or_create_node(
    node: &corvus_ast::NodePattern,
    rc: &ExpressionContext<'_>,
    bound: &mut HashMap<String, Value>,
) -> Result<NodeRecord> {
    if let Some(ref var) = node.variable {
        if let Some(existing) = bound.get(var).cloned().or_else(|| rc.var(var).cloned()) {
            return match existing {
                Value::Node(n) => Ok(n),
                other => Err(ExecutionError::TypeMismatch(format!(
                    "CREATE endpoint {} holds {}",
                    var,
                    other.runtime_type()
                ))),
            };
        }
    }
    let labels: Vec<Label> = node.labels.iter().map(Label::new).collect();
    let mut props = std::collections::BTreeMap::new();
    for (key, expr) in &node.properties {
        let value = eval::eval(expr, rc)?;
        if !value.is_null() {
            props.insert(key.clone(), value.unwrap()?);
        }
    }
    let record = rc.exec.journal.borrow_mut().create_node(labels, props);
    if let Some(ref var) = node.variable {
        bound.insert(var.clone(), Value::Node(record.clone()));
    }
    Ok(record)
}

/// MERGE over a node pattern or a single-hop relationship pattern: find
/// every match (in the graph and among journal-created entities), creating
/// the pattern when nothing matches.
fn merge_pattern(
    pattern: &Pattern,
    rc: &ExpressionContext<'_>,
) -> Result<Vec<HashMap<String, Value>>> {
    match pattern.chain.as_slice() {
        [] => merge_node(&pattern.start, rc),
        [(rel, end)] => merge_single_hop(&pattern.start, rel, end, rc),
        _ => Err(ExecutionError::Planning(
            "MERGE supports node patterns and single-hop relationship patterns".into(),
        )),
    }
}

fn merge_node(
    node: &corvus_ast::NodePattern,
    rc: &ExpressionContext<'_>,
) -> Result<Vec<HashMap<String, Value>>> {
    let labels: Vec<Label> = node.labels.iter().map(Label::new).collect();
    let Some(props) = eval_property_filters(&node.properties, rc)? else {
        return Err(ExecutionError::InvalidArgument(
            "MERGE cannot match a null property".into(),
        ));
    };

    // A bound variable short-circuits: the row survives when it still
    // matches the pattern.
    if let Some(ref var) = node.variable {
        if let Some(existing) = rc.var(var) {
            return match existing {
                Value::Node(n) => {
                    let ok = labels.iter().all(|l| n.has_label(l))
                        && props.iter().all(|(k, v)| n.property(k) == Some(v));
                    if ok {
                        Ok(vec![HashMap::new()])
                    } else {
                        Ok(Vec::new())
                    }
                }
                other => Err(ExecutionError::TypeMismatch(format!(
                    "MERGE rebinds {} which holds {}",
                    var,
                    other.runtime_type()
                ))),
            };
        }
    }

    let mut matches: Vec<NodeRecord> = rc.exec.graph.nodes(&labels, &props).collect();
    // Entities created earlier in this query live only in the journal.
    for op in rc.exec.journal.borrow().ops() {
        if let WriteOp::CreateNode {
            id,
            labels: created_labels,
            properties,
        } = op
        {
            let record = NodeRecord {
                id: *id,
                labels: created_labels.clone(),
                properties: properties.clone(),
            };
            if labels.iter().all(|l| record.has_label(l))
                && props.iter().all(|(k, v)| record.property(k) == Some(v))
            {
                matches.push(record);
            }
        }
    }

    if matches.is_empty() {
        let mut props_map = std::collections::BTreeMap::new();
        for (k, v) in props {
            props_map.insert(k, v);
        }
        let record = rc.exec.journal.borrow_mut().create_node(labels, props_map);
        matches.push(record);
    }

    Ok(matches
        .into_iter()
        .map(|record| {
            let mut bound = HashMap::new();
            if let Some(ref var) = node.variable {
                bound.insert(var.clone(), Value::Node(record));
            }
            bound
        })
        .collect())
}

fn merge_single_hop(
    start: &corvus_ast::NodePattern,
    rel: &corvus_ast::RelPattern,
    end: &corvus_ast::NodePattern,
    rc: &ExpressionContext<'_>,
) -> Result<Vec<HashMap<String, Value>>> {
    let bound_node = |node: &corvus_ast::NodePattern| -> Result<NodeRecord> {
        let var = node.variable.as_ref().ok_or_else(|| {
            ExecutionError::Planning("MERGE relationship endpoints must be bound".into())
        })?;
        match rc.var(var) {
            Some(Value::Node(n)) => Ok(n.clone()),
            Some(other) => Err(ExecutionError::TypeMismatch(format!(
                "MERGE endpoint {} holds {}",
                var,
                other.runtime_type()
            ))),
            None => Err(ExecutionError::UnboundVariable(var.clone())),
        }
    };
    let src = bound_node(start)?;
    let dst = bound_node(end)?;
    let types: Vec<Label> = rel.types.iter().map(Label::new).collect();

    let direction = rel.direction;
    let mut found: Vec<RelRecord> = rc
        .exec
        .graph
        .expand(src.id, direction, &types)
        .filter(|(_, far)| far.id == dst.id)
        .map(|(record, _)| record)
        .collect();

    for op in rc.exec.journal.borrow().ops() {
        if let WriteOp::CreateRel {
            id,
            start: s,
            end: e,
            rel_type,
            properties,
        } = op
        {
            let oriented = match direction {
                Direction::Outgoing => *s == src.id && *e == dst.id,
                Direction::Incoming => *s == dst.id && *e == src.id,
                Direction::Both => {
                    (*s == src.id && *e == dst.id) || (*s == dst.id && *e == src.id)
                }
            };
            let typed = types.is_empty()
                || rel_type.as_ref().map(|t| types.contains(t)).unwrap_or(false);
            if oriented && typed {
                found.push(RelRecord {
                    id: *id,
                    start: *s,
                    end: *e,
                    rel_type: rel_type.clone(),
                    properties: properties.clone(),
                });
            }
        }
    }

    if found.is_empty() {
        let (s, e) = match direction {
            Direction::Incoming => (dst.id, src.id),
            _ => (src.id, dst.id),
        };
        let rel_type = types.first().cloned();
        let record = rc.exec.journal.borrow_mut().create_rel(
            s,
            e,
            rel_type,
            std::collections::BTreeMap::new(),
        );
        found.push(record);
    }

    Ok(found
        .into_iter()
        .map(|record| {
            let mut bound = HashMap::new();
            if let Some(ref var) = rel.variable {
                bound.insert(var.clone(), Value::Rel(record));
            }
            bound
        })
        .collect())
}

// =============================================================================
// Tests
// =============================================================================
