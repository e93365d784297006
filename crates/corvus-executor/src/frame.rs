//! The data-frame abstraction.
//!
//! A [`DataFrame`] bundles an immutable [`Schema`] with a lazy, restartable
//! row stream: every call to [`DataFrame::rows`] starts the pipeline over.
//! Streaming operators wrap the parent's stream; buffering operators
//! (`group_by`, `order_by`, `join`) materialize when iteration starts and
//! release their buffers when the iterator is dropped.

use crate::eval::{self, ExpressionContext, TypeEnv};
use crate::value::{Value, ValueKey};
use crate::{aggregate, cmp, ExecutionError, Result};
use corvus_ast::{Expression, ReturnItem};
use corvus_core::CypherType;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

// =============================================================================
// Schema and rows
// =============================================================================

/// An ordered sequence of `(name, type)` pairs with unique names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema(Vec<(String, CypherType)>);

impl Schema {
    /// Builds a schema, rejecting duplicate column names.
    pub fn new(columns: Vec<(String, CypherType)>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (name, _) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ExecutionError::Planning(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }
        Ok(Self(columns))
    }

    /// The empty schema.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The columns in order.
    pub fn columns(&self) -> &[(String, CypherType)] {
        &self.0
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    /// The position of a column.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(n, _)| n == name)
    }

    /// True if the column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty schema.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A type environment mapping each column to its type.
    pub fn type_env(&self) -> TypeEnv {
        self.0
            .iter()
            .map(|(n, t)| (n.clone(), t.clone()))
            .collect()
    }

    /// This schema with extra columns appended.
    pub fn extended(&self, extra: Vec<(String, CypherType)>) -> Result<Self> {
        let mut columns = self.0.clone();
        columns.extend(extra);
        Self::new(columns)
    }
}

/// A row: values positionally matching a schema.
pub type Row = Vec<Value>;

/// A fallible row stream.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

/// Binds each column of a row as a variable on top of `base`.
pub fn row_ctx<'a>(
    base: &ExpressionContext<'a>,
    schema: &Schema,
    row: &Row,
) -> ExpressionContext<'a> {
    base.with_vars(
        schema
            .names()
            .zip(row.iter())
            .map(|(n, v)| (n.to_string(), v.clone())),
    )
}

// =============================================================================
// DataFrame
// =============================================================================

/// Kind of equality join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Keep only matching pairs
    Inner,
    /// Keep every left row, null-padding the right side
    LeftOuter,
}

/// A schema plus a restartable lazy row stream.
pub struct DataFrame<'a> {
    schema: Schema,
    source: Rc<dyn Fn() -> RowIter<'a> + 'a>,
}

impl<'a> Clone for DataFrame<'a> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            source: Rc::clone(&self.source),
        }
    }
}

impl<'a> std::fmt::Debug for DataFrame<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFrame").field("schema", &self.schema).finish()
    }
}

impl<'a> DataFrame<'a> {
    /// Builds a frame from a schema and a restartable source.
    pub fn from_source(schema: Schema, source: impl Fn() -> RowIter<'a> + 'a) -> Self {
        Self {
            schema,
            source: Rc::new(source),
        }
    }

    /// The schema-less frame with exactly one empty row; the seed every
    /// pipeline starts from.
    pub fn unit() -> Self {
        Self::from_source(Schema::empty(), || Box::new(std::iter::once(Ok(Vec::new()))))
    }

    /// An empty frame with the given schema.
    pub fn empty(schema: Schema) -> Self {
        Self::from_source(schema, || Box::new(std::iter::empty()))
    }

    /// A materialized frame.
    pub fn from_rows(schema: Schema, rows: Vec<Row>) -> Self {
        let rows = Rc::new(rows);
        Self::from_source(schema, move || {
            let rows = Rc::clone(&rows);
            Box::new((0..rows.len()).map(move |i| Ok(rows[i].clone())))
        })
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Starts a fresh pass over the rows.
    pub fn rows(&self) -> RowIter<'a> {
        (self.source)()
    }

    /// Drains the frame into a vector.
    pub fn collect(&self) -> Result<Vec<Row>> {
        self.rows().collect()
    }

    // =========================================================================
    // Streaming operators
    // =========================================================================

    /// Projects each row through the given items. The output schema is the
    /// item aliases with inferred types, in item order.
    pub fn project(
        &self,
        items: &[ReturnItem],
        ctx: &ExpressionContext<'a>,
    ) -> Result<DataFrame<'a>> {
        let env = self.schema.type_env();
        let schema = Schema::new(
            items
                .iter()
                .map(|item| (item.output_name(), eval::type_of(&item.expression, &env)))
                .collect(),
        )?;

        let parent = self.clone();
        let ctx = ctx.clone();
        let items = items.to_vec();
        Ok(DataFrame::from_source(schema, move || {
            let ctx = ctx.clone();
            let items = items.clone();
            let in_schema = parent.schema.clone();
            Box::new(parent.rows().map(move |row| {
                let row = row?;
                let rc = row_ctx(&ctx, &in_schema, &row);
                items
                    .iter()
                    .map(|item| eval::eval(&item.expression, &rc))
                    .collect()
            }))
        }))
    }

    /// Keeps rows where the predicate evaluates to `Bool(true)`. A null
    /// predicate result drops the row.
    pub fn filter(
        &self,
        predicate: &Expression,
        ctx: &ExpressionContext<'a>,
    ) -> Result<DataFrame<'a>> {
        let parent = self.clone();
        let ctx = ctx.clone();
        let predicate = predicate.clone();
        Ok(DataFrame::from_source(self.schema.clone(), move || {
            let ctx = ctx.clone();
            let predicate = predicate.clone();
            let in_schema = parent.schema.clone();
            Box::new(parent.rows().filter_map(move |row| match row {
                Ok(row) => {
                    let rc = row_ctx(&ctx, &in_schema, &row);
                    match eval::eval_predicate(&predicate, &rc) {
                        Ok(true) => Some(Ok(row)),
                        Ok(false) => None,
                        Err(e) => Some(Err(e)),
                    }
                }
                Err(e) => Some(Err(e)),
            }))
        }))
    }

    /// Drops the first `n` rows. Negative `n` is invalid.
    pub fn skip(&self, n: i64) -> Result<DataFrame<'a>> {
        if n < 0 {
            return Err(ExecutionError::InvalidArgument(format!(
                "SKIP must be non-negative, got {}",
                n
            )));
        }
        let parent = self.clone();
        Ok(DataFrame::from_source(self.schema.clone(), move || {
            Box::new(parent.rows().skip(n as usize))
        }))
    }

    /// Keeps at most `n` rows. Negative `n` is invalid.
    pub fn take(&self, n: i64) -> Result<DataFrame<'a>> {
        if n < 0 {
            return Err(ExecutionError::InvalidArgument(format!(
                "LIMIT must be non-negative, got {}",
                n
            )));
        }
        let parent = self.clone();
        Ok(DataFrame::from_source(self.schema.clone(), move || {
            Box::new(parent.rows().take(n as usize))
        }))
    }

    /// Removes duplicate rows under value-equality, keeping first
    /// occurrences in order.
    pub fn distinct(&self) -> DataFrame<'a> {
        let parent = self.clone();
        DataFrame::from_source(self.schema.clone(), move || {
            let mut seen: HashSet<Vec<ValueKey>> = HashSet::new();
            Box::new(parent.rows().filter_map(move |row| match row {
                Ok(row) => {
                    let key: Vec<ValueKey> = row.iter().map(Value::group_key).collect();
                    if seen.insert(key) {
                        Some(Ok(row))
                    } else {
                        None
                    }
                }
                Err(e) => Some(Err(e)),
            }))
        })
    }

    /// Appends another frame's rows after this frame's. Schemas must agree
    /// positionally in name and type.
    pub fn chain(&self, other: &DataFrame<'a>) -> Result<DataFrame<'a>> {
        if self.schema != other.schema {
            return Err(ExecutionError::TypeMismatch(format!(
                "UNION sides have different columns: [{}] vs [{}]",
                self.schema.names().collect::<Vec<_>>().join(", "),
                other.schema.names().collect::<Vec<_>>().join(", ")
            )));
        }
        let left = self.clone();
        let right = other.clone();
        Ok(DataFrame::from_source(self.schema.clone(), move || {
            Box::new(left.rows().chain(right.rows()))
        }))
    }

    // =========================================================================
    // Buffering operators
    // =========================================================================

    /// Groups rows by the grouping items and folds the aggregation items
    /// over each partition. The output schema is `groupings ++ aggregations`
    /// in that order. With no groupings and no input there is still one row
    /// of aggregator identities.
    pub fn group_by(
        &self,
        groupings: &[ReturnItem],
        aggregations: &[ReturnItem],
        ctx: &ExpressionContext<'a>,
    ) -> Result<DataFrame<'a>> {
        let env = self.schema.type_env();
        let mut columns = Vec::with_capacity(groupings.len() + aggregations.len());
        for item in groupings.iter().chain(aggregations.iter()) {
            columns.push((item.output_name(), eval::type_of(&item.expression, &env)));
        }
        let schema = Schema::new(columns)?;

        let parent = self.clone();
        let ctx = ctx.clone();
        let groupings = groupings.to_vec();
        let aggregations = aggregations.to_vec();
        Ok(DataFrame::from_source(schema, move || {
            let compute = || -> Result<Vec<Row>> {
                // Partition, preserving first-seen group order.
                let mut order: Vec<Vec<ValueKey>> = Vec::new();
                let mut partitions: HashMap<Vec<ValueKey>, (Row, Vec<ExpressionContext<'a>>)> =
                    HashMap::new();
                for row in parent.rows() {
                    let row = row?;
                    let rc = row_ctx(&ctx, &parent.schema, &row);
                    let mut key = Vec::with_capacity(groupings.len());
                    let mut key_values = Vec::with_capacity(groupings.len());
                    for item in &groupings {
                        let v = eval::eval(&item.expression, &rc)?;
                        key.push(v.group_key());
                        key_values.push(v);
                    }
                    partitions
                        .entry(key.clone())
                        .or_insert_with(|| {
                            order.push(key.clone());
                            (key_values, Vec::new())
                        })
                        .1
                        .push(rc);
                }

                // A global aggregation over empty input still yields one row.
                if partitions.is_empty() && groupings.is_empty() {
                    let mut row = Vec::with_capacity(aggregations.len());
                    for item in &aggregations {
                        row.push(aggregate::aggregate_eval(&item.expression, &[], &ctx)?);
                    }
                    return Ok(vec![row]);
                }

                let mut out = Vec::with_capacity(partitions.len());
                for key in order {
                    let (group_values, contexts) = partitions
                        .remove(&key)
                        .ok_or_else(|| ExecutionError::Planning("lost group partition".into()))?;
                    let mut row = group_values;
                    for item in &aggregations {
                        row.push(aggregate::aggregate_eval(&item.expression, &contexts, &ctx)?);
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

    /// Sorts by the given `(expression, descending)` keys. The sort is
    /// stable; nulls come last ascending and first descending.
    pub fn order_by(
        &self,
        keys: &[(Expression, bool)],
        ctx: &ExpressionContext<'a>,
    ) -> Result<DataFrame<'a>> {
        let parent = self.clone();
        let ctx = ctx.clone();
        let keys = keys.to_vec();
        Ok(DataFrame::from_source(self.schema.clone(), move || {
            let compute = || -> Result<Vec<Row>> {
                let mut keyed: Vec<(Vec<Value>, Row)> = Vec::new();
                for row in parent.rows() {
                    let row = row?;
                    let rc = row_ctx(&ctx, &parent.schema, &row);
                    let mut sort_key = Vec::with_capacity(keys.len());
                    for (expr, _) in &keys {
                        sort_key.push(eval::eval(expr, &rc)?);
                    }
                    keyed.push((sort_key, row));
                }
                keyed.sort_by(|(a, _), (b, _)| {
                    for (i, (_, descending)) in keys.iter().enumerate() {
                        let ord = cmp::total_cmp(&a[i], &b[i]);
                        let ord = if *descending { ord.reverse() } else { ord };
                        if ord != std::cmp::Ordering::Equal {
                            return ord;
                        }
                    }
                    std::cmp::Ordering::Equal
                });
                Ok(keyed.into_iter().map(|(_, row)| row).collect())
            };
            match compute() {
                Ok(rows) => Box::new(rows.into_iter().map(Ok)),
                Err(e) => Box::new(std::iter::once(Err(e))),
            }
        }))
    }

    /// Equality join on named columns. Null join keys never match; under a
    /// left-outer join such left rows survive null-padded.
    pub fn join(
        &self,
        other: &DataFrame<'a>,
        join_columns: &[String],
        kind: JoinKind,
    ) -> Result<DataFrame<'a>> {
        let mut left_idx = Vec::with_capacity(join_columns.len());
        let mut right_idx = Vec::with_capacity(join_columns.len());
        for name in join_columns {
            left_idx.push(self.schema.index_of(name).ok_or_else(|| {
                ExecutionError::Planning(format!("join column '{}' missing on the left", name))
            })?);
            right_idx.push(other.schema.index_of(name).ok_or_else(|| {
                ExecutionError::Planning(format!("join column '{}' missing on the right", name))
            })?);
        }

        // Output carries the left schema plus the right's non-join columns.
        let carried: Vec<usize> = (0..other.schema.len())
            .filter(|i| !right_idx.contains(i))
            .collect();
        let schema = self.schema.extended(
            carried
                .iter()
                .map(|&i| other.schema.columns()[i].clone())
                .collect(),
        )?;

        let left = self.clone();
        let right = other.clone();
        Ok(DataFrame::from_source(schema, move || {
            let left_idx = left_idx.clone();
            let right_idx = right_idx.clone();
            let carried = carried.clone();
            let kind = kind;

            // Build side: hash the right input.
            let mut table: HashMap<Vec<ValueKey>, Vec<Row>> = HashMap::new();
            let mut build_error = None;
            for row in right.rows() {
                match row {
                    Ok(row) => {
                        if row.iter().enumerate().any(|(i, v)| {
                            right_idx.contains(&i) && v.is_null()
                        }) {
                            continue;
                        }
                        let key: Vec<ValueKey> =
                            right_idx.iter().map(|&i| row[i].group_key()).collect();
                        table.entry(key).or_default().push(row);
                    }
                    Err(e) => {
                        build_error = Some(e);
                        break;
                    }
                }
            }
            if let Some(e) = build_error {
                return Box::new(std::iter::once(Err(e)));
            }

            let pad = carried.len();
            Box::new(left.rows().flat_map(move |row| -> Vec<Result<Row>> {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => return vec![Err(e)],
                };
                let null_key = left_idx.iter().any(|&i| row[i].is_null());
                let matches = if null_key {
                    None
                } else {
                    let key: Vec<ValueKey> =
                        left_idx.iter().map(|&i| row[i].group_key()).collect();
                    table.get(&key)
                };
                match matches {
                    Some(rights) => rights
                        .iter()
                        .map(|r| {
                            let mut out = row.clone();
                            out.extend(carried.iter().map(|&i| r[i].clone()));
                            Ok(out)
                        })
                        .collect(),
                    None => match kind {
                        JoinKind::Inner => Vec::new(),
                        JoinKind::LeftOuter => {
                            let mut out = row;
                            out.extend(std::iter::repeat(Value::Null).take(pad));
                            vec![Ok(out)]
                        }
                    },
                }
            }))
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{ExecutionContext, Parameters};
    use crate::functions::ProcedureRegistry;
    use corvus_ast::{ComparisonOp, Expression as E};
    use corvus_graph::InMemoryGraph;

    fn with_ctx<F: FnOnce(&ExpressionContext<'_>)>(f: F) {
        let graph = InMemoryGraph::new();
        let procs = ProcedureRegistry::standard();
        let exec = ExecutionContext::new(&graph, &procs, Parameters::new());
        let ctx = ExpressionContext::new(&exec);
        f(&ctx);
    }

    fn int_frame<'a>(name: &str, values: &[i64]) -> DataFrame<'a> {
        let schema = Schema::new(vec![(name.to_string(), CypherType::Integer)]).unwrap();
        DataFrame::from_rows(schema, values.iter().map(|i| vec![Value::Int(*i)]).collect())
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        assert!(Schema::new(vec![
            ("a".into(), CypherType::Any),
            ("a".into(), CypherType::Any)
        ])
        .is_err());
    }

    #[test]
    fn test_frame_is_restartable() {
        let df = int_frame("x", &[1, 2, 3]);
        assert_eq!(df.collect().unwrap().len(), 3);
        assert_eq!(df.collect().unwrap().len(), 3);
    }

    #[test]
    fn test_project_identity_roundtrip() {
        with_ctx(|ctx| {
            let df = int_frame("x", &[1, 2]);
            let projected = df.project(&[ReturnItem::variable("x")], ctx).unwrap();
            assert_eq!(projected.schema(), df.schema());
            assert_eq!(projected.collect().unwrap(), df.collect().unwrap());
        });
    }

    #[test]
    fn test_filter_drops_null_predicates() {
        with_ctx(|ctx| {
            let schema = Schema::new(vec![("x".into(), CypherType::Any)]).unwrap();
            let df = DataFrame::from_rows(
                schema,
                vec![vec![Value::Int(1)], vec![Value::Null], vec![Value::Int(5)]],
            );
            // x > 2: row 1 false, row 2 null, row 3 true
            let pred = E::compare(ComparisonOp::Gt, E::var("x"), E::int(2));
            let kept = df.filter(&pred, ctx).unwrap().collect().unwrap();
            assert_eq!(kept, vec![vec![Value::Int(5)]]);
        });
    }

    #[test]
    fn test_filters_commute() {
        with_ctx(|ctx| {
            let df = int_frame("x", &[1, 2, 3, 4, 5, 6]);
            let p1 = E::compare(ComparisonOp::Gt, E::var("x"), E::int(2));
            let p2 = E::compare(ComparisonOp::Lt, E::var("x"), E::int(6));
            let a = df
                .filter(&p1, ctx)
                .unwrap()
                .filter(&p2, ctx)
                .unwrap()
                .collect()
                .unwrap();
            let b = df
                .filter(&p2, ctx)
                .unwrap()
                .filter(&p1, ctx)
                .unwrap()
                .collect()
                .unwrap();
            assert_eq!(a, b);
        });
    }

    #[test]
    fn test_skip_take_and_negative_arguments() {
        with_ctx(|_| {
            let df = int_frame("x", &[1, 2, 3, 4, 5]);
            let page = df.skip(1).unwrap().take(2).unwrap().collect().unwrap();
            assert_eq!(page, vec![vec![Value::Int(2)], vec![Value::Int(3)]]);

            assert!(matches!(
                df.skip(-1),
                Err(ExecutionError::InvalidArgument(_))
            ));
            assert!(matches!(
                df.take(-5),
                Err(ExecutionError::InvalidArgument(_))
            ));
        });
    }

    #[test]
    fn test_distinct_is_idempotent_and_ordered() {
        let df = int_frame("x", &[3, 1, 3, 2, 1]);
        let once = df.distinct();
        let twice = once.distinct();
        let expected = vec![vec![Value::Int(3)], vec![Value::Int(1)], vec![Value::Int(2)]];
        assert_eq!(once.collect().unwrap(), expected);
        assert_eq!(twice.collect().unwrap(), expected);
    }

    #[test]
    fn test_distinct_unifies_int_and_float() {
        let schema = Schema::new(vec![("x".into(), CypherType::Number)]).unwrap();
        let df = DataFrame::from_rows(
            schema,
            vec![vec![Value::Int(3)], vec![Value::Float(3.0)], vec![Value::Float(3.5)]],
        );
        assert_eq!(df.distinct().collect().unwrap().len(), 2);
    }

    #[test]
    fn test_order_by_stable_with_nulls() {
        with_ctx(|ctx| {
            let schema = Schema::new(vec![
                ("x".into(), CypherType::Any),
                ("tag".into(), CypherType::String),
            ])
            .unwrap();
            let df = DataFrame::from_rows(
                schema,
                vec![
                    vec![Value::Int(2), Value::Str("a".into())],
                    vec![Value::Null, Value::Str("n".into())],
                    vec![Value::Int(1), Value::Str("b".into())],
                    vec![Value::Int(2), Value::Str("c".into())],
                ],
            );

            let asc = df
                .order_by(&[(E::var("x"), false)], ctx)
                .unwrap()
                .collect()
                .unwrap();
            // Nulls last ascending; equal keys keep input order (a before c).
            assert_eq!(asc[0][1], Value::Str("b".into()));
            assert_eq!(asc[1][1], Value::Str("a".into()));
            assert_eq!(asc[2][1], Value::Str("c".into()));
            assert_eq!(asc[3][1], Value::Str("n".into()));

            let desc = df
                .order_by(&[(E::var("x"), true)], ctx)
                .unwrap()
                .collect()
                .unwrap();
            // Nulls first descending.
            assert_eq!(desc[0][1], Value::Str("n".into()));
        });
    }

    #[test]
    fn test_order_by_idempotent() {
        with_ctx(|ctx| {
            let df = int_frame("x", &[3, 1, 2]);
            let keys = [(E::var("x"), false)];
            let once = df.order_by(&keys, ctx).unwrap();
            let twice = once.order_by(&keys, ctx).unwrap();
            assert_eq!(once.collect().unwrap(), twice.collect().unwrap());
        });
    }

    #[test]
    fn test_group_by_schema_and_partitions() {
        with_ctx(|ctx| {
            let schema = Schema::new(vec![
                ("name".into(), CypherType::String),
                ("age".into(), CypherType::Any),
            ])
            .unwrap();
            let df = DataFrame::from_rows(
                schema,
                vec![
                    vec![Value::Str("Alex".into()), Value::Null],
                    vec![Value::Str("Alex".into()), Value::Int(10)],
                    vec![Value::Str("Cat".into()), Value::Int(10)],
                    vec![Value::Str("Cat".into()), Value::Int(15)],
                ],
            );

            let grouped = df
                .group_by(
                    &[ReturnItem::variable("name")],
                    &[
                        ReturnItem::aliased(E::CountStar, "rows"),
                        ReturnItem::aliased(E::call("count", vec![E::var("age")]), "ages"),
                    ],
                    ctx,
                )
                .unwrap();

            // groupings ++ aggregations, in that order
            let names: Vec<_> = grouped.schema().names().map(str::to_string).collect();
            assert_eq!(names, vec!["name", "rows", "ages"]);

            let rows = grouped.collect().unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(
                rows[0],
                vec![Value::Str("Alex".into()), Value::Int(2), Value::Int(1)]
            );
            assert_eq!(
                rows[1],
                vec![Value::Str("Cat".into()), Value::Int(2), Value::Int(2)]
            );
        });
    }

    #[test]
    fn test_group_by_empty_input_global_aggregation() {
        with_ctx(|ctx| {
            let df = DataFrame::empty(Schema::new(vec![("x".into(), CypherType::Any)]).unwrap());
            let grouped = df
                .group_by(&[], &[ReturnItem::aliased(E::CountStar, "n")], ctx)
                .unwrap();
            assert_eq!(grouped.collect().unwrap(), vec![vec![Value::Int(0)]]);

            // With groupings, empty input stays empty.
            let keyed = df
                .group_by(
                    &[ReturnItem::variable("x")],
                    &[ReturnItem::aliased(E::CountStar, "n")],
                    ctx,
                )
                .unwrap();
            assert!(keyed.collect().unwrap().is_empty());
        });
    }

    #[test]
    fn test_inner_and_left_outer_join() {
        let left = {
            let schema = Schema::new(vec![
                ("k".into(), CypherType::Integer),
                ("l".into(), CypherType::String),
            ])
            .unwrap();
            DataFrame::from_rows(
                schema,
                vec![
                    vec![Value::Int(1), Value::Str("a".into())],
                    vec![Value::Int(2), Value::Str("b".into())],
                    vec![Value::Null, Value::Str("n".into())],
                ],
            )
        };
        let right = {
            let schema = Schema::new(vec![
                ("k".into(), CypherType::Integer),
                ("r".into(), CypherType::String),
            ])
            .unwrap();
            DataFrame::from_rows(
                schema,
                vec![
                    vec![Value::Int(1), Value::Str("x".into())],
                    vec![Value::Int(1), Value::Str("y".into())],
                ],
            )
        };

        let inner = left
            .join(&right, &["k".to_string()], JoinKind::Inner)
            .unwrap();
        let names: Vec<_> = inner.schema().names().map(str::to_string).collect();
        assert_eq!(names, vec!["k", "l", "r"]);
        let rows = inner.collect().unwrap();
        assert_eq!(rows.len(), 2);

        let outer = left
            .join(&right, &["k".to_string()], JoinKind::LeftOuter)
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(outer.len(), 4);
        // The null-key row survives null-padded.
        assert!(outer
            .iter()
            .any(|r| r[1] == Value::Str("n".into()) && r[2] == Value::Null));
    }

    #[test]
    fn test_chain_requires_matching_schemas() {
        let a = int_frame("x", &[1]);
        let b = int_frame("y", &[2]);
        assert!(matches!(
            a.chain(&b),
            Err(ExecutionError::TypeMismatch(_))
        ));

        let c = int_frame("x", &[2]);
        let chained = a.chain(&c).unwrap().collect().unwrap();
        assert_eq!(chained, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    }
}
