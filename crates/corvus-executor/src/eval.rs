//! Expression evaluation.
//!
//! [`eval`] reduces an expression to a [`Value`] against a per-row
//! [`ExpressionContext`]. Aggregating expressions are rejected here and
//! handled by [`crate::aggregate::aggregate_eval`]; the planner keeps the
//! two apart. [`type_of`] is the inference pass the planner uses to build
//! output schemas.

use crate::functions::ProcedureRegistry;
use crate::value::{PathValue, Value};
use crate::{cmp, ExecutionError, Result};
use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use corvus_ast::{
    ArithmeticOp, ComparisonOp, Expression, FunctionName, Literal, PathStep, StringMatchOp,
};
use corvus_graph::{GraphModel, WriteJournal};
use regex::Regex;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock};

/// Parameter map for a query.
pub type Parameters = HashMap<String, Value>;

/// A type environment for inference: variable name to type.
pub type TypeEnv = HashMap<String, corvus_core::CypherType>;

// =============================================================================
// Contexts
// =============================================================================

/// Immutable per-query state: the graph handle, parameters, the procedure
/// registry and the write journal buffered writes go into.
pub struct ExecutionContext<'a> {
    /// The graph being queried
    pub graph: &'a dyn GraphModel,
    /// Query parameters
    pub params: Parameters,
    /// Registered procedures
    pub procedures: &'a ProcedureRegistry,
    /// Buffered writes, committed once by the runner
    pub journal: RefCell<WriteJournal>,
}

impl<'a> ExecutionContext<'a> {
    /// Creates the context for one query run. The journal's id allocation
    /// is seeded from the graph's current ceilings.
    pub fn new(
        graph: &'a dyn GraphModel,
        procedures: &'a ProcedureRegistry,
        params: Parameters,
    ) -> Self {
        let journal = WriteJournal::new(graph.next_node_id(), graph.next_rel_id());
        Self {
            graph,
            params,
            procedures,
            journal: RefCell::new(journal),
        }
    }
}

/// A per-row view: the execution context plus the variable bindings of the
/// current row. Cheap to clone; `with_var` shares structure.
#[derive(Clone)]
pub struct ExpressionContext<'a> {
    /// The enclosing per-query context
    pub exec: &'a ExecutionContext<'a>,
    vars: im::HashMap<String, Value>,
}

impl<'a> ExpressionContext<'a> {
    /// A context with no variable bindings.
    pub fn new(exec: &'a ExecutionContext<'a>) -> Self {
        Self {
            exec,
            vars: im::HashMap::new(),
        }
    }

    /// Looks up a bound variable.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Returns a context with one additional binding.
    pub fn with_var(&self, name: impl Into<String>, value: Value) -> Self {
        Self {
            exec: self.exec,
            vars: self.vars.update(name.into(), value),
        }
    }

    /// Returns a context with the given bindings replacing the current ones.
    pub fn with_vars<I, K>(&self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            exec: self.exec,
            vars: vars.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Iterates over the current bindings.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Evaluates an expression to a value.
pub fn eval(expr: &Expression, ctx: &ExpressionContext<'_>) -> Result<Value> {
    match expr {
        Expression::Literal(lit) => Ok(literal_to_value(lit)),

        Expression::Variable(name) => ctx
            .var(name)
            .cloned()
            .ok_or_else(|| ExecutionError::UnboundVariable(name.clone())),

        Expression::Parameter(name) => ctx
            .exec
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::UnknownParameter(name.clone())),

        Expression::Property { subject, key } => {
            let subject = eval(subject, ctx)?;
            property_access(&subject, key)
        }

        Expression::ContainerIndex { container, index } => {
            let container = eval(container, ctx)?;
            let index = eval(index, ctx)?;
            container_index(&container, &index)
        }

        Expression::Arithmetic { op, left, right } => {
            let left = eval(left, ctx)?;
            let right = eval(right, ctx)?;
            arithmetic(*op, &left, &right)
        }

        Expression::Comparison { op, left, right } => {
            let left = eval(left, ctx)?;
            let right = eval(right, ctx)?;
            Ok(opt_bool(comparison(*op, &left, &right)))
        }

        Expression::And(l, r) => {
            let left = kleene(&eval(l, ctx)?)?;
            if left == Some(false) {
                return Ok(Value::Bool(false));
            }
            let right = kleene(&eval(r, ctx)?)?;
            Ok(opt_bool(match (left, right) {
                (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }))
        }

        Expression::Or(l, r) => {
            let left = kleene(&eval(l, ctx)?)?;
            if left == Some(true) {
                return Ok(Value::Bool(true));
            }
            let right = kleene(&eval(r, ctx)?)?;
            Ok(opt_bool(match (left, right) {
                (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }))
        }

        Expression::Not(e) => {
            let v = kleene(&eval(e, ctx)?)?;
            Ok(opt_bool(v.map(|b| !b)))
        }

        Expression::Ands(es) => {
            let mut unknown = false;
            for e in es {
                match kleene(&eval(e, ctx)?)? {
                    Some(false) => return Ok(Value::Bool(false)),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            Ok(opt_bool(if unknown { None } else { Some(true) }))
        }

        Expression::Ors(es) => {
            let mut unknown = false;
            for e in es {
                match kleene(&eval(e, ctx)?)? {
                    Some(true) => return Ok(Value::Bool(true)),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            Ok(opt_bool(if unknown { None } else { Some(false) }))
        }

        Expression::IsNull(e) => Ok(Value::Bool(eval(e, ctx)?.is_null())),
        Expression::IsNotNull(e) => Ok(Value::Bool(!eval(e, ctx)?.is_null())),

        Expression::StringMatch { op, left, right } => {
            let left = eval(left, ctx)?;
            let right = eval(right, ctx)?;
            // Anything but a pair of strings, null operands included, is
            // definitely-false rather than unknown.
            match (&left, &right) {
                (Value::Str(l), Value::Str(r)) => Ok(Value::Bool(match op {
                    StringMatchOp::StartsWith => l.starts_with(r.as_str()),
                    StringMatchOp::EndsWith => l.ends_with(r.as_str()),
                    StringMatchOp::Contains => l.contains(r.as_str()),
                    StringMatchOp::Regex => cached_regex(r)?.is_match(l),
                })),
                _ => Ok(Value::Bool(false)),
            }
        }

        Expression::In { item, list } => {
            let item = eval(item, ctx)?;
            let list = eval(list, ctx)?;
            match list {
                Value::Null => Ok(Value::Null),
                Value::List(items) => {
                    if item.is_null() {
                        return Ok(Value::Null);
                    }
                    let mut unknown = false;
                    for candidate in &items {
                        match cmp::eq_values(&item, candidate) {
                            Some(true) => return Ok(Value::Bool(true)),
                            None => unknown = true,
                            Some(false) => {}
                        }
                    }
                    Ok(opt_bool(if unknown { None } else { Some(false) }))
                }
                other => Err(ExecutionError::TypeMismatch(format!(
                    "IN expects a list, got {}",
                    other.runtime_type()
                ))),
            }
        }

        Expression::HasLabels { subject, labels } => {
            let subject = eval(subject, ctx)?;
            match subject {
                Value::Null => Ok(Value::Null),
                Value::Node(node) => Ok(Value::Bool(
                    labels
                        .iter()
                        .all(|l| node.labels.iter().any(|nl| nl.as_str() == l)),
                )),
                other => Err(ExecutionError::TypeMismatch(format!(
                    "label check expects a node, got {}",
                    other.runtime_type()
                ))),
            }
        }

        Expression::Case {
            subject,
            alternatives,
            default,
        } => {
            if let Some(subject) = subject {
                let subject = eval(subject, ctx)?;
                if subject.is_null() {
                    return Ok(Value::Null);
                }
                for (when, then) in alternatives {
                    let when = eval(when, ctx)?;
                    let hit = match &when {
                        Value::Bool(b) => *b,
                        other => cmp::eq_values(&subject, other) == Some(true),
                    };
                    if hit {
                        return eval(then, ctx);
                    }
                }
            } else {
                for (when, then) in alternatives {
                    if eval(when, ctx)?.is_true() {
                        return eval(then, ctx);
                    }
                }
            }
            match default {
                Some(d) => eval(d, ctx),
                None => Ok(Value::Null),
            }
        }

        Expression::FunctionCall {
            name,
            args,
            distinct,
        } => eval_function(name, args, *distinct, ctx),

        Expression::CountStar => Err(ExecutionError::Planning(
            "count(*) is only valid in an aggregation".into(),
        )),

        Expression::ListLiteral(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, ctx)?);
            }
            Ok(Value::List(values))
        }

        Expression::MapLiteral(pairs) => {
            let mut map = BTreeMap::new();
            for (key, value) in pairs {
                map.insert(key.clone(), eval(value, ctx)?);
            }
            Ok(Value::Map(map))
        }

        Expression::PathExpression(step) => build_path(step, ctx),
    }
}

/// Evaluates a predicate: true only when the expression is `Bool(true)`.
pub fn eval_predicate(expr: &Expression, ctx: &ExpressionContext<'_>) -> Result<bool> {
    Ok(eval(expr, ctx)?.is_true())
}

fn eval_function(
    name: &FunctionName,
    args: &[Expression],
    distinct: bool,
    ctx: &ExpressionContext<'_>,
) -> Result<Value> {
    // coalesce is lazy: stop at the first non-null argument.
    if name.namespace.is_empty() && name.name == "coalesce" {
        for arg in args {
            let v = eval(arg, ctx)?;
            if !v.is_null() {
                return Ok(v);
            }
        }
        return Ok(Value::Null);
    }

    let proc = ctx.exec.procedures.lookup(name, args.len())?;
    if proc.is_aggregating() {
        return Err(ExecutionError::Planning(format!(
            "aggregating function {} in a scalar position",
            name
        )));
    }
    if distinct {
        return Err(ExecutionError::InvalidArgument(format!(
            "DISTINCT is not applicable to {}",
            name
        )));
    }
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(arg, ctx)?);
    }
    proc.call(&values)
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::Str(s.clone()),
    }
}

fn opt_bool(v: Option<bool>) -> Value {
    match v {
        Some(b) => Value::Bool(b),
        None => Value::Null,
    }
}

/// Boolean view for Kleene connectives. Non-boolean operands are a type
/// error rather than a silent coercion.
fn kleene(v: &Value) -> Result<Option<bool>> {
    match v {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Null => Ok(None),
        other => Err(ExecutionError::TypeMismatch(format!(
            "boolean operator applied to {}",
            other.runtime_type()
        ))),
    }
}

// =============================================================================
// Property access and indexing
// =============================================================================

fn property_access(subject: &Value, key: &str) -> Result<Value> {
    match subject {
        Value::Null => Ok(Value::Null),
        Value::Node(n) => Ok(n.property(key).map(Value::wrap).unwrap_or(Value::Null)),
        Value::Rel(r) => Ok(r.property(key).map(Value::wrap).unwrap_or(Value::Null)),
        Value::Map(m) => Ok(m.get(key).cloned().unwrap_or(Value::Null)),
        Value::DateTime(dt) => datetime_component(dt, key),
        Value::Date(d) => match key {
            "year" => Ok(Value::Int(d.year() as i64)),
            "quarter" => Ok(Value::Int(((d.month0() / 3) + 1) as i64)),
            "month" => Ok(Value::Int(d.month() as i64)),
            "week" => Ok(Value::Int(d.iso_week().week() as i64)),
            "day" | "dayOfMonth" => Ok(Value::Int(d.day() as i64)),
            "dayOfYear" => Ok(Value::Int(d.ordinal() as i64)),
            "dayOfWeek" => Ok(Value::Int(d.weekday().number_from_monday() as i64)),
            other => Err(ExecutionError::UnsupportedTemporalAccessor(format!(
                "{} on a date",
                other
            ))),
        },
        Value::Time(t) => match key {
            "hour" => Ok(Value::Int(t.hour() as i64)),
            "minute" => Ok(Value::Int(t.minute() as i64)),
            "second" => Ok(Value::Int(t.second() as i64)),
            other => Err(ExecutionError::UnsupportedTemporalAccessor(format!(
                "{} on a time",
                other
            ))),
        },
        Value::Duration(_) => Err(ExecutionError::UnsupportedTemporalAccessor(format!(
            "{} on a duration",
            key
        ))),
        other => Err(ExecutionError::TypeMismatch(format!(
            "property access on {}",
            other.runtime_type()
        ))),
    }
}

/// Temporal component access on a zoned timestamp.
///
/// The sub-second divisors are kept compatible with the systems this engine
/// interoperates with: millisecond is nanos/100000 and microsecond is
/// nanos/100.
fn datetime_component(dt: &DateTime<FixedOffset>, key: &str) -> Result<Value> {
    match key {
        "year" => Ok(Value::Int(dt.year() as i64)),
        "quarter" => Ok(Value::Int(((dt.month0() / 3) + 1) as i64)),
        "month" => Ok(Value::Int(dt.month() as i64)),
        "week" => Ok(Value::Int(dt.iso_week().week() as i64)),
        "day" | "dayOfMonth" => Ok(Value::Int(dt.day() as i64)),
        "dayOfYear" => Ok(Value::Int(dt.ordinal() as i64)),
        "dayOfWeek" => Ok(Value::Int(dt.weekday().number_from_monday() as i64)),
        "hour" => Ok(Value::Int(dt.hour() as i64)),
        "minute" => Ok(Value::Int(dt.minute() as i64)),
        "second" => Ok(Value::Int(dt.second() as i64)),
        "millisecond" => Ok(Value::Int((dt.nanosecond() / 100_000) as i64)),
        "microsecond" => Ok(Value::Int((dt.nanosecond() / 100) as i64)),
        "nanosecond" => Ok(Value::Int(dt.nanosecond() as i64)),
        "offset" => Ok(Value::Str(dt.offset().to_string())),
        "epochSeconds" => Ok(Value::Int(dt.timestamp())),
        "epochMillis" => Ok(Value::Int(dt.timestamp_millis())),
        other => Err(ExecutionError::UnsupportedTemporalAccessor(format!(
            "{} on a datetime",
            other
        ))),
    }
}

fn container_index(container: &Value, index: &Value) -> Result<Value> {
    match (container, index) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Node(n), Value::Str(key)) => {
            Ok(n.property(key).map(Value::wrap).unwrap_or(Value::Null))
        }
        (Value::Rel(r), Value::Str(key)) => {
            Ok(r.property(key).map(Value::wrap).unwrap_or(Value::Null))
        }
        (Value::Map(m), Value::Str(key)) => Ok(m.get(key).cloned().unwrap_or(Value::Null)),
        (Value::List(items), Value::Int(i)) => {
            let idx = if *i < 0 { items.len() as i64 + i } else { *i };
            if idx < 0 || idx as usize >= items.len() {
                Ok(Value::Null)
            } else {
                Ok(items[idx as usize].clone())
            }
        }
        _ => Ok(Value::Null),
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

/// Binary arithmetic with null propagation.
///
/// Integer arithmetic saturates on overflow. `+` additionally concatenates
/// strings and lists and shifts temporals by durations.
pub fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match op {
        ArithmeticOp::Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.saturating_add(*b))),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            (Value::DateTime(dt), Value::Duration(d)) | (Value::Duration(d), Value::DateTime(dt)) => {
                Ok(Value::DateTime(*dt + *d))
            }
            (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(*a + *b)),
            _ => numeric_binop(op, left, right, |a, b| a + b),
        },
        ArithmeticOp::Subtract => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.saturating_sub(*b))),
            (Value::DateTime(dt), Value::Duration(d)) => Ok(Value::DateTime(*dt - *d)),
            (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(*a - *b)),
            _ => numeric_binop(op, left, right, |a, b| a - b),
        },
        ArithmeticOp::Multiply => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.saturating_mul(*b))),
            _ => numeric_binop(op, left, right, |a, b| a * b),
        },
        ArithmeticOp::Divide => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(ExecutionError::InvalidArgument("division by zero".into()))
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            _ => numeric_binop(op, left, right, |a, b| a / b),
        },
        ArithmeticOp::Modulo => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(ExecutionError::InvalidArgument("modulo by zero".into()))
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            _ => numeric_binop(op, left, right, |a, b| a % b),
        },
        ArithmeticOp::Power => match (left, right) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let a = left.as_float().unwrap_or_default();
                let b = right.as_float().unwrap_or_default();
                Ok(Value::Float(a.powf(b)))
            }
            _ => Err(type_mismatch(op, left, right)),
        },
    }
}

fn numeric_binop(
    op: ArithmeticOp,
    left: &Value,
    right: &Value,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Float(f(a, b))),
        _ => Err(type_mismatch(op, left, right)),
    }
}

fn type_mismatch(op: ArithmeticOp, left: &Value, right: &Value) -> ExecutionError {
    ExecutionError::TypeMismatch(format!(
        "cannot apply {} to {} and {}",
        op,
        left.runtime_type(),
        right.runtime_type()
    ))
}

// =============================================================================
// Comparison
// =============================================================================

/// Three-valued comparison. `Lt` is `Gt` with the operands flipped, and
/// likewise for `Lte`.
pub fn comparison(op: ComparisonOp, left: &Value, right: &Value) -> Option<bool> {
    match op {
        ComparisonOp::Eq => cmp::eq_values(left, right),
        ComparisonOp::Neq => cmp::eq_values(left, right).map(|b| !b),
        ComparisonOp::Gt => greater_than(left, right),
        ComparisonOp::Gte => greater_equal(left, right),
        ComparisonOp::Lt => greater_than(right, left),
        ComparisonOp::Lte => greater_equal(right, left),
    }
}

fn greater_than(left: &Value, right: &Value) -> Option<bool> {
    cmp::cmp_values(left, right).map(|ord| ord == std::cmp::Ordering::Greater)
}

fn greater_equal(left: &Value, right: &Value) -> Option<bool> {
    cmp::cmp_values(left, right).map(|ord| ord != std::cmp::Ordering::Less)
}

// =============================================================================
// Paths
// =============================================================================

fn build_path(step: &PathStep, ctx: &ExpressionContext<'_>) -> Result<Value> {
    // Flatten the chain first.
    let mut flat = Vec::new();
    let mut cur = step;
    loop {
        match cur {
            PathStep::Nil => break,
            PathStep::Node { variable, next } => {
                flat.push(("node", variable));
                cur = next;
            }
            PathStep::Relationship { variable, next } => {
                flat.push(("rel", variable));
                cur = next;
            }
            PathStep::Relationships { variable, next } => {
                flat.push(("rels", variable));
                cur = next;
            }
        }
    }

    let mut steps = flat.into_iter();
    let Some(("node", first)) = steps.next() else {
        return Err(ExecutionError::InvalidArgument(
            "a path must start with a node".into(),
        ));
    };
    let first = lookup_var(first, ctx)?;
    let start = match first {
        Value::Null => return Ok(Value::Null),
        Value::Node(n) => n,
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "path step expects a node, got {}",
                other.runtime_type()
            )))
        }
    };

    let mut path = PathValue::start(start);
    let mut pending_rel = None;
    for (kind, variable) in steps {
        let value = lookup_var(variable, ctx)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        match (kind, value) {
            ("rel", Value::Rel(r)) => {
                if pending_rel.replace(r).is_some() {
                    return Err(ExecutionError::InvalidArgument(
                        "path has two adjacent relationships".into(),
                    ));
                }
            }
            ("rels", Value::List(rels)) => {
                for rel in rels {
                    let Value::Rel(rel) = rel else {
                        return Err(ExecutionError::TypeMismatch(
                            "path segment list must contain relationships".into(),
                        ));
                    };
                    let end_id = path.nodes().last().map(|n| n.id).unwrap_or(rel.start);
                    let far = rel.other_end(end_id);
                    let node = ctx
                        .exec
                        .graph
                        .node_by_id(far)
                        .ok_or(corvus_graph::GraphError::UnknownNode(far))?;
                    path.push(rel, node);
                }
            }
            ("node", Value::Node(n)) => {
                if let Some(rel) = pending_rel.take() {
                    path.push(rel, n);
                } else if path.nodes().last().map(|last| last.id) != Some(n.id) {
                    return Err(ExecutionError::InvalidArgument(
                        "path has two adjacent nodes".into(),
                    ));
                }
            }
            (_, other) => {
                return Err(ExecutionError::TypeMismatch(format!(
                    "unexpected {} in path step",
                    other.runtime_type()
                )))
            }
        }
    }
    if pending_rel.is_some() {
        return Err(ExecutionError::InvalidArgument(
            "path ends in a relationship".into(),
        ));
    }
    Ok(Value::Path(path))
}

fn lookup_var(name: &str, ctx: &ExpressionContext<'_>) -> Result<Value> {
    ctx.var(name)
        .cloned()
        .ok_or_else(|| ExecutionError::UnboundVariable(name.to_string()))
}

// =============================================================================
// Regex cache
// =============================================================================

static REGEX_CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();

/// Compiles a regex, caching by pattern so per-row matching never
/// recompiles.
pub fn cached_regex(pattern: &str) -> Result<Regex> {
    let cache = REGEX_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(re) = guard.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern).map_err(|e| {
        ExecutionError::InvalidArgument(format!("invalid regular expression '{}': {}", pattern, e))
    })?;
    guard.insert(pattern.to_string(), re.clone());
    Ok(re)
}

// =============================================================================
// Type inference
// =============================================================================

/// Infers the result type of an expression under a variable-type
/// environment. Deliberately shallow: anything not listed is `Any`.
pub fn type_of(expr: &Expression, env: &TypeEnv) -> corvus_core::CypherType {
    use corvus_core::CypherType;
    match expr {
        Expression::Literal(Literal::Bool(_)) => CypherType::Boolean,
        Expression::Literal(Literal::Int(_)) => CypherType::Integer,
        Expression::Literal(Literal::Float(_)) => CypherType::Float,
        Expression::Literal(Literal::String(_)) => CypherType::String,
        Expression::CountStar => CypherType::Integer,
        Expression::FunctionCall { name, args, .. } if name.namespace.is_empty() => {
            match name.name.as_str() {
                "collect" => CypherType::List(Box::new(
                    args.first().map(|a| type_of(a, env)).unwrap_or_default(),
                )),
                "id" => CypherType::Integer,
                _ => CypherType::Any,
            }
        }
        Expression::ContainerIndex { container, .. } => match type_of(container, env) {
            CypherType::List(elem) => *elem,
            _ => CypherType::Any,
        },
        Expression::Variable(name) => env.get(name).cloned().unwrap_or_default(),
        _ => CypherType::Any,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_ast::Expression as E;
    use corvus_core::CypherType;
    use corvus_graph::{GraphModel, InMemoryGraph};

    fn graph() -> InMemoryGraph {
        InMemoryGraph::builder()
            .add_labeled_node(0, "Person", [("name", "Alice"), ("city", "Oslo")])
            .build()
    }

    fn with_ctx<F: FnOnce(&ExpressionContext<'_>)>(graph: &InMemoryGraph, f: F) {
        let procs = ProcedureRegistry::standard();
        let exec = ExecutionContext::new(graph, &procs, Parameters::new());
        let ctx = ExpressionContext::new(&exec);
        f(&ctx);
    }

    #[test]
    fn test_null_propagation_in_arithmetic() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let expr = E::arith(ArithmeticOp::Add, E::null(), E::int(1));
            assert_eq!(eval(&expr, ctx).unwrap(), Value::Null);
        });
    }

    #[test]
    fn test_integer_arithmetic_saturates() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let expr = E::arith(ArithmeticOp::Add, E::int(i64::MAX), E::int(1));
            assert_eq!(eval(&expr, ctx).unwrap(), Value::Int(i64::MAX));
        });
    }

    #[test]
    fn test_add_concatenates_strings_and_lists() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let expr = E::arith(ArithmeticOp::Add, E::string("foo"), E::string("bar"));
            assert_eq!(eval(&expr, ctx).unwrap(), Value::Str("foobar".into()));

            let lists = E::arith(
                ArithmeticOp::Add,
                E::ListLiteral(vec![E::int(1)]),
                E::ListLiteral(vec![E::int(2)]),
            );
            assert_eq!(
                eval(&lists, ctx).unwrap(),
                Value::List(vec![Value::Int(1), Value::Int(2)])
            );
        });
    }

    #[test]
    fn test_add_rejects_mixed_types() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let expr = E::arith(ArithmeticOp::Add, E::var("n"), E::int(1));
            let ctx = ctx.with_var("n", Value::Node(g.node_by_id(0u64.into()).unwrap()));
            assert!(matches!(
                eval(&expr, &ctx),
                Err(ExecutionError::TypeMismatch(_))
            ));
        });
    }

    #[test]
    fn test_division() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let int_div = E::arith(ArithmeticOp::Divide, E::int(7), E::int(2));
            assert_eq!(eval(&int_div, ctx).unwrap(), Value::Int(3));

            let float_div = E::arith(ArithmeticOp::Divide, E::int(7), E::float(2.0));
            assert_eq!(eval(&float_div, ctx).unwrap(), Value::Float(3.5));

            let by_zero = E::arith(ArithmeticOp::Divide, E::int(1), E::int(0));
            assert!(matches!(
                eval(&by_zero, ctx),
                Err(ExecutionError::InvalidArgument(_))
            ));
        });
    }

    #[test]
    fn test_comparisons_are_three_valued() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let lt = E::compare(ComparisonOp::Lt, E::int(1), E::int(2));
            assert_eq!(eval(&lt, ctx).unwrap(), Value::Bool(true));

            let vs_null = E::compare(ComparisonOp::Lt, E::int(1), E::null());
            assert_eq!(eval(&vs_null, ctx).unwrap(), Value::Null);

            let mixed = E::compare(ComparisonOp::Gt, E::int(1), E::string("a"));
            assert_eq!(eval(&mixed, ctx).unwrap(), Value::Null);

            let eq_cross = E::compare(ComparisonOp::Eq, E::int(3), E::float(3.0));
            assert_eq!(eval(&eq_cross, ctx).unwrap(), Value::Bool(true));
        });
    }

    #[test]
    fn test_kleene_connectives() {
        let g = graph();
        with_ctx(&g, |ctx| {
            // false AND null = false
            let a = E::And(Box::new(E::bool(false)), Box::new(E::null()));
            assert_eq!(eval(&a, ctx).unwrap(), Value::Bool(false));
            // true AND null = null
            let b = E::And(Box::new(E::bool(true)), Box::new(E::null()));
            assert_eq!(eval(&b, ctx).unwrap(), Value::Null);
            // null OR true = true
            let c = E::Or(Box::new(E::null()), Box::new(E::bool(true)));
            assert_eq!(eval(&c, ctx).unwrap(), Value::Bool(true));
            // NOT null = null
            let d = E::Not(Box::new(E::null()));
            assert_eq!(eval(&d, ctx).unwrap(), Value::Null);
        });
    }

    #[test]
    fn test_string_predicates_null_operands_are_false() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let starts = |l: E, r: E| E::StringMatch {
                op: StringMatchOp::StartsWith,
                left: Box::new(l),
                right: Box::new(r),
            };
            assert_eq!(
                eval(&starts(E::null(), E::string("f")), ctx).unwrap(),
                Value::Bool(false)
            );
            assert_eq!(
                eval(&starts(E::string("foo"), E::null()), ctx).unwrap(),
                Value::Bool(false)
            );
            assert_eq!(
                eval(&starts(E::string("foo"), E::string("f")), ctx).unwrap(),
                Value::Bool(true)
            );

            let regex = E::StringMatch {
                op: StringMatchOp::Regex,
                left: Box::new(E::string("corvus-42")),
                right: Box::new(E::string(r"^corvus-\d+$")),
            };
            assert_eq!(eval(&regex, ctx).unwrap(), Value::Bool(true));
        });
    }

    #[test]
    fn test_in_with_null_elements() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let list = E::ListLiteral(vec![E::int(1), E::int(2), E::null()]);
            let hit = E::In {
                item: Box::new(E::int(2)),
                list: Box::new(list.clone()),
            };
            assert_eq!(eval(&hit, ctx).unwrap(), Value::Bool(true));

            let miss = E::In {
                item: Box::new(E::int(9)),
                list: Box::new(list),
            };
            assert_eq!(eval(&miss, ctx).unwrap(), Value::Null);

            let plain_miss = E::In {
                item: Box::new(E::int(9)),
                list: Box::new(E::ListLiteral(vec![E::int(1)])),
            };
            assert_eq!(eval(&plain_miss, ctx).unwrap(), Value::Bool(false));
        });
    }

    #[test]
    fn test_property_and_index_access() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let node = Value::Node(g.node_by_id(0u64.into()).unwrap());
            let ctx = ctx.with_var("n", node);

            let prop = E::property(E::var("n"), "name");
            assert_eq!(eval(&prop, &ctx).unwrap(), Value::Str("Alice".into()));

            let missing = E::property(E::var("n"), "age");
            assert_eq!(eval(&missing, &ctx).unwrap(), Value::Null);

            let indexed = E::ContainerIndex {
                container: Box::new(E::var("n")),
                index: Box::new(E::string("city")),
            };
            assert_eq!(eval(&indexed, &ctx).unwrap(), Value::Str("Oslo".into()));

            let list_idx = E::ContainerIndex {
                container: Box::new(E::ListLiteral(vec![E::int(10), E::int(20)])),
                index: Box::new(E::int(-1)),
            };
            assert_eq!(eval(&list_idx, &ctx).unwrap(), Value::Int(20));

            let out_of_range = E::ContainerIndex {
                container: Box::new(E::ListLiteral(vec![E::int(10)])),
                index: Box::new(E::int(5)),
            };
            assert_eq!(eval(&out_of_range, &ctx).unwrap(), Value::Null);
        });
    }

    #[test]
    fn test_temporal_components() {
        let g = graph();
        with_ctx(&g, |ctx| {
            let dt = DateTime::parse_from_rfc3339("2026-03-15T09:30:45.123456789+01:00").unwrap();
            let ctx = ctx.with_var("t", Value::DateTime(dt));

            let check = |key: &str, expected: Value, ctx: &ExpressionContext<'_>| {
                let expr = E::property(E::var("t"), key);
                assert_eq!(eval(&expr, ctx).unwrap(), expected, "component {}", key);
            };
            check("year", Value::Int(2026), &ctx);
            check("quarter", Value::Int(1), &ctx);
            check("month", Value::Int(3), &ctx);
            check("day", Value::Int(15), &ctx);
            check("dayOfWeek", Value::Int(7), &ctx);
            check("hour", Value::Int(9), &ctx);
            check("millisecond", Value::Int(1234), &ctx);
            check("microsecond", Value::Int(1234567), &ctx);
            check("offset", Value::Str("+01:00".into()), &ctx);

            let bad = E::property(E::var("t"), "fortnight");
            assert!(matches!(
                eval(&bad, &ctx),
                Err(ExecutionError::UnsupportedTemporalAccessor(_))
            ));
        });
    }

    #[test]
    fn test_case_expressions() {
        let g = graph();
        with_ctx(&g, |ctx| {
            // CASE 2 WHEN 1 THEN "one" WHEN 2 THEN "two" ELSE "many" END
            let with_subject = E::Case {
                subject: Some(Box::new(E::int(2))),
                alternatives: vec![
                    (E::int(1), E::string("one")),
                    (E::int(2), E::string("two")),
                ],
                default: Some(Box::new(E::string("many"))),
            };
            assert_eq!(eval(&with_subject, ctx).unwrap(), Value::Str("two".into()));

            // Null subject short-circuits to null.
            let null_subject = E::Case {
                subject: Some(Box::new(E::null())),
                alternatives: vec![(E::int(1), E::string("one"))],
                default: Some(Box::new(E::string("other"))),
            };
            assert_eq!(eval(&null_subject, ctx).unwrap(), Value::Null);

            // Generic form picks the first true predicate.
            let generic = E::Case {
                subject: None,
                alternatives: vec![
                    (E::bool(false), E::string("no")),
                    (
                        E::compare(ComparisonOp::Gt, E::int(2), E::int(1)),
                        E::string("yes"),
                    ),
                ],
                default: None,
            };
            assert_eq!(eval(&generic, ctx).unwrap(), Value::Str("yes".into()));
        });
    }

    #[test]
    fn test_coalesce_is_lazy() {
        let g = graph();
        with_ctx(&g, |ctx| {
            // The unbound variable in the tail must never be evaluated.
            let expr = E::call("coalesce", vec![E::string("hit"), E::var("nope")]);
            assert_eq!(eval(&expr, ctx).unwrap(), Value::Str("hit".into()));
        });
    }

    #[test]
    fn test_path_expression_with_relationship_list() {
        let g = InMemoryGraph::builder()
            .add_labeled_node(0, "Person", [("name", "a")])
            .add_labeled_node(1, "Person", [("name", "b")])
            .add_labeled_node(2, "Person", [("name", "c")])
            .add_rel(0, 1, "KNOWS")
            .add_rel(1, 2, "KNOWS")
            .build();
        with_ctx(&g, |ctx| {
            let rels: Vec<Value> = g
                .relationships(&[])
                .map(Value::Rel)
                .collect();
            let ctx = ctx
                .with_var("a", Value::Node(g.node_by_id(0u64.into()).unwrap()))
                .with_var("rs", Value::List(rels));

            let expr = E::PathExpression(PathStep::Node {
                variable: "a".into(),
                next: Box::new(PathStep::Relationships {
                    variable: "rs".into(),
                    next: Box::new(PathStep::Nil),
                }),
            });
            let Value::Path(path) = eval(&expr, &ctx).unwrap() else {
                panic!("expected a path");
            };
            assert_eq!(path.len(), 2);
            assert_eq!(path.nodes().last().unwrap().id, 2u64.into());
        });
    }

    #[test]
    fn test_count_star_outside_aggregation_fails() {
        let g = graph();
        with_ctx(&g, |ctx| {
            assert!(matches!(
                eval(&E::CountStar, ctx),
                Err(ExecutionError::Planning(_))
            ));
        });
    }

    #[test]
    fn test_unbound_variable_and_unknown_parameter() {
        let g = graph();
        with_ctx(&g, |ctx| {
            assert!(matches!(
                eval(&E::var("ghost"), ctx),
                Err(ExecutionError::UnboundVariable(_))
            ));
            assert!(matches!(
                eval(&E::Parameter("missing".into()), ctx),
                Err(ExecutionError::UnknownParameter(_))
            ));
        });
    }

    #[test]
    fn test_type_inference() {
        let env = TypeEnv::from([("n".to_string(), CypherType::Node)]);
        assert_eq!(type_of(&E::int(1), &env), CypherType::Integer);
        assert_eq!(type_of(&E::var("n"), &env), CypherType::Node);
        assert_eq!(type_of(&E::var("unknown"), &env), CypherType::Any);
        assert_eq!(type_of(&E::CountStar, &env), CypherType::Integer);
        assert_eq!(
            type_of(&E::call("collect", vec![E::int(1)]), &env),
            CypherType::List(Box::new(CypherType::Integer))
        );
        assert_eq!(
            type_of(&E::call("id", vec![E::var("n")]), &env),
            CypherType::Integer
        );
    }
}
