//! Procedure registry and standard library.
//!
//! Procedures are looked up by qualified name and arity. Each entry
//! declares whether it aggregates (and then receives its per-group inputs
//! as a single list argument) and whether a DISTINCT modifier is accepted.

use crate::cmp;
use crate::value::Value;
use crate::{ExecutionError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use corvus_ast::FunctionName;
use rand::Rng;
use std::collections::HashMap;

/// The host function behind a procedure.
pub type ProcedureFn = fn(&[Value]) -> Result<Value>;

/// A registered procedure.
#[derive(Clone)]
pub struct Procedure {
    name: FunctionName,
    min_args: usize,
    max_args: usize,
    aggregating: bool,
    distinct_allowed: bool,
    func: ProcedureFn,
}

impl Procedure {
    /// The qualified name.
    pub fn name(&self) -> &FunctionName {
        &self.name
    }

    /// True if this procedure folds a group of rows.
    pub fn is_aggregating(&self) -> bool {
        self.aggregating
    }

    /// True if a DISTINCT modifier is accepted.
    pub fn distinct_allowed(&self) -> bool {
        self.distinct_allowed
    }

    /// Invokes the procedure. Arity has been validated by the registry.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }
}

impl std::fmt::Debug for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("aggregating", &self.aggregating)
            .finish()
    }
}

/// The procedure lookup table.
#[derive(Debug, Clone, Default)]
pub struct ProcedureRegistry {
    procedures: HashMap<FunctionName, Procedure>,
}

impl ProcedureRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard library.
    pub fn standard() -> Self {
        let mut reg = Self::empty();

        // Aggregating
        reg.register("count", 1, 1, true, true, agg_count);
        reg.register("sum", 1, 1, true, true, agg_sum);
        reg.register("avg", 1, 1, true, true, agg_avg);
        reg.register("min", 1, 1, true, false, agg_min);
        reg.register("max", 1, 1, true, false, agg_max);
        reg.register("collect", 1, 1, true, true, agg_collect);

        // String
        reg.register("tolower", 1, 1, false, false, fn_to_lower);
        reg.register("toupper", 1, 1, false, false, fn_to_upper);
        reg.register("trim", 1, 1, false, false, fn_trim);
        reg.register("substring", 2, 3, false, false, fn_substring);
        reg.register("replace", 3, 3, false, false, fn_replace);
        reg.register("split", 2, 2, false, false, fn_split);

        // Numeric
        reg.register("abs", 1, 1, false, false, fn_abs);
        reg.register("ceil", 1, 1, false, false, fn_ceil);
        reg.register("floor", 1, 1, false, false, fn_floor);
        reg.register("round", 1, 1, false, false, fn_round);
        reg.register("sign", 1, 1, false, false, fn_sign);
        reg.register("rand", 0, 0, false, false, fn_rand);
        reg.register("sqrt", 1, 1, false, false, fn_sqrt);
        reg.register("exp", 1, 1, false, false, fn_exp);
        reg.register("log", 1, 1, false, false, fn_log);
        reg.register("log10", 1, 1, false, false, fn_log10);
        reg.register("sin", 1, 1, false, false, fn_sin);
        reg.register("cos", 1, 1, false, false, fn_cos);
        reg.register("tan", 1, 1, false, false, fn_tan);

        // Predicate
        reg.register("exists", 1, 1, false, false, fn_exists);
        reg.register("coalesce", 1, usize::MAX, false, false, fn_coalesce);

        // Scalar
        reg.register("tointeger", 1, 1, false, false, fn_to_integer);
        reg.register("tofloat", 1, 1, false, false, fn_to_float);
        reg.register("tostring", 1, 1, false, false, fn_to_string);
        reg.register("toboolean", 1, 1, false, false, fn_to_boolean);
        reg.register("id", 1, 1, false, false, fn_id);
        reg.register("labels", 1, 1, false, false, fn_labels);
        reg.register("type", 1, 1, false, false, fn_type);
        reg.register("size", 1, 1, false, false, fn_size);
        reg.register("head", 1, 1, false, false, fn_head);
        reg.register("last", 1, 1, false, false, fn_last);
        reg.register("reverse", 1, 1, false, false, fn_reverse);
        reg.register("range", 2, 3, false, false, fn_range);

        // Temporal
        reg.register("date", 0, 1, false, false, fn_date);
        reg.register("time", 0, 1, false, false, fn_time);
        reg.register("datetime", 0, 1, false, false, fn_datetime);
        reg.register("duration", 1, 1, false, false, fn_duration);

        reg
    }

    /// Registers a procedure in the default namespace.
    pub fn register(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: usize,
        aggregating: bool,
        distinct_allowed: bool,
        func: ProcedureFn,
    ) {
        let name = FunctionName::bare(name);
        self.procedures.insert(
            name.clone(),
            Procedure {
                name,
                min_args,
                max_args,
                aggregating,
                distinct_allowed,
                func,
            },
        );
    }

    /// Looks up a procedure by name and call-site arity.
    pub fn lookup(&self, name: &FunctionName, arity: usize) -> Result<&Procedure> {
        let proc = self
            .procedures
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownProcedure(name.to_string()))?;
        if arity < proc.min_args || arity > proc.max_args {
            let expected = if proc.min_args == proc.max_args {
                proc.min_args.to_string()
            } else if proc.max_args == usize::MAX {
                format!("{}+", proc.min_args)
            } else {
                format!("{}..{}", proc.min_args, proc.max_args)
            };
            return Err(ExecutionError::ProcedureArity {
                name: name.to_string(),
                expected,
                actual: arity,
            });
        }
        Ok(proc)
    }

    /// True if the name resolves to an aggregating procedure.
    pub fn is_aggregating(&self, name: &FunctionName) -> bool {
        self.procedures
            .get(name)
            .map(|p| p.aggregating)
            .unwrap_or(false)
    }
}

// =============================================================================
// Aggregating procedures
//
// Each receives its per-group inputs as a single list; nulls have not been
// filtered. Identities over the empty group: count 0, sum 0, collect [],
// the rest null.
// =============================================================================

fn group(args: &[Value]) -> Result<&[Value]> {
    match &args[0] {
        Value::List(items) => Ok(items),
        other => Err(ExecutionError::TypeMismatch(format!(
            "aggregate input must be a list, got {}",
            other.runtime_type()
        ))),
    }
}

fn agg_count(args: &[Value]) -> Result<Value> {
    let items = group(args)?;
    Ok(Value::Int(items.iter().filter(|v| !v.is_null()).count() as i64))
}

fn agg_sum(args: &[Value]) -> Result<Value> {
    let mut int_sum = 0i64;
    let mut float_sum = 0.0f64;
    let mut saw_float = false;
    for v in group(args)? {
        match v {
            Value::Int(i) => int_sum = int_sum.saturating_add(*i),
            Value::Float(f) => {
                saw_float = true;
                float_sum += f;
            }
            Value::Null => {}
            other => {
                return Err(ExecutionError::TypeMismatch(format!(
                    "sum() over non-numeric value of type {}",
                    other.runtime_type()
                )))
            }
        }
    }
    if saw_float {
        Ok(Value::Float(float_sum + int_sum as f64))
    } else {
        Ok(Value::Int(int_sum))
    }
}

fn agg_avg(args: &[Value]) -> Result<Value> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for v in group(args)? {
        match v {
            Value::Int(i) => {
                sum += *i as f64;
                count += 1;
            }
            Value::Float(f) => {
                sum += f;
                count += 1;
            }
            Value::Null => {}
            other => {
                return Err(ExecutionError::TypeMismatch(format!(
                    "avg() over non-numeric value of type {}",
                    other.runtime_type()
                )))
            }
        }
    }
    if count == 0 {
        Ok(Value::Null)
    } else {
        Ok(Value::Float(sum / count as f64))
    }
}

fn agg_min(args: &[Value]) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for v in group(args)?.iter().filter(|v| !v.is_null()) {
        best = Some(match best {
            None => v,
            Some(cur) => {
                if cmp::total_cmp(v, cur) == std::cmp::Ordering::Less {
                    v
                } else {
                    cur
                }
            }
        });
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn agg_max(args: &[Value]) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for v in group(args)?.iter().filter(|v| !v.is_null()) {
        best = Some(match best {
            None => v,
            Some(cur) => {
                if cmp::total_cmp(v, cur) == std::cmp::Ordering::Greater {
                    v
                } else {
                    cur
                }
            }
        });
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn agg_collect(args: &[Value]) -> Result<Value> {
    Ok(Value::List(
        group(args)?
            .iter()
            .filter(|v| !v.is_null())
            .cloned()
            .collect(),
    ))
}

// =============================================================================
// String functions
// =============================================================================

fn str_arg<'a>(args: &'a [Value], idx: usize) -> Result<Option<&'a str>> {
    match &args[idx] {
        Value::Str(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => Err(ExecutionError::TypeMismatch(format!(
            "expected a string argument, got {}",
            other.runtime_type()
        ))),
    }
}

fn fn_to_lower(args: &[Value]) -> Result<Value> {
    Ok(match str_arg(args, 0)? {
        Some(s) => Value::Str(s.to_lowercase()),
        None => Value::Null,
    })
}

fn fn_to_upper(args: &[Value]) -> Result<Value> {
    Ok(match str_arg(args, 0)? {
        Some(s) => Value::Str(s.to_uppercase()),
        None => Value::Null,
    })
}

fn fn_trim(args: &[Value]) -> Result<Value> {
    Ok(match str_arg(args, 0)? {
        Some(s) => Value::Str(s.trim().to_string()),
        None => Value::Null,
    })
}

fn fn_substring(args: &[Value]) -> Result<Value> {
    let Some(s) = str_arg(args, 0)? else {
        return Ok(Value::Null);
    };
    let start = match &args[1] {
        Value::Int(i) if *i >= 0 => *i as usize,
        Value::Int(i) => {
            return Err(ExecutionError::InvalidArgument(format!(
                "substring start must be non-negative, got {}",
                i
            )))
        }
        Value::Null => return Ok(Value::Null),
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "substring start must be an integer, got {}",
                other.runtime_type()
            )))
        }
    };
    let chars: Vec<char> = s.chars().collect();
    let taken: String = match args.get(2) {
        None => chars.iter().skip(start).collect(),
        Some(Value::Int(len)) if *len >= 0 => {
            chars.iter().skip(start).take(*len as usize).collect()
        }
        Some(Value::Int(len)) => {
            return Err(ExecutionError::InvalidArgument(format!(
                "substring length must be non-negative, got {}",
                len
            )))
        }
        Some(Value::Null) => return Ok(Value::Null),
        Some(other) => {
            return Err(ExecutionError::TypeMismatch(format!(
                "substring length must be an integer, got {}",
                other.runtime_type()
            )))
        }
    };
    Ok(Value::Str(taken))
}

fn fn_replace(args: &[Value]) -> Result<Value> {
    match (str_arg(args, 0)?, str_arg(args, 1)?, str_arg(args, 2)?) {
        (Some(s), Some(search), Some(replacement)) => {
            Ok(Value::Str(s.replace(search, replacement)))
        }
        _ => Ok(Value::Null),
    }
}

fn fn_split(args: &[Value]) -> Result<Value> {
    match (str_arg(args, 0)?, str_arg(args, 1)?) {
        (Some(s), Some(delim)) => Ok(Value::List(
            s.split(delim).map(|p| Value::Str(p.to_string())).collect(),
        )),
        _ => Ok(Value::Null),
    }
}

// =============================================================================
// Numeric functions
// =============================================================================

fn num_arg(args: &[Value], idx: usize) -> Result<Option<f64>> {
    match &args[idx] {
        Value::Int(i) => Ok(Some(*i as f64)),
        Value::Float(f) => Ok(Some(*f)),
        Value::Null => Ok(None),
        other => Err(ExecutionError::TypeMismatch(format!(
            "expected a numeric argument, got {}",
            other.runtime_type()
        ))),
    }
}

fn fn_abs(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.saturating_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Null => Ok(Value::Null),
        other => Err(ExecutionError::TypeMismatch(format!(
            "abs() expects a number, got {}",
            other.runtime_type()
        ))),
    }
}

fn fn_ceil(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.ceil())).unwrap_or(Value::Null))
}

fn fn_floor(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.floor())).unwrap_or(Value::Null))
}

fn fn_round(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.round())).unwrap_or(Value::Null))
}

fn fn_sign(args: &[Value]) -> Result<Value> {
    Ok(match num_arg(args, 0)? {
        Some(f) if f > 0.0 => Value::Int(1),
        Some(f) if f < 0.0 => Value::Int(-1),
        Some(_) => Value::Int(0),
        None => Value::Null,
    })
}

fn fn_rand(_args: &[Value]) -> Result<Value> {
    Ok(Value::Float(rand::thread_rng().gen::<f64>()))
}

fn fn_sqrt(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.sqrt())).unwrap_or(Value::Null))
}

fn fn_exp(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.exp())).unwrap_or(Value::Null))
}

fn fn_log(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.ln())).unwrap_or(Value::Null))
}

fn fn_log10(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.log10())).unwrap_or(Value::Null))
}

fn fn_sin(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.sin())).unwrap_or(Value::Null))
}

fn fn_cos(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.cos())).unwrap_or(Value::Null))
}

fn fn_tan(args: &[Value]) -> Result<Value> {
    Ok(num_arg(args, 0)?.map(|f| Value::Float(f.tan())).unwrap_or(Value::Null))
}

// =============================================================================
// Predicate functions
// =============================================================================

fn fn_exists(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(!args[0].is_null()))
}

fn fn_coalesce(args: &[Value]) -> Result<Value> {
    // The evaluator short-circuits coalesce before argument evaluation;
    // this strict fallback serves direct registry callers.
    Ok(args
        .iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

// =============================================================================
// Scalar functions
// =============================================================================

fn fn_to_integer(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) => Value::Int(*f as i64),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
        Value::Bool(b) => Value::Int(if *b { 1 } else { 0 }),
        _ => Value::Null,
    })
}

fn fn_to_float(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::Int(i) => Value::Float(*i as f64),
        Value::Float(f) => Value::Float(*f),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
        _ => Value::Null,
    })
}

fn fn_to_string(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::Null => Value::Null,
        Value::Str(s) => Value::Str(s.clone()),
        Value::Bool(b) => Value::Str(b.to_string()),
        Value::Int(i) => Value::Str(i.to_string()),
        Value::Float(f) => Value::Str(f.to_string()),
        Value::Date(d) => Value::Str(d.to_string()),
        Value::Time(t) => Value::Str(t.to_string()),
        Value::DateTime(dt) => Value::Str(dt.to_rfc3339()),
        _ => Value::Null,
    })
}

fn fn_to_boolean(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::Bool(b) => Value::Bool(*b),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    })
}

fn fn_id(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::Node(n) => Value::Int(n.id.as_u64() as i64),
        Value::Rel(r) => Value::Int(r.id.as_u64() as i64),
        Value::Null => Value::Null,
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "id() expects a node or relationship, got {}",
                other.runtime_type()
            )))
        }
    })
}

fn fn_labels(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::Node(n) => Value::List(
            n.labels
                .iter()
                .map(|l| Value::Str(l.as_str().to_string()))
                .collect(),
        ),
        Value::Null => Value::Null,
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "labels() expects a node, got {}",
                other.runtime_type()
            )))
        }
    })
}

fn fn_type(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::Rel(r) => r
            .rel_type
            .as_ref()
            .map(|t| Value::Str(t.as_str().to_string()))
            .unwrap_or(Value::Null),
        Value::Null => Value::Null,
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "type() expects a relationship, got {}",
                other.runtime_type()
            )))
        }
    })
}

fn fn_size(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::Str(s) => Value::Int(s.chars().count() as i64),
        Value::List(l) => Value::Int(l.len() as i64),
        Value::Map(m) => Value::Int(m.len() as i64),
        Value::Null => Value::Null,
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "size() expects a string, list or map, got {}",
                other.runtime_type()
            )))
        }
    })
}

fn fn_head(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::List(l) => l.first().cloned().unwrap_or(Value::Null),
        Value::Null => Value::Null,
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "head() expects a list, got {}",
                other.runtime_type()
            )))
        }
    })
}

fn fn_last(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::List(l) => l.last().cloned().unwrap_or(Value::Null),
        Value::Null => Value::Null,
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "last() expects a list, got {}",
                other.runtime_type()
            )))
        }
    })
}

fn fn_reverse(args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::List(l) => Value::List(l.iter().rev().cloned().collect()),
        Value::Str(s) => Value::Str(s.chars().rev().collect()),
        Value::Null => Value::Null,
        other => {
            return Err(ExecutionError::TypeMismatch(format!(
                "reverse() expects a list or string, got {}",
                other.runtime_type()
            )))
        }
    })
}

fn fn_range(args: &[Value]) -> Result<Value> {
    let (start, end) = match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => (*a, *b),
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
        _ => {
            return Err(ExecutionError::TypeMismatch(
                "range() expects integer bounds".into(),
            ))
        }
    };
    let step = match args.get(2) {
        None => 1,
        Some(Value::Int(s)) if *s != 0 => *s,
        Some(Value::Int(_)) => {
            return Err(ExecutionError::InvalidArgument(
                "range() step must not be zero".into(),
            ))
        }
        Some(Value::Null) => return Ok(Value::Null),
        Some(other) => {
            return Err(ExecutionError::TypeMismatch(format!(
                "range() step must be an integer, got {}",
                other.runtime_type()
            )))
        }
    };
    let mut out = Vec::new();
    let mut cur = start;
    while (step > 0 && cur <= end) || (step < 0 && cur >= end) {
        out.push(Value::Int(cur));
        cur = cur.saturating_add(step);
        if out.len() > 1_000_000 {
            return Err(ExecutionError::InvalidArgument(
                "range() result exceeds 1,000,000 elements".into(),
            ));
        }
    }
    Ok(Value::List(out))
}

// =============================================================================
// Temporal functions
// =============================================================================

fn fn_date(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::Date(Utc::now().date_naive())),
        Some(Value::Str(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| ExecutionError::InvalidArgument(format!("invalid date '{}': {}", s, e))),
        Some(Value::Date(d)) => Ok(Value::Date(*d)),
        Some(Value::Null) => Ok(Value::Null),
        Some(other) => Err(ExecutionError::TypeMismatch(format!(
            "date() expects a string, got {}",
            other.runtime_type()
        ))),
    }
}

fn fn_time(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::Time(Utc::now().time())),
        Some(Value::Str(s)) => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Value::Time)
            .map_err(|e| ExecutionError::InvalidArgument(format!("invalid time '{}': {}", s, e))),
        Some(Value::Time(t)) => Ok(Value::Time(*t)),
        Some(Value::Null) => Ok(Value::Null),
        Some(other) => Err(ExecutionError::TypeMismatch(format!(
            "time() expects a string, got {}",
            other.runtime_type()
        ))),
    }
}

fn fn_datetime(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::DateTime(Utc::now().fixed_offset())),
        Some(Value::Str(s)) => DateTime::parse_from_rfc3339(s).map(Value::DateTime).map_err(|e| {
            ExecutionError::InvalidArgument(format!("invalid datetime '{}': {}", s, e))
        }),
        Some(Value::DateTime(dt)) => Ok(Value::DateTime(*dt)),
        Some(Value::Null) => Ok(Value::Null),
        Some(other) => Err(ExecutionError::TypeMismatch(format!(
            "datetime() expects a string, got {}",
            other.runtime_type()
        ))),
    }
}

/// Parses the `P[nD][T[nH][nM][nS]]` subset of ISO-8601 durations.
fn parse_iso_duration(s: &str) -> Option<Duration> {
    let rest = s.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };
    let mut total = Duration::zero();
    let mut read = |part: &str, units: &[(char, i64)]| -> Option<()> {
        let mut num = String::new();
        for ch in part.chars() {
            if ch.is_ascii_digit() || ch == '-' {
                num.push(ch);
            } else {
                let n: i64 = num.parse().ok()?;
                let factor = units.iter().find(|(u, _)| *u == ch).map(|(_, f)| *f)?;
                total = total + Duration::seconds(n.checked_mul(factor)?);
                num.clear();
            }
        }
        if num.is_empty() {
            Some(())
        } else {
            None
        }
    };
    read(date_part, &[('D', 86_400)])?;
    read(time_part, &[('H', 3_600), ('M', 60), ('S', 1)])?;
    Some(total)
}

fn fn_duration(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Str(s) => parse_iso_duration(s).map(Value::Duration).ok_or_else(|| {
            ExecutionError::InvalidArgument(format!("invalid duration '{}'", s))
        }),
        Value::Duration(d) => Ok(Value::Duration(*d)),
        Value::Null => Ok(Value::Null),
        other => Err(ExecutionError::TypeMismatch(format!(
            "duration() expects a string, got {}",
            other.runtime_type()
        ))),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn std_lookup(name: &str, arity: usize) -> Procedure {
        ProcedureRegistry::standard()
            .lookup(&FunctionName::bare(name), arity)
            .unwrap()
            .clone()
    }

    #[test]
    fn test_lookup_unknown_and_arity() {
        let reg = ProcedureRegistry::standard();
        assert!(matches!(
            reg.lookup(&FunctionName::bare("frobnicate"), 1),
            Err(ExecutionError::UnknownProcedure(_))
        ));
        assert!(matches!(
            reg.lookup(&FunctionName::bare("toLower"), 2),
            Err(ExecutionError::ProcedureArity { .. })
        ));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(
            std_lookup("tolower", 1).call(&[Value::Str("HeLLo".into())]).unwrap(),
            Value::Str("hello".into())
        );
        assert_eq!(
            std_lookup("substring", 3)
                .call(&[Value::Str("hello".into()), Value::Int(1), Value::Int(3)])
                .unwrap(),
            Value::Str("ell".into())
        );
        assert_eq!(
            std_lookup("replace", 3)
                .call(&[
                    Value::Str("a-b-c".into()),
                    Value::Str("-".into()),
                    Value::Str("+".into())
                ])
                .unwrap(),
            Value::Str("a+b+c".into())
        );
        assert_eq!(std_lookup("trim", 1).call(&[Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn test_numeric_functions() {
        assert_eq!(
            std_lookup("abs", 1).call(&[Value::Int(-5)]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            std_lookup("sign", 1).call(&[Value::Float(-0.5)]).unwrap(),
            Value::Int(-1)
        );
        assert_eq!(
            std_lookup("floor", 1).call(&[Value::Float(1.7)]).unwrap(),
            Value::Float(1.0)
        );
        let r = std_lookup("rand", 0).call(&[]).unwrap();
        match r {
            Value::Float(f) => assert!((0.0..1.0).contains(&f)),
            other => panic!("rand() returned {:?}", other),
        }
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(
            std_lookup("tointeger", 1).call(&[Value::Str("42".into())]).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            std_lookup("tointeger", 1).call(&[Value::Str("nope".into())]).unwrap(),
            Value::Null
        );
        assert_eq!(
            std_lookup("tostring", 1).call(&[Value::Int(7)]).unwrap(),
            Value::Str("7".into())
        );
        assert_eq!(
            std_lookup("toboolean", 1).call(&[Value::Str("TRUE".into())]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_list_functions() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(std_lookup("head", 1).call(&[list.clone()]).unwrap(), Value::Int(1));
        assert_eq!(std_lookup("last", 1).call(&[list.clone()]).unwrap(), Value::Int(3));
        assert_eq!(std_lookup("size", 1).call(&[list]).unwrap(), Value::Int(3));
        assert_eq!(
            std_lookup("range", 3)
                .call(&[Value::Int(0), Value::Int(6), Value::Int(3)])
                .unwrap(),
            Value::List(vec![Value::Int(0), Value::Int(3), Value::Int(6)])
        );
    }

    #[test]
    fn test_aggregates_over_groups() {
        let vals = |items: Vec<Value>| vec![Value::List(items)];

        assert_eq!(
            agg_count(&vals(vec![Value::Int(1), Value::Null, Value::Int(2)])).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            agg_sum(&vals(vec![Value::Int(1), Value::Int(2)])).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            agg_sum(&vals(vec![Value::Int(1), Value::Float(0.5)])).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(agg_sum(&vals(vec![])).unwrap(), Value::Int(0));
        assert_eq!(agg_avg(&vals(vec![])).unwrap(), Value::Null);
        assert_eq!(
            agg_min(&vals(vec![Value::Int(3), Value::Int(1), Value::Null])).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            agg_collect(&vals(vec![Value::Int(1), Value::Null])).unwrap(),
            Value::List(vec![Value::Int(1)])
        );
    }

    #[test]
    fn test_temporal_constructors() {
        assert!(matches!(
            std_lookup("date", 1).call(&[Value::Str("2024-02-29".into())]).unwrap(),
            Value::Date(_)
        ));
        assert!(std_lookup("date", 1)
            .call(&[Value::Str("not-a-date".into())])
            .is_err());
        assert_eq!(
            std_lookup("duration", 1)
                .call(&[Value::Str("P1DT2H".into())])
                .unwrap(),
            Value::Duration(Duration::seconds(86_400 + 7_200))
        );
    }

    #[test]
    fn test_aggregating_flags() {
        let reg = ProcedureRegistry::standard();
        assert!(reg.is_aggregating(&FunctionName::bare("count")));
        assert!(reg.is_aggregating(&FunctionName::bare("collect")));
        assert!(!reg.is_aggregating(&FunctionName::bare("toLower")));
        assert!(std_lookup("count", 1).distinct_allowed());
        assert!(!std_lookup("min", 1).distinct_allowed());
    }
}
