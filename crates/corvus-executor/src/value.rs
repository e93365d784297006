//! The runtime value model.
//!
//! A closed sum over every Cypher runtime type. Values are immutable once
//! constructed; nodes and relationships are carried as full records so
//! property access never has to reach back into the graph.

use crate::{ExecutionError, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use corvus_core::{CypherType, PropertyValue};
use corvus_graph::{NodeRecord, RelRecord};
use std::collections::BTreeMap;
use std::fmt;

/// A value in a query result or an intermediate row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absent value; propagates through most operators
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// List of values
    List(Vec<Value>),
    /// Ordered map of string keys to values
    Map(BTreeMap<String, Value>),
    /// A graph node with its labels and properties
    Node(NodeRecord),
    /// A graph relationship with its endpoints and properties
    Rel(RelRecord),
    /// An alternating node/relationship path
    Path(PathValue),
    /// Calendar date
    Date(NaiveDate),
    /// Wall-clock time
    Time(NaiveTime),
    /// Zoned timestamp
    DateTime(DateTime<FixedOffset>),
    /// Calendar-unaware span
    Duration(Duration),
}

impl Value {
    /// Returns true if the value is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true only for `Bool(true)`; `Null` and everything else are
    /// not true. This is the boolean context used by filters.
    #[inline]
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Attempts to view the value as a node record.
    pub fn as_node(&self) -> Option<&NodeRecord> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Attempts to view the value as a relationship record.
    pub fn as_rel(&self) -> Option<&RelRecord> {
        match self {
            Value::Rel(r) => Some(r),
            _ => None,
        }
    }

    /// Attempts to get the value as an i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The runtime type of this value in the lattice.
    pub fn runtime_type(&self) -> CypherType {
        match self {
            Value::Null => CypherType::Any,
            Value::Bool(_) => CypherType::Boolean,
            Value::Int(_) => CypherType::Integer,
            Value::Float(_) => CypherType::Float,
            Value::Str(_) => CypherType::String,
            Value::List(items) => {
                let elem = items
                    .iter()
                    .map(Value::runtime_type)
                    .reduce(|a, b| a.join(&b))
                    .unwrap_or(CypherType::Any);
                CypherType::List(Box::new(elem))
            }
            Value::Map(_) => CypherType::Map,
            Value::Node(_) => CypherType::Node,
            Value::Rel(_) => CypherType::Relationship,
            Value::Path(_) => CypherType::Path,
            Value::Date(_) => CypherType::Date,
            Value::Time(_) => CypherType::Time,
            Value::DateTime(_) => CypherType::DateTime,
            Value::Duration(_) => CypherType::Duration,
        }
    }

    /// Lifts a host property value into a runtime value.
    pub fn wrap(pv: &PropertyValue) -> Value {
        match pv {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Int(i) => Value::Int(*i),
            PropertyValue::Float(f) => Value::Float(*f),
            PropertyValue::String(s) => Value::Str(s.clone()),
            PropertyValue::List(items) => Value::List(items.iter().map(Value::wrap).collect()),
            PropertyValue::Date(d) => Value::Date(*d),
            PropertyValue::Time(t) => Value::Time(*t),
            PropertyValue::DateTime(dt) => Value::DateTime(*dt),
        }
    }

    /// Lowers a runtime value back into a storable property value.
    ///
    /// Entities, paths, maps and durations are not storable as properties.
    pub fn unwrap(&self) -> Result<PropertyValue> {
        match self {
            Value::Null => Ok(PropertyValue::Null),
            Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            Value::Int(i) => Ok(PropertyValue::Int(*i)),
            Value::Float(f) => Ok(PropertyValue::Float(*f)),
            Value::Str(s) => Ok(PropertyValue::String(s.clone())),
            Value::List(items) => Ok(PropertyValue::List(
                items
                    .iter()
                    .map(Value::unwrap)
                    .collect::<Result<Vec<_>>>()?,
            )),
            Value::Date(d) => Ok(PropertyValue::Date(*d)),
            Value::Time(t) => Ok(PropertyValue::Time(*t)),
            Value::DateTime(dt) => Ok(PropertyValue::DateTime(*dt)),
            other => Err(ExecutionError::TypeMismatch(format!(
                "{} values cannot be stored as properties",
                other.runtime_type()
            ))),
        }
    }

    /// A hashable key identifying this value up to value-equality, used for
    /// DISTINCT and grouping. Integers and whole floats share a key so that
    /// `3` and `3.0` land in the same bucket.
    pub fn group_key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    ValueKey::Int(*f as i64)
                } else {
                    ValueKey::FloatBits(f.to_bits())
                }
            }
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::List(items) => ValueKey::List(items.iter().map(Value::group_key).collect()),
            Value::Map(m) => ValueKey::Map(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.group_key()))
                    .collect(),
            ),
            Value::Node(n) => ValueKey::Node(n.id.as_u64()),
            Value::Rel(r) => ValueKey::Rel(r.id.as_u64()),
            Value::Path(p) => ValueKey::List(
                p.iter()
                    .map(|v| v.group_key())
                    .collect(),
            ),
            Value::Date(d) => ValueKey::Str(format!("date:{}", d)),
            Value::Time(t) => ValueKey::Str(format!("time:{}", t)),
            Value::DateTime(dt) => ValueKey::Str(format!("datetime:{}", dt.to_rfc3339())),
            Value::Duration(d) => ValueKey::Str(format!("duration:{}", d)),
        }
    }

    /// Converts the value to a JSON representation for result serialization.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
            Value::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Node(n) => serde_json::json!({
                "type": "node",
                "id": n.id.as_u64(),
                "labels": n.labels.iter().map(|l| l.as_str()).collect::<Vec<_>>(),
                "properties": n.properties.iter()
                    .map(|(k, v)| (k.clone(), Value::wrap(v).to_json()))
                    .collect::<serde_json::Map<_, _>>(),
            }),
            Value::Rel(r) => serde_json::json!({
                "type": "relationship",
                "id": r.id.as_u64(),
                "start": r.start.as_u64(),
                "end": r.end.as_u64(),
                "relType": r.rel_type.as_ref().map(|t| t.as_str()),
                "properties": r.properties.iter()
                    .map(|(k, v)| (k.clone(), Value::wrap(v).to_json()))
                    .collect::<serde_json::Map<_, _>>(),
            }),
            Value::Path(p) => {
                serde_json::Value::Array(p.iter().map(|v| v.to_json()).collect())
            }
            Value::Date(d) => serde_json::json!({ "type": "date", "value": d.to_string() }),
            Value::Time(t) => serde_json::json!({ "type": "time", "value": t.to_string() }),
            Value::DateTime(dt) => {
                serde_json::json!({ "type": "datetime", "value": dt.to_rfc3339() })
            }
            Value::Duration(d) => {
                serde_json::json!({ "type": "duration", "seconds": d.num_seconds() })
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Node(n) => {
                write!(f, "({}", n.id)?;
                for label in &n.labels {
                    write!(f, "{}", label)?;
                }
                write!(f, ")")
            }
            Value::Rel(r) => {
                write!(f, "[{}", r.id)?;
                if let Some(ref t) = r.rel_type {
                    write!(f, "{}", t)?;
                }
                write!(f, "]")
            }
            Value::Path(p) => {
                for (i, v) in p.iter().enumerate() {
                    if i > 0 {
                        write!(f, "-")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{}", d),
        }
    }
}

impl From<NodeRecord> for Value {
    fn from(n: NodeRecord) -> Self {
        Value::Node(n)
    }
}

impl From<RelRecord> for Value {
    fn from(r: RelRecord) -> Self {
        Value::Rel(r)
    }
}

/// A hashable stand-in for a value, normalized so that values equal under
/// value-equality produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    FloatBits(u64),
    Str(String),
    List(Vec<ValueKey>),
    Map(Vec<(String, ValueKey)>),
    Node(u64),
    Rel(u64),
}

// =============================================================================
// Paths
// =============================================================================

/// An alternating node/relationship sequence, starting and ending with a
/// node.
#[derive(Debug, Clone, PartialEq)]
pub struct PathValue {
    nodes: Vec<NodeRecord>,
    rels: Vec<RelRecord>,
}

impl PathValue {
    /// A path of a single node.
    pub fn start(node: NodeRecord) -> Self {
        Self {
            nodes: vec![node],
            rels: Vec::new(),
        }
    }

    /// Extends the path with one hop.
    pub fn push(&mut self, rel: RelRecord, node: NodeRecord) {
        self.rels.push(rel);
        self.nodes.push(node);
    }

    /// Number of relationships in the path.
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// True for a single-node path.
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// The nodes in order.
    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    /// The relationships in order.
    pub fn rels(&self) -> &[RelRecord] {
        &self.rels
    }

    /// The alternating node, relationship, node, ... sequence as values.
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        let mut out = Vec::with_capacity(self.nodes.len() + self.rels.len());
        for (i, node) in self.nodes.iter().enumerate() {
            out.push(Value::Node(node.clone()));
            if let Some(rel) = self.rels.get(i) {
                out.push(Value::Rel(rel.clone()));
            }
        }
        out.into_iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
