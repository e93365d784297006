//! # Corvus Core
//!
//! Core types shared by every CorvusDB crate:
//! - [`NodeId`] and [`RelId`] - Type-safe identifiers
//! - [`PropertyValue`] - Schema-flexible property storage
//! - [`Label`] - Node labels and relationship types
//! - [`CypherType`] - The runtime type lattice used for schema inference
//! - [`Direction`] - Traversal direction for relationship patterns

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers (Newtypes for type safety)
// =============================================================================

/// A unique identifier for a node in the graph.
///
/// Uses a newtype pattern to prevent mixing up node IDs with other integer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Creates a new NodeId from a u64.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<u64> for NodeId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A unique identifier for a relationship in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RelId(pub u64);

impl RelId {
    /// Creates a new RelId from a u64.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl From<u64> for RelId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// =============================================================================
// Labels
// =============================================================================

/// A label for nodes or a type for relationships (e.g., `:Person`, `:KNOWS`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(String);

impl Label {
    /// Creates a new label.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the label as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Direction
// =============================================================================

/// Direction of a relationship traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Outgoing: `->`
    Outgoing,
    /// Incoming: `<-`
    Incoming,
    /// Undirected/Both: `--`
    Both,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outgoing => write!(f, "->"),
            Direction::Incoming => write!(f, "<-"),
            Direction::Both => write!(f, "--"),
        }
    }
}

// =============================================================================
// Property Values
// =============================================================================

/// A property value that can be stored on nodes or relationships.
///
/// This is the host-side storage representation; the executor lifts it into
/// its runtime `Value` sum via `wrap` and lowers it back via `unwrap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum PropertyValue {
    /// Null/missing value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Homogeneous or mixed list
    List(Vec<PropertyValue>),
    /// Calendar date
    Date(NaiveDate),
    /// Wall-clock time
    Time(NaiveTime),
    /// Zoned timestamp
    DateTime(DateTime<FixedOffset>),
}

impl PropertyValue {
    /// Returns true if the value is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Attempts to get the value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the value as an i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "NULL"),
            PropertyValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            PropertyValue::Date(d) => write!(f, "{}", d),
            PropertyValue::Time(t) => write!(f, "{}", t),
            PropertyValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

// =============================================================================
// Type Lattice
// =============================================================================

/// The runtime type lattice used for schema inference.
///
/// `Any` is the top element; `Number` covers both `Integer` and `Float`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CypherType {
    /// Top of the lattice; every value inhabits it
    #[default]
    Any,
    /// Boolean
    Boolean,
    /// 64-bit integer
    Integer,
    /// 64-bit float
    Float,
    /// Integer or Float
    Number,
    /// UTF-8 string
    String,
    /// List with an element type
    List(Box<CypherType>),
    /// Key-value map
    Map,
    /// Graph node
    Node,
    /// Graph relationship
    Relationship,
    /// Alternating node/relationship path
    Path,
    /// Calendar date
    Date,
    /// Wall-clock time
    Time,
    /// Zoned timestamp
    DateTime,
    /// Calendar-aware span
    Duration,
}

impl CypherType {
    /// Returns true if a value of type `other` is acceptable where `self` is
    /// expected (reflexive, `Any` accepts everything, `Number` accepts both
    /// numeric types).
    pub fn accepts(&self, other: &CypherType) -> bool {
        match (self, other) {
            (CypherType::Any, _) => true,
            (CypherType::Number, CypherType::Integer | CypherType::Float | CypherType::Number) => {
                true
            }
            (CypherType::List(a), CypherType::List(b)) => a.accepts(b),
            (a, b) => a == b,
        }
    }

    /// The least upper bound of two types.
    pub fn join(&self, other: &CypherType) -> CypherType {
        if self == other {
            return self.clone();
        }
        match (self, other) {
            (CypherType::Integer | CypherType::Float | CypherType::Number, CypherType::Integer)
            | (CypherType::Integer | CypherType::Float | CypherType::Number, CypherType::Float)
            | (CypherType::Integer | CypherType::Float, CypherType::Number) => CypherType::Number,
            (CypherType::List(a), CypherType::List(b)) => {
                CypherType::List(Box::new(a.join(b)))
            }
            _ => CypherType::Any,
        }
    }
}

impl fmt::Display for CypherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CypherType::Any => write!(f, "ANY"),
            CypherType::Boolean => write!(f, "BOOLEAN"),
            CypherType::Integer => write!(f, "INTEGER"),
            CypherType::Float => write!(f, "FLOAT"),
            CypherType::Number => write!(f, "NUMBER"),
            CypherType::String => write!(f, "STRING"),
            CypherType::List(inner) => write!(f, "LIST<{}>", inner),
            CypherType::Map => write!(f, "MAP"),
            CypherType::Node => write!(f, "NODE"),
            CypherType::Relationship => write!(f, "RELATIONSHIP"),
            CypherType::Path => write!(f, "PATH"),
            CypherType::Date => write!(f, "DATE"),
            CypherType::Time => write!(f, "TIME"),
            CypherType::DateTime => write!(f, "DATETIME"),
            CypherType::Duration => write!(f, "DURATION"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_roundtrip() {
        let id = NodeId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(format!("{}", id), "n42");
        assert_eq!(NodeId::from(42u64), id);
    }

    #[test]
    fn test_label_display() {
        assert_eq!(format!("{}", Label::new("Person")), ":Person");
        assert_eq!(Label::from("KNOWS").as_str(), "KNOWS");
    }

    #[test]
    fn test_property_value_conversions() {
        assert_eq!(PropertyValue::from(3i64).as_int(), Some(3));
        assert_eq!(PropertyValue::from(3i64).as_float(), Some(3.0));
        assert_eq!(PropertyValue::from("x").as_str(), Some("x"));
        assert!(PropertyValue::Null.is_null());
        assert_eq!(PropertyValue::from(true).as_bool(), Some(true));
    }

    #[test]
    fn test_type_lattice_accepts() {
        assert!(CypherType::Any.accepts(&CypherType::Node));
        assert!(CypherType::Number.accepts(&CypherType::Integer));
        assert!(CypherType::Number.accepts(&CypherType::Float));
        assert!(!CypherType::Integer.accepts(&CypherType::Float));
        assert!(CypherType::List(Box::new(CypherType::Any))
            .accepts(&CypherType::List(Box::new(CypherType::String))));
    }

    #[test]
    fn test_type_lattice_join() {
        assert_eq!(
            CypherType::Integer.join(&CypherType::Float),
            CypherType::Number
        );
        assert_eq!(CypherType::String.join(&CypherType::String), CypherType::String);
        assert_eq!(CypherType::Node.join(&CypherType::String), CypherType::Any);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(
            format!("{}", CypherType::List(Box::new(CypherType::Integer))),
            "LIST<INTEGER>"
        );
    }
}
