//! Value comparison.
//!
//! Centralized comparison functions used for WHERE predicates, ORDER BY,
//! DISTINCT and MIN/MAX. Comparisons are three-valued: `None` stands for
//! the unknown result that surfaces as `Null`.

use crate::value::Value;
use std::cmp::Ordering;

// =============================================================================
// Equality (three-valued)
// =============================================================================

/// Value equality.
///
/// `None` when either side is null (or the result is unknowable, as for
/// lists containing nulls). Numeric cross-comparisons compare by value, so
/// `Int(3)` equals `Float(3.0)`. Nodes and relationships compare by id.
/// Values of different families are definitely not equal.
pub fn eq_values(left: &Value, right: &Value) -> Option<bool> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,

        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (Value::Int(a), Value::Int(b)) => Some(a == b),
        (Value::Float(a), Value::Float(b)) => Some(a == b),
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
            Some(*a as f64 == *b)
        }
        (Value::Str(a), Value::Str(b)) => Some(a == b),

        (Value::List(a), Value::List(b)) => {
            if a.len() != b.len() {
                return Some(false);
            }
            let mut unknown = false;
            for (x, y) in a.iter().zip(b.iter()) {
                match eq_values(x, y) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown {
                None
            } else {
                Some(true)
            }
        }
        (Value::Map(a), Value::Map(b)) => {
            if a.len() != b.len() || !a.keys().eq(b.keys()) {
                return Some(false);
            }
            let mut unknown = false;
            for (x, y) in a.values().zip(b.values()) {
                match eq_values(x, y) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown {
                None
            } else {
                Some(true)
            }
        }

        (Value::Node(a), Value::Node(b)) => Some(a.id == b.id),
        (Value::Rel(a), Value::Rel(b)) => Some(a.id == b.id),
        (Value::Path(a), Value::Path(b)) => Some(
            a.nodes().iter().map(|n| n.id).eq(b.nodes().iter().map(|n| n.id))
                && a.rels().iter().map(|r| r.id).eq(b.rels().iter().map(|r| r.id)),
        ),

        (Value::Date(a), Value::Date(b)) => Some(a == b),
        (Value::Time(a), Value::Time(b)) => Some(a == b),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a == b),
        (Value::Duration(a), Value::Duration(b)) => Some(a == b),

        _ => Some(false),
    }
}

// =============================================================================
// Ordering (within comparable families)
// =============================================================================

/// Family-restricted ordering.
///
/// Defined for numbers against numbers, strings against strings, booleans
/// against booleans and temporals against matching temporals. Anything
/// else, including any null operand, is unknowable and yields `None`.
pub fn cmp_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Rank used to totalize the sort order across families. Nulls rank last
/// so that ascending order puts them at the end and descending (the
/// reverse) puts them first.
fn family_rank(value: &Value) -> u8 {
    match value {
        Value::Map(_) => 0,
        Value::Node(_) => 1,
        Value::Rel(_) => 2,
        Value::List(_) => 3,
        Value::Path(_) => 4,
        Value::Str(_) => 5,
        Value::Bool(_) => 6,
        Value::Int(_) | Value::Float(_) => 7,
        Value::Date(_) => 8,
        Value::Time(_) => 9,
        Value::DateTime(_) => 10,
        Value::Duration(_) => 11,
        Value::Null => 12,
    }
}

/// Total order used by ORDER BY.
///
/// Within a family it agrees with [`cmp_values`]; across families it falls
/// back to a fixed family rank, and `Null` is the greatest value. Sorting
/// ascending therefore places nulls last; a descending sort (the reverse)
/// places them first.
pub fn total_cmp(left: &Value, right: &Value) -> Ordering {
    if let Some(ord) = cmp_values(left, right) {
        return ord;
    }
    let rank = family_rank(left).cmp(&family_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }
    // Same family but incomparable (entities, lists, NaN). Fall back to a
    // deterministic order on the group key representation.
    format!("{:?}", left.group_key()).cmp(&format!("{:?}", right.group_key()))
}

// =============================================================================
// Tests
// =============================================================================
