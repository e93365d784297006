//! Abstract Syntax Tree for the Cypher dialect CorvusDB executes.
//!
//! A query is a pipeline of clauses; expressions form a closed enum with
//! exhaustive matching in the evaluator.

use corvus_core::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Query (Root)
// =============================================================================

/// A complete query: a sequence of clauses.
///
/// ```text
/// MATCH (a:Person)
/// WITH a.name AS name
/// RETURN name
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Query {
    /// The sequence of clauses
    pub clauses: Vec<Clause>,
}

impl Query {
    /// Creates a query from clauses.
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }
}

/// A top-level statement: a single query, or queries combined with UNION.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// A single query pipeline
    Query(Query),
    /// UNION / UNION ALL of two statements with matching return columns
    Union {
        left: Box<Statement>,
        right: Box<Statement>,
        /// True for UNION ALL (keep duplicates)
        all: bool,
    },
}

impl Statement {
    /// Wraps a query as a statement.
    pub fn query(query: Query) -> Self {
        Statement::Query(query)
    }
}

impl From<Query> for Statement {
    fn from(query: Query) -> Self {
        Statement::Query(query)
    }
}

/// A clause in a query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    /// MATCH clause (with optional WHERE)
    Match(MatchClause),
    /// OPTIONAL MATCH clause
    OptionalMatch(MatchClause),
    /// CREATE clause
    Create(CreateClause),
    /// MERGE clause
    Merge(MergeClause),
    /// SET clause
    Set(SetClause),
    /// DELETE clause
    Delete(DeleteClause),
    /// WITH clause (projection boundary + filtering + sorting + paging)
    With(WithClause),
    /// UNWIND clause (list expansion)
    Unwind(UnwindClause),
    /// RETURN clause (projection + sorting + paging)
    Return(ReturnClause),
}

// =============================================================================
// MATCH / CREATE / MERGE patterns
// =============================================================================

/// The MATCH clause containing graph patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchClause {
    /// One or more patterns to match
    pub patterns: Vec<Pattern>,
    /// Optional WHERE predicate
    pub where_clause: Option<Expression>,
}

/// CREATE clause: patterns to instantiate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClause {
    /// Patterns to create
    pub patterns: Vec<Pattern>,
}

/// MERGE clause: match the pattern, create it when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeClause {
    /// Pattern to match or create
    pub pattern: Pattern,
}

/// SET clause: property assignments on bound entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetClause {
    /// Assignments, applied left to right
    pub items: Vec<SetItem>,
}

/// A single `variable.key = expr` assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetItem {
    /// The bound entity variable
    pub variable: String,
    /// The property key
    pub key: String,
    /// The value expression
    pub value: Expression,
}

/// DELETE clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteClause {
    /// Whether relationships are removed along with their nodes
    pub detach: bool,
    /// Variables naming the entities to delete
    pub items: Vec<String>,
}

/// A graph pattern: a start node and a chain of (relationship, node) hops.
///
/// ```text
/// p = (a:Person)-[:KNOWS]->(b:Person)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Optional identifier binding the whole path
    pub variable: Option<String>,
    /// The starting node
    pub start: NodePattern,
    /// Chain of (relationship, node) pairs
    pub chain: Vec<(RelPattern, NodePattern)>,
}

impl Pattern {
    /// Creates a pattern of a single node.
    pub fn single(node: NodePattern) -> Self {
        Self {
            variable: None,
            start: node,
            chain: Vec::new(),
        }
    }

    /// Returns all node patterns in this pattern.
    pub fn nodes(&self) -> impl Iterator<Item = &NodePattern> {
        std::iter::once(&self.start).chain(self.chain.iter().map(|(_, n)| n))
    }
}

/// A node pattern: `(n:Label {key: expr})`, `(n)`, `(:Label)` or `()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodePattern {
    /// Optional variable binding
    pub variable: Option<String>,
    /// Labels the node must carry (all of them)
    pub labels: Vec<String>,
    /// Inline property filters
    pub properties: Vec<(String, Expression)>,
}

impl NodePattern {
    /// Creates an anonymous node pattern `()`.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates a node pattern with just a variable.
    pub fn var(name: impl Into<String>) -> Self {
        Self {
            variable: Some(name.into()),
            ..Self::default()
        }
    }

    /// Creates a node pattern with a variable and one label.
    pub fn labeled(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            variable: Some(name.into()),
            labels: vec![label.into()],
            properties: Vec::new(),
        }
    }

    /// Adds an inline property filter.
    pub fn with_property(mut self, key: impl Into<String>, value: Expression) -> Self {
        self.properties.push((key.into(), value));
        self
    }
}

/// A relationship pattern: `-[r:KNOWS]->`, `<-[:REL]-` or `--`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelPattern {
    /// Optional variable binding
    pub variable: Option<String>,
    /// Allowed relationship types (any type when empty)
    pub types: Vec<String>,
    /// Direction of the relationship
    pub direction: Direction,
    /// Inline property filters
    pub properties: Vec<(String, Expression)>,
}

impl RelPattern {
    /// Creates an anonymous outgoing relationship.
    pub fn outgoing() -> Self {
        Self {
            variable: None,
            types: Vec::new(),
            direction: Direction::Outgoing,
            properties: Vec::new(),
        }
    }

    /// Creates an outgoing relationship with one type.
    pub fn outgoing_typed(rel_type: impl Into<String>) -> Self {
        Self {
            types: vec![rel_type.into()],
            ..Self::outgoing()
        }
    }

    /// Binds the relationship to a variable.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.variable = Some(name.into());
        self
    }

    /// Reverses the direction to incoming.
    pub fn incoming(mut self) -> Self {
        self.direction = Direction::Incoming;
        self
    }

    /// Makes the relationship undirected.
    pub fn undirected(mut self) -> Self {
        self.direction = Direction::Both;
        self
    }
}

// =============================================================================
// WITH / UNWIND / RETURN
// =============================================================================

/// The WITH clause: a projection boundary.
///
/// Variables not named in `items` are hidden from downstream clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithClause {
    /// Items to carry forward
    pub items: Vec<ReturnItem>,
    /// Whether DISTINCT was specified
    pub distinct: bool,
    /// Optional ORDER BY keys
    pub order_by: Option<Vec<SortItem>>,
    /// Optional SKIP
    pub skip: Option<i64>,
    /// Optional LIMIT
    pub limit: Option<i64>,
    /// Optional WHERE filter applied after projection
    pub where_clause: Option<Expression>,
}

/// The UNWIND clause.
///
/// ```text
/// UNWIND [1, 2, 3] AS x
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnwindClause {
    /// The expression yielding a list
    pub expression: Expression,
    /// The variable each element is bound to
    pub alias: String,
}

/// The RETURN clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnClause {
    /// Items to return
    pub items: Vec<ReturnItem>,
    /// Whether DISTINCT was specified
    pub distinct: bool,
    /// Optional ORDER BY keys
    pub order_by: Option<Vec<SortItem>>,
    /// Optional SKIP
    pub skip: Option<i64>,
    /// Optional LIMIT
    pub limit: Option<i64>,
}

impl ReturnClause {
    /// A plain `RETURN items` with no modifiers.
    pub fn items(items: Vec<ReturnItem>) -> Self {
        Self {
            items,
            distinct: false,
            order_by: None,
            skip: None,
            limit: None,
        }
    }
}

/// A single projection item: `expression [AS alias]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    /// The expression to project
    pub expression: Expression,
    /// Optional alias (AS name)
    pub alias: Option<String>,
}

impl ReturnItem {
    /// Projects a variable under its own name.
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            expression: Expression::Variable(name.into()),
            alias: None,
        }
    }

    /// Projects a property access, named `variable.key`.
    pub fn property(variable: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            expression: Expression::property(Expression::Variable(variable.into()), key),
            alias: None,
        }
    }

    /// Projects an expression under an alias.
    pub fn aliased(expression: Expression, alias: impl Into<String>) -> Self {
        Self {
            expression,
            alias: Some(alias.into()),
        }
    }

    /// The output column name for this item.
    pub fn output_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => format!("{}", self.expression),
        }
    }
}

/// An ORDER BY key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortItem {
    /// The expression to sort by
    pub expression: Expression,
    /// True for DESC
    pub descending: bool,
}

impl SortItem {
    /// Ascending sort on an expression.
    pub fn asc(expression: Expression) -> Self {
        Self {
            expression,
            descending: false,
        }
    }

    /// Descending sort on an expression.
    pub fn desc(expression: Expression) -> Self {
        Self {
            expression,
            descending: true,
        }
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// An expression that the evaluator can reduce to a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Variable reference
    Variable(String),
    /// Parameter: `$name`
    Parameter(String),
    /// Property access: `subject.key`
    Property {
        subject: Box<Expression>,
        key: String,
    },
    /// Container indexing: `container[index]`
    ContainerIndex {
        container: Box<Expression>,
        index: Box<Expression>,
    },
    /// Binary arithmetic
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Binary comparison, three-valued
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Logical AND (Kleene)
    And(Box<Expression>, Box<Expression>),
    /// Logical OR (Kleene)
    Or(Box<Expression>, Box<Expression>),
    /// Logical NOT (Kleene)
    Not(Box<Expression>),
    /// N-ary AND
    Ands(Vec<Expression>),
    /// N-ary OR
    Ors(Vec<Expression>),
    /// IS NULL (total, never null)
    IsNull(Box<Expression>),
    /// IS NOT NULL (total, never null)
    IsNotNull(Box<Expression>),
    /// String predicate: STARTS WITH / ENDS WITH / CONTAINS / `=~`
    StringMatch {
        op: StringMatchOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// List membership: `item IN list`
    In {
        item: Box<Expression>,
        list: Box<Expression>,
    },
    /// Label check: `n:Label1:Label2`
    HasLabels {
        subject: Box<Expression>,
        labels: Vec<String>,
    },
    /// CASE expression, with or without a subject
    Case {
        subject: Option<Box<Expression>>,
        alternatives: Vec<(Expression, Expression)>,
        default: Option<Box<Expression>>,
    },
    /// Function or procedure invocation
    FunctionCall {
        name: FunctionName,
        args: Vec<Expression>,
        distinct: bool,
    },
    /// COUNT(*)
    CountStar,
    /// List literal: `[e1, e2, ...]`
    ListLiteral(Vec<Expression>),
    /// Map literal: `{k1: e1, k2: e2}`
    MapLiteral(Vec<(String, Expression)>),
    /// A path projection over bound variables
    PathExpression(PathStep),
}

impl Expression {
    /// Integer literal.
    pub fn int(i: i64) -> Self {
        Expression::Literal(Literal::Int(i))
    }

    /// Float literal.
    pub fn float(f: f64) -> Self {
        Expression::Literal(Literal::Float(f))
    }

    /// String literal.
    pub fn string(s: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(s.into()))
    }

    /// Boolean literal.
    pub fn bool(b: bool) -> Self {
        Expression::Literal(Literal::Bool(b))
    }

    /// Null literal.
    pub fn null() -> Self {
        Expression::Literal(Literal::Null)
    }

    /// Variable reference.
    pub fn var(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    /// Property access on an expression.
    pub fn property(subject: Expression, key: impl Into<String>) -> Self {
        Expression::Property {
            subject: Box::new(subject),
            key: key.into(),
        }
    }

    /// Non-distinct function call by bare name.
    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            name: FunctionName::bare(name),
            args,
            distinct: false,
        }
    }

    /// Binary comparison.
    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Binary arithmetic.
    pub fn arith(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// A possibly namespaced function name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionName {
    /// Namespace segments, empty for the default namespace
    pub namespace: Vec<String>,
    /// The bare name, lowercased at construction for case-insensitive lookup
    pub name: String,
}

impl FunctionName {
    /// A name in the default namespace.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            namespace: Vec::new(),
            name: name.into().to_lowercase(),
        }
    }

    /// A namespaced name.
    pub fn qualified(namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into().to_lowercase(),
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.namespace {
            write!(f, "{}.", seg)?;
        }
        write!(f, "{}", self.name)
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    /// `+` (also string and list concatenation)
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `^`
    Power,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithmeticOp::Add => write!(f, "+"),
            ArithmeticOp::Subtract => write!(f, "-"),
            ArithmeticOp::Multiply => write!(f, "*"),
            ArithmeticOp::Divide => write!(f, "/"),
            ArithmeticOp::Modulo => write!(f, "%"),
            ArithmeticOp::Power => write!(f, "^"),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// `=`
    Eq,
    /// `<>`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "="),
            ComparisonOp::Neq => write!(f, "<>"),
            ComparisonOp::Lt => write!(f, "<"),
            ComparisonOp::Gt => write!(f, ">"),
            ComparisonOp::Lte => write!(f, "<="),
            ComparisonOp::Gte => write!(f, ">="),
        }
    }
}

/// String predicate operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringMatchOp {
    /// STARTS WITH
    StartsWith,
    /// ENDS WITH
    EndsWith,
    /// CONTAINS
    Contains,
    /// `=~`
    Regex,
}

impl fmt::Display for StringMatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringMatchOp::StartsWith => write!(f, "STARTS WITH"),
            StringMatchOp::EndsWith => write!(f, "ENDS WITH"),
            StringMatchOp::Contains => write!(f, "CONTAINS"),
            StringMatchOp::Regex => write!(f, "=~"),
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
}

/// One step of a path projection.
///
/// Walked front to back, a chain produces the alternating node /
/// relationship sequence of a path value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathStep {
    /// End of the chain
    Nil,
    /// A bound node variable
    Node {
        variable: String,
        next: Box<PathStep>,
    },
    /// A bound relationship variable
    Relationship {
        variable: String,
        next: Box<PathStep>,
    },
    /// A bound list of relationships (variable-length segment)
    Relationships {
        variable: String,
        next: Box<PathStep>,
    },
}

// =============================================================================
// Display implementations
// =============================================================================

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(lit) => write!(f, "{}", lit),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Parameter(name) => write!(f, "${}", name),
            Expression::Property { subject, key } => write!(f, "{}.{}", subject, key),
            Expression::ContainerIndex { container, index } => {
                write!(f, "{}[{}]", container, index)
            }
            Expression::Arithmetic { op, left, right } => {
                write!(f, "{} {} {}", left, op, right)
            }
            Expression::Comparison { op, left, right } => {
                write!(f, "{} {} {}", left, op, right)
            }
            Expression::And(l, r) => write!(f, "({} AND {})", l, r),
            Expression::Or(l, r) => write!(f, "({} OR {})", l, r),
            Expression::Not(e) => write!(f, "NOT {}", e),
            Expression::Ands(es) => {
                let parts: Vec<_> = es.iter().map(|e| format!("{}", e)).collect();
                write!(f, "({})", parts.join(" AND "))
            }
            Expression::Ors(es) => {
                let parts: Vec<_> = es.iter().map(|e| format!("{}", e)).collect();
                write!(f, "({})", parts.join(" OR "))
            }
            Expression::IsNull(e) => write!(f, "{} IS NULL", e),
            Expression::IsNotNull(e) => write!(f, "{} IS NOT NULL", e),
            Expression::StringMatch { op, left, right } => {
                write!(f, "{} {} {}", left, op, right)
            }
            Expression::In { item, list } => write!(f, "{} IN {}", item, list),
            Expression::HasLabels { subject, labels } => {
                write!(f, "{}", subject)?;
                for label in labels {
                    write!(f, ":{}", label)?;
                }
                Ok(())
            }
            Expression::Case {
                subject,
                alternatives,
                default,
            } => {
                write!(f, "CASE")?;
                if let Some(subj) = subject {
                    write!(f, " {}", subj)?;
                }
                for (when, then) in alternatives {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(d) = default {
                    write!(f, " ELSE {}", d)?;
                }
                write!(f, " END")
            }
            Expression::FunctionCall {
                name,
                args,
                distinct,
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expression::CountStar => write!(f, "count(*)"),
            Expression::ListLiteral(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expression::MapLiteral(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Expression::PathExpression(step) => {
                let mut names = Vec::new();
                let mut cur = step;
                loop {
                    match cur {
                        PathStep::Nil => break,
                        PathStep::Node { variable, next }
                        | PathStep::Relationship { variable, next }
                        | PathStep::Relationships { variable, next } => {
                            names.push(variable.as_str());
                            cur = next;
                        }
                    }
                }
                write!(f, "path({})", names.join(", "))
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(fl) => write!(f, "{}", fl),
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref var) = self.variable {
            write!(f, "{} = ", var)?;
        }
        write!(f, "{}", self.start)?;
        for (rel, node) in &self.chain {
            write!(f, "{}{}", rel, node)?;
        }
        Ok(())
    }
}

impl fmt::Display for NodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        if let Some(ref var) = self.variable {
            write!(f, "{}", var)?;
        }
        for label in &self.labels {
            write!(f, ":{}", label)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for RelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == Direction::Incoming {
            write!(f, "<-")?;
        } else {
            write!(f, "-")?;
        }
        write!(f, "[")?;
        if let Some(ref var) = self.variable {
            write!(f, "{}", var)?;
        }
        for (i, t) in self.types.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { ":" } else { "|" }, t)?;
        }
        write!(f, "]")?;
        if self.direction == Direction::Outgoing {
            write!(f, "->")
        } else {
            write!(f, "-")
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
    fn test_pattern_display() {
        let pattern = Pattern {
            variable: None,
            start: NodePattern::var("a"),
            chain: vec![(RelPattern::outgoing_typed("KNOWS"), NodePattern::var("b"))],
        };
        assert_eq!(format!("{}", pattern), "(a)-[:KNOWS]->(b)");
    }

    #[test]
    fn test_incoming_rel_display() {
        let pattern = Pattern {
            variable: Some("p".into()),
            start: NodePattern::labeled("a", "Person"),
            chain: vec![(
                RelPattern::outgoing_typed("KNOWS").named("r").incoming(),
                NodePattern::anonymous(),
            )],
        };
        assert_eq!(format!("{}", pattern), "p = (a:Person)<-[r:KNOWS]-()");
    }

    #[test]
    fn test_return_item_output_name() {
        assert_eq!(ReturnItem::variable("n").output_name(), "n");
        assert_eq!(ReturnItem::property("n", "name").output_name(), "n.name");
        assert_eq!(
            ReturnItem::aliased(Expression::var("n"), "node").output_name(),
            "node"
        );
        let count = ReturnItem {
            expression: Expression::CountStar,
            alias: None,
        };
        assert_eq!(count.output_name(), "count(*)");
    }

    #[test]
    fn test_expression_display() {
        let expr = Expression::compare(
            ComparisonOp::Gt,
            Expression::property(Expression::var("n"), "age"),
            Expression::int(10),
        );
        assert_eq!(format!("{}", expr), "n.age > 10");

        let call = Expression::FunctionCall {
            name: FunctionName::bare("Collect"),
            args: vec![Expression::var("x")],
            distinct: true,
        };
        assert_eq!(format!("{}", call), "collect(DISTINCT x)");
    }

    #[test]
    fn test_function_name_case_insensitive() {
        assert_eq!(FunctionName::bare("ToLower"), FunctionName::bare("tolower"));
    }
}
