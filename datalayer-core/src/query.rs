//! Structured query construction against one collection.
//!
//! A [`Query`] is a mutable builder for a single logical query: field
//! selection, join composition, a stack-based boolean expression tree
//! (`begin_where`/`and`/`or`/`not`/`operation`/`end`), ordering, offset and
//! limit. The expression tree lives in a node arena; the clause stack holds
//! indices into it, so no branch ever owns a reference cycle.
//!
//! # Building the where clause
//!
//! ```ignore
//! use datalayer_core::query::Query;
//! use datalayer_core::types::Operator;
//!
//! let mut query = Query::new("users")?;
//! query
//!     .begin_where()
//!     .or()?
//!     .operation("email", Operator::Regex, "john.doe".into())?
//!     .and()?
//!     .operation("first_name", Operator::Eq, "John".into())?
//!     .operation("last_name", Operator::Eq, "Doe".into())?
//!     .end()?
//!     .end()?
//!     .not()?
//!     .operation("active", Operator::Eq, false.into())?
//!     .end()?;
//! ```
//!
//! A query instance is meant for single-threaded, single-call-sequence
//! construction; it is not a concurrent structure.

use bson::Bson;
use std::collections::BTreeSet;

use crate::error::{DataSourceError, DataSourceResult};
use crate::types::{Operator, Order, SortOrder};

/// An immutable boolean expression tree over comparison leaves.
///
/// Materialized from the builder via [`Query::where_clause`]. The root is
/// always an implicit [`Expr::And`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of child expressions.
    And(Vec<Expr>),
    /// Logical OR of child expressions.
    Or(Vec<Expr>),
    /// Logical NOT of a single child, always an implicit AND branch.
    Not(Box<Expr>),
    /// A comparison leaf binding one field to one operator and value.
    Comparison {
        /// The comparison operator.
        operator: Operator,
        /// The storage field name.
        field: String,
        /// The right-hand value, already in store representation.
        value: Bson,
    },
}

/// Visitor over an [`Expr`] tree, used by drivers to translate or evaluate
/// where clauses.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DataSourceError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_comparison(
        &mut self,
        field: &str,
        operator: Operator,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Comparison { operator, field, value } => {
                self.visit_comparison(field, *operator, value)
            }
        }
    }
}

/// Arena node backing the where-clause tree under construction.
#[derive(Debug, Clone)]
enum Node {
    And(Vec<usize>),
    Or(Vec<usize>),
    Not(usize),
    Comparison {
        operator: Operator,
        field: String,
        value: Bson,
    },
}

/// A mutable builder for one logical query against one collection.
///
/// See the [module documentation](self) for the clause-stack protocol.
#[derive(Debug, Clone)]
pub struct Query {
    collection: String,
    alias: String,
    fields: BTreeSet<String>,
    joints: Vec<Query>,
    nodes: Vec<Node>,
    stack: Vec<usize>,
    orders: Vec<Order>,
    offset: u64,
    limit: Option<u64>,
}

/// Index of the implicit root AND branch in the node arena.
const ROOT: usize = 0;

impl Query {
    /// Creates a new query against the given collection, with the alias
    /// defaulting to the collection name.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the collection name is empty.
    pub fn new(collection: impl Into<String>) -> DataSourceResult<Self> {
        let collection = collection.into();
        if collection.is_empty() {
            return Err(DataSourceError::Validation("collection name is empty".into()));
        }

        Ok(Query {
            alias: collection.clone(),
            collection,
            fields: BTreeSet::new(),
            joints: Vec::new(),
            nodes: vec![Node::And(Vec::new())],
            stack: Vec::new(),
            orders: Vec::new(),
            offset: 0,
            limit: None,
        })
    }

    /// Sets the collection alias used by driver-side translation.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the alias is empty.
    pub fn with_alias(mut self, alias: impl Into<String>) -> DataSourceResult<Self> {
        let alias = alias.into();
        if alias.is_empty() {
            return Err(DataSourceError::Validation("query alias is empty".into()));
        }

        self.alias = alias;
        Ok(self)
    }

    /// Returns the queried collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the collection alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Returns the selected field names. Empty means all fields.
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    /// Returns the joined sub-queries, in insertion order.
    pub fn joints(&self) -> &[Query] {
        &self.joints
    }

    /// Returns the ordering clauses, in call order.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Returns the fetch offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the fetch size bound. `None` means unbounded; `Some(0)` is a
    /// literal zero-row bound.
    pub fn fetch_size(&self) -> Option<u64> {
        self.limit
    }

    /// Materializes the where clause as an immutable expression tree.
    ///
    /// The root is always an implicit [`Expr::And`], empty when no
    /// operation was recorded.
    pub fn where_clause(&self) -> Expr {
        self.materialize(ROOT)
    }

    fn materialize(&self, index: usize) -> Expr {
        match &self.nodes[index] {
            Node::And(children) => {
                Expr::And(children.iter().map(|&child| self.materialize(child)).collect())
            }
            Node::Or(children) => {
                Expr::Or(children.iter().map(|&child| self.materialize(child)).collect())
            }
            Node::Not(child) => Expr::Not(Box::new(self.materialize(*child))),
            Node::Comparison { operator, field, value } => Expr::Comparison {
                operator: *operator,
                field: field.clone(),
                value: value.clone(),
            },
        }
    }

    /// Adds the given field to the selection set. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the field name is empty.
    pub fn select(&mut self, field: impl Into<String>) -> DataSourceResult<&mut Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(DataSourceError::Validation("selected field name is empty".into()));
        }

        self.fields.insert(field);
        Ok(self)
    }

    /// Appends a sub-query for relational composition. Join order is
    /// insertion order.
    pub fn join(&mut self, query: Query) -> &mut Self {
        self.joints.push(query);
        self
    }

    /// Resets the where-clause pointer to the root level, opening the
    /// implicit root AND branch.
    pub fn begin_where(&mut self) -> &mut Self {
        self.stack.clear();
        self.stack.push(ROOT);
        self
    }

    /// Index of the currently open branch, or `EmptyWhereStack` if no
    /// clause is open.
    fn top(&self) -> DataSourceResult<usize> {
        self.stack
            .last()
            .copied()
            .ok_or(DataSourceError::EmptyWhereStack)
    }

    /// Appends `child` to the branch at `parent`. The stack only ever holds
    /// AND/OR branches, so the match is exhaustive in practice.
    fn attach(&mut self, parent: usize, child: usize) {
        match &mut self.nodes[parent] {
            Node::And(children) | Node::Or(children) => children.push(child),
            _ => unreachable!("clause stack holds only branch nodes"),
        }
    }

    /// Opens a new AND branch under the current clause and descends into it.
    ///
    /// # Errors
    ///
    /// Returns `EmptyWhereStack` if no clause is open.
    pub fn and(&mut self) -> DataSourceResult<&mut Self> {
        let parent = self.top()?;
        let branch = self.push_node(Node::And(Vec::new()));
        self.attach(parent, branch);
        self.stack.push(branch);
        Ok(self)
    }

    /// Opens a new OR branch under the current clause and descends into it.
    ///
    /// # Errors
    ///
    /// Returns `EmptyWhereStack` if no clause is open.
    pub fn or(&mut self) -> DataSourceResult<&mut Self> {
        let parent = self.top()?;
        let branch = self.push_node(Node::Or(Vec::new()));
        self.attach(parent, branch);
        self.stack.push(branch);
        Ok(self)
    }

    /// Opens a NOT clause under the current one.
    ///
    /// The NOT node wraps a fresh implicit AND branch, and it is that AND
    /// branch that becomes the current clause, so subsequent operations
    /// chain as a negated conjunction.
    ///
    /// # Errors
    ///
    /// Returns `EmptyWhereStack` if no clause is open.
    pub fn not(&mut self) -> DataSourceResult<&mut Self> {
        let parent = self.top()?;
        let branch = self.push_node(Node::And(Vec::new()));
        let negation = self.push_node(Node::Not(branch));
        self.attach(parent, negation);
        self.stack.push(branch);
        Ok(self)
    }

    /// Appends a comparison leaf to the current clause. The leaf is frozen
    /// on insertion and never mutated afterwards.
    ///
    /// # Errors
    ///
    /// Returns `EmptyWhereStack` if no clause is open, `UnknownOperator` if
    /// the operator is not a comparison operator, or a `Validation` error
    /// if the field name is empty.
    pub fn operation(
        &mut self,
        field: impl Into<String>,
        operator: Operator,
        value: Bson,
    ) -> DataSourceResult<&mut Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(DataSourceError::Validation("operation field name is empty".into()));
        }
        if !operator.is_comparison() {
            return Err(DataSourceError::UnknownOperator(operator.as_str().to_string()));
        }

        let parent = self.top()?;
        let leaf = self.push_node(Node::Comparison { operator, field, value });
        self.attach(parent, leaf);
        Ok(self)
    }

    /// Ends the current clause, returning to the previous one in the stack.
    ///
    /// # Errors
    ///
    /// Returns `EmptyWhereStack` if called more times than there are open
    /// clauses.
    pub fn end(&mut self) -> DataSourceResult<&mut Self> {
        if self.stack.pop().is_none() {
            return Err(DataSourceError::EmptyWhereStack);
        }

        Ok(self)
    }

    /// Appends an ordering clause; multiple calls compose a multi-key sort
    /// evaluated in call order.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the field name is empty.
    pub fn order_by(
        &mut self,
        field: impl Into<String>,
        order: SortOrder,
    ) -> DataSourceResult<&mut Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(DataSourceError::Validation("order field name is empty".into()));
        }

        self.orders.push(Order { field, order });
        Ok(self)
    }

    /// Sets the fetch offset.
    pub fn skip(&mut self, offset: u64) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Sets the fetch size. `-1` means unbounded, `0` is a literal
    /// zero-row bound.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if `size < -1`.
    pub fn limit(&mut self, size: i64) -> DataSourceResult<&mut Self> {
        if size < -1 {
            return Err(DataSourceError::Validation(format!(
                "limit must be >= -1, got {size}"
            )));
        }

        self.limit = if size == -1 { None } else { Some(size as u64) };
        Ok(self)
    }

    fn push_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}
