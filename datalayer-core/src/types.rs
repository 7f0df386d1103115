//! Type registry: logical field types, query operators and sort orders.
//!
//! These enums are the closed vocabularies the rest of the crate builds on.
//! Drivers coerce a [`LogicalType`] into their own raw type string, queries
//! are built from [`Operator`]s, and result ordering is expressed with
//! [`SortOrder`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataSourceError, DataSourceResult};

/// Logical field types supported by the core, independent of any storage engine.
///
/// Drivers map each logical type to a physical raw type through
/// [`Driver::coerce_type`](crate::driver::Driver::coerce_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    /// Short character data.
    String,
    /// Single-precision floating point.
    Float,
    /// Double-precision floating point.
    Double,
    /// Arbitrary-precision real number.
    Real,
    /// Signed integer.
    Integer,
    /// Boolean flag.
    Boolean,
    /// Point in time.
    Date,
    /// Long character data.
    Text,
    /// Raw byte payload.
    Binary,
}

impl LogicalType {
    /// All supported logical types, in declaration order.
    pub const ALL: [LogicalType; 9] = [
        LogicalType::String,
        LogicalType::Float,
        LogicalType::Double,
        LogicalType::Real,
        LogicalType::Integer,
        LogicalType::Boolean,
        LogicalType::Date,
        LogicalType::Text,
        LogicalType::Binary,
    ];

    /// Returns the lowercase name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::String => "string",
            LogicalType::Float => "float",
            LogicalType::Double => "double",
            LogicalType::Real => "real",
            LogicalType::Integer => "integer",
            LogicalType::Boolean => "boolean",
            LogicalType::Date => "date",
            LogicalType::Text => "text",
            LogicalType::Binary => "binary",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalType {
    type Err = DataSourceError;

    fn from_str(s: &str) -> DataSourceResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| DataSourceError::Validation(format!("unknown logical type: {s}")))
    }
}

/// Query operators recognized by the builder and the filter-expression parser.
///
/// Logical operators (`$and`, `$or`, `$not`) combine branches of the
/// expression tree; comparison operators form its leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `$and` - all children must match.
    And,
    /// `$or` - any child must match.
    Or,
    /// `$not` - inverts its single child branch.
    Not,
    /// `$eq` - equal to.
    Eq,
    /// `$neq` - not equal to.
    Neq,
    /// `$gt` - greater than.
    Gt,
    /// `$gte` - greater than or equal to.
    Gte,
    /// `$lt` - less than.
    Lt,
    /// `$lte` - less than or equal to.
    Lte,
    /// `$in` - field value is a member of the given array.
    In,
    /// `$nin` - field value is not a member of the given array.
    Nin,
    /// `$regex` - field value matches the given pattern.
    Regex,
}

impl Operator {
    /// All recognized operators, in declaration order.
    pub const ALL: [Operator; 12] = [
        Operator::And,
        Operator::Or,
        Operator::Not,
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::Nin,
        Operator::Regex,
    ];

    /// Returns the `$`-prefixed key of this operator as used in filter expressions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "$and",
            Operator::Or => "$or",
            Operator::Not => "$not",
            Operator::Eq => "$eq",
            Operator::Neq => "$neq",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Regex => "$regex",
        }
    }

    /// Parses a `$`-prefixed operator key, returning `None` if unrecognized.
    pub fn parse(s: &str) -> Option<Operator> {
        Self::ALL.iter().copied().find(|op| op.as_str() == s)
    }

    /// Returns whether this operator combines branches (`$and`, `$or`, `$not`).
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Not)
    }

    /// Returns whether this operator forms a comparison leaf.
    pub fn is_comparison(&self) -> bool {
        !self.is_logical()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order, the default.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Returns the lowercase name of this order.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = DataSourceError;

    fn from_str(s: &str) -> DataSourceResult<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DataSourceError::Validation(format!(
                "unknown sort order: {other}"
            ))),
        }
    }
}

/// A single ordering clause: a field name and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub order: SortOrder,
}

impl Order {
    /// Creates an ascending order clause for the given field.
    pub fn asc(field: impl Into<String>) -> Self {
        Order { field: field.into(), order: SortOrder::Asc }
    }

    /// Creates a descending order clause for the given field.
    pub fn desc(field: impl Into<String>) -> Self {
        Order { field: field.into(), order: SortOrder::Desc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_keys_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operator::parse("$exists"), None);
        assert_eq!(Operator::parse("eq"), None);
    }

    #[test]
    fn logical_and_comparison_split() {
        assert!(Operator::And.is_logical());
        assert!(Operator::Not.is_logical());
        assert!(Operator::Eq.is_comparison());
        assert!(Operator::Regex.is_comparison());
    }

    #[test]
    fn logical_type_from_str() {
        assert_eq!("integer".parse::<LogicalType>().unwrap(), LogicalType::Integer);
        assert!(matches!(
            "varchar".parse::<LogicalType>(),
            Err(DataSourceError::Validation(_))
        ));
    }

    #[test]
    fn sort_order_defaults_to_asc() {
        assert_eq!(SortOrder::default(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
    }
}
