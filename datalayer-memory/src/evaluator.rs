//! Where-clause evaluation over in-memory BSON documents.

use bson::{Bson, Document, datetime::DateTime};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;

use datalayer_core::error::{DataSourceError, DataSourceResult};
use datalayer_core::query::{Expr, QueryVisitor};
use datalayer_core::types::Operator;

/// Type-erased, comparable representation of BSON values.
///
/// Numeric variants are normalized to f64 so integer and double fields
/// compare naturally against each other.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => {
                Comparable::Array(arr.iter().map(Comparable::from).collect::<Vec<_>>())
            }
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates a where-clause expression against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DataSourceResult<bool> {
        self.visit_expr(expr)
    }

    /// Keeps the documents matching `expr`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> DataSourceResult<Vec<Document>> {
        let mut matched = Vec::new();
        for document in documents {
            if DocumentEvaluator::new(document).evaluate(expr)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DataSourceError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_comparison(
        &mut self,
        field: &str,
        operator: Operator,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = self.document.get(field) else {
            // A missing field never matches.
            return Ok(false);
        };

        match operator {
            Operator::Eq => Ok(Comparable::from(field_value) == Comparable::from(value)),
            Operator::Neq => Ok(Comparable::from(field_value) != Comparable::from(value)),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => Ok(match operator {
                        Operator::Gt => ordering == Ordering::Greater,
                        Operator::Gte => ordering != Ordering::Less,
                        Operator::Lt => ordering == Ordering::Less,
                        Operator::Lte => ordering != Ordering::Greater,
                        _ => unreachable!(),
                    }),
                    None => Ok(false),
                }
            }
            Operator::In => Ok(membership(field_value, value)),
            Operator::Nin => Ok(!membership(field_value, value)),
            Operator::Regex => {
                let Bson::String(pattern) = value else {
                    return Err(DataSourceError::Validation(
                        "`$regex` expects a string pattern".into(),
                    ));
                };
                let Bson::String(text) = field_value else {
                    return Ok(false);
                };
                let regex = Regex::new(pattern).map_err(|err| {
                    DataSourceError::Validation(format!("invalid regex `{pattern}`: {err}"))
                })?;
                Ok(regex.is_match(text))
            }
            Operator::And | Operator::Or | Operator::Not => Err(
                DataSourceError::UnknownOperator(operator.as_str().to_string()),
            ),
        }
    }
}

/// Whether the field value is a member of the candidate set. A scalar
/// candidate is treated as a one-element set.
fn membership(field_value: &Bson, candidates: &Bson) -> bool {
    let field_value = Comparable::from(field_value);
    match candidates {
        Bson::Array(items) => items
            .iter()
            .any(|item| Comparable::from(item) == field_value),
        single => Comparable::from(single) == field_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, expr: &Expr) -> bool {
        DocumentEvaluator::new(document).evaluate(expr).unwrap()
    }

    fn leaf(field: &str, operator: Operator, value: impl Into<Bson>) -> Expr {
        Expr::Comparison { operator, field: field.to_string(), value: value.into() }
    }

    #[test]
    fn comparisons_normalize_numeric_widths() {
        let document = doc! { "age": 30_i32 };
        assert!(matches(&document, &leaf("age", Operator::Eq, 30_i64)));
        assert!(matches(&document, &leaf("age", Operator::Gte, 30.0)));
        assert!(!matches(&document, &leaf("age", Operator::Gt, 30_i64)));
    }

    #[test]
    fn missing_fields_never_match() {
        let document = doc! { "age": 30 };
        assert!(!matches(&document, &leaf("name", Operator::Eq, "alice")));
        assert!(!matches(&document, &leaf("name", Operator::Neq, "alice")));
    }

    #[test]
    fn logical_branches_combine_leaves() {
        let document = doc! { "age": 30, "name": "alice" };

        let or = Expr::Or(vec![
            leaf("age", Operator::Lt, 10),
            leaf("name", Operator::Eq, "alice"),
        ]);
        assert!(matches(&document, &or));

        let not = Expr::Not(Box::new(Expr::And(vec![leaf("age", Operator::Eq, 30)])));
        assert!(!matches(&document, &not));
    }

    #[test]
    fn membership_operators_scan_the_candidate_array() {
        let document = doc! { "age": 30 };
        let candidates = Bson::Array(vec![Bson::from(10), Bson::from(30)]);

        assert!(matches(&document, &leaf("age", Operator::In, candidates.clone())));
        assert!(!matches(&document, &leaf("age", Operator::Nin, candidates)));
    }

    #[test]
    fn regex_matches_string_fields_only() {
        let document = doc! { "name": "john.doe", "age": 3 };

        assert!(matches(&document, &leaf("name", Operator::Regex, "^john")));
        assert!(!matches(&document, &leaf("age", Operator::Regex, "^3")));

        let result = DocumentEvaluator::new(&document)
            .evaluate(&leaf("name", Operator::Regex, "("));
        assert!(matches!(result, Err(DataSourceError::Validation(_))));
    }
}
