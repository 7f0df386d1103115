//! Built-in value converters for the in-memory driver's raw types.
//!
//! One converter per raw type the driver coerces to. Each pair is inverse on
//! the field's valid domain, which the mapping layer relies on when it
//! round-trips documents.

use bson::Bson;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

use datalayer_core::converter::{Converter, ConverterRef};
use datalayer_core::error::{DataSourceError, DataSourceResult};

fn type_mismatch(expected: &str, value: &Bson) -> DataSourceError {
    DataSourceError::Conversion(format!(
        "expected a {expected} value, got {:?}",
        value.element_type()
    ))
}

/// Returns the converter for one of the driver's raw types.
///
/// # Errors
///
/// Returns `UnsupportedType` for raw types the driver never coerces to.
pub fn converter_for(raw_type: &str) -> DataSourceResult<ConverterRef> {
    match raw_type {
        "string" | "text" => Ok(Arc::new(StringConverter)),
        "real" => Ok(Arc::new(RealConverter)),
        "integer" => Ok(Arc::new(IntegerConverter)),
        "boolean" => Ok(Arc::new(BooleanConverter)),
        "datetime" => Ok(Arc::new(DateTimeConverter)),
        "blob" => Ok(Arc::new(BlobConverter)),
        other => Err(DataSourceError::UnsupportedType(other.to_string())),
    }
}

/// Passes strings through unchanged; anything else is a conversion error.
#[derive(Debug)]
pub struct StringConverter;

impl Converter for StringConverter {
    fn to_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::String(_) => Ok(value),
            other => Err(type_mismatch("string", &other)),
        }
    }

    fn from_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::String(_) => Ok(value),
            other => Err(type_mismatch("string", &other)),
        }
    }
}

/// Widens integers to doubles on the way in; doubles pass through.
#[derive(Debug)]
pub struct RealConverter;

impl Converter for RealConverter {
    fn to_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::Double(_) => Ok(value),
            Bson::Int32(v) => Ok(Bson::Double(v as f64)),
            Bson::Int64(v) => Ok(Bson::Double(v as f64)),
            other => Err(type_mismatch("numeric", &other)),
        }
    }

    fn from_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::Double(_) => Ok(value),
            other => Err(type_mismatch("real", &other)),
        }
    }
}

/// Normalizes `Int32` to `Int64`; `Int64` passes through.
#[derive(Debug)]
pub struct IntegerConverter;

impl Converter for IntegerConverter {
    fn to_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::Int64(_) => Ok(value),
            Bson::Int32(v) => Ok(Bson::Int64(v as i64)),
            other => Err(type_mismatch("integer", &other)),
        }
    }

    fn from_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::Int64(_) => Ok(value),
            Bson::Int32(v) => Ok(Bson::Int64(v as i64)),
            other => Err(type_mismatch("integer", &other)),
        }
    }
}

/// Passes booleans through unchanged.
#[derive(Debug)]
pub struct BooleanConverter;

impl Converter for BooleanConverter {
    fn to_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::Boolean(_) => Ok(value),
            other => Err(type_mismatch("boolean", &other)),
        }
    }

    fn from_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::Boolean(_) => Ok(value),
            other => Err(type_mismatch("boolean", &other)),
        }
    }
}

/// Maps RFC 3339 strings to `Bson::DateTime` and back.
///
/// BSON datetimes carry millisecond precision, so sub-millisecond digits in
/// the incoming string are truncated.
#[derive(Debug)]
pub struct DateTimeConverter;

impl Converter for DateTimeConverter {
    fn to_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::String(text) => {
                let parsed = DateTime::parse_from_rfc3339(&text).map_err(|err| {
                    DataSourceError::Conversion(format!("invalid RFC 3339 datetime `{text}`: {err}"))
                })?;
                Ok(Bson::DateTime(bson::DateTime::from_chrono(
                    parsed.with_timezone(&Utc),
                )))
            }
            Bson::DateTime(_) => Ok(value),
            other => Err(type_mismatch("datetime", &other)),
        }
    }

    fn from_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::DateTime(dt) => Ok(Bson::String(
                dt.to_chrono().to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            other => Err(type_mismatch("datetime", &other)),
        }
    }
}

/// Passes binary payloads through unchanged.
#[derive(Debug)]
pub struct BlobConverter;

impl Converter for BlobConverter {
    fn to_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::Binary(_) => Ok(value),
            other => Err(type_mismatch("binary", &other)),
        }
    }

    fn from_raw(&self, value: Bson) -> DataSourceResult<Bson> {
        match value {
            Bson::Binary(_) => Ok(value),
            other => Err(type_mismatch("binary", &other)),
        }
    }
}
