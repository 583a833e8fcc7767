pub mod coercion;

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Nominal type of an expression or value.
///
/// Nested types carry their own element-nullability flags: an
/// `ARRAY<INT64>` that may hold NULL entries is a different type from one
/// that may not, and the two only unify through [`DataType::same_type`] or
/// [`DataType::merge_relaxing_null_flags`]. Map keys are never null, so
/// `Map` only tracks value nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Unknown,
    Bool,
    Int32,
    Int64,
    Float64,
    Numeric(Option<(u8, u8)>),
    String,
    Bytes,
    Date,
    Timestamp,
    Array {
        element: Box<DataType>,
        contains_null: bool,
    },
    Map {
        key: Box<DataType>,
        value: Box<DataType>,
        value_contains_null: bool,
    },
}

impl DataType {
    pub fn array(element: DataType, contains_null: bool) -> Self {
        DataType::Array {
            element: Box::new(element),
            contains_null,
        }
    }

    pub fn map(key: DataType, value: DataType, value_contains_null: bool) -> Self {
        DataType::Map {
            key: Box::new(key),
            value: Box::new(value),
            value_contains_null,
        }
    }

    /// Structural equality ignoring all nullability flags.
    pub fn same_type(&self, other: &DataType) -> bool {
        self.equals_structurally(other, true)
    }

    /// Structural equality; nested nullability flags are compared unless
    /// `ignore_nullability` is set.
    pub fn equals_structurally(&self, other: &DataType, ignore_nullability: bool) -> bool {
        match (self, other) {
            (
                DataType::Array {
                    element: a,
                    contains_null: a_null,
                },
                DataType::Array {
                    element: b,
                    contains_null: b_null,
                },
            ) => {
                (ignore_nullability || a_null == b_null)
                    && a.equals_structurally(b, ignore_nullability)
            }
            (
                DataType::Map {
                    key: ak,
                    value: av,
                    value_contains_null: a_null,
                },
                DataType::Map {
                    key: bk,
                    value: bv,
                    value_contains_null: b_null,
                },
            ) => {
                (ignore_nullability || a_null == b_null)
                    && ak.equals_structurally(bk, ignore_nullability)
                    && av.equals_structurally(bv, ignore_nullability)
            }
            _ => self == other,
        }
    }

    /// Unifies two types that differ only in nullability flags, producing
    /// the type whose flags admit both sides. Returns `None` when the
    /// types differ structurally.
    pub fn merge_relaxing_null_flags(&self, other: &DataType) -> Option<DataType> {
        match (self, other) {
            (
                DataType::Array {
                    element: a,
                    contains_null: a_null,
                },
                DataType::Array {
                    element: b,
                    contains_null: b_null,
                },
            ) => Some(DataType::array(
                a.merge_relaxing_null_flags(b)?,
                *a_null || *b_null,
            )),
            (
                DataType::Map {
                    key: ak,
                    value: av,
                    value_contains_null: a_null,
                },
                DataType::Map {
                    key: bk,
                    value: bv,
                    value_contains_null: b_null,
                },
            ) => Some(DataType::map(
                ak.merge_relaxing_null_flags(bk)?,
                av.merge_relaxing_null_flags(bv)?,
                *a_null || *b_null,
            )),
            _ if self == other => Some(self.clone()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float64 | DataType::Numeric(_)
        )
    }

    /// Key types that support hash-based lookup. Bytes compare by content
    /// ordering only, so they are excluded here and take the ordered path.
    pub fn is_hashable_key(&self) -> bool {
        matches!(
            self,
            DataType::Bool
                | DataType::Int32
                | DataType::Int64
                | DataType::Float64
                | DataType::Numeric(_)
                | DataType::String
                | DataType::Date
                | DataType::Timestamp
        )
    }

    pub fn is_orderable(&self) -> bool {
        match self {
            DataType::Bool
            | DataType::Int32
            | DataType::Int64
            | DataType::Float64
            | DataType::Numeric(_)
            | DataType::String
            | DataType::Bytes
            | DataType::Date
            | DataType::Timestamp => true,
            DataType::Array { element, .. } => element.is_orderable(),
            DataType::Unknown | DataType::Map { .. } => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown => write!(f, "UNKNOWN"),
            DataType::Bool => write!(f, "BOOL"),
            DataType::Int32 => write!(f, "INT32"),
            DataType::Int64 => write!(f, "INT64"),
            DataType::Float64 => write!(f, "FLOAT64"),
            DataType::Numeric(None) => write!(f, "NUMERIC"),
            DataType::Numeric(Some((p, s))) => write!(f, "NUMERIC({}, {})", p, s),
            DataType::String => write!(f, "STRING"),
            DataType::Bytes => write!(f, "BYTES"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Array { element, .. } => write!(f, "ARRAY<{}>", element),
            DataType::Map { key, value, .. } => write!(f, "MAP<{}, {}>", key, value),
        }
    }
}

/// Runtime value. `Null` doubles as the per-position null marker inside
/// array and map containers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(ordered_float::OrderedFloat<f64>),
    Numeric(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    Map(MapValue),
}

/// A map value as paired key/value arrays of equal length, entries
/// matched positionally. The i-th key is never null. Duplicate keys are
/// representable; consumers that construct new maps apply first-wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct MapValue {
    keys: Vec<Value>,
    values: Vec<Value>,
}

impl MapValue {
    pub fn new(keys: Vec<Value>, values: Vec<Value>) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self { keys, values }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.keys.iter().zip(self.values.iter())
    }
}

impl Value {
    pub fn null() -> Self {
        Value::Null
    }

    pub fn bool_val(v: bool) -> Self {
        Value::Bool(v)
    }

    pub fn int32(v: i32) -> Self {
        Value::Int32(v)
    }

    pub fn int64(v: i64) -> Self {
        Value::Int64(v)
    }

    pub fn float64(v: f64) -> Self {
        Value::Float64(ordered_float::OrderedFloat(v))
    }

    pub fn numeric(v: Decimal) -> Self {
        Value::Numeric(v)
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::String(v.into())
    }

    pub fn bytes(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }

    pub fn date(v: NaiveDate) -> Self {
        Value::Date(v)
    }

    pub fn timestamp(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }

    pub fn array(v: Vec<Value>) -> Self {
        Value::Array(v)
    }

    pub fn map(keys: Vec<Value>, values: Vec<Value>) -> Self {
        Value::Map(MapValue::new(keys, values))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(v.into_inner()),
            Value::Numeric(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// The most specific type this value alone evidences. Containers
    /// derive element types from their first non-null entry.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Unknown,
            Value::Bool(_) => DataType::Bool,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::Numeric(_) => DataType::Numeric(None),
            Value::String(_) => DataType::String,
            Value::Bytes(_) => DataType::Bytes,
            Value::Date(_) => DataType::Date,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Array(items) => {
                let element = items
                    .iter()
                    .find(|v| !v.is_null())
                    .map(Value::data_type)
                    .unwrap_or(DataType::Unknown);
                DataType::array(element, items.iter().any(Value::is_null))
            }
            Value::Map(map) => {
                let key = map
                    .keys()
                    .first()
                    .map(Value::data_type)
                    .unwrap_or(DataType::Unknown);
                let value = map
                    .values()
                    .iter()
                    .find(|v| !v.is_null())
                    .map(Value::data_type)
                    .unwrap_or(DataType::Unknown);
                DataType::map(key, value, map.values().iter().any(Value::is_null))
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int32(v) => serde_json::json!(v),
            Value::Int64(v) => serde_json::json!(v),
            Value::Float64(v) => serde_json::json!(v.into_inner()),
            Value::Numeric(d) => serde_json::Value::String(d.to_string()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::json!(b),
            Value::Date(d) => serde_json::Value::String(d.to_string()),
            Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Array(
                map.entries()
                    .map(|(k, v)| serde_json::json!({ "key": k.to_json(), "value": v.to_json() }))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Numeric(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "b{:?}", b),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.entries().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_array(contains_null: bool) -> DataType {
        DataType::array(DataType::Int64, contains_null)
    }

    #[test]
    fn test_same_type_ignores_nested_flags() {
        assert!(int_array(true).same_type(&int_array(false)));
        assert!(!int_array(true).equals_structurally(&int_array(false), false));
        assert!(int_array(true).equals_structurally(&int_array(true), false));
    }

    #[test]
    fn test_same_type_rejects_structural_difference() {
        assert!(!int_array(true).same_type(&DataType::array(DataType::String, true)));
        assert!(!DataType::Int32.same_type(&DataType::Int64));
    }

    #[test]
    fn test_merge_relaxing_null_flags() {
        let merged = int_array(true).merge_relaxing_null_flags(&int_array(false));
        assert_eq!(merged, Some(int_array(true)));

        let left = DataType::map(DataType::Int64, int_array(false), false);
        let right = DataType::map(DataType::Int64, int_array(true), true);
        assert_eq!(
            left.merge_relaxing_null_flags(&right),
            Some(DataType::map(DataType::Int64, int_array(true), true))
        );

        assert_eq!(
            DataType::Int64.merge_relaxing_null_flags(&DataType::String),
            None
        );
    }

    #[test]
    fn test_key_classification() {
        assert!(DataType::Int64.is_hashable_key());
        assert!(DataType::String.is_hashable_key());
        assert!(!DataType::Bytes.is_hashable_key());
        assert!(DataType::Bytes.is_orderable());
        assert!(!DataType::map(DataType::Int64, DataType::Int64, false).is_hashable_key());
        assert!(!DataType::map(DataType::Int64, DataType::Int64, false).is_orderable());
    }

    #[test]
    fn test_array_value_data_type() {
        let v = Value::array(vec![Value::Null, Value::int64(7)]);
        assert_eq!(v.data_type(), int_array(true));
    }

    #[test]
    fn test_value_to_json() {
        let v = Value::array(vec![Value::int64(1), Value::Null, Value::string("x")]);
        assert_eq!(v.to_json(), serde_json::json!([1, null, "x"]));
        let m = Value::map(vec![Value::int64(1)], vec![Value::string("a")]);
        assert_eq!(
            m.to_json(),
            serde_json::json!([{ "key": 1, "value": "a" }])
        );
    }

    #[test]
    fn test_map_entries_pairing() {
        let m = MapValue::new(
            vec![Value::int64(1), Value::int64(2)],
            vec![Value::string("a"), Value::Null],
        );
        let entries: Vec<_> = m.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (&Value::int64(1), &Value::string("a")));
        assert_eq!(entries[1], (&Value::int64(2), &Value::Null));
    }
}
