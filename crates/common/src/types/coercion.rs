use std::cmp::Ordering;

use super::{DataType, Value};

/// Widest type two operands can both be promoted to. `Unknown` (an
/// untyped NULL) absorbs into the other side.
pub fn common_super_type(a: &DataType, b: &DataType) -> Option<DataType> {
    match (a, b) {
        (DataType::Unknown, other) | (other, DataType::Unknown) => Some(other.clone()),
        _ if a == b => Some(a.clone()),
        _ if a.is_numeric() && b.is_numeric() => Some(numeric_super_type(a, b)),
        (
            DataType::Array {
                element: ae,
                contains_null: an,
            },
            DataType::Array {
                element: be,
                contains_null: bn,
            },
        ) => Some(DataType::array(common_super_type(ae, be)?, *an || *bn)),
        (
            DataType::Map {
                key: ak,
                value: av,
                value_contains_null: an,
            },
            DataType::Map {
                key: bk,
                value: bv,
                value_contains_null: bn,
            },
        ) => Some(DataType::map(
            common_super_type(ak, bk)?,
            common_super_type(av, bv)?,
            *an || *bn,
        )),
        _ => None,
    }
}

fn numeric_super_type(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (DataType::Float64, _) | (_, DataType::Float64) => DataType::Float64,
        (DataType::Numeric(_), _) | (_, DataType::Numeric(_)) => DataType::Numeric(None),
        (DataType::Int64, _) | (_, DataType::Int64) => DataType::Int64,
        _ => DataType::Int32,
    }
}

/// Total order over comparable values of the same (or numerically
/// compatible) type. `None` when either side is null or the pair is not
/// comparable.
pub fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::Numeric(x), Value::Numeric(y)) => Some(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (xv, yv) in x.iter().zip(y.iter()) {
                match cmp_values(xv, yv)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => {
                let x = a.as_f64()?;
                let y = b.as_f64()?;
                x.partial_cmp(&y)
            }
        },
    }
}
