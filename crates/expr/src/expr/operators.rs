use rust_decimal::Decimal;

use ketchsql_common::types::coercion::{cmp_values, common_super_type};
use ketchsql_common::types::{DataType, Value};
use ketchsql_common::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Minus,
}

impl BinaryOp {
    pub fn result_type(&self, left: &DataType, right: &DataType) -> DataType {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Mod => {
                common_super_type(left, right).unwrap_or(DataType::Unknown)
            }
            BinaryOp::Div => match common_super_type(left, right) {
                Some(DataType::Numeric(p)) => DataType::Numeric(p),
                Some(t) if t.is_numeric() => DataType::Float64,
                _ => DataType::Unknown,
            },
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::And
            | BinaryOp::Or => DataType::Bool,
            BinaryOp::Concat => DataType::String,
        }
    }
}

pub(crate) fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        // AND/OR use three-valued logic and must see nulls.
        BinaryOp::And => eval_and(left, right),
        BinaryOp::Or => eval_or(left, right),
        _ if left.is_null() || right.is_null() => Ok(Value::Null),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => eval_arithmetic(op, left, right),
        BinaryOp::Div => eval_div(left, right),
        BinaryOp::Mod => eval_mod(left, right),
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq => eval_comparison(op, left, right),
        BinaryOp::Concat => match (left.as_str(), right.as_str()) {
            (Some(a), Some(b)) => Ok(Value::string(format!("{}{}", a, b))),
            _ => Err(Error::invalid_operation(format!(
                "cannot concatenate {} and {}",
                left.data_type(),
                right.data_type()
            ))),
        },
    }
}

pub(crate) fn eval_unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match op {
        UnaryOp::Not => match value {
            Value::Null => Ok(Value::Null),
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(Error::invalid_operation(format!(
                "NOT requires BOOL, got {}",
                other.data_type()
            ))),
        },
        UnaryOp::Minus => match value {
            Value::Null => Ok(Value::Null),
            Value::Int32(v) => v.checked_neg().map(Value::Int32).ok_or(Error::Overflow),
            Value::Int64(v) => v.checked_neg().map(Value::Int64).ok_or(Error::Overflow),
            Value::Float64(v) => Ok(Value::float64(-v.into_inner())),
            Value::Numeric(d) => Ok(Value::Numeric(-*d)),
            other => Err(Error::invalid_operation(format!(
                "cannot negate {}",
                other.data_type()
            ))),
        },
    }
}

fn eval_and(left: &Value, right: &Value) -> Result<Value> {
    match (bool_operand(left)?, bool_operand(right)?) {
        (Some(false), _) | (_, Some(false)) => Ok(Value::Bool(false)),
        (Some(true), Some(true)) => Ok(Value::Bool(true)),
        _ => Ok(Value::Null),
    }
}

fn eval_or(left: &Value, right: &Value) -> Result<Value> {
    match (bool_operand(left)?, bool_operand(right)?) {
        (Some(true), _) | (_, Some(true)) => Ok(Value::Bool(true)),
        (Some(false), Some(false)) => Ok(Value::Bool(false)),
        _ => Ok(Value::Null),
    }
}

fn bool_operand(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(Error::invalid_operation(format!(
            "logical operator requires BOOL, got {}",
            other.data_type()
        ))),
    }
}

fn eval_comparison(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let ord = cmp_values(left, right).ok_or_else(|| {
        Error::invalid_operation(format!(
            "cannot compare {} with {}",
            left.data_type(),
            right.data_type()
        ))
    })?;
    let result = match op {
        BinaryOp::Eq => ord.is_eq(),
        BinaryOp::NotEq => ord.is_ne(),
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::LtEq => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        BinaryOp::GtEq => ord.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn eval_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => {
            let r = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                _ => unreachable!(),
            };
            r.map(Value::Int32).ok_or(Error::Overflow)
        }
        _ => match promote_pair(left, right)? {
            NumericPair::Int(a, b) => {
                let r = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    _ => unreachable!(),
                };
                r.map(Value::Int64).ok_or(Error::Overflow)
            }
            NumericPair::Float(a, b) => {
                let r = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    _ => unreachable!(),
                };
                Ok(Value::float64(r))
            }
            NumericPair::Decimal(a, b) => {
                let r = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    _ => unreachable!(),
                };
                r.map(Value::Numeric).ok_or(Error::Overflow)
            }
        },
    }
}

fn eval_div(left: &Value, right: &Value) -> Result<Value> {
    match promote_pair(left, right)? {
        NumericPair::Int(a, b) => {
            if b == 0 {
                return Err(Error::DivisionByZero);
            }
            Ok(Value::float64(a as f64 / b as f64))
        }
        NumericPair::Float(a, b) => {
            if b == 0.0 {
                return Err(Error::DivisionByZero);
            }
            Ok(Value::float64(a / b))
        }
        NumericPair::Decimal(a, b) => a
            .checked_div(b)
            .map(Value::Numeric)
            .ok_or(Error::DivisionByZero),
    }
}

fn eval_mod(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => {
            if *b == 0 {
                return Err(Error::DivisionByZero);
            }
            a.checked_rem(*b).map(Value::Int32).ok_or(Error::Overflow)
        }
        _ => match promote_pair(left, right)? {
            NumericPair::Int(a, b) => {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                a.checked_rem(b).map(Value::Int64).ok_or(Error::Overflow)
            }
            NumericPair::Float(a, b) => {
                if b == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                Ok(Value::float64(a % b))
            }
            NumericPair::Decimal(a, b) => a
                .checked_rem(b)
                .map(Value::Numeric)
                .ok_or(Error::DivisionByZero),
        },
    }
}

enum NumericPair {
    Int(i64, i64),
    Float(f64, f64),
    Decimal(Decimal, Decimal),
}

fn promote_pair(left: &Value, right: &Value) -> Result<NumericPair> {
    let pair = match (left, right) {
        (Value::Float64(_), _) | (_, Value::Float64(_)) => {
            NumericPair::Float(to_f64(left)?, to_f64(right)?)
        }
        (Value::Numeric(_), _) | (_, Value::Numeric(_)) => {
            NumericPair::Decimal(to_decimal(left)?, to_decimal(right)?)
        }
        _ => NumericPair::Int(to_i64(left)?, to_i64(right)?),
    };
    Ok(pair)
}

fn to_i64(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| non_numeric_operand(value))
}

fn to_f64(value: &Value) -> Result<f64> {
    match value {
        Value::Numeric(d) => {
            use rust_decimal::prelude::ToPrimitive;
            d.to_f64().ok_or(Error::Overflow)
        }
        _ => value.as_f64().ok_or_else(|| non_numeric_operand(value)),
    }
}

fn to_decimal(value: &Value) -> Result<Decimal> {
    match value {
        Value::Numeric(d) => Ok(*d),
        Value::Int32(v) => Ok(Decimal::from(*v)),
        Value::Int64(v) => Ok(Decimal::from(*v)),
        _ => Err(non_numeric_operand(value)),
    }
}

fn non_numeric_operand(value: &Value) -> Error {
    Error::invalid_operation(format!(
        "arithmetic requires numeric operands, got {}",
        value.data_type()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_width_addition() {
        let r = eval_binary(BinaryOp::Add, &Value::int32(1), &Value::int64(2)).unwrap();
        assert_eq!(r, Value::int64(3));
        let r = eval_binary(BinaryOp::Add, &Value::int32(1), &Value::int32(2)).unwrap();
        assert_eq!(r, Value::int32(3));
    }

    #[test]
    fn test_null_propagates_through_arithmetic() {
        let r = eval_binary(BinaryOp::Add, &Value::Null, &Value::int64(2)).unwrap();
        assert_eq!(r, Value::Null);
        let r = eval_binary(BinaryOp::Lt, &Value::int64(1), &Value::Null).unwrap();
        assert_eq!(r, Value::Null);
    }

    #[test]
    fn test_three_valued_logic() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(eval_binary(BinaryOp::And, &Value::Null, &f).unwrap(), f);
        assert_eq!(
            eval_binary(BinaryOp::And, &Value::Null, &t).unwrap(),
            Value::Null
        );
        assert_eq!(eval_binary(BinaryOp::Or, &Value::Null, &t).unwrap(), t);
        assert_eq!(
            eval_binary(BinaryOp::Or, &Value::Null, &f).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            eval_binary(BinaryOp::Div, &Value::int64(1), &Value::int64(0)),
            Err(Error::DivisionByZero)
        ));
        assert!(matches!(
            eval_binary(BinaryOp::Mod, &Value::int64(1), &Value::int64(0)),
            Err(Error::DivisionByZero)
        ));
    }

    #[test]
    fn test_overflow_is_reported() {
        assert!(matches!(
            eval_binary(BinaryOp::Add, &Value::int64(i64::MAX), &Value::int64(1)),
            Err(Error::Overflow)
        ));
    }

    #[test]
    fn test_modulo_keeps_integer_type() {
        let r = eval_binary(BinaryOp::Mod, &Value::int64(7), &Value::int64(2)).unwrap();
        assert_eq!(r, Value::int64(1));
    }

    #[test]
    fn test_numeric_arithmetic_stays_exact() {
        let a = Value::numeric(Decimal::new(105, 1)); // 10.5
        let b = Value::numeric(Decimal::new(25, 1)); // 2.5
        let r = eval_binary(BinaryOp::Add, &a, &b).unwrap();
        assert_eq!(r, Value::numeric(Decimal::new(130, 1)));
        let r = eval_binary(BinaryOp::Mul, &Value::int64(4), &b).unwrap();
        assert_eq!(r, Value::numeric(Decimal::new(100, 1)));
    }
}
