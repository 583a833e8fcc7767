use ketchsql_common::types::coercion::common_super_type;
use ketchsql_common::types::{DataType, Value};
use ketchsql_common::{Error, Result};

use super::Expr;

/// Scalar functions available inside lambda bodies. This is the minimum
/// vocabulary the evaluator needs; it is not a full function registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFunction {
    Concat,
    Coalesce,
    Abs,
    Upper,
    Lower,
    Length,
}

impl ScalarFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunction::Concat => "CONCAT",
            ScalarFunction::Coalesce => "COALESCE",
            ScalarFunction::Abs => "ABS",
            ScalarFunction::Upper => "UPPER",
            ScalarFunction::Lower => "LOWER",
            ScalarFunction::Length => "LENGTH",
        }
    }

    pub fn result_type(&self, args: &[Expr]) -> DataType {
        match self {
            ScalarFunction::Concat | ScalarFunction::Upper | ScalarFunction::Lower => {
                DataType::String
            }
            ScalarFunction::Length => DataType::Int64,
            ScalarFunction::Abs => args
                .first()
                .map(Expr::data_type)
                .unwrap_or(DataType::Unknown),
            ScalarFunction::Coalesce => args
                .iter()
                .map(Expr::data_type)
                .reduce(|a, b| common_super_type(&a, &b).unwrap_or(DataType::Unknown))
                .unwrap_or(DataType::Unknown),
        }
    }

    pub fn nullable(&self, args: &[Expr]) -> bool {
        match self {
            // COALESCE is null only when every branch is.
            ScalarFunction::Coalesce => args.iter().all(Expr::nullable),
            _ => args.iter().any(Expr::nullable),
        }
    }

    pub fn eval(&self, args: &[Value]) -> Result<Value> {
        match self {
            ScalarFunction::Concat => {
                let mut out = String::new();
                for arg in args {
                    match arg {
                        Value::Null => return Ok(Value::Null),
                        Value::String(s) => out.push_str(s),
                        other => {
                            return Err(Error::invalid_operation(format!(
                                "CONCAT requires STRING arguments, got {}",
                                other.data_type()
                            )))
                        }
                    }
                }
                Ok(Value::string(out))
            }
            ScalarFunction::Coalesce => Ok(args
                .iter()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null)),
            ScalarFunction::Abs => match single(args, self.name())? {
                Value::Null => Ok(Value::Null),
                Value::Int32(v) => v.checked_abs().map(Value::Int32).ok_or(Error::Overflow),
                Value::Int64(v) => v.checked_abs().map(Value::Int64).ok_or(Error::Overflow),
                Value::Float64(v) => Ok(Value::float64(v.abs())),
                Value::Numeric(d) => Ok(Value::Numeric(d.abs())),
                other => Err(Error::invalid_operation(format!(
                    "ABS requires a numeric argument, got {}",
                    other.data_type()
                ))),
            },
            ScalarFunction::Upper => string_arg(args, self.name(), |s| s.to_uppercase()),
            ScalarFunction::Lower => string_arg(args, self.name(), |s| s.to_lowercase()),
            ScalarFunction::Length => match single(args, self.name())? {
                Value::Null => Ok(Value::Null),
                Value::String(s) => Ok(Value::int64(s.chars().count() as i64)),
                Value::Bytes(b) => Ok(Value::int64(b.len() as i64)),
                other => Err(Error::invalid_operation(format!(
                    "LENGTH requires STRING or BYTES, got {}",
                    other.data_type()
                ))),
            },
        }
    }
}

fn single<'a>(args: &'a [Value], name: &str) -> Result<&'a Value> {
    match args {
        [value] => Ok(value),
        _ => Err(Error::invalid_operation(format!(
            "{} takes exactly one argument",
            name
        ))),
    }
}

fn string_arg(args: &[Value], name: &str, f: impl Fn(&str) -> String) -> Result<Value> {
    match single(args, name)? {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::string(f(s))),
        other => Err(Error::invalid_operation(format!(
            "{} requires a STRING argument, got {}",
            name,
            other.data_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_null_propagation() {
        let r = ScalarFunction::Concat
            .eval(&[Value::string("a"), Value::Null])
            .unwrap();
        assert_eq!(r, Value::Null);
        let r = ScalarFunction::Concat
            .eval(&[Value::string("a"), Value::string("b")])
            .unwrap();
        assert_eq!(r, Value::string("ab"));
    }

    #[test]
    fn test_coalesce_first_non_null() {
        let r = ScalarFunction::Coalesce
            .eval(&[Value::Null, Value::string("x"), Value::string("y")])
            .unwrap();
        assert_eq!(r, Value::string("x"));
        let r = ScalarFunction::Coalesce.eval(&[Value::Null]).unwrap();
        assert_eq!(r, Value::Null);
    }

    #[test]
    fn test_length_counts_chars() {
        let r = ScalarFunction::Length.eval(&[Value::string("héllo")]).unwrap();
        assert_eq!(r, Value::int64(5));
    }
}
