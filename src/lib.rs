//! KetchSQL - higher-order expression evaluation core for a SQL engine.

pub use ketchsql_common::error::{Error, Result};
pub use ketchsql_common::result::Row;
pub use ketchsql_common::types::{DataType, MapValue, Value};
pub use ketchsql_expr::{
    bind_lambda_functions, ArrayAggregate, ArrayExists, ArrayFilter, ArrayTransform, BinaryOp,
    Expr, ExprId, HigherOrderExpr, HigherOrderFunction, LambdaFunction, MapFilter, MapZipWith,
    NamedLambdaVariable, ScalarFunction, TypeCheckResult, UnaryOp, MAX_MAP_KEYS,
};
