//! Expression trees, lambda binding and higher-order functions for
//! KetchSQL.
//!
//! The entry points are the constructor shorthands on [`Expr`], the
//! [`binder::bind_lambda_functions`] driver that types every lambda in a
//! tree, and [`Expr::eval`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
#![allow(missing_docs)]

pub mod binder;
pub mod expr;
pub mod higher_order;

pub use binder::{bind_lambda, bind_lambda_functions};
pub use expr::{
    BinaryOp, Expr, ExprId, LambdaFunction, NamedLambdaVariable, ScalarFunction, UnaryOp,
};
pub use higher_order::{
    ArrayAggregate, ArrayExists, ArrayFilter, ArrayTransform, HigherOrderExpr,
    HigherOrderFunction, MapFilter, MapZipWith, TypeCheckResult, MAX_MAP_KEYS,
};
