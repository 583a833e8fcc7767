mod array;
mod map;

pub use array::{ArrayAggregate, ArrayExists, ArrayFilter, ArrayTransform};
pub use map::{MapFilter, MapZipWith, MAX_MAP_KEYS};

use ketchsql_common::types::{DataType, Value};
use ketchsql_common::{Error, Result, Row};

use crate::expr::{Expr, LambdaFunction};

/// Callback supplied by the binder driver. Given a lambda as written and
/// the parameter schema the enclosing operator expects, it returns the
/// lambda with fresh, fully-typed parameters and a body whose references
/// point at them.
pub type LambdaBinder<'a> =
    dyn FnMut(LambdaFunction, &[(DataType, bool)]) -> Result<LambdaFunction> + 'a;

/// Outcome of an operator's post-bind input check.
#[derive(Debug, Clone)]
pub enum TypeCheckResult {
    Success,
    Failure(Error),
}

impl TypeCheckResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TypeCheckResult::Success)
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            TypeCheckResult::Success => Ok(()),
            TypeCheckResult::Failure(err) => Err(err),
        }
    }
}

/// Shared behavior of the higher-order operators: the argument/function
/// split, the resolution predicate, and the bind step that stamps
/// parameter types computed from argument types onto each owned lambda.
pub trait HigherOrderFunction: Sized {
    /// Non-lambda data inputs, in order.
    fn arguments(&self) -> Vec<&Expr>;

    /// Lambda inputs, in order. Entries are expected to be
    /// [`Expr::Lambda`]; anything else fails at bind time.
    fn functions(&self) -> Vec<&Expr>;

    fn data_type(&self) -> DataType;

    fn nullable(&self) -> bool;

    /// Replaces each owned lambda with the result of `binder`, passing
    /// the parameter schema derived from this operator's argument types.
    /// Requires the arguments to be resolved.
    fn bind(self, binder: &mut LambdaBinder<'_>) -> Result<Self>;

    /// Input validation that needs bound lambdas (body result types,
    /// accumulator agreement, key orderability).
    fn check_input_data_types(&self) -> TypeCheckResult;

    fn eval(&self, row: &Row) -> Result<Value>;

    fn arguments_resolved(&self) -> bool {
        self.arguments().iter().all(|e| e.resolved())
    }

    /// Whether every function slot already holds a lambda with typed
    /// parameters (the post-bind state).
    fn functions_bound(&self) -> bool {
        self.functions()
            .iter()
            .all(|e| matches!(e, Expr::Lambda(lambda) if lambda.params_resolved()))
    }

    fn resolved(&self) -> bool {
        self.arguments_resolved()
            && self
                .functions()
                .iter()
                .all(|e| matches!(e, Expr::Lambda(lambda) if lambda.resolved()))
    }
}

/// One of the six higher-order operators.
#[derive(Debug, Clone, PartialEq)]
pub enum HigherOrderExpr {
    Transform(ArrayTransform),
    Filter(ArrayFilter),
    Exists(ArrayExists),
    Aggregate(ArrayAggregate),
    MapFilter(MapFilter),
    MapZipWith(MapZipWith),
}

impl HigherOrderExpr {
    pub fn arguments(&self) -> Vec<&Expr> {
        match self {
            HigherOrderExpr::Transform(op) => op.arguments(),
            HigherOrderExpr::Filter(op) => op.arguments(),
            HigherOrderExpr::Exists(op) => op.arguments(),
            HigherOrderExpr::Aggregate(op) => op.arguments(),
            HigherOrderExpr::MapFilter(op) => op.arguments(),
            HigherOrderExpr::MapZipWith(op) => op.arguments(),
        }
    }

    pub fn functions(&self) -> Vec<&Expr> {
        match self {
            HigherOrderExpr::Transform(op) => op.functions(),
            HigherOrderExpr::Filter(op) => op.functions(),
            HigherOrderExpr::Exists(op) => op.functions(),
            HigherOrderExpr::Aggregate(op) => op.functions(),
            HigherOrderExpr::MapFilter(op) => op.functions(),
            HigherOrderExpr::MapZipWith(op) => op.functions(),
        }
    }

    pub fn children(&self) -> Vec<&Expr> {
        let mut children = self.arguments();
        children.extend(self.functions());
        children
    }

    pub fn data_type(&self) -> DataType {
        match self {
            HigherOrderExpr::Transform(op) => op.data_type(),
            HigherOrderExpr::Filter(op) => op.data_type(),
            HigherOrderExpr::Exists(op) => op.data_type(),
            HigherOrderExpr::Aggregate(op) => op.data_type(),
            HigherOrderExpr::MapFilter(op) => op.data_type(),
            HigherOrderExpr::MapZipWith(op) => op.data_type(),
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            HigherOrderExpr::Transform(op) => op.nullable(),
            HigherOrderExpr::Filter(op) => op.nullable(),
            HigherOrderExpr::Exists(op) => op.nullable(),
            HigherOrderExpr::Aggregate(op) => op.nullable(),
            HigherOrderExpr::MapFilter(op) => op.nullable(),
            HigherOrderExpr::MapZipWith(op) => op.nullable(),
        }
    }

    pub fn resolved(&self) -> bool {
        match self {
            HigherOrderExpr::Transform(op) => op.resolved(),
            HigherOrderExpr::Filter(op) => op.resolved(),
            HigherOrderExpr::Exists(op) => op.resolved(),
            HigherOrderExpr::Aggregate(op) => op.resolved(),
            HigherOrderExpr::MapFilter(op) => op.resolved(),
            HigherOrderExpr::MapZipWith(op) => op.resolved(),
        }
    }

    pub fn arguments_resolved(&self) -> bool {
        match self {
            HigherOrderExpr::Transform(op) => op.arguments_resolved(),
            HigherOrderExpr::Filter(op) => op.arguments_resolved(),
            HigherOrderExpr::Exists(op) => op.arguments_resolved(),
            HigherOrderExpr::Aggregate(op) => op.arguments_resolved(),
            HigherOrderExpr::MapFilter(op) => op.arguments_resolved(),
            HigherOrderExpr::MapZipWith(op) => op.arguments_resolved(),
        }
    }

    pub fn functions_bound(&self) -> bool {
        match self {
            HigherOrderExpr::Transform(op) => op.functions_bound(),
            HigherOrderExpr::Filter(op) => op.functions_bound(),
            HigherOrderExpr::Exists(op) => op.functions_bound(),
            HigherOrderExpr::Aggregate(op) => op.functions_bound(),
            HigherOrderExpr::MapFilter(op) => op.functions_bound(),
            HigherOrderExpr::MapZipWith(op) => op.functions_bound(),
        }
    }

    pub fn bind(self, binder: &mut LambdaBinder<'_>) -> Result<Self> {
        Ok(match self {
            HigherOrderExpr::Transform(op) => HigherOrderExpr::Transform(op.bind(binder)?),
            HigherOrderExpr::Filter(op) => HigherOrderExpr::Filter(op.bind(binder)?),
            HigherOrderExpr::Exists(op) => HigherOrderExpr::Exists(op.bind(binder)?),
            HigherOrderExpr::Aggregate(op) => HigherOrderExpr::Aggregate(op.bind(binder)?),
            HigherOrderExpr::MapFilter(op) => HigherOrderExpr::MapFilter(op.bind(binder)?),
            HigherOrderExpr::MapZipWith(op) => HigherOrderExpr::MapZipWith(op.bind(binder)?),
        })
    }

    pub fn check_input_data_types(&self) -> TypeCheckResult {
        match self {
            HigherOrderExpr::Transform(op) => op.check_input_data_types(),
            HigherOrderExpr::Filter(op) => op.check_input_data_types(),
            HigherOrderExpr::Exists(op) => op.check_input_data_types(),
            HigherOrderExpr::Aggregate(op) => op.check_input_data_types(),
            HigherOrderExpr::MapFilter(op) => op.check_input_data_types(),
            HigherOrderExpr::MapZipWith(op) => op.check_input_data_types(),
        }
    }

    pub fn eval(&self, row: &Row) -> Result<Value> {
        match self {
            HigherOrderExpr::Transform(op) => op.eval(row),
            HigherOrderExpr::Filter(op) => op.eval(row),
            HigherOrderExpr::Exists(op) => op.eval(row),
            HigherOrderExpr::Aggregate(op) => op.eval(row),
            HigherOrderExpr::MapFilter(op) => op.eval(row),
            HigherOrderExpr::MapZipWith(op) => op.eval(row),
        }
    }

    pub(crate) fn try_map_arguments<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(match self {
            HigherOrderExpr::Transform(op) => HigherOrderExpr::Transform(op.try_map_arguments(f)?),
            HigherOrderExpr::Filter(op) => HigherOrderExpr::Filter(op.try_map_arguments(f)?),
            HigherOrderExpr::Exists(op) => HigherOrderExpr::Exists(op.try_map_arguments(f)?),
            HigherOrderExpr::Aggregate(op) => HigherOrderExpr::Aggregate(op.try_map_arguments(f)?),
            HigherOrderExpr::MapFilter(op) => HigherOrderExpr::MapFilter(op.try_map_arguments(f)?),
            HigherOrderExpr::MapZipWith(op) => {
                HigherOrderExpr::MapZipWith(op.try_map_arguments(f)?)
            }
        })
    }

    pub(crate) fn try_map_functions<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(match self {
            HigherOrderExpr::Transform(op) => HigherOrderExpr::Transform(op.try_map_functions(f)?),
            HigherOrderExpr::Filter(op) => HigherOrderExpr::Filter(op.try_map_functions(f)?),
            HigherOrderExpr::Exists(op) => HigherOrderExpr::Exists(op.try_map_functions(f)?),
            HigherOrderExpr::Aggregate(op) => HigherOrderExpr::Aggregate(op.try_map_functions(f)?),
            HigherOrderExpr::MapFilter(op) => HigherOrderExpr::MapFilter(op.try_map_functions(f)?),
            HigherOrderExpr::MapZipWith(op) => {
                HigherOrderExpr::MapZipWith(op.try_map_functions(f)?)
            }
        })
    }

    pub(crate) fn map_exprs<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        self.try_map_arguments(&mut *f)?.try_map_functions(f)
    }
}

/// Element type and nullability of an array-typed argument.
pub(crate) fn array_element_type(expr: &Expr, index: usize) -> Result<(DataType, bool)> {
    match expr.data_type() {
        DataType::Array {
            element,
            contains_null,
        } => Ok((*element, contains_null)),
        other => Err(Error::argument_type_mismatch(
            index,
            "ARRAY",
            other.to_string(),
        )),
    }
}

/// Key type, value type and value nullability of a map-typed argument.
pub(crate) fn map_entry_types(expr: &Expr, index: usize) -> Result<(DataType, DataType, bool)> {
    match expr.data_type() {
        DataType::Map {
            key,
            value,
            value_contains_null,
        } => Ok((*key, *value, value_contains_null)),
        other => Err(Error::argument_type_mismatch(
            index,
            "MAP",
            other.to_string(),
        )),
    }
}

/// Unwraps a function-position child into a lambda, for binding.
pub(crate) fn take_lambda(expr: Expr, index: usize) -> Result<LambdaFunction> {
    match expr {
        Expr::Lambda(lambda) => Ok(lambda),
        other => Err(Error::argument_type_mismatch(
            index,
            "LAMBDA",
            other.data_type().to_string(),
        )),
    }
}

/// Borrows a bound lambda for evaluation.
pub(crate) fn bound_lambda<'a>(expr: &'a Expr, operator: &str) -> Result<&'a LambdaFunction> {
    match expr {
        Expr::Lambda(lambda) if lambda.params_resolved() => Ok(lambda),
        _ => Err(Error::internal(format!("{} lambda is not bound", operator))),
    }
}

/// Predicate evaluation: only a true boolean counts as a match; a null
/// result is a non-match by contract.
pub(crate) fn predicate_matches(lambda: &LambdaFunction, row: &Row) -> Result<bool> {
    Ok(matches!(lambda.eval(row)?, Value::Bool(true)))
}

/// Predicate lambdas must produce booleans.
pub(crate) fn check_boolean_body(function: &Expr) -> TypeCheckResult {
    match function {
        Expr::Lambda(lambda) if lambda.data_type() == DataType::Bool => TypeCheckResult::Success,
        Expr::Lambda(lambda) => TypeCheckResult::Failure(Error::type_mismatch(
            "BOOL",
            lambda.data_type().to_string(),
        )),
        other => TypeCheckResult::Failure(Error::argument_type_mismatch(
            1,
            "LAMBDA",
            other.data_type().to_string(),
        )),
    }
}
