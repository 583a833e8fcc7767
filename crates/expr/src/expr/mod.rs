mod functions;
mod lambda;
mod operators;

pub use functions::ScalarFunction;
pub use lambda::{ExprId, LambdaFunction, NamedLambdaVariable};
pub use operators::{BinaryOp, UnaryOp};

use ketchsql_common::types::{DataType, Value};
use ketchsql_common::{Error, Result, Row};

use crate::higher_order::{
    ArrayAggregate, ArrayExists, ArrayFilter, ArrayTransform, HigherOrderExpr, MapFilter,
    MapZipWith,
};

/// An expression tree node.
///
/// Trees are immutable once built; the only mutable state anywhere in a
/// tree is the value slot inside a [`NamedLambdaVariable`], written by the
/// enclosing higher-order function during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Value,
        data_type: DataType,
    },

    /// Positional input-row access.
    Column {
        name: String,
        index: usize,
        data_type: DataType,
        nullable: bool,
    },

    /// A lambda-parameter reference as written, before binding has
    /// resolved it to a typed variable.
    UnresolvedVariable {
        name: String,
    },

    /// A bound lambda-parameter reference sharing its parameter's slot.
    Variable(NamedLambdaVariable),

    Lambda(LambdaFunction),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },

    Function {
        func: ScalarFunction,
        args: Vec<Expr>,
    },

    HigherOrder(Box<HigherOrderExpr>),
}

impl Expr {
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Literal { data_type, .. } => data_type.clone(),
            Expr::Column { data_type, .. } => data_type.clone(),
            Expr::UnresolvedVariable { .. } => DataType::Unknown,
            Expr::Variable(var) => var.data_type().clone(),
            Expr::Lambda(lambda) => lambda.data_type(),
            Expr::BinaryOp { left, op, right } => {
                op.result_type(&left.data_type(), &right.data_type())
            }
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Not => DataType::Bool,
                UnaryOp::Minus => expr.data_type(),
            },
            Expr::Function { func, args } => func.result_type(args),
            Expr::HigherOrder(hof) => hof.data_type(),
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            Expr::Literal { value, .. } => value.is_null(),
            Expr::Column { nullable, .. } => *nullable,
            Expr::UnresolvedVariable { .. } => true,
            Expr::Variable(var) => var.nullable(),
            Expr::Lambda(lambda) => lambda.nullable(),
            Expr::BinaryOp { left, right, .. } => left.nullable() || right.nullable(),
            Expr::UnaryOp { expr, .. } => expr.nullable(),
            Expr::Function { func, args } => func.nullable(args),
            Expr::HigherOrder(hof) => hof.nullable(),
        }
    }

    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal { .. }
            | Expr::Column { .. }
            | Expr::UnresolvedVariable { .. }
            | Expr::Variable(_) => Vec::new(),
            Expr::Lambda(lambda) => vec![lambda.body()],
            Expr::BinaryOp { left, right, .. } => vec![left, right],
            Expr::UnaryOp { expr, .. } => vec![expr],
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::HigherOrder(hof) => hof.children(),
        }
    }

    /// Whether every node in this tree has a known type. Unbound lambda
    /// parameters and unresolved variable references report `false`.
    pub fn resolved(&self) -> bool {
        match self {
            Expr::Literal { .. } | Expr::Column { .. } => true,
            Expr::UnresolvedVariable { .. } => false,
            Expr::Variable(var) => var.resolved(),
            Expr::Lambda(lambda) => lambda.resolved(),
            Expr::BinaryOp { left, right, .. } => left.resolved() && right.resolved(),
            Expr::UnaryOp { expr, .. } => expr.resolved(),
            Expr::Function { args, .. } => args.iter().all(Expr::resolved),
            Expr::HigherOrder(hof) => hof.resolved(),
        }
    }

    pub fn eval(&self, row: &Row) -> Result<Value> {
        match self {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Column { name, index, .. } => row.get(*index).cloned().ok_or_else(|| {
                Error::internal(format!("column {} (index {}) out of range", name, index))
            }),
            Expr::UnresolvedVariable { name } => Err(Error::internal(format!(
                "unresolved lambda variable {}",
                name
            ))),
            Expr::Variable(var) => var.eval(row),
            Expr::Lambda(lambda) => lambda.eval(row),
            Expr::BinaryOp { left, op, right } => {
                let left = left.eval(row)?;
                let right = right.eval(row)?;
                operators::eval_binary(*op, &left, &right)
            }
            Expr::UnaryOp { op, expr } => {
                let value = expr.eval(row)?;
                operators::eval_unary(*op, &value)
            }
            Expr::Function { func, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(row))
                    .collect::<Result<Vec<_>>>()?;
                func.eval(&values)
            }
            Expr::HigherOrder(hof) => hof.eval(row),
        }
    }

    /// Rebuilds this node with each direct child passed through `f`.
    pub fn map_children<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Expr, E> {
        Ok(match self {
            leaf @ (Expr::Literal { .. }
            | Expr::Column { .. }
            | Expr::UnresolvedVariable { .. }
            | Expr::Variable(_)) => leaf,
            Expr::Lambda(lambda) => {
                let (params, body, hidden) = lambda.into_parts();
                Expr::Lambda(LambdaFunction::new(params, f(body)?, hidden))
            }
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(f(*left)?),
                op,
                right: Box::new(f(*right)?),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op,
                expr: Box::new(f(*expr)?),
            },
            Expr::Function { func, args } => Expr::Function {
                func,
                args: args
                    .into_iter()
                    .map(|arg| f(arg))
                    .collect::<std::result::Result<Vec<_>, E>>()?,
            },
            Expr::HigherOrder(hof) => Expr::HigherOrder(Box::new((*hof).map_exprs(f)?)),
        })
    }

    /// Bottom-up rewrite: children first, then the rebuilt node itself.
    pub fn try_transform_up<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Expr, E> {
        let transformed = self.map_children(&mut |child| child.try_transform_up(&mut *f))?;
        f(transformed)
    }

    pub fn transform_up(self, f: &mut dyn FnMut(Expr) -> Expr) -> Expr {
        let result: std::result::Result<Expr, std::convert::Infallible> =
            self.try_transform_up(&mut |e| Ok(f(e)));
        match result {
            Ok(expr) => expr,
            Err(never) => match never {},
        }
    }

    /// A copy safe to evaluate independently of `self`: every lambda in
    /// the tree gets fresh parameter instances and a rewired body.
    pub fn new_instance(self) -> Expr {
        self.transform_up(&mut |e| match e {
            Expr::Lambda(lambda) => Expr::Lambda(lambda.new_instance()),
            other => other,
        })
    }
}

/// Constructor shorthands.
impl Expr {
    pub fn literal(value: Value) -> Self {
        let data_type = value.data_type();
        Expr::Literal { value, data_type }
    }

    pub fn literal_null(data_type: DataType) -> Self {
        Expr::Literal {
            value: Value::Null,
            data_type,
        }
    }

    pub fn literal_bool(v: bool) -> Self {
        Expr::literal(Value::bool_val(v))
    }

    pub fn literal_i32(v: i32) -> Self {
        Expr::literal(Value::int32(v))
    }

    pub fn literal_i64(v: i64) -> Self {
        Expr::literal(Value::int64(v))
    }

    pub fn literal_f64(v: f64) -> Self {
        Expr::literal(Value::float64(v))
    }

    pub fn literal_string(v: impl Into<String>) -> Self {
        Expr::literal(Value::string(v))
    }

    /// An array literal with an explicit element type; the element
    /// nullability flag is derived from the values.
    pub fn array_literal(element: DataType, items: Vec<Value>) -> Self {
        let contains_null = items.iter().any(Value::is_null);
        Expr::Literal {
            value: Value::array(items),
            data_type: DataType::array(element, contains_null),
        }
    }

    /// A map literal with explicit key/value types.
    pub fn map_literal(
        key: DataType,
        value: DataType,
        keys: Vec<Value>,
        values: Vec<Value>,
    ) -> Self {
        let value_contains_null = values.iter().any(Value::is_null);
        Expr::Literal {
            value: Value::map(keys, values),
            data_type: DataType::map(key, value, value_contains_null),
        }
    }

    pub fn column(
        name: impl Into<String>,
        index: usize,
        data_type: DataType,
        nullable: bool,
    ) -> Self {
        Expr::Column {
            name: name.into(),
            index,
            data_type,
            nullable,
        }
    }

    pub fn unresolved_variable(name: impl Into<String>) -> Self {
        Expr::UnresolvedVariable { name: name.into() }
    }

    /// An unbound lambda as the analyzer would produce it: named
    /// parameters of unknown type over a body that refers to them through
    /// [`Expr::UnresolvedVariable`].
    pub fn lambda<S: Into<String>>(params: impl IntoIterator<Item = S>, body: Expr) -> Self {
        Expr::Lambda(LambdaFunction::unbound(params, body))
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn function(func: ScalarFunction, args: Vec<Expr>) -> Self {
        Expr::Function { func, args }
    }

    pub fn array_transform(array: Expr, function: Expr) -> Self {
        Expr::HigherOrder(Box::new(HigherOrderExpr::Transform(ArrayTransform::new(
            array, function,
        ))))
    }

    pub fn array_filter(array: Expr, function: Expr) -> Self {
        Expr::HigherOrder(Box::new(HigherOrderExpr::Filter(ArrayFilter::new(
            array, function,
        ))))
    }

    pub fn array_exists(array: Expr, function: Expr) -> Self {
        Expr::HigherOrder(Box::new(HigherOrderExpr::Exists(ArrayExists::new(
            array, function,
        ))))
    }

    pub fn array_aggregate(array: Expr, zero: Expr, merge: Expr) -> Self {
        Expr::HigherOrder(Box::new(HigherOrderExpr::Aggregate(ArrayAggregate::new(
            array, zero, merge,
        ))))
    }

    pub fn array_aggregate_with_finish(array: Expr, zero: Expr, merge: Expr, finish: Expr) -> Self {
        Expr::HigherOrder(Box::new(HigherOrderExpr::Aggregate(
            ArrayAggregate::with_finish(array, zero, merge, finish),
        )))
    }

    pub fn map_filter(map: Expr, function: Expr) -> Self {
        Expr::HigherOrder(Box::new(HigherOrderExpr::MapFilter(MapFilter::new(
            map, function,
        ))))
    }

    pub fn map_zip_with(left: Expr, right: Expr, function: Expr) -> Self {
        Expr::HigherOrder(Box::new(HigherOrderExpr::MapZipWith(MapZipWith::new(
            left, right, function,
        ))))
    }
}
