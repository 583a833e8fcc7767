use ketchsql_common::types::{DataType, Value};
use ketchsql_common::{Error, Result, Row};

use crate::expr::{Expr, LambdaFunction};

use super::{
    array_element_type, bound_lambda, check_boolean_body, predicate_matches, take_lambda,
    HigherOrderFunction, LambdaBinder, TypeCheckResult,
};

/// `transform(array, x -> ...)` / `transform(array, (x, i) -> ...)`:
/// applies the lambda to every element, passing the zero-based position
/// as a second argument when the lambda declares one.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayTransform {
    argument: Box<Expr>,
    function: Box<Expr>,
}

impl ArrayTransform {
    pub fn new(argument: Expr, function: Expr) -> Self {
        Self {
            argument: Box::new(argument),
            function: Box::new(function),
        }
    }

    pub fn argument(&self) -> &Expr {
        &self.argument
    }

    pub fn function(&self) -> &Expr {
        &self.function
    }

    pub(crate) fn try_map_arguments<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: Box::new(f(*self.argument)?),
            function: self.function,
        })
    }

    pub(crate) fn try_map_functions<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: self.argument,
            function: Box::new(f(*self.function)?),
        })
    }
}

impl HigherOrderFunction for ArrayTransform {
    fn arguments(&self) -> Vec<&Expr> {
        vec![&self.argument]
    }

    fn functions(&self) -> Vec<&Expr> {
        vec![&self.function]
    }

    fn data_type(&self) -> DataType {
        DataType::array(self.function.data_type(), self.function.nullable())
    }

    fn nullable(&self) -> bool {
        self.argument.nullable()
    }

    fn bind(self, binder: &mut LambdaBinder<'_>) -> Result<Self> {
        let (element, contains_null) = array_element_type(&self.argument, 0)?;
        let lambda = take_lambda(*self.function, 1)?;
        // The element-plus-index form is selected by the arity the user
        // wrote; anything beyond two parameters fails in the binder.
        let expected: Vec<(DataType, bool)> = if lambda.params().len() == 2 {
            vec![(element, contains_null), (DataType::Int32, false)]
        } else {
            vec![(element, contains_null)]
        };
        let bound = binder(lambda, &expected)?;
        Ok(Self {
            argument: self.argument,
            function: Box::new(Expr::Lambda(bound)),
        })
    }

    fn check_input_data_types(&self) -> TypeCheckResult {
        match self.argument.data_type() {
            DataType::Array { .. } => TypeCheckResult::Success,
            other => TypeCheckResult::Failure(Error::argument_type_mismatch(
                0,
                "ARRAY",
                other.to_string(),
            )),
        }
    }

    fn eval(&self, row: &Row) -> Result<Value> {
        let lambda = bound_lambda(&self.function, "transform")?;
        let value = self.argument.eval(row)?;
        let Some(items) = value.as_array() else {
            return Ok(Value::Null);
        };
        let (element_var, index_var) = match lambda.params() {
            [element] => (element, None),
            [element, index] => (element, Some(index)),
            _ => {
                return Err(Error::internal(
                    "transform lambda takes one or two arguments",
                ))
            }
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            element_var.set(item.clone());
            if let Some(index) = index_var {
                index.set(Value::int32(i as i32));
            }
            out.push(lambda.eval(row)?);
        }
        Ok(Value::array(out))
    }
}

/// `filter(array, x -> pred)`: keeps the elements the predicate accepts,
/// preserving their order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayFilter {
    argument: Box<Expr>,
    function: Box<Expr>,
}

impl ArrayFilter {
    pub fn new(argument: Expr, function: Expr) -> Self {
        Self {
            argument: Box::new(argument),
            function: Box::new(function),
        }
    }

    pub fn argument(&self) -> &Expr {
        &self.argument
    }

    pub fn function(&self) -> &Expr {
        &self.function
    }

    pub(crate) fn try_map_arguments<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: Box::new(f(*self.argument)?),
            function: self.function,
        })
    }

    pub(crate) fn try_map_functions<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: self.argument,
            function: Box::new(f(*self.function)?),
        })
    }
}

impl HigherOrderFunction for ArrayFilter {
    fn arguments(&self) -> Vec<&Expr> {
        vec![&self.argument]
    }

    fn functions(&self) -> Vec<&Expr> {
        vec![&self.function]
    }

    fn data_type(&self) -> DataType {
        self.argument.data_type()
    }

    fn nullable(&self) -> bool {
        self.argument.nullable()
    }

    fn bind(self, binder: &mut LambdaBinder<'_>) -> Result<Self> {
        let (element, contains_null) = array_element_type(&self.argument, 0)?;
        let lambda = take_lambda(*self.function, 1)?;
        let bound = binder(lambda, &[(element, contains_null)])?;
        Ok(Self {
            argument: self.argument,
            function: Box::new(Expr::Lambda(bound)),
        })
    }

    fn check_input_data_types(&self) -> TypeCheckResult {
        match self.argument.data_type() {
            DataType::Array { .. } => check_boolean_body(&self.function),
            other => TypeCheckResult::Failure(Error::argument_type_mismatch(
                0,
                "ARRAY",
                other.to_string(),
            )),
        }
    }

    fn eval(&self, row: &Row) -> Result<Value> {
        let lambda = bound_lambda(&self.function, "filter")?;
        let value = self.argument.eval(row)?;
        let Some(items) = value.as_array() else {
            return Ok(Value::Null);
        };
        let [element_var] = lambda.params() else {
            return Err(Error::internal("filter lambda takes one argument"));
        };
        let mut out = Vec::new();
        for item in items {
            element_var.set(item.clone());
            if predicate_matches(lambda, row)? {
                out.push(item.clone());
            }
        }
        Ok(Value::array(out))
    }
}

/// `exists(array, x -> pred)`: true as soon as one element matches,
/// false otherwise. Scans short-circuit on the first match.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExists {
    argument: Box<Expr>,
    function: Box<Expr>,
}

impl ArrayExists {
    pub fn new(argument: Expr, function: Expr) -> Self {
        Self {
            argument: Box::new(argument),
            function: Box::new(function),
        }
    }

    pub fn argument(&self) -> &Expr {
        &self.argument
    }

    pub fn function(&self) -> &Expr {
        &self.function
    }

    pub(crate) fn try_map_arguments<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: Box::new(f(*self.argument)?),
            function: self.function,
        })
    }

    pub(crate) fn try_map_functions<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: self.argument,
            function: Box::new(f(*self.function)?),
        })
    }
}

impl HigherOrderFunction for ArrayExists {
    fn arguments(&self) -> Vec<&Expr> {
        vec![&self.argument]
    }

    fn functions(&self) -> Vec<&Expr> {
        vec![&self.function]
    }

    fn data_type(&self) -> DataType {
        DataType::Bool
    }

    fn nullable(&self) -> bool {
        self.argument.nullable()
    }

    fn bind(self, binder: &mut LambdaBinder<'_>) -> Result<Self> {
        let (element, contains_null) = array_element_type(&self.argument, 0)?;
        let lambda = take_lambda(*self.function, 1)?;
        let bound = binder(lambda, &[(element, contains_null)])?;
        Ok(Self {
            argument: self.argument,
            function: Box::new(Expr::Lambda(bound)),
        })
    }

    fn check_input_data_types(&self) -> TypeCheckResult {
        match self.argument.data_type() {
            DataType::Array { .. } => check_boolean_body(&self.function),
            other => TypeCheckResult::Failure(Error::argument_type_mismatch(
                0,
                "ARRAY",
                other.to_string(),
            )),
        }
    }

    fn eval(&self, row: &Row) -> Result<Value> {
        let lambda = bound_lambda(&self.function, "exists")?;
        let value = self.argument.eval(row)?;
        let Some(items) = value.as_array() else {
            return Ok(Value::Null);
        };
        let [element_var] = lambda.params() else {
            return Err(Error::internal("exists lambda takes one argument"));
        };
        for item in items {
            element_var.set(item.clone());
            if predicate_matches(lambda, row)? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    }
}

/// `aggregate(array, zero, (acc, x) -> ..., acc -> ...)`: left-fold of
/// the merge lambda from `zero`, passed through the finish lambda. The
/// finish step defaults to the hidden identity lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayAggregate {
    argument: Box<Expr>,
    zero: Box<Expr>,
    merge: Box<Expr>,
    finish: Box<Expr>,
}

impl ArrayAggregate {
    pub fn new(argument: Expr, zero: Expr, merge: Expr) -> Self {
        Self::with_finish(
            argument,
            zero,
            merge,
            Expr::Lambda(LambdaFunction::identity()),
        )
    }

    pub fn with_finish(argument: Expr, zero: Expr, merge: Expr, finish: Expr) -> Self {
        Self {
            argument: Box::new(argument),
            zero: Box::new(zero),
            merge: Box::new(merge),
            finish: Box::new(finish),
        }
    }

    pub fn argument(&self) -> &Expr {
        &self.argument
    }

    pub fn zero(&self) -> &Expr {
        &self.zero
    }

    pub fn merge(&self) -> &Expr {
        &self.merge
    }

    pub fn finish(&self) -> &Expr {
        &self.finish
    }

    pub(crate) fn try_map_arguments<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: Box::new(f(*self.argument)?),
            zero: Box::new(f(*self.zero)?),
            merge: self.merge,
            finish: self.finish,
        })
    }

    pub(crate) fn try_map_functions<E>(
        self,
        f: &mut dyn FnMut(Expr) -> std::result::Result<Expr, E>,
    ) -> std::result::Result<Self, E> {
        Ok(Self {
            argument: self.argument,
            zero: self.zero,
            merge: Box::new(f(*self.merge)?),
            finish: Box::new(f(*self.finish)?),
        })
    }
}

impl HigherOrderFunction for ArrayAggregate {
    fn arguments(&self) -> Vec<&Expr> {
        vec![&self.argument, &self.zero]
    }

    fn functions(&self) -> Vec<&Expr> {
        vec![&self.merge, &self.finish]
    }

    fn data_type(&self) -> DataType {
        self.finish.data_type()
    }

    fn nullable(&self) -> bool {
        self.argument.nullable() || self.finish.nullable()
    }

    fn bind(self, binder: &mut LambdaBinder<'_>) -> Result<Self> {
        let (element, contains_null) = array_element_type(&self.argument, 0)?;
        let zero_type = self.zero.data_type();

        // The accumulator is conservatively nullable: merge may produce
        // null even when zero cannot.
        let merge = take_lambda(*self.merge, 2)?;
        let merge = binder(merge, &[(zero_type.clone(), true), (element, contains_null)])?;

        let finish = take_lambda(*self.finish, 3)?;
        let finish = binder(finish, &[(zero_type, true)])?;

        Ok(Self {
            argument: self.argument,
            zero: self.zero,
            merge: Box::new(Expr::Lambda(merge)),
            finish: Box::new(Expr::Lambda(finish)),
        })
    }

    fn check_input_data_types(&self) -> TypeCheckResult {
        let zero_type = self.zero.data_type();
        let merge_type = self.merge.data_type();
        if zero_type.equals_structurally(&merge_type, true) {
            TypeCheckResult::Success
        } else {
            TypeCheckResult::Failure(Error::AccumulatorTypeMismatch {
                zero: zero_type.to_string(),
                merge: merge_type.to_string(),
            })
        }
    }

    fn eval(&self, row: &Row) -> Result<Value> {
        let merge = bound_lambda(&self.merge, "aggregate merge")?;
        let finish = bound_lambda(&self.finish, "aggregate finish")?;
        let value = self.argument.eval(row)?;
        let Some(items) = value.as_array() else {
            return Ok(Value::Null);
        };
        let [acc_var, element_var] = merge.params() else {
            return Err(Error::internal("aggregate merge lambda takes two arguments"));
        };
        let [finish_var] = finish.params() else {
            return Err(Error::internal("aggregate finish lambda takes one argument"));
        };
        acc_var.set(self.zero.eval(row)?);
        for item in items {
            element_var.set(item.clone());
            let next = merge.eval(row)?;
            acc_var.set(next);
        }
        finish_var.set(acc_var.get());
        finish.eval(row)
    }
}
