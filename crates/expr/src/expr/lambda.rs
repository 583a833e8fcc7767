use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ketchsql_common::types::{DataType, Value};
use ketchsql_common::{Result, Row};

use super::Expr;

static NEXT_EXPR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier for a named lambda parameter. Body
/// references resolve to their owning parameter by this id, never by a
/// back-pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u64);

impl ExprId {
    pub fn next() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A lambda parameter: a named, typed variable backed by a mutable value
/// slot. The slot is the only mutable state in an expression tree; the
/// enclosing higher-order function writes it between body evaluations and
/// every body reference reads it through a shared handle.
///
/// Cloning preserves slot identity. [`NamedLambdaVariable::new_instance`]
/// breaks it deliberately, for trees that must evaluate independently.
#[derive(Debug, Clone)]
pub struct NamedLambdaVariable {
    name: String,
    data_type: DataType,
    nullable: bool,
    id: ExprId,
    slot: Rc<RefCell<Value>>,
}

impl PartialEq for NamedLambdaVariable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.data_type == other.data_type
            && self.nullable == other.nullable
    }
}

impl NamedLambdaVariable {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            id: ExprId::next(),
            slot: Rc::new(RefCell::new(Value::Null)),
        }
    }

    /// A parameter as written, before binding has stamped a type on it.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Unknown, true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn resolved(&self) -> bool {
        self.data_type != DataType::Unknown
    }

    pub fn set(&self, value: Value) {
        *self.slot.borrow_mut() = value;
    }

    pub fn get(&self) -> Value {
        self.slot.borrow().clone()
    }

    /// Returns the slot's current value; the row is ignored.
    pub fn eval(&self, _row: &Row) -> Result<Value> {
        Ok(self.slot.borrow().clone())
    }

    /// Same name, type and nullability, but a fresh id and an empty slot.
    pub fn new_instance(&self) -> Self {
        Self::new(self.name.clone(), self.data_type.clone(), self.nullable)
    }
}

/// A lambda: an ordered parameter list over a body expression. Parameter
/// order defines argument positions when the enclosing operator invokes
/// the lambda. `hidden` marks bookkeeping lambdas (such as aggregate's
/// default finish) whose parameters are not user-visible.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaFunction {
    params: Vec<NamedLambdaVariable>,
    body: Box<Expr>,
    hidden: bool,
}

impl LambdaFunction {
    pub fn new(params: Vec<NamedLambdaVariable>, body: Expr, hidden: bool) -> Self {
        Self {
            params,
            body: Box::new(body),
            hidden,
        }
    }

    /// Analysis-time constructor: parameters carry unknown types until
    /// the enclosing higher-order function binds them.
    pub fn unbound<S: Into<String>>(names: impl IntoIterator<Item = S>, body: Expr) -> Self {
        let params = names
            .into_iter()
            .map(|n| NamedLambdaVariable::unresolved(n))
            .collect();
        Self::new(params, body, false)
    }

    /// The hidden single-parameter identity lambda, used as the default
    /// finish step of aggregate.
    pub fn identity() -> Self {
        let mut lambda = Self::unbound(["acc"], Expr::unresolved_variable("acc"));
        lambda.hidden = true;
        lambda
    }

    pub fn params(&self) -> &[NamedLambdaVariable] {
        &self.params
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn into_parts(self) -> (Vec<NamedLambdaVariable>, Expr, bool) {
        (self.params, *self.body, self.hidden)
    }

    pub fn data_type(&self) -> DataType {
        self.body.data_type()
    }

    pub fn nullable(&self) -> bool {
        self.body.nullable()
    }

    pub fn params_resolved(&self) -> bool {
        self.params.iter().all(NamedLambdaVariable::resolved)
    }

    pub fn resolved(&self) -> bool {
        self.params_resolved() && self.body.resolved()
    }

    pub fn eval(&self, row: &Row) -> Result<Value> {
        self.body.eval(row)
    }

    /// A structurally identical lambda whose parameters are fresh
    /// instances and whose body references point at them. Required when a
    /// bound tree is duplicated: without it, two live copies would share
    /// parameter slots.
    pub fn new_instance(&self) -> Self {
        let fresh: HashMap<ExprId, NamedLambdaVariable> = self
            .params
            .iter()
            .map(|p| (p.id(), p.new_instance()))
            .collect();
        let params = self
            .params
            .iter()
            .map(|p| fresh[&p.id()].clone())
            .collect();
        let body = self.body.as_ref().clone().transform_up(&mut |e| match e {
            Expr::Variable(v) => match fresh.get(&v.id()) {
                Some(replacement) => Expr::Variable(replacement.clone()),
                None => Expr::Variable(v),
            },
            other => other,
        });
        Self::new(params, body, self.hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_write_then_read() {
        let var = NamedLambdaVariable::new("x", DataType::Int64, false);
        let row = Row::empty();
        assert_eq!(var.eval(&row).unwrap(), Value::Null);
        var.set(Value::int64(42));
        assert_eq!(var.eval(&row).unwrap(), Value::int64(42));
    }

    #[test]
    fn test_eval_ignores_row() {
        let var = NamedLambdaVariable::new("x", DataType::Int64, false);
        var.set(Value::int64(7));
        let row = Row::new(vec![Value::int64(99)]);
        assert_eq!(var.eval(&row).unwrap(), Value::int64(7));
    }

    #[test]
    fn test_clone_shares_slot() {
        let var = NamedLambdaVariable::new("x", DataType::Int64, false);
        let copy = var.clone();
        var.set(Value::int64(3));
        assert_eq!(copy.get(), Value::int64(3));
    }

    #[test]
    fn test_new_instance_is_independent() {
        let var = NamedLambdaVariable::new("x", DataType::Int64, false);
        var.set(Value::int64(1));
        let fresh = var.new_instance();
        assert_ne!(var.id(), fresh.id());
        assert_eq!(fresh.get(), Value::Null);
        fresh.set(Value::int64(2));
        assert_eq!(var.get(), Value::int64(1));
    }

    #[test]
    fn test_expr_ids_are_unique() {
        let a = ExprId::next();
        let b = ExprId::next();
        assert!(b > a);
    }

    #[test]
    fn test_lambda_new_instance_rewires_body() {
        let param = NamedLambdaVariable::new("x", DataType::Int64, false);
        let body = Expr::Variable(param.clone());
        let lambda = LambdaFunction::new(vec![param.clone()], body, false);

        let copy = lambda.new_instance();
        assert_ne!(copy.params()[0].id(), param.id());

        // The copy's body must read the copy's slot, not the original's.
        param.set(Value::int64(10));
        copy.params()[0].set(Value::int64(20));
        let row = Row::empty();
        assert_eq!(lambda.eval(&row).unwrap(), Value::int64(10));
        assert_eq!(copy.eval(&row).unwrap(), Value::int64(20));
    }
}
