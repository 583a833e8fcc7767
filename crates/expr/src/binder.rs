use debug_print::debug_eprintln;

use ketchsql_common::types::DataType;
use ketchsql_common::{Error, Result};

use crate::expr::{Expr, LambdaFunction, NamedLambdaVariable};

/// Walks an expression tree and binds every higher-order function whose
/// argument types are known.
///
/// Binding is outside-in: an operator's own lambdas are bound first (they
/// need the operator's argument types), then the bound bodies are
/// descended into, so a nested operator whose collection argument is an
/// outer lambda parameter sees that parameter fully typed. Operators
/// whose arguments cannot be resolved yet are left untouched; running the
/// driver again after they resolve is safe, and re-running it over an
/// already-bound tree is a no-op.
pub fn bind_lambda_functions(expr: Expr) -> Result<Expr> {
    match expr {
        Expr::HigherOrder(hof) => {
            let hof = (*hof).try_map_arguments(&mut bind_lambda_functions)?;
            if !hof.arguments_resolved() {
                return Ok(Expr::HigherOrder(Box::new(hof)));
            }
            let hof = if hof.functions_bound() {
                hof
            } else {
                let bound = hof.bind(&mut bind_lambda)?;
                bound.check_input_data_types().into_result()?;
                bound
            };
            let hof = hof.try_map_functions(&mut |function| match function {
                Expr::Lambda(lambda) => {
                    let (params, body, hidden) = lambda.into_parts();
                    let body = bind_lambda_functions(body)?;
                    Ok(Expr::Lambda(LambdaFunction::new(params, body, hidden)))
                }
                other => bind_lambda_functions(other),
            })?;
            Ok(Expr::HigherOrder(Box::new(hof)))
        }
        // A lambda outside any higher-order function has nothing to type
        // its parameters against; leave it for its eventual owner.
        Expr::Lambda(_) => Ok(expr),
        other => other.map_children(&mut bind_lambda_functions),
    }
}

/// The default binder callback: stamps the expected types onto fresh
/// parameter instances and rewires the body to them.
pub fn bind_lambda(
    lambda: LambdaFunction,
    expected: &[(DataType, bool)],
) -> Result<LambdaFunction> {
    if lambda.params().len() != expected.len() {
        return Err(Error::LambdaArityMismatch {
            expected: expected.len(),
            actual: lambda.params().len(),
        });
    }
    let (params, mut body, hidden) = lambda.into_parts();
    let fresh: Vec<NamedLambdaVariable> = params
        .iter()
        .zip(expected)
        .map(|(param, (data_type, nullable))| {
            NamedLambdaVariable::new(param.name(), data_type.clone(), *nullable)
        })
        .collect();
    for var in &fresh {
        body = substitute_variable(body, var);
    }
    debug_eprintln!(
        "[binder] bound lambda parameters: {:?}",
        fresh
            .iter()
            .map(|v| format!("{}: {}", v.name(), v.data_type()))
            .collect::<Vec<_>>()
    );
    Ok(LambdaFunction::new(fresh, body, hidden))
}

/// Replaces references to `var`'s name with `var` itself, stopping at any
/// nested lambda that declares the same name (inner parameters shadow
/// outer ones). Already-bound references to the name are re-pointed too,
/// which makes rebinding produce a self-consistent lambda instead of one
/// aliasing a stale slot.
fn substitute_variable(expr: Expr, var: &NamedLambdaVariable) -> Expr {
    match expr {
        Expr::UnresolvedVariable { ref name } if name == var.name() => Expr::Variable(var.clone()),
        Expr::Variable(ref existing) if existing.name() == var.name() => {
            Expr::Variable(var.clone())
        }
        Expr::Lambda(ref lambda) if lambda.params().iter().any(|p| p.name() == var.name()) => expr,
        other => {
            let result: std::result::Result<Expr, std::convert::Infallible> = other
                .map_children(&mut |child| Ok(substitute_variable(child, var)));
            match result {
                Ok(expr) => expr,
                Err(never) => match never {},
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ketchsql_common::types::{DataType, Value};
    use ketchsql_common::Row;
    use crate::expr::BinaryOp;

    fn int_array(items: Vec<i64>) -> Expr {
        Expr::array_literal(
            DataType::Int64,
            items.into_iter().map(Value::int64).collect(),
        )
    }

    #[test]
    fn test_bind_types_the_parameter() {
        let expr = Expr::array_transform(
            int_array(vec![1, 2]),
            Expr::lambda(
                ["x"],
                Expr::binary(
                    Expr::unresolved_variable("x"),
                    BinaryOp::Add,
                    Expr::literal_i64(1),
                ),
            ),
        );
        assert!(!expr.resolved());
        let bound = bind_lambda_functions(expr).unwrap();
        assert!(bound.resolved());
        assert_eq!(
            bound.data_type(),
            DataType::array(DataType::Int64, false)
        );
    }

    #[test]
    fn test_bind_is_idempotent() {
        let expr = Expr::array_transform(
            int_array(vec![1, 2]),
            Expr::lambda(["x"], Expr::unresolved_variable("x")),
        );
        let bound = bind_lambda_functions(expr).unwrap();
        let rebound = bind_lambda_functions(bound.clone()).unwrap();
        assert_eq!(bound, rebound);
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        let expr = Expr::array_transform(
            int_array(vec![1]),
            Expr::lambda(["x", "i", "extra"], Expr::unresolved_variable("x")),
        );
        let err = bind_lambda_functions(expr).unwrap_err();
        assert!(matches!(
            err,
            Error::LambdaArityMismatch {
                expected: 1,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_non_lambda_function_argument_is_rejected() {
        let expr = Expr::array_filter(int_array(vec![1]), Expr::literal_bool(true));
        let err = bind_lambda_functions(expr).unwrap_err();
        assert!(matches!(err, Error::ArgumentTypeMismatch { index: 1, .. }));
    }

    #[test]
    fn test_non_array_argument_is_rejected() {
        let expr = Expr::array_transform(
            Expr::literal_i64(3),
            Expr::lambda(["x"], Expr::unresolved_variable("x")),
        );
        let err = bind_lambda_functions(expr).unwrap_err();
        assert!(matches!(err, Error::ArgumentTypeMismatch { index: 0, .. }));
    }

    #[test]
    fn test_shadowing_keeps_inner_reference_intact() {
        // transform(a, x -> transform(b, x -> x)): the inner x must bind
        // to the inner lambda, not the outer one.
        let inner = Expr::array_transform(
            Expr::array_literal(DataType::String, vec![Value::string("s")]),
            Expr::lambda(["x"], Expr::unresolved_variable("x")),
        );
        let outer = Expr::array_transform(int_array(vec![7]), Expr::lambda(["x"], inner));
        let bound = bind_lambda_functions(outer).unwrap();
        assert!(bound.resolved());
        // The outer element type is INT64 but the inner transform maps a
        // STRING array, so its element result type must stay STRING.
        assert_eq!(
            bound.data_type(),
            DataType::array(DataType::array(DataType::String, false), false)
        );
        let result = bound.eval(&Row::empty()).unwrap();
        assert_eq!(
            result,
            Value::array(vec![Value::array(vec![Value::string("s")])])
        );
    }

    #[test]
    fn test_substitution_repoints_stale_variables() {
        let stale = NamedLambdaVariable::new("x", DataType::Int64, false);
        let body = Expr::Variable(stale.clone());
        let lambda = LambdaFunction::new(vec![stale], body, false);
        let bound = bind_lambda(lambda, &[(DataType::Int64, false)]).unwrap();
        let Expr::Variable(var) = bound.body() else {
            panic!("body should be a variable reference");
        };
        assert_eq!(var.id(), bound.params()[0].id());
    }

    #[test]
    fn test_bound_body_shares_parameter_slot() {
        let expr = Expr::array_transform(
            int_array(vec![5]),
            Expr::lambda(["x"], Expr::unresolved_variable("x")),
        );
        let bound = bind_lambda_functions(expr).unwrap();
        let Expr::HigherOrder(hof) = &bound else {
            panic!("expected a higher-order node");
        };
        let Expr::Lambda(lambda) = hof.functions()[0] else {
            panic!("expected a bound lambda");
        };
        lambda.params()[0].set(Value::int64(41));
        assert_eq!(lambda.eval(&Row::empty()).unwrap(), Value::int64(41));
    }
}
