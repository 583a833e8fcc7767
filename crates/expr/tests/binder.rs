use ketchsql_common::types::{DataType, Value};
use ketchsql_common::{Error, Row};
use ketchsql_expr::{bind_lambda_functions, BinaryOp, Expr};

fn var(name: &str) -> Expr {
    Expr::unresolved_variable(name)
}

fn int_array(items: &[i64]) -> Expr {
    Expr::array_literal(
        DataType::Int64,
        items.iter().copied().map(Value::int64).collect(),
    )
}

#[test]
fn test_aggregate_accumulator_type_mismatch() {
    // Start value is INT32 but merging INT64 elements widens the result
    // to INT64, so the accumulator types disagree.
    let expr = Expr::array_aggregate(
        int_array(&[1, 2]),
        Expr::literal_i32(0),
        Expr::lambda(
            ["acc", "x"],
            Expr::binary(var("acc"), BinaryOp::Add, var("x")),
        ),
    );
    let err = bind_lambda_functions(expr).unwrap_err();
    assert!(
        matches!(err, Error::AccumulatorTypeMismatch { .. }),
        "got {:?}",
        err
    );
}

#[test]
fn test_aggregate_accepts_matching_accumulator() {
    let expr = Expr::array_aggregate(
        int_array(&[1, 2]),
        Expr::literal_i64(0),
        Expr::lambda(
            ["acc", "x"],
            Expr::binary(var("acc"), BinaryOp::Add, var("x")),
        ),
    );
    let bound = bind_lambda_functions(expr).unwrap();
    assert_eq!(bound.data_type(), DataType::Int64);
    assert_eq!(bound.eval(&Row::empty()).unwrap(), Value::int64(3));
}

#[test]
fn test_filter_body_must_be_boolean() {
    let expr = Expr::array_filter(
        int_array(&[1]),
        Expr::lambda(
            ["x"],
            Expr::binary(var("x"), BinaryOp::Add, Expr::literal_i64(1)),
        ),
    );
    let err = bind_lambda_functions(expr).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }), "got {:?}", err);
}

#[test]
fn test_map_zip_with_key_type_mismatch() {
    let int_keys = Expr::map_literal(
        DataType::Int64,
        DataType::String,
        vec![Value::int64(1)],
        vec![Value::string("a")],
    );
    let string_keys = Expr::map_literal(
        DataType::String,
        DataType::String,
        vec![Value::string("1")],
        vec![Value::string("b")],
    );
    let expr = Expr::map_zip_with(
        int_keys,
        string_keys,
        Expr::lambda(["k", "v1", "v2"], var("v1")),
    );
    let err = bind_lambda_functions(expr).unwrap_err();
    assert!(matches!(err, Error::MapKeyTypeMismatch { .. }), "got {:?}", err);
}

#[test]
fn test_map_zip_with_rejects_unorderable_keys() {
    // Map-typed keys can be neither hashed nor ordered.
    let key_type = DataType::map(DataType::Int64, DataType::Int64, false);
    let map_keyed = |value: i64| {
        Expr::map_literal(
            key_type.clone(),
            DataType::Int64,
            vec![Value::map(vec![Value::int64(1)], vec![Value::int64(1)])],
            vec![Value::int64(value)],
        )
    };
    let expr = Expr::map_zip_with(
        map_keyed(1),
        map_keyed(2),
        Expr::lambda(["k", "v1", "v2"], var("v1")),
    );
    let err = bind_lambda_functions(expr).unwrap_err();
    assert!(matches!(err, Error::MapKeyNotOrderable(_)), "got {:?}", err);
}

#[test]
fn test_map_zip_with_merges_key_null_flags() {
    // Key types that differ only in nested nullability unify to the more
    // permissive flags.
    let left = Expr::map_literal(
        DataType::array(DataType::Int64, false),
        DataType::String,
        vec![Value::array(vec![Value::int64(1)])],
        vec![Value::string("a")],
    );
    let right = Expr::map_literal(
        DataType::array(DataType::Int64, true),
        DataType::String,
        vec![Value::array(vec![Value::int64(1)])],
        vec![Value::string("b")],
    );
    let bound = bind_lambda_functions(Expr::map_zip_with(
        left,
        right,
        Expr::lambda(["k", "v1", "v2"], var("k")),
    ))
    .unwrap();
    let DataType::Map { key, .. } = bound.data_type() else {
        panic!("expected a map result type");
    };
    assert_eq!(*key, DataType::array(DataType::Int64, true));
}

#[test]
fn test_transform_result_type_follows_body() {
    let expr = Expr::array_transform(
        int_array(&[1, 2]),
        Expr::lambda(
            ["x"],
            Expr::binary(var("x"), BinaryOp::Gt, Expr::literal_i64(1)),
        ),
    );
    let bound = bind_lambda_functions(expr).unwrap();
    assert_eq!(bound.data_type(), DataType::array(DataType::Bool, false));
}

#[test]
fn test_transform_result_nullability_follows_element_flag() {
    // A nullable element makes x + 1 nullable, which flows into the
    // result's element-nullability flag.
    let expr = Expr::array_transform(
        Expr::array_literal(DataType::Int64, vec![Value::int64(1), Value::Null]),
        Expr::lambda(
            ["x"],
            Expr::binary(var("x"), BinaryOp::Add, Expr::literal_i64(1)),
        ),
    );
    let bound = bind_lambda_functions(expr).unwrap();
    assert_eq!(bound.data_type(), DataType::array(DataType::Int64, true));
}

#[test]
fn test_unready_operator_is_left_unbound() {
    // The collection argument is an unresolved variable, so the operator
    // cannot bind yet; the driver must pass it through unchanged.
    let expr = Expr::array_transform(var("missing"), Expr::lambda(["x"], var("x")));
    let out = bind_lambda_functions(expr).unwrap();
    assert!(!out.resolved());
}

#[test]
fn test_bound_operator_reports_resolved_state() {
    let expr = Expr::array_exists(
        int_array(&[1]),
        Expr::lambda(
            ["x"],
            Expr::binary(var("x"), BinaryOp::Eq, Expr::literal_i64(1)),
        ),
    );
    let Expr::HigherOrder(hof) = &expr else {
        panic!("expected a higher-order node");
    };
    assert!(hof.arguments_resolved());
    assert!(!hof.resolved());

    let bound = bind_lambda_functions(expr).unwrap();
    let Expr::HigherOrder(hof) = &bound else {
        panic!("expected a higher-order node");
    };
    assert!(hof.resolved());
    assert!(hof.check_input_data_types().is_success());
}
