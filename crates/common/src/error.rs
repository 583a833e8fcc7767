pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("argument {index} requires {expected}, found {actual}")]
    ArgumentTypeMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("lambda takes {actual} argument(s), expected {expected}")]
    LambdaArityMismatch { expected: usize, actual: usize },

    #[error("aggregate start value type {zero} does not match merge result type {merge}")]
    AccumulatorTypeMismatch { zero: String, merge: String },

    #[error("map key types must match: {left} vs {right}")]
    MapKeyTypeMismatch { left: String, right: String },

    #[error("map key type {0} is not orderable")]
    MapKeyNotOrderable(String),

    #[error("combined map has {size} distinct keys, exceeding the maximum of {max}")]
    MapSizeExceeded { size: usize, max: usize },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric overflow")]
    Overflow,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl Error {
    pub fn argument_type_mismatch(
        index: usize,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Error::ArgumentTypeMismatch {
            index,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::InternalError(msg.into())
    }
}
