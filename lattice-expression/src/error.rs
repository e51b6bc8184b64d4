//! Error types and implementations for expression scanning, compilation,
//! and evaluation.

/// Generic error type for expression scanning and compilation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An unescaped `${` was found inside an already-open expression.
    #[error("nested expression opener at byte {position}")]
    NestedExpression {
        /// Byte offset of the inner `${` within the scanned string.
        position: usize,
    },
    /// The expression source failed to tokenize or parse.
    #[error("parse error at byte {position}: {message}")]
    Parse {
        /// Byte offset of the offending token.
        position: usize,
        /// What the parser expected or found.
        message: String,
    },
}

impl Error {
    /// Byte offset carried by the error, if any.
    pub fn position(&self) -> usize {
        match self {
            Error::NestedExpression { position } => *position,
            Error::Parse { position, .. } => *position,
        }
    }
}

/// Error type for evaluating a compiled [Program] against a binding.
///
/// [Program]: crate::Program
#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    /// A lookup reached data that is not present yet: a missing map key,
    /// an out-of-range list index, traversal through `null`, or a declared
    /// variable absent from the binding.
    ///
    /// Callers treat this as a retry signal rather than a failure.
    #[error("incomplete data: {0}")]
    IncompleteData(String),
    /// An identifier that is neither a declared variable nor in scope.
    #[error("undeclared identifier `{0}`")]
    UnknownIdentifier(String),
    /// A call to a function that is neither declared nor built in.
    #[error("undeclared function `{0}`")]
    UnknownFunction(String),
    /// An operation was applied to a value of the wrong type.
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The operator or function being evaluated.
        context: String,
        /// Humanized expected type(s).
        expected: String,
        /// Humanized actual type.
        found: String,
    },
    /// A list index beyond the list's current length.
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The list length at evaluation time.
        len: usize,
    },
    /// Integer division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer arithmetic overflowed.
    #[error("integer overflow in {0}")]
    ArithmeticOverflow(String),
    /// A builtin was handed an argument it cannot work with, e.g. an
    /// invalid regular expression for `matches`.
    #[error("invalid argument to {function}: {message}")]
    InvalidArgument {
        /// The builtin being invoked.
        function: String,
        /// What was wrong with the argument.
        message: String,
    },
}

impl EvalError {
    /// Whether this error only signals unresolved upstream data, as
    /// opposed to a genuine evaluation failure.
    pub fn is_incomplete_data(&self) -> bool {
        matches!(
            self,
            EvalError::IncompleteData(_)
        )
    }

    /// Shorthand constructor for [EvalError::TypeMismatch].
    pub(crate) fn type_mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        EvalError::TypeMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}
