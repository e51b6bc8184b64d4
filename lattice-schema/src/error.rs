//! Error types and implementations for path handling, schema walking, and
//! schema transformation.

/// Generic error type for schema and field-path use cases.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A field path failed to parse.
    #[error("invalid field path at byte {position}: {message}")]
    PathParse {
        /// Byte offset of the offending character.
        position: usize,
        /// What the parser expected or found.
        message: String,
    },
    /// A traversal step expected one container shape and found another.
    #[error("type mismatch at `{path}`: expected {expected}, found {found}")]
    TypeMismatch {
        /// Path of the step that failed.
        path: String,
        /// Expected container or scalar kind.
        expected: String,
        /// What was actually there.
        found: String,
    },
    /// A read traversal ran off the data.
    #[error("no value at `{path}`")]
    NotFound {
        /// Path of the missing field.
        path: String,
    },
    /// A read through an index segment went past the end of the array.
    #[error("index {index} out of bounds at `{path}` (length {len})")]
    IndexOutOfBounds {
        /// Path of the indexed segment.
        path: String,
        /// Requested index.
        index: usize,
        /// Array length at read time.
        len: usize,
    },
    /// A schema reached the walker without any usable type information.
    #[error("invalid schema at `{path}`: {reason}")]
    InvalidSchema {
        /// Path of the schema node.
        path: String,
        /// Why the schema is unusable.
        reason: String,
    },
    /// A value did not conform to the schema it was walked against.
    #[error("schema mismatch at `{path}`: {reason}")]
    SchemaMismatch {
        /// Path of the offending value.
        path: String,
        /// What did not line up.
        reason: String,
    },
    /// An embedded expression failed to scan, e.g. nested `${`.
    #[error("invalid expression at `{path}`: {source}")]
    Expression {
        /// Path of the string field holding the expression.
        path: String,
        /// The scanner error.
        #[source]
        source: lattice_expression::Error,
    },
    /// A simple-schema type string could not be understood.
    #[error("unknown type `{name}` in simple schema field `{field}`")]
    UnknownType {
        /// The unrecognized type token.
        name: String,
        /// The field whose type string failed.
        field: String,
    },
    /// A simple-schema marker was malformed.
    #[error("invalid marker on simple schema field `{field}`: {reason}")]
    InvalidMarker {
        /// The field carrying the marker.
        field: String,
        /// What was wrong.
        reason: String,
    },
    /// A simple-schema field held a value shape the DSL does not allow.
    #[error("invalid simple schema field `{field}`: {reason}")]
    InvalidSimpleSchema {
        /// The offending field.
        field: String,
        /// What was wrong.
        reason: String,
    },
    /// Dummy-object emulation hit a schema it cannot synthesize a value
    /// for.
    #[error("cannot emulate value at `{path}`: {reason}")]
    Emulation {
        /// Path of the schema node.
        path: String,
        /// Why no value could be produced.
        reason: String,
    },
}
