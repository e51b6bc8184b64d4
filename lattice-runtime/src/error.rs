//! Error types and implementations for graph building and runtime
//! resolution.

use lattice_expression::EvalError;

/// Errors that abort graph construction. The caller surfaces these as a
/// degraded resource-graph status; nothing is retried.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// A resource id that cannot be used as an expression identifier, or
    /// collides with a reserved name.
    #[error("invalid resource id `{id}`: {reason}")]
    NamingViolation {
        /// The offending id.
        id: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Two resources share an id.
    #[error("duplicate resource id `{0}`")]
    DuplicateResourceId(String),
    /// A resource template is structurally unusable.
    #[error("invalid template for resource `{id}`: {reason}")]
    InvalidTemplate {
        /// The resource whose template failed.
        id: String,
        /// What was missing or malformed.
        reason: String,
    },
    /// The schema resolver knows nothing about a template's GVK.
    #[error("no schema found for `{gvk}` (resource `{id}`)")]
    SchemaNotFound {
        /// The resource whose schema was requested.
        id: String,
        /// The unresolvable group/version/kind.
        gvk: String,
        /// The resolver's underlying failure.
        #[source]
        source: anyhow::Error,
    },
    /// A template field did not survive schema-validated extraction;
    /// covers schema mismatches and nested-expression errors, with the
    /// offending path in the message.
    #[error("resource `{id}`: {source}")]
    FieldExtraction {
        /// The resource being walked.
        id: String,
        /// The walker's error, naming the path.
        #[source]
        source: lattice_schema::Error,
    },
    /// The instance spec's simple schema failed to transform.
    #[error("invalid instance spec schema: {0}")]
    InvalidInstanceSchema(#[source] lattice_schema::Error),
    /// Dummy-object emulation failed for a resolved schema.
    #[error("cannot emulate resource `{id}`: {source}")]
    Emulation {
        /// The resource being emulated.
        id: String,
        /// The emulator's error.
        #[source]
        source: lattice_schema::Error,
    },
    /// An expression failed to compile.
    #[error("cannot compile expression `{expression}`: {source}")]
    ExpressionCompile {
        /// The offending expression text.
        expression: String,
        /// The parser's error.
        #[source]
        source: lattice_expression::Error,
    },
    /// An expression references identifiers that are not resource ids.
    #[error("expression `{expression}` references undeclared resource(s) {ids:?}")]
    UndeclaredResource {
        /// The offending expression text.
        expression: String,
        /// The unknown identifiers.
        ids: Vec<String>,
    },
    /// An expression calls functions that are neither declared nor built
    /// in.
    #[error("expression `{expression}` calls undeclared function(s) {names:?}")]
    UndeclaredFunction {
        /// The offending expression text.
        expression: String,
        /// The unknown function names.
        names: Vec<String>,
    },
    /// A readyWhen/includeWhen entry is not a single standalone
    /// expression.
    #[error("condition `{condition}` on resource `{id}` must be a standalone `${{…}}` expression")]
    NonStandaloneCondition {
        /// The resource carrying the condition.
        id: String,
        /// The condition text as authored.
        condition: String,
    },
    /// A readyWhen/includeWhen expression did not evaluate to a boolean
    /// during the build-time dry run.
    #[error("condition `{expression}` on resource `{id}` must evaluate to a boolean, got {found}")]
    NonBooleanCondition {
        /// The resource carrying the condition.
        id: String,
        /// The offending expression text.
        expression: String,
        /// The dry-run result's type.
        found: String,
    },
    /// A readyWhen expression references resources other than its own.
    #[error("readyWhen `{expression}` on resource `{id}` may only reference `{id}`")]
    ForeignReadyWhenReference {
        /// The resource carrying the condition.
        id: String,
        /// The offending expression text.
        expression: String,
    },
    /// An includeWhen expression references other resources; inclusion is
    /// decided before anything is created, so only the instance spec is
    /// in scope.
    #[error("includeWhen `{expression}` on resource `{id}` may only reference `schema`")]
    NonStaticIncludeWhen {
        /// The resource carrying the condition.
        id: String,
        /// The offending expression text.
        expression: String,
    },
    /// An instance status expression references no resources at all.
    #[error("status expression `{expression}` references no resources")]
    StaticStatusExpression {
        /// The offending expression text.
        expression: String,
    },
    /// An instance status field mixes expressions with literal text.
    #[error("status field `{path}` must be a single standalone expression")]
    NonStandaloneStatus {
        /// Path of the status field.
        path: String,
    },
    /// A build-time dry run failed with a non-retriable evaluation error.
    #[error("dry run of `{expression}` failed: {source}")]
    DryRun {
        /// The offending expression text.
        expression: String,
        /// The evaluation error.
        #[source]
        source: EvalError,
    },
    /// Graph-shape errors from the dependency DAG.
    #[error(transparent)]
    Dag(#[from] DagError),
}

/// Errors raised by the dependency DAG.
#[derive(thiserror::Error, Debug)]
pub enum DagError {
    /// A vertex id was added twice.
    #[error("vertex `{0}` already exists")]
    DuplicateVertex(String),
    /// A dependency names a vertex that was never added.
    #[error("vertex `{id}` depends on unknown vertex `{dependency}`")]
    UnknownDependency {
        /// The depending vertex.
        id: String,
        /// The missing dependency id.
        dependency: String,
    },
    /// A vertex depends on itself.
    #[error("vertex `{0}` cannot depend on itself")]
    SelfReference(String),
    /// An edge insertion or sort found a dependency cycle.
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    Cycle {
        /// One offending cycle, in traversal order, with the starting
        /// vertex repeated at the end.
        cycle: Vec<String>,
    },
}

/// Errors that abort a single resolution pass. The outer reconciler
/// retries the pass; nothing here is fatal for the graph.
#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    /// An id that is not a vertex of the graph.
    #[error("unknown resource `{0}`")]
    UnknownResource(String),
    /// An expression failed to compile at runtime-state construction.
    #[error("cannot compile expression `{expression}`: {source}")]
    ExpressionCompile {
        /// The offending expression text.
        expression: String,
        /// The parser's error.
        #[source]
        source: lattice_expression::Error,
    },
    /// An expression failed to evaluate with a non-retriable error.
    #[error("cannot evaluate `{expression}`: {source}")]
    ExpressionEval {
        /// The offending expression text.
        expression: String,
        /// The evaluation error.
        #[source]
        source: EvalError,
    },
    /// Substitution required an expression that is not resolved yet; this
    /// indicates an ordering bug in the pass, not missing data.
    #[error("expression `{0}` was not resolved before substitution")]
    UnresolvedSubstitution(String),
    /// Reading or writing a template field failed.
    #[error("substitution into `{path}` failed: {source}")]
    Substitution {
        /// The target field path.
        path: String,
        /// The field-path engine's error.
        #[source]
        source: lattice_schema::Error,
    },
}
