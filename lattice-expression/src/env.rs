//! Compilation environment and compiled [Program]s.

use crate::{ast::Expr, error::EvalError, eval, parser, Error};
use indexmap::IndexSet;
use serde_json::{Map, Value};

/// A compilation environment declaring the variables (and optionally,
/// host functions) an expression may reference.
///
/// Variables are dynamically typed: the environment only records names.
/// Classification of identifiers that are *not* declared is deferred to
/// the [Inspector], and failed lookups surface at evaluation time.
///
/// [Inspector]: crate::Inspector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Env {
    variables: IndexSet<String>,
    functions: IndexSet<String>,
}

impl Env {
    /// Create an [Env] declaring the given variable names.
    pub fn new<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Env {
            variables: variables.into_iter().map(Into::into).collect(),
            functions: IndexSet::new(),
        }
    }

    /// Extend the environment with declared host-function names.
    pub fn with_functions<I, S>(mut self, functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.functions.extend(functions.into_iter().map(Into::into));
        self
    }

    /// Whether `name` is a declared variable.
    pub fn declares_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    /// Whether `name` is a declared host function.
    pub fn declares_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    /// Declared variable names, in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// Compile an expression source string against this environment.
    ///
    /// Compilation checks syntax only; identifier resolution happens at
    /// evaluation and inspection time.
    ///
    /// # Example
    ///
    /// ```
    /// use lattice_expression::Env;
    /// use serde_json::{json, Map};
    ///
    /// let env = Env::new(["configmap"]);
    /// let program = env.compile("configmap.data.name + '-suffix'").unwrap();
    ///
    /// let mut binding = Map::new();
    /// binding.insert("configmap".into(), json!({"data": {"name": "db"}}));
    /// assert_eq!(program.evaluate(&binding).unwrap(), json!("db-suffix"));
    /// ```
    pub fn compile(&self, source: &str) -> Result<Program, Error> {
        let ast = parser::parse(source)?;
        Ok(Program {
            source: source.to_string(),
            ast,
            env: self.clone(),
        })
    }
}

/// A compiled expression, ready to be evaluated against bindings or walked
/// by the [Inspector].
///
/// [Inspector]: crate::Inspector
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    ast: Expr,
    env: Env,
}

impl Program {
    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The environment this program was compiled against.
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// The parsed syntax tree.
    pub(crate) fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluate against a binding of variable names to values.
    ///
    /// A declared variable missing from the binding is reported as
    /// [incomplete data], so callers can retry once upstream values
    /// arrive.
    ///
    /// [incomplete data]: EvalError::IncompleteData
    pub fn evaluate(&self, binding: &Map<String, Value>) -> Result<Value, EvalError> {
        eval::evaluate(&self.ast, &self.env, binding)
    }
}
