//! Syntax-tree inspection for dependency analysis.
//!
//! The [Inspector] walks a compiled [Program] and reports which declared
//! resource variables it touches (and through which accessor paths), which
//! declared functions it calls, and any identifiers or calls it cannot
//! account for. Comprehension-bound variables are tracked through a scope
//! stack so loop names never masquerade as resource references.

use crate::{
    ast::{Expr, Literal},
    builtin::Builtin,
    Env, Program,
};
use indexmap::IndexSet;

/// A reference from an expression into a declared resource variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// The declared resource id the expression depends on.
    pub id: String,
    /// Full accessor path, e.g. `configmap.data.DB_NAME` or
    /// `deployment.spec.containers[0].image`.
    pub path: String,
}

/// Everything the [Inspector] learned about one expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inspection {
    /// References to declared resource variables, in source order,
    /// deduplicated by `(id, path)`.
    pub resource_dependencies: Vec<ResourceRef>,
    /// Invocations of declared host functions (never methods on values).
    pub function_calls: Vec<String>,
    /// Top-level identifiers that are neither declared, scope-bound, nor
    /// internal.
    pub unknown_resources: Vec<String>,
    /// Called names that are neither declared functions nor built in.
    pub unknown_functions: Vec<String>,
}

impl Inspection {
    /// The distinct resource ids this expression depends on, in first-use
    /// order.
    pub fn dependency_ids(&self) -> Vec<String> {
        self.resource_dependencies
            .iter()
            .map(|r| r.id.clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Walks compiled expressions against the declarations of an [Env].
#[derive(Debug)]
pub struct Inspector<'a> {
    env: &'a Env,
}

impl<'a> Inspector<'a> {
    /// Create an [Inspector] for the given environment.
    pub fn new(env: &'a Env) -> Self {
        Inspector { env }
    }

    /// Inspect a compiled [Program].
    pub fn inspect(&self, program: &Program) -> Inspection {
        let mut walk = Walk {
            env: self.env,
            scopes: Vec::new(),
            resource_dependencies: IndexSet::new(),
            function_calls: IndexSet::new(),
            unknown_resources: IndexSet::new(),
            unknown_functions: IndexSet::new(),
        };
        walk.walk(program.ast());

        Inspection {
            resource_dependencies: walk.resource_dependencies.into_iter().collect(),
            function_calls: walk.function_calls.into_iter().collect(),
            unknown_resources: walk.unknown_resources.into_iter().collect(),
            unknown_functions: walk.unknown_functions.into_iter().collect(),
        }
    }
}

struct Walk<'a> {
    env: &'a Env,
    scopes: Vec<String>,
    resource_dependencies: IndexSet<ResourceRef>,
    function_calls: IndexSet<String>,
    unknown_resources: IndexSet<String>,
    unknown_functions: IndexSet<String>,
}

impl Walk<'_> {
    fn walk(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. } => {
                self.walk_accessor(expr);
            }
            Expr::Call {
                target,
                function,
                args,
            } => {
                self.classify_call(target.is_some(), function);
                if let Some(target) = target {
                    self.walk(target);
                }
                for arg in args {
                    self.walk(arg);
                }
            }
            Expr::Comprehension {
                target, var, body, ..
            } => {
                self.walk(target);
                self.scopes.push(var.clone());
                self.walk(body);
                self.scopes.pop();
            }
            Expr::Unary { operand, .. } => self.walk(operand),
            Expr::Binary { lhs, rhs, .. } => {
                self.walk(lhs);
                self.walk(rhs);
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.walk(cond);
                self.walk(then);
                self.walk(otherwise);
            }
            Expr::List(items) => {
                for item in items {
                    self.walk(item);
                }
            }
            Expr::Map(entries) => {
                for (key, value) in entries {
                    self.walk(key);
                    self.walk(value);
                }
            }
        }
    }

    /// Fold a member/index chain into `(root identifier, accessor path)`
    /// and classify the root. Non-chain sub-expressions (dynamic indices,
    /// call receivers) are walked on their own.
    fn walk_accessor(&mut self, expr: &Expr) {
        let mut dynamic = Vec::new();
        match flatten(expr, &mut dynamic) {
            Some((root, path)) => self.classify_identifier(&root, &path),
            None => {
                // Not rooted at an identifier, e.g. `f(x).y` or `[1][0]`;
                // the interesting parts are inside.
                if let Expr::Member { object, .. } = expr {
                    self.walk(object);
                } else if let Expr::Index { object, index } = expr {
                    self.walk(object);
                    self.walk(index);
                }
            }
        }
        for sub in dynamic {
            self.walk(sub);
        }
    }

    fn classify_identifier(&mut self, root: &str, path: &str) {
        if self.scopes.iter().any(|scope| scope == root) {
            return;
        }
        if is_internal(root) {
            return;
        }
        if self.env.declares_variable(root) {
            self.resource_dependencies.insert(ResourceRef {
                id: root.to_string(),
                path: path.to_string(),
            });
            return;
        }
        self.unknown_resources.insert(root.to_string());
    }

    fn classify_call(&mut self, is_method: bool, function: &str) {
        if Builtin::is_builtin(function) {
            return;
        }
        if !is_method && self.env.declares_function(function) {
            self.function_calls.insert(function.to_string());
            return;
        }
        self.unknown_functions.insert(function.to_string());
    }
}

/// Internal identifiers introduced by comprehension lowering or host
/// machinery; never user-meaningful.
fn is_internal(name: &str) -> bool {
    name.starts_with('@') || name.starts_with("$$")
}

/// Flatten `a.b[0].c` into `("a", "a.b[0].c")`. Dynamic index
/// sub-expressions are collected for separate walking; a literal string
/// index renders in quoted form to keep the accessor faithful.
fn flatten<'e>(expr: &'e Expr, dynamic: &mut Vec<&'e Expr>) -> Option<(String, String)> {
    match expr {
        Expr::Ident(name) => Some((name.clone(), name.clone())),
        Expr::Member { object, field } => {
            let (root, path) = flatten(object, dynamic)?;
            Some((root, format!("{path}.{field}")))
        }
        Expr::Index { object, index } => {
            let (root, path) = flatten(object, dynamic)?;
            let rendered = match index.as_ref() {
                Expr::Literal(Literal::Int(n)) => format!("{path}[{n}]"),
                Expr::Literal(Literal::UInt(n)) => format!("{path}[{n}]"),
                Expr::Literal(Literal::String(s)) => format!("{path}[\"{s}\"]"),
                other => {
                    dynamic.push(other);
                    path
                }
            };
            Some((root, rendered))
        }
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Env;

    fn inspect(env: &Env, src: &str) -> Inspection {
        let program = env.compile(src).unwrap();
        Inspector::new(env).inspect(&program)
    }

    #[test]
    fn collects_resource_dependencies_with_paths() {
        let env = Env::new(["configmap", "schema"]);
        let inspection = inspect(&env, "configmap.data.DB_NAME + schema.spec.suffix");
        assert_eq!(
            inspection.resource_dependencies,
            vec![
                ResourceRef {
                    id: "configmap".to_string(),
                    path: "configmap.data.DB_NAME".to_string(),
                },
                ResourceRef {
                    id: "schema".to_string(),
                    path: "schema.spec.suffix".to_string(),
                },
            ]
        );
        assert!(inspection.unknown_resources.is_empty());
    }

    #[test]
    fn renders_index_accessors() {
        let env = Env::new(["deployment"]);
        let inspection = inspect(&env, "deployment.spec.containers[0].image");
        assert_eq!(
            inspection.resource_dependencies[0].path,
            "deployment.spec.containers[0].image"
        );

        let inspection = inspect(&env, "deployment.data[\"db.host\"]");
        assert_eq!(
            inspection.resource_dependencies[0].path,
            "deployment.data[\"db.host\"]"
        );
    }

    #[test]
    fn dynamic_index_walks_the_index_expression() {
        let env = Env::new(["deployment", "schema"]);
        let inspection = inspect(&env, "deployment.spec.containers[schema.spec.idx]");
        let ids = inspection.dependency_ids();
        assert_eq!(ids, vec!["deployment", "schema"]);
    }

    #[test]
    fn undeclared_identifiers_are_unknown_resources() {
        let env = Env::new(["a"]);
        let inspection = inspect(&env, "a.x + mystery.y");
        assert_eq!(inspection.unknown_resources, vec!["mystery"]);
    }

    #[test]
    fn comprehension_variables_are_scoped() {
        let env = Env::new(["deployment"]);
        let inspection = inspect(&env, "deployment.spec.ports.filter(p, p.port > 80)");
        assert_eq!(inspection.dependency_ids(), vec!["deployment"]);
        assert!(inspection.unknown_resources.is_empty());

        // Outside the comprehension the same name is unknown again.
        let inspection = inspect(&env, "deployment.spec.ports.map(p, p.name) + [p]");
        assert_eq!(inspection.unknown_resources, vec!["p"]);
    }

    #[test]
    fn internal_identifiers_are_ignored() {
        let env = Env::new(["a"]);
        let inspection = inspect(&env, "@result + $$accu + a.x");
        assert!(inspection.unknown_resources.is_empty());
        assert_eq!(inspection.dependency_ids(), vec!["a"]);
    }

    #[test]
    fn builtin_calls_are_known() {
        let env = Env::new(["a"]);
        let inspection = inspect(&env, "size(a.items) > 0 && a.name.matches('^x')");
        assert!(inspection.unknown_functions.is_empty());
        assert!(inspection.function_calls.is_empty());
    }

    #[test]
    fn declared_functions_are_recorded() {
        let env = Env::new(["a"]).with_functions(["lookup"]);
        let inspection = inspect(&env, "lookup(a.name)");
        assert_eq!(inspection.function_calls, vec!["lookup"]);
        assert!(inspection.unknown_functions.is_empty());
    }

    #[test]
    fn unknown_calls_are_reported() {
        let env = Env::new(["a"]);
        let inspection = inspect(&env, "frobnicate(a) + a.twiddle()");
        assert_eq!(inspection.unknown_functions, vec!["frobnicate", "twiddle"]);
    }

    #[test]
    fn duplicate_references_are_deduplicated() {
        let env = Env::new(["cm"]);
        let inspection = inspect(&env, "cm.data.a + cm.data.a + cm.data.b");
        assert_eq!(inspection.resource_dependencies.len(), 2);
        assert_eq!(inspection.dependency_ids(), vec!["cm"]);
    }
}
