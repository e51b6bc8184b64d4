//! Per-pass incremental resolution of a built [Graph] against a live
//! cluster view.
//!
//! A [Runtime] is constructed per reconciliation pass and discarded at
//! the end of it. The caller walks [Graph::topological_order], asks
//! [Runtime::get_resource] for whatever is substitutable, applies it,
//! reports observations back through [Runtime::set_resource], and calls
//! [Runtime::synchronize] between steps until it reports a fixed point.
//!
//! Expression states are shared by identity: every occurrence of the same
//! expression text, across all resources, points at a single cache entry,
//! so one resolution marks them all resolved.

use crate::{
    error::RuntimeError,
    graph::Graph,
    resource::VariableKind,
    INSTANCE_ID, SCHEMA_VARIABLE,
};
use indexmap::{IndexMap, IndexSet};
use lattice_expression::{Env, EvalError, Program};
use lattice_schema::{
    path::{get_value, upsert_value, Segment},
    Path,
};
use serde_json::{Map, Value};
use std::{cell::RefCell, rc::Rc};
use tracing::debug;

/// Whether a resource's template is fully substituted or still waiting on
/// upstream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// All variables and all dependencies are resolved; the returned
    /// object is ready to be applied.
    Resolved,
    /// At least one variable or dependency is still unresolved.
    WaitingOnDependencies,
}

/// One cached expression, shared by every variable occurrence carrying
/// the same text.
#[derive(Debug)]
struct ExpressionState {
    expression: String,
    kind: VariableKind,
    dependencies: Vec<String>,
    program: Program,
    resolved: bool,
    resolved_value: Option<Value>,
}

type SharedExpression = Rc<RefCell<ExpressionState>>;

/// Incremental resolver over a borrowed, immutable [Graph].
///
/// Owns the instance object and the working resource templates it
/// mutates during substitution. Not thread-safe by design; a pass is
/// single-threaded and the state dies with it.
#[derive(Debug)]
pub struct Runtime<'g> {
    graph: &'g Graph,
    instance: Value,
    resources: IndexMap<String, Value>,
    resolved_objects: IndexMap<String, Value>,
    expression_cache: IndexMap<String, SharedExpression>,
    variables_by_resource: IndexMap<String, Vec<SharedExpression>>,
    ready_programs: IndexMap<String, Vec<Program>>,
    include_programs: IndexMap<String, Vec<Program>>,
    ignored_by_condition: IndexSet<String>,
}

impl<'g> Runtime<'g> {
    /// Construct the pass state for a graph and the live instance object,
    /// then immediately evaluate static variables against
    /// `schema = instance` and propagate what already resolves.
    pub fn new(graph: &'g Graph, instance: Value) -> Result<Self, RuntimeError> {
        let env = Env::new(
            graph
                .resources()
                .keys()
                .cloned()
                .chain([SCHEMA_VARIABLE.to_string()]),
        );

        let mut expression_cache: IndexMap<String, SharedExpression> = IndexMap::new();
        let mut variables_by_resource: IndexMap<String, Vec<SharedExpression>> = IndexMap::new();
        let mut ready_programs = IndexMap::new();
        let mut include_programs = IndexMap::new();

        let all = graph
            .resources()
            .values()
            .chain(std::iter::once(graph.instance()));
        for resource in all {
            let mut entries = Vec::new();
            for variable in resource.variables() {
                if !variable.kind().is_substituted() {
                    continue;
                }
                for expression in &variable.field().expressions {
                    let entry = match expression_cache.get(expression) {
                        Some(entry) => Rc::clone(entry),
                        None => {
                            let program = compile(&env, expression)?;
                            let entry = Rc::new(RefCell::new(ExpressionState {
                                expression: expression.clone(),
                                kind: variable.kind(),
                                dependencies: variable.dependencies().to_vec(),
                                program,
                                resolved: false,
                                resolved_value: None,
                            }));
                            expression_cache.insert(expression.clone(), Rc::clone(&entry));
                            entry
                        }
                    };
                    entries.push(entry);
                }
            }
            variables_by_resource.insert(resource.id().to_string(), entries);

            if resource.id() != INSTANCE_ID {
                let ready = resource
                    .ready_when()
                    .iter()
                    .map(|expression| compile(&env, expression))
                    .collect::<Result<Vec<_>, _>>()?;
                ready_programs.insert(resource.id().to_string(), ready);
                let include = resource
                    .include_when()
                    .iter()
                    .map(|expression| compile(&env, expression))
                    .collect::<Result<Vec<_>, _>>()?;
                include_programs.insert(resource.id().to_string(), include);
            }
        }

        let resources = graph
            .resources()
            .iter()
            .map(|(id, resource)| (id.clone(), resource.original().clone()))
            .collect();

        let mut runtime = Runtime {
            graph,
            instance,
            resources,
            resolved_objects: IndexMap::new(),
            expression_cache,
            variables_by_resource,
            ready_programs,
            include_programs,
            ignored_by_condition: IndexSet::new(),
        };

        runtime.evaluate_static_variables()?;
        runtime.propagate_resource_variables()?;
        Ok(runtime)
    }

    /// One forward resolution pass. Returns `false` once every cached
    /// expression is resolved and every non-ignored resource has been
    /// reported; `true` asks the caller to keep going.
    pub fn synchronize(&mut self) -> Result<bool, RuntimeError> {
        if self.all_expressions_resolved() && self.all_resources_reported() {
            return Ok(false);
        }

        self.evaluate_dynamic_variables()?;
        self.propagate_resource_variables()?;
        self.evaluate_instance_statuses()?;
        Ok(true)
    }

    /// The resource's current template, if fully substituted.
    pub fn get_resource(&self, id: &str) -> Result<(Option<&Value>, ResourceState), RuntimeError> {
        if !self.resources.contains_key(id) {
            return Err(RuntimeError::UnknownResource(id.to_string()));
        }
        if self.resource_resolved(id) {
            Ok((self.resources.get(id), ResourceState::Resolved))
        } else {
            Ok((None, ResourceState::WaitingOnDependencies))
        }
    }

    /// Report a resource as observed/applied in the cluster; its value
    /// becomes available to downstream expressions on the next
    /// [synchronize].
    ///
    /// [synchronize]: Runtime::synchronize
    pub fn set_resource(&mut self, id: &str, object: Value) -> Result<(), RuntimeError> {
        if !self.resources.contains_key(id) {
            return Err(RuntimeError::UnknownResource(id.to_string()));
        }
        debug!(id, "resource reported");
        self.resolved_objects.insert(id.to_string(), object);
        Ok(())
    }

    /// Evaluate the resource's readiness conditions against its reported
    /// object. Returns the first failing expression as the reason.
    pub fn is_resource_ready(&self, id: &str) -> Result<(bool, Option<String>), RuntimeError> {
        let resource = self
            .graph
            .resource(id)
            .ok_or_else(|| RuntimeError::UnknownResource(id.to_string()))?;
        let Some(observed) = self.resolved_objects.get(id) else {
            return Ok((false, Some(format!("resource `{id}` has not been observed yet"))));
        };

        let mut binding = Map::new();
        binding.insert(id.to_string(), observed.clone());
        binding.insert(SCHEMA_VARIABLE.to_string(), self.instance.clone());

        let programs = self.ready_programs.get(id).map(Vec::as_slice).unwrap_or(&[]);
        for (program, expression) in programs.iter().zip(resource.ready_when()) {
            match program.evaluate(&binding) {
                Ok(Value::Bool(true)) => {}
                Ok(Value::Bool(false)) => return Ok((false, Some(expression.clone()))),
                Ok(other) => {
                    return Err(RuntimeError::ExpressionEval {
                        expression: expression.clone(),
                        source: EvalError::TypeMismatch {
                            context: "readyWhen".to_string(),
                            expected: "bool".to_string(),
                            found: kind_of(&other).to_string(),
                        },
                    });
                }
                Err(err) if err.is_incomplete_data() => {
                    return Ok((false, Some(expression.clone())));
                }
                Err(source) => {
                    return Err(RuntimeError::ExpressionEval {
                        expression: expression.clone(),
                        source,
                    });
                }
            }
        }
        Ok((true, None))
    }

    /// Evaluate the resource's inclusion conditions against the instance
    /// spec. A `false` result is recorded, and every resource downstream
    /// of an ignored resource is ignored in turn.
    pub fn want_to_create_resource(&mut self, id: &str) -> Result<bool, RuntimeError> {
        let resource = self
            .graph
            .resource(id)
            .ok_or_else(|| RuntimeError::UnknownResource(id.to_string()))?;

        if resource
            .dependencies()
            .iter()
            .any(|dep| self.ignored_by_condition.contains(dep))
        {
            debug!(id, "ignored: upstream dependency is ignored");
            self.ignored_by_condition.insert(id.to_string());
            return Ok(false);
        }

        let mut binding = Map::new();
        binding.insert(SCHEMA_VARIABLE.to_string(), self.instance.clone());

        let programs = self.include_programs.get(id).map(Vec::as_slice).unwrap_or(&[]);
        for (program, expression) in programs.iter().zip(resource.include_when()) {
            match program.evaluate(&binding) {
                Ok(Value::Bool(true)) => {}
                Ok(Value::Bool(false)) => {
                    debug!(id, expression = %expression, "ignored by condition");
                    self.ignored_by_condition.insert(id.to_string());
                    return Ok(false);
                }
                Ok(other) => {
                    return Err(RuntimeError::ExpressionEval {
                        expression: expression.clone(),
                        source: EvalError::TypeMismatch {
                            context: "includeWhen".to_string(),
                            expected: "bool".to_string(),
                            found: kind_of(&other).to_string(),
                        },
                    });
                }
                Err(source) => {
                    return Err(RuntimeError::ExpressionEval {
                        expression: expression.clone(),
                        source,
                    });
                }
            }
        }
        Ok(true)
    }

    /// The instance object, including whatever status has been
    /// aggregated so far.
    pub fn instance(&self) -> &Value {
        &self.instance
    }

    /// Resources skipped by includeWhen, directly or by cascade.
    pub fn ignored_by_condition(&self) -> &IndexSet<String> {
        &self.ignored_by_condition
    }

    /// Whether every variable of the resource and of its dependencies is
    /// resolved.
    fn resource_resolved(&self, id: &str) -> bool {
        let Some(resource) = self.graph.resource(id) else {
            return false;
        };
        self.resource_variables_resolved(id)
            && resource
                .dependencies()
                .iter()
                .all(|dep| self.resource_variables_resolved(dep))
    }

    fn resource_variables_resolved(&self, id: &str) -> bool {
        self.variables_by_resource
            .get(id)
            .map(|entries| entries.iter().all(|entry| entry.borrow().resolved))
            .unwrap_or(false)
    }

    fn all_expressions_resolved(&self) -> bool {
        self.expression_cache
            .values()
            .all(|entry| entry.borrow().resolved)
    }

    fn all_resources_reported(&self) -> bool {
        self.graph.resources().keys().all(|id| {
            self.ignored_by_condition.contains(id) || self.resolved_objects.contains_key(id)
        })
    }

    /// Evaluate every static expression against `schema = instance`.
    /// Missing optional spec fields leave the entry unresolved rather
    /// than failing the pass.
    fn evaluate_static_variables(&mut self) -> Result<(), RuntimeError> {
        let mut binding = Map::new();
        binding.insert(SCHEMA_VARIABLE.to_string(), self.instance.clone());

        for entry in self.expression_cache.values() {
            let mut state = entry.borrow_mut();
            if state.resolved || state.kind != VariableKind::Static {
                continue;
            }
            match state.program.evaluate(&binding) {
                Ok(value) => {
                    state.resolved = true;
                    state.resolved_value = Some(value);
                }
                Err(err) if err.is_incomplete_data() => {}
                Err(source) => {
                    return Err(RuntimeError::ExpressionEval {
                        expression: state.expression.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Evaluate every unresolved dynamic expression whose dependencies
    /// have all been reported. Incomplete data is a retry signal, never a
    /// pass failure.
    fn evaluate_dynamic_variables(&mut self) -> Result<(), RuntimeError> {
        let mut newly_resolved = 0usize;
        for entry in self.expression_cache.values() {
            let mut state = entry.borrow_mut();
            if state.resolved || state.kind != VariableKind::Dynamic {
                continue;
            }
            if !state
                .dependencies
                .iter()
                .all(|dep| self.resolved_objects.contains_key(dep))
            {
                continue;
            }

            let mut binding = Map::new();
            for dep in &state.dependencies {
                if let Some(object) = self.resolved_objects.get(dep) {
                    binding.insert(dep.clone(), object.clone());
                }
            }
            binding.insert(SCHEMA_VARIABLE.to_string(), self.instance.clone());

            match state.program.evaluate(&binding) {
                Ok(value) => {
                    state.resolved = true;
                    state.resolved_value = Some(value);
                    newly_resolved += 1;
                }
                Err(err) if err.is_incomplete_data() => {
                    debug!(
                        expression = %state.expression,
                        "dependencies reported but data still incomplete"
                    );
                }
                Err(source) => {
                    return Err(RuntimeError::ExpressionEval {
                        expression: state.expression.clone(),
                        source,
                    });
                }
            }
        }
        if newly_resolved > 0 {
            debug!(newly_resolved, "dynamic expressions resolved");
        }
        Ok(())
    }

    /// Rewrite the template of every resource whose variables and
    /// dependencies are fully resolved: standalone fields take the raw
    /// native value, interpolated fields take string substitution.
    fn propagate_resource_variables(&mut self) -> Result<(), RuntimeError> {
        let graph = self.graph;
        for id in graph.topological_order() {
            if self.ignored_by_condition.contains(id) {
                continue;
            }
            if !self.resource_resolved(id) {
                continue;
            }
            let Some(resource) = graph.resource(id) else {
                continue;
            };

            let mut template = resource.original().clone();
            for variable in resource.variables() {
                if !variable.kind().is_substituted() {
                    continue;
                }
                self.substitute(&mut template, variable.field())?;
            }
            self.resources.insert(id.clone(), template);
        }
        Ok(())
    }

    fn substitute(
        &self,
        template: &mut Value,
        field: &lattice_schema::FieldDescriptor,
    ) -> Result<(), RuntimeError> {
        if field.standalone {
            let value = self.resolved_value(&field.expressions[0])?;
            return upsert_value(template, &field.path, value).map_err(|source| {
                RuntimeError::Substitution {
                    path: field.path.build(),
                    source,
                }
            });
        }

        let current = get_value(template, &field.path)
            .map_err(|source| RuntimeError::Substitution {
                path: field.path.build(),
                source,
            })?
            .clone();
        let Value::String(mut text) = current else {
            return Err(RuntimeError::Substitution {
                path: field.path.build(),
                source: lattice_schema::Error::TypeMismatch {
                    path: field.path.build(),
                    expected: "string".to_string(),
                    found: "non-string value".to_string(),
                },
            });
        };
        for expression in &field.expressions {
            let value = self.resolved_value(expression)?;
            text = text.replace(&format!("${{{expression}}}"), &stringify(&value));
        }
        upsert_value(template, &field.path, Value::String(text)).map_err(|source| {
            RuntimeError::Substitution {
                path: field.path.build(),
                source,
            }
        })
    }

    fn resolved_value(&self, expression: &str) -> Result<Value, RuntimeError> {
        let entry = self
            .expression_cache
            .get(expression)
            .ok_or_else(|| RuntimeError::UnresolvedSubstitution(expression.to_string()))?;
        let state = entry.borrow();
        if !state.resolved {
            return Err(RuntimeError::UnresolvedSubstitution(expression.to_string()));
        }
        Ok(state.resolved_value.clone().unwrap_or(Value::Null))
    }

    /// Best-effort status aggregation: every resolved instance variable
    /// lands at `status.<path>`; unresolved ones are left untouched.
    fn evaluate_instance_statuses(&mut self) -> Result<(), RuntimeError> {
        let instance_resource = self.graph.instance();
        for variable in instance_resource.variables() {
            let field = variable.field();
            let Some(entry) = self.expression_cache.get(&field.expressions[0]) else {
                continue;
            };
            let state = entry.borrow();
            if !state.resolved {
                continue;
            }
            let value = state.resolved_value.clone().unwrap_or(Value::Null);

            let mut segments = vec![Segment::field("status")];
            segments.extend(field.path.segments().iter().cloned());
            let status_path = Path::new(segments);
            upsert_value(&mut self.instance, &status_path, value).map_err(|source| {
                RuntimeError::Substitution {
                    path: status_path.build(),
                    source,
                }
            })?;
        }
        Ok(())
    }
}

fn compile(env: &Env, expression: &str) -> Result<Program, RuntimeError> {
    env.compile(expression)
        .map_err(|source| RuntimeError::ExpressionCompile {
            expression: expression.to_string(),
            source,
        })
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
