//! Graph building: validate a [ResourceGraphDefinition], extract and
//! classify its expressions, infer the instance status schema, and emit a
//! dependency-ordered [Graph].

use crate::{
    dag::Dag,
    definition::{validate_resource_id, GroupVersionKind, InstanceDefinition, ResourceDefinition, ResourceGraphDefinition},
    error::BuildError,
    graph::Graph,
    resource::{Resource, ResourceVariable, VariableKind},
    INSTANCE_ID, SCHEMA_VARIABLE,
};
use indexmap::{IndexMap, IndexSet};
use lattice_expression::{scanner, Env, Inspector};
use lattice_schema::{
    emulator, path::Segment, schema::TYPE_OBJECT, simple::Transformer, walker, Schema,
};
use serde_json::{json, Map, Value};
use tracing::debug;

/// A resolved upstream schema plus the kind's scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    /// The kind's OpenAPI schema.
    pub schema: Schema,
    /// Whether objects of the kind live in a namespace.
    pub namespaced: bool,
}

/// Host-supplied schema lookup, consulted once per template at build
/// time.
pub trait SchemaResolver {
    /// Resolve the schema for a group/version/kind, or fail with the
    /// host's own error.
    fn resolve_schema(&self, gvk: &GroupVersionKind) -> anyhow::Result<ResolvedSchema>;
}

impl<F> SchemaResolver for F
where
    F: Fn(&GroupVersionKind) -> anyhow::Result<ResolvedSchema>,
{
    fn resolve_schema(&self, gvk: &GroupVersionKind) -> anyhow::Result<ResolvedSchema> {
        self(gvk)
    }
}

/// Builds validated [Graph]s out of [ResourceGraphDefinition]s.
#[derive(Debug, Clone)]
pub struct GraphBuilder<R> {
    resolver: R,
}

impl<R: SchemaResolver> GraphBuilder<R> {
    /// Create a [GraphBuilder] around a schema resolver.
    pub fn new(resolver: R) -> Self {
        GraphBuilder { resolver }
    }

    /// Build and validate the graph for a definition.
    pub fn build(&self, definition: &ResourceGraphDefinition) -> Result<Graph, BuildError> {
        let mut seen = IndexSet::new();
        for resource in &definition.resources {
            validate_resource_id(&resource.id)?;
            if !seen.insert(resource.id.as_str()) {
                return Err(BuildError::DuplicateResourceId(resource.id.clone()));
            }
        }

        let mut resources = IndexMap::with_capacity(definition.resources.len());
        let mut dag = Dag::new();
        for (order, resource_definition) in definition.resources.iter().enumerate() {
            let resource = self.build_resource(resource_definition, order)?;
            debug!(
                id = resource.id(),
                variables = resource.variables().len(),
                "extracted resource"
            );
            dag.add_vertex(resource.id(), order)?;
            resources.insert(resource.id().to_string(), resource);
        }

        let ids: Vec<String> = resources.keys().cloned().collect();
        let env = Env::new(ids.iter().cloned().chain([SCHEMA_VARIABLE.to_string()]));

        let mut instance = self.build_instance(&definition.schema, &env, &resources)?;
        classify_variables(&env, &mut instance, None)?;

        for resource in resources.values_mut() {
            let dependencies = classify_variables(&env, resource, Some(&mut dag))?;
            for dependency in dependencies {
                resource.add_dependency(dependency);
            }
            validate_conditions(&env, resource)?;
        }

        dry_run(&env, &resources, &instance)?;

        let topological_order = dag.topological_sort()?;
        debug!(order = ?topological_order, "resolved traversal order");

        Ok(Graph::new(dag, resources, instance, topological_order))
    }

    /// Unmarshal, schema-resolve, and extract one resource template.
    fn build_resource(
        &self,
        definition: &ResourceDefinition,
        order: usize,
    ) -> Result<Resource, BuildError> {
        let id = &definition.id;
        let template = definition
            .template
            .as_object()
            .ok_or_else(|| BuildError::InvalidTemplate {
                id: id.clone(),
                reason: "template must be an object".to_string(),
            })?;

        let api_version = template
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| BuildError::InvalidTemplate {
                id: id.clone(),
                reason: "template has no apiVersion".to_string(),
            })?;
        let kind = template
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| BuildError::InvalidTemplate {
                id: id.clone(),
                reason: "template has no kind".to_string(),
            })?;
        let metadata = template
            .get("metadata")
            .and_then(Value::as_object)
            .ok_or_else(|| BuildError::InvalidTemplate {
                id: id.clone(),
                reason: "template has no metadata".to_string(),
            })?;
        if !metadata.contains_key("name") && !metadata.contains_key("generateName") {
            return Err(BuildError::InvalidTemplate {
                id: id.clone(),
                reason: "metadata has neither name nor generateName".to_string(),
            });
        }

        let gvk = GroupVersionKind::from_api_version(api_version, kind);
        let ready_when = parse_conditions(id, &definition.ready_when)?;
        let include_when = parse_conditions(id, &definition.include_when)?;

        // CRD templates carry their own schemas; they are scanned for
        // stray expressions but never schema-validated or emulated.
        if gvk.is_crd() {
            let found = walker::parse_schemaless_resource(&definition.template).map_err(
                |source| BuildError::FieldExtraction {
                    id: id.clone(),
                    source,
                },
            )?;
            if !found.is_empty() {
                return Err(BuildError::InvalidTemplate {
                    id: id.clone(),
                    reason: "CustomResourceDefinition templates cannot contain expressions"
                        .to_string(),
                });
            }
            let mut variables = Vec::new();
            variables.extend(ready_when.iter().cloned().map(ResourceVariable::ready_when));
            return Ok(Resource::new(
                id.clone(),
                gvk,
                Schema::permissive(),
                definition.template.clone(),
                definition.template.clone(),
                variables,
                ready_when,
                include_when,
                false,
                order,
            ));
        }

        let resolved =
            self.resolver
                .resolve_schema(&gvk)
                .map_err(|source| BuildError::SchemaNotFound {
                    id: id.clone(),
                    gvk: gvk.to_string(),
                    source,
                })?;

        let mut emulated =
            emulator::generate_dummy(&resolved.schema).map_err(|source| BuildError::Emulation {
                id: id.clone(),
                source,
            })?;
        overlay_identity(&mut emulated, &gvk, id);

        let descriptors = walker::parse_resource(&definition.template, &resolved.schema)
            .map_err(|source| BuildError::FieldExtraction {
                id: id.clone(),
                source,
            })?;

        let mut variables: Vec<ResourceVariable> =
            descriptors.into_iter().map(ResourceVariable::new).collect();
        variables.extend(ready_when.iter().cloned().map(ResourceVariable::ready_when));

        Ok(Resource::new(
            id.clone(),
            gvk,
            resolved.schema,
            emulated,
            definition.template.clone(),
            variables,
            ready_when,
            include_when,
            resolved.namespaced,
            order,
        ))
    }

    /// Synthesize the instance resource: spec schema from the simple DSL,
    /// status descriptors from the schemaless walk, and a status schema
    /// inferred by dry-running every status expression against the
    /// emulated upstream objects.
    fn build_instance(
        &self,
        definition: &InstanceDefinition,
        env: &Env,
        resources: &IndexMap<String, Resource>,
    ) -> Result<Resource, BuildError> {
        let spec_schema = Transformer::new()
            .transform(&definition.spec)
            .map_err(BuildError::InvalidInstanceSchema)?;
        let emulated_spec =
            emulator::generate_dummy(&spec_schema).map_err(|source| BuildError::Emulation {
                id: INSTANCE_ID.to_string(),
                source,
            })?;

        let gvk = definition.gvk();
        let emulated = json!({
            "apiVersion": gvk.api_version(),
            "kind": gvk.kind.clone(),
            "metadata": {"name": INSTANCE_ID},
            "spec": emulated_spec,
        });

        let status = Value::Object(definition.status.clone());
        let descriptors = walker::parse_schemaless_resource(&status).map_err(|source| {
            BuildError::FieldExtraction {
                id: INSTANCE_ID.to_string(),
                source,
            }
        })?;

        // Dry-run inference binding: every upstream emulated object plus
        // the emulated instance under `schema`.
        let mut binding = Map::new();
        for (id, resource) in resources {
            binding.insert(id.clone(), resource.emulated().clone());
        }
        binding.insert(SCHEMA_VARIABLE.to_string(), emulated.clone());

        let inspector = Inspector::new(env);
        let mut status_schema = Schema::of_type(TYPE_OBJECT);
        for descriptor in &descriptors {
            if !descriptor.standalone {
                return Err(BuildError::NonStandaloneStatus {
                    path: descriptor.path.build(),
                });
            }
            let expression = &descriptor.expressions[0];
            let program =
                env.compile(expression)
                    .map_err(|source| BuildError::ExpressionCompile {
                        expression: expression.clone(),
                        source,
                    })?;
            let inspection = inspector.inspect(&program);
            reject_unknowns(expression, &inspection)?;

            let dependencies: Vec<String> = inspection
                .dependency_ids()
                .into_iter()
                .filter(|dep| dep != SCHEMA_VARIABLE)
                .collect();
            if dependencies.is_empty() {
                return Err(BuildError::StaticStatusExpression {
                    expression: expression.clone(),
                });
            }

            let leaf = match program.evaluate(&binding) {
                Ok(value) => schema_for_value(&value),
                Err(err) if err.is_incomplete_data() => Schema::permissive(),
                Err(source) => {
                    return Err(BuildError::DryRun {
                        expression: expression.clone(),
                        source,
                    });
                }
            };
            insert_status_property(&mut status_schema, descriptor.path.segments(), leaf);
        }
        default_status_fields(&mut status_schema);

        let mut instance_schema = Schema::of_type(TYPE_OBJECT);
        instance_schema
            .properties
            .insert("spec".to_string(), spec_schema);
        instance_schema
            .properties
            .insert("status".to_string(), status_schema);

        let variables = descriptors.into_iter().map(ResourceVariable::new).collect();
        let original = json!({
            "apiVersion": gvk.api_version(),
            "kind": gvk.kind.clone(),
        });

        Ok(Resource::new(
            INSTANCE_ID.to_string(),
            gvk,
            instance_schema,
            emulated,
            original,
            variables,
            Vec::new(),
            Vec::new(),
            true,
            resources.len(),
        ))
    }
}

/// Inspect every variable expression of a resource, promote dynamic
/// variables, and register DAG edges. Returns the resource's dependency
/// ids in first-use order.
fn classify_variables(
    env: &Env,
    resource: &mut Resource,
    mut dag: Option<&mut Dag>,
) -> Result<Vec<String>, BuildError> {
    let inspector = Inspector::new(env);
    let id = resource.id().to_string();
    let mut resource_dependencies = IndexSet::new();

    for variable in resource.variables_mut() {
        let mut dependencies = IndexSet::new();
        for expression in &variable.field().expressions {
            let program = env
                .compile(expression)
                .map_err(|source| BuildError::ExpressionCompile {
                    expression: expression.clone(),
                    source,
                })?;
            let inspection = inspector.inspect(&program);
            reject_unknowns(expression, &inspection)?;
            dependencies.extend(
                inspection
                    .dependency_ids()
                    .into_iter()
                    .filter(|dep| dep != SCHEMA_VARIABLE),
            );
        }

        match variable.kind() {
            VariableKind::ReadyWhen => {
                if dependencies.iter().any(|dep| *dep != id) {
                    return Err(BuildError::ForeignReadyWhenReference {
                        id: id.clone(),
                        expression: variable.field().expressions[0].clone(),
                    });
                }
            }
            _ => {
                let dependencies: Vec<String> = dependencies.into_iter().collect();
                if let Some(dag) = dag.as_deref_mut() {
                    dag.add_dependencies(&id, &dependencies)?;
                }
                resource_dependencies.extend(dependencies.iter().cloned());
                variable.promote_to_dynamic(dependencies);
            }
        }
    }

    Ok(resource_dependencies.into_iter().collect())
}

/// Validate includeWhen conditions: compile, no unknowns, and no resource
/// references at all.
fn validate_conditions(env: &Env, resource: &Resource) -> Result<(), BuildError> {
    let inspector = Inspector::new(env);
    for expression in resource.include_when() {
        let program = env
            .compile(expression)
            .map_err(|source| BuildError::ExpressionCompile {
                expression: expression.clone(),
                source,
            })?;
        let inspection = inspector.inspect(&program);
        reject_unknowns(expression, &inspection)?;
        if inspection
            .dependency_ids()
            .iter()
            .any(|dep| dep != SCHEMA_VARIABLE)
        {
            return Err(BuildError::NonStaticIncludeWhen {
                id: resource.id().to_string(),
                expression: expression.clone(),
            });
        }
    }
    Ok(())
}

/// Dry-run every expression of every resource against the emulated
/// upstream objects, with the resource itself excluded from its own
/// binding. Conditions must additionally come out boolean.
fn dry_run(
    env: &Env,
    resources: &IndexMap<String, Resource>,
    instance: &Resource,
) -> Result<(), BuildError> {
    let mut stripped = instance.emulated().clone();
    if let Some(map) = stripped.as_object_mut() {
        map.remove("apiVersion");
        map.remove("kind");
        map.remove("status");
    }

    for (id, resource) in resources {
        let mut binding = Map::new();
        for (other_id, other) in resources {
            if other_id != id {
                binding.insert(other_id.clone(), other.emulated().clone());
            }
        }
        binding.insert(SCHEMA_VARIABLE.to_string(), stripped.clone());

        for variable in resource.variables() {
            if variable.kind() == VariableKind::ReadyWhen {
                continue;
            }
            for expression in &variable.field().expressions {
                let program =
                    env.compile(expression)
                        .map_err(|source| BuildError::ExpressionCompile {
                            expression: expression.clone(),
                            source,
                        })?;
                match program.evaluate(&binding) {
                    Ok(_) => {}
                    Err(err) if err.is_incomplete_data() => {}
                    Err(source) => {
                        return Err(BuildError::DryRun {
                            expression: expression.clone(),
                            source,
                        });
                    }
                }
            }
        }

        // readyWhen sees only the resource's own emulated object plus the
        // instance spec; siblings are out of scope.
        let mut ready_binding = Map::new();
        ready_binding.insert(id.clone(), resource.emulated().clone());
        ready_binding.insert(SCHEMA_VARIABLE.to_string(), stripped.clone());
        for expression in resource.ready_when() {
            check_boolean_condition(env, &ready_binding, id, expression)?;
        }

        // includeWhen sees only the instance spec.
        let mut include_binding = Map::new();
        include_binding.insert(SCHEMA_VARIABLE.to_string(), stripped.clone());
        for expression in resource.include_when() {
            check_boolean_condition(env, &include_binding, id, expression)?;
        }
    }

    Ok(())
}

fn check_boolean_condition(
    env: &Env,
    binding: &Map<String, Value>,
    id: &str,
    expression: &str,
) -> Result<(), BuildError> {
    let program = env
        .compile(expression)
        .map_err(|source| BuildError::ExpressionCompile {
            expression: expression.to_string(),
            source,
        })?;
    match program.evaluate(binding) {
        Ok(Value::Bool(_)) => Ok(()),
        Ok(other) => Err(BuildError::NonBooleanCondition {
            id: id.to_string(),
            expression: expression.to_string(),
            found: value_kind(&other).to_string(),
        }),
        Err(err) if err.is_incomplete_data() => Ok(()),
        Err(source) => Err(BuildError::DryRun {
            expression: expression.to_string(),
            source,
        }),
    }
}

/// Each condition entry must be exactly one standalone `${…}` expression;
/// returns the inner expression texts.
fn parse_conditions(id: &str, conditions: &[String]) -> Result<Vec<String>, BuildError> {
    conditions
        .iter()
        .map(|condition| {
            let standalone =
                scanner::is_standalone(condition).map_err(|_| BuildError::NonStandaloneCondition {
                    id: id.to_string(),
                    condition: condition.clone(),
                })?;
            if !standalone {
                return Err(BuildError::NonStandaloneCondition {
                    id: id.to_string(),
                    condition: condition.clone(),
                });
            }
            let mut found =
                scanner::extract(condition).map_err(|_| BuildError::NonStandaloneCondition {
                    id: id.to_string(),
                    condition: condition.clone(),
                })?;
            Ok(found.remove(0))
        })
        .collect()
}

fn reject_unknowns(
    expression: &str,
    inspection: &lattice_expression::Inspection,
) -> Result<(), BuildError> {
    if !inspection.unknown_resources.is_empty() {
        return Err(BuildError::UndeclaredResource {
            expression: expression.to_string(),
            ids: inspection.unknown_resources.clone(),
        });
    }
    if !inspection.unknown_functions.is_empty() {
        return Err(BuildError::UndeclaredFunction {
            expression: expression.to_string(),
            names: inspection.unknown_functions.clone(),
        });
    }
    Ok(())
}

/// Give an emulated object its identity fields so expressions over
/// `metadata`/`apiVersion`/`kind` dry-run realistically.
fn overlay_identity(emulated: &mut Value, gvk: &GroupVersionKind, id: &str) {
    let Some(map) = emulated.as_object_mut() else {
        return;
    };
    map.insert("apiVersion".to_string(), json!(gvk.api_version()));
    map.insert("kind".to_string(), json!(gvk.kind.clone()));
    let metadata = map
        .entry("metadata".to_string())
        .or_insert_with(|| json!({}));
    if let Some(metadata) = metadata.as_object_mut() {
        metadata
            .entry("name".to_string())
            .or_insert_with(|| json!(format!("{id}-emulated")));
    }
}

/// The schema a dry-run value implies for a status field.
fn schema_for_value(value: &Value) -> Schema {
    match value {
        Value::Bool(_) => Schema::of_type("boolean"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Schema::of_type("integer"),
        Value::Number(_) => Schema::of_type("number"),
        Value::String(_) => Schema::of_type("string"),
        Value::Array(_) => {
            let mut schema = Schema::of_type("array");
            schema.items = Some(Box::new(Schema::permissive()));
            schema
        }
        _ => Schema::permissive(),
    }
}

/// Grow the status schema along a descriptor path, creating object and
/// array levels as the segments dictate.
fn insert_status_property(schema: &mut Schema, segments: &[Segment], leaf: Schema) {
    let Some((segment, rest)) = segments.split_first() else {
        *schema = leaf;
        return;
    };
    match segment {
        Segment::Field(name) => {
            if schema.types.is_empty() {
                schema.types = vec![TYPE_OBJECT.to_string()];
            }
            let child = schema
                .properties
                .entry(name.clone())
                .or_insert_with(Schema::default);
            insert_status_property(child, rest, leaf);
        }
        Segment::Index(_) => {
            if schema.types.is_empty() {
                schema.types = vec!["array".to_string()];
            }
            let items = schema.items.get_or_insert_with(Default::default);
            insert_status_property(items.as_mut(), rest, leaf);
        }
    }
}

/// Standard status fields present on every instance; user-inferred fields
/// win on collision.
fn default_status_fields(status: &mut Schema) {
    if !status.properties.contains_key("state") {
        status
            .properties
            .insert("state".to_string(), Schema::of_type("string"));
    }
    if !status.properties.contains_key("conditions") {
        let mut condition = Schema::of_type(TYPE_OBJECT);
        for field in ["type", "status", "reason", "message", "lastTransitionTime"] {
            condition
                .properties
                .insert(field.to_string(), Schema::of_type("string"));
        }
        let mut conditions = Schema::of_type("array");
        conditions.items = Some(Box::new(condition));
        status
            .properties
            .insert("conditions".to_string(), conditions);
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
