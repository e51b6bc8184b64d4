//! Built resources: templates paired with their extracted variables,
//! conditions, schema, and dependency set.

use crate::definition::GroupVersionKind;
use indexmap::IndexSet;
use lattice_schema::{FieldDescriptor, Schema};
use serde_json::Value;

/// How a variable participates in resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Depends only on the instance spec; evaluable the moment the
    /// runtime is constructed.
    Static,
    /// Depends on at least one other resource; evaluable once those
    /// resources are reported.
    Dynamic,
    /// A readiness condition; evaluated on demand against the reported
    /// object rather than substituted into the template.
    ReadyWhen,
}

impl VariableKind {
    /// Whether this variable's value gets substituted into the template.
    pub fn is_substituted(&self) -> bool {
        matches!(self, VariableKind::Static | VariableKind::Dynamic)
    }
}

/// One expression-bearing field of a resource, classified.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceVariable {
    field: FieldDescriptor,
    kind: VariableKind,
    dependencies: Vec<String>,
}

impl ResourceVariable {
    /// Create a variable for an extracted field; every field variable
    /// starts [Static] until the graph builder finds resource
    /// dependencies in it.
    ///
    /// [Static]: VariableKind::Static
    pub fn new(field: FieldDescriptor) -> Self {
        ResourceVariable {
            field,
            kind: VariableKind::Static,
            dependencies: Vec::new(),
        }
    }

    /// Create a readiness-condition variable from its expression text.
    pub fn ready_when(expression: String) -> Self {
        ResourceVariable {
            field: FieldDescriptor {
                path: lattice_schema::Path::default(),
                expressions: vec![expression],
                expected_types: IndexSet::from(["boolean".to_string()]),
                expected_schema: None,
                standalone: true,
            },
            kind: VariableKind::ReadyWhen,
            dependencies: Vec::new(),
        }
    }

    /// The underlying field descriptor.
    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    /// The variable's kind.
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Resource ids this variable's expressions reference.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Promote to [Dynamic] with the discovered dependency ids.
    ///
    /// [Dynamic]: VariableKind::Dynamic
    pub fn promote_to_dynamic(&mut self, dependencies: Vec<String>) {
        if self.kind == VariableKind::Static && !dependencies.is_empty() {
            self.kind = VariableKind::Dynamic;
        }
        self.dependencies = dependencies;
    }
}

/// A resource after graph building: template, schema, variables,
/// conditions, and dependency set.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    id: String,
    gvk: GroupVersionKind,
    schema: Schema,
    emulated: Value,
    original: Value,
    variables: Vec<ResourceVariable>,
    ready_when: Vec<String>,
    include_when: Vec<String>,
    dependencies: IndexSet<String>,
    namespaced: bool,
    order: usize,
}

impl Resource {
    /// Assemble a built resource.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        gvk: GroupVersionKind,
        schema: Schema,
        emulated: Value,
        original: Value,
        variables: Vec<ResourceVariable>,
        ready_when: Vec<String>,
        include_when: Vec<String>,
        namespaced: bool,
        order: usize,
    ) -> Self {
        Resource {
            id,
            gvk,
            schema,
            emulated,
            original,
            variables,
            ready_when,
            include_when,
            dependencies: IndexSet::new(),
            namespaced,
            order,
        }
    }

    /// The resource id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The template's group/version/kind.
    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    /// The resolved schema the template was validated against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The emulated dummy object used for build-time dry runs.
    pub fn emulated(&self) -> &Value {
        &self.emulated
    }

    /// The template as authored, untouched.
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// The extracted variables.
    pub fn variables(&self) -> &[ResourceVariable] {
        &self.variables
    }

    /// Mutable access for the graph builder's classification pass.
    pub(crate) fn variables_mut(&mut self) -> &mut [ResourceVariable] {
        &mut self.variables
    }

    /// Readiness-condition expressions (inner text, delimiters stripped).
    pub fn ready_when(&self) -> &[String] {
        &self.ready_when
    }

    /// Inclusion-condition expressions (inner text, delimiters stripped).
    pub fn include_when(&self) -> &[String] {
        &self.include_when
    }

    /// Ids of the resources this resource depends on.
    pub fn dependencies(&self) -> &IndexSet<String> {
        &self.dependencies
    }

    /// Record a dependency edge discovered during classification.
    pub(crate) fn add_dependency(&mut self, id: String) {
        self.dependencies.insert(id);
    }

    /// Whether the resolved schema says this kind is namespaced.
    pub fn namespaced(&self) -> bool {
        self.namespaced
    }

    /// Authoring position; tiebreak for topological ordering.
    pub fn order(&self) -> usize {
        self.order
    }
}
