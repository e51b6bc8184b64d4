//! The immutable, validated resource graph produced by the
//! [GraphBuilder].
//!
//! [GraphBuilder]: crate::GraphBuilder

use crate::{dag::Dag, resource::Resource};
use indexmap::IndexMap;

/// A validated DAG of resources plus the synthesized instance resource.
///
/// Immutable after build; safe to share across threads and across
/// reconciliation passes. Each pass constructs its own [Runtime] on top.
///
/// [Runtime]: crate::Runtime
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    dag: Dag,
    resources: IndexMap<String, Resource>,
    instance: Resource,
    topological_order: Vec<String>,
}

impl Graph {
    pub(crate) fn new(
        dag: Dag,
        resources: IndexMap<String, Resource>,
        instance: Resource,
        topological_order: Vec<String>,
    ) -> Self {
        Graph {
            dag,
            resources,
            instance,
            topological_order,
        }
    }

    /// The dependency DAG over resource ids.
    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// The built resources, keyed by id, in authoring order.
    pub fn resources(&self) -> &IndexMap<String, Resource> {
        &self.resources
    }

    /// A resource by id.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// The synthesized instance resource.
    pub fn instance(&self) -> &Resource {
        &self.instance
    }

    /// Dependency-respecting traversal order, stable with respect to
    /// authoring order.
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    /// Number of resources (excluding the instance).
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the graph has no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
