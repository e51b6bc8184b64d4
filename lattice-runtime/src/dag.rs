//! Directed acyclic graph over resource ids, preserving authoring order.
//!
//! The sort is a Kahn traversal that always picks, among the vertices
//! whose dependencies are already placed, the one with the smallest
//! authoring order. The result follows the user's authoring order exactly
//! wherever topology permits, deviating only when a dependency forces it.

use crate::error::DagError;
use indexmap::{IndexMap, IndexSet};

/// One vertex: its authoring order and the ids it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vertex {
    /// Authoring position, used as the topological tiebreak.
    pub order: usize,
    /// Ids this vertex depends on.
    pub depends_on: IndexSet<String>,
}

/// A DAG of resource ids with cycle rejection on edge insertion and a
/// deterministic, authoring-order-stable topological sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dag {
    vertices: IndexMap<String, Vertex>,
}

impl Dag {
    /// Create an empty [Dag].
    pub fn new() -> Self {
        Dag::default()
    }

    /// Add a vertex with its authoring order.
    pub fn add_vertex(&mut self, id: &str, order: usize) -> Result<(), DagError> {
        if self.vertices.contains_key(id) {
            return Err(DagError::DuplicateVertex(id.to_string()));
        }
        self.vertices.insert(
            id.to_string(),
            Vertex {
                order,
                depends_on: IndexSet::new(),
            },
        );
        Ok(())
    }

    /// Add dependency edges `id -> dep`. Every dependency must already be
    /// a vertex; self-loops and edges that would close a cycle are
    /// rejected.
    pub fn add_dependencies<I, S>(&mut self, id: &str, dependencies: I) -> Result<(), DagError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.vertices.contains_key(id) {
            return Err(DagError::UnknownDependency {
                id: id.to_string(),
                dependency: id.to_string(),
            });
        }

        let mut checked = Vec::new();
        for dependency in dependencies {
            let dependency = dependency.as_ref();
            if dependency == id {
                return Err(DagError::SelfReference(id.to_string()));
            }
            if !self.vertices.contains_key(dependency) {
                return Err(DagError::UnknownDependency {
                    id: id.to_string(),
                    dependency: dependency.to_string(),
                });
            }
            // Adding id -> dependency closes a cycle iff id is already
            // reachable from the dependency.
            if self.reaches(dependency, id) {
                let mut cycle = self.path(dependency, id).unwrap_or_default();
                cycle.push(dependency.to_string());
                return Err(DagError::Cycle { cycle });
            }
            checked.push(dependency.to_string());
        }
        if let Some(vertex) = self.vertices.get_mut(id) {
            vertex.depends_on.extend(checked);
        }
        Ok(())
    }

    /// Whether `id` is a vertex.
    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// The vertex for `id`, if present.
    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    /// Topologically sort the graph: dependencies first, authoring order
    /// as the tiebreak among ready vertices.
    pub fn topological_sort(&self) -> Result<Vec<String>, DagError> {
        let mut placed: IndexSet<&str> = IndexSet::with_capacity(self.vertices.len());
        let mut result = Vec::with_capacity(self.vertices.len());

        while result.len() < self.vertices.len() {
            let next = self
                .vertices
                .iter()
                .filter(|(id, vertex)| {
                    !placed.contains(id.as_str())
                        && vertex
                            .depends_on
                            .iter()
                            .all(|dep| placed.contains(dep.as_str()))
                })
                .min_by_key(|(_, vertex)| vertex.order);

            match next {
                Some((id, _)) => {
                    placed.insert(id.as_str());
                    result.push(id.clone());
                }
                None => {
                    // Everything unplaced is part of (or downstream of) a
                    // cycle; report one concrete cycle.
                    let cycle = self
                        .find_cycle()
                        .unwrap_or_else(|| vec!["<unknown>".to_string()]);
                    return Err(DagError::Cycle { cycle });
                }
            }
        }

        Ok(result)
    }

    /// Whether `to` is reachable from `from` along dependency edges.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen: IndexSet<&str> = IndexSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(vertex) = self.vertices.get(current) {
                stack.extend(vertex.depends_on.iter().map(String::as_str));
            }
        }
        false
    }

    /// A concrete dependency path from `from` to `to`, if one exists.
    fn path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut trail = Vec::new();
        let mut seen = IndexSet::new();
        if self.dfs_path(from, to, &mut trail, &mut seen) {
            Some(trail)
        } else {
            None
        }
    }

    fn dfs_path<'a>(
        &'a self,
        current: &'a str,
        to: &str,
        trail: &mut Vec<String>,
        seen: &mut IndexSet<&'a str>,
    ) -> bool {
        if !seen.insert(current) {
            return false;
        }
        trail.push(current.to_string());
        if current == to {
            return true;
        }
        if let Some(vertex) = self.vertices.get(current) {
            for dep in &vertex.depends_on {
                if self.dfs_path(dep, to, trail, seen) {
                    return true;
                }
            }
        }
        trail.pop();
        false
    }

    /// Find one cycle, if any, with the starting vertex repeated at the
    /// end.
    fn find_cycle(&self) -> Option<Vec<String>> {
        for start in self.vertices.keys() {
            if let Some(vertex) = self.vertices.get(start) {
                for dep in &vertex.depends_on {
                    if let Some(mut path) = self.path(dep, start) {
                        path.insert(0, start.clone());
                        path.push(start.clone());
                        // The path already walks start -> ... -> start
                        // via dep; trim the duplicated interior start.
                        path.dedup();
                        return Some(path);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dag(ids: &[&str]) -> Dag {
        let mut dag = Dag::new();
        for (order, id) in ids.iter().enumerate() {
            dag.add_vertex(id, order).unwrap();
        }
        dag
    }

    #[test]
    fn rejects_duplicate_vertices() {
        let mut d = dag(&["a"]);
        assert!(matches!(
            d.add_vertex("a", 1),
            Err(DagError::DuplicateVertex(id)) if id == "a"
        ));
    }

    #[test]
    fn rejects_unknown_dependencies_and_self_loops() {
        let mut d = dag(&["a", "b"]);
        assert!(matches!(
            d.add_dependencies("a", ["ghost"]),
            Err(DagError::UnknownDependency { .. })
        ));
        assert!(matches!(
            d.add_dependencies("a", ["a"]),
            Err(DagError::SelfReference(_))
        ));
    }

    #[test]
    fn rejects_edges_that_close_cycles() {
        let mut d = dag(&["a", "b", "c"]);
        d.add_dependencies("b", ["a"]).unwrap();
        d.add_dependencies("c", ["b"]).unwrap();
        let err = d.add_dependencies("a", ["c"]).unwrap_err();
        let DagError::Cycle { cycle } = err else {
            panic!("expected a cycle error");
        };
        assert!(cycle.len() >= 3, "cycle should be concrete: {cycle:?}");
    }

    #[test]
    fn sort_preserves_authoring_order_without_edges() {
        let d = dag(&["z", "m", "a"]);
        assert_eq!(d.topological_sort().unwrap(), vec!["z", "m", "a"]);
    }

    #[test]
    fn sort_deviates_only_when_forced() {
        let mut d = dag(&["deployment", "configmap", "secret"]);
        // deployment (authored first) needs both others.
        d.add_dependencies("deployment", ["configmap", "secret"])
            .unwrap();
        d.add_dependencies("secret", ["configmap"]).unwrap();
        assert_eq!(
            d.topological_sort().unwrap(),
            vec!["configmap", "secret", "deployment"]
        );
    }

    #[test]
    fn sort_ties_break_by_order() {
        let mut d = dag(&["a", "b", "c", "d"]);
        d.add_dependencies("d", ["a"]).unwrap();
        // b and c are free; both are ready from the start and must appear
        // in authoring order.
        assert_eq!(d.topological_sort().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn valid_order_property() {
        let mut d = dag(&["a", "b", "c", "d", "e"]);
        d.add_dependencies("c", ["a", "b"]).unwrap();
        d.add_dependencies("e", ["c", "d"]).unwrap();
        let order = d.topological_sort().unwrap();
        for (i, id) in order.iter().enumerate() {
            let placed: IndexSet<_> = order[..i].iter().collect();
            for dep in &d.vertex(id).unwrap().depends_on {
                assert!(placed.contains(dep), "`{dep}` must precede `{id}`");
            }
        }
    }

    #[test]
    fn empty_graph_sorts_to_nothing() {
        assert!(Dag::new().topological_sort().unwrap().is_empty());
    }
}
