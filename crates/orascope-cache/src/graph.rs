//! Object dependency graph
//!
//! Adjacency lists over `ALL_DEPENDENCIES` edges, keyed by the normalized
//! `SCHEMA.NAME` of each object, maintained in both directions.

use std::collections::HashMap;

use orascope_core::{DependencyEdge, ObjectRef};

/// Dependencies of one object
#[derive(Debug, Clone, Default)]
struct NodeDeps {
    /// Objects this object references
    references: Vec<ObjectRef>,
    /// Objects that reference this object
    dependents: Vec<ObjectRef>,
}

/// Directed dependency graph at object granularity
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, NodeDeps>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: Vec<DependencyEdge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Record one `referrer -> referenced` edge. Duplicate edges collapse.
    pub fn add_edge(&mut self, edge: DependencyEdge) {
        if self.edges.contains(&edge) {
            return;
        }

        let referrer_key = edge.referrer.qualified_key();
        let referenced_key = edge.referenced.qualified_key();

        let node = self.nodes.entry(referrer_key).or_default();
        if !node.references.contains(&edge.referenced) {
            node.references.push(edge.referenced.clone());
        }

        let node = self.nodes.entry(referenced_key).or_default();
        if !node.dependents.contains(&edge.referrer) {
            node.dependents.push(edge.referrer.clone());
        }

        self.edges.push(edge);
    }

    /// Objects that reference `(schema, name)`, optionally narrowed by kind.
    pub fn dependents_of(
        &self,
        schema: &str,
        name: &str,
        kind: Option<&orascope_core::ObjectKind>,
    ) -> Vec<ObjectRef> {
        let key = orascope_core::table_key(schema, name);
        let Some(node) = self.nodes.get(&key) else {
            return Vec::new();
        };
        match kind {
            // The kind narrows which referenced object we mean; the edge
            // list already folds per-key, so filter on the edge records.
            Some(kind) => self
                .edges
                .iter()
                .filter(|e| {
                    e.referenced.qualified_key() == key && &e.referenced.kind == kind
                })
                .map(|e| e.referrer.clone())
                .collect(),
            None => node.dependents.clone(),
        }
    }

    /// Objects that `(schema, name)` references.
    pub fn references_of(&self, schema: &str, name: &str) -> Vec<ObjectRef> {
        let key = orascope_core::table_key(schema, name);
        self.nodes
            .get(&key)
            .map(|n| n.references.clone())
            .unwrap_or_default()
    }

    /// Whether any edge touching `(schema, name)` is known.
    pub fn knows(&self, schema: &str, name: &str) -> bool {
        self.nodes
            .contains_key(&orascope_core::table_key(schema, name))
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orascope_core::ObjectKind;

    fn edge(from: (&str, &str, ObjectKind), to: (&str, &str, ObjectKind)) -> DependencyEdge {
        DependencyEdge {
            referrer: ObjectRef::new(from.0, from.1, from.2),
            referenced: ObjectRef::new(to.0, to.1, to.2),
        }
    }

    #[test]
    fn tracks_both_directions() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(
            ("HR", "EMP_VIEW", ObjectKind::View),
            ("HR", "EMPLOYEES", ObjectKind::Table),
        ));
        graph.add_edge(edge(
            ("HR", "PAY_PKG", ObjectKind::Package),
            ("HR", "EMPLOYEES", ObjectKind::Table),
        ));

        let dependents = graph.dependents_of("hr", "employees", None);
        assert_eq!(dependents.len(), 2);

        let references = graph.references_of("HR", "EMP_VIEW");
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].name, "EMPLOYEES");
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut graph = DependencyGraph::new();
        let e = edge(
            ("HR", "V", ObjectKind::View),
            ("HR", "T", ObjectKind::Table),
        );
        graph.add_edge(e.clone());
        graph.add_edge(e);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dependents_of("HR", "T", None).len(), 1);
    }

    #[test]
    fn kind_filter_narrows() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(
            ("HR", "V", ObjectKind::View),
            ("HR", "X", ObjectKind::Table),
        ));
        graph.add_edge(edge(
            ("HR", "P", ObjectKind::Procedure),
            ("HR", "X", ObjectKind::Package),
        ));

        assert_eq!(graph.dependents_of("HR", "X", None).len(), 2);
        let only_table = graph.dependents_of("HR", "X", Some(&ObjectKind::Table));
        assert_eq!(only_table.len(), 1);
        assert_eq!(only_table[0].name, "V");
    }
}
