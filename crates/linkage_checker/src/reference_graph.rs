use crate::classfile::outermost_class_name;
use crate::symbol::SymbolReferences;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// Class-to-class reference graph and the classes reachable from a set of entry points.
#[derive(Debug, Clone, Default)]
pub struct ClassReferenceGraph {
    edges: IndexMap<String, IndexSet<String>>,
    reachable: IndexSet<String>,
}

impl ClassReferenceGraph {
    pub fn new<I, S>(references: &SymbolReferences, entry_points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut edges: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for (source, symbol) in references.iter() {
            let target = symbol.class_name();
            if target == source.binary_name() {
                continue;
            }
            edges
                .entry(source.binary_name().to_string())
                .or_default()
                .insert(target.to_string());
        }
        // Nested classes belong to their top-level class: references between them are not
        // extracted, so link them here.
        for source in references.sources() {
            let name = source.binary_name();
            let outer = outermost_class_name(name);
            if outer != name {
                edges
                    .entry(outer.to_string())
                    .or_default()
                    .insert(name.to_string());
                edges
                    .entry(name.to_string())
                    .or_default()
                    .insert(outer.to_string());
            }
        }

        let mut graph = Self {
            edges,
            reachable: IndexSet::new(),
        };
        graph.reachable = graph.traverse(entry_points);
        graph
    }

    fn traverse<I, S>(&self, entry_points: I) -> IndexSet<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut visited = IndexSet::new();
        let mut queue = VecDeque::new();
        for entry_point in entry_points {
            let entry_point = entry_point.into();
            if visited.insert(entry_point.clone()) {
                queue.push_back(entry_point);
            }
        }
        while let Some(class_name) = queue.pop_front() {
            let Some(targets) = self.edges.get(&class_name) else {
                continue;
            };
            for target in targets {
                if visited.insert(target.clone()) {
                    queue.push_back(target.clone());
                }
            }
        }
        visited
    }

    pub fn is_reachable(&self, class_name: &str) -> bool {
        self.reachable.contains(class_name)
    }

    pub fn reachable_classes(&self) -> &IndexSet<String> {
        &self.reachable
    }

    pub fn references_from(&self, class_name: &str) -> Option<&IndexSet<String>> {
        self.edges.get(class_name)
    }
}
