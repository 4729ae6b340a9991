use petgraph::graph::{IndexType, NodeIndex};
use petgraph::stable_graph::StableDiGraph;

use crate::category::{CategoryNode, CategoryTree};

/// A directed graph of category names
pub trait CategoryGraph<Index: Copy> {
    fn add_node(&mut self, category: String) -> Index;

    fn add_edge(&mut self, from: Index, to: Index);

    fn edge_exists(&self, lhs: Index, rhs: Index) -> bool;

    fn node_indices(&self) -> Vec<(&String, Index)>;

    fn node_exists(&self, category: &str) -> Option<Index> {
        self.node_indices()
            .into_iter()
            .find(|(name, _)| name.as_str() == category)
            .map(|(_, index)| index)
    }

    /// The node for `category`, added if it isn't in the graph yet
    fn node_or_insert(&mut self, category: &str) -> Index {
        match self.node_exists(category) {
            Some(index) => index,
            None => self.add_node(category.to_string()),
        }
    }
}

impl<Index: IndexType> CategoryGraph<NodeIndex<Index>> for StableDiGraph<String, (), Index> {
    fn add_node(&mut self, category: String) -> NodeIndex<Index> {
        self.add_node(category)
    }

    fn add_edge(&mut self, from: NodeIndex<Index>, to: NodeIndex<Index>) {
        self.add_edge(from, to, ());
    }

    fn edge_exists(&self, lhs: NodeIndex<Index>, rhs: NodeIndex<Index>) -> bool {
        self.contains_edge(lhs, rhs)
    }

    fn node_indices(&self) -> Vec<(&String, NodeIndex<Index>)> {
        self.node_indices()
            .filter_map(|index| self.node_weight(index).map(|name| (name, index)))
            .collect()
    }
}

fn add_sub_categories<Index: Copy, G: CategoryGraph<Index>>(
    graph: &mut G,
    parent: Index,
    node: &CategoryNode,
) {
    for (name, sub_node) in &node.sub_categories {
        let child = graph.node_or_insert(name);

        if !graph.edge_exists(parent, child) {
            graph.add_edge(parent, child);
        }

        if let Some(sub_node) = sub_node {
            add_sub_categories(graph, child, sub_node);
        }
    }
}

impl CategoryTree {
    /// Add every category of the tree to `graph`, with an edge from each category to its
    /// sub-categories
    pub fn fill_graph<Index: Copy, G: CategoryGraph<Index>>(&self, graph: &mut G) {
        for (name, node) in self.roots() {
            let root = graph.node_or_insert(name);

            add_sub_categories(graph, root, node);
        }
    }

    pub fn to_graph(&self) -> StableDiGraph<String, ()> {
        let mut graph = StableDiGraph::new();

        self.fill_graph(&mut graph);

        graph
    }
}
