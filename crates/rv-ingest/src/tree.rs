//! Arena-backed trace tree shared by the LangSmith and OpenTelemetry adapters.
//!
//! Nodes live in one flat `Vec`; parent/child relations are index vectors
//! built once per normalization call. All traversals are iterative, so deep
//! traces cannot exhaust the stack, and cycles in malformed input are broken
//! rather than followed.

use std::collections::{HashMap, VecDeque};

#[derive(Debug)]
pub struct TraceTree<T> {
    nodes: Vec<T>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl<T> TraceTree<T> {
    /// Builds a tree from nodes and their parent indices. Out-of-range and
    /// self-referencing parents are treated as absent.
    pub fn new(nodes: Vec<T>, parents: Vec<Option<usize>>) -> Self {
        let len = nodes.len();
        let mut parents = parents;
        parents.resize(len, None);

        for (i, parent) in parents.iter_mut().enumerate() {
            if matches!(*parent, Some(p) if p >= len || p == i) {
                *parent = None;
            }
        }

        let mut tree = Self {
            nodes,
            parents,
            children: vec![Vec::new(); len],
        };
        tree.break_cycles();
        tree.rebuild_children();
        tree
    }

    /// Links nodes by id: each node's parent is the node whose id equals its
    /// parent id. Unresolvable parent ids leave the node as a root.
    pub fn from_parent_ids<F, G>(nodes: Vec<T>, id_of: F, parent_id_of: G) -> Self
    where
        F: Fn(&T) -> Option<String>,
        G: Fn(&T) -> Option<String>,
    {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if let Some(id) = id_of(node) {
                index.entry(id).or_insert(i);
            }
        }
        let parents = nodes
            .iter()
            .map(|node| parent_id_of(node).and_then(|pid| index.get(&pid).copied()))
            .collect();
        Self::new(nodes, parents)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &T {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[T] {
        &self.nodes
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn roots(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.parents[i].is_none()).collect()
    }

    /// Topmost ancestor of a node.
    pub fn root_of(&self, index: usize) -> usize {
        let mut current = index;
        while let Some(parent) = self.parents[current] {
            current = parent;
        }
        current
    }

    /// Every node below `index` in BFS order, excluding `index` itself.
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut found = Vec::new();
        let mut queue: VecDeque<usize> = self.children[index].iter().copied().collect();
        while let Some(i) = queue.pop_front() {
            found.push(i);
            queue.extend(self.children[i].iter().copied());
        }
        found
    }

    /// Nodes matching `is_match` that have no matching descendant, in node
    /// order. One bottom-up pass over a BFS ordering.
    pub fn leaf_matches<F>(&self, is_match: F) -> Vec<usize>
    where
        F: Fn(usize) -> bool,
    {
        let matched: Vec<bool> = (0..self.len()).map(&is_match).collect();
        let mut match_below = vec![false; self.len()];

        for &i in self.bfs_order().iter().rev() {
            if let Some(parent) = self.parents[i] {
                if matched[i] || match_below[i] {
                    match_below[parent] = true;
                }
            }
        }

        (0..self.len())
            .filter(|&i| matched[i] && !match_below[i])
            .collect()
    }

    fn bfs_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.len());
        let mut queue: VecDeque<usize> = self.roots().into();
        while let Some(i) = queue.pop_front() {
            order.push(i);
            queue.extend(self.children[i].iter().copied());
        }
        order
    }

    /// Detaches the node where a parent chain loops back on itself, turning
    /// it into a root.
    fn break_cycles(&mut self) {
        // 0 = unvisited, 1 = on the current chain, 2 = settled
        let mut state = vec![0u8; self.len()];
        for start in 0..self.len() {
            let mut chain = Vec::new();
            let mut current = Some(start);
            while let Some(i) = current {
                match state[i] {
                    2 => break,
                    1 => {
                        // `i` closes a loop; cut the edge that led back to it.
                        if let Some(&last) = chain.last() {
                            self.parents[last] = None;
                        }
                        break;
                    }
                    _ => {
                        state[i] = 1;
                        chain.push(i);
                        current = self.parents[i];
                    }
                }
            }
            for i in chain {
                state[i] = 2;
            }
        }
    }

    fn rebuild_children(&mut self) {
        for list in &mut self.children {
            list.clear();
        }
        for (i, parent) in self.parents.iter().enumerate() {
            if let Some(p) = parent {
                self.children[*p].push(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(labels: &[&str], parents: Vec<Option<usize>>) -> TraceTree<String> {
        TraceTree::new(labels.iter().map(|s| (*s).to_owned()).collect(), parents)
    }

    #[test]
    fn test_nested_llm_only_innermost_is_leaf() {
        // chain -> llm(outer) -> llm(inner)
        let tree = tree_of(
            &["chain", "llm", "llm"],
            vec![None, Some(0), Some(1)],
        );

        let leaves = tree.leaf_matches(|i| tree.node(i) == "llm");

        assert_eq!(leaves, vec![2]);
    }

    #[test]
    fn test_llm_through_intermediate_chain_is_not_leaf() {
        // llm -> chain -> llm : the outer llm still has an llm descendant.
        let tree = tree_of(
            &["llm", "chain", "llm"],
            vec![None, Some(0), Some(1)],
        );

        assert_eq!(tree.leaf_matches(|i| tree.node(i) == "llm"), vec![2]);
    }

    #[test]
    fn test_siblings_are_both_leaves() {
        let tree = tree_of(
            &["chain", "llm", "retriever", "llm"],
            vec![None, Some(0), Some(0), Some(0)],
        );

        assert_eq!(tree.leaf_matches(|i| tree.node(i) == "llm"), vec![1, 3]);
        assert_eq!(tree.children(0), &[1, 2, 3]);
    }

    #[test]
    fn test_descendants_in_bfs_order() {
        // chain -> (llm -> tool, retriever)
        let tree = tree_of(
            &["chain", "llm", "retriever", "tool"],
            vec![None, Some(0), Some(0), Some(1)],
        );

        assert_eq!(tree.descendants(0), vec![1, 2, 3]);
        assert_eq!(tree.descendants(1), vec![3]);
        assert!(tree.descendants(3).is_empty());
    }

    #[test]
    fn test_no_matches_yields_empty() {
        let tree = tree_of(&["chain", "tool"], vec![None, Some(0)]);
        assert!(tree.leaf_matches(|i| tree.node(i) == "llm").is_empty());
        assert_eq!(tree.roots(), vec![0]);
    }

    #[test]
    fn test_from_parent_ids_links_and_orphans() {
        let nodes = vec![
            ("a".to_owned(), None),
            ("b".to_owned(), Some("a".to_owned())),
            ("c".to_owned(), Some("missing".to_owned())),
        ];

        let tree = TraceTree::from_parent_ids(nodes, |n| Some(n.0.clone()), |n| n.1.clone());

        assert_eq!(tree.parent(1), Some(0));
        assert_eq!(tree.parent(2), None);
        assert_eq!(tree.roots(), vec![0, 2]);
        assert_eq!(tree.root_of(1), 0);
    }

    #[test]
    fn test_cycle_is_broken() {
        // 0 -> 1 -> 0 loop plus a self-reference on 2.
        let tree = tree_of(&["llm", "llm", "llm"], vec![Some(1), Some(0), Some(2)]);

        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.parent(2), None);
        let leaves = tree.leaf_matches(|i| tree.node(i) == "llm");
        assert_eq!(leaves.len(), 2);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let depth = 50_000;
        let labels = vec!["llm".to_owned(); depth];
        let parents = (0..depth)
            .map(|i| if i == 0 { None } else { Some(i - 1) })
            .collect();
        let tree = TraceTree::new(labels, parents);

        assert_eq!(tree.leaf_matches(|_| true), vec![depth - 1]);
        assert_eq!(tree.root_of(depth - 1), 0);
    }
}
