//! Text trie index.
//!
//! Each language has its own root. Edges are labelled with single
//! characters of the normalized token; a node reached by a whole token
//! carries the ids of the features indexed under that token.
//!
//! Nodes are stored in one flat array. Every edge points to a node with
//! a higher index than its source and every node has at most one parent,
//! which [`SearchTrie::decode`] checks, so walking a decoded trie visits
//! each node once and always terminates.

use std::collections::BTreeMap;

use map_search_mwm_models::{FeatureId, Lang, SEARCH_INDEX_FILE_TAG};
use serde::{Deserialize, Serialize};

use crate::MwmError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TrieNode {
    /// Outgoing edges sorted by label.
    edges: Vec<(char, u32)>,
    /// Features whose token ends at this node, sorted and unique.
    values: Vec<FeatureId>,
}

/// Decoded text trie of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTrie {
    /// `(Lang::index, root node)` pairs sorted by language.
    roots: Vec<(u8, u32)>,
    nodes: Vec<TrieNode>,
}

impl SearchTrie {
    /// Decodes and validates a trie section.
    ///
    /// # Errors
    ///
    /// Returns [`MwmError::MalformedIndex`] if the bytes are not a trie or
    /// the node graph is inconsistent.
    pub fn decode(bytes: &[u8]) -> Result<Self, MwmError> {
        let trie: Self = rmp_serde::from_slice(bytes)
            .map_err(|e| MwmError::malformed(SEARCH_INDEX_FILE_TAG, e.to_string()))?;
        trie.validate()?;
        Ok(trie)
    }

    /// Encodes the trie for storage in a container.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, MwmError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    fn validate(&self) -> Result<(), MwmError> {
        let len = self.nodes.len();
        let in_range = |index: u32| usize::try_from(index).is_ok_and(|i| i < len);

        for pair in self.roots.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(MwmError::malformed(
                    SEARCH_INDEX_FILE_TAG,
                    "language roots out of order",
                ));
            }
        }
        let mut has_parent = vec![false; len];

        for &(lang, root) in &self.roots {
            if Lang::from_index(lang).is_none() {
                return Err(MwmError::malformed(
                    SEARCH_INDEX_FILE_TAG,
                    format!("unknown language index {lang}"),
                ));
            }
            if !in_range(root) {
                return Err(MwmError::malformed(
                    SEARCH_INDEX_FILE_TAG,
                    format!("root {root} out of range ({len} nodes)"),
                ));
            }
            if std::mem::replace(&mut has_parent[root as usize], true) {
                return Err(MwmError::malformed(
                    SEARCH_INDEX_FILE_TAG,
                    format!("root {root} is shared"),
                ));
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            for pair in node.edges.windows(2) {
                if pair[0].0 >= pair[1].0 {
                    return Err(MwmError::malformed(
                        SEARCH_INDEX_FILE_TAG,
                        format!("edges of node {index} out of order"),
                    ));
                }
            }
            for &(label, child) in &node.edges {
                let forward = usize::try_from(child).is_ok_and(|c| c > index);
                if !forward || !in_range(child) {
                    return Err(MwmError::malformed(
                        SEARCH_INDEX_FILE_TAG,
                        format!("edge '{label}' of node {index} points to {child}"),
                    ));
                }
                if std::mem::replace(&mut has_parent[child as usize], true) {
                    return Err(MwmError::malformed(
                        SEARCH_INDEX_FILE_TAG,
                        format!("node {child} has more than one parent"),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Languages that have a root in this trie.
    pub fn langs(&self) -> impl Iterator<Item = Lang> + '_ {
        self.roots
            .iter()
            .filter_map(|&(lang, _)| Lang::from_index(lang))
    }

    /// Root node of `lang`, if any name was indexed in that language.
    #[must_use]
    pub fn root(&self, lang: Lang) -> Option<TrieNodeRef<'_>> {
        self.roots
            .binary_search_by_key(&lang.index(), |&(l, _)| l)
            .ok()
            .map(|position| self.node_ref(self.roots[position].1))
    }

    /// Walks `token` from the root of `lang`.
    #[must_use]
    pub fn find(&self, lang: Lang, token: &str) -> Option<TrieNodeRef<'_>> {
        token
            .chars()
            .try_fold(self.root(lang)?, |node, label| node.child(label))
    }

    const fn node_ref(&self, index: u32) -> TrieNodeRef<'_> {
        TrieNodeRef { trie: self, index }
    }

    fn node(&self, index: u32) -> &TrieNode {
        &self.nodes[index as usize]
    }
}

/// A position in a [`SearchTrie`].
#[derive(Debug, Clone, Copy)]
pub struct TrieNodeRef<'a> {
    trie: &'a SearchTrie,
    index: u32,
}

impl<'a> TrieNodeRef<'a> {
    /// Follows the edge labelled `label`.
    #[must_use]
    pub fn child(&self, label: char) -> Option<Self> {
        let edges = &self.trie.node(self.index).edges;
        edges
            .binary_search_by_key(&label, |&(l, _)| l)
            .ok()
            .map(|position| self.trie.node_ref(edges[position].1))
    }

    /// Features whose token ends exactly here.
    #[must_use]
    pub fn values(&self) -> &'a [FeatureId] {
        &self.trie.node(self.index).values
    }

    /// Visits the values of this node and every descendant, i.e. all
    /// features with a token that starts with the path to this node.
    pub fn for_each_in_subtree(&self, mut f: impl FnMut(FeatureId)) {
        let mut stack = vec![self.index];
        while let Some(index) = stack.pop() {
            let node = self.trie.node(index);
            node.values.iter().copied().for_each(&mut f);
            stack.extend(node.edges.iter().map(|&(_, child)| child));
        }
    }
}

/// Incrementally builds a [`SearchTrie`].
#[derive(Debug, Default)]
pub struct TrieBuilder {
    roots: BTreeMap<u8, u32>,
    nodes: Vec<TrieNode>,
}

impl TrieBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `feature` under `token` in `lang`. The token is expected
    /// to be normalized already.
    pub fn insert(&mut self, lang: Lang, token: &str, feature: FeatureId) {
        let root = match self.roots.get(&lang.index()) {
            Some(&root) => root,
            None => {
                let root = self.push_node();
                self.roots.insert(lang.index(), root);
                root
            }
        };

        let mut current = root;
        for label in token.chars() {
            current = self.child_or_insert(current, label);
        }
        self.nodes[current as usize].values.push(feature);
    }

    fn child_or_insert(&mut self, parent: u32, label: char) -> u32 {
        let position = self.nodes[parent as usize]
            .edges
            .binary_search_by_key(&label, |&(l, _)| l);
        match position {
            Ok(position) => self.nodes[parent as usize].edges[position].1,
            Err(position) => {
                let child = self.push_node();
                self.nodes[parent as usize]
                    .edges
                    .insert(position, (label, child));
                child
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn push_node(&mut self) -> u32 {
        self.nodes.push(TrieNode::default());
        (self.nodes.len() - 1) as u32
    }

    /// Finishes the trie, sorting and deduplicating every value list.
    #[must_use]
    pub fn build(mut self) -> SearchTrie {
        for node in &mut self.nodes {
            node.values.sort_unstable();
            node.values.dedup();
        }
        SearchTrie {
            roots: self.roots.into_iter().collect(),
            nodes: self.nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SearchTrie {
        let mut builder = TrieBuilder::new();
        builder.insert(Lang::En, "whiskey", 0);
        builder.insert(Lang::En, "bar", 0);
        builder.insert(Lang::En, "bar", 1);
        builder.insert(Lang::En, "barn", 2);
        builder.insert(Lang::Ru, "bar", 3);
        builder.build()
    }

    fn subtree(node: TrieNodeRef<'_>) -> Vec<FeatureId> {
        let mut values = Vec::new();
        node.for_each_in_subtree(|id| values.push(id));
        values.sort_unstable();
        values
    }

    #[test]
    fn finds_exact_tokens_per_language() {
        let trie = sample();
        assert_eq!(trie.find(Lang::En, "bar").unwrap().values(), &[0, 1]);
        assert_eq!(trie.find(Lang::Ru, "bar").unwrap().values(), &[3]);
        assert_eq!(trie.find(Lang::En, "barn").unwrap().values(), &[2]);
        assert!(trie.find(Lang::En, "pub").is_none());
        assert!(trie.find(Lang::De, "bar").is_none());
    }

    #[test]
    fn prefix_walk_collects_descendants() {
        let trie = sample();
        assert_eq!(subtree(trie.find(Lang::En, "ba").unwrap()), vec![0, 1, 2]);
        assert_eq!(subtree(trie.root(Lang::En).unwrap()), vec![0, 0, 1, 2]);
    }

    #[test]
    fn lists_indexed_languages() {
        assert_eq!(sample().langs().collect::<Vec<_>>(), vec![Lang::En, Lang::Ru]);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let trie = sample();
        assert_eq!(SearchTrie::decode(&trie.encode().unwrap()).unwrap(), trie);
    }

    #[test]
    fn rejects_backward_edges() {
        let mut trie = sample();
        trie.nodes[2].edges = vec![('x', 1)];
        let result = SearchTrie::decode(&trie.encode().unwrap());
        assert!(matches!(result, Err(MwmError::MalformedIndex { .. })));
    }

    #[test]
    fn rejects_shared_children() {
        let mut trie = sample();
        let shared = trie.nodes[1].edges[0].1;
        trie.nodes[0].edges.push(('z', shared));
        let result = SearchTrie::decode(&trie.encode().unwrap());
        assert!(matches!(result, Err(MwmError::MalformedIndex { .. })));
    }

    #[test]
    fn rejects_diamond_chains() {
        let nodes = (0..28u32)
            .map(|i| TrieNode {
                edges: if i < 27 {
                    vec![('a', i + 1), ('b', i + 1)]
                } else {
                    Vec::new()
                },
                values: vec![i],
            })
            .collect();
        let trie = SearchTrie {
            roots: vec![(Lang::En.index(), 0)],
            nodes,
        };
        let result = SearchTrie::decode(&trie.encode().unwrap());
        assert!(matches!(result, Err(MwmError::MalformedIndex { .. })));
    }

    #[test]
    fn rejects_roots_shared_between_languages() {
        let mut trie = sample();
        let en_root = trie.roots[0].1;
        trie.roots[1].1 = en_root;
        let result = SearchTrie::decode(&trie.encode().unwrap());
        assert!(matches!(result, Err(MwmError::MalformedIndex { .. })));
    }

    #[test]
    fn rejects_dangling_roots() {
        let mut trie = sample();
        trie.roots.push((Lang::Zh.index(), 10_000));
        let result = SearchTrie::decode(&trie.encode().unwrap());
        assert!(matches!(result, Err(MwmError::MalformedIndex { .. })));
    }

    #[test]
    fn rejects_truncated_bytes() {
        let bytes = sample().encode().unwrap();
        let result = SearchTrie::decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(MwmError::MalformedIndex { .. })));
    }
}
