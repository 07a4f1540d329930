//! Mapping paths
//!
//! Provides [`NodePath`], the parsed form of `<type>name[index]<type>name`.
//! Each `<type>name` pair becomes a [`PathNode`]; a node's parent is the node
//! before it, so the chain is acyclic by construction.

use crate::error::ModelError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One `<type>name[index]` segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathNode {
    collection_field: Option<String>,
    type_name: String,
    name: String,
    index: Option<usize>,
}

impl PathNode {
    /// Create a non-collection node
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection_field: None,
            type_name: type_name.into(),
            name: name.into(),
            index: None,
        }
    }

    /// With collection index
    #[inline]
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Collection field of the parent this node is an element of
    #[inline]
    #[must_use]
    pub fn collection_field(&self) -> Option<&str> {
        self.collection_field.as_deref()
    }

    /// Type owning the field
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Field name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection index, `None` when not a collection element
    #[inline]
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Whether the field is addressed as a collection element
    #[inline]
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.index.is_some()
    }
}

impl Display for PathNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>{}", self.type_name, self.name)?;
        if let Some(index) = self.index {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

/// Chain of [`PathNode`]s from the root object to a nested field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<PathNode>);

impl NodePath {
    /// Build a path from nodes, linking collection fields parent to child
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidPath`] if `nodes` is empty
    pub fn new(nodes: Vec<PathNode>) -> Result<Self, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::invalid_path("", "no nodes"));
        }
        let mut linked: Vec<PathNode> = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            node.collection_field = linked
                .last()
                .filter(|parent| parent.is_collection())
                .map(|parent| parent.name.clone());
            linked.push(node);
        }
        Ok(Self(linked))
    }

    /// Single-node path `<type>field`
    #[inline]
    #[must_use]
    pub fn single(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self(vec![PathNode::new(type_name, name)])
    }

    /// All nodes, root first
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[PathNode] {
        &self.0
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; a path has at least one node
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Root node
    #[inline]
    #[must_use]
    pub fn root(&self) -> &PathNode {
        &self.0[0]
    }

    /// Leaf node (the addressed field)
    #[inline]
    #[must_use]
    pub fn leaf(&self) -> &PathNode {
        &self.0[self.0.len() - 1]
    }

    /// Parent of the node at `position`
    #[inline]
    #[must_use]
    pub fn parent(&self, position: usize) -> Option<&PathNode> {
        position.checked_sub(1).and_then(|p| self.0.get(p))
    }

    /// Child of the node at `position`
    #[inline]
    #[must_use]
    pub fn child(&self, position: usize) -> Option<&PathNode> {
        self.0.get(position + 1)
    }

    /// Path with the leaf replaced by a sibling field of the same type
    #[must_use]
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        let mut nodes = self.0.clone();
        let leaf = PathNode {
            collection_field: self.leaf().collection_field.clone(),
            type_name: self.leaf().type_name.clone(),
            name: name.into(),
            index: None,
        };
        let last = nodes.len() - 1;
        nodes[last] = leaf;
        Self(nodes)
    }

    /// Field-only rendering used in diagnostics: `/contacts[0]/address`
    #[must_use]
    pub fn object_path(&self) -> String {
        let mut out = String::new();
        for node in &self.0 {
            out.push('/');
            out.push_str(&node.name);
            if let Some(index) = node.index {
                out.push_str(&format!("[{index}]"));
            }
        }
        out
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for node in &self.0 {
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut nodes = Vec::new();
        let mut rest = s.trim();

        while !rest.is_empty() {
            let after_open = rest
                .strip_prefix('<')
                .ok_or_else(|| ModelError::invalid_path(s, "expected '<'"))?;
            let close = after_open
                .find('>')
                .ok_or_else(|| ModelError::invalid_path(s, "unterminated type"))?;
            let type_name = &after_open[..close];
            if type_name.is_empty() {
                return Err(ModelError::invalid_path(s, "empty type name"));
            }
            rest = &after_open[close + 1..];

            let name_end = rest.find(['[', '<']).unwrap_or(rest.len());
            let name = &rest[..name_end];
            if name.is_empty() {
                return Err(ModelError::invalid_path(s, "empty field name"));
            }
            rest = &rest[name_end..];

            let mut node = PathNode::new(type_name, name);
            if let Some(after_bracket) = rest.strip_prefix('[') {
                let end = after_bracket
                    .find(']')
                    .ok_or_else(|| ModelError::invalid_path(s, "unterminated index"))?;
                let index = after_bracket[..end]
                    .parse::<usize>()
                    .map_err(|_| ModelError::invalid_path(s, "index is not a number"))?;
                node = node.with_index(index);
                rest = &after_bracket[end + 1..];
            }
            nodes.push(node);
        }

        Self::new(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_node() {
        let path: NodePath = "<pet>name".parse().unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.leaf().type_name(), "pet");
        assert_eq!(path.leaf().name(), "name");
        assert!(!path.leaf().is_collection());
        assert_eq!(path.object_path(), "/name");
    }

    #[test]
    fn parse_nested_collection() {
        let path: NodePath = "<party.customer>contacts[2]<contact.location>address"
            .parse()
            .unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.root().index(), Some(2));
        assert_eq!(path.leaf().collection_field(), Some("contacts"));
        assert_eq!(path.parent(1), Some(path.root()));
        assert_eq!(path.child(0), Some(path.leaf()));
        assert_eq!(path.parent(0), None);
        assert_eq!(path.object_path(), "/contacts[2]/address");
    }

    #[test]
    fn display_round_trips() {
        for input in ["<pet>name", "<a>b[0]<c>d", "<a>b<c>d[3]"] {
            let path: NodePath = input.parse().unwrap();
            assert_eq!(path.to_string(), input);
        }
    }

    #[test]
    fn non_indexed_parent_leaves_collection_field_empty() {
        let path: NodePath = "<a>b<c>d".parse().unwrap();
        assert_eq!(path.leaf().collection_field(), None);
    }

    #[test]
    fn sibling_replaces_leaf() {
        let path: NodePath = "<pet>breed".parse().unwrap();
        let sibling = path.sibling("species");
        assert_eq!(sibling.to_string(), "<pet>species");
    }

    #[test]
    fn malformed_paths_rejected() {
        for input in ["", "pet", "<pet", "<>name", "<pet>", "<pet>name[", "<pet>name[x]"] {
            assert!(
                matches!(input.parse::<NodePath>(), Err(ModelError::InvalidPath { .. })),
                "expected '{input}' to be rejected"
            );
        }
    }
}
