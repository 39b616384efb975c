//! Stored Document View
//!
//! A `StoredDocument` is the in-memory assembly of every `nodes` and `fields`
//! row belonging to one document. The database layer fetches a whole subtree
//! in two queries; this type restores sibling order, answers preorder line
//! lookups, computes bottom-up deletion order and rebuilds the element tree.

use crate::models::element::{ElementIndex, XmlElement, XmlTree};
use crate::models::node::{Field, Node, NodeId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct StoredDocument {
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
    children: HashMap<NodeId, Vec<NodeId>>,
    fields: HashMap<NodeId, Vec<Field>>,
}

impl StoredDocument {
    /// Assemble a document from its rows.
    ///
    /// Returns `None` when `root` is not among `nodes`. Children are ordered by
    /// `sibling_rank` (ties broken by id), fields by id, which is insertion order.
    pub fn from_rows(root: NodeId, nodes: Vec<Node>, fields: Vec<Field>) -> Option<Self> {
        let mut by_id: HashMap<NodeId, Node> = HashMap::with_capacity(nodes.len());
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for node in nodes {
            if node.id != root {
                if let Some(parent) = node.parent_id {
                    children.entry(parent).or_default().push(node.id);
                }
            }
            by_id.insert(node.id, node);
        }

        if !by_id.contains_key(&root) {
            return None;
        }

        for siblings in children.values_mut() {
            siblings.sort_by_key(|id| (by_id[id].sibling_rank, *id));
        }

        let mut grouped: HashMap<NodeId, Vec<Field>> = HashMap::new();
        for field in fields {
            grouped.entry(field.node_id).or_default().push(field);
        }
        for node_fields in grouped.values_mut() {
            node_fields.sort_by_key(|field| field.id);
        }

        Some(Self {
            root,
            nodes: by_id,
            children,
            fields: grouped,
        })
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &Node {
        &self.nodes[&self.root]
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of `id` in ascending sibling rank
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields of `id` in insertion order
    pub fn fields(&self, id: NodeId) -> &[Field] {
        self.fields.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Node ids in document order, root first
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }

        order
    }

    /// Id of the node at 1-based preorder position `line` (the root is line 1)
    pub fn node_at_line(&self, line: usize) -> Option<NodeId> {
        if line == 0 {
            return None;
        }
        self.preorder().get(line - 1).copied()
    }

    /// Every node id with descendants strictly before their ancestors
    pub fn deletion_order(&self) -> Vec<NodeId> {
        let mut order = self.preorder();
        order.reverse();
        order
    }

    /// Element content of one node: attributes plus the sentinel text field
    pub fn element(&self, id: NodeId) -> Option<XmlElement> {
        let node = self.nodes.get(&id)?;
        Some(element_from_rows(node, self.fields(id)))
    }

    /// Rebuild the element tree, children in ascending sibling rank
    pub fn to_xml_tree(&self) -> XmlTree {
        let mut tree = XmlTree::new(self.element(self.root).unwrap_or_default());
        let mut stack: Vec<(NodeId, ElementIndex)> = vec![(self.root, XmlTree::ROOT)];

        while let Some((id, index)) = stack.pop() {
            let mut pushed = Vec::with_capacity(self.children(id).len());
            for &child in self.children(id) {
                let element = self.element(child).unwrap_or_default();
                if let Some(child_index) = tree.push_child(index, element) {
                    pushed.push((child, child_index));
                }
            }
            stack.extend(pushed.into_iter().rev());
        }

        tree
    }
}

/// Build the childless element for one node row and its fields
pub fn element_from_rows(node: &Node, fields: &[Field]) -> XmlElement {
    let mut element = XmlElement::new(node.name.clone());
    for field in fields {
        if field.is_text() {
            element.text = Some(field.value.clone());
        } else {
            element
                .attributes
                .push((field.key.clone(), field.value.clone()));
        }
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TEXT_FIELD_KEY;

    fn node(id: NodeId, name: &str, parent_id: Option<NodeId>, sibling_rank: i64) -> Node {
        Node {
            id,
            name: name.to_string(),
            parent_id,
            sibling_rank,
        }
    }

    fn field(id: i64, node_id: NodeId, key: &str, value: &str) -> Field {
        Field {
            id,
            node_id,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// root(1) -> [b(3, rank 1) -> [c(4)], a(2, rank 2)]
    fn sample() -> StoredDocument {
        StoredDocument::from_rows(
            1,
            vec![
                node(1, "root", None, 1),
                node(2, "a", Some(1), 2),
                node(3, "b", Some(1), 1),
                node(4, "c", Some(3), 1),
            ],
            vec![
                field(2, 3, "id", "x"),
                field(1, 3, TEXT_FIELD_KEY, "hello"),
                field(3, 3, "kind", "y"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_children_follow_sibling_rank_not_id() {
        let doc = sample();
        assert_eq!(doc.children(1), &[3, 2]);
        assert_eq!(doc.preorder(), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_node_at_line_counts_root_as_one() {
        let doc = sample();
        assert_eq!(doc.node_at_line(0), None);
        assert_eq!(doc.node_at_line(1), Some(1));
        assert_eq!(doc.node_at_line(3), Some(4));
        assert_eq!(doc.node_at_line(4), Some(2));
        assert_eq!(doc.node_at_line(5), None);
    }

    #[test]
    fn test_deletion_order_is_bottom_up() {
        let doc = sample();
        let order = doc.deletion_order();
        let position = |id: NodeId| order.iter().position(|&x| x == id).unwrap();
        assert!(position(4) < position(3));
        assert!(position(3) < position(1));
        assert!(position(2) < position(1));
        assert_eq!(order.last(), Some(&1));
    }

    #[test]
    fn test_element_separates_text_from_attributes() {
        let doc = sample();
        let element = doc.element(3).unwrap();
        assert_eq!(element.text.as_deref(), Some("hello"));
        assert_eq!(
            element.attributes,
            vec![
                ("id".to_string(), "x".to_string()),
                ("kind".to_string(), "y".to_string())
            ]
        );
    }

    #[test]
    fn test_to_xml_tree_preserves_order() {
        let tree = sample().to_xml_tree();
        let names: Vec<&str> = tree
            .preorder()
            .iter()
            .map(|entry| tree[entry.index].name.as_str())
            .collect();
        assert_eq!(names, vec!["root", "b", "c", "a"]);
    }

    #[test]
    fn test_missing_root_yields_none() {
        assert!(StoredDocument::from_rows(9, vec![node(1, "root", None, 1)], vec![]).is_none());
    }
}
