//! In-Memory Element Tree
//!
//! `XmlTree` is the arena representation shared by the parser, the renderer
//! and the persistence layer. Elements are addressed by index and children are
//! stored as ordered index lists, so no operation over a tree needs recursion
//! regardless of how deeply the document nests.
//!
//! Element content is a tagged value: ordered attributes plus an optional
//! text, never a single key/value bag.

use std::ops::Index;

/// Index of an element inside its `XmlTree`
pub type ElementIndex = usize;

/// One element: tag name, attributes in source order, text and children
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<ElementIndex>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A visit produced by [`XmlTree::preorder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreorderEntry {
    pub index: ElementIndex,
    pub parent: Option<ElementIndex>,
    /// 1-based position among the parent's children (1 for the root)
    pub rank: i64,
    /// 0 for the root
    pub depth: usize,
}

/// Arena of elements rooted at index 0
#[derive(Debug, Clone)]
pub struct XmlTree {
    elements: Vec<XmlElement>,
}

impl XmlTree {
    pub const ROOT: ElementIndex = 0;

    /// Create a tree holding only `root`. Any child indices on `root` are discarded.
    pub fn new(mut root: XmlElement) -> Self {
        root.children.clear();
        Self {
            elements: vec![root],
        }
    }

    pub fn root(&self) -> &XmlElement {
        &self.elements[Self::ROOT]
    }

    pub fn get(&self, index: ElementIndex) -> Option<&XmlElement> {
        self.elements.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: ElementIndex) -> Option<&mut XmlElement> {
        self.elements.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Append `element` as the last child of `parent` and return its index.
    ///
    /// Returns `None` if `parent` is not in the tree.
    pub fn push_child(
        &mut self,
        parent: ElementIndex,
        mut element: XmlElement,
    ) -> Option<ElementIndex> {
        if parent >= self.elements.len() {
            return None;
        }
        element.children.clear();
        let index = self.elements.len();
        self.elements.push(element);
        self.elements[parent].children.push(index);
        Some(index)
    }

    /// Document-order traversal: node before children, children in order.
    pub fn preorder(&self) -> Vec<PreorderEntry> {
        let mut visits = Vec::with_capacity(self.elements.len());
        let mut stack = vec![PreorderEntry {
            index: Self::ROOT,
            parent: None,
            rank: 1,
            depth: 0,
        }];

        while let Some(entry) = stack.pop() {
            visits.push(entry);
            let children = &self.elements[entry.index].children;
            for (position, &child) in children.iter().enumerate().rev() {
                stack.push(PreorderEntry {
                    index: child,
                    parent: Some(entry.index),
                    rank: position as i64 + 1,
                    depth: entry.depth + 1,
                });
            }
        }

        visits
    }

    /// Greatest nesting depth, counting the root as depth 0
    pub fn depth(&self) -> usize {
        self.preorder()
            .iter()
            .map(|entry| entry.depth)
            .max()
            .unwrap_or(0)
    }
}

impl Index<ElementIndex> for XmlTree {
    type Output = XmlElement;

    fn index(&self, index: ElementIndex) -> &Self::Output {
        &self.elements[index]
    }
}

/// Structural equality: same names, attributes, text and child order at every
/// position, independent of how the arenas were allocated.
impl PartialEq for XmlTree {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }

        let ours = self.preorder();
        let theirs = other.preorder();
        ours.iter().zip(theirs.iter()).all(|(a, b)| {
            let left = &self[a.index];
            let right = &other[b.index];
            a.depth == b.depth
                && left.name == right.name
                && left.attributes == right.attributes
                && left.text == right.text
                && left.children.len() == right.children.len()
        })
    }
}

impl Eq for XmlTree {}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> XmlTree {
        let mut tree = XmlTree::new(XmlElement::new("root"));
        let john = tree
            .push_child(XmlTree::ROOT, XmlElement::new("person").with_attribute("id", "1"))
            .unwrap();
        tree.push_child(john, XmlElement::new("age").with_text("30"))
            .unwrap();
        tree.push_child(XmlTree::ROOT, XmlElement::new("person").with_attribute("id", "2"))
            .unwrap();
        tree
    }

    #[test]
    fn test_preorder_visits_node_before_children() {
        let tree = people();
        let names: Vec<&str> = tree
            .preorder()
            .iter()
            .map(|entry| tree[entry.index].name.as_str())
            .collect();
        assert_eq!(names, vec!["root", "person", "age", "person"]);
    }

    #[test]
    fn test_preorder_ranks_and_depths() {
        let tree = people();
        let visits = tree.preorder();
        let ranks: Vec<i64> = visits.iter().map(|e| e.rank).collect();
        let depths: Vec<usize> = visits.iter().map(|e| e.depth).collect();
        assert_eq!(ranks, vec![1, 1, 1, 2]);
        assert_eq!(depths, vec![0, 1, 2, 1]);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_push_child_rejects_unknown_parent() {
        let mut tree = XmlTree::new(XmlElement::new("root"));
        assert!(tree.push_child(7, XmlElement::new("x")).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_structural_equality_ignores_allocation_order() {
        // Same shape, children allocated in a different arena order
        let mut a = XmlTree::new(XmlElement::new("r"));
        let x = a.push_child(XmlTree::ROOT, XmlElement::new("x")).unwrap();
        a.push_child(XmlTree::ROOT, XmlElement::new("y")).unwrap();
        a.push_child(x, XmlElement::new("z")).unwrap();

        let mut b = XmlTree::new(XmlElement::new("r"));
        let x = b.push_child(XmlTree::ROOT, XmlElement::new("x")).unwrap();
        b.push_child(x, XmlElement::new("z")).unwrap();
        b.push_child(XmlTree::ROOT, XmlElement::new("y")).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_structural_inequality_on_child_order() {
        let mut a = XmlTree::new(XmlElement::new("r"));
        a.push_child(XmlTree::ROOT, XmlElement::new("x")).unwrap();
        a.push_child(XmlTree::ROOT, XmlElement::new("y")).unwrap();

        let mut b = XmlTree::new(XmlElement::new("r"));
        b.push_child(XmlTree::ROOT, XmlElement::new("y")).unwrap();
        b.push_child(XmlTree::ROOT, XmlElement::new("x")).unwrap();

        assert_ne!(a, b);
    }
}
