/// A node of a `Tree`, children are addressed by their index in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<L> {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    /// A leaf without label abstains.
    Leaf { label: Option<L> },
}

/// A binary decision tree stored as an arena, the root is the first node.
///
/// Samples whose feature is below the threshold go left.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree<L> {
    nodes: Vec<Node<L>>,
}

impl<L> Tree<L> {
    /// A tree made of a single leaf.
    pub fn leaf(label: Option<L>) -> Self {
        Self {
            nodes: vec![Node::Leaf { label }],
        }
    }

    pub(super) fn from_nodes(nodes: Vec<Node<L>>) -> Self {
        Self { nodes }
    }

    pub fn root(&self) -> &Node<L> {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[Node<L>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The amount of splits on the longest path from the root to a leaf.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(0, 0)];

        while let Some((idx, depth)) = pending.pop() {
            match self.nodes[idx] {
                Node::Split { left, right, .. } => {
                    pending.push((left, depth + 1));
                    pending.push((right, depth + 1));
                }
                Node::Leaf { .. } => deepest = deepest.max(depth),
            }
        }

        deepest
    }

    /// Walks `features` down to a leaf.
    ///
    /// # Returns
    /// The label of the leaf, `None` if it abstains or `features` is too short.
    pub fn predict(&self, features: &[f32]) -> Option<&L> {
        let mut idx = 0;

        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if *features.get(*feature)? < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { label } => return label.as_ref(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree<&'static str> {
        Tree::from_nodes(vec![
            Node::Split {
                feature: 1,
                threshold: 0.5,
                left: 1,
                right: 2,
            },
            Node::Leaf { label: Some("low") },
            Node::Leaf { label: None },
        ])
    }

    #[test]
    fn walks_to_the_leaf() {
        let tree = stump();

        assert_eq!(tree.predict(&[9., 0.]), Some(&"low"));
        assert_eq!(tree.predict(&[9., 0.5]), None);
        assert_eq!(tree.predict(&[9.]), None);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn single_leaf() {
        let tree = Tree::leaf(Some(3));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&[]), Some(&3));
    }
}
