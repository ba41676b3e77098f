use std::collections::BTreeMap;

use rand::Rng;

use super::{Node, Tree};
use crate::data::Example;

/// Grows a tree over `records` with random feature splits at the mean.
///
/// # Arguments
/// * `records` - The bootstrap sample, every feature vector has `features` values.
/// * `features` - The dimension of the feature vectors.
/// * `max_depth` - The maximum amount of splits from the root to a leaf.
/// * `rng` - The random number generator of this tree.
pub(super) fn grow<L, R>(
    records: Vec<&Example<L>>,
    features: usize,
    max_depth: usize,
    rng: &mut R,
) -> Tree<L>
where
    L: Ord + Clone,
    R: Rng + ?Sized,
{
    let mut nodes = Vec::new();
    grow_node(&mut nodes, records, features, max_depth, rng);
    Tree::from_nodes(nodes)
}

fn grow_node<L, R>(
    nodes: &mut Vec<Node<L>>,
    records: Vec<&Example<L>>,
    features: usize,
    depth: usize,
    rng: &mut R,
) -> usize
where
    L: Ord + Clone,
    R: Rng + ?Sized,
{
    let idx = nodes.len();

    if depth == 0 || features == 0 || is_pure(&records) {
        nodes.push(Node::Leaf {
            label: majority(&records),
        });
        return idx;
    }

    let feature = rng.random_range(0..features);
    let threshold =
        records.iter().map(|e| e.features[feature]).sum::<f32>() / records.len() as f32;

    let (left, right): (Vec<_>, Vec<_>) = records
        .iter()
        .copied()
        .partition(|e| e.features[feature] < threshold);

    // Every record fell on the same side.
    if left.is_empty() || right.is_empty() {
        nodes.push(Node::Leaf {
            label: majority(&records),
        });
        return idx;
    }

    // Reserved, replaced once both children are in.
    nodes.push(Node::Leaf { label: None });

    let left = grow_node(nodes, left, features, depth - 1, rng);
    let right = grow_node(nodes, right, features, depth - 1, rng);

    nodes[idx] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };

    idx
}

/// Empty samples count as pure.
fn is_pure<L: PartialEq>(records: &[&Example<L>]) -> bool {
    records
        .split_first()
        .is_none_or(|(first, rest)| rest.iter().all(|e| e.label == first.label))
}

/// The most frequent label, the smallest one on a tie.
fn majority<L: Ord + Clone>(records: &[&Example<L>]) -> Option<L> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(&record.label).or_insert(0usize) += 1;
    }

    let mut best: Option<(&L, usize)> = None;
    for (label, count) in counts {
        if best.is_none_or(|(_, most)| count > most) {
            best = Some((label, count));
        }
    }

    best.map(|(label, _)| label.clone())
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn examples() -> Vec<Example<bool>> {
        [-2., -1., 1., 2.]
            .into_iter()
            .map(|x| Example::new(vec![x], x > 0.))
            .collect()
    }

    #[test]
    fn stops_on_pure_nodes() {
        let examples = examples();
        let mut rng = StdRng::seed_from_u64(0);

        let tree = grow(examples.iter().collect(), 1, 5, &mut rng);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.depth(), 1);
        assert_eq!(
            tree.root(),
            &Node::Split {
                feature: 0,
                threshold: 0.,
                left: 1,
                right: 2
            }
        );
        assert_eq!(tree.predict(&[-0.5]), Some(&false));
        assert_eq!(tree.predict(&[0.]), Some(&true));
    }

    #[test]
    fn zero_depth_is_a_majority_leaf() {
        let mut examples = examples();
        examples.push(Example::new(vec![3.], true));
        let mut rng = StdRng::seed_from_u64(0);

        let tree = grow(examples.iter().collect(), 1, 0, &mut rng);

        assert_eq!(tree, Tree::leaf(Some(true)));
    }

    #[test]
    fn inseparable_sample_is_a_leaf() {
        let examples = [
            Example::new(vec![1., 1.], "b"),
            Example::new(vec![1., 1.], "a"),
            Example::new(vec![1., 1.], "b"),
        ];
        let mut rng = StdRng::seed_from_u64(0);

        let tree = grow(examples.iter().collect(), 2, usize::MAX, &mut rng);

        assert_eq!(tree, Tree::leaf(Some("b")));
    }

    #[test]
    fn empty_sample_abstains() {
        let mut rng = StdRng::seed_from_u64(0);
        let tree: Tree<bool> = grow(Vec::new(), 3, 5, &mut rng);

        assert_eq!(tree, Tree::leaf(None));
    }

    #[test]
    fn ties_go_to_the_smallest_label() {
        let examples = [Example::new(vec![], "b"), Example::new(vec![], "a")];
        let records: Vec<_> = examples.iter().collect();

        assert_eq!(majority(&records), Some("a"));
    }
}
