//! Sample distances and complete-linkage hierarchical clustering

use ndarray::Array2;

use crate::error::{DeseqError, Result};

/// Euclidean distances between the columns of a genes x samples matrix
pub fn euclidean_distances(data: &Array2<f64>) -> Array2<f64> {
    let n = data.ncols();
    let mut dist = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = data
                .column(i)
                .iter()
                .zip(data.column(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            dist[[i, j]] = d;
            dist[[j, i]] = d;
        }
    }
    dist
}

/// One agglomeration step. Node ids below `n` are leaves; merge `k`
/// creates node `n + k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct Dendrogram {
    pub n_leaves: usize,
    pub merges: Vec<Merge>,
    /// Leaves in drawing order
    pub order: Vec<usize>,
}

impl Dendrogram {
    /// Position of every node along the leaf axis: leaves at their rank in
    /// `order`, internal nodes midway between their children.
    pub fn node_positions(&self) -> Vec<f64> {
        let mut pos = vec![0.0; self.n_leaves + self.merges.len()];
        for (rank, &leaf) in self.order.iter().enumerate() {
            pos[leaf] = rank as f64;
        }
        for (k, m) in self.merges.iter().enumerate() {
            pos[self.n_leaves + k] = (pos[m.left] + pos[m.right]) / 2.0;
        }
        pos
    }

    /// Height of every node; leaves sit at zero
    pub fn node_heights(&self) -> Vec<f64> {
        let mut h = vec![0.0; self.n_leaves];
        h.extend(self.merges.iter().map(|m| m.height));
        h
    }
}

/// Agglomerative clustering where cluster distance is the largest pairwise
/// member distance. Ties go to the lowest pair of cluster ids, and the
/// child holding the smaller leaf index is placed on the left.
pub fn complete_linkage(dist: &Array2<f64>) -> Result<Dendrogram> {
    let n = dist.nrows();
    if n == 0 || dist.ncols() != n {
        return Err(DeseqError::fit(format!(
            "distance matrix must be square and non-empty, got {}x{}",
            dist.nrows(),
            dist.ncols()
        )));
    }

    // (node id, member leaves)
    let mut active: Vec<(usize, Vec<usize>)> = (0..n).map(|i| (i, vec![i])).collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    while active.len() > 1 {
        let mut best = (0, 1, f64::INFINITY);
        for a in 0..active.len() {
            for b in (a + 1)..active.len() {
                let d = active[a]
                    .1
                    .iter()
                    .flat_map(|&i| active[b].1.iter().map(move |&j| (i, j)))
                    .map(|(i, j)| dist[[i, j]])
                    .fold(f64::NEG_INFINITY, f64::max);
                if d < best.2 {
                    best = (a, b, d);
                }
            }
        }
        let (a, b, height) = best;
        let (right_id, right_members) = active.remove(b);
        let (left_id, left_members) = active.remove(a);
        let (left, right) = if left_members.iter().min() <= right_members.iter().min() {
            (left_id, right_id)
        } else {
            (right_id, left_id)
        };
        merges.push(Merge { left, right, height });
        let mut members = left_members;
        members.extend(right_members);
        active.insert(a, (n + merges.len() - 1, members));
    }

    let order = leaf_order(n, &merges);
    Ok(Dendrogram {
        n_leaves: n,
        merges,
        order,
    })
}

fn leaf_order(n: usize, merges: &[Merge]) -> Vec<usize> {
    let mut order = Vec::with_capacity(n);
    let root = n + merges.len() - 1;
    let mut stack = vec![if merges.is_empty() { 0 } else { root }];
    while let Some(node) = stack.pop() {
        if node < n {
            order.push(node);
        } else {
            let m = merges[node - n];
            stack.push(m.right);
            stack.push(m.left);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_euclidean_distances() {
        let data = array![[0.0, 3.0, 0.0], [0.0, 4.0, 1.0]];
        let d = euclidean_distances(&data);
        assert_eq!(d[[0, 1]], 5.0);
        assert_eq!(d[[1, 0]], 5.0);
        assert_eq!(d[[0, 2]], 1.0);
        assert_eq!(d[[2, 2]], 0.0);
    }

    #[test]
    fn test_complete_linkage_groups_close_samples() {
        // samples 0 and 2 close, 1 and 3 close
        let data = array![[0.0, 10.0, 0.5, 10.2], [0.0, 10.0, 0.2, 9.9]];
        let tree = complete_linkage(&euclidean_distances(&data)).unwrap();
        assert_eq!(tree.merges.len(), 3);
        assert_eq!((tree.merges[0].left, tree.merges[0].right), (1, 3));
        assert_eq!((tree.merges[1].left, tree.merges[1].right), (0, 2));
        assert_eq!(tree.order, vec![0, 2, 1, 3]);
        for w in tree.merges.windows(2) {
            assert!(w[0].height <= w[1].height);
        }
        // complete linkage: root height is the largest cross-group distance
        let d = euclidean_distances(&data);
        let expected = [d[[0, 1]], d[[0, 3]], d[[2, 1]], d[[2, 3]]].iter().cloned().fold(0.0, f64::max);
        assert!((tree.merges[2].height - expected).abs() < 1e-12);
    }

    #[test]
    fn test_node_positions() {
        let dist = array![[0.0, 1.0, 4.0], [1.0, 0.0, 4.0], [4.0, 4.0, 0.0]];
        let tree = complete_linkage(&dist).unwrap();
        assert_eq!(tree.order, vec![0, 1, 2]);
        let pos = tree.node_positions();
        assert_eq!(pos[3], 0.5);
        assert_eq!(pos[4], 1.25);
        assert_eq!(tree.node_heights()[4], 4.0);
    }

    #[test]
    fn test_single_leaf() {
        let tree = complete_linkage(&array![[0.0]]).unwrap();
        assert!(tree.merges.is_empty());
        assert_eq!(tree.order, vec![0]);
    }
}
