//! Static KD-tree for exact k-nearest-neighbor queries in scaled space.
//!
//! Nodes are stored in a left-complete (Eytzinger) array: the children of
//! node `i` are `2i + 1` and `2i + 2`, and the point data is permuted into
//! node order so a query walks memory mostly forward.
//!
//! Invariants:
//! * built once, never modified;
//! * queries return the exact `k` nearest points (ties broken by point id),
//!   sorted by ascending distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::reference::ReferenceGrid;

/// A candidate neighbor, ordered by (squared distance, id).
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist_sq: f64,
    id: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.id.cmp(&other.id))
    }
}

/// Result of a k-nearest query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
    /// Reference pixel ids, nearest first.
    pub ids: Vec<usize>,
    /// Euclidean distances matching `ids`.
    pub distances: Vec<f64>,
}

impl Neighbors {
    /// Number of neighbors found.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if no neighbors were found.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Reusable scratch space for queries, one per worker.
#[derive(Debug, Default)]
pub struct SearchBuffer {
    heap: BinaryHeap<Candidate>,
    /// (node index, axis, squared distance from query to the node's region)
    stack: Vec<(usize, usize, f64)>,
}

impl SearchBuffer {
    /// Create a buffer sized for `k` neighbors.
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k + 1),
            stack: Vec::with_capacity(64),
        }
    }
}

/// Nearest-neighbor index over scaled reference locations.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    /// Original point id stored at each node.
    ids: Vec<usize>,
    /// Point coordinates in node order.
    points: Vec<[f64; 3]>,
}

impl SpatialIndex {
    /// Build the index over already-scaled points.
    pub fn build(points: &[[f64; 3]]) -> Self {
        let n = points.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut ids = vec![0usize; n];
        let mut permuted = vec![[0.0; 3]; n];

        Self::build_recursive(points, &mut order, 0, 0, &mut ids, &mut permuted);

        Self {
            ids,
            points: permuted,
        }
    }

    /// Build the index over every pixel of a reference grid.
    pub fn from_reference(reference: &ReferenceGrid) -> Self {
        let points: Vec<[f64; 3]> = reference.locations().iter().map(|c| c.as_array()).collect();
        Self::build(&points)
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Find the `k` nearest points to `query`.
    ///
    /// Returns every point when `k` exceeds the number of points.
    pub fn query(&self, query: &[f64; 3], k: usize) -> Neighbors {
        let mut buffer = SearchBuffer::new(k);
        let mut out = Neighbors::default();
        self.query_into(query, k, &mut buffer, &mut out);
        out
    }

    /// Allocation-free variant of [`query`](Self::query).
    pub fn query_into(
        &self,
        query: &[f64; 3],
        k: usize,
        buffer: &mut SearchBuffer,
        out: &mut Neighbors,
    ) {
        out.ids.clear();
        out.distances.clear();
        buffer.heap.clear();
        buffer.stack.clear();

        if k == 0 || self.ids.is_empty() {
            return;
        }

        self.search(query, k, buffer);

        let mut found: Vec<Candidate> = buffer.heap.drain().collect();
        found.sort_unstable();
        for c in found {
            out.ids.push(c.id);
            out.distances.push(c.dist_sq.sqrt());
        }
    }

    fn search(&self, query: &[f64; 3], k: usize, buffer: &mut SearchBuffer) {
        let n = self.ids.len();
        let heap = &mut buffer.heap;
        let stack = &mut buffer.stack;

        stack.push((0, 0, 0.0));

        while let Some((node, axis, region_dist_sq)) = stack.pop() {
            if heap.len() == k {
                if let Some(worst) = heap.peek() {
                    if region_dist_sq > worst.dist_sq {
                        continue;
                    }
                }
            }

            let point = &self.points[node];
            let candidate = Candidate {
                dist_sq: distance_sq(query, point),
                id: self.ids[node],
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(mut worst) = heap.peek_mut() {
                if candidate < *worst {
                    *worst = candidate;
                }
            }

            let left = 2 * node + 1;
            if left >= n {
                continue;
            }
            let right = left + 1;
            let next_axis = (axis + 1) % 3;

            let diff = query[axis] - point[axis];
            let plane_dist_sq = region_dist_sq.max(diff * diff);
            let (near, far) = if diff <= 0.0 {
                (Some(left), (right < n).then_some(right))
            } else {
                ((right < n).then_some(right), Some(left))
            };

            // far first so the near side is explored first
            if let Some(far) = far {
                stack.push((far, next_axis, plane_dist_sq));
            }
            if let Some(near) = near {
                stack.push((near, next_axis, region_dist_sq));
            }
        }
    }

    fn build_recursive(
        points: &[[f64; 3]],
        order: &mut [usize],
        depth: usize,
        node: usize,
        ids: &mut [usize],
        permuted: &mut [[f64; 3]],
    ) {
        if order.is_empty() {
            return;
        }

        let axis = depth % 3;
        let median = left_subtree_size(order.len());
        order.select_nth_unstable_by(median, |&a, &b| {
            points[a][axis]
                .total_cmp(&points[b][axis])
                .then(a.cmp(&b))
        });

        let id = order[median];
        ids[node] = id;
        permuted[node] = points[id];

        let (left, rest) = order.split_at_mut(median);
        let right = &mut rest[1..];
        Self::build_recursive(points, left, depth + 1, 2 * node + 1, ids, permuted);
        Self::build_recursive(points, right, depth + 1, 2 * node + 2, ids, permuted);
    }
}

#[inline]
fn distance_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Number of nodes in the left subtree of a left-complete tree of `n` nodes.
fn left_subtree_size(n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let height = (usize::BITS - n.leading_zeros() - 1) as usize;
    let last_level_capacity = 1usize << height;
    let last_level = n - (last_level_capacity - 1);
    let half = last_level_capacity / 2;
    (half - 1) + last_level.min(half)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(points: &[[f64; 3]], query: &[f64; 3], k: usize) -> Vec<usize> {
        let mut all: Vec<Candidate> = points
            .iter()
            .enumerate()
            .map(|(id, p)| Candidate {
                dist_sq: distance_sq(query, p),
                id,
            })
            .collect();
        all.sort_unstable();
        all.into_iter().take(k).map(|c| c.id).collect()
    }

    /// Deterministic pseudo-random points (LCG) so tests need no rng crate.
    fn scattered_points(n: usize) -> Vec<[f64; 3]> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..n)
            .map(|_| [next() * 1000.0, next() * 1000.0, next() * 30.0])
            .collect()
    }

    #[test]
    fn test_left_subtree_size() {
        assert_eq!(left_subtree_size(0), 0);
        assert_eq!(left_subtree_size(1), 0);
        assert_eq!(left_subtree_size(2), 1);
        assert_eq!(left_subtree_size(3), 1);
        assert_eq!(left_subtree_size(4), 2);
        assert_eq!(left_subtree_size(6), 3);
        assert_eq!(left_subtree_size(7), 3);
        assert_eq!(left_subtree_size(8), 4);
    }

    #[test]
    fn test_matches_brute_force() {
        let points = scattered_points(500);
        let index = SpatialIndex::build(&points);
        assert_eq!(index.len(), 500);

        for query in scattered_points(25) {
            for k in [1, 7, 40, 499] {
                let found = index.query(&query, k);
                assert_eq!(found.ids, brute_force(&points, &query, k));
            }
        }
    }

    #[test]
    fn test_distances_sorted_and_correct() {
        let points = scattered_points(100);
        let index = SpatialIndex::build(&points);
        let query = [500.0, 500.0, 15.0];
        let found = index.query(&query, 10);

        assert!(found.distances.windows(2).all(|w| w[0] <= w[1]));
        for (id, d) in found.ids.iter().zip(&found.distances) {
            assert!((distance_sq(&query, &points[*id]).sqrt() - d).abs() < 1e-9);
        }
    }

    #[test]
    fn test_k_larger_than_point_count() {
        let points = scattered_points(5);
        let index = SpatialIndex::build(&points);
        let found = index.query(&[0.0; 3], 400);
        assert_eq!(found.len(), 5);
        let mut ids = found.ids.clone();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_duplicate_points_tie_break_by_id() {
        let points = vec![[1.0, 1.0, 1.0]; 6];
        let index = SpatialIndex::build(&points);
        assert_eq!(index.query(&[1.0, 1.0, 1.0], 3).ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = SpatialIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.query(&[0.0; 3], 5).is_empty());

        let index = SpatialIndex::build(&scattered_points(3));
        assert!(index.query(&[0.0; 3], 0).is_empty());
    }
}
