//! Density-based clustering (DBSCAN) of planar points.
//!
//! Points are visited in input order and neighbor lists are sorted by index,
//! so the assignment depends only on the point sequence, the radius and the
//! minimum neighborhood size. A border point reachable from two clusters
//! joins whichever cluster reaches it first.

use std::collections::VecDeque;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::projection::PlanarPoint;

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// Neighborhood radius in meters.
    pub eps_meters: f64,
    /// Neighbors (including the point itself) needed for a core point.
    pub min_points: usize,
    /// Clusters smaller than this are discarded.
    pub min_cluster_points: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps_meters: 25.0,
            min_points: 3,
            min_cluster_points: 5,
        }
    }
}

/// A planar point with its input index for R-tree queries.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    x: f64,
    y: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Cluster(usize),
}

/// Runs DBSCAN and returns the cluster id of every point (`None` for noise).
pub fn dbscan(points: &[PlanarPoint], eps: f64, min_points: usize) -> Vec<Option<usize>> {
    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(idx, p)| IndexedPoint {
                idx,
                x: p[0],
                y: p[1],
            })
            .collect(),
    );
    let eps_2 = eps * eps;
    let region = |i: usize| -> Vec<usize> {
        let mut found: Vec<usize> = tree
            .locate_within_distance(points[i], eps_2)
            .map(|p| p.idx)
            .collect();
        found.sort_unstable();
        found
    };

    let mut labels = vec![Label::Unvisited; points.len()];
    let mut next_cluster = 0;

    for i in 0..points.len() {
        if labels[i] != Label::Unvisited {
            continue;
        }
        let neighbors = region(i);
        if neighbors.len() < min_points {
            labels[i] = Label::Noise;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = Label::Cluster(cluster);

        let mut queue: VecDeque<usize> = neighbors.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            match labels[j] {
                Label::Noise => {
                    labels[j] = Label::Cluster(cluster);
                    continue;
                }
                Label::Cluster(_) => continue,
                Label::Unvisited => labels[j] = Label::Cluster(cluster),
            }
            let expansion = region(j);
            if expansion.len() >= min_points {
                queue.extend(
                    expansion
                        .into_iter()
                        .filter(|&k| matches!(labels[k], Label::Unvisited | Label::Noise)),
                );
            }
        }
    }

    labels
        .into_iter()
        .map(|label| match label {
            Label::Cluster(c) => Some(c),
            _ => None,
        })
        .collect()
}

/// Groups points into clusters of member indices.
///
/// Noise is dropped, clusters below `min_cluster_points` are discarded, and
/// the remaining clusters are ordered by their first member.
pub fn cluster(points: &[PlanarPoint], params: &ClusterParams) -> Vec<Vec<usize>> {
    if points.is_empty() {
        return Vec::new();
    }
    let labels = dbscan(points, params.eps_meters, params.min_points.max(1));
    let cluster_count = labels.iter().flatten().max().map_or(0, |m| m + 1);

    let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); cluster_count];
    for (idx, label) in labels.iter().enumerate() {
        if let Some(c) = label {
            clusters[*c].push(idx);
        }
    }

    clusters.retain(|members| members.len() >= params.min_cluster_points.max(1));
    clusters.sort_by_key(|members| members[0]);
    clusters
}
