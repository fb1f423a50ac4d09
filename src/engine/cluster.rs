//! Point clustering for GeoJSON sources.
//!
//! Every zoom level from 0 to `max_zoom` is clustered independently from
//! the leaves (greedy, in input order) so the levels can be built in
//! parallel. Above `max_zoom` the leaves are rendered as-is.
//!
//! Cluster ids encode their zoom: `(seed_leaf << 5) | (zoom + 1)`.

use super::projection::TILE_SIZE;
use super::spatial::SpatialGrid;
use crate::error::HostError;
use glam::DVec2;
use rayon::prelude::*;

/// One rendered point at a zoom level: a single leaf or a cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoint {
    /// Normalized world position (weighted centroid for clusters)
    pub position: DVec2,
    /// Leaf indices, sorted
    pub members: Vec<usize>,
    /// Set for clusters only
    pub id: Option<u64>,
}

impl ClusterPoint {
    pub fn is_cluster(&self) -> bool {
        self.id.is_some()
    }
}

/// `zoom + 1` has to fit the five low id bits
pub const MAX_LEVEL: u8 = 30;

pub struct ClusterIndex {
    levels: Vec<Vec<ClusterPoint>>,
    max_zoom: u8,
}

impl ClusterIndex {
    /// Cluster `leaves` (normalized world positions) with a pixel radius
    pub fn build(leaves: &[DVec2], radius_px: u32, max_zoom: u8) -> Self {
        let max_zoom = max_zoom.min(MAX_LEVEL);
        let levels = (0..=max_zoom)
            .into_par_iter()
            .map(|z| cluster_level(leaves, z, radius_px as f64))
            .collect();
        Self { levels, max_zoom }
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Points rendered at `zoom`, or `None` when leaves are rendered unclustered
    pub fn level(&self, zoom: f64) -> Option<&[ClusterPoint]> {
        let z = zoom.floor().max(0.0) as usize;
        self.levels.get(z).map(Vec::as_slice)
    }

    /// Lowest zoom above the cluster's own at which its members stop forming
    /// one cluster; `max_zoom + 1` if they stay together until leaves show.
    pub fn expansion_zoom(&self, cluster_id: u64) -> Result<u8, HostError> {
        let zoom = (cluster_id & 31)
            .checked_sub(1)
            .filter(|&z| z <= self.max_zoom as u64)
            .ok_or(HostError::UnknownCluster(cluster_id))? as usize;

        let cluster = self.levels[zoom]
            .iter()
            .find(|p| p.id == Some(cluster_id))
            .ok_or(HostError::UnknownCluster(cluster_id))?;
        let seed = cluster.members[0];

        for z in zoom + 1..=self.max_zoom as usize {
            let holder = self.levels[z].iter().find(|p| p.members.binary_search(&seed).is_ok());
            if holder.map_or(true, |p| p.members != cluster.members) {
                return Ok(z as u8);
            }
        }
        Ok(self.max_zoom.saturating_add(1))
    }
}

fn cluster_level(leaves: &[DVec2], zoom: u8, radius_px: f64) -> Vec<ClusterPoint> {
    // Radius in normalized world units at this zoom
    let radius = radius_px / (TILE_SIZE * 2f64.powi(zoom as i32));

    let mut grid = SpatialGrid::new(radius.max(f64::EPSILON));
    for (i, &p) in leaves.iter().enumerate() {
        grid.insert(p, i);
    }

    let mut visited = vec![false; leaves.len()];
    let mut points = Vec::new();

    for (i, &position) in leaves.iter().enumerate() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let mut members = vec![i];
        for hit in grid.query_radius(position, radius) {
            let Some(&j) = grid.get(hit) else { continue };
            if !visited[j] {
                visited[j] = true;
                members.push(j);
            }
        }

        if members.len() == 1 {
            points.push(ClusterPoint {
                position,
                members,
                id: None,
            });
        } else {
            members.sort_unstable();
            let centroid = members.iter().map(|&m| leaves[m]).sum::<DVec2>() / members.len() as f64;
            points.push(ClusterPoint {
                position: centroid,
                id: Some(((i as u64) << 5) | (zoom as u64 + 1)),
                members,
            });
        }
    }

    points
}

/// Short form of a count for labels: 1234 -> "1.2k"
pub fn abbreviate_count(count: usize) -> String {
    if count >= 10_000 {
        format!("{}k", count / 1000)
    } else if count >= 1000 {
        format!("{:.1}k", count as f64 / 1000.0)
    } else {
        count.to_string()
    }
}
