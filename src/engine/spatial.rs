use glam::DVec2;
use std::collections::HashMap;

/// Spatial hash grid for O(1) neighbourhood queries.
/// Positions are normalized world coordinates; the cell size is chosen
/// equal to the query radius so a query touches at most 3x3 cells.
pub struct SpatialGrid<T> {
    /// Grid cells indexed by (cell_x, cell_y)
    cells: HashMap<(i64, i64), Vec<usize>>,
    /// All items with their positions (indices into this vec stored in cells)
    items: Vec<(DVec2, T)>,
    cell_size: f64,
}

impl<T> SpatialGrid<T> {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            items: Vec::new(),
            cell_size,
        }
    }

    #[inline(always)]
    fn to_cell(&self, p: DVec2) -> (i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    /// Insert an item, returning its index
    pub fn insert(&mut self, position: DVec2, item: T) -> usize {
        let idx = self.items.len();
        self.items.push((position, item));

        let cell = self.to_cell(position);
        self.cells.entry(cell).or_default().push(idx);
        idx
    }

    /// Indices of items within `radius` of `center` (exact distance check)
    pub fn query_radius(&self, center: DVec2, radius: f64) -> Vec<usize> {
        let center_cell = self.to_cell(center);
        let cell_radius = (radius / self.cell_size).ceil() as i64;
        let radius_sq = radius * radius;

        let mut results = Vec::new();
        for dy in -cell_radius..=cell_radius {
            for dx in -cell_radius..=cell_radius {
                let cell = (center_cell.0 + dx, center_cell.1 + dy);
                if let Some(indices) = self.cells.get(&cell) {
                    results.extend(
                        indices
                            .iter()
                            .copied()
                            .filter(|&i| self.items[i].0.distance_squared(center) <= radius_sq),
                    );
                }
            }
        }
        results.sort_unstable();
        results
    }

    #[inline(always)]
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx).map(|(_, item)| item)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
