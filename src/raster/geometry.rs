//! Polygon rasterization and basin lookup.

use crate::types::{Aoi, GridSpec, MaskGrid, Polygon};
use ndarray::Array2;

/// Rasterize a polygon onto a grid: a cell is inside when its center is
pub fn rasterize(polygon: &Polygon, grid: &GridSpec) -> MaskGrid {
    let bb = polygon.bbox();
    let mut out = Array2::from_elem(grid.shape(), false);
    for ((r, c), v) in out.indexed_iter_mut() {
        let (x, y) = grid.cell_center(r, c);
        if x < bb.min_x || x > bb.max_x || y < bb.min_y || y > bb.max_y {
            continue;
        }
        *v = polygon.contains(x, y);
    }
    out
}

/// Resolve a map click to a basin: the containing polygon when there is one,
/// otherwise the basin with the nearest centroid
pub fn nearest_basin<'a>(point: (f64, f64), basins: &'a [Aoi]) -> Option<&'a Aoi> {
    let (x, y) = point;
    if let Some(hit) = basins.iter().find(|b| b.polygon.contains(x, y)) {
        return Some(hit);
    }
    basins.iter().min_by(|a, b| {
        let da = centroid_dist2(&a.polygon, x, y);
        let db = centroid_dist2(&b.polygon, x, y);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    })
}

fn centroid_dist2(polygon: &Polygon, x: f64, y: f64) -> f64 {
    let (cx, cy) = polygon.centroid();
    (cx - x).powi(2) + (cy - y).powi(2)
}
