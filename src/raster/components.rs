//! Connected-component labeling and sieving of small clusters.
//!
//! Components are 4-connected, matching the original snow retrieval chain;
//! diagonal contact does not join clusters.

use crate::types::{MaskGrid, RasterGrid};
use ndarray::Array2;
use std::collections::VecDeque;

/// Labeled components of a boolean mask; label 0 is background
#[derive(Debug, Clone)]
pub struct ComponentLabels {
    pub labels: Array2<u32>,
    /// Pixel count per label; index 0 is unused
    pub sizes: Vec<usize>,
}

impl ComponentLabels {
    pub fn component_count(&self) -> usize {
        self.sizes.len().saturating_sub(1)
    }
}

/// Label the 4-connected components of a mask (breadth-first flood fill)
pub fn label_components(mask: &MaskGrid) -> ComponentLabels {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::zeros((rows, cols));
    let mut sizes = vec![0usize];
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if !mask[[row, col]] || labels[[row, col]] != 0 {
                continue;
            }
            let label = sizes.len() as u32;
            let mut size = 0usize;
            labels[[row, col]] = label;
            queue.push_back((row, col));
            while let Some((r, c)) = queue.pop_front() {
                size += 1;
                let neighbors = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in neighbors {
                    if nr < rows && nc < cols && mask[[nr, nc]] && labels[[nr, nc]] == 0 {
                        labels[[nr, nc]] = label;
                        queue.push_back((nr, nc));
                    }
                }
            }
            sizes.push(size);
        }
    }
    ComponentLabels { labels, sizes }
}

/// Reclassify every component of `class_value` with at most `max_size` pixels
/// to `replacement`. NaN pixels never join a component and are left untouched.
pub fn sieve_class(img: &mut RasterGrid, class_value: f32, replacement: f32, max_size: usize) {
    let mask = img.mapv(|v| !v.is_nan() && v == class_value);
    let components = label_components(&mask);
    let mut removed = 0usize;
    for ((r, c), v) in img.indexed_iter_mut() {
        let label = components.labels[[r, c]];
        if label != 0 && components.sizes[label as usize] <= max_size {
            *v = replacement;
            removed += 1;
        }
    }
    if removed > 0 {
        log::debug!(
            "sieved {} pixels of class {} in components <= {} pixels",
            removed,
            class_value,
            max_size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn mask_from(vals: Vec<u8>, rows: usize, cols: usize) -> MaskGrid {
        Array::from_shape_vec((rows, cols), vals)
            .unwrap()
            .mapv(|v| v != 0)
    }

    #[test]
    fn test_label_components_four_connectivity() {
        // two diagonal pixels do NOT form one component
        let mask = mask_from(vec![1, 0, 0, 1], 2, 2);
        let labeled = label_components(&mask);
        assert_eq!(labeled.component_count(), 2);
        assert_eq!(labeled.sizes[1], 1);
        assert_eq!(labeled.sizes[2], 1);
    }

    #[test]
    fn test_label_components_sizes() {
        let mask = mask_from(
            vec![
                1, 1, 0, 0, //
                1, 0, 0, 1, //
                0, 0, 1, 1,
            ],
            3,
            4,
        );
        let labeled = label_components(&mask);
        assert_eq!(labeled.component_count(), 2);
        let mut sizes = labeled.sizes[1..].to_vec();
        sizes.sort();
        assert_eq!(sizes, vec![3, 3]);
    }

    #[test]
    fn test_sieve_removes_small_clusters_only() {
        let mut img = Array::from_shape_vec(
            (3, 4),
            vec![
                1.0, 1.0, 0.0, 1.0, //
                1.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, f32::NAN,
            ],
        )
        .unwrap();
        sieve_class(&mut img, 1.0, 0.0, 2);
        // the 4-pixel block survives, the lone pixel goes
        assert_eq!(img[[0, 0]], 1.0);
        assert_eq!(img[[1, 1]], 1.0);
        assert_eq!(img[[0, 3]], 0.0);
        assert!(img[[2, 3]].is_nan());
    }

    #[test]
    fn test_sieve_idempotent() {
        let mut img = Array::from_shape_vec(
            (2, 4),
            vec![1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0],
        )
        .unwrap();
        sieve_class(&mut img, 1.0, 0.0, 2);
        let once = img.clone();
        sieve_class(&mut img, 1.0, 0.0, 2);
        assert_eq!(img, once);
    }
}
