//! Depression filling for river routing
//!
//! Rivers follow a water surface rather than the raw terrain: every pit is
//! filled up to its spill height, so from any cell there is a strictly
//! descending route to the region edge or the sea.

use crate::elevation::ElevationField;
use crate::tilemap::Tilemap;

/// Minimum drop between a filled cell and the neighbour it drains into.
pub const FILL_EPSILON: f32 = 1e-4;

/// Planchon-Darboux fill.
///
/// Edge cells and cells at or below `sea_level` are outlets and keep their own
/// height. Every other cell settles at `max(terrain, lowest neighbour + FILL_EPSILON)`.
pub fn fill_depressions(elevation: &ElevationField, sea_level: f32) -> Tilemap<f32> {
    let heights = &elevation.heights;
    let bounds = heights.bounds;
    let is_outlet = |x: i32, y: i32, h: f32| {
        h <= sea_level
            || x == bounds.min_x
            || x == bounds.max_x
            || y == bounds.min_y
            || y == bounds.max_y
    };

    let mut water = Tilemap::from_fn(bounds, |x, y| match heights.get(x, y) {
        Some(&h) if is_outlet(x, y, h) => h,
        _ => f32::MAX,
    });

    let xs: Vec<i32> = (bounds.min_x..=bounds.max_x).collect();
    let ys: Vec<i32> = (bounds.min_y..=bounds.max_y).collect();

    // Alternate sweep directions so lowered levels propagate both ways
    let mut changed = true;
    while changed {
        changed = false;
        for forward in [true, false] {
            let rows: Box<dyn Iterator<Item = &i32>> = if forward {
                Box::new(ys.iter())
            } else {
                Box::new(ys.iter().rev())
            };
            for &y in rows {
                let cols: Box<dyn Iterator<Item = &i32>> = if forward {
                    Box::new(xs.iter())
                } else {
                    Box::new(xs.iter().rev())
                };
                for &x in cols {
                    let Some(&h) = heights.get(x, y) else {
                        continue;
                    };
                    let lowest = water
                        .neighbors_8(x, y)
                        .into_iter()
                        .filter_map(|n| water.get(n.x, n.y).copied())
                        .fold(f32::MAX, f32::min);
                    if lowest == f32::MAX {
                        continue;
                    }
                    let level = h.max(lowest + FILL_EPSILON);
                    if let Some(cell) = water.get_mut(x, y) {
                        if level < *cell {
                            *cell = level;
                            changed = true;
                        }
                    }
                }
            }
        }
    }
    water
}
