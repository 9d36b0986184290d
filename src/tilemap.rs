//! Dense 2D grid addressed by world coordinates.
//!
//! Unlike a planet map this grid does not wrap: the region is a bounded
//! rectangle that may start at negative coordinates, and out-of-bounds reads
//! return `None`.

use rayon::prelude::*;

use crate::geometry::{Bounds, Point};

#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub bounds: Bounds,
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(bounds: Bounds, value: T) -> Self {
        let width = bounds.width();
        let height = bounds.height();
        Self {
            bounds,
            width,
            height,
            data: vec![value; width * height],
        }
    }
}

impl<T> Tilemap<T> {
    /// Build a map by evaluating `f` at every cell. Rows are computed in parallel;
    /// the result does not depend on scheduling as long as `f` is pure.
    pub fn from_fn<F>(bounds: Bounds, f: F) -> Self
    where
        T: Send,
        F: Fn(i32, i32) -> T + Sync,
    {
        let width = bounds.width();
        let height = bounds.height();
        let rows: Vec<Vec<T>> = (0..height)
            .into_par_iter()
            .map(|row| {
                let y = bounds.min_y + row as i32;
                (0..width).map(|col| f(bounds.min_x + col as i32, y)).collect()
            })
            .collect();
        Self {
            bounds,
            width,
            height,
            data: rows.into_iter().flatten().collect(),
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.bounds.contains(x, y) {
            return None;
        }
        let col = (x - self.bounds.min_x) as usize;
        let row = (y - self.bounds.min_y) as usize;
        Some(row * self.width + col)
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&T> {
        self.index(x, y).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut T> {
        let i = self.index(x, y)?;
        Some(&mut self.data[i])
    }

    /// Set a cell. Writes outside the bounds are ignored.
    pub fn set(&mut self, x: i32, y: i32, value: T) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = value;
        }
    }

    /// Iterate over all cells with their coordinates, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (Point, &T)> {
        let bounds = self.bounds;
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = bounds.min_x + (idx % width) as i32;
            let y = bounds.min_y + (idx / width) as i32;
            (Point::new(x, y), val)
        })
    }

    /// In-bounds 8-connected neighbours.
    pub fn neighbors_8(&self, x: i32, y: i32) -> Vec<Point> {
        let mut result = Vec::with_capacity(8);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if self.bounds.contains(x + dx, y + dy) {
                    result.push(Point::new(x + dx, y + dy));
                }
            }
        }
        result
    }

    pub fn values(&self) -> &[T] {
        &self.data
    }
}

impl Tilemap<f32> {
    /// One pass of a 5-tap box filter (centre plus 4 cardinal neighbours).
    /// Edge cells average only their in-bounds taps.
    pub fn box_blur5(&self) -> Self {
        Tilemap::from_fn(self.bounds, |x, y| {
            let mut sum = 0.0f32;
            let mut count = 0.0f32;
            for (dx, dy) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)] {
                if let Some(v) = self.get(x + dx, y + dy) {
                    sum += *v;
                    count += 1.0;
                }
            }
            sum / count
        })
    }

    /// Central-difference gradient magnitude.
    pub fn gradient_at(&self, x: i32, y: i32) -> f32 {
        let Some(&center) = self.get(x, y) else {
            return 0.0;
        };
        let sample = |dx: i32, dy: i32| self.get(x + dx, y + dy).copied().unwrap_or(center);
        let gx = (sample(1, 0) - sample(-1, 0)) * 0.5;
        let gy = (sample(0, 1) - sample(0, -1)) * 0.5;
        (gx * gx + gy * gy).sqrt()
    }

    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_origin_indexing() {
        let bounds = Bounds::centered(0, 0, 10);
        let mut map = Tilemap::new_with(bounds, 0u8);
        map.set(-5, -5, 7);
        map.set(4, 4, 9);
        assert_eq!(map.get(-5, -5), Some(&7));
        assert_eq!(map.get(4, 4), Some(&9));
        assert_eq!(map.get(5, 0), None);
    }

    #[test]
    fn test_from_fn_row_major() {
        let bounds = Bounds::centered(10, 10, 6);
        let map = Tilemap::from_fn(bounds, |x, y| x * 100 + y);
        for (p, v) in map.iter() {
            assert_eq!(*v, p.x * 100 + p.y, "mismatch at {:?}", p);
        }
    }

    #[test]
    fn test_box_blur_preserves_constant() {
        let bounds = Bounds::centered(0, 0, 8);
        let map = Tilemap::new_with(bounds, 0.4f32);
        let blurred = map.box_blur5();
        for (_, v) in blurred.iter() {
            assert!((v - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn test_gradient_of_ramp() {
        let bounds = Bounds::centered(0, 0, 8);
        let map = Tilemap::from_fn(bounds, |x, _| x as f32 * 0.1);
        assert!((map.gradient_at(0, 0) - 0.1).abs() < 1e-5);
    }
}
