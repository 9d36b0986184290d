//! Grid geometry: points, compass directions, bounds and line traversal.
//!
//! Screen convention: `x` grows east, `y` grows south, so north is `(0, -1)`.

use serde::{Deserialize, Serialize};

/// Integer grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        self.offset(dx, dy)
    }

    pub fn distance_sq(self, other: Point) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    pub fn distance(self, other: Point) -> f32 {
        (self.distance_sq(other) as f32).sqrt()
    }

    /// Chebyshev distance (king moves).
    pub fn chebyshev(self, other: Point) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// The eight compass directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];

    /// Diagonals first, then cardinals. Agents try steps in this order.
    pub const DIAGONALS_FIRST: [Direction; 8] = [
        Direction::NE,
        Direction::SE,
        Direction::SW,
        Direction::NW,
        Direction::N,
        Direction::E,
        Direction::S,
        Direction::W,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::N => (0, -1),
            Direction::NE => (1, -1),
            Direction::E => (1, 0),
            Direction::SE => (1, 1),
            Direction::S => (0, 1),
            Direction::SW => (-1, 1),
            Direction::W => (-1, 0),
            Direction::NW => (-1, -1),
        }
    }

    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        Some(match (dx.signum(), dy.signum()) {
            (0, -1) => Direction::N,
            (1, -1) => Direction::NE,
            (1, 0) => Direction::E,
            (1, 1) => Direction::SE,
            (0, 1) => Direction::S,
            (-1, 1) => Direction::SW,
            (-1, 0) => Direction::W,
            (-1, -1) => Direction::NW,
            _ => return None,
        })
    }

    pub fn is_diagonal(self) -> bool {
        matches!(self, Direction::NE | Direction::SE | Direction::SW | Direction::NW)
    }

    pub fn opposite(self) -> Direction {
        let (dx, dy) = self.delta();
        Direction::from_delta(-dx, -dy).unwrap_or(self)
    }

    /// Unit vector (diagonals normalised).
    pub fn unit(self) -> (f32, f32) {
        let (dx, dy) = self.delta();
        let len = ((dx * dx + dy * dy) as f32).sqrt();
        (dx as f32 / len, dy as f32 / len)
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::NE => "NE",
            Direction::E => "E",
            Direction::SE => "SE",
            Direction::S => "S",
            Direction::SW => "SW",
            Direction::W => "W",
            Direction::NW => "NW",
        }
    }
}

/// Inclusive rectangular region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Bounds {
    /// Square region of `size` cells centred on `(cx, cy)`.
    pub fn centered(cx: i32, cy: i32, size: u32) -> Self {
        let size = size.max(1) as i32;
        let min_x = cx - size / 2;
        let min_y = cy - size / 2;
        Self {
            min_x,
            max_x: min_x + size - 1,
            min_y,
            max_y: min_y + size - 1,
        }
    }

    pub fn width(&self) -> usize {
        (self.max_x - self.min_x + 1).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (self.max_y - self.min_y + 1).max(0) as usize
    }

    /// Inverted explicit bounds describe no cells at all.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn contains_point(&self, p: Point) -> bool {
        self.contains(p.x, p.y)
    }

    pub fn center(&self) -> Point {
        Point::new((self.min_x + self.max_x) / 2, (self.min_y + self.max_y) / 2)
    }

    /// All points, row-major.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        (self.min_y..=self.max_y)
            .flat_map(move |y| (self.min_x..=self.max_x).map(move |x| Point::new(x, y)))
    }
}

/// Cells on the grid segment from `a` to `b`, both endpoints included.
///
/// The traversal always starts from the smaller endpoint, so `line(a, b)` and
/// `line(b, a)` visit the same cells.
pub fn line(a: Point, b: Point) -> Vec<Point> {
    let (start, end, reversed) = if a <= b { (a, b, false) } else { (b, a, true) };
    let mut cells = Vec::with_capacity(start.chebyshev(end) as usize + 1);

    let dx = (end.x - start.x).abs();
    let dy = -(end.y - start.y).abs();
    let sx = if start.x < end.x { 1 } else { -1 };
    let sy = if start.y < end.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (start.x, start.y);

    loop {
        cells.push(Point::new(x, y));
        if x == end.x && y == end.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }

    if reversed {
        cells.reverse();
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_centered() {
        let b = Bounds::centered(0, 0, 200);
        assert_eq!(b.width(), 200);
        assert_eq!(b.height(), 200);
        assert!(b.contains(0, 0));
        assert!(b.contains(-100, 99));
        assert!(!b.contains(100, 0));
    }

    #[test]
    fn test_direction_round_trip() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(dir));
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Direction::from_delta(0, 0), None);
    }

    #[test]
    fn test_line_endpoints_and_continuity() {
        let a = Point::new(2, 3);
        let b = Point::new(11, -4);
        let cells = line(a, b);
        assert_eq!(cells.first(), Some(&a));
        assert_eq!(cells.last(), Some(&b));
        for pair in cells.windows(2) {
            assert_eq!(pair[0].chebyshev(pair[1]), 1, "gap between {:?} and {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_line_symmetric() {
        let a = Point::new(-3, 7);
        let b = Point::new(9, 2);
        let mut forward = line(a, b);
        let backward = line(b, a);
        forward.reverse();
        assert_eq!(forward, backward);
    }
}
