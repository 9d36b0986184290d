//! River glyphs from polyline adjacency.

use std::collections::{HashMap, HashSet};

use crate::geometry::{line, Direction, Point};

use super::{River, RiverTile, TileRole};

/// Expand a river path into contiguous cells (paths traced with a step size
/// above one skip cells).
fn rasterize(path: &[Point]) -> Vec<Point> {
    let mut cells: Vec<Point> = Vec::with_capacity(path.len());
    for (i, pair) in path.windows(2).enumerate() {
        let seg = line(pair[0], pair[1]);
        let skip = if i == 0 { 0 } else { 1 };
        cells.extend(seg.into_iter().skip(skip));
    }
    if path.len() == 1 {
        cells.push(path[0]);
    }
    cells
}

fn push_unique(dirs: &mut Vec<Direction>, dir: Option<Direction>) {
    if let Some(d) = dir {
        if !dirs.contains(&d) {
            dirs.push(d);
        }
    }
}

/// Build the deduplicated river tiles. Cells owned by a lake are skipped.
pub fn symbolize(rivers: &[River], lake_owner: &HashMap<Point, usize>) -> HashMap<Point, RiverTile> {
    let mut tiles: HashMap<Point, RiverTile> = HashMap::new();
    let mut sources: HashSet<Point> = HashSet::new();
    let mut mouths: HashSet<Point> = HashSet::new();
    let mut confluences: HashSet<Point> = HashSet::new();

    for river in rivers {
        let cells = rasterize(&river.path);
        let visible: Vec<usize> = (0..cells.len())
            .filter(|&i| !lake_owner.contains_key(&cells[i]))
            .collect();
        let (Some(&first), Some(&last)) = (visible.first(), visible.last()) else {
            continue;
        };

        for &i in &visible {
            let p = cells[i];
            let tile = tiles.entry(p).or_insert_with(|| RiverTile {
                position: p,
                inflow: Vec::new(),
                outflow: Vec::new(),
                role: TileRole::Middle,
                is_confluence: false,
                glyph: '~',
                rivers: Vec::new(),
            });
            if i > 0 {
                let prev = cells[i - 1];
                push_unique(&mut tile.inflow, Direction::from_delta(p.x - prev.x, p.y - prev.y));
            }
            if let Some(next) = cells.get(i + 1) {
                push_unique(&mut tile.outflow, Direction::from_delta(next.x - p.x, next.y - p.y));
            }
            if !tile.rivers.contains(&river.id) {
                tile.rivers.push(river.id);
            }
        }
        sources.insert(cells[first]);
        mouths.insert(cells[last]);

        // Each confluence lands on this river's cell nearest the recorded point
        for confluence in &river.confluences {
            let nearest = visible
                .iter()
                .map(|&i| cells[i])
                .min_by_key(|c| c.distance_sq(confluence.point));
            if let Some(c) = nearest {
                confluences.insert(c);
            }
        }
    }

    for (p, tile) in tiles.iter_mut() {
        let single = tile.rivers.len() == 1;
        tile.role = if single && sources.contains(p) {
            TileRole::Source
        } else if single && mouths.contains(p) {
            TileRole::Mouth
        } else {
            TileRole::Middle
        };
        tile.is_confluence = confluences.contains(p);
        tile.glyph = glyph_for(tile);
    }
    tiles
}

/// Glyph for a tile; the first matching rule wins.
pub fn glyph_for(tile: &RiverTile) -> char {
    use Direction::*;

    if tile.is_confluence {
        return '╬';
    }
    match tile.role {
        TileRole::Source => return '●',
        TileRole::Mouth => return '▼',
        TileRole::Middle => {}
    }

    let connections = tile.connections();
    let has = |d: Direction| connections.contains(&d);
    let cardinals: Vec<Direction> = connections.iter().copied().filter(|d| !d.is_diagonal()).collect();
    let diagonals: Vec<Direction> = connections.iter().copied().filter(|d| d.is_diagonal()).collect();

    if connections.is_empty() {
        return '~';
    }
    if diagonals.is_empty() && cardinals.iter().all(|d| matches!(d, N | S)) {
        return '║';
    }
    if diagonals.is_empty() && cardinals.iter().all(|d| matches!(d, E | W)) {
        return '═';
    }
    if diagonals.len() == 1 && cardinals.len() <= 1 {
        return quadrant_glyph(diagonals[0]);
    }
    if diagonals.is_empty() && cardinals.len() == 2 {
        // Corners: one vertical and one horizontal neighbour
        let vertical = if has(N) { N } else { S };
        let horizontal = if has(E) { E } else { W };
        if let Some(d) = Direction::from_delta(horizontal.delta().0, vertical.delta().1) {
            return quadrant_glyph(d);
        }
    }
    if cardinals.len() == 3 {
        return if !has(S) {
            '╩'
        } else if !has(N) {
            '╦'
        } else if !has(E) {
            '╣'
        } else {
            '╠'
        };
    }
    if has(N) && has(S) {
        return '║';
    }
    if has(E) && has(W) {
        return '═';
    }
    '~'
}

/// Corner glyph opening towards a diagonal quadrant.
fn quadrant_glyph(d: Direction) -> char {
    match d {
        Direction::NE => '╚',
        Direction::NW => '╝',
        Direction::SE => '╔',
        Direction::SW => '╗',
        _ => '~',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geology::RockType;
    use crate::hydrology::{Confluence, Spring, Termination};

    fn river(id: usize, path: Vec<Point>) -> River {
        River {
            id,
            spring: Spring {
                position: path[0],
                flow: 1.0,
                elevation: 0.5,
                rock_type: RockType::Soft,
            },
            path,
            flow: 1.0,
            confluences: Vec::new(),
            termination: Termination::Exhausted,
        }
    }

    fn tile(inflow: Vec<Direction>, outflow: Vec<Direction>) -> RiverTile {
        RiverTile {
            position: Point::new(0, 0),
            inflow,
            outflow,
            role: TileRole::Middle,
            is_confluence: false,
            glyph: '~',
            rivers: vec![0],
        }
    }

    #[test]
    fn test_straight_river_glyphs() {
        let r = river(0, line(Point::new(0, 0), Point::new(0, 5)));
        let tiles = symbolize(&[r], &HashMap::new());
        assert_eq!(tiles[&Point::new(0, 0)].glyph, '●');
        assert_eq!(tiles[&Point::new(0, 3)].glyph, '║');
        assert_eq!(tiles[&Point::new(0, 5)].glyph, '▼');
    }

    #[test]
    fn test_glyph_rules() {
        use Direction::*;
        assert_eq!(glyph_for(&tile(vec![E], vec![E])), '═');
        // Flow arrives from the north and turns east
        assert_eq!(glyph_for(&tile(vec![S], vec![E])), '╚');
        assert_eq!(glyph_for(&tile(vec![S], vec![SW])), '╗');
        assert_eq!(glyph_for(&tile(vec![N], vec![E, W])), '╦');
        assert_eq!(glyph_for(&tile(vec![S], vec![E, W])), '╩');
        assert_eq!(glyph_for(&tile(vec![SE], vec![SW])), '~');
    }

    #[test]
    fn test_crossing_marks_confluence() {
        let mut a = river(0, line(Point::new(-5, 0), Point::new(5, 0)));
        let mut b = river(1, line(Point::new(0, -5), Point::new(0, 5)));
        a.confluences.push(Confluence { other_id: 1, point: Point::new(0, 0) });
        b.confluences.push(Confluence { other_id: 0, point: Point::new(0, 0) });
        let tiles = symbolize(&[a, b], &HashMap::new());
        let cross = &tiles[&Point::new(0, 0)];
        assert!(cross.is_confluence);
        assert_eq!(cross.glyph, '╬');
        assert_eq!(cross.rivers, vec![0, 1]);
    }

    #[test]
    fn test_lake_cells_excluded() {
        let r = river(0, line(Point::new(0, 0), Point::new(10, 0)));
        let mut lake = HashMap::new();
        for x in 8..=10 {
            lake.insert(Point::new(x, 0), 0usize);
        }
        let tiles = symbolize(&[r], &lake);
        assert!(!tiles.contains_key(&Point::new(9, 0)));
        assert_eq!(tiles[&Point::new(7, 0)].role, TileRole::Mouth);
    }
}
