//! Deer movement and perception
//!
//! All movement is one tile at a time. Candidate steps are tried diagonals
//! first; the step best aligned with the desired direction wins and earlier
//! candidates win ties.

use std::collections::HashMap;

use crate::geometry::{line, Direction, Point};

use super::types::DeerId;
use super::DeerTerrain;

/// Normalise a vector; zero stays zero.
pub fn normalize((x, y): (f32, f32)) -> (f32, f32) {
    let len = (x * x + y * y).sqrt();
    if len <= f32::EPSILON {
        (0.0, 0.0)
    } else {
        (x / len, y / len)
    }
}

/// Unit vector pointing from `threat` to `from`.
pub fn away_from(from: Point, threat: Point) -> (f32, f32) {
    normalize(((from.x - threat.x) as f32, (from.y - threat.y) as f32))
}

pub fn towards(from: Point, target: Point) -> (f32, f32) {
    normalize(((target.x - from.x) as f32, (target.y - from.y) as f32))
}

/// Whether the deer at `from` sees `player` within `range`.
pub fn can_see<T: DeerTerrain + ?Sized>(terrain: &T, from: Point, player: Point, range: f32) -> bool {
    if from.distance(player) > range {
        return false;
    }
    let cells = line(from, player);
    let inner = cells.len().saturating_sub(1);
    cells.iter().take(inner).skip(1).all(|&c| !terrain.blocks_sight(c))
}

fn step_allowed<T: DeerTerrain + ?Sized>(
    terrain: &T,
    occupancy: &HashMap<Point, DeerId>,
    to: Point,
) -> bool {
    terrain.is_walkable(to) && !occupancy.contains_key(&to)
}

/// Best permitted neighbour for `desired`, or `None` if every neighbour is
/// blocked or there is no direction to follow.
pub fn choose_step<T: DeerTerrain + ?Sized>(
    terrain: &T,
    occupancy: &HashMap<Point, DeerId>,
    from: Point,
    desired: (f32, f32),
) -> Option<Point> {
    let desired = normalize(desired);
    if desired == (0.0, 0.0) {
        return None;
    }
    let mut best: Option<(f32, Point)> = None;
    for dir in Direction::DIAGONALS_FIRST {
        let to = from.step(dir);
        if !step_allowed(terrain, occupancy, to) {
            continue;
        }
        let (ux, uy) = dir.unit();
        let alignment = ux * desired.0 + uy * desired.1;
        if best.map_or(true, |(b, _)| alignment > b) {
            best = Some((alignment, to));
        }
    }
    best.map(|(_, p)| p)
}

/// Escape step: only neighbours that strictly increase the distance from
/// `threat` qualify, ranked by alignment with `desired`.
pub fn escape_step<T: DeerTerrain + ?Sized>(
    terrain: &T,
    occupancy: &HashMap<Point, DeerId>,
    from: Point,
    threat: Point,
    desired: (f32, f32),
) -> Option<Point> {
    let current = from.distance_sq(threat);
    let mut desired = normalize(desired);
    if desired == (0.0, 0.0) {
        desired = away_from(from, threat);
    }
    let mut best: Option<(f32, Point)> = None;
    for dir in Direction::DIAGONALS_FIRST {
        let to = from.step(dir);
        if to.distance_sq(threat) <= current || !step_allowed(terrain, occupancy, to) {
            continue;
        }
        let (ux, uy) = dir.unit();
        let alignment = ux * desired.0 + uy * desired.1;
        if best.map_or(true, |(b, _)| alignment > b) {
            best = Some((alignment, to));
        }
    }
    best.map(|(_, p)| p)
}

/// Blend an escape vector with the mean escape vector of fleeing neighbours.
pub fn flock_blend(own: (f32, f32), peers: &[(f32, f32)], strength: f32) -> (f32, f32) {
    if peers.is_empty() {
        return normalize(own);
    }
    let n = peers.len() as f32;
    let (sx, sy) = peers.iter().fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
    let avg = normalize((sx / n, sy / n));
    let s = strength.clamp(0.0, 1.0);
    let blended = normalize((own.0 * (1.0 - s) + avg.0 * s, own.1 * (1.0 - s) + avg.1 * s));
    if blended == (0.0, 0.0) {
        normalize(own)
    } else {
        blended
    }
}
