use std::cmp::Ordering;
use std::collections::HashMap;

use rand::Rng;

use crate::config::HydrologyConfig;
use crate::elevation::ElevationField;
use crate::geology::{GeologyField, RockType};
use crate::geometry::{Bounds, Point};
use crate::rng::seeded_rng;

use super::{Lake, River};

/// Candidate grid stride in cells.
const LAKE_GRID_STRIDE: usize = 15;
const FLAT_GRADIENT: f32 = 0.05;
/// A river passing at a distance in this open range makes a site more likely.
const RIVER_NEAR: (f32, f32) = (5.0, 20.0);

/// Score a lake site; `None` when the cell is too high.
pub fn lake_score(
    params: &HydrologyConfig,
    elevation: &ElevationField,
    geology: &GeologyField,
    rivers: &[River],
    p: Point,
) -> Option<f32> {
    let e = elevation.height_at(p.x, p.y)?;
    if e > params.lake_low_elevation_max {
        return None;
    }
    let mut score = (params.lake_low_elevation_max - e) * 2.0;

    score += match geology.rock_type_at(p.x, p.y) {
        Some(RockType::Clay) => params.lake_clay_preference,
        Some(RockType::Hard) => -params.lake_hard_rock_avoidance,
        Some(RockType::Soft) => 0.2,
        None => 0.0,
    };

    if elevation.gradient_at(p.x, p.y) < FLAT_GRADIENT {
        score += 0.3;
    }

    let nearest_river = rivers
        .iter()
        .flat_map(|r| r.path.iter())
        .map(|q| q.distance(p))
        .fold(f32::MAX, f32::min);
    if nearest_river > RIVER_NEAR.0 && nearest_river < RIVER_NEAR.1 {
        score += 0.2;
    }
    Some(score)
}

/// Choose lake sites on a coarse grid, best first, with minimum spacing.
pub fn place_lakes(
    params: &HydrologyConfig,
    elevation: &ElevationField,
    geology: &GeologyField,
    rivers: &[River],
    seed: u64,
) -> Vec<Lake> {
    let bounds = elevation.bounds();
    let offset = (LAKE_GRID_STRIDE / 2) as i32;
    let mut candidates: Vec<(f32, Point)> = Vec::new();
    for y in (bounds.min_y + offset..=bounds.max_y).step_by(LAKE_GRID_STRIDE) {
        for x in (bounds.min_x + offset..=bounds.max_x).step_by(LAKE_GRID_STRIDE) {
            let p = Point::new(x, y);
            if let Some(score) = lake_score(params, elevation, geology, rivers, p) {
                candidates.push((score, p));
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut rng = seeded_rng(seed, "lakes");
    let lo = params.min_lake_radius.min(params.max_lake_radius).max(1.0);
    let hi = params.max_lake_radius.max(lo);
    let mut lakes: Vec<Lake> = Vec::new();
    for (_, p) in candidates {
        if lakes.len() >= params.lake_count as usize {
            break;
        }
        if lakes.iter().any(|l| l.center.distance(p) < params.lake_spacing) {
            continue;
        }
        lakes.push(Lake {
            center: p,
            radius: rng.gen_range(lo..=hi),
            elevation: elevation.height_at(p.x, p.y).unwrap_or_default(),
            rock_type: geology.rock_type_at(p.x, p.y).unwrap_or_default(),
        });
    }
    lakes
}

/// Map every lake cell to the lake whose centre is closest (lower index on ties).
pub fn assign_lake_owners(lakes: &[Lake], bounds: Bounds) -> HashMap<Point, usize> {
    let mut owners: HashMap<Point, (f32, usize)> = HashMap::new();
    for (idx, lake) in lakes.iter().enumerate() {
        let r = lake.radius.ceil() as i32;
        for dy in -r..=r {
            for dx in -r..=r {
                let p = lake.center.offset(dx, dy);
                if !bounds.contains_point(p) {
                    continue;
                }
                let d = lake.center.distance(p);
                if d > lake.radius {
                    continue;
                }
                owners
                    .entry(p)
                    .and_modify(|best| {
                        if d < best.0 {
                            *best = (d, idx);
                        }
                    })
                    .or_insert((d, idx));
            }
        }
    }
    owners.into_iter().map(|(p, (_, idx))| (p, idx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lake(x: i32, y: i32, radius: f32) -> Lake {
        Lake {
            center: Point::new(x, y),
            radius,
            elevation: 0.2,
            rock_type: RockType::Clay,
        }
    }

    #[test]
    fn test_overlapping_lakes_split_by_distance() {
        let lakes = vec![lake(0, 0, 5.0), lake(6, 0, 5.0)];
        let owners = assign_lake_owners(&lakes, Bounds::centered(0, 0, 40));
        assert_eq!(owners.get(&Point::new(2, 0)), Some(&0));
        assert_eq!(owners.get(&Point::new(4, 0)), Some(&1));
        // Equidistant goes to the earlier lake
        assert_eq!(owners.get(&Point::new(3, 0)), Some(&0));
        assert_eq!(owners.get(&Point::new(12, 0)), None);
    }

    #[test]
    fn test_owners_clipped_to_bounds() {
        let lakes = vec![lake(0, 0, 6.0)];
        let bounds = Bounds { min_x: 0, max_x: 10, min_y: 0, max_y: 10 };
        let owners = assign_lake_owners(&lakes, bounds);
        assert!(owners.keys().all(|p| bounds.contains_point(*p)));
        assert!(owners.contains_key(&Point::new(0, 0)));
    }
}
