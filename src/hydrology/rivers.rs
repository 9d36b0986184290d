use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::HydrologyConfig;
use crate::elevation::ElevationField;
use crate::geology::{GeologyField, RockType};
use crate::geometry::{Direction, Point};
use crate::rng::{rand_at, tag_salt};
use crate::tilemap::Tilemap;

use super::{Confluence, Lake, River, Spring, Termination};

/// Rivers end once they come this close to a lake centre.
pub const LAKE_CAPTURE_DISTANCE: f32 = 6.0;

const UPHILL_PENALTY: f32 = -2.0;
const DROP_WEIGHT: f32 = 10.0;
/// Assumed drop when a step leaves the region.
const OFF_MAP_DROP: f32 = 0.02;
const TOP_CHOICES: usize = 3;

/// Score of stepping from `from` to `to` over `distance` cells onto `rock`.
pub fn direction_score(
    params: &HydrologyConfig,
    from: f32,
    to: f32,
    rock: Option<RockType>,
    distance: f32,
) -> f32 {
    let drop = from - to;
    let mut score = if drop < 0.0 { UPHILL_PENALTY } else { drop * DROP_WEIGHT };

    score += match rock {
        Some(RockType::Soft) => params.soft_rock_preference,
        Some(RockType::Clay) => params.clay_channeling,
        Some(RockType::Hard) => -params.hard_rock_avoidance,
        None => 0.0,
    };

    let gradient = drop / distance.max(1.0);
    if gradient > 0.01 && gradient < 0.2 {
        score += 0.3;
    } else if gradient > 0.3 {
        score -= 0.5;
    }
    score
}

/// Walk downhill from `spring` over the depression-filled surface `filled`.
/// `occupied` holds cells of earlier rivers.
///
/// Every step lowers the filled level, so the walk cannot loop. Candidates with
/// a non-negative [`direction_score`] are preferred; when none qualifies the
/// river takes the steepest filled descent instead of stalling in a pit.
pub fn trace_river(
    params: &HydrologyConfig,
    elevation: &ElevationField,
    geology: &GeologyField,
    filled: &Tilemap<f32>,
    spring: &Spring,
    index: usize,
    occupied: &HashSet<Point>,
    seed: u64,
) -> River {
    let bounds = elevation.bounds();
    let step = params.river_step_size.max(1) as i32;
    let budget = (params.max_river_length / step as u32).max(1);
    let salt = tag_salt("river-step") ^ index as u64;

    let mut path = vec![spring.position];
    let mut visited: HashSet<Point> = path.iter().copied().collect();
    let mut current = spring.position;
    let mut termination = Termination::Exhausted;

    if occupied.contains(&current) {
        termination = Termination::River;
    } else {
        for _ in 0..budget {
            let Some(&level) = filled.get(current.x, current.y) else {
                termination = Termination::Boundary;
                break;
            };

            // Long strides can jump over the only way out; single cells never do
            let mut options = descents(params, geology, filled, current, level, step, &visited);
            if options.is_empty() && step > 1 {
                options = descents(params, geology, filled, current, level, 1, &visited);
            }
            if options.is_empty() {
                termination = Termination::Stalled;
                break;
            }

            let next = if options.iter().any(|o| o.score >= 0.0) {
                options.retain(|o| o.score >= 0.0);
                // Stable sort keeps compass order between equal scores
                options.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
                let choices = options.len().min(TOP_CHOICES);
                let roll = rand_at(seed, salt, current.x, current.y);
                options[((roll * choices as f64) as usize).min(choices - 1)].target
            } else {
                options
                    .iter()
                    .min_by(|a, b| a.level.partial_cmp(&b.level).unwrap_or(Ordering::Equal))
                    .map(|o| o.target)
                    .unwrap_or(current)
            };

            if !bounds.contains_point(next) {
                termination = Termination::Boundary;
                break;
            }
            if occupied.contains(&next) {
                termination = Termination::River;
                break;
            }

            path.push(next);
            visited.insert(next);
            current = next;

            if elevation
                .height_at(next.x, next.y)
                .map_or(false, |e| e <= params.sea_level)
            {
                termination = Termination::Sea;
                break;
            }
        }
    }

    River {
        id: index,
        spring: spring.clone(),
        path,
        flow: spring.flow,
        confluences: Vec::new(),
        termination,
    }
}

struct Descent {
    target: Point,
    level: f32,
    score: f32,
}

/// Unvisited cells `stride` away whose filled level is below `level`.
fn descents(
    params: &HydrologyConfig,
    geology: &GeologyField,
    filled: &Tilemap<f32>,
    from: Point,
    level: f32,
    stride: i32,
    visited: &HashSet<Point>,
) -> Vec<Descent> {
    let mut out = Vec::with_capacity(8);
    for dir in Direction::ALL {
        let (dx, dy) = dir.delta();
        let target = from.offset(dx * stride, dy * stride);
        if visited.contains(&target) {
            continue;
        }
        let (to, rock) = match filled.get(target.x, target.y) {
            Some(&to) => (to, geology.rock_type_at(target.x, target.y)),
            None => (level - OFF_MAP_DROP, None),
        };
        if to >= level {
            continue;
        }
        let distance = stride as f32 * if dir.is_diagonal() { std::f32::consts::SQRT_2 } else { 1.0 };
        out.push(Descent {
            target,
            level: to,
            score: direction_score(params, level, to, rock, distance),
        });
    }
    out
}

/// Cut each river at the first point captured by a lake.
pub fn truncate_at_lakes(rivers: &mut [River], lakes: &[Lake]) {
    for river in rivers.iter_mut() {
        let captured = river.path.iter().position(|p| {
            lakes
                .iter()
                .any(|lake| lake.center.distance(*p) <= LAKE_CAPTURE_DISTANCE.max(lake.radius))
        });
        if let Some(i) = captured {
            river.path.truncate(i + 1);
            river.termination = Termination::Lake;
        }
    }
}

/// Record a confluence for every pair of rivers whose paths come within
/// `distance`. The point is the midpoint of the closest pair of path points.
pub fn find_confluences(rivers: &mut [River], distance: f32) {
    let max_sq = distance * distance;
    let mut found: Vec<(usize, usize, Point)> = Vec::new();

    for i in 0..rivers.len() {
        for j in (i + 1)..rivers.len() {
            let mut best: Option<(i64, Point, Point)> = None;
            for &a in &rivers[i].path {
                for &b in &rivers[j].path {
                    let d = a.distance_sq(b);
                    if d as f32 <= max_sq && best.map_or(true, |(bd, _, _)| d < bd) {
                        best = Some((d, a, b));
                    }
                }
            }
            if let Some((_, a, b)) = best {
                let mid = Point::new((a.x + b.x).div_euclid(2), (a.y + b.y).div_euclid(2));
                found.push((i, j, mid));
            }
        }
    }

    for (i, j, point) in found {
        let (id_i, id_j) = (rivers[i].id, rivers[j].id);
        rivers[i].confluences.push(Confluence { other_id: id_j, point });
        rivers[j].confluences.push(Confluence { other_id: id_i, point });
    }
}
