use std::cmp::Ordering;

use rand::Rng;

use crate::config::HydrologyConfig;
use crate::elevation::ElevationField;
use crate::geology::{GeologyField, RockType};
use crate::geometry::Point;
use crate::rng::seeded_rng;

use super::Spring;

/// Scored candidates wanted per requested spring.
const CANDIDATE_FACTOR: u32 = 10;
/// Gives up on regions with almost no high ground.
const MAX_DRAWS_PER_CANDIDATE: usize = 50;
const CONTACT_RADIUS: i32 = 5;
const SPRING_ELEVATION_CAP: f32 = 0.8;
/// Largest possible raw score; used to keep flow in (0, 1].
const MAX_SCORE: f32 = 1.6;

/// Raw spring score: elevation reward, rock contact bonus and drainage bonus.
pub fn spring_score(
    params: &HydrologyConfig,
    elevation: &ElevationField,
    geology: &GeologyField,
    p: Point,
) -> Option<f32> {
    let e = elevation.height_at(p.x, p.y)?;
    if e < params.spring_elevation_min {
        return None;
    }

    let span = (SPRING_ELEVATION_CAP - params.spring_elevation_min).max(f32::EPSILON);
    let mut score = ((e - params.spring_elevation_min) / span).clamp(0.0, 1.0);

    let hard = geology.has_rock_within(p.x, p.y, CONTACT_RADIUS, RockType::Hard);
    let soft = geology.has_rock_within(p.x, p.y, CONTACT_RADIUS, RockType::Soft);
    if hard && soft {
        score += 0.4;
    } else if hard {
        score += 0.2;
    }

    let gradient = elevation.gradient_at(p.x, p.y);
    if gradient > 0.02 && gradient < 0.15 {
        score += 0.2;
    }
    Some(score)
}

/// Sample until `10 x spring_count` candidates score, then keep the best ones
/// with minimum spacing.
pub fn select_springs(
    params: &HydrologyConfig,
    elevation: &ElevationField,
    geology: &GeologyField,
    seed: u64,
) -> Vec<Spring> {
    let bounds = elevation.bounds();
    let mut rng = seeded_rng(seed, "springs");
    let wanted = params.spring_count.saturating_mul(CANDIDATE_FACTOR) as usize;
    let max_draws = wanted.saturating_mul(MAX_DRAWS_PER_CANDIDATE);

    // Keep drawing until enough cells clear the elevation floor
    let mut candidates: Vec<(f32, Point)> = Vec::with_capacity(wanted);
    let mut draws = 0;
    while candidates.len() < wanted && draws < max_draws {
        draws += 1;
        let p = Point::new(
            rng.gen_range(bounds.min_x..=bounds.max_x),
            rng.gen_range(bounds.min_y..=bounds.max_y),
        );
        if let Some(score) = spring_score(params, elevation, geology, p) {
            candidates.push((score, p));
        }
    }
    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut springs: Vec<Spring> = Vec::new();
    for (score, p) in candidates {
        if springs.len() >= params.spring_count as usize {
            break;
        }
        if springs
            .iter()
            .any(|s| s.position.distance(p) < params.spring_spacing)
        {
            continue;
        }
        springs.push(Spring {
            position: p,
            flow: 0.5 + 0.5 * (score / MAX_SCORE).clamp(0.0, 1.0),
            elevation: elevation.height_at(p.x, p.y).unwrap_or_default(),
            rock_type: geology.rock_type_at(p.x, p.y).unwrap_or_default(),
        });
    }
    springs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ElevationConfig, GeologyConfig};
    use crate::elevation::ElevationModule;
    use crate::geology::GeologyModule;
    use crate::geometry::Bounds;

    fn fields() -> (ElevationField, GeologyField) {
        let bounds = Bounds::centered(0, 0, 200);
        let geology = GeologyModule::new(GeologyConfig::default()).build_field(bounds, 12345);
        let elevation = ElevationModule::new(ElevationConfig::default()).from_geology(&geology, 12345);
        (elevation, geology)
    }

    #[test]
    fn test_springs_respect_spacing_and_elevation() {
        let (elevation, geology) = fields();
        let params = HydrologyConfig::default();
        let springs = select_springs(&params, &elevation, &geology, 11);
        assert!(springs.len() <= params.spring_count as usize);
        for (i, a) in springs.iter().enumerate() {
            assert!(a.elevation >= params.spring_elevation_min);
            assert!(a.flow > 0.0 && a.flow <= 1.0, "flow {} out of range", a.flow);
            for b in &springs[i + 1..] {
                assert!(a.position.distance(b.position) >= params.spring_spacing);
            }
        }
    }

    #[test]
    fn test_candidate_pool_fills_requested_springs() {
        let (elevation, geology) = fields();
        let params = HydrologyConfig {
            spring_count: 3,
            spring_spacing: 10.0,
            ..Default::default()
        };
        let springs = select_springs(&params, &elevation, &geology, 12345);
        assert_eq!(springs.len(), 3, "only {} springs placed", springs.len());
    }

    #[test]
    fn test_low_cells_score_nothing() {
        let (elevation, geology) = fields();
        let params = HydrologyConfig {
            spring_elevation_min: 2.0,
            ..Default::default()
        };
        assert!(select_springs(&params, &elevation, &geology, 1).is_empty());
    }
}
