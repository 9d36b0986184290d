//! Elevation field derived from geology
//!
//! `base + strength * bias - (1 - resistance) * erosion * k + noise`, clamped
//! and smoothed with a 5-tap box filter. Without geology the module falls back
//! to a handful of radial hills so downstream layers still have terrain.

use noise::{NoiseFn, Perlin};
use rand::Rng;
use tracing::{debug, warn};

use crate::config::ElevationConfig;
use crate::error::{Result, WorldError};
use crate::geology::{falloff, GeologyField};
use crate::geometry::{Bounds, Point};
use crate::pipeline::{
    Artifact, Artifacts, GenerationInput, LayerSample, ModuleKind, TerrainModule,
};
use crate::rng::seeded_rng;
use crate::tilemap::Tilemap;

/// Lowest elevation any cell may take.
pub const MIN_ELEVATION: f32 = 0.05;

const DETAIL_FREQUENCY: f64 = 0.08;
const EROSION_FREQUENCY: f64 = 0.045;

/// How the field was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElevationMode {
    Geological,
    Hills,
}

/// Output of the elevation module: a dense field in `[0.05, max_elevation]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ElevationField {
    pub heights: Tilemap<f32>,
    pub mode: ElevationMode,
}

impl ElevationField {
    pub fn height_at(&self, x: i32, y: i32) -> Option<f32> {
        self.heights.get(x, y).copied()
    }

    pub fn gradient_at(&self, x: i32, y: i32) -> f32 {
        self.heights.gradient_at(x, y)
    }

    pub fn bounds(&self) -> Bounds {
        self.heights.bounds
    }
}

#[derive(Clone, Debug)]
pub struct ElevationModule {
    params: ElevationConfig,
}

impl ElevationModule {
    pub fn new(params: ElevationConfig) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ElevationConfig {
        &self.params
    }

    /// Elevation from formation bias and erosion resistance.
    pub fn from_geology(&self, geology: &GeologyField, seed: u64) -> ElevationField {
        let p = &self.params;
        let detail = Perlin::new(seed as u32);
        let erosion = Perlin::new((seed >> 32) as u32 ^ 0x5EED);
        let max = p.max_elevation.max(MIN_ELEVATION);
        let bounds = geology.cells.bounds;

        let raw = Tilemap::from_fn(bounds, |x, y| {
            let Some(cell) = geology.cell_at(x, y) else {
                return p.base_elevation.clamp(MIN_ELEVATION, max);
            };
            let (fx, fy) = (x as f64, y as f64);
            let k = ((erosion.get([fx * EROSION_FREQUENCY, fy * EROSION_FREQUENCY]) + 1.0) * 0.5)
                .clamp(0.0, 1.0) as f32;
            let n = detail.get([fx * DETAIL_FREQUENCY, fy * DETAIL_FREQUENCY]) as f32;

            let e = p.base_elevation + p.geological_strength * cell.elevation_bias
                - (1.0 - cell.erosion_resistance) * p.erosion_strength * k
                + n * p.noise_amount;
            e.clamp(MIN_ELEVATION, max)
        });

        ElevationField {
            heights: smooth(raw, p.smoothing_passes, max),
            mode: ElevationMode::Geological,
        }
    }

    /// Radial hills sampled from the seed.
    pub fn from_hills(&self, bounds: Bounds, seed: u64) -> ElevationField {
        let p = &self.params;
        let mut rng = seeded_rng(seed, "hills");
        let span = bounds.width().max(bounds.height()) as f32;
        let hills: Vec<(Point, f32, f32)> = (0..p.fallback_hill_count)
            .map(|_| {
                let center = Point::new(
                    rng.gen_range(bounds.min_x..=bounds.max_x),
                    rng.gen_range(bounds.min_y..=bounds.max_y),
                );
                let radius = rng.gen_range(0.08..=0.25) * span + 1.0;
                let height = rng.gen_range(0.2..=0.5);
                (center, radius, height)
            })
            .collect();

        let detail = Perlin::new(seed as u32);
        let max = p.max_elevation.max(MIN_ELEVATION);
        let raw = Tilemap::from_fn(bounds, |x, y| {
            let here = Point::new(x, y);
            let lift: f32 = hills
                .iter()
                .map(|(c, r, h)| h * falloff(c.distance(here) / r))
                .sum();
            let n = detail.get([x as f64 * DETAIL_FREQUENCY, y as f64 * DETAIL_FREQUENCY]) as f32;
            (p.base_elevation * 0.6 + lift + n * p.noise_amount).clamp(MIN_ELEVATION, max)
        });

        ElevationField {
            heights: smooth(raw, p.smoothing_passes, max),
            mode: ElevationMode::Hills,
        }
    }
}

fn smooth(mut map: Tilemap<f32>, passes: u32, max: f32) -> Tilemap<f32> {
    for _ in 0..passes {
        map = map.box_blur5();
    }
    // Averaging keeps values in range; clamp guards float drift at the edges
    Tilemap::from_fn(map.bounds, |x, y| {
        map.get(x, y).copied().unwrap_or(MIN_ELEVATION).clamp(MIN_ELEVATION, max)
    })
}

impl TerrainModule for ElevationModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Elevation
    }

    fn generate(&self, input: &GenerationInput<'_>) -> Result<Artifact> {
        if input.bounds.is_empty() {
            return Err(WorldError::EmptyRegion(input.bounds));
        }
        let field = match (&input.artifacts.geology, self.params.use_geology) {
            (Some(geology), true) => self.from_geology(geology, input.seeds.elevation),
            (None, true) => {
                warn!("geology artifact missing; elevation falls back to radial hills");
                self.from_hills(input.bounds, input.seeds.elevation)
            }
            (_, false) => self.from_hills(input.bounds, input.seeds.elevation),
        };
        let (lo, hi) = field.heights.min_max();
        debug!(mode = ?field.mode, min = lo, max = hi, "elevation field ready");
        Ok(Artifact::Elevation(field))
    }

    fn data_at(&self, artifacts: &Artifacts, x: i32, y: i32) -> Option<LayerSample> {
        let height = artifacts.elevation.as_ref()?.height_at(x, y)?;
        Some(LayerSample {
            elevation: Some(height),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeologyConfig;
    use crate::geology::GeologyModule;

    fn geology(bounds: Bounds) -> GeologyField {
        GeologyModule::new(GeologyConfig::default()).build_field(bounds, 12345)
    }

    #[test]
    fn test_range_respected() {
        let bounds = Bounds::centered(0, 0, 120);
        let module = ElevationModule::new(ElevationConfig::default());
        let field = module.from_geology(&geology(bounds), 1);
        let (lo, hi) = field.heights.min_max();
        assert!(lo >= MIN_ELEVATION, "min {} below floor", lo);
        assert!(hi <= 0.95, "max {} above ceiling", hi);
        assert_eq!(field.mode, ElevationMode::Geological);
    }

    #[test]
    fn test_granite_stands_higher_than_clay() {
        let bounds = Bounds::centered(0, 0, 200);
        let geo = geology(bounds);
        let field = ElevationModule::new(ElevationConfig::default()).from_geology(&geo, 5);
        let mean_for = |rock| {
            let values: Vec<f32> = geo
                .cells
                .iter()
                .filter(|(_, c)| c.rock_type == rock)
                .filter_map(|(p, _)| field.height_at(p.x, p.y))
                .collect();
            values.iter().sum::<f32>() / values.len().max(1) as f32
        };
        let hard = mean_for(crate::geology::RockType::Hard);
        let clay = mean_for(crate::geology::RockType::Clay);
        assert!(hard > clay, "hard {} should exceed clay {}", hard, clay);
    }

    #[test]
    fn test_deterministic() {
        let bounds = Bounds::centered(0, 0, 64);
        let geo = geology(bounds);
        let module = ElevationModule::new(ElevationConfig::default());
        assert_eq!(module.from_geology(&geo, 3), module.from_geology(&geo, 3));
        assert_eq!(module.from_hills(bounds, 3), module.from_hills(bounds, 3));
    }

    #[test]
    fn test_fallback_without_geology() {
        let bounds = Bounds::centered(0, 0, 64);
        let artifacts = Artifacts::default();
        let input = GenerationInput {
            bounds,
            seeds: crate::rng::WorldSeeds::from_master(1),
            artifacts: &artifacts,
        };
        let module = ElevationModule::new(ElevationConfig::default());
        let Artifact::Elevation(field) = module.generate(&input).unwrap() else {
            panic!("wrong artifact kind");
        };
        assert_eq!(field.mode, ElevationMode::Hills);
        assert_eq!(field.heights.width, 64);
    }
}
