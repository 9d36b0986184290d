//! Geological formations and the per-cell rock field
//!
//! Formations (granite intrusions, limestone beds, clay deposits) are placed by
//! rejection sampling. Each one contributes `falloff(d / R) * elevation_effect`
//! to the cells around it; the strongest contributor decides the rock type.

use noise::{NoiseFn, Perlin};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{FormationSpec, GeologyConfig};
use crate::error::{Result, WorldError};
use crate::geometry::{Bounds, Point};
use crate::pipeline::{
    Artifact, Artifacts, GenerationInput, LayerSample, ModuleKind, TerrainModule,
};
use crate::rng::seeded_rng;
use crate::tilemap::Tilemap;

/// Placement attempts per formation centre before taking the best candidate.
const PLACEMENT_ATTEMPTS: usize = 30;
const WEATHERING_FREQUENCY: f64 = 0.035;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RockType {
    Hard,
    #[default]
    Soft,
    Clay,
}

impl RockType {
    /// Soil quality before weathering.
    pub fn base_soil_quality(self) -> f32 {
        match self {
            RockType::Hard => 0.2,
            RockType::Soft => 0.8,
            RockType::Clay => 0.6,
        }
    }

    pub fn erosion_resistance(self) -> f32 {
        match self {
            RockType::Hard => 0.9,
            RockType::Soft => 0.4,
            RockType::Clay => 0.6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RockType::Hard => "hard",
            RockType::Soft => "soft",
            RockType::Clay => "clay",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormationKind {
    GraniteIntrusion,
    LimestoneBed,
    ClayDeposit,
}

/// A placed formation.
#[derive(Clone, Debug, PartialEq)]
pub struct Formation {
    pub kind: FormationKind,
    pub center: Point,
    pub radius: f32,
    pub rock_type: RockType,
    pub elevation_effect: f32,
}

impl Formation {
    /// Signed contribution at `(x, y)`; zero outside the radius.
    pub fn weight_at(&self, x: i32, y: i32) -> f32 {
        if self.radius <= 0.0 {
            return 0.0;
        }
        let d = self.center.distance(Point::new(x, y));
        falloff(d / self.radius) * self.elevation_effect
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeologyCell {
    pub rock_type: RockType,
    /// 0.0-1.0
    pub soil_quality: f32,
    /// -1.0-1.0
    pub elevation_bias: f32,
    /// 0.0-1.0
    pub erosion_resistance: f32,
}

/// Output of the geology module.
#[derive(Clone, Debug, PartialEq)]
pub struct GeologyField {
    pub formations: Vec<Formation>,
    pub cells: Tilemap<GeologyCell>,
}

impl GeologyField {
    pub fn cell_at(&self, x: i32, y: i32) -> Option<&GeologyCell> {
        self.cells.get(x, y)
    }

    pub fn rock_type_at(&self, x: i32, y: i32) -> Option<RockType> {
        self.cells.get(x, y).map(|c| c.rock_type)
    }

    pub fn formation_count(&self, kind: FormationKind) -> usize {
        self.formations.iter().filter(|f| f.kind == kind).count()
    }

    /// Whether any cell within `radius` of `(x, y)` has the given rock type.
    pub fn has_rock_within(&self, x: i32, y: i32, radius: i32, rock: RockType) -> bool {
        let r2 = (radius * radius) as i64;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if (dx * dx + dy * dy) as i64 > r2 {
                    continue;
                }
                if self.rock_type_at(x + dx, y + dy) == Some(rock) {
                    return true;
                }
            }
        }
        false
    }
}

/// `smoothstep(1 - clamp(t, 0, 1))`: 1 at the centre, 0 at the rim.
pub fn falloff(t: f32) -> f32 {
    let s = 1.0 - t.clamp(0.0, 1.0);
    s * s * (3.0 - 2.0 * s)
}

#[derive(Clone, Debug)]
pub struct GeologyModule {
    params: GeologyConfig,
}

impl GeologyModule {
    pub fn new(params: GeologyConfig) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GeologyConfig {
        &self.params
    }

    /// Place every formation family inside `bounds`.
    pub fn place_formations(&self, bounds: Bounds, seed: u64) -> Vec<Formation> {
        let mut formations = Vec::new();
        for (idx, spec) in self.params.formations.iter().enumerate() {
            let mut rng = seeded_rng(seed, &format!("formation-{}", idx));
            let placed = place_family(spec, bounds, &mut rng);
            formations.extend(placed);
        }
        formations
    }

    pub fn build_field(&self, bounds: Bounds, seed: u64) -> GeologyField {
        let formations = self.place_formations(bounds, seed);
        let weathering = Perlin::new((seed & 0xFFFF_FFFF) as u32);
        let base_rock = self.params.base_rock_type;
        let weathering_effect = self.params.weathering_effect;

        let cells = Tilemap::from_fn(bounds, |x, y| {
            let mut bias = 0.0f32;
            let mut dominant: Option<(f32, RockType)> = None;
            for formation in &formations {
                let w = formation.weight_at(x, y);
                if w == 0.0 {
                    continue;
                }
                bias += w;
                if dominant.map_or(true, |(best, _)| w.abs() > best) {
                    dominant = Some((w.abs(), formation.rock_type));
                }
            }
            let rock_type = dominant.map(|(_, r)| r).unwrap_or(base_rock);

            // Weathering age in [0, 1]
            let age = weathering.get([x as f64 * WEATHERING_FREQUENCY, y as f64 * WEATHERING_FREQUENCY]);
            let age = ((age + 1.0) * 0.5) as f32;

            GeologyCell {
                rock_type,
                soil_quality: (rock_type.base_soil_quality() + (age - 0.5) * weathering_effect)
                    .clamp(0.0, 1.0),
                elevation_bias: bias.clamp(-1.0, 1.0),
                erosion_resistance: (rock_type.erosion_resistance() - (age - 0.5) * 0.2)
                    .clamp(0.0, 1.0),
            }
        });

        GeologyField { formations, cells }
    }
}

fn place_family<R: Rng>(spec: &FormationSpec, bounds: Bounds, rng: &mut R) -> Vec<Formation> {
    let mut placed: Vec<Formation> = Vec::with_capacity(spec.count as usize);
    let lo = spec.min_radius.min(spec.max_radius).max(1.0);
    let hi = spec.max_radius.max(spec.min_radius).max(lo);
    let spacing = lo;

    for _ in 0..spec.count {
        let mut best: Option<(f32, Point)> = None;
        for _ in 0..PLACEMENT_ATTEMPTS {
            let candidate = Point::new(
                rng.gen_range(bounds.min_x..=bounds.max_x),
                rng.gen_range(bounds.min_y..=bounds.max_y),
            );
            let clearance = placed
                .iter()
                .map(|f| f.center.distance(candidate))
                .fold(f32::MAX, f32::min);
            if best.map_or(true, |(c, _)| clearance > c) {
                best = Some((clearance, candidate));
            }
            if clearance >= spacing {
                break;
            }
        }
        // A crowded region still gets every formation: the most isolated candidate wins
        if let Some((_, center)) = best {
            placed.push(Formation {
                kind: spec.kind,
                center,
                radius: rng.gen_range(lo..=hi),
                rock_type: spec.rock_type,
                elevation_effect: spec.elevation_effect.clamp(-1.0, 1.0),
            });
        }
    }
    placed
}

impl TerrainModule for GeologyModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Geology
    }

    fn generate(&self, input: &GenerationInput<'_>) -> Result<Artifact> {
        if input.bounds.is_empty() {
            return Err(WorldError::EmptyRegion(input.bounds));
        }
        let field = self.build_field(input.bounds, input.seeds.geology);
        debug!(
            granite = field.formation_count(FormationKind::GraniteIntrusion),
            limestone = field.formation_count(FormationKind::LimestoneBed),
            clay = field.formation_count(FormationKind::ClayDeposit),
            "placed formations"
        );
        Ok(Artifact::Geology(field))
    }

    fn data_at(&self, artifacts: &Artifacts, x: i32, y: i32) -> Option<LayerSample> {
        let cell = artifacts.geology.as_ref()?.cell_at(x, y)?;
        Some(LayerSample {
            rock_type: Some(cell.rock_type),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Bounds {
        Bounds::centered(0, 0, 200)
    }

    #[test]
    fn test_falloff_shape() {
        assert!((falloff(0.0) - 1.0).abs() < 1e-6);
        assert_eq!(falloff(1.0), 0.0);
        assert_eq!(falloff(2.0), 0.0);
        assert!(falloff(0.25) > falloff(0.5));
        assert!(falloff(0.5) > falloff(0.75));
    }

    #[test]
    fn test_default_formation_counts() {
        let module = GeologyModule::new(GeologyConfig::default());
        let field = module.build_field(bounds(), 12345);
        assert!(field.formation_count(FormationKind::GraniteIntrusion) >= 2);
        assert!(field.formation_count(FormationKind::LimestoneBed) >= 3);
        for f in &field.formations {
            assert!(bounds().contains_point(f.center), "{:?} outside bounds", f.center);
        }
    }

    #[test]
    fn test_field_deterministic() {
        let module = GeologyModule::new(GeologyConfig::default());
        let a = module.build_field(bounds(), 77);
        let b = module.build_field(bounds(), 77);
        assert_eq!(a, b);
    }

    #[test]
    fn test_dominant_rock_at_formation_center() {
        let module = GeologyModule::new(GeologyConfig::default());
        let field = module.build_field(bounds(), 12345);
        let granite = field
            .formations
            .iter()
            .find(|f| f.kind == FormationKind::GraniteIntrusion)
            .unwrap();
        // Granite has the largest effect, so it dominates its own centre
        assert_eq!(
            field.rock_type_at(granite.center.x, granite.center.y),
            Some(RockType::Hard)
        );
    }

    #[test]
    fn test_cell_ranges() {
        let module = GeologyModule::new(GeologyConfig::default());
        let field = module.build_field(Bounds::centered(0, 0, 64), 9);
        for (p, cell) in field.cells.iter() {
            assert!((0.0..=1.0).contains(&cell.soil_quality), "soil at {:?}", p);
            assert!((-1.0..=1.0).contains(&cell.elevation_bias), "bias at {:?}", p);
            assert!((0.0..=1.0).contains(&cell.erosion_resistance), "resistance at {:?}", p);
        }
    }

    #[test]
    fn test_no_formations_gives_base_rock() {
        let module = GeologyModule::new(GeologyConfig {
            formations: Vec::new(),
            base_rock_type: RockType::Clay,
            weathering_effect: 0.0,
        });
        let field = module.build_field(Bounds::centered(0, 0, 16), 1);
        assert!(field.cells.iter().all(|(_, c)| c.rock_type == RockType::Clay));
        assert!(field.cells.iter().all(|(_, c)| (c.soil_quality - 0.6).abs() < 1e-6));
    }
}
