//! Forest patches and clearings
//!
//! Patches are discs below the treeline that avoid water; clearings are small
//! open discs cut out of existing patches. Individual trees are placed later
//! by the tree module inside these regions.

use rand::Rng;
use tracing::debug;

use crate::config::VegetationConfig;
use crate::elevation::ElevationField;
use crate::error::Result;
use crate::geometry::{Bounds, Point};
use crate::hydrology::HydrologyData;
use crate::pipeline::{
    Artifact, Artifacts, GenerationInput, LayerSample, LayerTag, ModuleKind, TerrainModule,
};
use crate::rng::seeded_rng;

const PATCH_ATTEMPTS: usize = 40;

#[derive(Clone, Debug, PartialEq)]
pub struct ForestPatch {
    pub center: Point,
    pub radius: f32,
    /// Fraction of candidate sites that become trees
    pub density: f32,
}

impl ForestPatch {
    pub fn contains(&self, p: Point) -> bool {
        self.center.distance(p) <= self.radius
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Clearing {
    pub center: Point,
    pub radius: f32,
}

impl Clearing {
    pub fn contains(&self, p: Point) -> bool {
        self.center.distance(p) <= self.radius
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VegetationData {
    pub patches: Vec<ForestPatch>,
    pub clearings: Vec<Clearing>,
}

impl VegetationData {
    pub fn in_clearing(&self, p: Point) -> bool {
        self.clearings.iter().any(|c| c.contains(p))
    }

    /// The patch covering `p`, unless a clearing opens it up.
    pub fn forest_at(&self, p: Point) -> Option<&ForestPatch> {
        if self.in_clearing(p) {
            return None;
        }
        self.patches.iter().find(|patch| patch.contains(p))
    }
}

#[derive(Clone, Debug)]
pub struct VegetationModule {
    params: VegetationConfig,
    patch_count: Option<u32>,
}

impl VegetationModule {
    pub fn new(params: VegetationConfig, patch_count: Option<u32>) -> Self {
        Self { params, patch_count }
    }

    pub fn build(
        &self,
        bounds: Bounds,
        elevation: Option<&ElevationField>,
        hydrology: Option<&HydrologyData>,
        seed: u64,
    ) -> VegetationData {
        let p = &self.params;
        let mut rng = seeded_rng(seed, "forest");
        let count = self.patch_count.unwrap_or_else(|| rng.gen_range(3..=5));

        let suitable = |c: Point| {
            let below_treeline = elevation
                .and_then(|e| e.height_at(c.x, c.y))
                .map_or(true, |h| h <= p.treeline);
            let dry = hydrology.map_or(true, |h| !h.is_water(c.x, c.y));
            below_treeline && dry
        };

        let r_lo = p.min_patch_radius.min(p.max_patch_radius).max(1.0);
        let r_hi = p.max_patch_radius.max(r_lo);
        let d_lo = p.min_density.min(p.max_density).clamp(0.0, 1.0);
        let d_hi = p.max_density.max(d_lo).clamp(d_lo, 1.0);

        let mut patches = Vec::with_capacity(count as usize);
        for _ in 0..count {
            for _ in 0..PATCH_ATTEMPTS {
                let center = Point::new(
                    rng.gen_range(bounds.min_x..=bounds.max_x),
                    rng.gen_range(bounds.min_y..=bounds.max_y),
                );
                if suitable(center) {
                    patches.push(ForestPatch {
                        center,
                        radius: rng.gen_range(r_lo..=r_hi),
                        density: rng.gen_range(d_lo..=d_hi),
                    });
                    break;
                }
            }
        }

        let mut clearings = Vec::new();
        if !patches.is_empty() {
            for _ in 0..p.clearing_count {
                let patch: &ForestPatch = &patches[rng.gen_range(0..patches.len())];
                let reach = (patch.radius * 0.5) as i32;
                let center = patch.center.offset(
                    rng.gen_range(-reach..=reach),
                    rng.gen_range(-reach..=reach),
                );
                clearings.push(Clearing {
                    center,
                    radius: p.clearing_radius.max(0.0),
                });
            }
        }

        VegetationData { patches, clearings }
    }
}

impl TerrainModule for VegetationModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Vegetation
    }

    fn generate(&self, input: &GenerationInput<'_>) -> Result<Artifact> {
        let data = self.build(
            input.bounds,
            input.artifacts.elevation.as_ref(),
            input.artifacts.hydrology.as_ref(),
            input.seeds.vegetation,
        );
        debug!(patches = data.patches.len(), clearings = data.clearings.len(), "vegetation ready");
        Ok(Artifact::Vegetation(data))
    }

    fn data_at(&self, artifacts: &Artifacts, x: i32, y: i32) -> Option<LayerSample> {
        let data = artifacts.vegetation.as_ref()?;
        let p = Point::new(x, y);
        let tag = if data.in_clearing(p) {
            LayerTag::Clearing
        } else if data.forest_at(p).is_some() {
            LayerTag::Forest
        } else {
            return None;
        };
        Some(LayerSample {
            tag: Some(tag),
            ..Default::default()
        })
    }
}
