//! Individual trees with 3x3 footprints
//!
//! Every tree owns exactly one trunk cell and up to eight canopy cells around
//! it. Trunks block movement and sight; canopy only blocks sight. A canopy
//! cell is never written over a trunk, and a tree is only kept when at least
//! one of its canopy cells is free.

use std::collections::HashMap;
use std::f32::consts::PI;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TreeConfig;
use crate::error::Result;
use crate::geometry::{Bounds, Point};
use crate::hydrology::HydrologyData;
use crate::pipeline::{
    Artifact, Artifacts, Feature, GenerationInput, LayerSample, ModuleKind, TerrainModule,
};
use crate::rng::seeded_rng;
use crate::vegetation::{ForestPatch, VegetationData};

const SCATTER_ATTEMPTS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    Trunk,
    Canopy,
}

/// What a single cell holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeFeature {
    pub kind: TreeKind,
    pub tree_id: u32,
    pub trunk_x: i32,
    pub trunk_y: i32,
}

impl TreeFeature {
    pub fn trunk(tree_id: u32, x: i32, y: i32) -> Self {
        Self { kind: TreeKind::Trunk, tree_id, trunk_x: x, trunk_y: y }
    }

    pub fn canopy(tree_id: u32, trunk_x: i32, trunk_y: i32) -> Self {
        Self { kind: TreeKind::Canopy, tree_id, trunk_x, trunk_y }
    }

    pub fn blocks_movement(&self) -> bool {
        self.kind == TreeKind::Trunk
    }

    pub fn blocks_sight(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    pub id: u32,
    pub trunk: Point,
    /// Index of the forest patch, `None` for scattered trees
    pub patch: Option<usize>,
}

/// Output of the tree module.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeField {
    pub trees: Vec<Tree>,
    features: HashMap<Point, TreeFeature>,
}

impl TreeField {
    pub fn feature_at(&self, x: i32, y: i32) -> Option<&TreeFeature> {
        self.features.get(&Point::new(x, y))
    }

    pub fn features(&self) -> impl Iterator<Item = (&Point, &TreeFeature)> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn canopy_count(&self, tree_id: u32) -> usize {
        self.features
            .values()
            .filter(|f| f.tree_id == tree_id && f.kind == TreeKind::Canopy)
            .count()
    }

    /// Write a single feature. A trunk is never replaced by a canopy cell.
    /// Returns whether the cell changed.
    pub fn insert_feature(&mut self, p: Point, feature: TreeFeature) -> bool {
        if let Some(existing) = self.features.get(&p) {
            if existing.kind == TreeKind::Trunk && feature.kind == TreeKind::Canopy {
                return false;
            }
        }
        self.features.insert(p, feature);
        true
    }

    /// Place a whole tree at `trunk`. Canopy claims free cells for which
    /// `open` holds. Nothing is written unless at least one canopy cell is free.
    pub fn try_place_tree<F>(&mut self, trunk: Point, patch: Option<usize>, open: F) -> Option<u32>
    where
        F: Fn(Point) -> bool,
    {
        if self.features.contains_key(&trunk) || !open(trunk) {
            return None;
        }
        let canopy: Vec<Point> = (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(|(dx, dy)| trunk.offset(dx, dy))
            .filter(|c| !self.features.contains_key(c) && open(*c))
            .collect();
        if canopy.is_empty() {
            return None;
        }

        let id = self.trees.len() as u32;
        self.features.insert(trunk, TreeFeature::trunk(id, trunk.x, trunk.y));
        for c in canopy {
            self.features.insert(c, TreeFeature::canopy(id, trunk.x, trunk.y));
        }
        self.trees.push(Tree { id, trunk, patch });
        Some(id)
    }
}

#[derive(Clone, Debug)]
pub struct TreeModule {
    params: TreeConfig,
}

impl TreeModule {
    pub fn new(params: TreeConfig) -> Self {
        Self { params }
    }

    pub fn build(
        &self,
        bounds: Bounds,
        vegetation: &VegetationData,
        hydrology: Option<&HydrologyData>,
        seed: u64,
    ) -> TreeField {
        let p = &self.params;
        let spacing = p.min_tree_spacing.max(1.0);
        let max_trees = p.max_trees as usize;
        let mut rng = seeded_rng(seed, "trees");
        let mut field = TreeField::default();

        let open = |c: Point| {
            bounds.contains_point(c) && hydrology.map_or(true, |h| !h.is_water(c.x, c.y))
        };

        for (idx, patch) in vegetation.patches.iter().enumerate() {
            let target = ((PI * patch.radius * patch.radius * patch.density) / (spacing * spacing))
                .round() as usize;
            let mut placed = 0;
            for _ in 0..target.saturating_mul(4) {
                if placed >= target || field.len() >= max_trees {
                    break;
                }
                let c = sample_in_patch(patch, &mut rng);
                if vegetation.in_clearing(c) || !spaced(&field, c, spacing) {
                    continue;
                }
                if field.try_place_tree(c, Some(idx), &open).is_some() {
                    placed += 1;
                }
            }
        }

        let scattered = p.scattered_tree_count.unwrap_or_else(|| rng.gen_range(8..=15));
        for _ in 0..scattered {
            if field.len() >= max_trees {
                break;
            }
            for _ in 0..SCATTER_ATTEMPTS {
                let c = Point::new(
                    rng.gen_range(bounds.min_x..=bounds.max_x),
                    rng.gen_range(bounds.min_y..=bounds.max_y),
                );
                if vegetation.in_clearing(c) || !spaced(&field, c, spacing) {
                    continue;
                }
                if field.try_place_tree(c, None, &open).is_some() {
                    break;
                }
            }
        }

        debug_assert!(
            field.trees.iter().all(|t| field.canopy_count(t.id) >= 1),
            "tree without canopy"
        );
        field
    }
}

fn sample_in_patch(patch: &ForestPatch, rng: &mut ChaCha8Rng) -> Point {
    let angle = rng.gen_range(0.0..(2.0 * PI));
    let r = patch.radius * rng.gen::<f32>().sqrt();
    patch
        .center
        .offset((r * angle.cos()).round() as i32, (r * angle.sin()).round() as i32)
}

fn spaced(field: &TreeField, c: Point, spacing: f32) -> bool {
    field.trees.iter().all(|t| t.trunk.distance(c) >= spacing)
}

impl TerrainModule for TreeModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Trees
    }

    fn generate(&self, input: &GenerationInput<'_>) -> Result<Artifact> {
        let empty = VegetationData::default();
        let vegetation = input.artifacts.vegetation.as_ref().unwrap_or(&empty);
        let field = self.build(
            input.bounds,
            vegetation,
            input.artifacts.hydrology.as_ref(),
            input.seeds.trees,
        );
        debug!(trees = field.len(), "trees ready");
        Ok(Artifact::Trees(field))
    }

    fn data_at(&self, artifacts: &Artifacts, x: i32, y: i32) -> Option<LayerSample> {
        let feature = *artifacts.trees.as_ref()?.feature_at(x, y)?;
        Some(LayerSample {
            features: vec![Feature::Tree(feature)],
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VegetationConfig;
    use crate::vegetation::VegetationModule;

    fn forest(seed: u64) -> (Bounds, VegetationData) {
        let bounds = Bounds::centered(0, 0, 120);
        let veg = VegetationModule::new(VegetationConfig::default(), None).build(bounds, None, None, seed);
        (bounds, veg)
    }

    #[test]
    fn test_each_tree_has_one_trunk_and_canopy() {
        let (bounds, veg) = forest(3);
        let field = TreeModule::new(TreeConfig::default()).build(bounds, &veg, None, 3);
        assert!(!field.is_empty());
        for tree in &field.trees {
            let trunks = field
                .features()
                .filter(|(_, f)| f.tree_id == tree.id && f.kind == TreeKind::Trunk)
                .count();
            assert_eq!(trunks, 1, "tree {} trunk count", tree.id);
            assert!(field.canopy_count(tree.id) >= 1, "tree {} has no canopy", tree.id);
            for (p, f) in field.features().filter(|(_, f)| f.tree_id == tree.id) {
                assert!(p.chebyshev(tree.trunk) <= 1, "cell {:?} outside 3x3", p);
                assert_eq!((f.trunk_x, f.trunk_y), (tree.trunk.x, tree.trunk.y));
            }
        }
    }

    #[test]
    fn test_trunk_spacing() {
        let (bounds, veg) = forest(8);
        let params = TreeConfig::default();
        let field = TreeModule::new(params.clone()).build(bounds, &veg, None, 8);
        for (i, a) in field.trees.iter().enumerate() {
            for b in &field.trees[i + 1..] {
                assert!(a.trunk.distance(b.trunk) >= params.min_tree_spacing);
            }
        }
        assert!(field.len() <= params.max_trees as usize);
    }

    #[test]
    fn test_trunk_dominates_canopy() {
        let mut field = TreeField::default();
        let p = Point::new(4, 4);
        assert!(field.insert_feature(p, TreeFeature::trunk(0, 4, 4)));
        assert!(!field.insert_feature(p, TreeFeature::canopy(1, 5, 5)));
        assert_eq!(field.feature_at(4, 4).map(|f| f.kind), Some(TreeKind::Trunk));
    }

    #[test]
    fn test_tree_rejected_without_free_canopy() {
        let mut field = TreeField::default();
        let trunk = Point::new(0, 0);
        // Only the trunk cell is open
        assert_eq!(field.try_place_tree(trunk, None, |c| c == trunk), None);
        assert!(field.is_empty());
        assert!(field.feature_at(0, 0).is_none());
    }

    #[test]
    fn test_scattered_count_and_cap() {
        let bounds = Bounds::centered(0, 0, 100);
        let veg = VegetationData::default();
        let params = TreeConfig {
            max_trees: 5,
            scattered_tree_count: Some(12),
            ..Default::default()
        };
        let field = TreeModule::new(params).build(bounds, &veg, None, 2);
        assert_eq!(field.len(), 5);
    }
}
