//! Dependency-ordered generation pipeline.
//!
//! Each terrain module declares what it reads; [`WorldContext`] sorts modules
//! topologically (ties broken by priority), runs them, and stores the
//! immutable artifacts they produce.

mod context;
mod layer;

pub use context::WorldContext;
pub use layer::TerrainLayer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::elevation::ElevationField;
use crate::error::{Result, WorldError};
use crate::geology::{GeologyField, RockType};
use crate::geometry::Bounds;
use crate::hydrology::HydrologyData;
use crate::rng::WorldSeeds;
use crate::trees::{TreeFeature, TreeField};
use crate::vegetation::VegetationData;

/// The fixed set of generation modules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleKind {
    Geology,
    Elevation,
    Hydrology,
    Vegetation,
    Trees,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 5] = [
        ModuleKind::Geology,
        ModuleKind::Elevation,
        ModuleKind::Hydrology,
        ModuleKind::Vegetation,
        ModuleKind::Trees,
    ];

    /// Higher runs first among modules with no ordering constraint between them.
    pub fn priority(self) -> i32 {
        match self {
            ModuleKind::Geology => 100,
            ModuleKind::Elevation => 90,
            ModuleKind::Hydrology => 80,
            ModuleKind::Vegetation => 70,
            ModuleKind::Trees => 60,
        }
    }

    /// Predecessors that must be registered before this module.
    pub fn dependencies(self) -> &'static [ModuleKind] {
        match self {
            ModuleKind::Geology | ModuleKind::Elevation | ModuleKind::Hydrology => &[],
            ModuleKind::Vegetation => &[ModuleKind::Elevation],
            ModuleKind::Trees => &[ModuleKind::Vegetation],
        }
    }

    /// Predecessors read when present. They constrain ordering but the module
    /// has a fallback when they are absent.
    pub fn optional_dependencies(self) -> &'static [ModuleKind] {
        match self {
            ModuleKind::Geology => &[],
            ModuleKind::Elevation => &[ModuleKind::Geology],
            ModuleKind::Hydrology => &[ModuleKind::Geology, ModuleKind::Elevation],
            ModuleKind::Vegetation => &[ModuleKind::Hydrology],
            ModuleKind::Trees => &[ModuleKind::Elevation, ModuleKind::Hydrology],
        }
    }

    /// Every module this one must run after.
    pub fn reads(self) -> impl Iterator<Item = ModuleKind> {
        self.dependencies()
            .iter()
            .chain(self.optional_dependencies())
            .copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::Geology => "geology",
            ModuleKind::Elevation => "elevation",
            ModuleKind::Hydrology => "hydrology",
            ModuleKind::Vegetation => "vegetation",
            ModuleKind::Trees => "trees",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        ModuleKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| WorldError::UnknownModuleName(name.to_string()))
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only inputs handed to a module's `generate`.
pub struct GenerationInput<'a> {
    pub bounds: Bounds,
    pub seeds: WorldSeeds,
    pub artifacts: &'a Artifacts,
}

/// The output of one module run.
#[derive(Clone, Debug)]
pub enum Artifact {
    Geology(GeologyField),
    Elevation(ElevationField),
    Hydrology(HydrologyData),
    Vegetation(VegetationData),
    Trees(TreeField),
}

impl Artifact {
    pub fn kind(&self) -> ModuleKind {
        match self {
            Artifact::Geology(_) => ModuleKind::Geology,
            Artifact::Elevation(_) => ModuleKind::Elevation,
            Artifact::Hydrology(_) => ModuleKind::Hydrology,
            Artifact::Vegetation(_) => ModuleKind::Vegetation,
            Artifact::Trees(_) => ModuleKind::Trees,
        }
    }
}

/// Artifacts produced so far. A module only ever sees its predecessors' slots.
#[derive(Clone, Debug, Default)]
pub struct Artifacts {
    pub geology: Option<GeologyField>,
    pub elevation: Option<ElevationField>,
    pub hydrology: Option<HydrologyData>,
    pub vegetation: Option<VegetationData>,
    pub trees: Option<TreeField>,
}

impl Artifacts {
    pub fn store(&mut self, artifact: Artifact) {
        match artifact {
            Artifact::Geology(a) => self.geology = Some(a),
            Artifact::Elevation(a) => self.elevation = Some(a),
            Artifact::Hydrology(a) => self.hydrology = Some(a),
            Artifact::Vegetation(a) => self.vegetation = Some(a),
            Artifact::Trees(a) => self.trees = Some(a),
        }
    }

    pub fn clear(&mut self, kind: ModuleKind) {
        match kind {
            ModuleKind::Geology => self.geology = None,
            ModuleKind::Elevation => self.elevation = None,
            ModuleKind::Hydrology => self.hydrology = None,
            ModuleKind::Vegetation => self.vegetation = None,
            ModuleKind::Trees => self.trees = None,
        }
    }

    pub fn has(&self, kind: ModuleKind) -> bool {
        match kind {
            ModuleKind::Geology => self.geology.is_some(),
            ModuleKind::Elevation => self.elevation.is_some(),
            ModuleKind::Hydrology => self.hydrology.is_some(),
            ModuleKind::Vegetation => self.vegetation.is_some(),
            ModuleKind::Trees => self.trees.is_some(),
        }
    }
}

/// Terrain tag contributed by a layer before classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerTag {
    River,
    Lake,
    Forest,
    Clearing,
}

/// Point features a layer reports at a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Feature {
    Tree(TreeFeature),
    Spring,
}

/// Per-module answer to "what is at (x, y)".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerSample {
    pub tag: Option<LayerTag>,
    pub elevation: Option<f32>,
    pub rock_type: Option<RockType>,
    pub features: Vec<Feature>,
}

impl LayerSample {
    /// Overlay `other` on top of `self`: its scalar values win, features accumulate.
    pub fn overlay(&mut self, other: LayerSample) {
        if other.tag.is_some() {
            self.tag = other.tag;
        }
        if other.elevation.is_some() {
            self.elevation = other.elevation;
        }
        if other.rock_type.is_some() {
            self.rock_type = other.rock_type;
        }
        self.features.extend(other.features);
    }
}

/// Capability shared by every terrain module.
pub trait TerrainModule {
    fn kind(&self) -> ModuleKind;

    fn dependencies(&self) -> &'static [ModuleKind] {
        self.kind().dependencies()
    }

    fn priority(&self) -> i32 {
        self.kind().priority()
    }

    /// Produce this module's artifact from its predecessors'.
    fn generate(&self, input: &GenerationInput<'_>) -> Result<Artifact>;

    /// Whether the module contributes anything at `(x, y)`.
    fn affects_position(&self, artifacts: &Artifacts, x: i32, y: i32) -> bool {
        self.data_at(artifacts, x, y).is_some()
    }

    fn data_at(&self, artifacts: &Artifacts, x: i32, y: i32) -> Option<LayerSample>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_names_round_trip() {
        for kind in ModuleKind::ALL {
            assert_eq!(ModuleKind::from_name(kind.name()).unwrap(), kind);
        }
        assert!(ModuleKind::from_name("HYDROLOGY").is_ok());
        assert!(ModuleKind::from_name("treasure").is_err());
    }

    #[test]
    fn test_reads_only_higher_priority_modules() {
        for kind in ModuleKind::ALL {
            for pred in kind.reads() {
                assert!(
                    pred.priority() > kind.priority(),
                    "{} reads {} which has lower priority",
                    kind,
                    pred
                );
            }
        }
    }

    #[test]
    fn test_overlay_higher_layer_wins() {
        let mut base = LayerSample {
            tag: Some(LayerTag::Forest),
            elevation: Some(0.2),
            features: vec![Feature::Spring],
            ..Default::default()
        };
        base.overlay(LayerSample {
            tag: Some(LayerTag::River),
            features: vec![Feature::Spring],
            ..Default::default()
        });
        assert_eq!(base.tag, Some(LayerTag::River));
        assert_eq!(base.elevation, Some(0.2));
        assert_eq!(base.features.len(), 2);
    }
}
