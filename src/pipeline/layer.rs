use crate::config::GameConfig;
use crate::elevation::ElevationModule;
use crate::error::Result;
use crate::geology::GeologyModule;
use crate::hydrology::HydrologyModule;
use crate::trees::TreeModule;
use crate::vegetation::VegetationModule;

use super::{Artifact, Artifacts, GenerationInput, LayerSample, ModuleKind, TerrainModule};

/// A registered module: one variant per [`ModuleKind`].
#[derive(Clone, Debug)]
pub enum TerrainLayer {
    Geology(GeologyModule),
    Elevation(ElevationModule),
    Hydrology(HydrologyModule),
    Vegetation(VegetationModule),
    Trees(TreeModule),
}

impl TerrainLayer {
    /// Build the module of `kind` from the relevant configuration section.
    pub fn from_config(kind: ModuleKind, config: &GameConfig) -> Self {
        match kind {
            ModuleKind::Geology => TerrainLayer::Geology(GeologyModule::new(config.geology.clone())),
            ModuleKind::Elevation => {
                TerrainLayer::Elevation(ElevationModule::new(config.elevation.clone()))
            }
            ModuleKind::Hydrology => {
                TerrainLayer::Hydrology(HydrologyModule::new(config.hydrology.clone()))
            }
            ModuleKind::Vegetation => TerrainLayer::Vegetation(VegetationModule::new(
                config.vegetation.clone(),
                config.trees.forest_patch_count,
            )),
            ModuleKind::Trees => TerrainLayer::Trees(TreeModule::new(config.trees.clone())),
        }
    }

    fn inner(&self) -> &dyn TerrainModule {
        match self {
            TerrainLayer::Geology(m) => m,
            TerrainLayer::Elevation(m) => m,
            TerrainLayer::Hydrology(m) => m,
            TerrainLayer::Vegetation(m) => m,
            TerrainLayer::Trees(m) => m,
        }
    }
}

impl TerrainModule for TerrainLayer {
    fn kind(&self) -> ModuleKind {
        self.inner().kind()
    }

    fn generate(&self, input: &GenerationInput<'_>) -> Result<Artifact> {
        self.inner().generate(input)
    }

    fn affects_position(&self, artifacts: &Artifacts, x: i32, y: i32) -> bool {
        self.inner().affects_position(artifacts, x, y)
    }

    fn data_at(&self, artifacts: &Artifacts, x: i32, y: i32) -> Option<LayerSample> {
        self.inner().data_at(artifacts, x, y)
    }
}
