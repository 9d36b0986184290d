use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{GameConfig, WorldConfig};
use crate::error::{Result, WorldError};
use crate::geometry::Bounds;
use crate::rng::WorldSeeds;

use super::{Artifacts, GenerationInput, LayerSample, ModuleKind, TerrainLayer, TerrainModule};

/// World configuration, registered modules, their artifacts and the run order.
#[derive(Clone, Debug)]
pub struct WorldContext {
    world: WorldConfig,
    bounds: Bounds,
    seeds: WorldSeeds,
    modules: Vec<TerrainLayer>,
    order: Vec<ModuleKind>,
    artifacts: Artifacts,
}

impl WorldContext {
    pub fn new(world: WorldConfig) -> Self {
        Self {
            bounds: world.bounds(),
            seeds: WorldSeeds::from_master(world.seed),
            world,
            modules: Vec::new(),
            order: Vec::new(),
            artifacts: Artifacts::default(),
        }
    }

    /// Context with every module registered from `config`, not yet generated.
    pub fn with_default_modules(config: &GameConfig) -> Result<Self> {
        let mut ctx = Self::new(config.world.clone());
        for kind in ModuleKind::ALL {
            ctx.register_module(TerrainLayer::from_config(kind, config))?;
        }
        Ok(ctx)
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn seeds(&self) -> WorldSeeds {
        self.seeds
    }

    pub fn world_config(&self) -> &WorldConfig {
        &self.world
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Current generation order.
    pub fn order(&self) -> &[ModuleKind] {
        &self.order
    }

    pub fn is_registered(&self, kind: ModuleKind) -> bool {
        self.modules.iter().any(|m| m.kind() == kind)
    }

    pub fn module(&self, kind: ModuleKind) -> Option<&TerrainLayer> {
        self.modules.iter().find(|m| m.kind() == kind)
    }

    /// Add a module to the pipeline. Fails on duplicates, on a missing declared
    /// dependency, and on dependency cycles.
    pub fn register_module(&mut self, layer: TerrainLayer) -> Result<()> {
        let kind = layer.kind();
        if self.is_registered(kind) {
            return Err(WorldError::DuplicateModule(kind));
        }
        if let Some(&missing) = layer
            .dependencies()
            .iter()
            .find(|dep| !self.is_registered(**dep))
        {
            return Err(WorldError::DependencyMissing {
                module: kind,
                dependency: missing,
            });
        }

        self.modules.push(layer);
        match self.sorted_order() {
            Some(order) => {
                self.order = order;
                debug!(module = %kind, order = ?self.order, "registered module");
                Ok(())
            }
            None => {
                self.modules.pop();
                Err(WorldError::DependencyCycle { module: kind })
            }
        }
    }

    /// Remove a module and its artifact. Fails while another module declares it
    /// as a dependency.
    pub fn remove_module(&mut self, kind: ModuleKind) -> Result<TerrainLayer> {
        let idx = self
            .modules
            .iter()
            .position(|m| m.kind() == kind)
            .ok_or(WorldError::UnknownModule(kind))?;
        if let Some(dependent) = self
            .modules
            .iter()
            .find(|m| m.dependencies().contains(&kind))
        {
            return Err(WorldError::DependencyMissing {
                module: dependent.kind(),
                dependency: kind,
            });
        }
        let layer = self.modules.remove(idx);
        self.artifacts.clear(kind);
        self.order.retain(|k| *k != kind);
        Ok(layer)
    }

    /// Swap a module's parameters in place. Its artifact is kept until the
    /// module is regenerated.
    pub fn replace_module(&mut self, layer: TerrainLayer) -> Result<()> {
        let kind = layer.kind();
        let slot = self
            .modules
            .iter_mut()
            .find(|m| m.kind() == kind)
            .ok_or(WorldError::UnknownModule(kind))?;
        *slot = layer;
        Ok(())
    }

    /// Run every registered module in dependency order.
    pub fn generate(&mut self) -> Result<()> {
        self.artifacts = Artifacts::default();
        let order = self.order.clone();
        info!(
            seed = self.seeds.master,
            width = self.bounds.width(),
            height = self.bounds.height(),
            "generating world"
        );
        self.run(&order)
    }

    /// Re-run one module and everything downstream of it; other artifacts are kept.
    pub fn regenerate_module(&mut self, kind: ModuleKind) -> Result<()> {
        if !self.is_registered(kind) {
            return Err(WorldError::UnknownModule(kind));
        }
        let affected = self.downstream_of(kind);
        let order: Vec<ModuleKind> = self
            .order
            .iter()
            .copied()
            .filter(|k| affected.contains(k))
            .collect();
        for k in &order {
            self.artifacts.clear(*k);
        }
        info!(module = %kind, rerun = ?order, "regenerating module");
        self.run(&order)
    }

    /// Compose every module's data at `(x, y)`. Layers are applied from lowest
    /// to highest priority, so higher layers win tag conflicts.
    pub fn query(&self, x: i32, y: i32) -> LayerSample {
        let mut sample = LayerSample::default();
        for kind in self.order.iter().rev() {
            if let Some(module) = self.module(*kind) {
                if let Some(layer) = module.data_at(&self.artifacts, x, y) {
                    sample.overlay(layer);
                }
            }
        }
        sample
    }

    fn run(&mut self, kinds: &[ModuleKind]) -> Result<()> {
        let mut first_error = None;
        for &kind in kinds {
            let blocked = kind
                .reads()
                .find(|pred| self.is_registered(*pred) && !self.artifacts.has(*pred));
            if let Some(pred) = blocked {
                warn!(module = %kind, missing = %pred, "skipping module: predecessor has no artifact");
                continue;
            }

            let Some(module) = self.module(kind) else {
                continue;
            };
            let started = Instant::now();
            let input = GenerationInput {
                bounds: self.bounds,
                seeds: self.seeds,
                artifacts: &self.artifacts,
            };
            let result = module.generate(&input);
            match result {
                Ok(artifact) => {
                    debug_assert_eq!(artifact.kind(), kind);
                    info!(
                        module = %kind,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "module generated"
                    );
                    self.artifacts.store(artifact);
                }
                Err(err) => {
                    let err = match err {
                        err @ WorldError::Generation { .. } => err,
                        other => WorldError::Generation {
                            module: kind,
                            cause: other.to_string(),
                        },
                    };
                    warn!(module = %kind, error = %err, "module failed; dependents will be skipped");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// `kind` plus every registered module that transitively reads it.
    pub fn downstream_of(&self, kind: ModuleKind) -> HashSet<ModuleKind> {
        let mut affected = HashSet::from([kind]);
        let mut changed = true;
        while changed {
            changed = false;
            for module in &self.modules {
                let k = module.kind();
                if !affected.contains(&k) && k.reads().any(|pred| affected.contains(&pred)) {
                    affected.insert(k);
                    changed = true;
                }
            }
        }
        affected
    }

    /// Kahn's algorithm over registered modules; ready modules are taken in
    /// descending priority. Returns `None` on a cycle.
    fn sorted_order(&self) -> Option<Vec<ModuleKind>> {
        let registered: BTreeSet<ModuleKind> = self.modules.iter().map(|m| m.kind()).collect();
        let mut indegree: HashMap<ModuleKind, usize> = HashMap::new();
        let mut successors: HashMap<ModuleKind, Vec<ModuleKind>> = HashMap::new();

        for &kind in &registered {
            let preds: Vec<ModuleKind> = kind.reads().filter(|p| registered.contains(p)).collect();
            indegree.insert(kind, preds.len());
            for pred in preds {
                successors.entry(pred).or_default().push(kind);
            }
        }

        let mut ready: BinaryHeap<(i32, Reverse<ModuleKind>)> = indegree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(&k, _)| (k.priority(), Reverse(k)))
            .collect();
        let mut order = Vec::with_capacity(registered.len());

        while let Some((_, Reverse(kind))) = ready.pop() {
            order.push(kind);
            for &next in successors.get(&kind).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(deg) = indegree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push((next.priority(), Reverse(next)));
                    }
                }
            }
        }

        (order.len() == registered.len()).then_some(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geology::RockType;
    use crate::geometry::Point;
    use crate::hydrology::{HydrologyData, River, Spring, Termination};
    use crate::pipeline::{Feature, LayerTag};
    use crate::trees::{TreeFeature, TreeField};
    use crate::vegetation::{ForestPatch, VegetationData};

    fn small_config(seed: u64) -> GameConfig {
        let mut config = GameConfig::with_seed(seed);
        config.world.region_size = 96;
        config
    }

    #[test]
    fn test_default_order_follows_priority() {
        let ctx = WorldContext::with_default_modules(&small_config(1)).unwrap();
        assert_eq!(
            ctx.order(),
            &[
                ModuleKind::Geology,
                ModuleKind::Elevation,
                ModuleKind::Hydrology,
                ModuleKind::Vegetation,
                ModuleKind::Trees,
            ]
        );
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let config = small_config(1);
        let mut ctx = WorldContext::new(config.world.clone());
        let err = ctx
            .register_module(TerrainLayer::from_config(ModuleKind::Trees, &config))
            .unwrap_err();
        assert!(matches!(
            err,
            WorldError::DependencyMissing { module: ModuleKind::Trees, dependency: ModuleKind::Vegetation }
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let config = small_config(1);
        let mut ctx = WorldContext::new(config.world.clone());
        ctx.register_module(TerrainLayer::from_config(ModuleKind::Geology, &config))
            .unwrap();
        let err = ctx
            .register_module(TerrainLayer::from_config(ModuleKind::Geology, &config))
            .unwrap_err();
        assert!(matches!(err, WorldError::DuplicateModule(ModuleKind::Geology)));
    }

    #[test]
    fn test_registration_order_does_not_change_run_order() {
        let config = small_config(3);
        let mut a = WorldContext::new(config.world.clone());
        let mut b = WorldContext::new(config.world.clone());
        for kind in [ModuleKind::Geology, ModuleKind::Elevation, ModuleKind::Hydrology] {
            a.register_module(TerrainLayer::from_config(kind, &config)).unwrap();
        }
        for kind in [ModuleKind::Hydrology, ModuleKind::Elevation, ModuleKind::Geology] {
            b.register_module(TerrainLayer::from_config(kind, &config)).unwrap();
        }
        assert_eq!(a.order(), b.order());
        a.generate().unwrap();
        b.generate().unwrap();
        assert_eq!(a.artifacts().hydrology, b.artifacts().hydrology);
    }

    #[test]
    fn test_remove_module_with_dependents_fails() {
        let mut ctx = WorldContext::with_default_modules(&small_config(1)).unwrap();
        assert!(ctx.remove_module(ModuleKind::Vegetation).is_err());
        assert!(ctx.remove_module(ModuleKind::Trees).is_ok());
        assert!(ctx.remove_module(ModuleKind::Vegetation).is_ok());
        assert!(!ctx.order().contains(&ModuleKind::Trees));
    }

    #[test]
    fn test_regenerate_preserves_upstream() {
        let mut config = small_config(5);
        let mut ctx = WorldContext::with_default_modules(&config).unwrap();
        ctx.generate().unwrap();
        let geology = ctx.artifacts().geology.clone();
        let elevation = ctx.artifacts().elevation.clone();

        config.hydrology.spring_count = 2;
        ctx.replace_module(TerrainLayer::from_config(ModuleKind::Hydrology, &config))
            .unwrap();
        ctx.regenerate_module(ModuleKind::Hydrology).unwrap();

        assert_eq!(ctx.artifacts().geology, geology);
        assert_eq!(ctx.artifacts().elevation, elevation);
        assert!(ctx.artifacts().trees.is_some(), "dependents should be rebuilt");
    }

    #[test]
    fn test_query_outside_bounds_is_empty() {
        let mut ctx = WorldContext::with_default_modules(&small_config(1)).unwrap();
        ctx.generate().unwrap();
        let sample = ctx.query(10_000, 10_000);
        assert_eq!(sample, LayerSample::default());
    }

    #[test]
    fn test_failed_module_is_wrapped_and_dependents_skipped() {
        let mut config = small_config(1);
        config.world.bounds = Some(Bounds {
            min_x: 10,
            max_x: -10,
            min_y: 0,
            max_y: 20,
        });
        let mut ctx = WorldContext::with_default_modules(&config).unwrap();
        let err = ctx.generate().unwrap_err();
        match err {
            WorldError::Generation { module, cause } => {
                assert_eq!(module, ModuleKind::Geology);
                assert!(cause.contains("no cells"), "cause was {}", cause);
            }
            other => panic!("expected a generation error, got {:?}", other),
        }
        for kind in ModuleKind::ALL {
            assert!(!ctx.artifacts().has(kind), "{} should have been skipped", kind);
        }
    }

    #[test]
    fn test_downstream_of_follows_reads() {
        let ctx = WorldContext::with_default_modules(&small_config(1)).unwrap();
        let affected = ctx.downstream_of(ModuleKind::Hydrology);
        assert!(affected.contains(&ModuleKind::Hydrology));
        assert!(affected.contains(&ModuleKind::Vegetation));
        assert!(affected.contains(&ModuleKind::Trees));
        assert!(!affected.contains(&ModuleKind::Elevation));
    }

    #[test]
    fn test_query_composes_layers_by_priority() {
        let mut ctx = WorldContext::with_default_modules(&small_config(1)).unwrap();
        ctx.generate().unwrap();

        let source = Point::new(-3, 0);
        let spring = Spring {
            position: source,
            flow: 0.5,
            elevation: 0.6,
            rock_type: RockType::Soft,
        };
        let river = River {
            id: 0,
            spring: spring.clone(),
            path: (-3..=3).map(|x| Point::new(x, 0)).collect(),
            flow: 0.5,
            confluences: Vec::new(),
            termination: Termination::Boundary,
        };
        ctx.artifacts.hydrology = Some(HydrologyData::assemble(
            vec![spring],
            vec![river],
            Vec::new(),
            ctx.bounds(),
            None,
        ));
        ctx.artifacts.vegetation = Some(VegetationData {
            patches: vec![ForestPatch {
                center: Point::new(0, 0),
                radius: 10.0,
                density: 0.5,
            }],
            clearings: Vec::new(),
        });
        let mut trees = TreeField::default();
        trees.insert_feature(source, TreeFeature::canopy(0, -4, 0));
        ctx.artifacts.trees = Some(trees);

        // River beats the forest patch it runs through
        let mid = ctx.query(0, 0);
        assert_eq!(mid.tag, Some(LayerTag::River));
        assert!(mid.elevation.is_some());

        // The spring feature survives alongside the canopy reported by trees
        let at_source = ctx.query(source.x, source.y);
        assert_eq!(at_source.tag, Some(LayerTag::River));
        assert!(at_source.features.contains(&Feature::Spring));
        assert!(at_source
            .features
            .iter()
            .any(|f| matches!(f, Feature::Tree(_))));

        // Off the river the patch still shows through
        assert_eq!(ctx.query(0, 5).tag, Some(LayerTag::Forest));
    }
}
