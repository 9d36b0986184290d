//! Springs, rivers, lakes and the confluence relation
//!
//! Runs in a fixed order: springs are scored on elevation and geology, rivers
//! are traced downhill from each spring over the depression-filled surface,
//! lakes are placed in low basins (preferring sites near the provisional
//! rivers), rivers are retraced and cut where they reach a lake, short rivers
//! are dropped, and finally confluences are found.

mod drainage;
mod lakes;
mod rivers;
mod springs;
mod symbols;

pub use drainage::{fill_depressions, FILL_EPSILON};
pub use lakes::{assign_lake_owners, place_lakes};
pub use rivers::{find_confluences, trace_river, truncate_at_lakes, LAKE_CAPTURE_DISTANCE};
pub use springs::select_springs;
pub use symbols::{glyph_for, symbolize};

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::HydrologyConfig;
use crate::elevation::ElevationField;
use crate::error::Result;
use crate::geology::{GeologyField, RockType};
use crate::geometry::{Bounds, Direction, Point};
use crate::pipeline::{
    Artifact, Artifacts, Feature, GenerationInput, LayerSample, LayerTag, ModuleKind,
    TerrainModule,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Spring {
    pub position: Point,
    /// (0, 1]
    pub flow: f32,
    pub elevation: f32,
    pub rock_type: RockType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Confluence {
    pub other_id: usize,
    pub point: Point,
}

/// Why a river stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Termination {
    Sea,
    Lake,
    River,
    Boundary,
    Exhausted,
    Stalled,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct River {
    pub id: usize,
    pub spring: Spring,
    /// Ordered source to terminus
    pub path: Vec<Point>,
    pub flow: f32,
    pub confluences: Vec<Confluence>,
    pub termination: Termination,
}

impl River {
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn meets(&self, other_id: usize) -> bool {
        self.confluences.iter().any(|c| c.other_id == other_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Lake {
    pub center: Point,
    pub radius: f32,
    pub elevation: f32,
    pub rock_type: RockType,
}

impl Lake {
    pub fn covers(&self, p: Point) -> bool {
        self.center.distance(p) <= self.radius
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TileRole {
    Source,
    Middle,
    Mouth,
}

/// One rendered river cell.
#[derive(Clone, Debug, PartialEq)]
pub struct RiverTile {
    pub position: Point,
    /// Travel directions of the flow entering this cell
    pub inflow: Vec<Direction>,
    /// Travel directions of the flow leaving this cell
    pub outflow: Vec<Direction>,
    pub role: TileRole,
    pub is_confluence: bool,
    pub glyph: char,
    pub rivers: Vec<usize>,
}

impl RiverTile {
    /// Directions towards the path neighbours of this cell.
    pub fn connections(&self) -> Vec<Direction> {
        let mut dirs: Vec<Direction> = self
            .inflow
            .iter()
            .map(|d| d.opposite())
            .chain(self.outflow.iter().copied())
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

/// Output of the hydrology module.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HydrologyData {
    pub springs: Vec<Spring>,
    pub rivers: Vec<River>,
    pub lakes: Vec<Lake>,
    /// Lake cell to owning lake index
    pub lake_owner: HashMap<Point, usize>,
    pub river_tiles: HashMap<Point, RiverTile>,
}

impl HydrologyData {
    /// Derive lake ownership, confluences and river tiles from raw rivers and lakes.
    pub fn assemble(
        springs: Vec<Spring>,
        mut rivers: Vec<River>,
        lakes: Vec<Lake>,
        bounds: Bounds,
        confluence_distance: Option<f32>,
    ) -> Self {
        for (id, river) in rivers.iter_mut().enumerate() {
            river.id = id;
            river.confluences.clear();
        }
        if let Some(distance) = confluence_distance {
            find_confluences(&mut rivers, distance);
        }
        let lake_owner = assign_lake_owners(&lakes, bounds);
        let river_tiles = symbolize(&rivers, &lake_owner);

        debug_assert!(
            river_tiles.keys().all(|p| !lake_owner.contains_key(p)),
            "a cell is both river and lake"
        );

        Self {
            springs,
            rivers,
            lakes,
            lake_owner,
            river_tiles,
        }
    }

    pub fn lake_at(&self, x: i32, y: i32) -> Option<&Lake> {
        self.lake_owner
            .get(&Point::new(x, y))
            .and_then(|&i| self.lakes.get(i))
    }

    pub fn river_tile_at(&self, x: i32, y: i32) -> Option<&RiverTile> {
        self.river_tiles.get(&Point::new(x, y))
    }

    pub fn is_water(&self, x: i32, y: i32) -> bool {
        let p = Point::new(x, y);
        self.lake_owner.contains_key(&p) || self.river_tiles.contains_key(&p)
    }

    pub fn spring_at(&self, x: i32, y: i32) -> Option<&Spring> {
        let p = Point::new(x, y);
        self.springs.iter().find(|s| s.position == p)
    }

    pub fn longest_river(&self) -> usize {
        self.rivers.iter().map(River::len).max().unwrap_or(0)
    }
}

#[derive(Clone, Debug)]
pub struct HydrologyModule {
    params: HydrologyConfig,
}

impl HydrologyModule {
    pub fn new(params: HydrologyConfig) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HydrologyConfig {
        &self.params
    }

    pub fn build(
        &self,
        elevation: &ElevationField,
        geology: &GeologyField,
        seed: u64,
    ) -> HydrologyData {
        let p = &self.params;
        let bounds = elevation.bounds();
        let filled = fill_depressions(elevation, p.sea_level);
        let springs = select_springs(p, elevation, geology, seed);

        // Provisional routes only steer lake placement
        let mut occupied: HashSet<Point> = HashSet::new();
        let mut provisional: Vec<River> = Vec::with_capacity(springs.len());
        for (idx, spring) in springs.iter().enumerate() {
            let river = trace_river(p, elevation, geology, &filled, spring, idx, &occupied, seed);
            occupied.extend(river.path.iter().copied());
            provisional.push(river);
        }
        let lakes = place_lakes(p, elevation, geology, &provisional, seed);

        // Each river is cut at lakes and length-checked before later rivers
        // may end on it, so every junction lands on a surviving channel
        let step = p.river_step_size.max(1);
        let min_points = (p.min_river_length / step).max(2) as usize;
        let mut occupied: HashSet<Point> = HashSet::new();
        let mut rivers: Vec<River> = Vec::with_capacity(springs.len());
        let mut rejected = 0;
        for (idx, spring) in springs.iter().enumerate() {
            let mut river = trace_river(p, elevation, geology, &filled, spring, idx, &occupied, seed);
            truncate_at_lakes(std::slice::from_mut(&mut river), &lakes);
            if river.path.len() < min_points {
                rejected += 1;
                continue;
            }
            occupied.extend(river.path.iter().copied());
            rivers.push(river);
        }
        if rejected > 0 {
            debug!(rejected, "dropped short rivers");
        }

        let confluence = p.confluence_enabled.then_some(p.confluence_distance);
        let data = HydrologyData::assemble(springs, rivers, lakes, bounds, confluence);
        debug!(
            springs = data.springs.len(),
            rivers = data.rivers.len(),
            lakes = data.lakes.len(),
            longest = data.longest_river(),
            "hydrology ready"
        );
        data
    }
}

impl TerrainModule for HydrologyModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Hydrology
    }

    fn generate(&self, input: &GenerationInput<'_>) -> Result<Artifact> {
        let (Some(elevation), Some(geology)) = (&input.artifacts.elevation, &input.artifacts.geology)
        else {
            warn!("hydrology needs elevation and geology; producing no water");
            return Ok(Artifact::Hydrology(HydrologyData::default()));
        };
        Ok(Artifact::Hydrology(self.build(elevation, geology, input.seeds.hydrology)))
    }

    fn data_at(&self, artifacts: &Artifacts, x: i32, y: i32) -> Option<LayerSample> {
        let data = artifacts.hydrology.as_ref()?;
        let tag = if data.river_tile_at(x, y).is_some() {
            Some(LayerTag::River)
        } else if data.lake_at(x, y).is_some() {
            Some(LayerTag::Lake)
        } else {
            None
        };
        let features = if data.spring_at(x, y).is_some() {
            vec![Feature::Spring]
        } else {
            Vec::new()
        };
        if tag.is_none() && features.is_empty() {
            return None;
        }
        Some(LayerSample {
            tag,
            features,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ElevationConfig, GeologyConfig};
    use crate::elevation::ElevationModule;
    use crate::geology::GeologyModule;

    fn world(seed: u64) -> (ElevationField, GeologyField) {
        let bounds = Bounds::centered(0, 0, 200);
        let geology = GeologyModule::new(GeologyConfig::default()).build_field(bounds, seed);
        let elevation = ElevationModule::new(ElevationConfig::default()).from_geology(&geology, seed);
        (elevation, geology)
    }

    #[test]
    fn test_rivers_descend_the_filled_surface() {
        let (elevation, geology) = world(12345);
        let params = HydrologyConfig::default();
        let filled = fill_depressions(&elevation, params.sea_level);
        let data = HydrologyModule::new(params).build(&elevation, &geology, 1);
        for river in &data.rivers {
            for pair in river.path.windows(2) {
                let a = *filled.get(pair[0].x, pair[0].y).unwrap();
                let b = *filled.get(pair[1].x, pair[1].y).unwrap();
                assert!(b < a, "river {} climbs from {:?} to {:?}", river.id, pair[0], pair[1]);
                // Real terrain only rises while crossing a filled basin
                let terrain = elevation.height_at(pair[1].x, pair[1].y).unwrap();
                assert!(terrain <= a, "river {} climbs above the water surface at {:?}", river.id, pair[1]);
            }
        }
    }

    #[test]
    fn test_every_river_reaches_an_outlet() {
        let (elevation, geology) = world(12345);
        let params = HydrologyConfig {
            max_river_length: 100_000,
            ..Default::default()
        };
        let data = HydrologyModule::new(params.clone()).build(&elevation, &geology, 11);
        let bounds = elevation.bounds();
        assert!(!data.rivers.is_empty());
        for river in &data.rivers {
            assert_ne!(river.termination, Termination::Stalled, "river {} stalled", river.id);
            let end = *river.path.last().unwrap();
            let at_lake = data
                .lakes
                .iter()
                .any(|l| l.center.distance(end) <= LAKE_CAPTURE_DISTANCE.max(l.radius));
            let at_sea = elevation.height_at(end.x, end.y).unwrap() <= params.sea_level;
            let at_edge = end.x == bounds.min_x
                || end.x == bounds.max_x
                || end.y == bounds.min_y
                || end.y == bounds.max_y;
            let at_river = data
                .rivers
                .iter()
                .filter(|other| other.id != river.id)
                .any(|other| other.path.iter().any(|q| q.chebyshev(end) <= 1));
            assert!(
                at_lake || at_sea || at_edge || at_river,
                "river {} ends at {:?} ({:?})",
                river.id,
                end,
                river.termination
            );
        }
    }

    #[test]
    fn test_rivers_and_lakes_disjoint() {
        let (elevation, geology) = world(777);
        let data = HydrologyModule::new(HydrologyConfig::default()).build(&elevation, &geology, 2);
        for p in data.river_tiles.keys() {
            assert!(!data.lake_owner.contains_key(p), "{:?} is river and lake", p);
        }
    }

    #[test]
    fn test_lake_owner_is_closest_center() {
        let (elevation, geology) = world(4242);
        let data = HydrologyModule::new(HydrologyConfig::default()).build(&elevation, &geology, 3);
        for (p, &owner) in &data.lake_owner {
            let d = data.lakes[owner].center.distance(*p);
            assert!(d <= data.lakes[owner].radius);
            for lake in &data.lakes {
                if lake.covers(*p) {
                    assert!(lake.center.distance(*p) >= d, "{:?} has a closer lake", p);
                }
            }
        }
    }

    #[test]
    fn test_build_deterministic() {
        let (elevation, geology) = world(99);
        let module = HydrologyModule::new(HydrologyConfig::default());
        assert_eq!(
            module.build(&elevation, &geology, 5),
            module.build(&elevation, &geology, 5)
        );
    }

    #[test]
    fn test_missing_inputs_produce_empty_artifact() {
        let artifacts = Artifacts::default();
        let input = GenerationInput {
            bounds: Bounds::centered(0, 0, 32),
            seeds: crate::rng::WorldSeeds::from_master(1),
            artifacts: &artifacts,
        };
        let module = HydrologyModule::new(HydrologyConfig::default());
        match module.generate(&input).unwrap() {
            Artifact::Hydrology(data) => assert_eq!(data, HydrologyData::default()),
            other => panic!("unexpected artifact {:?}", other.kind()),
        }
    }

    #[test]
    fn test_min_length_enforced() {
        let (elevation, geology) = world(12345);
        let params = HydrologyConfig::default();
        let data = HydrologyModule::new(params.clone()).build(&elevation, &geology, 7);
        for river in &data.rivers {
            assert!(river.len() >= params.min_river_length as usize, "river {} too short", river.id);
        }
    }
}
