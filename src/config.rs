//! Configuration tree
//!
//! Every section deserialises with defaults so partial JSON documents work.
//! Keys are camelCase to match the persisted layout.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geology::{FormationKind, RockType};
use crate::geometry::{Bounds, Direction};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    /// Region placement and master seed
    pub world: WorldConfig,
    /// Rock formations
    pub geology: GeologyConfig,
    /// Height field composition
    pub elevation: ElevationConfig,
    /// Springs, rivers and lakes
    pub hydrology: HydrologyConfig,
    /// Forest patches and clearings
    pub vegetation: VegetationConfig,
    /// Individual trees
    pub trees: TreeConfig,
    /// Herd spawning and behaviour
    pub deer: DeerConfig,
    /// Vision and exploration
    pub fog: FogConfig,
}

impl GameConfig {
    pub fn with_seed(seed: u64) -> Self {
        let mut config = Self::default();
        config.world.seed = seed;
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldConfig {
    /// Region centre, x
    pub center_x: i32,
    /// Region centre, y (grows south)
    pub center_y: i32,
    /// Side length of the square region in cells
    pub region_size: u32,
    /// Master seed; every subsystem derives its own stream from it
    pub seed: u64,
    /// Explicit bounds; overrides centre and region size when present
    pub bounds: Option<Bounds>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            center_x: 0,
            center_y: 0,
            region_size: 200,
            seed: 12345,
            bounds: None,
        }
    }
}

impl WorldConfig {
    pub fn bounds(&self) -> Bounds {
        self.bounds
            .unwrap_or_else(|| Bounds::centered(self.center_x, self.center_y, self.region_size))
    }
}

/// One family of geological formations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationSpec {
    /// Family this entry places
    pub kind: FormationKind,
    /// Formations of this family placed per region
    pub count: u32,
    /// Radius range in cells
    pub min_radius: f32,
    pub max_radius: f32,
    /// Rock exposed where this family dominates
    pub rock_type: RockType,
    /// Peak elevation bias at the formation centre (-1.0 to 1.0)
    pub elevation_effect: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeologyConfig {
    /// Formation families, placed in order
    pub formations: Vec<FormationSpec>,
    /// Rock type of cells no formation dominates
    pub base_rock_type: RockType,
    /// How strongly weathering age modulates soil quality (0.0-1.0)
    pub weathering_effect: f32,
}

impl Default for GeologyConfig {
    fn default() -> Self {
        Self {
            formations: vec![
                FormationSpec {
                    kind: FormationKind::GraniteIntrusion,
                    count: 3,
                    min_radius: 18.0,
                    max_radius: 32.0,
                    rock_type: RockType::Hard,
                    elevation_effect: 0.6,
                },
                FormationSpec {
                    kind: FormationKind::LimestoneBed,
                    count: 4,
                    min_radius: 20.0,
                    max_radius: 40.0,
                    rock_type: RockType::Soft,
                    elevation_effect: 0.2,
                },
                FormationSpec {
                    kind: FormationKind::ClayDeposit,
                    count: 3,
                    min_radius: 12.0,
                    max_radius: 24.0,
                    rock_type: RockType::Clay,
                    elevation_effect: -0.3,
                },
            ],
            base_rock_type: RockType::Soft,
            weathering_effect: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElevationConfig {
    /// Derive elevation from geology; otherwise use radial hills
    pub use_geology: bool,
    /// Weight of the summed formation elevation bias
    pub geological_strength: f32,
    /// Lowering applied to weakly resistant rock
    pub erosion_strength: f32,
    /// Height of a cell with no formation influence
    pub base_elevation: f32,
    /// Upper clamp of the field
    pub max_elevation: f32,
    /// Box-filter passes applied after composition
    pub smoothing_passes: u32,
    /// Amplitude of the Perlin detail term
    pub noise_amount: f32,
    /// Hills placed in fallback mode
    pub fallback_hill_count: u32,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            use_geology: true,
            geological_strength: 0.6,
            erosion_strength: 0.2,
            base_elevation: 0.35,
            max_elevation: 0.95,
            smoothing_passes: 2,
            noise_amount: 0.05,
            fallback_hill_count: 6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HydrologyConfig {
    /// Springs to select; each one seeds a river
    pub spring_count: u32,
    /// Cells below this elevation never host a spring
    pub spring_elevation_min: f32,
    /// Minimum distance between accepted springs
    pub spring_spacing: f32,
    /// Cells advanced per river step
    pub river_step_size: u32,
    /// River length budget in cells
    pub max_river_length: u32,
    /// Rivers with fewer points are dropped
    pub min_river_length: u32,
    /// Step score penalty for entering hard rock
    pub hard_rock_avoidance: f32,
    /// Step score bonus for entering soft rock
    pub soft_rock_preference: f32,
    /// Step score bonus for entering clay
    pub clay_channeling: f32,
    /// Lakes to place
    pub lake_count: u32,
    /// Lake radius range in cells
    pub min_lake_radius: f32,
    pub max_lake_radius: f32,
    /// Minimum distance between lake centres
    pub lake_spacing: f32,
    /// Lake score bonus on clay
    pub lake_clay_preference: f32,
    /// Cells above this elevation never host a lake
    pub lake_low_elevation_max: f32,
    /// Lake score penalty on hard rock
    pub lake_hard_rock_avoidance: f32,
    /// Record where rivers meet
    pub confluence_enabled: bool,
    /// Paths closer than this many cells form a confluence
    pub confluence_distance: f32,
    /// Rivers end once they reach this elevation
    pub sea_level: f32,
}

impl Default for HydrologyConfig {
    fn default() -> Self {
        Self {
            spring_count: 8,
            spring_elevation_min: 0.4,
            spring_spacing: 40.0,
            river_step_size: 1,
            max_river_length: 150,
            min_river_length: 10,
            hard_rock_avoidance: 0.3,
            soft_rock_preference: 0.3,
            clay_channeling: 0.2,
            lake_count: 4,
            min_lake_radius: 3.0,
            max_lake_radius: 7.0,
            lake_spacing: 30.0,
            lake_clay_preference: 0.4,
            lake_low_elevation_max: 0.3,
            lake_hard_rock_avoidance: 0.5,
            confluence_enabled: true,
            confluence_distance: 3.0,
            sea_level: 0.12,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VegetationConfig {
    /// Forest patch radius range in cells
    pub min_patch_radius: f32,
    pub max_patch_radius: f32,
    /// Range of the fraction of patch sites that become trees
    pub min_density: f32,
    pub max_density: f32,
    /// Clearings cut into existing patches
    pub clearing_count: u32,
    /// Radius of each clearing in cells
    pub clearing_radius: f32,
    /// Patches are not centred above this elevation
    pub treeline: f32,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            min_patch_radius: 8.0,
            max_patch_radius: 18.0,
            min_density: 0.3,
            max_density: 0.6,
            clearing_count: 3,
            clearing_radius: 4.0,
            treeline: 0.7,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeConfig {
    /// Hard cap on trees per region
    pub max_trees: u32,
    /// Minimum trunk to trunk distance
    pub min_tree_spacing: f32,
    /// Number of forest patches; `None` picks 3 to 5 from the seed
    pub forest_patch_count: Option<u32>,
    /// Number of lone trees; `None` picks 8 to 15 from the seed
    pub scattered_tree_count: Option<u32>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_trees: 400,
            min_tree_spacing: 3.0,
            forest_patch_count: None,
            scattered_tree_count: None,
        }
    }
}

/// Deer behaviour. Times are milliseconds, distances are cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeerConfig {
    /// Total deer spawned per region
    pub max_deer_count: u32,
    /// Deer per herd
    pub herd_size: u32,
    /// Deer within this distance react to the player; herds spawn outside it
    pub player_detection_radius: f32,
    /// Longest line of sight to the player
    pub vision_range: f32,
    /// A seen player closer than this alarms the deer
    pub alert_range: f32,
    /// Fleeing ends once the player is this far away
    pub flee_distance: f32,
    /// A player this close triggers an immediate escape step
    pub panic_distance: f32,
    /// Minimum time between moves while wandering
    pub base_move_interval: u64,
    /// Minimum time between wary sidesteps while alert
    pub alert_move_interval: u64,
    /// Minimum time between moves while fleeing
    pub flee_move_interval: u64,
    /// How long a wander target is kept
    pub wander_duration: u64,
    /// Chance that a wandering deer moves when its turn comes
    pub wander_move_chance: f32,
    /// Fleeing never lasts longer than this
    pub max_flee_time: u64,
    /// How long the last sighting steers a fleeing deer
    pub player_memory_time: u64,
    /// Herd mates within this distance influence movement
    pub flock_radius: f32,
    /// Weight of the herd heading in a blended step (0.0-1.0)
    pub flock_strength: f32,
    /// Scheduler cadence
    pub update_interval: u64,
    /// Reactions drained per deer on one player move
    pub max_reactions_per_update: usize,
}

impl Default for DeerConfig {
    fn default() -> Self {
        Self {
            max_deer_count: 12,
            herd_size: 4,
            player_detection_radius: 25.0,
            vision_range: 15.0,
            alert_range: 10.0,
            flee_distance: 18.0,
            panic_distance: 4.0,
            base_move_interval: 800,
            alert_move_interval: 1200,
            flee_move_interval: 200,
            wander_duration: 5000,
            wander_move_chance: 0.3,
            max_flee_time: 8000,
            player_memory_time: 4000,
            flock_radius: 6.0,
            flock_strength: 0.4,
            update_interval: 200,
            max_reactions_per_update: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FogConfig {
    /// With fog off every cell is visible
    pub enabled: bool,
    /// All-round sight radius
    pub vision_radius: f32,
    /// Sight range inside the forward cone
    pub forward_vision_range: f32,
    /// Disk around the player explored even without line of sight
    pub explored_radius: f32,
    /// Full opening angle of the forward cone in degrees
    pub cone_angle: f32,
    /// Initial facing
    pub facing: Direction,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vision_radius: 4.0,
            forward_vision_range: 12.0,
            explored_radius: 3.0,
            cone_angle: 150.0,
            facing: Direction::N,
        }
    }
}
