//! World façade
//!
//! [`Core`] owns the generated world, the classification cache, fog of war,
//! the deer and the player. Presentation layers talk to it through
//! [`Core::terrain_at`], [`Core::can_move_to`], [`Core::on_player_moved`],
//! [`Core::tick`] and [`Core::render_view`]; nothing else reaches into the
//! subsystems directly.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::classifier::{ClassifiedMap, TerrainTag};
use crate::config::GameConfig;
use crate::error::{Result, WorldError};
use crate::fauna::{DeerId, DeerManager, DeerState, DeerTerrain};
use crate::fog::{FogOfWar, Visibility};
use crate::geology::{FormationKind, RockType};
use crate::geometry::{Bounds, Direction, Point};
use crate::pipeline::{ModuleKind, TerrainLayer, WorldContext};
use crate::trees::{TreeFeature, TreeField, TreeKind};

pub const PLAYER_SYMBOL: char = '@';
pub const TRUNK_SYMBOL: char = 'T';
pub const CANOPY_SYMBOL: char = '♣';
pub const DEER_SYMBOL: char = 'd';
pub const FOG_SYMBOL: char = ' ';

/// Everything known about one cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellView {
    pub x: i32,
    pub y: i32,
    pub tag: TerrainTag,
    /// Display symbol: river glyph, tree or deer on top of the terrain symbol
    pub symbol: char,
    #[serde(skip)]
    pub feature: Option<TreeFeature>,
    pub deer: Option<DeerId>,
    pub deer_state: Option<DeerState>,
    pub elevation: f32,
    pub rock_type: Option<RockType>,
    pub explored: bool,
    pub visible: bool,
}

impl CellView {
    /// Sentinel for cells outside the region.
    pub fn unknown(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            tag: TerrainTag::Unknown,
            symbol: TerrainTag::Unknown.symbol(),
            feature: None,
            deer: None,
            deer_state: None,
            elevation: 0.0,
            rock_type: None,
            explored: false,
            visible: false,
        }
    }
}

/// Rectangle of world cells to draw; `x`/`y` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn centered_on(p: Point, width: usize, height: usize) -> Self {
        Self {
            x: p.x - (width / 2) as i32,
            y: p.y - (height / 2) as i32,
            width,
            height,
        }
    }
}

/// One drawn cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glyph {
    pub symbol: char,
    /// Style class: a terrain class name, or "player", "deer", "trunk", "canopy", "fog"
    pub class: &'static str,
    pub visibility: Visibility,
}

/// Sink for [`Core::render_view`].
pub trait BufferAdapter {
    fn begin(&mut self, _viewport: Viewport) {}

    fn put(&mut self, column: usize, row: usize, glyph: Glyph);
}

/// Result of [`Core::apply_move`], enough to undo it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub from: Point,
    pub to: Point,
    pub facing_before: Direction,
    pub facing_after: Direction,
    pub moved: bool,
}

/// Summary numbers for logging and `--stats`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldStats {
    pub seed: u64,
    pub width: usize,
    pub height: usize,
    pub granite_intrusions: usize,
    pub limestone_beds: usize,
    pub clay_deposits: usize,
    pub springs: usize,
    pub rivers: usize,
    pub lakes: usize,
    pub longest_river: usize,
    pub confluences: usize,
    pub trees: usize,
    pub deer: usize,
    pub explored: usize,
}

impl fmt::Display for WorldStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Seed: {}  ({}x{})", self.seed, self.width, self.height)?;
        writeln!(
            f,
            "Formations: {} granite, {} limestone, {} clay",
            self.granite_intrusions, self.limestone_beds, self.clay_deposits
        )?;
        writeln!(
            f,
            "Water: {} springs, {} rivers (longest {}), {} lakes, {} confluences",
            self.springs, self.rivers, self.longest_river, self.lakes, self.confluences
        )?;
        write!(f, "Life: {} trees, {} deer", self.trees, self.deer)
    }
}

/// Walkability and sight as deer see them.
struct TerrainView<'a> {
    classified: &'a ClassifiedMap,
    trees: Option<&'a TreeField>,
    placed: &'a TreeField,
    player: Option<Point>,
}

impl TerrainView<'_> {
    fn feature_at(&self, p: Point) -> Option<TreeFeature> {
        self.placed
            .feature_at(p.x, p.y)
            .or_else(|| self.trees.and_then(|t| t.feature_at(p.x, p.y)))
            .copied()
    }
}

impl DeerTerrain for TerrainView<'_> {
    fn is_walkable(&self, p: Point) -> bool {
        self.classified.tag_at(p.x, p.y).is_walkable()
            && !self.feature_at(p).is_some_and(|f| f.blocks_movement())
            && self.player != Some(p)
    }

    fn blocks_sight(&self, p: Point) -> bool {
        self.feature_at(p).is_some_and(|f| f.blocks_sight())
    }
}

/// The world plus everything living in it.
pub struct Core {
    config: GameConfig,
    context: WorldContext,
    classified: ClassifiedMap,
    /// Scripted features layered over the generated trees
    placed: TreeField,
    fog: FogOfWar,
    deer: DeerManager,
    player: Point,
    now: u64,
}

impl Core {
    /// Generate a world from `config`, spawn deer and place the player near
    /// the centre.
    pub fn new(config: GameConfig) -> Result<Self> {
        let mut context = WorldContext::with_default_modules(&config)?;
        context.generate()?;
        let bounds = context.bounds();
        let classified = ClassifiedMap::build(context.artifacts(), bounds);
        let fauna_seed = context.seeds().fauna;

        let mut core = Core {
            fog: FogOfWar::new(config.fog.clone()),
            deer: DeerManager::new(config.deer.clone(), fauna_seed),
            player: bounds.center(),
            now: 0,
            placed: TreeField::default(),
            classified,
            context,
            config,
        };
        core.reset_population();
        core.log_stats();
        Ok(core)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Mutable configuration. Changes apply on the next regeneration.
    pub fn config_mut(&mut self) -> &mut GameConfig {
        &mut self.config
    }

    pub fn context(&self) -> &WorldContext {
        &self.context
    }

    pub fn bounds(&self) -> Bounds {
        self.context.bounds()
    }

    pub fn classified(&self) -> &ClassifiedMap {
        &self.classified
    }

    pub fn fog(&self) -> &FogOfWar {
        &self.fog
    }

    pub fn fog_mut(&mut self) -> &mut FogOfWar {
        &mut self.fog
    }

    pub fn deer(&self) -> &DeerManager {
        &self.deer
    }

    pub fn player(&self) -> Point {
        self.player
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Tree feature at a cell; scripted placements win over generated trees.
    pub fn feature_at(&self, x: i32, y: i32) -> Option<TreeFeature> {
        self.view().feature_at(Point::new(x, y))
    }

    fn view(&self) -> TerrainView<'_> {
        TerrainView {
            classified: &self.classified,
            trees: self.context.artifacts().trees.as_ref(),
            placed: &self.placed,
            player: Some(self.player),
        }
    }

    fn blocks_sight(&self, p: Point) -> bool {
        self.feature_at(p.x, p.y).is_some_and(|f| f.blocks_sight())
    }

    pub fn has_line_of_sight(&self, from: Point, to: Point) -> bool {
        self.fog.has_line_of_sight(from, to, |p| self.blocks_sight(p))
    }

    pub fn is_in_vision(&self, x: i32, y: i32) -> bool {
        self.fog
            .is_in_vision(Point::new(x, y), self.player, |p| self.blocks_sight(p))
    }

    pub fn visibility(&self, x: i32, y: i32) -> Visibility {
        self.fog
            .visibility(Point::new(x, y), self.player, |p| self.blocks_sight(p))
    }

    pub fn terrain_at(&self, x: i32, y: i32) -> CellView {
        if !self.bounds().contains(x, y) {
            return CellView::unknown(x, y);
        }
        let artifacts = self.context.artifacts();
        let tag = self.classified.tag_at(x, y);
        let feature = self.feature_at(x, y);
        let deer = self.deer.deer_at(Point::new(x, y));

        let mut symbol = self.ground_symbol(x, y, tag);
        match feature.map(|f| f.kind) {
            Some(TreeKind::Trunk) => symbol = TRUNK_SYMBOL,
            Some(TreeKind::Canopy) => symbol = CANOPY_SYMBOL,
            None => {}
        }
        // Canopy hides whatever stands beneath it
        let under_canopy = feature.is_some_and(|f| f.kind == TreeKind::Canopy);
        if deer.is_some() && !under_canopy {
            symbol = DEER_SYMBOL;
        }

        let visibility = self.visibility(x, y);
        CellView {
            x,
            y,
            tag,
            symbol,
            feature,
            deer: deer.map(|d| d.id),
            deer_state: deer.map(|d| d.state),
            elevation: artifacts
                .elevation
                .as_ref()
                .and_then(|e| e.height_at(x, y))
                .unwrap_or(0.0),
            rock_type: artifacts.geology.as_ref().and_then(|g| g.rock_type_at(x, y)),
            explored: self.fog.is_explored(x, y),
            visible: visibility == Visibility::Visible,
        }
    }

    /// River glyph on river tiles, otherwise the terrain symbol.
    fn ground_symbol(&self, x: i32, y: i32, tag: TerrainTag) -> char {
        self.context
            .artifacts()
            .hydrology
            .as_ref()
            .and_then(|h| h.river_tile_at(x, y))
            .map_or(tag.symbol(), |t| t.glyph)
    }

    /// In bounds, not water and not a trunk.
    pub fn can_move_to(&self, x: i32, y: i32) -> bool {
        self.classified.tag_at(x, y).is_walkable()
            && !self.feature_at(x, y).is_some_and(|f| f.blocks_movement())
    }

    /// Record a completed player step: update exploration and let nearby deer
    /// react before returning.
    pub fn on_player_moved(&mut self, x: i32, y: i32) {
        let player = Point::new(x, y);
        self.player = player;
        self.explore_from_player();

        let view = TerrainView {
            classified: &self.classified,
            trees: self.context.artifacts().trees.as_ref(),
            placed: &self.placed,
            player: Some(player),
        };
        self.deer.on_player_moved(player, self.now, &view);
    }

    /// Face `dir` without stepping. The new cone is explored immediately.
    pub fn turn(&mut self, dir: Direction) {
        self.fog.set_facing(dir);
        self.explore_from_player();
    }

    fn explore_from_player(&mut self) {
        let placed = &self.placed;
        let trees = self.context.artifacts().trees.as_ref();
        let blocks = |p: Point| {
            placed
                .feature_at(p.x, p.y)
                .or_else(|| trees.and_then(|t| t.feature_at(p.x, p.y)))
                .is_some_and(|f| f.blocks_sight())
        };
        self.fog.update_exploration(self.player, blocks);
    }

    /// Advance the clock; the deer scheduler runs when its interval has passed.
    pub fn tick(&mut self, now_ms: u64) {
        self.now = self.now.max(now_ms);
        let view = TerrainView {
            classified: &self.classified,
            trees: self.context.artifacts().trees.as_ref(),
            placed: &self.placed,
            player: Some(self.player),
        };
        self.deer.tick(self.now, &view);
    }

    /// Turn towards `dir` and step if the target cell permits it.
    pub fn apply_move(&mut self, dir: Direction) -> MoveOutcome {
        let from = self.player;
        let facing_before = self.fog.facing();
        self.fog.set_facing(dir);
        let target = from.step(dir);
        let moved = self.can_move_to(target.x, target.y);
        if moved {
            self.on_player_moved(target.x, target.y);
        } else {
            self.explore_from_player();
        }
        MoveOutcome {
            from,
            to: if moved { target } else { from },
            facing_before,
            facing_after: dir,
            moved,
        }
    }

    /// Undo an [`apply_move`](Self::apply_move).
    pub fn inverse_move(&mut self, outcome: &MoveOutcome) {
        self.fog.set_facing(outcome.facing_before);
        if outcome.moved && self.player == outcome.to {
            self.on_player_moved(outcome.from.x, outcome.from.y);
        } else {
            self.explore_from_player();
        }
    }

    /// Put a single tree feature on the map. Trunks are never overwritten by
    /// canopy. Returns whether the cell changed.
    pub fn place_feature(&mut self, x: i32, y: i32, feature: TreeFeature) -> bool {
        let p = Point::new(x, y);
        if !self.bounds().contains_point(p) {
            return false;
        }
        if feature.kind == TreeKind::Canopy && self.feature_at(x, y).is_some_and(|f| f.kind == TreeKind::Trunk) {
            return false;
        }
        self.placed.insert_feature(p, feature)
    }

    /// Draw the viewport. Hidden cells become fog, explored cells are drawn
    /// without deer.
    pub fn render_view<B: BufferAdapter + ?Sized>(&self, buffer: &mut B, viewport: Viewport, player: Point) {
        buffer.begin(viewport);
        for row in 0..viewport.height {
            for column in 0..viewport.width {
                let x = viewport.x + column as i32;
                let y = viewport.y + row as i32;
                let glyph = self.glyph_at(x, y, player);
                buffer.put(column, row, glyph);
            }
        }
    }

    fn glyph_at(&self, x: i32, y: i32, player: Point) -> Glyph {
        let p = Point::new(x, y);
        if p == player {
            return Glyph {
                symbol: PLAYER_SYMBOL,
                class: "player",
                visibility: Visibility::Visible,
            };
        }
        let visibility = self
            .fog
            .visibility(p, player, |c| self.blocks_sight(c));
        if visibility == Visibility::Hidden || !self.bounds().contains_point(p) {
            return Glyph {
                symbol: FOG_SYMBOL,
                class: "fog",
                visibility: Visibility::Hidden,
            };
        }

        let cell = self.terrain_at(x, y);
        let under_canopy = cell.feature.is_some_and(|f| f.kind == TreeKind::Canopy);
        let deer_shown = cell.deer.is_some() && visibility == Visibility::Visible && !under_canopy;
        let (symbol, class) = match cell.feature.map(|f| f.kind) {
            _ if deer_shown => (DEER_SYMBOL, "deer"),
            Some(TreeKind::Trunk) => (TRUNK_SYMBOL, "trunk"),
            Some(TreeKind::Canopy) => (CANOPY_SYMBOL, "canopy"),
            None => (self.ground_symbol(x, y, cell.tag), cell.tag.class_name()),
        };
        Glyph { symbol, class, visibility }
    }

    /// Regenerate every module, optionally with a new seed. Deer, scripted
    /// features and exploration are reset.
    pub fn regenerate_all(&mut self, seed: Option<u64>) -> Result<()> {
        if let Some(seed) = seed {
            self.config.world.seed = seed;
        }
        let mut context = WorldContext::with_default_modules(&self.config)?;
        context.generate()?;
        self.context = context;
        self.placed = TreeField::default();
        self.refresh_after_generation();
        self.log_stats();
        Ok(())
    }

    /// Rebuild one module and its dependents from the current configuration;
    /// upstream artifacts are untouched.
    pub fn regenerate_module(&mut self, kind: ModuleKind) -> Result<()> {
        if !self.context.is_registered(kind) {
            return Err(WorldError::UnknownModule(kind));
        }
        let affected = self.context.downstream_of(kind);
        let rebuilt: Vec<ModuleKind> = self
            .context
            .order()
            .iter()
            .copied()
            .filter(|k| affected.contains(k))
            .collect();
        for k in rebuilt {
            self.context
                .replace_module(TerrainLayer::from_config(k, &self.config))?;
        }
        self.context.regenerate_module(kind)?;
        self.refresh_after_generation();
        self.log_stats();
        Ok(())
    }

    pub fn regenerate_module_named(&mut self, name: &str) -> Result<()> {
        self.regenerate_module(ModuleKind::from_name(name)?)
    }

    fn refresh_after_generation(&mut self) {
        self.classified = ClassifiedMap::build(self.context.artifacts(), self.bounds());
        self.fog = FogOfWar::new(self.config.fog.clone());
        self.deer.params = self.config.deer.clone();
        self.reset_population();
    }

    /// Place the player on the walkable cell nearest the centre, then respawn deer.
    fn reset_population(&mut self) {
        let bounds = self.bounds();
        let center = bounds.center();
        self.player = self.nearest_open(center).unwrap_or(center);

        self.deer.reset(self.context.seeds().fauna);
        let view = TerrainView {
            classified: &self.classified,
            trees: self.context.artifacts().trees.as_ref(),
            placed: &self.placed,
            player: Some(self.player),
        };
        self.deer.spawn_herds(&view, bounds, Some(self.player), self.now);

        let player = self.player;
        self.on_player_moved(player.x, player.y);
        debug!(player = ?self.player, deer = self.deer.len(), "population reset");
    }

    fn nearest_open(&self, from: Point) -> Option<Point> {
        let bounds = self.bounds();
        let max_ring = bounds.width().max(bounds.height()) as i32;
        for ring in 0..=max_ring {
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let p = from.offset(dx, dy);
                    if self.can_move_to(p.x, p.y) {
                        return Some(p);
                    }
                }
            }
        }
        None
    }

    pub fn stats(&self) -> WorldStats {
        let artifacts = self.context.artifacts();
        let bounds = self.bounds();
        let formations = |kind| {
            artifacts
                .geology
                .as_ref()
                .map_or(0, |g| g.formation_count(kind))
        };
        let hydrology = artifacts.hydrology.as_ref();
        WorldStats {
            seed: self.config.world.seed,
            width: bounds.width(),
            height: bounds.height(),
            granite_intrusions: formations(FormationKind::GraniteIntrusion),
            limestone_beds: formations(FormationKind::LimestoneBed),
            clay_deposits: formations(FormationKind::ClayDeposit),
            springs: hydrology.map_or(0, |h| h.springs.len()),
            rivers: hydrology.map_or(0, |h| h.rivers.len()),
            lakes: hydrology.map_or(0, |h| h.lakes.len()),
            longest_river: hydrology.map_or(0, |h| h.longest_river()),
            confluences: hydrology.map_or(0, |h| {
                h.rivers.iter().map(|r| r.confluences.len()).sum::<usize>() / 2
            }),
            trees: artifacts.trees.as_ref().map_or(0, |t| t.len()),
            deer: self.deer.len(),
            explored: self.fog.explored_count(),
        }
    }

    fn log_stats(&self) {
        let s = self.stats();
        info!(
            seed = s.seed,
            rivers = s.rivers,
            lakes = s.lakes,
            trees = s.trees,
            deer = s.deer,
            "world ready"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small bare world: no water and no trees.
    fn dry_config(seed: u64) -> GameConfig {
        let mut config = GameConfig::with_seed(seed);
        config.world.region_size = 64;
        config.hydrology.spring_count = 0;
        config.hydrology.lake_count = 0;
        config.trees.max_trees = 0;
        config
    }

    struct Grid {
        cells: Vec<Vec<char>>,
    }

    impl BufferAdapter for Grid {
        fn begin(&mut self, viewport: Viewport) {
            self.cells = vec![vec!['?'; viewport.width]; viewport.height];
        }
        fn put(&mut self, column: usize, row: usize, glyph: Glyph) {
            self.cells[row][column] = glyph.symbol;
        }
    }

    #[test]
    fn test_out_of_bounds_is_unknown() {
        let core = Core::new(dry_config(3)).unwrap();
        let cell = core.terrain_at(10_000, 0);
        assert_eq!(cell, CellView::unknown(10_000, 0));
        assert!(!core.can_move_to(10_000, 0));
    }

    #[test]
    fn test_trunk_blocks_canopy_does_not() {
        let mut core = Core::new(dry_config(4)).unwrap();
        assert!(core.place_feature(10, 10, TreeFeature::trunk(900, 10, 10)));
        assert!(core.place_feature(10, 11, TreeFeature::canopy(900, 10, 10)));
        assert!(!core.place_feature(10, 10, TreeFeature::canopy(901, 9, 9)));
        assert!(!core.can_move_to(10, 10));
        assert!(core.can_move_to(10, 11));
        assert!(!core.has_line_of_sight(Point::new(9, 10), Point::new(11, 10)));
    }

    #[test]
    fn test_blocked_move_still_turns() {
        let mut core = Core::new(dry_config(5)).unwrap();
        let p = core.player();
        let east = p.step(Direction::E);
        core.place_feature(east.x, east.y, TreeFeature::trunk(77, east.x, east.y));
        let outcome = core.apply_move(Direction::E);
        assert!(!outcome.moved);
        assert_eq!(core.player(), p);
        assert_eq!(core.fog().facing(), Direction::E);

        core.inverse_move(&outcome);
        assert_eq!(core.fog().facing(), outcome.facing_before);
    }

    #[test]
    fn test_move_and_undo() {
        let mut core = Core::new(dry_config(6)).unwrap();
        let start = core.player();
        let dir = Direction::ALL
            .into_iter()
            .find(|d| {
                let t = start.step(*d);
                core.can_move_to(t.x, t.y)
            })
            .unwrap();
        let outcome = core.apply_move(dir);
        assert!(outcome.moved);
        assert_eq!(core.player(), start.step(dir));
        core.inverse_move(&outcome);
        assert_eq!(core.player(), start);
    }

    #[test]
    fn test_render_marks_player_and_fog() {
        let core = Core::new(dry_config(7)).unwrap();
        let mut grid = Grid { cells: Vec::new() };
        let player = core.player();
        let viewport = Viewport::centered_on(player, 61, 41);
        core.render_view(&mut grid, viewport, player);
        assert_eq!(grid.cells[20][30], PLAYER_SYMBOL);
        // Far corner is neither seen nor explored
        assert_eq!(grid.cells[40][0], FOG_SYMBOL);
    }

    #[test]
    fn test_deer_spawned_on_walkable_cells() {
        let core = Core::new(dry_config(8)).unwrap();
        assert!(!core.deer().is_empty());
        for deer in core.deer().iter() {
            assert!(core.can_move_to(deer.position.x, deer.position.y));
            assert_ne!(deer.position, core.player());
        }
    }

    #[test]
    fn test_regenerate_all_resets_exploration() {
        let mut core = Core::new(dry_config(9)).unwrap();
        let before = core.stats();
        core.regenerate_all(Some(10)).unwrap();
        let after = core.stats();
        assert_eq!(after.seed, 10);
        assert_ne!(before.seed, after.seed);
        // Only the start position has been explored
        assert!(core.fog().explored_count() > 0);
        assert!(core.fog().is_explored(core.player().x, core.player().y));
    }

    #[test]
    fn test_blocked_move_still_explores_new_cone() {
        let mut core = Core::new(dry_config(5)).unwrap();
        let p = core.player();
        core.turn(Direction::W);
        let blocker = p.step(Direction::E);
        assert!(core.place_feature(blocker.x, blocker.y, TreeFeature::trunk(99, blocker.x, blocker.y)));

        let ahead = p.offset(6, 6);
        assert!(!core.fog().is_explored(ahead.x, ahead.y));

        let outcome = core.apply_move(Direction::E);
        assert!(!outcome.moved);
        assert_eq!(core.fog().facing(), Direction::E);
        assert!(core.fog().is_explored(ahead.x, ahead.y));
        for dy in -12..=12 {
            for dx in -12..=12 {
                let c = p.offset(dx, dy);
                if core.is_in_vision(c.x, c.y) {
                    assert!(core.fog().is_explored(c.x, c.y), "{:?} visible but unexplored", c);
                }
            }
        }
    }

    #[test]
    fn test_turn_in_place_explores() {
        let mut core = Core::new(dry_config(5)).unwrap();
        let p = core.player();
        let behind = p.offset(0, 10);
        assert_eq!(core.visibility(behind.x, behind.y), Visibility::Hidden);

        core.turn(Direction::S);
        assert_eq!(core.player(), p);
        assert!(core.fog().is_explored(behind.x, behind.y));

        core.turn(Direction::N);
        assert_ne!(core.visibility(behind.x, behind.y), Visibility::Hidden);
    }

    #[test]
    fn test_regenerate_module_rebuilds_dependents_from_config() {
        let mut config = dry_config(8);
        config.trees.max_trees = 200;
        let mut core = Core::new(config).unwrap();
        let geology = core.context().artifacts().geology.clone();
        assert!(!core.context().artifacts().trees.as_ref().unwrap().is_empty());

        core.config_mut().trees.max_trees = 0;
        core.regenerate_module(ModuleKind::Hydrology).unwrap();

        let trees = core.context().artifacts().trees.as_ref().unwrap();
        assert!(trees.is_empty(), "trees kept stale parameters");
        assert_eq!(core.context().artifacts().geology, geology);
    }
}
