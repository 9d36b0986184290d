//! Deer manager: spawning, scheduling and player-movement fan-out

use std::collections::{BTreeMap, HashMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::config::DeerConfig;
use crate::geometry::{Bounds, Point};

use super::behavior::{away_from, can_see, choose_step, escape_step, flock_blend, towards};
use super::types::{Deer, DeerId, DeerState, HerdId, PlayerMemory, Reaction, ReactionKind};
use super::DeerTerrain;

/// A fleeing deer within this distance alarms wandering peers.
pub const HERD_ALARM_RADIUS: f32 = 12.0;
/// Time an alert deer watches before deciding to flee or relax (ms).
pub const ALERT_DECISION_TIME: u64 = 600;
/// Minimum flight time once out of range (ms).
pub const MIN_FLEE_TIME: u64 = 3000;

const LAZY_WANDER_CHANCE: f32 = 0.05;
const HERD_SPREAD: i32 = 3;
const WANDER_RADIUS: i32 = 8;
const SPAWN_ATTEMPTS: usize = 50;

/// Manager for all deer in the region
#[derive(Clone, Debug)]
pub struct DeerManager {
    pub params: DeerConfig,
    /// Ordered by id so every pass visits deer in the same order
    deer: BTreeMap<DeerId, Deer>,
    /// Spatial index: cell -> deer
    occupancy: HashMap<Point, DeerId>,
    next_id: u32,
    next_herd: u32,
    player: Option<Point>,
    last_tick: Option<u64>,
    rng: ChaCha8Rng,
}

impl DeerManager {
    pub fn new(params: DeerConfig, seed: u64) -> Self {
        DeerManager {
            params,
            deer: BTreeMap::new(),
            occupancy: HashMap::new(),
            next_id: 0,
            next_herd: 0,
            player: None,
            last_tick: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.deer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deer.is_empty()
    }

    pub fn get(&self, id: DeerId) -> Option<&Deer> {
        self.deer.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deer> {
        self.deer.values()
    }

    pub fn deer_at(&self, p: Point) -> Option<&Deer> {
        self.occupancy.get(&p).and_then(|id| self.deer.get(id))
    }

    pub fn player(&self) -> Option<Point> {
        self.player
    }

    pub fn count_in(&self, state: DeerState) -> usize {
        self.deer.values().filter(|d| d.state == state).count()
    }

    /// Remove every deer and reseed.
    pub fn reset(&mut self, seed: u64) {
        self.deer.clear();
        self.occupancy.clear();
        self.next_id = 0;
        self.next_herd = 0;
        self.player = None;
        self.last_tick = None;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Place a single deer. Fails if the cell is taken.
    pub fn spawn(&mut self, position: Point, herd: HerdId, now: u64) -> Option<DeerId> {
        if self.occupancy.contains_key(&position) {
            return None;
        }
        let id = DeerId(self.next_id);
        self.next_id += 1;
        self.deer.insert(id, Deer::new(id, herd, position, now));
        self.occupancy.insert(position, id);
        Some(id)
    }

    pub fn new_herd(&mut self) -> HerdId {
        let herd = HerdId(self.next_herd);
        self.next_herd += 1;
        herd
    }

    /// Spawn up to `max_deer_count` deer in herds of `herd_size`, keeping herd
    /// centres out of the player's detection radius around `avoid`.
    pub fn spawn_herds<T: DeerTerrain + ?Sized>(
        &mut self,
        terrain: &T,
        bounds: Bounds,
        avoid: Option<Point>,
        now: u64,
    ) -> usize {
        let total = self.params.max_deer_count as usize;
        let herd_size = self.params.herd_size.max(1) as usize;
        let keep_out = self.params.player_detection_radius;
        let mut spawned = 0;

        while spawned < total {
            let mut center = None;
            for _ in 0..SPAWN_ATTEMPTS {
                let c = Point::new(
                    self.rng.gen_range(bounds.min_x..=bounds.max_x),
                    self.rng.gen_range(bounds.min_y..=bounds.max_y),
                );
                let clear = avoid.map_or(true, |a| a.distance(c) > keep_out);
                if clear && terrain.is_walkable(c) && !self.occupancy.contains_key(&c) {
                    center = Some(c);
                    break;
                }
            }
            let Some(center) = center else {
                break;
            };

            let herd = self.new_herd();
            let members = herd_size.min(total - spawned);
            let mut placed = 0;
            for _ in 0..members * SPAWN_ATTEMPTS {
                if placed >= members {
                    break;
                }
                let c = center.offset(
                    self.rng.gen_range(-HERD_SPREAD..=HERD_SPREAD),
                    self.rng.gen_range(-HERD_SPREAD..=HERD_SPREAD),
                );
                if bounds.contains_point(c) && terrain.is_walkable(c) && self.spawn(c, herd, now).is_some() {
                    placed += 1;
                }
            }
            if placed == 0 {
                break;
            }
            spawned += placed;
        }
        debug!(deer = spawned, herds = self.next_herd, "spawned deer");
        spawned
    }

    /// Fan out a player step to every deer within the detection radius.
    /// Immediate reactions complete before this returns.
    pub fn on_player_moved<T: DeerTerrain + ?Sized>(&mut self, player: Point, now: u64, terrain: &T) {
        self.player = Some(player);
        let radius = self.params.player_detection_radius;
        let near: Vec<DeerId> = self
            .deer
            .values()
            .filter(|d| d.position.distance(player) <= radius)
            .map(|d| d.id)
            .collect();
        for id in near {
            self.react_to_player_movement(id, player, now, terrain);
        }
    }

    /// Queue reactions for one deer and drain the queue.
    pub fn react_to_player_movement<T: DeerTerrain + ?Sized>(
        &mut self,
        id: DeerId,
        player: Point,
        now: u64,
        terrain: &T,
    ) {
        let panic_distance = self.params.panic_distance;
        let alert_range = self.params.alert_range;
        let vision = self.params.vision_range;
        let limit = self.params.max_reactions_per_update;

        let Some(deer) = self.deer.get_mut(&id) else {
            return;
        };
        let d = deer.position.distance(player);
        let sees = can_see(terrain, deer.position, player, vision);
        let moved = deer.last_observed_player != Some(player);
        let approached = deer
            .last_observed_player
            .map_or(true, |prev| d < deer.position.distance(prev));

        let mut pending = Vec::with_capacity(3);
        if d <= panic_distance {
            pending.push(ReactionKind::Panic);
        }
        if sees && d <= alert_range && approached && deer.state != DeerState::Fleeing {
            if deer.state == DeerState::Alert || d <= alert_range * 0.5 {
                pending.push(ReactionKind::StartFleeing);
            }
        }
        if sees && d <= alert_range && moved && deer.state == DeerState::Wandering {
            pending.push(ReactionKind::Alert);
        }

        for kind in pending {
            deer.reactions.push(Reaction { kind, threat: player, queued_at: now });
        }
        deer.last_observed_player = Some(player);
        if sees || d <= panic_distance {
            deer.memory = Some(PlayerMemory { position: player, seen_at: now });
        }

        self.process_reactions(id, now, terrain, limit);
    }

    /// Drain up to `limit` reactions, highest priority first.
    pub fn process_reactions<T: DeerTerrain + ?Sized>(
        &mut self,
        id: DeerId,
        now: u64,
        terrain: &T,
        limit: usize,
    ) -> usize {
        let mut handled = 0;
        while handled < limit {
            let Some(reaction) = self.deer.get_mut(&id).and_then(|d| d.reactions.pop()) else {
                break;
            };
            handled += 1;
            match reaction.kind {
                ReactionKind::Panic => {
                    self.set_state(id, DeerState::Fleeing, now);
                    self.flee_step(id, reaction.threat, now, terrain, true);
                }
                ReactionKind::StartFleeing => self.set_state(id, DeerState::Fleeing, now),
                ReactionKind::Alert => {
                    if self.deer.get(&id).map(|d| d.state) == Some(DeerState::Wandering) {
                        self.set_state(id, DeerState::Alert, now);
                    }
                }
            }
        }
        handled
    }

    /// Scheduler entry point. Runs at most once per `update_interval`;
    /// returns whether a pass happened.
    pub fn tick<T: DeerTerrain + ?Sized>(&mut self, now: u64, terrain: &T) -> bool {
        if let Some(last) = self.last_tick {
            if now.saturating_sub(last) < self.params.update_interval {
                return false;
            }
        }
        self.last_tick = Some(now);

        let limit = self.params.max_reactions_per_update;
        let ids: Vec<DeerId> = self.deer.keys().copied().collect();
        for id in ids {
            self.process_reactions(id, now, terrain, limit);
            self.update_deer(id, now, terrain);
        }
        true
    }

    fn update_deer<T: DeerTerrain + ?Sized>(&mut self, id: DeerId, now: u64, terrain: &T) {
        let Some(deer) = self.deer.get(&id) else {
            return;
        };
        let pos = deer.position;
        let state = deer.state;
        let elapsed = deer.state_elapsed(now);
        let since_move = now.saturating_sub(deer.last_move_time);
        let memory = deer.remembered_player(now, self.params.player_memory_time);

        let player = self
            .player
            .filter(|p| p.distance(pos) <= self.params.player_detection_radius);
        let Some(player) = player else {
            // Out of range: states wind down and movement is lazy
            match state {
                DeerState::Fleeing if elapsed >= MIN_FLEE_TIME => {
                    self.set_state(id, DeerState::Wandering, now)
                }
                DeerState::Alert if elapsed >= ALERT_DECISION_TIME => {
                    self.set_state(id, DeerState::Wandering, now)
                }
                _ => {}
            }
            if self.rng.gen::<f32>() < LAZY_WANDER_CHANCE {
                self.refresh_wander_target(id, now);
                self.wander_step(id, now, terrain);
            }
            return;
        };

        let d = pos.distance(player);
        let sees = can_see(terrain, pos, player, self.params.vision_range);
        if sees {
            if let Some(deer) = self.deer.get_mut(&id) {
                deer.memory = Some(PlayerMemory { position: player, seen_at: now });
            }
        }
        let alert_range = self.params.alert_range;

        match state {
            DeerState::Wandering => {
                if sees && d <= alert_range {
                    self.set_state(id, DeerState::Alert, now);
                } else if self.peer_fleeing_near(id, pos) {
                    self.set_state(id, DeerState::Alert, now);
                } else if since_move >= self.params.base_move_interval {
                    self.wander(id, now, terrain);
                }
            }
            DeerState::Alert => {
                if elapsed >= ALERT_DECISION_TIME {
                    let next = if sees && d <= alert_range {
                        DeerState::Fleeing
                    } else {
                        DeerState::Wandering
                    };
                    self.set_state(id, next, now);
                } else if sees && since_move >= self.params.alert_move_interval {
                    // Wary sidestep away from the player
                    let desired = away_from(pos, player);
                    if let Some(to) = choose_step(terrain, &self.occupancy, pos, desired) {
                        self.move_deer(id, to, now);
                    }
                }
            }
            DeerState::Fleeing => {
                let done = elapsed >= self.params.max_flee_time
                    || (d >= self.params.flee_distance && elapsed >= MIN_FLEE_TIME);
                if done {
                    self.set_state(id, DeerState::Wandering, now);
                    if let Some(deer) = self.deer.get_mut(&id) {
                        deer.flee_vector = (0.0, 0.0);
                    }
                } else if since_move >= self.params.flee_move_interval {
                    let threat = if sees { Some(player) } else { memory };
                    match threat {
                        Some(t) => self.flee_step(id, t, now, terrain, false),
                        None => self.momentum_step(id, now, terrain),
                    }
                }
            }
        }
    }

    /// Escape direction away from `threat`, blended with fleeing neighbours.
    fn flee_direction(&self, id: DeerId, threat: Point) -> (f32, f32) {
        let Some(deer) = self.deer.get(&id) else {
            return (0.0, 0.0);
        };
        let own = away_from(deer.position, threat);
        let radius = self.params.flock_radius;
        let peers: Vec<(f32, f32)> = self
            .deer
            .values()
            .filter(|o| o.id != id && o.state == DeerState::Fleeing)
            .filter(|o| o.position.distance(deer.position) <= radius)
            .filter(|o| o.flee_vector != (0.0, 0.0))
            .map(|o| o.flee_vector)
            .collect();
        flock_blend(own, &peers, self.params.flock_strength)
    }

    /// One step that strictly increases the distance from `threat`. Panic
    /// steps reset the move clock even when every neighbour is blocked.
    fn flee_step<T: DeerTerrain + ?Sized>(
        &mut self,
        id: DeerId,
        threat: Point,
        now: u64,
        terrain: &T,
        panic: bool,
    ) {
        let desired = self.flee_direction(id, threat);
        let Some(pos) = self.deer.get(&id).map(|d| d.position) else {
            return;
        };
        match escape_step(terrain, &self.occupancy, pos, threat, desired) {
            Some(to) => self.move_deer(id, to, now),
            None => trace!(deer = id.0, "cornered"),
        }
        if let Some(deer) = self.deer.get_mut(&id) {
            deer.flee_vector = desired;
            if panic {
                deer.last_move_time = now;
            }
        }
    }

    /// Keep running along the last escape vector once the player is forgotten.
    fn momentum_step<T: DeerTerrain + ?Sized>(&mut self, id: DeerId, now: u64, terrain: &T) {
        let Some((pos, vector)) = self.deer.get(&id).map(|d| (d.position, d.flee_vector)) else {
            return;
        };
        if let Some(to) = choose_step(terrain, &self.occupancy, pos, vector) {
            self.move_deer(id, to, now);
        }
    }

    fn wander<T: DeerTerrain + ?Sized>(&mut self, id: DeerId, now: u64, terrain: &T) {
        let Some(deer) = self.deer.get(&id) else {
            return;
        };
        let stale = now >= deer.wander_until
            || deer.wander_target.map_or(true, |t| t == deer.position);
        if stale {
            self.refresh_wander_target(id, now);
        }
        let roll = self.rng.gen::<f32>();
        if let Some(deer) = self.deer.get_mut(&id) {
            deer.last_move_time = now;
        }
        if roll < self.params.wander_move_chance {
            self.wander_step(id, now, terrain);
        }
    }

    /// New wander target near the herd centroid.
    fn refresh_wander_target(&mut self, id: DeerId, now: u64) {
        let Some(herd) = self.deer.get(&id).map(|d| d.herd) else {
            return;
        };
        let (sx, sy, n) = self
            .deer
            .values()
            .filter(|d| d.herd == herd)
            .fold((0i64, 0i64, 0i64), |(sx, sy, n), d| {
                (sx + d.position.x as i64, sy + d.position.y as i64, n + 1)
            });
        let centroid = Point::new((sx / n.max(1)) as i32, (sy / n.max(1)) as i32);
        let target = centroid.offset(
            self.rng.gen_range(-WANDER_RADIUS..=WANDER_RADIUS),
            self.rng.gen_range(-WANDER_RADIUS..=WANDER_RADIUS),
        );
        let duration = self.params.wander_duration;
        if let Some(deer) = self.deer.get_mut(&id) {
            deer.wander_target = Some(target);
            deer.wander_until = now + duration;
        }
    }

    fn wander_step<T: DeerTerrain + ?Sized>(&mut self, id: DeerId, now: u64, terrain: &T) {
        let Some((pos, target)) = self
            .deer
            .get(&id)
            .and_then(|d| d.wander_target.map(|t| (d.position, t)))
        else {
            return;
        };
        if let Some(to) = choose_step(terrain, &self.occupancy, pos, towards(pos, target)) {
            self.move_deer(id, to, now);
        }
    }

    fn peer_fleeing_near(&self, id: DeerId, pos: Point) -> bool {
        self.deer.values().any(|o| {
            o.id != id && o.state == DeerState::Fleeing && o.position.distance(pos) <= HERD_ALARM_RADIUS
        })
    }

    fn set_state(&mut self, id: DeerId, state: DeerState, now: u64) {
        if let Some(deer) = self.deer.get_mut(&id) {
            if deer.state != state {
                trace!(deer = id.0, from = deer.state.name(), to = state.name(), "deer state");
            }
            deer.set_state(state, now);
        }
    }

    fn move_deer(&mut self, id: DeerId, to: Point, now: u64) {
        let Some(deer) = self.deer.get_mut(&id) else {
            return;
        };
        debug_assert!(
            !self.occupancy.contains_key(&to),
            "deer {:?} moving onto occupied cell {:?}",
            id,
            to
        );
        self.occupancy.remove(&deer.position);
        self.occupancy.insert(to, id);
        deer.position = to;
        deer.last_move_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Meadow(Bounds);

    impl DeerTerrain for Meadow {
        fn is_walkable(&self, p: Point) -> bool {
            self.0.contains_point(p)
        }
        fn blocks_sight(&self, _: Point) -> bool {
            false
        }
    }

    fn meadow() -> Meadow {
        Meadow(Bounds::centered(0, 0, 100))
    }

    #[test]
    fn test_spawn_herds_unique_cells() {
        let terrain = meadow();
        let mut manager = DeerManager::new(DeerConfig::default(), 7);
        let n = manager.spawn_herds(&terrain, terrain.0, Some(Point::new(0, 0)), 0);
        assert_eq!(n, 12);
        let mut cells: Vec<Point> = manager.iter().map(|d| d.position).collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), 12, "two deer share a cell");
        for deer in manager.iter() {
            assert!(deer.position.distance(Point::new(0, 0)) > 20.0);
        }
    }

    #[test]
    fn test_panic_steps_away_immediately() {
        let terrain = meadow();
        let mut manager = DeerManager::new(DeerConfig::default(), 1);
        let herd = manager.new_herd();
        let id = manager.spawn(Point::new(20, 20), herd, 0).unwrap();
        manager.on_player_moved(Point::new(17, 20), 100, &terrain);
        let deer = manager.get(id).unwrap();
        assert_eq!(deer.state, DeerState::Fleeing);
        assert!(deer.position.distance_sq(Point::new(17, 20)) > 9, "deer at {:?}", deer.position);
        assert_eq!(deer.last_move_time, 100);
    }

    #[test]
    fn test_alert_then_flee_when_player_stays() {
        let terrain = meadow();
        let mut manager = DeerManager::new(DeerConfig::default(), 2);
        let herd = manager.new_herd();
        let id = manager.spawn(Point::new(0, 0), herd, 0).unwrap();
        manager.on_player_moved(Point::new(0, 8), 0, &terrain);
        assert_eq!(manager.get(id).unwrap().state, DeerState::Alert);

        manager.tick(700, &terrain);
        assert_eq!(manager.get(id).unwrap().state, DeerState::Fleeing);
    }

    #[test]
    fn test_alert_relaxes_when_player_leaves() {
        let terrain = meadow();
        let mut manager = DeerManager::new(DeerConfig::default(), 3);
        let herd = manager.new_herd();
        let id = manager.spawn(Point::new(0, 0), herd, 0).unwrap();
        manager.on_player_moved(Point::new(0, 8), 0, &terrain);
        manager.on_player_moved(Point::new(0, 20), 100, &terrain);
        manager.tick(700, &terrain);
        assert_eq!(manager.get(id).unwrap().state, DeerState::Wandering);
    }

    #[test]
    fn test_fleeing_peer_alarms_herd() {
        let terrain = meadow();
        let mut manager = DeerManager::new(DeerConfig::default(), 4);
        let herd = manager.new_herd();
        let runner = manager.spawn(Point::new(0, 0), herd, 0).unwrap();
        let calm = manager.spawn(Point::new(10, 0), herd, 0).unwrap();
        manager.set_state(runner, DeerState::Fleeing, 0);
        // Player inside the detection radius but out of sight range of the calm deer
        manager.player = Some(Point::new(10, 24));
        manager.tick(0, &terrain);
        assert_eq!(manager.get(calm).unwrap().state, DeerState::Alert);
    }

    #[test]
    fn test_tick_respects_interval() {
        let terrain = meadow();
        let mut manager = DeerManager::new(DeerConfig::default(), 5);
        assert!(manager.tick(0, &terrain));
        assert!(!manager.tick(150, &terrain));
        assert!(manager.tick(200, &terrain));
    }

    #[test]
    fn test_flee_ends_after_max_time() {
        let terrain = meadow();
        let mut manager = DeerManager::new(DeerConfig::default(), 6);
        let herd = manager.new_herd();
        let id = manager.spawn(Point::new(0, 0), herd, 0).unwrap();
        manager.on_player_moved(Point::new(2, 0), 0, &terrain);
        assert_eq!(manager.get(id).unwrap().state, DeerState::Fleeing);
        manager.tick(8000, &terrain);
        assert_eq!(manager.get(id).unwrap().state, DeerState::Wandering);
    }

    #[test]
    fn test_occupancy_follows_moves() {
        let terrain = meadow();
        let mut manager = DeerManager::new(DeerConfig::default(), 8);
        let herd = manager.new_herd();
        let id = manager.spawn(Point::new(5, 5), herd, 0).unwrap();
        manager.on_player_moved(Point::new(4, 5), 10, &terrain);
        let pos = manager.get(id).unwrap().position;
        assert_ne!(pos, Point::new(5, 5));
        assert_eq!(manager.deer_at(pos).map(|d| d.id), Some(id));
        assert!(manager.deer_at(Point::new(5, 5)).is_none());
    }
}
