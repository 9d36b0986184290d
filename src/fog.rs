//! Fog of war
//!
//! A cell is visible when it is within `vision_radius` of the player, or
//! within `forward_vision_range` and inside the cone around the facing
//! direction, and nothing on the line between blocks sight. Every visible
//! cell, plus everything within `explored_radius`, joins the explored set.

use std::collections::HashSet;
use std::f32::consts::PI;

use serde::Serialize;

use crate::config::FogConfig;
use crate::geometry::{line, Direction, Point};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Never seen
    Hidden,
    /// Seen before, not in view now
    Explored,
    Visible,
}

#[derive(Clone, Debug)]
pub struct FogOfWar {
    params: FogConfig,
    facing: Direction,
    explored: HashSet<Point>,
}

impl FogOfWar {
    pub fn new(params: FogConfig) -> Self {
        Self {
            facing: params.facing,
            params,
            explored: HashSet::new(),
        }
    }

    pub fn params(&self) -> &FogConfig {
        &self.params
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn set_facing(&mut self, facing: Direction) {
        self.facing = facing;
    }

    pub fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.params.enabled = enabled;
    }

    pub fn is_explored(&self, x: i32, y: i32) -> bool {
        self.explored.contains(&Point::new(x, y))
    }

    pub fn explored_count(&self) -> usize {
        self.explored.len()
    }

    pub fn clear_exploration(&mut self) {
        self.explored.clear();
    }

    /// Whether no intermediate cell between `from` and `to` blocks sight.
    /// Endpoints never block, and the result is symmetric.
    pub fn has_line_of_sight<B>(&self, from: Point, to: Point, blocks: B) -> bool
    where
        B: Fn(Point) -> bool,
    {
        let cells = line(from, to);
        let inner = cells.len().saturating_sub(1);
        cells.iter().take(inner).skip(1).all(|&c| !blocks(c))
    }

    /// Whether `target` is inside the disk or the forward cone and not occluded.
    pub fn is_in_vision<B>(&self, target: Point, player: Point, blocks: B) -> bool
    where
        B: Fn(Point) -> bool,
    {
        let distance = player.distance(target);
        if distance <= self.params.vision_radius {
            return self.has_line_of_sight(player, target, blocks);
        }
        if distance <= self.params.forward_vision_range && self.in_cone(target, player) {
            return self.has_line_of_sight(player, target, blocks);
        }
        false
    }

    fn in_cone(&self, target: Point, player: Point) -> bool {
        if self.params.cone_angle >= 360.0 {
            return true;
        }
        let half = (self.params.cone_angle * 0.5).to_radians();
        let dx = (target.x - player.x) as f32;
        let dy = (target.y - player.y) as f32;
        let (fx, fy) = self.facing.unit();
        let diff = (dy.atan2(dx) - fy.atan2(fx) + PI).rem_euclid(2.0 * PI) - PI;
        diff.abs() <= half + 1e-4
    }

    /// Add the explored disk and every visible cell around `player`.
    pub fn update_exploration<B>(&mut self, player: Point, blocks: B)
    where
        B: Fn(Point) -> bool,
    {
        let explored_r = self.params.explored_radius.max(0.0);
        let reach = self
            .params
            .vision_radius
            .max(self.params.forward_vision_range)
            .max(explored_r)
            .ceil() as i32;

        let mut seen = Vec::new();
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let p = player.offset(dx, dy);
                if player.distance(p) <= explored_r || self.is_in_vision(p, player, &blocks) {
                    seen.push(p);
                }
            }
        }
        self.explored.extend(seen);
    }

    /// Fog state of a cell. With fog disabled every cell is visible.
    pub fn visibility<B>(&self, target: Point, player: Point, blocks: B) -> Visibility
    where
        B: Fn(Point) -> bool,
    {
        if !self.params.enabled || self.is_in_vision(target, player, blocks) {
            Visibility::Visible
        } else if self.explored.contains(&target) {
            Visibility::Explored
        } else {
            Visibility::Hidden
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fog(vision: f32, forward: f32, cone: f32) -> FogOfWar {
        FogOfWar::new(FogConfig {
            enabled: true,
            vision_radius: vision,
            forward_vision_range: forward,
            explored_radius: 2.0,
            cone_angle: cone,
            facing: Direction::N,
        })
    }

    fn open(_: Point) -> bool {
        false
    }

    #[test]
    fn test_forward_cone() {
        let fog = fog(3.0, 12.0, 150.0);
        let player = Point::new(15, 15);
        assert!(fog.is_in_vision(Point::new(15, 5), player, open));
        assert!(!fog.is_in_vision(Point::new(25, 15), player, open));
        // Behind the player, beyond the disk
        assert!(!fog.is_in_vision(Point::new(15, 20), player, open));
        // Inside the disk, any direction
        assert!(fog.is_in_vision(Point::new(15, 17), player, open));
    }

    #[test]
    fn test_full_cone_is_disk() {
        let fog = fog(1.0, 8.0, 360.0);
        let player = Point::new(0, 0);
        for dy in -10..=10 {
            for dx in -10..=10 {
                let p = Point::new(dx, dy);
                let expected = player.distance(p) <= 8.0;
                assert_eq!(fog.is_in_vision(p, player, open), expected, "cell {:?}", p);
            }
        }
    }

    #[test]
    fn test_line_of_sight_symmetric() {
        let fog = fog(3.0, 12.0, 150.0);
        let wall = |p: Point| p.x == 3 && p.y >= 0;
        let pairs = [
            (Point::new(0, 0), Point::new(7, 2)),
            (Point::new(1, 5), Point::new(6, -3)),
            (Point::new(-2, 1), Point::new(2, 9)),
        ];
        for (a, b) in pairs {
            assert_eq!(
                fog.has_line_of_sight(a, b, wall),
                fog.has_line_of_sight(b, a, wall),
                "asymmetric between {:?} and {:?}",
                a,
                b
            );
        }
    }

    #[test]
    fn test_endpoints_never_block() {
        let fog = fog(3.0, 12.0, 150.0);
        let all = |_: Point| true;
        assert!(fog.has_line_of_sight(Point::new(0, 0), Point::new(1, 1), all));
        assert!(!fog.has_line_of_sight(Point::new(0, 0), Point::new(2, 0), all));
    }

    #[test]
    fn test_exploration_grows_and_clears() {
        let mut fog = fog(3.0, 6.0, 90.0);
        fog.update_exploration(Point::new(0, 0), open);
        let first = fog.explored_count();
        assert!(first > 0);
        fog.update_exploration(Point::new(4, 0), open);
        assert!(fog.explored_count() >= first);
        assert!(fog.is_explored(0, 0));

        assert_eq!(fog.visibility(Point::new(4, -2), Point::new(4, 0), open), Visibility::Visible);
        assert_eq!(fog.visibility(Point::new(0, -6), Point::new(40, 40), open), Visibility::Explored);
        assert_eq!(fog.visibility(Point::new(90, 90), Point::new(40, 40), open), Visibility::Hidden);

        fog.clear_exploration();
        assert_eq!(fog.explored_count(), 0);
    }

    #[test]
    fn test_disabled_fog_shows_everything() {
        let mut fog = fog(1.0, 2.0, 90.0);
        fog.set_enabled(false);
        assert_eq!(fog.visibility(Point::new(50, 50), Point::new(0, 0), open), Visibility::Visible);
    }
}
