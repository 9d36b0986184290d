//! Deer types and core data structures

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Unique identifier for a deer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeerId(pub u32);

/// Herd a deer was spawned with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HerdId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeerState {
    Wandering,
    Alert,
    Fleeing,
}

impl DeerState {
    pub fn name(self) -> &'static str {
        match self {
            DeerState::Wandering => "wandering",
            DeerState::Alert => "alert",
            DeerState::Fleeing => "fleeing",
        }
    }
}

/// Out-of-band reaction to player movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Panic,
    StartFleeing,
    Alert,
}

impl ReactionKind {
    pub fn priority(self) -> u8 {
        match self {
            ReactionKind::Panic => 100,
            ReactionKind::StartFleeing => 90,
            ReactionKind::Alert => 80,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub kind: ReactionKind,
    /// Player position that triggered the reaction
    pub threat: Point,
    pub queued_at: u64,
}

/// Bounded priority buffer of pending reactions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionQueue {
    items: Vec<Reaction>,
}

impl ReactionQueue {
    pub const CAPACITY: usize = 3;

    /// Queue a reaction. A pending reaction of the same kind is refreshed;
    /// when full, the lowest priority entry is evicted if the new one outranks it.
    pub fn push(&mut self, reaction: Reaction) -> bool {
        if let Some(existing) = self.items.iter_mut().find(|r| r.kind == reaction.kind) {
            *existing = reaction;
            return true;
        }
        if self.items.len() < Self::CAPACITY {
            self.items.push(reaction);
            return true;
        }
        let lowest = self
            .items
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| r.kind.priority())
            .map(|(i, r)| (i, r.kind.priority()));
        match lowest {
            Some((i, priority)) if priority < reaction.kind.priority() => {
                self.items[i] = reaction;
                true
            }
            _ => false,
        }
    }

    /// Remove and return the highest priority reaction.
    pub fn pop(&mut self) -> Option<Reaction> {
        let best = self
            .items
            .iter()
            .enumerate()
            .max_by_key(|(_, r)| r.kind.priority())
            .map(|(i, _)| i)?;
        Some(self.items.remove(best))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Last confirmed sighting of the player.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerMemory {
    pub position: Point,
    pub seen_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deer {
    pub id: DeerId,
    pub herd: HerdId,
    pub position: Point,
    pub state: DeerState,
    /// Time the current state was entered (ms)
    pub state_since: u64,
    pub last_move_time: u64,
    pub reactions: ReactionQueue,
    pub memory: Option<PlayerMemory>,
    /// Player position at the previous reaction check
    pub last_observed_player: Option<Point>,
    /// Unit escape direction of the last flee step
    pub flee_vector: (f32, f32),
    pub wander_target: Option<Point>,
    pub wander_until: u64,
}

impl Deer {
    pub fn new(id: DeerId, herd: HerdId, position: Point, now: u64) -> Self {
        Deer {
            id,
            herd,
            position,
            state: DeerState::Wandering,
            state_since: now,
            last_move_time: now,
            reactions: ReactionQueue::default(),
            memory: None,
            last_observed_player: None,
            flee_vector: (0.0, 0.0),
            wander_target: None,
            wander_until: now,
        }
    }

    /// Switch state, restarting the state timer only on an actual change.
    pub fn set_state(&mut self, state: DeerState, now: u64) {
        if self.state != state {
            self.state = state;
            self.state_since = now;
        }
    }

    pub fn state_elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.state_since)
    }

    /// Remembered player position, if still fresh.
    pub fn remembered_player(&self, now: u64, memory_time: u64) -> Option<Point> {
        self.memory
            .filter(|m| now.saturating_sub(m.seen_at) <= memory_time)
            .map(|m| m.position)
    }
}
