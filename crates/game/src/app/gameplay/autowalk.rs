use std::collections::VecDeque;

use engine::{bounded_step_toward, Rect, TileCoord};

use super::entities::{Entity, Player, PLAYER_SPEED};

const ARRIVAL_EPSILON: f32 = 1.0;

/// Moves the player tile by tile along a precomputed path, with the same
/// axis-separated collision resolution as manual movement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutowalkFollower {
    path: VecDeque<TileCoord>,
    is_navigating: bool,
    goal: Option<TileCoord>,
}

impl AutowalkFollower {
    /// Starts following `path`, which must already have its start tile
    /// trimmed. An empty path leaves the follower inactive.
    pub fn start(&mut self, path: Vec<TileCoord>, goal: TileCoord) {
        self.path = path.into();
        self.is_navigating = !self.path.is_empty();
        self.goal = self.is_navigating.then_some(goal);
    }

    /// Hands control back to manual movement. Returns whether a walk was in
    /// progress.
    pub fn interrupt(&mut self) -> bool {
        let was_navigating = self.is_navigating;
        self.path.clear();
        self.is_navigating = false;
        self.goal = None;
        was_navigating
    }

    pub fn is_navigating(&self) -> bool {
        self.is_navigating
    }

    pub fn goal(&self) -> Option<TileCoord> {
        self.goal
    }

    pub fn remaining(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.path.iter().copied()
    }

    pub fn remaining_len(&self) -> usize {
        self.path.len()
    }

    /// One tick of path following. Only `static_collides` is consulted, so
    /// an entity that steps into the path mid-walk does not stop the player.
    pub fn step(
        &mut self,
        player: &mut Player,
        dt: f32,
        static_collides: impl FnMut(Rect) -> bool,
    ) {
        let Some(next_tile) = self.path.front().copied() else {
            self.finish_if_empty();
            return;
        };
        let target = next_tile.origin();
        let current = player.position();
        if current == target {
            self.pop_waypoint();
            return;
        }

        let delta = bounded_step_toward(current, target, PLAYER_SPEED, dt);
        player.move_by(delta, static_collides);

        let moved = player.position();
        if (moved.x - target.x).abs() < ARRIVAL_EPSILON
            && (moved.y - target.y).abs() < ARRIVAL_EPSILON
        {
            player.set_position(target);
            self.pop_waypoint();
        }
    }

    fn pop_waypoint(&mut self) {
        self.path.pop_front();
        self.finish_if_empty();
    }

    fn finish_if_empty(&mut self) {
        if self.path.is_empty() {
            self.is_navigating = false;
        }
    }
}
