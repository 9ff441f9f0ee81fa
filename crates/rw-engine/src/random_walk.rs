//! The single-walker step algorithm shared by every worker thread.

use crate::rng::Rng;
use crate::world::{Pos, World, WorldKind};

#[derive(Debug, Clone, Copy)]
pub struct MoveProbs {
    pub up: f64,
    pub down: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl MoveProbs {
    /// Cumulative threshold over all four directions; a non-positive value
    /// means the distribution is degenerate and no direction can be picked.
    fn c4(&self) -> f64 {
        self.up + self.down + self.left + self.right
    }

    /// Pick a direction from cumulative thresholds scaled by `c4`, given
    /// `u` drawn uniformly over `[0,1)`.
    fn pick(&self, u: f64, c4: f64) -> Dir {
        let r = u * c4;
        let t1 = self.up;
        let t2 = t1 + self.down;
        let t3 = t2 + self.left;
        if r < t1 {
            Dir::Up
        } else if r < t2 {
            Dir::Down
        } else if r < t3 {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

fn step_delta(dir: Dir) -> (i32, i32) {
    match dir {
        Dir::Up => (0, -1),
        Dir::Down => (0, 1),
        Dir::Left => (-1, 0),
        Dir::Right => (1, 0),
    }
}

/// Outcome of one complete random walk.
#[derive(Debug, Clone, Copy)]
pub struct WalkOutcome {
    pub steps_taken: u64,
    pub succeeded: bool,
}

/// Run a single random walk of up to `k_max_steps` steps starting at
/// `origin`, returning the number of steps taken and whether the walker
/// returned to `origin` within the budget.
///
/// A starting cell that is out of bounds or itself an obstacle takes zero
/// steps and never succeeds: there is nothing to simulate from there. A
/// walk that starts at the origin is already home and succeeds in zero
/// steps. A degenerate distribution (thresholds summing to zero or less)
/// can't pick a direction, so the walk exhausts its budget without moving.
pub fn run_walk(world: &World, origin: Pos, probs: MoveProbs, k_max_steps: u32, rng: &mut Rng) -> WalkOutcome {
    if !world.in_bounds(origin.x, origin.y) || world.is_obstacle_xy(origin.x, origin.y) {
        return WalkOutcome { steps_taken: 0, succeeded: false };
    }
    if origin == (Pos { x: 0, y: 0 }) {
        return WalkOutcome { steps_taken: 0, succeeded: true };
    }

    let c4 = probs.c4();
    if c4 <= 0.0 {
        return WalkOutcome { steps_taken: k_max_steps as u64, succeeded: false };
    }

    let mut pos = origin;
    for step in 1..=k_max_steps {
        let dir = probs.pick(rng.next_f64(), c4);
        let (dx, dy) = step_delta(dir);
        let candidate = Pos { x: pos.x + dx, y: pos.y + dy };

        let next = match world.kind {
            WorldKind::Wrap => world.wrap_pos(candidate),
            WorldKind::Obstacles => candidate,
        };

        if world.kind == WorldKind::Obstacles
            && (!world.in_bounds(next.x, next.y) || world.is_obstacle_xy(next.x, next.y))
        {
            // blocked or off the grid: stay in place, the step still counts
        } else {
            pos = next;
        }

        if pos == origin {
            return WalkOutcome { steps_taken: step as u64, succeeded: true };
        }
    }

    WalkOutcome { steps_taken: k_max_steps as u64, succeeded: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldSize;

    fn even_probs() -> MoveProbs {
        MoveProbs { up: 0.25, down: 0.25, left: 0.25, right: 0.25 }
    }

    #[test]
    fn obstacle_origin_never_walks() {
        let mut world = World::new(WorldKind::Obstacles, WorldSize { width: 4, height: 4 }).unwrap();
        world.set_obstacle(1, 1, true);
        let mut rng = Rng::new(1);
        let outcome = run_walk(&world, Pos { x: 1, y: 1 }, even_probs(), 10, &mut rng);
        assert_eq!(outcome.steps_taken, 0);
        assert!(!outcome.succeeded);
    }

    #[test]
    fn out_of_bounds_origin_never_walks() {
        let world = World::new(WorldKind::Wrap, WorldSize { width: 4, height: 4 }).unwrap();
        let mut rng = Rng::new(1);
        let outcome = run_walk(&world, Pos { x: 9, y: 9 }, even_probs(), 10, &mut rng);
        assert_eq!(outcome.steps_taken, 0);
    }

    #[test]
    fn wrap_world_never_exceeds_step_budget() {
        let world = World::new(WorldKind::Wrap, WorldSize { width: 3, height: 3 }).unwrap();
        let mut rng = Rng::new(99);
        let outcome = run_walk(&world, Pos { x: 1, y: 1 }, even_probs(), 50, &mut rng);
        assert!(outcome.steps_taken <= 50);
    }

    #[test]
    fn origin_start_succeeds_in_zero_steps() {
        let world = World::new(WorldKind::Wrap, WorldSize { width: 4, height: 4 }).unwrap();
        let mut rng = Rng::new(1);
        let outcome = run_walk(&world, Pos { x: 0, y: 0 }, even_probs(), 10, &mut rng);
        assert_eq!(outcome.steps_taken, 0);
        assert!(outcome.succeeded);
    }

    #[test]
    fn degenerate_probabilities_exhaust_budget_without_success() {
        let world = World::new(WorldKind::Wrap, WorldSize { width: 4, height: 4 }).unwrap();
        let mut rng = Rng::new(1);
        let zero_probs = MoveProbs { up: 0.0, down: 0.0, left: 0.0, right: 0.0 };
        let outcome = run_walk(&world, Pos { x: 1, y: 1 }, zero_probs, 7, &mut rng);
        assert_eq!(outcome.steps_taken, 7);
        assert!(!outcome.succeeded);
    }

    #[test]
    fn deterministic_given_same_rng_seed() {
        let world = World::new(WorldKind::Wrap, WorldSize { width: 5, height: 5 }).unwrap();
        let mut rng_a = Rng::new(7);
        let mut rng_b = Rng::new(7);
        let a = run_walk(&world, Pos { x: 2, y: 2 }, even_probs(), 20, &mut rng_a);
        let b = run_walk(&world, Pos { x: 2, y: 2 }, even_probs(), 20, &mut rng_b);
        assert_eq!(a.steps_taken, b.steps_taken);
        assert_eq!(a.succeeded, b.succeeded);
    }
}
