use crate::geometry::{snap_to_grid, Direction, Rect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveResolution {
    pub position: Vec2,
    pub blocked_x: bool,
    pub blocked_y: bool,
}

/// Scales a raw input vector to a per-tick displacement: normalized to unit
/// length first so diagonals are not faster, then multiplied by
/// `speed * dt`. A zero vector stays zero.
pub fn normalized_step(input: Vec2, speed: f32, dt: f32) -> Vec2 {
    input.normalized_or_zero() * (speed * dt)
}

/// Applies `delta` one axis at a time, X first.
///
/// Each axis is tried with the bounding rectangle translated along that axis
/// only. A blocked axis discards its delta and snaps the coordinate down to
/// the tile grid; the Y probe uses the already-resolved X, so an entity
/// blocked on one axis still slides along the other.
pub fn resolve_axis_separated(
    position: Vec2,
    size: Vec2,
    delta: Vec2,
    mut collides: impl FnMut(Rect) -> bool,
) -> MoveResolution {
    let mut resolved = position;

    let probe_x = Rect::at(Vec2::new(resolved.x + delta.x, resolved.y), size);
    let blocked_x = collides(probe_x);
    if blocked_x {
        resolved.x = snap_to_grid(resolved.x);
    } else {
        resolved.x += delta.x;
    }

    let probe_y = Rect::at(Vec2::new(resolved.x, resolved.y + delta.y), size);
    let blocked_y = collides(probe_y);
    if blocked_y {
        resolved.y = snap_to_grid(resolved.y);
    } else {
        resolved.y += delta.y;
    }

    MoveResolution {
        position: resolved,
        blocked_x,
        blocked_y,
    }
}

/// Facing implied by raw input signs, horizontal taking precedence.
/// Returns `None` when there is no input or the facing would not change.
pub fn facing_transition(current: Direction, raw_x: i32, raw_y: i32) -> Option<Direction> {
    let desired = if raw_x > 0 {
        Direction::Right
    } else if raw_x < 0 {
        Direction::Left
    } else if raw_y > 0 {
        Direction::Down
    } else if raw_y < 0 {
        Direction::Up
    } else {
        return None;
    };
    (desired != current).then_some(desired)
}

/// Bounded step toward `target`: the whole remaining delta on any axis whose
/// distance fits in `speed * dt`, otherwise the normalized share of the step.
pub fn bounded_step_toward(current: Vec2, target: Vec2, speed: f32, dt: f32) -> Vec2 {
    let dx = target.x - current.x;
    let dy = target.y - current.y;
    let distance = (dx * dx + dy * dy).sqrt();
    if distance <= 0.0 {
        return Vec2::ZERO;
    }
    let step = speed * dt;
    let inv_distance = distance.recip();
    Vec2 {
        x: if dx.abs() <= step {
            dx
        } else {
            dx * inv_distance * step
        },
        y: if dy.abs() <= step {
            dy
        } else {
            dy * inv_distance * step
        },
    }
}
