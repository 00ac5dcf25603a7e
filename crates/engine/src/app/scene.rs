use super::input::{ActionStates, InputAction};
use crate::geometry::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quit_requested(&self) -> bool {
        self.actions.was_pressed(InputAction::Quit)
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// True only on the tick the action went down.
    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.actions.was_pressed(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions.set(action, true);
        self.actions.set_pressed(action, true);
        self
    }

    pub fn has_movement_input(&self) -> bool {
        self.actions.any_movement_down()
    }

    /// Raw movement axes in screen space (`y` grows downward), each in
    /// `-1..=1`.
    pub fn movement_axes(&self) -> (i32, i32) {
        let mut x = 0;
        let mut y = 0;
        if self.is_down(InputAction::MoveLeft) {
            x -= 1;
        }
        if self.is_down(InputAction::MoveRight) {
            x += 1;
        }
        if self.is_down(InputAction::MoveUp) {
            y -= 1;
        }
        if self.is_down(InputAction::MoveDown) {
            y += 1;
        }
        (x, y)
    }

    pub fn movement_vector(&self) -> Vec2 {
        let (x, y) = self.movement_axes();
        Vec2::new(x as f32, y as f32)
    }
}

/// One simulation context driven by the fixed-step loop. `update` runs once
/// per tick and must never block.
pub trait Scene {
    fn load(&mut self);
    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand;
    fn unload(&mut self);
    fn debug_title(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_keys_cancel_out() {
        let input = InputSnapshot::empty()
            .with_action_down(InputAction::MoveLeft, true)
            .with_action_down(InputAction::MoveRight, true)
            .with_action_down(InputAction::MoveDown, true);
        assert_eq!(input.movement_axes(), (0, 1));
        assert!(input.has_movement_input());
    }

    #[test]
    fn press_edge_implies_held() {
        let input = InputSnapshot::empty().with_action_pressed(InputAction::Interact);
        assert!(input.was_pressed(InputAction::Interact));
        assert!(input.is_down(InputAction::Interact));
        assert!(!input.was_pressed(InputAction::Encounter));
        assert!(!input.quit_requested());
    }
}
