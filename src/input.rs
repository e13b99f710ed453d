// Input state owned by the application.
//
// Mouse motion accumulates between frames and is consumed with
// reset-on-read semantics; key state is a map keyed by winit key code,
// so anything outside the tracked keys is simply never consulted.

use glam::Vec2;
use std::collections::HashMap;
use winit::keyboard::KeyCode;

/// Per-frame view of the input devices, taken once per loop iteration.
/// Not retained across frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    pub mouse_delta: Vec2,
    pub forward: bool,
    pub back: bool,
    pub strafe_left: bool,
    pub strafe_right: bool,
}

#[derive(Default)]
pub struct InputState {
    keys: HashMap<KeyCode, bool>,
    mouse_dx: f32,
    mouse_dy: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        self.keys.insert(key, pressed);
    }

    pub fn accumulate_mouse(&mut self, dx: f64, dy: f64) {
        self.mouse_dx += dx as f32;
        self.mouse_dy += dy as f32;
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.keys.get(&key).copied().unwrap_or(false)
    }

    /// Take this frame's snapshot. Resets the accumulated mouse delta.
    pub fn snapshot(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot {
            mouse_delta: Vec2::new(self.mouse_dx, self.mouse_dy),
            forward: self.is_held(KeyCode::KeyW),
            back: self.is_held(KeyCode::KeyS),
            strafe_left: self.is_held(KeyCode::KeyA),
            strafe_right: self.is_held(KeyCode::KeyD),
        };
        self.mouse_dx = 0.0;
        self.mouse_dy = 0.0;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_delta_resets_on_read() {
        let mut input = InputState::new();
        input.accumulate_mouse(3.0, -1.5);
        input.accumulate_mouse(1.0, 0.5);
        let snap = input.snapshot();
        assert_eq!(snap.mouse_delta, Vec2::new(4.0, -1.0));
        let snap = input.snapshot();
        assert_eq!(snap.mouse_delta, Vec2::ZERO);
    }

    #[test]
    fn key_state_tracks_press_and_release() {
        let mut input = InputState::new();
        input.handle_key(KeyCode::KeyW, true);
        input.handle_key(KeyCode::KeyA, true);
        let snap = input.snapshot();
        assert!(snap.forward);
        assert!(snap.strafe_left);
        assert!(!snap.back);

        input.handle_key(KeyCode::KeyW, false);
        let snap = input.snapshot();
        assert!(!snap.forward);
        assert!(snap.strafe_left);
    }

    #[test]
    fn untracked_keys_do_not_affect_movement() {
        let mut input = InputState::new();
        input.handle_key(KeyCode::KeyQ, true);
        input.handle_key(KeyCode::F11, true);
        let snap = input.snapshot();
        assert!(!snap.forward && !snap.back && !snap.strafe_left && !snap.strafe_right);
    }
}
