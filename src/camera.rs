// First-person camera state and the per-frame uniform record.
//
// Orientation is rebuilt from scratch every frame: yaw about the vertical
// axis, then pitch about the horizontal axis. Neither angle is clamped.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::input::InputSnapshot;

/// Per-frame shader inputs, copied byte-for-byte into the uniform buffer.
/// Layout must match the uniform block in shaders/scene.vert.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub proj: Mat4,
    /// Eye position, w unused (std140 padding lane)
    pub eye: Vec4,
    pub rotation: Quat,
}

/// Perspective projection with Vulkan's 0..1 depth range.
pub fn projection(width: u32, height: u32) -> Mat4 {
    let aspect = width as f32 / height as f32;
    Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 10.0)
}

pub struct CameraState {
    /// Yaw in radians, unclamped
    pub yaw: f32,
    /// Pitch in radians, unclamped
    pub pitch: f32,
    pub eye: Vec3,
}

impl CameraState {
    pub fn new() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            // Back off from the generated geometry at the origin
            eye: Vec3::new(0.0, 0.0, -2.0),
        }
    }

    /// Current orientation: yaw about Y, then pitch about X. The order is
    /// load-bearing; quaternion composition is not commutative.
    pub fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation() * Vec3::X
    }

    /// Integrate one frame of input.
    ///
    /// Rightward mouse motion decreases yaw (screen-space convention).
    /// Held movement keys compose additively: forward + strafe moves by
    /// the unnormalized vector sum, so diagonal motion is faster than
    /// axis-aligned motion. That is the intended policy, not a bug.
    pub fn update(&mut self, input: &InputSnapshot, move_delta: f32, sensitivity: f32) {
        let Vec2 { x: dx, y: dy } = input.mouse_delta;
        self.yaw -= dx * sensitivity;
        self.pitch += dy * sensitivity;

        let forward = self.forward();
        let right = self.right();
        if input.forward {
            self.eye += forward * move_delta;
        }
        if input.back {
            self.eye -= forward * move_delta;
        }
        if input.strafe_left {
            self.eye -= right * move_delta;
        }
        if input.strafe_right {
            self.eye += right * move_delta;
        }
    }

    pub fn uniforms(&self, proj: Mat4) -> Uniforms {
        Uniforms {
            proj,
            eye: self.eye.extend(0.0),
            rotation: self.orientation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputSnapshot;

    const EPS: f32 = 1e-5;

    fn still() -> InputSnapshot {
        InputSnapshot::default()
    }

    #[test]
    fn no_input_means_no_drift() {
        let mut camera = CameraState::new();
        let start_eye = camera.eye;
        for _ in 0..1000 {
            camera.update(&still(), 0.25, 0.1);
        }
        assert_eq!(camera.eye, start_eye);
        assert_eq!(camera.yaw, 0.0);
        assert_eq!(camera.pitch, 0.0);
    }

    #[test]
    fn mouse_delta_maps_to_yaw_and_pitch_exactly() {
        let mut camera = CameraState::new();
        camera.yaw = 1.5;
        camera.pitch = -0.25;
        let input = InputSnapshot {
            mouse_delta: Vec2::new(3.0, -7.0),
            ..Default::default()
        };
        camera.update(&input, 0.0, 0.1);
        assert!((camera.yaw - (1.5 - 3.0 * 0.1)).abs() < EPS);
        assert!((camera.pitch - (-0.25 + -7.0 * 0.1)).abs() < EPS);
    }

    #[test]
    fn forward_key_moves_along_forward_vector() {
        let mut camera = CameraState::new();
        camera.yaw = 0.8;
        camera.pitch = 0.3;
        let before = camera.eye;
        let expected_dir = camera.forward();
        let input = InputSnapshot {
            forward: true,
            ..Default::default()
        };
        camera.update(&input, 2.5, 0.1);
        assert!(camera.eye.abs_diff_eq(before + expected_dir * 2.5, EPS));
    }

    #[test]
    fn diagonal_movement_is_unnormalized_sum() {
        let mut camera = CameraState::new();
        let before = camera.eye;
        let expected = camera.forward() * 1.0 + camera.right() * 1.0;
        let input = InputSnapshot {
            forward: true,
            strafe_right: true,
            ..Default::default()
        };
        camera.update(&input, 1.0, 0.1);
        let moved = camera.eye - before;
        assert!(moved.abs_diff_eq(expected, EPS));
        // Faster than a single axis move of the same delta
        assert!(moved.length() > 1.0);
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut camera = CameraState::new();
        let before = camera.eye;
        let input = InputSnapshot {
            forward: true,
            back: true,
            ..Default::default()
        };
        camera.update(&input, 5.0, 0.1);
        assert!(camera.eye.abs_diff_eq(before, EPS));
    }

    #[test]
    fn orientation_applies_yaw_then_pitch() {
        let camera = CameraState {
            yaw: 0.4,
            pitch: 0.9,
            eye: Vec3::ZERO,
        };
        let expected = Quat::from_rotation_y(0.4) * Quat::from_rotation_x(0.9);
        assert!(camera.orientation().abs_diff_eq(expected, EPS));
        // Reversed order is a different rotation
        let reversed = Quat::from_rotation_x(0.9) * Quat::from_rotation_y(0.4);
        assert!(!camera.orientation().abs_diff_eq(reversed, EPS));
    }

    #[test]
    fn yaw_half_turn_flips_forward() {
        let camera = CameraState {
            yaw: std::f32::consts::PI,
            pitch: 0.0,
            eye: Vec3::ZERO,
        };
        assert!(camera.forward().abs_diff_eq(-Vec3::Z, EPS));
    }

    #[test]
    fn pitch_is_unclamped() {
        let mut camera = CameraState::new();
        let input = InputSnapshot {
            mouse_delta: Vec2::new(0.0, 100.0),
            ..Default::default()
        };
        for _ in 0..100 {
            camera.update(&input, 0.0, 0.1);
        }
        // 100 frames * 100 counts * 0.1 rad = 1000 rad, far beyond a full turn
        assert!(camera.pitch > 2.0 * std::f32::consts::PI);
    }

    #[test]
    fn uniforms_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 96);
        let camera = CameraState::new();
        let uniforms = camera.uniforms(projection(800, 800));
        let bytes: &[u8] = bytemuck::bytes_of(&uniforms);
        assert_eq!(bytes.len(), 96);
        // Eye starts right after the 64-byte projection matrix
        let eye_z = f32::from_ne_bytes(bytes[72..76].try_into().unwrap());
        assert_eq!(eye_z, -2.0);
    }
}
