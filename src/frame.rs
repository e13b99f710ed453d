// Frame loop control and timing.
//
// The loop itself is driven by the winit message pump; this module owns
// the two pieces with observable semantics: the stop transition carrying
// the process exit code, and the high-resolution frame timer whose
// measurement feeds the next movement delta.

use std::time::Instant;

/// Lifecycle of the frame loop. `Stopped` is terminal; the first stop wins
/// and its code becomes the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Running,
    Stopped(i32),
}

impl LoopControl {
    pub fn stop(&mut self, code: i32) {
        if matches!(self, LoopControl::Running) {
            *self = LoopControl::Stopped(code);
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, LoopControl::Stopped(_))
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            LoopControl::Running => 0,
            LoopControl::Stopped(code) => *code,
        }
    }
}

/// Measures one frame. Started at the top of the iteration, read after
/// present; the measured time drives *this* frame's movement delta, a
/// one-frame latency that is fine for continuous motion.
pub struct FrameTimer {
    start: Instant,
}

impl FrameTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_carries_exit_code() {
        let mut control = LoopControl::Running;
        assert!(!control.is_stopped());
        assert_eq!(control.exit_code(), 0);

        control.stop(42);
        assert!(control.is_stopped());
        assert_eq!(control.exit_code(), 42);
    }

    #[test]
    fn first_stop_wins() {
        let mut control = LoopControl::Running;
        control.stop(42);
        control.stop(7);
        assert_eq!(control.exit_code(), 42);
    }

    #[test]
    fn timer_is_monotonic() {
        let timer = FrameTimer::start();
        let a = timer.elapsed_secs();
        let b = timer.elapsed_secs();
        assert!(a >= 0.0);
        assert!(b >= a);
    }
}
