use std::time::{Duration, Instant};

use crate::types::playback_state::PlaybackState;

/// Turns wall-clock time into whole frames while the player is running.
pub struct PlaybackClock {
    pub state: PlaybackState,
    last_update: Instant,
    /// Fraction of a frame carried over between updates.
    carry: f64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::new(),
            last_update: Instant::now(),
            carry: 0.0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn play(&mut self) {
        self.state.is_playing = true;
        self.last_update = Instant::now();
        self.carry = 0.0;
    }

    pub fn pause(&mut self) {
        self.state.is_playing = false;
        self.carry = 0.0;
    }

    pub fn toggle(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Number of frames that became due since the previous call.
    pub fn advance(&mut self, fps: f64) -> u64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update);
        self.last_update = now;
        self.advance_by(elapsed, fps)
    }

    pub fn advance_by(&mut self, elapsed: Duration, fps: f64) -> u64 {
        if !self.state.is_playing || fps <= 0.0 {
            self.carry = 0.0;
            return 0;
        }
        let frames = elapsed.as_secs_f64() * self.state.playback_rate * fps + self.carry;
        let whole = frames.floor();
        self.carry = frames - whole;
        whole as u64
    }

    /// Time until the next frame is due, for repaint scheduling.
    pub fn frame_interval(&self, fps: f64) -> Duration {
        if fps <= 0.0 {
            return Duration::from_millis(33);
        }
        Duration::from_secs_f64(1.0 / (fps * self.state.playback_rate.max(0.01)))
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_clock_produces_no_frames() {
        let mut clock = PlaybackClock::new();
        assert_eq!(clock.advance_by(Duration::from_secs(2), 30.0), 0);
    }

    #[test]
    fn test_elapsed_time_becomes_frames() {
        let mut clock = PlaybackClock::new();
        clock.play();
        assert_eq!(clock.advance_by(Duration::from_millis(500), 10.0), 5);
    }

    #[test]
    fn test_fractional_frames_carry_over() {
        let mut clock = PlaybackClock::new();
        clock.play();
        // Half a frame each time.
        assert_eq!(clock.advance_by(Duration::from_millis(250), 2.0), 0);
        assert_eq!(clock.advance_by(Duration::from_millis(250), 2.0), 1);
    }

    #[test]
    fn test_pause_drops_carry() {
        let mut clock = PlaybackClock::new();
        clock.play();
        clock.advance_by(Duration::from_millis(30), 25.0);
        clock.toggle();
        assert!(!clock.is_playing());
        clock.toggle();
        assert_eq!(clock.advance_by(Duration::from_millis(30), 25.0), 0);
    }

    #[test]
    fn test_zero_fps_never_advances() {
        let mut clock = PlaybackClock::new();
        clock.play();
        assert_eq!(clock.advance_by(Duration::from_secs(5), 0.0), 0);
    }
}
