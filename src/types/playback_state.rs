#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub current_frame: u64,
    pub is_playing: bool,
    pub playback_rate: f64,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            current_frame: 0,
            is_playing: false,
            playback_rate: 1.0,
        }
    }

    /// Back to the first frame, paused.
    pub fn reset(&mut self) {
        self.current_frame = 0;
        self.is_playing = false;
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}
