use std::path::Path;

use eframe::egui;
use eframe::egui::load::SizedTexture;
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::error::{Result, TrimError};
use crate::renderer::frame_source::{FrameDecoder, discover_metadata};
use crate::renderer::playback::PlaybackClock;
use crate::types::media::{MediaSource, VideoMetadata};

/// Preview panel for the loaded video. Decodes single frames on request and
/// steps through them while playing.
pub struct VideoPlayer {
    metadata: Option<VideoMetadata>,
    decoder: Option<FrameDecoder>,
    pub clock: PlaybackClock,
    /// Decoded frame not yet uploaded to the GPU.
    pending: Option<RgbaImage>,
    texture: Option<egui::TextureHandle>,
}

impl VideoPlayer {
    pub fn new() -> Self {
        Self {
            metadata: None,
            decoder: None,
            clock: PlaybackClock::new(),
            pending: None,
            texture: None,
        }
    }

    pub fn load_video(&mut self, path: &Path) -> Result<&VideoMetadata> {
        let metadata = discover_metadata(path)?;
        let decoder = FrameDecoder::open(&metadata)?;

        self.decoder = Some(decoder);
        self.clock.state.reset();
        self.pending = None;
        self.texture = None;
        info!(path = %path.display(), frames = metadata.total_frames, "video loaded");
        self.metadata = Some(metadata);

        if !self.show_frame(0) {
            warn!("first frame could not be shown");
        }
        self.metadata.as_ref().ok_or(TrimError::NoVideoLoaded)
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn fps(&self) -> f64 {
        self.metadata.as_ref().map(|m| m.fps).unwrap_or(0.0)
    }

    pub fn total_frames(&self) -> u64 {
        self.metadata.as_ref().map(|m| m.total_frames).unwrap_or(0)
    }

    pub fn current_time(&self) -> f64 {
        self.time_from_frame(self.current_frame_index())
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn toggle_playback(&mut self) {
        if !self.is_loaded() {
            return;
        }
        // Playing from the last frame starts over.
        if !self.clock.is_playing() && self.current_frame_index() + 1 >= self.total_frames() {
            self.show_frame(0);
        }
        self.clock.toggle();
    }

    /// Moves `delta` frames from the current one, stopping at either end.
    pub fn step(&mut self, delta: i64) -> bool {
        let Some(last) = self.metadata.as_ref().map(VideoMetadata::last_frame) else {
            return false;
        };
        let target = self
            .current_frame_index()
            .saturating_add_signed(delta)
            .min(last);
        if target == self.current_frame_index() {
            return false;
        }
        self.clock.pause();
        self.show_frame(target)
    }

    /// Advances playback. Returns true when a new frame was shown.
    pub fn tick(&mut self) -> bool {
        if !self.clock.is_playing() {
            return false;
        }
        let Some(last) = self.metadata.as_ref().map(VideoMetadata::last_frame) else {
            self.clock.pause();
            return false;
        };
        let due = self.clock.advance(self.fps());
        if due == 0 {
            return false;
        }
        let target = self.current_frame_index().saturating_add(due).min(last);
        if target == last {
            debug!("playback reached the end");
            self.clock.pause();
        }
        self.show_frame(target)
    }

    fn upload_texture(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.pending.take() else {
            return;
        };
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture("preview_frame", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    pub fn show(&mut self, ui: &mut egui::Ui) {
        self.upload_texture(ui.ctx());
        let available = ui.available_size();
        ui.centered_and_justified(|ui| match &self.texture {
            Some(texture) => {
                let [w, h] = texture.size();
                let scale = (available.x / w as f32).min(available.y / h as f32).max(0.0);
                let size = egui::vec2(w as f32 * scale, h as f32 * scale);
                ui.add(egui::Image::new(SizedTexture::new(texture.id(), size)));
            }
            None => {
                ui.label("Open a video to start marking segments");
            }
        });
    }
}

impl Default for VideoPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSource for VideoPlayer {
    fn duration(&self) -> f64 {
        self.metadata.as_ref().map(|m| m.duration).unwrap_or(0.0)
    }

    fn current_frame_index(&self) -> u64 {
        self.clock.state.current_frame
    }

    fn time_from_frame(&self, frame: u64) -> f64 {
        self.metadata
            .as_ref()
            .map(|m| m.time_from_frame(frame))
            .unwrap_or(0.0)
    }

    fn frame_at_time(&self, time: f64) -> u64 {
        self.metadata
            .as_ref()
            .map(|m| m.frame_at_time(time))
            .unwrap_or(0)
    }

    fn show_frame(&mut self, frame: u64) -> bool {
        let (Some(metadata), Some(decoder)) = (&self.metadata, &mut self.decoder) else {
            return false;
        };
        if !metadata.contains_frame(frame) {
            debug!(frame, total = metadata.total_frames, "frame out of range");
            return false;
        }
        match decoder.frame(frame) {
            Ok(image) => {
                self.pending = Some(image);
                self.clock.state.current_frame = frame;
                true
            }
            Err(err) => {
                warn!(%err, "could not show frame");
                false
            }
        }
    }
}
