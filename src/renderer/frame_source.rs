use std::num::NonZeroUsize;
use std::path::Path;

use gst::prelude::*;
use gst_pbutils::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_pbutils as gst_pbutils;
use gstreamer_video as gst_video;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use lru::LruCache;
use tracing::{debug, info};

use crate::error::{Result, TrimError};
use crate::types::media::VideoMetadata;

/// Largest preview frame kept in memory; bigger sources are scaled down.
pub const PREVIEW_MAX_WIDTH: u32 = 960;
pub const PREVIEW_MAX_HEIGHT: u32 = 540;

const FRAME_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(48).unwrap();

pub fn path_to_file_uri(path: &Path) -> Result<String> {
    let absolute = std::fs::canonicalize(path)?;
    let uri = gst::glib::filename_to_uri(&absolute, None)?;
    Ok(uri.to_string())
}

pub fn fraction_to_fps(numer: i32, denom: i32) -> f64 {
    if numer <= 0 || denom <= 0 {
        return 0.0;
    }
    numer as f64 / denom as f64
}

/// Reads duration, geometry and frame rate with the GStreamer discoverer.
pub fn discover_metadata(path: &Path) -> Result<VideoMetadata> {
    let uri = path_to_file_uri(path)?;
    debug!(%uri, "discovering media");
    let discoverer = gst_pbutils::Discoverer::new(gst::ClockTime::from_seconds(5))?;
    let info = discoverer.discover_uri(&uri)?;

    let duration = info
        .duration()
        .map(|d| d.nseconds() as f64 / 1_000_000_000.0)
        .unwrap_or(0.0);
    let video = info
        .video_streams()
        .into_iter()
        .next()
        .ok_or_else(|| TrimError::Probe {
            path: path.to_path_buf(),
            message: "no video stream found".to_string(),
        })?;
    let framerate = video.framerate();
    let fps = fraction_to_fps(framerate.numer(), framerate.denom());

    let mut metadata = VideoMetadata::new(path, video.width(), video.height(), fps, duration);
    metadata.codec = video
        .caps()
        .and_then(|caps| caps.structure(0).map(|s| s.name().to_string()))
        .unwrap_or_default();
    metadata.has_audio = !info.audio_streams().is_empty();

    info!(
        path = %path.display(),
        width = metadata.width,
        height = metadata.height,
        fps = metadata.fps,
        frames = metadata.total_frames,
        duration = metadata.duration,
        "media discovered"
    );
    Ok(metadata)
}

/// Seeks a paused pipeline to individual frames and hands them back as RGBA.
pub struct FrameDecoder {
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
    fps: f64,
    cache: LruCache<u64, RgbaImage>,
}

impl FrameDecoder {
    pub fn open(metadata: &VideoMetadata) -> Result<Self> {
        let location = metadata.path.to_string_lossy().replace('"', "\\\"");
        let description = format!(
            "filesrc location=\"{location}\" ! decodebin ! videoconvert ! videoscale ! appsink name=sink sync=false"
        );
        let pipeline = gst::parse::launch(&description)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| TrimError::Gstreamer("launch did not produce a pipeline".to_string()))?;
        let sink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| TrimError::Gstreamer("appsink missing from pipeline".to_string()))?;

        let caps = gst_video::VideoCapsBuilder::new()
            .format(gst_video::VideoFormat::Rgba)
            .build();
        sink.set_caps(Some(&caps));
        sink.set_max_buffers(1);
        sink.set_drop(true);

        let decoder = Self {
            pipeline,
            sink,
            fps: metadata.fps,
            cache: LruCache::new(FRAME_CACHE_CAPACITY),
        };
        decoder.pipeline.set_state(gst::State::Paused)?;
        let (result, _, _) = decoder
            .pipeline
            .state(Some(gst::ClockTime::from_seconds(5)));
        result?;
        info!(path = %metadata.path.display(), "decoder ready");
        Ok(decoder)
    }

    /// Decodes `frame`, serving repeats from the cache.
    pub fn frame(&mut self, frame: u64) -> Result<RgbaImage> {
        if let Some(image) = self.cache.get(&frame) {
            return Ok(image.clone());
        }

        let seconds = if self.fps > 0.0 {
            frame as f64 / self.fps
        } else {
            0.0
        };
        let position = gst::ClockTime::from_nseconds((seconds * 1_000_000_000.0) as u64);
        self.pipeline
            .seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE, position)
            .map_err(|err| TrimError::Decode {
                frame,
                message: err.to_string(),
            })?;

        let sample = self
            .sink
            .try_pull_preroll(gst::ClockTime::from_seconds(5))
            .ok_or_else(|| TrimError::Decode {
                frame,
                message: "timed out waiting for preroll".to_string(),
            })?;
        let image = sample_to_image(&sample)
            .map(fit_preview)
            .map_err(|message| TrimError::Decode { frame, message })?;

        debug!(frame, width = image.width(), height = image.height(), "frame decoded");
        self.cache.put(frame, image.clone());
        Ok(image)
    }
}

impl Drop for FrameDecoder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

fn sample_to_image(sample: &gst::Sample) -> std::result::Result<RgbaImage, String> {
    let caps = sample
        .caps()
        .ok_or_else(|| "sample without caps".to_string())?;
    let info = gst_video::VideoInfo::from_caps(caps).map_err(|e| e.to_string())?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| "sample without buffer".to_string())?;
    let map = buffer.map_readable().map_err(|e| e.to_string())?;
    let stride = info.stride()[0] as usize;
    pack_rows(map.as_slice(), info.width(), info.height(), stride)
}

/// Copies padded RGBA rows into a tightly packed image.
fn pack_rows(
    data: &[u8],
    width: u32,
    height: u32,
    stride: usize,
) -> std::result::Result<RgbaImage, String> {
    let row_len = width as usize * 4;
    if stride < row_len || data.len() < stride * (height as usize).saturating_sub(1) + row_len {
        return Err(format!(
            "buffer of {} bytes too small for {width}x{height} with stride {stride}",
            data.len()
        ));
    }
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }
    RgbaImage::from_raw(width, height, pixels).ok_or_else(|| "pixel count mismatch".to_string())
}

/// Size that fits inside the preview bounds while keeping the aspect ratio.
pub fn preview_size(width: u32, height: u32) -> (u32, u32) {
    if width <= PREVIEW_MAX_WIDTH && height <= PREVIEW_MAX_HEIGHT {
        return (width, height);
    }
    let scale = (PREVIEW_MAX_WIDTH as f64 / width as f64).min(PREVIEW_MAX_HEIGHT as f64 / height as f64);
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

fn fit_preview(image: RgbaImage) -> RgbaImage {
    let (width, height) = preview_size(image.width(), image.height());
    if (width, height) == image.dimensions() {
        return image;
    }
    imageops::resize(&image, width, height, FilterType::Triangle)
}
