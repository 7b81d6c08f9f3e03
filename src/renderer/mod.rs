pub mod frame_source;
pub mod playback;
pub mod surface;
