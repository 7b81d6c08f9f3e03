pub mod marker;
pub mod media;
pub mod playback_state;
pub mod settings;
pub mod timeline;
