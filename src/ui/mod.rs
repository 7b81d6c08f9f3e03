pub mod app;
pub mod segment_timeline;
pub mod video_player;
