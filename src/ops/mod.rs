pub mod job;
pub mod segment_ops;
pub mod video_funcs;
