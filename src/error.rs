use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, TrimError>;

#[derive(Debug, thiserror::Error)]
pub enum TrimError {
    /// An end marker was placed at or before its start marker.
    #[error("end point ({end:.2}s) must be after start point ({start:.2}s)")]
    InvalidEndPoint { start: f64, end: f64 },

    #[error("no video loaded")]
    NoVideoLoaded,

    #[error("no segments marked for removal")]
    NoSegments,

    #[error("no video segments left to keep after removal")]
    NothingToKeep,

    #[error("{tool} is not installed or not found in PATH")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("failed to probe {}: {message}", path.display())]
    Probe { path: PathBuf, message: String },

    #[error("GStreamer error: {0}")]
    Gstreamer(String),

    #[error("failed to decode frame {frame}: {message}")]
    Decode { frame: u64, message: String },

    #[error("processing cancelled by user")]
    Cancelled,

    #[error("output file missing or empty: {}", path.display())]
    EmptyOutput { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrimError {
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Invalid user input that should interrupt with a warning. Everything
    /// else coming out of the timeline is a silent no-op.
    pub fn is_user_warning(&self) -> bool {
        matches!(self, Self::InvalidEndPoint { .. })
    }
}

impl From<gstreamer::glib::Error> for TrimError {
    fn from(err: gstreamer::glib::Error) -> Self {
        Self::Gstreamer(err.to_string())
    }
}

impl From<gstreamer::glib::BoolError> for TrimError {
    fn from(err: gstreamer::glib::BoolError) -> Self {
        Self::Gstreamer(err.to_string())
    }
}

impl From<gstreamer::StateChangeError> for TrimError {
    fn from(err: gstreamer::StateChangeError) -> Self {
        Self::Gstreamer(err.to_string())
    }
}
