mod error;
mod ops;
mod renderer;
mod types;
mod ui;

use eframe::egui;
use gstreamer as gst;
use rfd::{MessageDialog, MessageLevel};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::ops::video_funcs::check_ffmpeg_installation;
use crate::types::settings::Settings;
use crate::ui::app::{APP_TITLE, TrimmerApp};

fn install_hint() -> &'static str {
    if cfg!(target_os = "windows") {
        "Download it from https://ffmpeg.org/download.html"
    } else if cfg!(target_os = "macos") {
        "Install it with: brew install ffmpeg"
    } else {
        "Install it with your package manager, e.g. sudo apt-get install ffmpeg"
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sitg_trimmer=info")),
        )
        .init();

    if let Err(err) = gst::init() {
        error!(%err, "failed to initialize GStreamer");
        MessageDialog::new()
            .set_level(MessageLevel::Error)
            .set_title(APP_TITLE)
            .set_description(format!("GStreamer could not be initialized: {err}"))
            .show();
        return Ok(());
    }

    if !check_ffmpeg_installation() {
        warn!("ffmpeg not found in PATH");
        MessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title("FFmpeg Not Found")
            .set_description(format!(
                "FFmpeg is required to process videos but was not found on your system.\n{}",
                install_hint()
            ))
            .show();
    }

    let settings = Settings::load();
    info!(?settings, "starting");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size(settings.window_size)
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        APP_TITLE,
        native_options,
        Box::new(|_cc| Ok(Box::new(TrimmerApp::new(settings)))),
    )
}
