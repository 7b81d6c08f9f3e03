use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use eframe::egui::{self, Key, Modifiers};
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use tracing::{debug, error, info, warn};

use crate::error::TrimError;
use crate::ops::job::ProcessingJob;
use crate::ops::video_funcs::ProcessRequest;
use crate::renderer::surface::DisplayList;
use crate::types::marker::MarkerKind;
use crate::types::media::MediaSource;
use crate::types::settings::Settings;
use crate::ui::segment_timeline::{SegmentTimeline, TIMELINE_HEIGHT};
use crate::ui::video_player::VideoPlayer;

pub const APP_TITLE: &str = "SITG Video Trimmer";
const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "webm", "wmv", "flv"];

const ABOUT_TEXT: &str = "SITG Video Trimmer\n\n\
Mark segments of a video for removal and write a new file without them, \
either by stream copy or by re-encoding with fades at each cut.\n\n\
Version: 0.1.0";

const HELP_TEXT: &str = "Basic usage:
1. Open a video file (Ctrl+O)
2. Use the timeline to navigate through the video
3. Mark segments to remove:
   - Set start marker (I) at the beginning of a segment
   - Set end marker (O) at the end of the segment
4. Process the video (Ctrl+P) to write a copy without the marked segments

Keyboard shortcuts:
- Ctrl+O: Open video file
- Ctrl+P: Process video
- Space: Play/Pause
- Left/Right: Previous/Next frame
- I: Set start marker
- O: Set end marker
- Delete: Delete selected marker
- Tab / Shift+Tab: Select next/previous marker
- F1: Show this help

Timeline:
- Click the timeline to seek
- Drag markers to adjust them
- The white line is the playhead
- Red areas will be removed
- Green flags mark starts, red flags mark ends

Processing options:
- Fast processing copies streams without re-encoding (no fades)
- Fade duration is the length of the fade at each cut, in seconds";

/// Something the user asked for through a menu, button or shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    OpenVideo,
    ProcessVideo,
    Exit,
    TogglePlay,
    PreviousFrame,
    NextFrame,
    SetStartMarker,
    SetEndMarker,
    DeleteMarker,
    ClearMarkers,
    SelectNextMarker,
    SelectPreviousMarker,
    Help,
    About,
}

/// `HH:MM:SS` for the frame and time counters.
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// `<stem>_trimmed.<ext>` next to the input.
pub fn default_output_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    format!("{stem}_trimmed.{ext}")
}

fn message(level: MessageLevel, title: &str, description: &str) {
    MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(description)
        .set_buttons(MessageButtons::Ok)
        .show();
}

fn confirm(title: &str, description: &str) -> bool {
    MessageDialog::new()
        .set_level(MessageLevel::Info)
        .set_title(title)
        .set_description(description)
        .set_buttons(MessageButtons::YesNo)
        .show()
        == MessageDialogResult::Yes
}

fn open_folder(dir: &Path) {
    let opener = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    if let Err(err) = Command::new(opener).arg(dir).spawn() {
        warn!(%err, dir = %dir.display(), "could not open folder");
    }
}

/// Keyboard shortcuts pressed this frame. Nothing fires while `text_field`
/// is being edited.
fn read_shortcuts(ctx: &egui::Context, text_field: Option<egui::Id>) -> Vec<Action> {
    if text_field.is_some_and(|id| ctx.memory(|m| m.has_focus(id))) {
        return Vec::new();
    }
    let actions = ctx.input_mut(|input| {
        let bindings = [
            (Modifiers::COMMAND, Key::O, Action::OpenVideo),
            (Modifiers::COMMAND, Key::P, Action::ProcessVideo),
            // Shift+Tab before Tab, which would also match it.
            (Modifiers::SHIFT, Key::Tab, Action::SelectPreviousMarker),
            (Modifiers::NONE, Key::Tab, Action::SelectNextMarker),
            (Modifiers::NONE, Key::Space, Action::TogglePlay),
            (Modifiers::NONE, Key::ArrowLeft, Action::PreviousFrame),
            (Modifiers::NONE, Key::ArrowRight, Action::NextFrame),
            (Modifiers::NONE, Key::I, Action::SetStartMarker),
            (Modifiers::NONE, Key::O, Action::SetEndMarker),
            (Modifiers::NONE, Key::Delete, Action::DeleteMarker),
            (Modifiers::NONE, Key::F1, Action::Help),
        ];
        bindings
            .into_iter()
            .filter(|(modifiers, key, _)| input.consume_key(*modifiers, *key))
            .map(|(_, _, action)| action)
            .collect::<Vec<_>>()
    });
    // egui also moves widget focus on Tab. A focused button would swallow
    // Space and hide the following keys, so keep focus off it.
    ctx.memory_mut(|m| {
        if let Some(id) = m.focused() {
            m.surrender_focus(id);
        }
    });
    actions
}

pub struct TrimmerApp {
    settings: Settings,
    player: VideoPlayer,
    strip: SegmentTimeline,
    surface: DisplayList,
    job: Option<ProcessingJob>,
    status: String,
    fade_field: Option<egui::Id>,
}

impl TrimmerApp {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            player: VideoPlayer::new(),
            strip: SegmentTimeline::new(),
            surface: DisplayList::new(0.0, TIMELINE_HEIGHT),
            job: None,
            fade_field: None,
            status: "Open a video to begin".to_string(),
        }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        debug!(status = %self.status, "status");
    }

    fn sync_playhead(&mut self) {
        self.strip
            .update_playhead_position(&mut self.surface, self.player.current_time());
    }

    fn apply(&mut self, ctx: &egui::Context, action: Action) {
        let loaded = self.player.is_loaded();
        match action {
            Action::OpenVideo => self.open_video(ctx),
            Action::ProcessVideo => self.process_video(),
            Action::Exit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
            Action::Help => message(MessageLevel::Info, "SITG Video Trimmer Help", HELP_TEXT),
            Action::About => message(MessageLevel::Info, "About SITG Video Trimmer", ABOUT_TEXT),
            _ if !loaded => {}
            Action::TogglePlay => self.player.toggle_playback(),
            Action::PreviousFrame => {
                if self.player.step(-1) {
                    self.sync_playhead();
                }
            }
            Action::NextFrame => {
                if self.player.step(1) {
                    self.sync_playhead();
                }
            }
            Action::SetStartMarker => self.place_marker(MarkerKind::Start),
            Action::SetEndMarker => self.place_marker(MarkerKind::End),
            Action::DeleteMarker => {
                if self.strip.delete_marker(&mut self.surface, None) {
                    self.set_status("Marker deleted");
                } else {
                    debug!("no marker selected to delete");
                }
            }
            Action::ClearMarkers => {
                self.strip.clear_all_markers(&mut self.surface);
                self.set_status("All markers cleared");
            }
            Action::SelectNextMarker => {
                self.strip
                    .select_next_marker(&mut self.surface, &mut self.player);
            }
            Action::SelectPreviousMarker => {
                self.strip
                    .select_previous_marker(&mut self.surface, &mut self.player);
            }
        }
    }

    /// Adds a marker at the current frame when `wanted` is what the timeline
    /// expects next; otherwise only hints at the other key.
    fn place_marker(&mut self, wanted: MarkerKind) {
        if self.strip.expected_marker() != wanted {
            self.set_status(match wanted {
                MarkerKind::Start => "A segment is open: set its end marker (O) first",
                MarkerKind::End => "Set a start marker (I) first",
            });
            return;
        }
        let time = self.player.current_time();
        match self.strip.add_marker(&mut self.surface, time) {
            Ok(kind) => {
                self.set_status(format!("{} marker set at {}", kind.label(), format_clock(time)));
            }
            Err(err) if err.is_user_warning() => {
                message(MessageLevel::Warning, "Invalid End Point", &err.to_string());
            }
            Err(err) => warn!(%err, "marker not added"),
        }
    }

    fn open_video(&mut self, ctx: &egui::Context) {
        let mut dialog = rfd::FileDialog::new()
            .set_title("Open Video File")
            .add_filter("Video files", &VIDEO_EXTENSIONS)
            .add_filter("All files", &["*"]);
        if let Some(dir) = &self.settings.last_directory {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.pick_file() else {
            return;
        };
        self.load_video(ctx, &path);
    }

    fn load_video(&mut self, ctx: &egui::Context, path: &Path) {
        let name = match self.player.load_video(path) {
            Ok(metadata) => metadata.file_name(),
            Err(err) => {
                error!(%err, path = %path.display(), "failed to load video");
                message(
                    MessageLevel::Error,
                    "Error",
                    &format!("Failed to load video: {err}"),
                );
                return;
            }
        };

        self.settings.last_directory = path.parent().map(Path::to_path_buf);
        self.strip.clear_all_markers(&mut self.surface);
        self.strip.update_canvas_size(&mut self.surface, &self.player);
        self.sync_playhead();
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!("{APP_TITLE} - {name}")));
        self.set_status(format!("Loaded {name}"));
    }

    fn process_video(&mut self) {
        if self.job.is_some() {
            return;
        }
        let Some(input) = self.player.metadata().map(|m| m.path.clone()) else {
            message(MessageLevel::Warning, "No Video", "Please open a video file first.");
            return;
        };
        let segments = self.strip.get_segments_for_export(&self.player);
        if segments.is_empty() {
            message(
                MessageLevel::Warning,
                "No Segments",
                "Please mark at least one segment to remove.",
            );
            return;
        }

        let mut dialog = rfd::FileDialog::new()
            .set_title("Save Processed Video")
            .set_file_name(default_output_name(&input))
            .add_filter("Video files", &VIDEO_EXTENSIONS);
        if let Some(dir) = input.parent() {
            dialog = dialog.set_directory(dir);
        }
        let Some(output) = dialog.save_file() else {
            return;
        };

        self.player.clock.pause();
        let request = ProcessRequest {
            input,
            output,
            segments,
            fade_duration: self.settings.fade_duration,
            fast_mode: self.settings.fast_mode,
        };
        match ProcessingJob::spawn(request) {
            Ok(job) => {
                self.job = Some(job);
                self.set_status("Processing video...");
            }
            Err(err) => {
                error!(%err, "could not start processing");
                message(MessageLevel::Error, "Processing Failed", &err.to_string());
            }
        }
    }

    fn poll_job(&mut self, ctx: &egui::Context) {
        let Some(job) = &mut self.job else {
            return;
        };
        let Some(result) = job.poll() else {
            ctx.request_repaint_after(Duration::from_millis(100));
            return;
        };
        self.job = None;
        self.finish_job(result);
    }

    fn finish_job(&mut self, result: crate::error::Result<PathBuf>) {
        match result {
            Ok(output) => {
                self.settings.save();
                self.set_status(format!("Saved {}", output.display()));
                let open = confirm(
                    "Processing Complete",
                    &format!(
                        "Video processing completed successfully.\n\nOutput saved to: {}\n\n\
                         Would you like to open the output folder?",
                        output.display()
                    ),
                );
                if open {
                    if let Some(dir) = output.parent() {
                        open_folder(dir);
                    }
                }
            }
            Err(TrimError::Cancelled) => {
                self.set_status("Processing cancelled");
                message(
                    MessageLevel::Info,
                    "Processing Cancelled",
                    "Video processing was cancelled.",
                );
            }
            Err(err) => {
                self.set_status("Processing failed");
                message(
                    MessageLevel::Error,
                    "Processing Failed",
                    &format!("An error occurred during video processing.\n\nError: {err}"),
                );
            }
        }
    }

    fn progress_window(&self, ctx: &egui::Context) {
        let Some(job) = &self.job else {
            return;
        };
        egui::Window::new("Processing Video")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.add(egui::Spinner::new());
                    ui.label(if job.is_cancelling() {
                        "Cancelling processing..."
                    } else {
                        "Processing video..."
                    });
                });
                ui.label(format!(
                    "Elapsed: {}",
                    format_clock(job.elapsed().as_secs_f64())
                ));
                if ui
                    .add_enabled(!job.is_cancelling(), egui::Button::new("Cancel"))
                    .clicked()
                {
                    info!(job = %job.id, "cancel requested");
                    job.cancel();
                }
            });
    }

    fn menu_bar(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        let loaded = self.player.is_loaded();
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.add(egui::Button::new("Open Video").shortcut_text("Ctrl+O")).clicked() {
                    actions.push(Action::OpenVideo);
                    ui.close_menu();
                }
                if ui
                    .add_enabled(loaded, egui::Button::new("Process Video").shortcut_text("Ctrl+P"))
                    .clicked()
                {
                    actions.push(Action::ProcessVideo);
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Exit").clicked() {
                    actions.push(Action::Exit);
                    ui.close_menu();
                }
            });
            ui.menu_button("Edit", |ui| {
                ui.add_enabled_ui(loaded, |ui| {
                    let items = [
                        ("Set Start Marker", "I", Action::SetStartMarker),
                        ("Set End Marker", "O", Action::SetEndMarker),
                        ("Delete Selected Marker", "Del", Action::DeleteMarker),
                        ("Clear All Markers", "", Action::ClearMarkers),
                    ];
                    for (label, shortcut, action) in items {
                        if ui
                            .add(egui::Button::new(label).shortcut_text(shortcut))
                            .clicked()
                        {
                            actions.push(action);
                            ui.close_menu();
                        }
                    }
                });
            });
            ui.menu_button("Help", |ui| {
                if ui.add(egui::Button::new("Help").shortcut_text("F1")).clicked() {
                    actions.push(Action::Help);
                    ui.close_menu();
                }
                if ui.button("About").clicked() {
                    actions.push(Action::About);
                    ui.close_menu();
                }
            });
        });
    }

    fn controls(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        let loaded = self.player.is_loaded();

        ui.add_enabled_ui(loaded, |ui| {
            self.strip.show(ui, &mut self.surface, &mut self.player);
        });

        ui.add_enabled_ui(loaded, |ui| {
            ui.horizontal(|ui| {
                let play_label = if self.player.is_playing() { "Pause" } else { "Play" };
                if ui.button(play_label).clicked() {
                    actions.push(Action::TogglePlay);
                }
                if ui.button("◀").clicked() {
                    actions.push(Action::PreviousFrame);
                }
                if ui.button("▶").clicked() {
                    actions.push(Action::NextFrame);
                }
                ui.separator();
                ui.label(format!(
                    "Frame: {} / {}",
                    self.player.current_frame_index(),
                    self.player.total_frames()
                ));
                ui.separator();
                ui.label(format!(
                    "Time: {} / {}",
                    format_clock(self.player.current_time()),
                    format_clock(self.player.duration())
                ));
            });

            ui.horizontal(|ui| {
                let buttons = [
                    ("Set Start Marker (I)", Action::SetStartMarker),
                    ("Set End Marker (O)", Action::SetEndMarker),
                    ("Delete Marker (Del)", Action::DeleteMarker),
                    ("Clear All Markers", Action::ClearMarkers),
                ];
                for (label, action) in buttons {
                    if ui.button(label).clicked() {
                        actions.push(action);
                    }
                }
            });
        });

        ui.group(|ui| {
            ui.label("Processing Options");
            ui.horizontal(|ui| {
                ui.checkbox(&mut self.settings.fast_mode, "Fast Processing (No Fades)");
                ui.separator();
                ui.add_enabled_ui(!self.settings.fast_mode, |ui| {
                    ui.label("Fade Duration (seconds):");
                    let field = ui.add(
                        egui::DragValue::new(&mut self.settings.fade_duration)
                            .speed(0.05)
                            .range(0.0..=10.0)
                            .max_decimals(2),
                    );
                    self.fade_field = Some(field.id);
                });
            });
        });

        ui.horizontal(|ui| {
            if ui.button("Open Video").clicked() {
                actions.push(Action::OpenVideo);
            }
            if ui
                .add_enabled(loaded, egui::Button::new("Process Video"))
                .clicked()
            {
                actions.push(Action::ProcessVideo);
            }
            ui.separator();
            ui.label(&self.status);
        });
    }
}

impl eframe::App for TrimmerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_job(ctx);

        if self.player.tick() {
            self.sync_playhead();
        }
        if self.player.is_playing() {
            ctx.request_repaint_after(self.player.clock.frame_interval(self.player.fps()));
        }

        let busy = self.job.is_some();
        let mut actions = if busy { Vec::new() } else { read_shortcuts(ctx, self.fade_field) };

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            ui.add_enabled_ui(!busy, |ui| self.menu_bar(ui, &mut actions));
        });
        egui::TopBottomPanel::bottom("controls_panel").show(ctx, |ui| {
            ui.add_enabled_ui(!busy, |ui| self.controls(ui, &mut actions));
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.player.show(ui);
        });
        self.progress_window(ctx);

        for action in actions {
            self.apply(ctx, action);
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
                self.settings.window_size = (rect.width(), rect.height());
            }
            self.settings.save();
        }
    }
}
