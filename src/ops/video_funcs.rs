use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, TrimError};
use crate::ops::segment_ops::{TimeRange, frames_to_time_ranges, kept_ranges};
use crate::types::marker::FrameRange;
use crate::types::media::VideoMetadata;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Upper bound for a re-encode run.
pub const ENCODE_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_LINES: usize = 12;

/// Shared flag the UI flips to stop a running job.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything needed to cut the marked segments out of a video.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Frame ranges to remove, as exported by the timeline.
    pub segments: Vec<FrameRange>,
    /// Fade length in seconds at each cut. Ignored in fast mode.
    pub fade_duration: f64,
    /// Stream copy instead of re-encoding.
    pub fast_mode: bool,
}

/// True when `ffmpeg -version` runs successfully.
pub fn check_ffmpeg_installation() -> bool {
    Command::new(FFMPEG)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parses an ffprobe rational such as `30000/1001`. Zero when malformed.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let Some((num, den)) = rate.split_once('/') else {
        return rate.trim().parse().unwrap_or(0.0);
    };
    match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
        (Ok(num), Ok(den)) if den != 0.0 => num / den,
        _ => 0.0,
    }
}

/// Builds metadata from `ffprobe -print_format json -show_format -show_streams`.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<VideoMetadata> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| TrimError::Probe {
            path: path.to_path_buf(),
            message: "no video stream found".to_string(),
        })?;

    let fps = video
        .r_frame_rate
        .as_deref()
        .map(parse_frame_rate)
        .unwrap_or(0.0);
    let duration = video
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let mut metadata = VideoMetadata::new(
        path,
        video.width.unwrap_or(0),
        video.height.unwrap_or(0),
        fps,
        duration,
    );
    metadata.codec = video.codec_name.clone().unwrap_or_default();
    metadata.has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    Ok(metadata)
}

pub fn probe_video_metadata(path: &Path) -> Result<VideoMetadata> {
    let output = Command::new(FFPROBE)
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|err| spawn_error(FFPROBE, err))?;
    if !output.status.success() {
        return Err(TrimError::Probe {
            path: path.to_path_buf(),
            message: format!("ffprobe exited with {}", output.status),
        });
    }
    let json = String::from_utf8_lossy(&output.stdout);
    parse_ffprobe_json(path, &json)
}

/// Cuts `request.segments` out of the input and writes the remainder to
/// `request.output`. Returns the output path once it exists and is non-empty.
pub fn remove_segments(request: &ProcessRequest, cancel: &CancelFlag) -> Result<PathBuf> {
    if request.segments.is_empty() {
        return Err(TrimError::NoSegments);
    }

    let metadata = probe_video_metadata(&request.input)?;
    let removed = frames_to_time_ranges(&request.segments, metadata.fps);
    let parts: Vec<TimeRange> = kept_ranges(&removed, metadata.duration)
        .into_iter()
        .filter(|part| part.duration() > 0.0)
        .collect();
    if parts.is_empty() {
        return Err(TrimError::NothingToKeep);
    }

    info!(
        input = %request.input.display(),
        output = %request.output.display(),
        removed = removed.len(),
        kept = parts.len(),
        fast_mode = request.fast_mode,
        fade = request.fade_duration,
        "removing segments"
    );

    if request.fast_mode {
        fast_remove(request, &parts, cancel)?;
    } else {
        let graph = quality_filter_graph(&parts, request.fade_duration, metadata.has_audio);
        debug!(%graph, "filter graph");
        let args = quality_args(&request.input, &graph, metadata.has_audio, &request.output);
        run_tool(FFMPEG, &args, cancel, Some(ENCODE_TIMEOUT))?;
    }

    let size = std::fs::metadata(&request.output).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(TrimError::EmptyOutput {
            path: request.output.clone(),
        });
    }
    info!(output = %request.output.display(), bytes = size, "processing finished");
    Ok(request.output.clone())
}

fn fast_remove(request: &ProcessRequest, parts: &[TimeRange], cancel: &CancelFlag) -> Result<()> {
    let work_dir = tempfile::tempdir()?;
    let extension = request
        .input
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());

    let mut part_files = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let part_file = work_dir.path().join(format!("part_{i}.{extension}"));
        debug!(part = i, start = part.start, end = part.end, "extracting part");
        run_tool(
            FFMPEG,
            &extract_part_args(&request.input, part, &part_file),
            cancel,
            None,
        )?;
        check_part(&part_file, i)?;
        part_files.push(part_file);
    }

    let mut list_file = tempfile::NamedTempFile::new_in(work_dir.path())?;
    list_file.write_all(concat_list_contents(&part_files).as_bytes())?;
    list_file.flush()?;

    run_tool(
        FFMPEG,
        &concat_args(list_file.path(), &request.output),
        cancel,
        None,
    )
}

/// An extracted part must exist and hold data before it is concatenated.
fn check_part(part_file: &Path, index: usize) -> Result<()> {
    let size = std::fs::metadata(part_file).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(TrimError::tool_failed(
            FFMPEG,
            format!("part {index} ({}) is missing or empty", part_file.display()),
        ));
    }
    Ok(())
}

fn seconds(t: f64) -> String {
    format!("{t:.3}")
}

pub fn extract_part_args(input: &Path, part: &TimeRange, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-ss".into(), seconds(part.start).into(), "-i".into()];
    args.push(input.into());
    args.extend(
        [
            "-t".to_string(),
            seconds(part.duration()),
            "-c".to_string(),
            "copy".to_string(),
            "-avoid_negative_ts".to_string(),
            "1".to_string(),
            "-y".to_string(),
        ]
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

/// Body of a concat demuxer list file.
pub fn concat_list_contents(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|file| {
            let escaped = file.to_string_lossy().replace('\'', "'\\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

pub fn concat_args(list: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-f", "concat", "-safe", "0", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(list.into());
    args.extend(["-c", "copy", "-y"].map(OsString::from));
    args.push(output.into());
    args
}

/// `-filter_complex` graph that trims each kept part, fades its edges and
/// concatenates the results into `[outv]` (and `[outa]` when there is audio).
pub fn quality_filter_graph(parts: &[TimeRange], fade_duration: f64, has_audio: bool) -> String {
    let mut chains = Vec::new();
    let mut concat_inputs = String::new();

    for (i, part) in parts.iter().enumerate() {
        let (start, end) = (seconds(part.start), seconds(part.end));
        let fade = fade_duration.max(0.0).min(part.duration() / 2.0);

        let mut video = format!("[0:v]trim=start={start}:end={end},setpts=PTS-STARTPTS");
        let mut audio = format!("[0:a]atrim=start={start}:end={end},asetpts=PTS-STARTPTS");
        if fade > 0.0 {
            let (d, out_at) = (seconds(fade), seconds(part.duration() - fade));
            video.push_str(&format!(
                ",fade=t=in:st=0:d={d},fade=t=out:st={out_at}:d={d}"
            ));
            audio.push_str(&format!(
                ",afade=t=in:st=0:d={d},afade=t=out:st={out_at}:d={d}"
            ));
        }
        chains.push(format!("{video}[v{i}]"));
        concat_inputs.push_str(&format!("[v{i}]"));
        if has_audio {
            chains.push(format!("{audio}[a{i}]"));
            concat_inputs.push_str(&format!("[a{i}]"));
        }
    }

    let (a, outputs) = if has_audio {
        (1, "[outv][outa]")
    } else {
        (0, "[outv]")
    };
    chains.push(format!(
        "{concat_inputs}concat=n={}:v=1:a={a}{outputs}",
        parts.len()
    ));
    chains.join(";")
}

pub fn quality_args(input: &Path, graph: &str, has_audio: bool, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.into()];
    args.extend(["-filter_complex", graph, "-map", "[outv]"].map(OsString::from));
    if has_audio {
        args.extend(["-map", "[outa]"].map(OsString::from));
    }
    args.extend(
        ["-c:v", "libx264", "-preset", "fast", "-crf", "22"].map(OsString::from),
    );
    if has_audio {
        args.extend(["-c:a", "aac", "-b:a", "192k"].map(OsString::from));
    }
    args.extend(["-movflags", "+faststart", "-y"].map(OsString::from));
    args.push(output.into());
    args
}

fn spawn_error(tool: &str, err: io::Error) -> TrimError {
    if err.kind() == io::ErrorKind::NotFound {
        TrimError::ToolNotFound {
            tool: tool.to_string(),
        }
    } else {
        TrimError::Io(err)
    }
}

/// Runs `tool` to completion, killing it on cancel or timeout.
pub fn run_tool(
    tool: &str,
    args: &[OsString],
    cancel: &CancelFlag,
    timeout: Option<Duration>,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(TrimError::Cancelled);
    }

    // stderr goes to a file so a chatty tool never blocks on a full pipe.
    let mut stderr_log = tempfile::tempfile()?;
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_log.try_clone()?))
        .spawn()
        .map_err(|err| spawn_error(tool, err))?;
    debug!(tool, pid = child.id(), "tool started");

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            info!(tool, "tool cancelled");
            return Err(TrimError::Cancelled);
        }
        if timeout.is_some_and(|limit| started.elapsed() > limit) {
            let _ = child.kill();
            let _ = child.wait();
            warn!(tool, "tool timed out");
            return Err(TrimError::tool_failed(tool, "timed out"));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    if status.success() {
        return Ok(());
    }
    let tail = read_tail(&mut stderr_log).unwrap_or_default();
    warn!(tool, %status, stderr = %tail, "tool failed");
    Err(TrimError::tool_failed(
        tool,
        if tail.is_empty() {
            format!("exited with {status}")
        } else {
            tail
        },
    ))
}

fn read_tail(file: &mut File) -> io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    Ok(lines[skip..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "r_frame_rate": "30/1", "duration": "120.000000"},
            {"codec_type": "audio", "codec_name": "aac", "r_frame_rate": "0/0"}
        ],
        "format": {"duration": "121.5"}
    }"#;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_check_part_rejects_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("part_0.mp4");
        match check_part(&missing, 0) {
            Err(TrimError::ToolFailed { message, .. }) => assert!(message.contains("part 0")),
            other => panic!("unexpected {other:?}"),
        }

        let empty = dir.path().join("part_1.mp4");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            check_part(&empty, 1),
            Err(TrimError::ToolFailed { .. })
        ));

        let good = dir.path().join("part_2.mp4");
        std::fs::write(&good, b"data").unwrap();
        assert!(check_part(&good, 2).is_ok());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("garbage"), 0.0);
    }

    #[test]
    fn test_parse_ffprobe_json() {
        let meta = parse_ffprobe_json(Path::new("in.mp4"), PROBE_JSON).unwrap();
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.duration, 120.0);
        assert_eq!(meta.total_frames, 3600);
        assert_eq!(meta.codec, "h264");
        assert!(meta.has_audio);
    }

    #[test]
    fn test_parse_ffprobe_falls_back_to_format_duration() {
        let json = r#"{
            "streams": [{"codec_type": "video", "r_frame_rate": "25/1"}],
            "format": {"duration": "10.0"}
        }"#;
        let meta = parse_ffprobe_json(Path::new("in.mkv"), json).unwrap();
        assert_eq!(meta.duration, 10.0);
        assert!(!meta.has_audio);
    }

    #[test]
    fn test_parse_ffprobe_without_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        let err = parse_ffprobe_json(Path::new("song.mp3"), json).unwrap_err();
        assert!(matches!(err, TrimError::Probe { .. }));
    }

    #[test]
    fn test_extract_part_args() {
        let args = extract_part_args(
            Path::new("in.mp4"),
            &TimeRange::new(20.0, 40.5),
            Path::new("/tmp/part_1.mp4"),
        );
        assert_eq!(
            strings(&args),
            vec![
                "-ss", "20.000", "-i", "in.mp4", "-t", "20.500", "-c", "copy",
                "-avoid_negative_ts", "1", "-y", "/tmp/part_1.mp4"
            ]
        );
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list_contents(&[
            PathBuf::from("/tmp/a.mp4"),
            PathBuf::from("/tmp/it's.mp4"),
        ]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_concat_args() {
        let args = concat_args(Path::new("list.txt"), Path::new("out.mp4"));
        assert_eq!(
            strings(&args),
            vec!["-f", "concat", "-safe", "0", "-i", "list.txt", "-c", "copy", "-y", "out.mp4"]
        );
    }

    #[test]
    fn test_quality_graph_with_audio_and_fades() {
        let graph = quality_filter_graph(
            &[TimeRange::new(0.0, 10.0), TimeRange::new(20.0, 30.0)],
            0.5,
            true,
        );
        let chains: Vec<&str> = graph.split(';').collect();
        assert_eq!(chains.len(), 5);
        assert_eq!(
            chains[0],
            "[0:v]trim=start=0.000:end=10.000,setpts=PTS-STARTPTS,\
             fade=t=in:st=0:d=0.500,fade=t=out:st=9.500:d=0.500[v0]"
        );
        assert!(chains[1].starts_with("[0:a]atrim=start=0.000:end=10.000"));
        assert!(chains[1].contains("afade=t=out:st=9.500:d=0.500"));
        assert_eq!(chains[4], "[v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]");
    }

    #[test]
    fn test_quality_graph_without_fade_or_audio() {
        let graph = quality_filter_graph(&[TimeRange::new(5.0, 6.0)], 0.0, false);
        assert_eq!(
            graph,
            "[0:v]trim=start=5.000:end=6.000,setpts=PTS-STARTPTS[v0];[v0]concat=n=1:v=1:a=0[outv]"
        );
    }

    #[test]
    fn test_fade_never_exceeds_half_a_part() {
        let graph = quality_filter_graph(&[TimeRange::new(0.0, 0.4)], 2.0, false);
        assert!(graph.contains("fade=t=in:st=0:d=0.200"));
        assert!(graph.contains("fade=t=out:st=0.200:d=0.200"));
    }

    #[test]
    fn test_quality_args_map_audio_only_when_present() {
        let with_audio = strings(&quality_args(Path::new("in.mp4"), "G", true, Path::new("o.mp4")));
        assert!(with_audio.contains(&"[outa]".to_string()));
        assert!(with_audio.contains(&"aac".to_string()));
        assert_eq!(with_audio.last().map(String::as_str), Some("o.mp4"));

        let silent = strings(&quality_args(Path::new("in.mp4"), "G", false, Path::new("o.mp4")));
        assert!(!silent.contains(&"[outa]".to_string()));
        assert!(silent.contains(&"libx264".to_string()));
        assert!(silent.contains(&"+faststart".to_string()));
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let err = run_tool("sitg-no-such-tool", &[], &CancelFlag::new(), None).unwrap_err();
        assert!(matches!(err, TrimError::ToolNotFound { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = run_tool("sitg-no-such-tool", &[], &cancel, None).unwrap_err();
        assert!(matches!(err, TrimError::Cancelled));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_tool_reports_stderr() {
        let args: Vec<OsString> = vec!["-c".into(), "echo broken input >&2; exit 3".into()];
        let err = run_tool("sh", &args, &CancelFlag::new(), None).unwrap_err();
        match err {
            TrimError::ToolFailed { tool, message } => {
                assert_eq!(tool, "sh");
                assert_eq!(message, "broken input");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_kills_running_tool() {
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });
        let started = Instant::now();
        let err = run_tool("sleep", &[OsString::from("10")], &cancel, None).unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, TrimError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_remove_without_segments() {
        let request = ProcessRequest {
            input: PathBuf::from("in.mp4"),
            output: PathBuf::from("out.mp4"),
            segments: Vec::new(),
            fade_duration: 0.5,
            fast_mode: true,
        };
        let err = remove_segments(&request, &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, TrimError::NoSegments));
    }
}
