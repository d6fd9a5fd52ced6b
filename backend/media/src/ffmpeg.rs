//! FFmpeg-backed decoding.
//!
//! Stream metadata comes from `ffprobe -of json`. Pixels come from `ffmpeg`
//! as packed `rgb24` rawvideo on stdout, with a `select` filter so only the
//! requested frames are converted.

use std::ffi::OsString;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, warn};

use reelchat_core::VideoError;

use crate::source::{VideoBackend, VideoSource};

/// Decodes containers by shelling out to the FFmpeg command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    pub fn with_binaries(mut self, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    fn probe(&self, path: &Path) -> Result<StreamProbe, VideoError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
            .arg("stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,duration:format=duration")
            .args(["-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| VideoError::open(path, format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::open(path, stderr.trim().to_string()));
        }

        let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| VideoError::open(path, format!("unreadable ffprobe output: {e}")))?;
        StreamProbe::from_output(parsed).map_err(|reason| VideoError::open(path, reason))
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, VideoError> {
        if !path.is_file() {
            return Err(VideoError::open(path, "file does not exist"));
        }
        let probe = self.probe(path)?;
        debug!(
            path = %path.display(),
            fps = probe.fps,
            frames = probe.frame_count,
            width = probe.width,
            height = probe.height,
            "Probed video stream"
        );
        Ok(Box::new(FfmpegSource {
            ffmpeg: self.ffmpeg.clone(),
            path: path.to_path_buf(),
            probe,
        }))
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StreamProbe {
    fps: f64,
    frame_count: usize,
    width: u32,
    height: u32,
}

impl StreamProbe {
    fn from_output(output: ProbeOutput) -> Result<Self, String> {
        let stream = output
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| "no video stream".to_string())?;

        let fps = stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_rational)
            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rational))
            .ok_or_else(|| "unknown frame rate".to_string())?;

        // Containers like MKV and WebM leave nb_frames empty; fall back to duration.
        let frame_count = match stream.nb_frames.as_deref().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) => n,
            None => {
                let duration = stream
                    .duration
                    .as_deref()
                    .or(output.format.as_ref().and_then(|f| f.duration.as_deref()))
                    .and_then(|d| d.parse::<f64>().ok())
                    .unwrap_or(0.0);
                (duration * fps).round() as usize
            }
        };

        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err("missing frame dimensions".into()),
        };

        Ok(Self {
            fps,
            frame_count,
            width,
            height,
        })
    }
}

/// Parse an FFmpeg rational like `30000/1001`. Zero or malformed rates yield `None`.
fn parse_rational(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

struct FfmpegSource {
    ffmpeg: PathBuf,
    path: PathBuf,
    probe: StreamProbe,
}

/// Bytes of decoder stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 16 * 1024;

/// `select` filter passing exactly the listed input frame numbers.
fn select_filter(indices: &[usize]) -> String {
    let terms: Vec<String> = indices.iter().map(|i| format!("eq(n\\,{i})")).collect();
    format!("select={}", terms.join("+"))
}

/// Arguments for decoding `indices` of `path` as packed rgb24.
///
/// Frames stay in stored orientation so they match the dimensions ffprobe
/// reports, and only the selected frames are converted and written.
fn decode_args(path: &Path, indices: &[usize]) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        [
            "-map".to_string(),
            "0:v:0".to_string(),
            "-vf".to_string(),
            select_filter(indices),
            "-fps_mode".to_string(),
            "passthrough".to_string(),
            "-frames:v".to_string(),
            indices.len().to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-".to_string(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}

/// Read stderr to the end on its own thread, keeping only the tail.
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut reader = stderr;
        let mut tail: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL_BYTES {
                        tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                    }
                }
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    })
}

/// Read one packed rgb24 frame per entry of `indices` from `reader`.
///
/// A stream that ends early yields fewer frames; a partial trailing frame is
/// dropped. Any other read failure is a decode error for the frame being read.
fn read_frames(
    mut reader: impl Read,
    width: u32,
    height: u32,
    indices: &[usize],
) -> Result<Vec<RgbImage>, VideoError> {
    let frame_len = width as usize * height as usize * 3;
    let mut frames = Vec::with_capacity(indices.len());
    for &index in indices {
        let mut buf = vec![0u8; frame_len];
        match reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(VideoError::decode(index, e.to_string())),
        }
        let image = RgbImage::from_raw(width, height, buf)
            .ok_or_else(|| VideoError::decode(index, "short pixel buffer"))?;
        frames.push(image);
    }
    Ok(frames)
}

impl VideoSource for FfmpegSource {
    fn avg_fps(&self) -> f64 {
        self.probe.fps
    }

    fn frame_count(&self) -> usize {
        self.probe.frame_count
    }

    fn get_batch(&mut self, indices: &[usize]) -> Result<Vec<RgbImage>, VideoError> {
        let Some(&first) = indices.first() else {
            return Ok(Vec::new());
        };

        let mut child = Command::new(&self.ffmpeg)
            .args(decode_args(&self.path, indices))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VideoError::decode(first, format!("failed to run ffmpeg: {e}")))?;

        let stderr_tail = child.stderr.take().map(drain_stderr);
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VideoError::decode(first, "ffmpeg stdout unavailable"));
        };

        let read = read_frames(
            BufReader::new(stdout),
            self.probe.width,
            self.probe.height,
            indices,
        );
        let frames = match read {
            Ok(frames) => frames,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                if let Some(handle) = stderr_tail {
                    let _ = handle.join();
                }
                return Err(e);
            }
        };

        let status = child.wait().map_err(|e| VideoError::decode(first, e.to_string()))?;
        let stderr = stderr_tail
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();

        if frames.len() < indices.len() {
            if !status.success() {
                return Err(VideoError::decode(indices[frames.len()], stderr.trim().to_string()));
            }
            warn!(
                path = %self.path.display(),
                decoded = frames.len(),
                expected = indices.len(),
                "Decoder ended before the last requested frame"
            );
        }

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(json: &str) -> Result<StreamProbe, String> {
        StreamProbe::from_output(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn parses_ntsc_rate() {
        let fps = parse_rational("30000/1001").unwrap();
        assert!((fps - 29.97).abs() < 0.01);
        assert_eq!(parse_rational("25"), Some(25.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("abc"), None);
    }

    #[test]
    fn probe_reads_frame_count() {
        let p = probe(
            r#"{"streams":[{"width":640,"height":360,"avg_frame_rate":"30/1","r_frame_rate":"30/1","nb_frames":"300"}]}"#,
        )
        .unwrap();
        assert_eq!(p.frame_count, 300);
        assert_eq!((p.width, p.height), (640, 360));
        assert_eq!(p.fps, 30.0);
    }

    #[test]
    fn probe_estimates_count_from_duration() {
        let p = probe(
            r#"{"streams":[{"width":320,"height":240,"avg_frame_rate":"0/0","r_frame_rate":"25/1"}],
                "format":{"duration":"12.000000"}}"#,
        )
        .unwrap();
        assert_eq!(p.fps, 25.0);
        assert_eq!(p.frame_count, 300);
    }

    #[test]
    fn probe_without_stream_fails() {
        assert!(probe(r#"{"streams":[]}"#).is_err());
    }

    #[test]
    fn missing_file_is_open_error() {
        let backend = FfmpegBackend::new();
        let err = backend
            .open(Path::new("/definitely/not/here.mp4"))
            .err()
            .unwrap();
        assert!(matches!(err, VideoError::Open { .. }));
    }

    /// `count` packed frames of `width x height`, every byte of frame `i` set to `i`.
    fn raw_frames(count: u8, width: u32, height: u32) -> Vec<u8> {
        let frame_len = (width * height * 3) as usize;
        (0..count).flat_map(|i| vec![i; frame_len]).collect()
    }

    #[test]
    fn decode_args_keep_stored_orientation() {
        let args = decode_args(Path::new("/videos/clip.mp4"), &[0, 5, 12]);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert!(pos("-noautorotate") < pos("-i"));
        assert_eq!(args[pos("-i") + 1], "/videos/clip.mp4");
        assert_eq!(args[pos("-vf") + 1], "select=eq(n\\,0)+eq(n\\,5)+eq(n\\,12)");
        assert_eq!(args[pos("-frames:v") + 1], "3");
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn reads_selected_frames_in_order() {
        let raw = raw_frames(3, 2, 1);
        let frames = read_frames(std::io::Cursor::new(raw), 2, 1, &[4, 9, 20]).unwrap();
        assert_eq!(frames.len(), 3);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.dimensions(), (2, 1));
            assert!(frame.as_raw().iter().all(|&b| b == i as u8));
        }
    }

    #[test]
    fn early_end_of_stream_returns_fewer_frames() {
        let mut raw = raw_frames(2, 2, 2);
        // Half of a third frame.
        raw.extend_from_slice(&[7; 6]);
        let frames = read_frames(std::io::Cursor::new(raw), 2, 2, &[0, 1, 2, 3]).unwrap();
        assert_eq!(frames.len(), 2);

        let frames = read_frames(std::io::Cursor::new(vec![1u8; 5]), 2, 2, &[0]).unwrap();
        assert!(frames.is_empty());
    }

    struct FailingReader {
        remaining: Vec<u8>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.remaining.is_empty() {
                return Err(std::io::Error::new(ErrorKind::BrokenPipe, "pipe closed"));
            }
            let n = buf.len().min(self.remaining.len());
            buf[..n].copy_from_slice(&self.remaining[..n]);
            self.remaining.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn read_failure_names_the_pending_frame() {
        let reader = FailingReader {
            remaining: raw_frames(1, 2, 1),
        };
        let err = read_frames(reader, 2, 1, &[3, 8]).unwrap_err();
        match err {
            VideoError::Decode { index, reason } => {
                assert_eq!(index, 8);
                assert!(reason.contains("pipe closed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    fn fake_source(ffmpeg: PathBuf, dir: &Path) -> FfmpegSource {
        FfmpegSource {
            ffmpeg,
            path: dir.join("clip.mp4"),
            probe: StreamProbe {
                fps: 10.0,
                frame_count: 20,
                width: 4,
                height: 2,
            },
        }
    }

    #[cfg(unix)]
    #[test]
    fn noisy_decoder_stderr_does_not_stall_reads() {
        let dir = tempfile::tempdir().unwrap();
        // 200 KB of warnings before any pixels, then three 4x2 frames.
        let script = fake_ffmpeg(
            dir.path(),
            "head -c 204800 /dev/zero | tr '\\000' 'w' >&2\nhead -c 72 /dev/zero",
        );
        let mut source = fake_source(script, dir.path());

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(source.get_batch(&[0, 5, 19]));
        });
        let frames = rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("decoder stalled")
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.dimensions() == (4, 2)));
    }

    #[cfg(unix)]
    #[test]
    fn failed_decoder_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_ffmpeg(dir.path(), "echo 'moov atom not found' >&2\nexit 1");
        let mut source = fake_source(script, dir.path());

        let err = source.get_batch(&[2, 4]).unwrap_err();
        match err {
            VideoError::Decode { index, reason } => {
                assert_eq!(index, 2);
                assert!(reason.contains("moov atom not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn ffmpeg_available() -> bool {
        ["ffmpeg", "ffprobe"].iter().all(|bin| {
            Command::new(bin)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }

    fn run_ffmpeg(args: &[&str]) -> bool {
        Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-y"])
            .args(args)
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn decodes_rotated_clip_at_probed_size() {
        if !ffmpeg_available() {
            eprintln!("ffmpeg not on PATH; skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.mp4");
        let rotated = dir.path().join("rotated.mp4");
        let plain_str = plain.to_string_lossy().into_owned();
        let rotated_str = rotated.to_string_lossy().into_owned();

        assert!(run_ffmpeg(&[
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=64x32:rate=10",
            "-t",
            "2",
            "-pix_fmt",
            "yuv420p",
            &plain_str,
        ]));
        // Newer builds take a display matrix; older ones the rotate tag.
        let tagged = run_ffmpeg(&["-display_rotation", "90", "-i", &plain_str, "-c", "copy", &rotated_str])
            || run_ffmpeg(&["-i", &plain_str, "-c", "copy", "-metadata:s:v:0", "rotate=90", &rotated_str]);
        assert!(tagged);

        let mut source = FfmpegBackend::new().open(&rotated).unwrap();
        assert_eq!(source.frame_count(), 20);
        let frames = source.get_batch(&[0, 7, 19]).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.dimensions() == (64, 32)));
    }
}
