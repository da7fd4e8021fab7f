//! Decode and encode through ffmpeg subprocesses.

use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;

use tempo_clip_model::frame::{Clip, Frame};
use tempo_common::config::MediaDefaults;
use tempo_common::error::{TempoError, TempoResult};

/// Stream properties reported by the probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second; 0.0 when the container does not say.
    pub fps: f64,
}

/// Trait for decoders that load a whole clip into memory.
pub trait FrameSource: Send + Sync {
    /// Read dimensions and frame rate without decoding.
    fn probe(&self, path: &Path) -> TempoResult<VideoInfo>;

    /// Decode every frame of the first video stream.
    fn decode(&self, path: &Path) -> TempoResult<Clip>;

    /// Check if this source is available on the system.
    fn is_available(&self) -> bool;

    /// Source name.
    fn name(&self) -> &str;
}

/// Trait for encoders that write a frame sequence to a video file.
pub trait VideoSink: Send + Sync {
    /// Encode `frames` at `fps`. All frames must be `width`×`height`.
    fn encode(
        &self,
        frames: &[Frame],
        path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> TempoResult<()>;

    /// Check if this sink is available on the system.
    fn is_available(&self) -> bool;

    /// Sink name.
    fn name(&self) -> &str;
}

/// Decoder backed by `ffprobe` and `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegSource {
    pub fn new(media: &MediaDefaults) -> Self {
        Self {
            ffmpeg: media.ffmpeg.clone(),
            ffprobe: media.ffprobe.clone(),
        }
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new(&MediaDefaults::default())
    }
}

impl FrameSource for FfmpegSource {
    fn probe(&self, path: &Path) -> TempoResult<VideoInfo> {
        if !path.exists() {
            return Err(TempoError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,r_frame_rate",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| TempoError::decode(path, format!("Failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(TempoError::decode(
                path,
                format!(
                    "ffprobe failed (status {}): {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        parse_probe_json(&raw).map_err(|message| TempoError::decode(path, message))
    }

    fn decode(&self, path: &Path) -> TempoResult<Clip> {
        let info = self.probe(path)?;
        let frame_len = info.width as usize * info.height as usize * 3;

        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Decoding video"
        );

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TempoError::decode(path, format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TempoError::decode(path, "Failed to capture ffmpeg stdout"))?;
        let stderr_task = drain_stderr(&mut child);

        let frames = match read_frames(BufReader::new(stdout), &info, frame_len) {
            Ok(frames) => frames,
            Err(message) => {
                let stderr_output = abort(child, stderr_task);
                tracing::debug!(stderr = %stderr_output.trim(), "ffmpeg decode aborted");
                return Err(TempoError::decode(path, message));
            }
        };

        finish(child, stderr_task, "decode").map_err(|message| TempoError::decode(path, message))?;

        if frames.is_empty() {
            return Err(TempoError::decode(path, "No video frames decoded"));
        }

        tracing::info!(
            path = %path.display(),
            frames = frames.len(),
            fps = info.fps,
            "Decoded video"
        );

        Ok(Clip::new(frames, info.fps, info.width, info.height))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg) && command_exists(&self.ffprobe)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Encoder that pipes raw RGB frames into `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegSink {
    ffmpeg: String,
    video_codec: String,
    crf: u32,
    pixel_format: String,
}

impl FfmpegSink {
    pub fn new(media: &MediaDefaults) -> Self {
        Self {
            ffmpeg: media.ffmpeg.clone(),
            video_codec: media.video_codec.clone(),
            crf: media.crf,
            pixel_format: media.pixel_format.clone(),
        }
    }

    /// Full ffmpeg argument list for one encode.
    pub fn encode_args(&self, path: &Path, fps: f64, width: u32, height: u32) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push("-s".to_string());
        args.push(format!("{width}x{height}"));
        args.push("-r".to_string());
        args.push(format!("{fps}"));
        args.extend(["-i".to_string(), "-".to_string()]);

        // 4:2:0 chroma needs even dimensions.
        if width % 2 != 0 || height % 2 != 0 {
            args.push("-vf".to_string());
            args.push("pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string());
        }

        args.extend([
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
        ]);
        if self.video_codec.starts_with("libx26") {
            args.push("-crf".to_string());
            args.push(self.crf.to_string());
        }
        args.push(path.to_string_lossy().into_owned());
        args
    }
}

impl Default for FfmpegSink {
    fn default() -> Self {
        Self::new(&MediaDefaults::default())
    }
}

impl VideoSink for FfmpegSink {
    fn encode(
        &self,
        frames: &[Frame],
        path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> TempoResult<()> {
        if frames.is_empty() {
            return Err(TempoError::encode(path, "No frames to encode"));
        }
        if let Some(bad) = frames
            .iter()
            .position(|f| f.width() != width || f.height() != height)
        {
            return Err(TempoError::encode(
                path,
                format!(
                    "Frame {bad} is {}x{}, expected {width}x{height}",
                    frames[bad].width(),
                    frames[bad].height()
                ),
            ));
        }

        let args = self.encode_args(path, fps, width, height);
        tracing::debug!(args = ?args, "Running ffmpeg");

        let start = std::time::Instant::now();
        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TempoError::encode(path, format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TempoError::encode(path, "Failed to capture ffmpeg stdin"))?;
        let stderr_task = drain_stderr(&mut child);

        let mut writer = BufWriter::new(stdin);
        for frame in frames {
            if let Err(e) = writer.write_all(frame.as_bytes()) {
                // ffmpeg exited early; its stderr carries the reason.
                tracing::debug!(error = %e, "ffmpeg closed its input");
                break;
            }
        }
        // Closing stdin signals end of stream.
        drop(writer.into_inner().ok());

        finish(child, stderr_task, "encode").map_err(|message| TempoError::encode(path, message))?;

        tracing::info!(
            output = %path.display(),
            frames = frames.len(),
            fps,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Encoded video"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Drain stderr concurrently so ffmpeg never blocks on a full pipe.
fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    let stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    }))
}

fn read_frames(mut reader: impl Read, info: &VideoInfo, frame_len: usize) -> Result<Vec<Frame>, String> {
    let mut frames = Vec::new();
    loop {
        let mut buf = vec![0u8; frame_len];
        match reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(frames),
            Err(e) => return Err(format!("Failed reading frames: {e}")),
        }
        let frame = Frame::from_rgb24(info.width, info.height, buf)
            .ok_or_else(|| "Frame buffer size mismatch".to_string())?;
        frames.push(frame);
    }
}

/// Kill a child that is no longer being read, reap it and collect its
/// stderr.
fn abort(mut child: Child, stderr_task: Option<JoinHandle<String>>) -> String {
    let _ = child.kill();
    let _ = child.wait();
    stderr_task
        .map(|task| {
            task.join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
        })
        .unwrap_or_default()
}

fn finish(
    mut child: Child,
    stderr_task: Option<JoinHandle<String>>,
    stage: &str,
) -> Result<(), String> {
    let status = child
        .wait()
        .map_err(|e| format!("Failed to wait on ffmpeg: {e}"))?;

    let stderr_output = stderr_task
        .map(|task| {
            task.join()
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
        })
        .unwrap_or_default();

    if !status.success() {
        return Err(format!(
            "ffmpeg {stage} failed (status {status}): {}",
            stderr_output.trim()
        ));
    }
    Ok(())
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

/// Extract [`VideoInfo`] from `ffprobe -of json` output.
pub fn parse_probe_json(raw: &str) -> Result<VideoInfo, String> {
    let probe: ProbeOutput =
        serde_json::from_str(raw).map_err(|e| format!("Unreadable ffprobe output: {e}"))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "No video stream found".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("Video stream has no dimensions".to_string()),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    Ok(VideoInfo { width, height, fps })
}

/// Parse an ffprobe rate such as `30`, `29.97` or `24000/1001`.
/// Zero or undefined rates (`0/0`) yield `None`.
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let value = value.trim();
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
