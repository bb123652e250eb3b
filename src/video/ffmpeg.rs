use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use serde::Deserialize;
use std::ffi::OsString;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use super::source::{FrameSource, sanitize_fps};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    nb_frames: Option<String>,
    #[serde(default)]
    nb_read_packets: Option<String>,
}

/// Properties of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub frame_count: usize,
}

/// Parses an ffprobe rational such as `30000/1001`.
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    sanitize_fps(num / den)
}

fn parse_probe_output(json: &str) -> Result<VideoInfo> {
    let probe: ProbeOutput =
        serde_json::from_str(json).context("Failed to parse ffprobe output")?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate));
    let frame_count = [stream.nb_frames.as_deref(), stream.nb_read_packets.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|count| count.trim().parse::<usize>().ok())
        .unwrap_or(0);

    Ok(VideoInfo {
        width: stream.width,
        height: stream.height,
        fps,
        frame_count,
    })
}

/// Runs ffprobe on the first video stream of `path`.
pub fn probe_video(path: &Path) -> Result<VideoInfo> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0", "-count_packets"])
        .args([
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,nb_read_packets",
        ])
        .args(["-of", "json"])
        .arg(path)
        .output()
        .context("Failed to run ffprobe. Please install FFmpeg and add it to PATH.")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffprobe failed for {}: {}", path.display(), stderr.trim()));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Unable to open video: {}", path.display()))
}

/// Streams RGB frames from an ffmpeg child process.
///
/// Arguments for an ffmpeg process that streams `rgb24` frames from
/// `start_frame` on. Every decoded frame is emitted exactly once: rawvideo
/// output otherwise defaults to constant-rate sync, which duplicates or drops
/// frames of variable-rate recordings.
fn decoder_args(path: &Path, start_frame: usize) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-i"].iter().map(OsString::from).collect();
    args.push(path.as_os_str().to_os_string());
    if start_frame > 0 {
        args.push("-vf".into());
        args.push(format!("select=gte(n\\,{})", start_frame).into());
    }
    args.extend(
        ["-vsync", "passthrough", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]
            .iter()
            .map(OsString::from),
    );
    args
}

/// The child is killed and reaped when the source is dropped.
pub struct FfmpegFrameSource {
    path: PathBuf,
    info: VideoInfo,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    position: usize,
}

impl FfmpegFrameSource {
    pub fn open(path: &Path) -> Result<Self> {
        let info = probe_video(path)?;
        if info.width == 0 || info.height == 0 {
            return Err(anyhow!("Unable to open video: {} has no frame size", path.display()));
        }
        let mut source = Self {
            path: path.to_path_buf(),
            info,
            child: None,
            stdout: None,
            position: 0,
        };
        source.spawn_decoder(0)?;
        Ok(source)
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    fn frame_bytes(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    /// Starts a decoder whose first output frame is `start_frame`.
    fn spawn_decoder(&mut self, start_frame: usize) -> Result<()> {
        self.stop_decoder();

        let mut command = Command::new("ffmpeg");
        command
            .args(decoder_args(&self.path, start_frame))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = command
            .spawn()
            .context("Failed to run ffmpeg. Please install FFmpeg and add it to PATH.")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout unavailable"))?;

        self.stdout = Some(BufReader::with_capacity(self.frame_bytes(), stdout));
        self.child = Some(child);
        self.position = start_frame;
        Ok(())
    }

    fn stop_decoder(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn fps(&self) -> Option<f64> {
        self.info.fps
    }

    fn frame_count(&self) -> usize {
        self.info.frame_count
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        let frame_bytes = self.frame_bytes();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buffer = vec![0u8; frame_bytes];
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.stop_decoder();
                return Ok(None);
            }
            Err(e) => return Err(e).context("Failed to read frame from ffmpeg"),
        }

        self.position += 1;
        RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .map(Some)
            .ok_or_else(|| anyhow!("ffmpeg frame has unexpected size"))
    }

    fn seek(&mut self, frame_index: usize) -> Result<()> {
        if self.stdout.is_some() && frame_index >= self.position {
            while self.position < frame_index {
                if self.read()?.is_none() {
                    break;
                }
            }
            return Ok(());
        }
        self.spawn_decoder(frame_index)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.stop_decoder();
    }
}
