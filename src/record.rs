use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    foundation::core::Fps,
    foundation::error::{ReelError, ReelResult},
    render::Surface,
};

/// Parameters handed to a [`RecordingSink`] when a recording session starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordingConfig {
    pub fps: Fps,
}

/// Factory for recording sessions.
pub trait RecordingSink: Send {
    fn start(&mut self, cfg: &RecordingConfig) -> ReelResult<Box<dyn Recording>>;
}

/// One active recording session.
pub trait Recording: Send {
    /// Capture the current surface contents as one output frame.
    fn step(&mut self, surface: &dyn Surface) -> ReelResult<()>;

    /// Finalize and emit the output.
    fn stop(self: Box<Self>) -> ReelResult<()>;
}

pub(crate) enum RecordingState {
    Idle,
    Recording(Box<dyn Recording>),
}

impl RecordingState {
    pub(crate) fn is_recording(&self) -> bool {
        matches!(self, Self::Recording(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    /// VP9 in WebM.
    Webm,
    /// H.264 (yuv420p) in MP4.
    Mp4,
}

impl Container {
    pub fn from_path(path: &Path) -> ReelResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("webm") => Ok(Self::Webm),
            Some("mp4") => Ok(Self::Mp4),
            _ => Err(ReelError::validation(format!(
                "unsupported recording container for '{}' (use .webm or .mp4)",
                path.display()
            ))),
        }
    }

    fn codec_args(self) -> &'static [&'static str] {
        match self {
            Self::Webm => &["-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p", "-b:v", "0", "-crf", "32"],
            Self::Mp4 => &["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"],
        }
    }
}

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub out_path: PathBuf,
    pub container: Container,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(ReelError::validation("encode fps must be non-zero"));
        }
        if self.container == Container::Mp4
            && (!self.width.is_multiple_of(2) || !self.height.is_multiple_of(2))
        {
            return Err(ReelError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams raw RGBA8 frames into the system `ffmpeg` binary.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    bg_rgba: [u8; 4],
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig, bg_rgba: [u8; 4]) -> ReelResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(ReelError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.arg(if cfg.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_ffmpeg_rate(),
            "-i",
            "pipe:0",
            "-an",
        ])
        .args(cfg.container.codec_args())
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::recording(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::recording("failed to open ffmpeg stdin (unexpected)"))?;

        tracing::info!(
            out = %cfg.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            fps = cfg.fps.as_f64(),
            "ffmpeg encoder started"
        );

        Ok(Self {
            scratch: vec![0u8; cfg.width as usize * cfg.height as usize * 4],
            cfg,
            bg_rgba,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_rgba(&mut self, width: u32, height: u32, rgba: &[u8]) -> ReelResult<()> {
        if width != self.cfg.width || height != self.cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                width, height, self.cfg.width, self.cfg.height
            )));
        }

        flatten_to_opaque_rgba8(&mut self.scratch, rgba, self.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::recording("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            ReelError::recording(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;

        Ok(())
    }

    pub fn finish(mut self) -> ReelResult<()> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            ReelError::recording(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::recording(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::info!(out = %self.cfg.out_path.display(), "recording written");
        Ok(())
    }
}

/// Recording sink that writes each session to a video file through `ffmpeg`.
///
/// The first session writes `out_path`; later sessions append `-2`, `-3`, ... to the file stem.
#[derive(Clone, Debug)]
pub struct FfmpegSink {
    out_path: PathBuf,
    container: Container,
    overwrite: bool,
    bg_rgba: [u8; 4],
    sessions: u32,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>) -> ReelResult<Self> {
        let out_path = out_path.into();
        let container = Container::from_path(&out_path)?;
        Ok(Self {
            out_path,
            container,
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
            sessions: 0,
        })
    }

    pub fn with_background(mut self, bg_rgba: [u8; 4]) -> Self {
        self.bg_rgba = bg_rgba;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn session_path(&self, session: u32) -> PathBuf {
        if session <= 1 {
            return self.out_path.clone();
        }
        let stem = self
            .out_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string());
        let ext = self
            .out_path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.out_path.with_file_name(format!("{stem}-{session}.{ext}"))
    }
}

impl RecordingSink for FfmpegSink {
    fn start(&mut self, cfg: &RecordingConfig) -> ReelResult<Box<dyn Recording>> {
        if !is_ffmpeg_on_path() {
            return Err(ReelError::recording(
                "ffmpeg is required for recording, but was not found on PATH",
            ));
        }
        self.sessions += 1;
        Ok(Box::new(FfmpegRecording {
            out_path: self.session_path(self.sessions),
            container: self.container,
            overwrite: self.overwrite,
            bg_rgba: self.bg_rgba,
            fps: cfg.fps,
            encoder: None,
            frames: 0,
        }))
    }
}

// The encoder is spawned on the first step, once the surface size is known.
struct FfmpegRecording {
    out_path: PathBuf,
    container: Container,
    overwrite: bool,
    bg_rgba: [u8; 4],
    fps: Fps,
    encoder: Option<FfmpegEncoder>,
    frames: u64,
}

impl Recording for FfmpegRecording {
    fn step(&mut self, surface: &dyn Surface) -> ReelResult<()> {
        let (width, height) = surface.dimensions();
        let encoder = match self.encoder.take() {
            Some(enc) => enc,
            None => {
                let cfg = EncodeConfig {
                    width,
                    height,
                    fps: self.fps,
                    out_path: self.out_path.clone(),
                    container: self.container,
                    overwrite: self.overwrite,
                };
                FfmpegEncoder::new(cfg, self.bg_rgba)
                    .map_err(|e| ReelError::recording_step(e.to_string()))?
            }
        };
        let encoder = self.encoder.insert(encoder);

        encoder
            .encode_rgba(width, height, surface.pixels())
            .map_err(|e| ReelError::recording_step(e.to_string()))?;
        self.frames += 1;
        Ok(())
    }

    fn stop(self: Box<Self>) -> ReelResult<()> {
        match self.encoder {
            Some(enc) => enc.finish(),
            None => {
                tracing::warn!(
                    out = %self.out_path.display(),
                    "recording stopped before any frame was captured; nothing written"
                );
                Ok(())
            }
        }
    }
}

fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8], bg_rgba: [u8; 4]) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg = [bg_rgba[0] as u16, bg_rgba[1] as u16, bg_rgba[2] as u16];

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        for c in 0..3 {
            d[c] = (mul_div255(s[c] as u16, a) + mul_div255(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
#[path = "../tests/unit/record/record.rs"]
mod tests;
