//! rasterreel decodes native-raster frames and plays them back on a timer.
//!
//! # Pipeline overview
//!
//! 1. **Load**: frame identifiers -> [`NativeRasterInput`] records ([`load_frames`])
//! 2. **Decode** (worker thread): base64 -> inflate -> JSON integer array -> RGBA8 ([`decode_native_raster`])
//! 3. **Paint**: [`DecodedFrame`] -> [`Surface`] ([`paint`])
//! 4. **Record** (optional): one [`Recording::step`] per painted frame, e.g. into `ffmpeg`
//!
//! [`PlaybackController`] owns the session state and drives steps 2-4 at a fixed interval.
#![forbid(unsafe_code)]

mod config;
mod foundation;
mod playback;
mod raster;
mod record;
mod render;
mod source;
mod worker;

pub use config::{DEFAULT_DELAY_MS, LaunchConfig, parse_delay, split_ids};
pub use foundation::core::{Fps, PackedPixel};
pub use foundation::error::{ReelError, ReelResult};
pub use playback::{
    MAX_IN_FLIGHT, PlaybackConfig, PlaybackController, PlaybackState, PlaybackStats,
    PlayerCommand, RunExit,
};
pub use raster::decode::{DecodedFrame, decode_native_raster};
pub use raster::input::NativeRasterInput;
pub use record::{
    Container, EncodeConfig, FfmpegEncoder, FfmpegSink, Recording, RecordingConfig,
    RecordingSink, ensure_parent_dir, is_ffmpeg_on_path,
};
pub use render::{PixelSurface, Surface, paint};
pub use source::{DirFetcher, FrameFetcher, load_frames};
pub use worker::{DecodeFn, DecodeRequest, DecodeResponse, DecodeWorker, native_raster_decoder};
