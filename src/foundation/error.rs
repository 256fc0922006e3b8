use std::time::Duration;

pub type ReelResult<T> = Result<T, ReelError>;

/// Error taxonomy for decoding and playback.
///
/// `Encoding`, `Decompression` and `Format` are frame-local. `SourceUnavailable`,
/// `EmptyPlaylist` and `Config` are startup errors. `RecordingStep` never stops playback.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("source unavailable: '{id}': {reason}")]
    SourceUnavailable { id: String, reason: String },

    #[error("empty playlist: playback needs at least one frame")]
    EmptyPlaylist,

    #[error("recording step error: {0}")]
    RecordingStep(String),

    #[error("recording error: {0}")]
    Recording(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn decompression(msg: impl Into<String>) -> Self {
        Self::Decompression(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn source_unavailable(id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn recording_step(msg: impl Into<String>) -> Self {
        Self::RecordingStep(msg.into())
    }

    pub fn recording(msg: impl Into<String>) -> Self {
        Self::Recording(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    pub fn worker_timeout(seq: u64, waited: Duration) -> Self {
        Self::Worker(format!(
            "decode request #{seq} got no response within {} ms",
            waited.as_millis()
        ))
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for errors that only affect a single frame's handoff.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Self::Encoding(_) | Self::Decompression(_) | Self::Format(_) | Self::Worker(_)
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
