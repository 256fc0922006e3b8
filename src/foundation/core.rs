use std::time::Duration;

use crate::foundation::error::{ReelError, ReelResult};

/// One 32-bit pixel holding four 8-bit channels, channel 0 in the low byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PackedPixel(pub u32);

impl PackedPixel {
    /// Reinterpret a JSON integer as unsigned 32-bit (wraps modulo 2^32).
    pub fn from_json_int(v: i64) -> Self {
        Self(v as u32)
    }

    /// Channels in buffer order: `v & 0xFF`, `(v >> 8) & 0xFF`, `(v >> 16) & 0xFF`, `(v >> 24) & 0xFF`.
    pub fn channels(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn from_channels(c: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(c))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> ReelResult<Self> {
        if den == 0 {
            return Err(ReelError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ReelError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// One frame per `interval` (millisecond resolution).
    pub fn from_interval(interval: Duration) -> ReelResult<Self> {
        let ms = u32::try_from(interval.as_millis())
            .map_err(|_| ReelError::validation("frame interval is too long"))?;
        Self::new(1000, ms)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Rational form understood by ffmpeg's `-r`.
    pub fn to_ffmpeg_rate(self) -> String {
        if self.den == 1 {
            self.num.to_string()
        } else {
            format!("{}/{}", self.num, self.den)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
