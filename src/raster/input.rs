use crate::foundation::error::{ReelError, ReelResult};

/// One still frame in native-raster form, as stored in a `<id>.json` record.
///
/// `data_b64` is base64 text of a deflate-compressed UTF-8 JSON array holding
/// `width * height` packed pixels.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NativeRasterInput {
    pub width: u32,
    pub height: u32,
    pub data_b64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl NativeRasterInput {
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::validation(format!(
                "raster width/height must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        self.byte_len()?;
        Ok(())
    }

    /// Number of packed pixels the payload must decode to.
    pub fn pixel_count(&self) -> ReelResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| {
                ReelError::validation(format!(
                    "raster dimensions {}x{} overflow",
                    self.width, self.height
                ))
            })
    }

    pub fn byte_len(&self) -> ReelResult<usize> {
        self.pixel_count()?
            .checked_mul(4)
            .ok_or_else(|| ReelError::validation("raster byte length overflows"))
    }

    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("<anonymous>")
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/input.rs"]
mod tests;
