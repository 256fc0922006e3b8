use std::path::Path;

use anyhow::Context as _;

use crate::{
    foundation::error::{ReelError, ReelResult},
    raster::decode::DecodedFrame,
};

/// A display target holding one RGBA8 image.
pub trait Surface {
    fn dimensions(&self) -> (u32, u32);

    /// Resize to `width x height`; previous contents are discarded.
    fn resize(&mut self, width: u32, height: u32);

    fn pixels(&self) -> &[u8];

    fn pixels_mut(&mut self) -> &mut [u8];
}

/// In-memory RGBA8 surface. Starts empty (0x0).
#[derive(Clone, Debug, Default)]
pub struct PixelSurface {
    image: image::RgbaImage,
}

impl PixelSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self) -> &image::RgbaImage {
        &self.image
    }

    pub fn save_png(&self, path: &Path) -> ReelResult<()> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return Err(ReelError::validation("surface is empty; nothing painted yet"));
        }
        crate::record::ensure_parent_dir(path)?;
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

impl Surface for PixelSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.image = image::RgbaImage::new(width, height);
    }

    fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }
}

/// Paint `frame` at the origin of `surface`, resizing the surface first if needed.
///
/// The whole surface is overwritten; painting the same frame twice leaves identical contents.
pub fn paint<S: Surface + ?Sized>(frame: &DecodedFrame, surface: &mut S) -> ReelResult<()> {
    frame.validate()?;

    if surface.dimensions() != (frame.width, frame.height) {
        tracing::debug!(
            width = frame.width,
            height = frame.height,
            "resizing surface"
        );
        surface.resize(frame.width, frame.height);
    }

    let dst = surface.pixels_mut();
    if dst.len() != frame.pixels.len() {
        return Err(ReelError::validation(format!(
            "surface holds {} bytes after resize, frame has {}",
            dst.len(),
            frame.pixels.len()
        )));
    }
    dst.copy_from_slice(&frame.pixels);
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/render/render.rs"]
mod tests;
