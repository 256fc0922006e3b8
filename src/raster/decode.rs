use std::io::Read as _;

use base64::Engine as _;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use flate2::{Decompress, FlushDecompress, Status};

use crate::{
    foundation::core::PackedPixel,
    foundation::error::{ReelError, ReelResult},
    raster::input::NativeRasterInput,
};

/// Standard alphabet, padding optional, lenient about trailing bits.
const TRANSPORT: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Inflated bytes allowed per expected element: a signed 32-bit value plus separator
/// and some whitespace.
const MAX_BYTES_PER_ELEMENT: usize = 24;
const MAX_ARRAY_OVERHEAD: usize = 64;

/// Uncompressed RGBA8 pixels (straight alpha), row-major from the top-left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> ReelResult<Self> {
        let frame = Self {
            width,
            height,
            pixels,
        };
        frame.validate()?;
        Ok(frame)
    }

    pub fn validate(&self) -> ReelResult<()> {
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| ReelError::validation("frame dimensions overflow"))?;
        if self.pixels.len() != expected {
            return Err(ReelError::validation(format!(
                "frame buffer is {} bytes, expected {expected} for {}x{}",
                self.pixels.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// RGBA of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Decode a native-raster record into an RGBA8 frame.
///
/// Pipeline:
/// 1. base64 text -> compressed bytes ([`ReelError::Encoding`])
/// 2. zlib/gzip inflate -> UTF-8 JSON ([`ReelError::Decompression`])
/// 3. JSON integer array of exactly `width * height` values ([`ReelError::Format`])
/// 4. each value unpacked as [`PackedPixel`] into 4 bytes
#[tracing::instrument(
    skip(input),
    fields(id = input.label(), width = input.width, height = input.height)
)]
pub fn decode_native_raster(input: &NativeRasterInput) -> ReelResult<DecodedFrame> {
    input.validate()?;
    let expected = input.pixel_count()?;

    let compressed = decode_transport(&input.data_b64)?;
    let json = inflate(&compressed, inflate_limit(expected))?;
    let values = parse_pixel_array(&json)?;

    if values.len() != expected {
        return Err(ReelError::format(format!(
            "pixel array has {} elements, expected {expected} for {}x{}",
            values.len(),
            input.width,
            input.height
        )));
    }

    let mut pixels = vec![0u8; expected * 4];
    for (dst, &v) in pixels.chunks_exact_mut(4).zip(values.iter()) {
        dst.copy_from_slice(&PackedPixel::from_json_int(v).channels());
    }

    tracing::debug!(bytes = pixels.len(), "decoded native raster");
    Ok(DecodedFrame {
        width: input.width,
        height: input.height,
        pixels,
    })
}

fn decode_transport(text: &str) -> ReelResult<Vec<u8>> {
    let compact: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    TRANSPORT
        .decode(&compact)
        .map_err(|e| ReelError::encoding(format!("invalid base64 payload: {e}")))
}

/// Largest inflated payload a frame of `elements` pixels can legitimately need.
pub(crate) fn inflate_limit(elements: usize) -> usize {
    elements
        .saturating_mul(MAX_BYTES_PER_ELEMENT)
        .saturating_add(MAX_ARRAY_OVERHEAD)
}

fn too_large(limit: usize) -> ReelError {
    ReelError::decompression(format!("inflated payload exceeds {limit} bytes"))
}

fn inflate(bytes: &[u8], limit: usize) -> ReelResult<Vec<u8>> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(bytes)
            .take((limit as u64).saturating_add(1))
            .read_to_end(&mut out)
            .map_err(|e| ReelError::decompression(format!("gzip stream: {e}")))?;
        if out.len() > limit {
            return Err(too_large(limit));
        }
        return Ok(out);
    }
    inflate_zlib(bytes, limit)
}

// `flate2::read::ZlibDecoder` returns a short read on truncated input, so drive the
// decompressor directly and insist on reaching the end of the stream.
fn inflate_zlib(bytes: &[u8], limit: usize) -> ReelResult<Vec<u8>> {
    let mut d = Decompress::new(true);
    let initial = bytes.len().saturating_mul(4).clamp(64, limit.saturating_add(1));
    let mut out = Vec::with_capacity(initial);

    loop {
        if out.len() > limit {
            return Err(too_large(limit));
        }
        if out.len() == out.capacity() {
            let room = limit.saturating_add(1) - out.len();
            out.reserve(out.capacity().max(4096).min(room));
        }
        let consumed = d.total_in() as usize;
        let (in_before, out_before) = (d.total_in(), d.total_out());

        let status = d
            .decompress_vec(&bytes[consumed..], &mut out, FlushDecompress::Finish)
            .map_err(|e| ReelError::decompression(format!("zlib stream: {e}")))?;

        match status {
            Status::StreamEnd if out.len() <= limit => return Ok(out),
            Status::StreamEnd => return Err(too_large(limit)),
            Status::Ok | Status::BufError => {
                let stalled = d.total_in() == in_before && d.total_out() == out_before;
                if stalled && out.len() < out.capacity() {
                    return Err(ReelError::decompression(format!(
                        "zlib stream truncated after {} of {} bytes",
                        d.total_in(),
                        bytes.len()
                    )));
                }
            }
        }
    }
}

fn parse_pixel_array(bytes: &[u8]) -> ReelResult<Vec<i64>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ReelError::format(format!("payload is not UTF-8: {e}")))?;
    serde_json::from_str(text)
        .map_err(|e| ReelError::format(format!("payload is not a JSON integer array: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/raster/decode.rs"]
mod tests;
