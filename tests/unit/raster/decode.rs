use std::io::Write as _;

use base64::Engine as _;

use super::*;

fn compress_zlib(bytes: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

fn input_from_json(width: u32, height: u32, json: &str) -> NativeRasterInput {
    NativeRasterInput {
        width,
        height,
        data_b64: base64::engine::general_purpose::STANDARD.encode(compress_zlib(json.as_bytes())),
        id: Some("fixture".to_string()),
    }
}

fn input_from_values(width: u32, height: u32, values: &[i64]) -> NativeRasterInput {
    input_from_json(width, height, &serde_json::to_string(values).unwrap())
}

#[test]
fn unpacks_channels_in_fixed_order() {
    let values = [0x4433_2211_i64, 0x0000_00FF, 0x0000_FF00, 0xFF00_0000];
    let frame = decode_native_raster(&input_from_values(2, 2, &values)).unwrap();

    assert_eq!(frame.width, 2);
    assert_eq!(frame.height, 2);
    assert_eq!(frame.pixels.len(), 16);
    assert_eq!(frame.pixel(0, 0), Some([0x11, 0x22, 0x33, 0x44]));
    assert_eq!(frame.pixel(1, 0), Some([255, 0, 0, 0]));
    assert_eq!(frame.pixel(0, 1), Some([0, 255, 0, 0]));
    assert_eq!(frame.pixel(1, 1), Some([0, 0, 0, 255]));
    assert_eq!(frame.pixel(2, 0), None);
}

#[test]
fn every_index_matches_masked_value() {
    let (w, h) = (7u32, 5u32);
    let values: Vec<i64> = (0..(w * h) as i64)
        .map(|i| (i * 0x0101_0101 + 0x00C0_FFEE * i) % 0x1_0000_0000)
        .collect();
    let frame = decode_native_raster(&input_from_values(w, h, &values)).unwrap();

    for (i, &v) in values.iter().enumerate() {
        let px = &frame.pixels[i * 4..i * 4 + 4];
        assert_eq!(px[0] as i64, v & 0xFF);
        assert_eq!(px[1] as i64, (v >> 8) & 0xFF);
        assert_eq!(px[2] as i64, (v >> 16) & 0xFF);
        assert_eq!(px[3] as i64, (v >> 24) & 0xFF);
    }
}

#[test]
fn all_ones_is_unsigned() {
    let frame = decode_native_raster(&input_from_values(1, 1, &[0xFFFF_FFFF])).unwrap();
    assert_eq!(frame.pixels, vec![255, 255, 255, 255]);

    let signed = decode_native_raster(&input_from_values(1, 1, &[-1])).unwrap();
    assert_eq!(signed.pixels, vec![255, 255, 255, 255]);
}

#[test]
fn length_mismatch_is_a_format_error() {
    let short = decode_native_raster(&input_from_values(2, 2, &[1, 2, 3]));
    assert!(matches!(short, Err(ReelError::Format(_))));

    let long = decode_native_raster(&input_from_values(2, 2, &[1, 2, 3, 4, 5]));
    assert!(matches!(long, Err(ReelError::Format(_))));
}

#[test]
fn bad_base64_is_an_encoding_error() {
    let mut input = input_from_values(1, 1, &[0]);
    input.data_b64 = "@@not base64@@".to_string();
    assert!(matches!(
        decode_native_raster(&input),
        Err(ReelError::Encoding(_))
    ));
}

#[test]
fn base64_whitespace_and_missing_padding_are_tolerated() {
    let input = input_from_values(1, 2, &[7, 8]);
    let trimmed = input.data_b64.trim_end_matches('=');
    let (a, b) = trimmed.split_at(trimmed.len() / 2);

    let relaxed = NativeRasterInput {
        data_b64: format!("{a}\n  {b}"),
        ..input.clone()
    };
    assert_eq!(
        decode_native_raster(&relaxed).unwrap(),
        decode_native_raster(&input).unwrap()
    );
}

#[test]
fn garbage_and_truncated_streams_are_decompression_errors() {
    let not_deflate = NativeRasterInput {
        width: 1,
        height: 1,
        data_b64: base64::engine::general_purpose::STANDARD.encode(b"definitely not zlib"),
        id: None,
    };
    assert!(matches!(
        decode_native_raster(&not_deflate),
        Err(ReelError::Decompression(_))
    ));

    let json = serde_json::to_string(&(0..64).collect::<Vec<i64>>()).unwrap();
    let full = compress_zlib(json.as_bytes());
    let truncated = NativeRasterInput {
        width: 8,
        height: 8,
        data_b64: base64::engine::general_purpose::STANDARD.encode(&full[..full.len() / 2]),
        id: None,
    };
    assert!(matches!(
        decode_native_raster(&truncated),
        Err(ReelError::Decompression(_))
    ));

    let empty = NativeRasterInput {
        data_b64: String::new(),
        ..truncated
    };
    assert!(matches!(
        decode_native_raster(&empty),
        Err(ReelError::Decompression(_))
    ));
}

#[test]
fn gzip_wrapped_payload_is_accepted() {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    enc.write_all(b"[4278190335, 16711935]").unwrap();
    let gz = enc.finish().unwrap();

    let input = NativeRasterInput {
        width: 2,
        height: 1,
        data_b64: base64::engine::general_purpose::STANDARD.encode(gz),
        id: None,
    };
    let frame = decode_native_raster(&input).unwrap();
    assert_eq!(frame.pixels, vec![255, 0, 0, 255, 255, 0, 255, 0]);
}

#[test]
fn non_array_or_non_integer_json_is_a_format_error() {
    for json in [r#"{"a":1}"#, "[1, 2.5]", "[1, \"x\"]", "not json"] {
        let res = decode_native_raster(&input_from_json(1, 2, json));
        assert!(matches!(res, Err(ReelError::Format(_))), "{json}");
    }

    let not_utf8 = NativeRasterInput {
        width: 1,
        height: 1,
        data_b64: base64::engine::general_purpose::STANDARD.encode(compress_zlib(&[0xff, 0xfe])),
        id: None,
    };
    assert!(matches!(
        decode_native_raster(&not_utf8),
        Err(ReelError::Format(_))
    ));
}

#[test]
fn zero_dimensions_are_rejected_before_decoding() {
    let mut input = input_from_values(1, 1, &[0]);
    input.height = 0;
    assert!(matches!(
        decode_native_raster(&input),
        Err(ReelError::Validation(_))
    ));
}

#[test]
fn decoded_frame_new_checks_buffer_length() {
    assert!(DecodedFrame::new(2, 1, vec![0; 8]).is_ok());
    assert!(DecodedFrame::new(2, 1, vec![0; 7]).is_err());
}

#[test]
fn oversized_inflated_payload_is_cut_off() {
    // 8 MiB of JSON whitespace compresses to a few KiB.
    let mut bomb = vec![b' '; 8 << 20];
    bomb[0] = b'[';
    bomb.extend_from_slice(b"1]");

    let zlib = input_from_json(1, 1, std::str::from_utf8(&bomb).unwrap());
    let err = decode_native_raster(&zlib).unwrap_err();
    assert!(matches!(err, ReelError::Decompression(_)), "{err}");

    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(&bomb).unwrap();
    let gzip = NativeRasterInput {
        data_b64: base64::engine::general_purpose::STANDARD.encode(enc.finish().unwrap()),
        ..zlib
    };
    let err = decode_native_raster(&gzip).unwrap_err();
    assert!(matches!(err, ReelError::Decompression(_)), "{err}");
}

#[test]
fn padded_but_plausible_payload_fits_the_limit() {
    let json = "[ -2147483648 , 4294967295 ,\n 0 ]";
    let frame = decode_native_raster(&input_from_json(3, 1, json)).unwrap();
    assert_eq!(frame.pixel(1, 0), Some([255, 255, 255, 255]));
    assert!(inflate_limit(3) >= json.len());
}
