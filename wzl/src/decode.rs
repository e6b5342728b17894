//! Sprite payload to RGBA.
//!
//! Stored rows run bottom to top and each one starts with its alignment
//! padding. Output rows run top to bottom without padding.
use std::{borrow::Cow, io::Read};

use flate2::read::ZlibDecoder;

use crate::{
    error::WzlError,
    palette::palette_rgba,
    types::{ColorDepth, Sprite, SpriteHeader},
};

/// zlib inflate, as used for compressed payloads and served index files.
pub fn inflate(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut res = vec![];

    decoder.read_to_end(&mut res)?;

    Ok(res)
}

/// Expands 5-6-5 to 8 bits per channel. Pure black becomes transparent.
///
/// The high bits of each channel are copied into its low bits, so values
/// differ from a plain left shift: `0xF800` gives red 255 instead of 248
/// and `0x8410` gives `(132, 130, 132)` instead of `(128, 128, 128)`.
pub fn rgb565_to_rgba(value: u16) -> [u8; 4] {
    let r = ((value & 0xF800) >> 8) as u8;
    let g = ((value & 0x07E0) >> 3) as u8;
    let b = ((value & 0x001F) << 3) as u8;

    // replicate the high bits into the low ones so full intensity is 255
    let r = r | (r >> 5);
    let g = g | (g >> 6);
    let b = b | (b >> 5);

    let a = if r == 0 && g == 0 && b == 0 { 0 } else { 255 };

    [r, g, b, a]
}

pub fn decode_sprite(header: &SpriteHeader, payload: &[u8]) -> Result<Sprite, WzlError> {
    if header.width < 0 || header.height < 0 {
        return Err(WzlError::InvalidDimensions {
            width: header.width,
            height: header.height,
        });
    }

    let width = header.width as usize;
    let height = header.height as usize;

    let pixels = if header.is_compressed() {
        Cow::Owned(inflate(payload).map_err(|source| WzlError::Decompress { source })?)
    } else {
        Cow::Borrowed(payload)
    };

    let rgba = match header.color_depth() {
        ColorDepth::Indexed8 => {
            unpack_rows(&pixels, width, height, ColorDepth::Indexed8, |src, dst| {
                dst.copy_from_slice(&palette_rgba(src[0]))
            })?
        }
        ColorDepth::Rgb565 => unpack_rows(&pixels, width, height, ColorDepth::Rgb565, |src, dst| {
            dst.copy_from_slice(&rgb565_to_rgba(u16::from_le_bytes([src[0], src[1]])))
        })?,
    };

    Ok(Sprite {
        is_empty: false,
        width: width as u16,
        height: height as u16,
        anchor_x: header.anchor_x,
        anchor_y: header.anchor_y,
        pixels: rgba,
    })
}

fn unpack_rows(
    pixels: &[u8],
    width: usize,
    height: usize,
    depth: ColorDepth,
    convert: impl Fn(&[u8], &mut [u8]),
) -> Result<Vec<u8>, WzlError> {
    let mut res = vec![0u8; width * height * 4];

    if width == 0 || height == 0 {
        return Ok(res);
    }

    let bytes_per_pixel = depth.bytes_per_pixel();
    let packed_stride = width * bytes_per_pixel;
    let aligned_stride = depth.row_stride(width);

    // zero length records only carry `width * height` pixels, without padding
    let stride = if pixels.len() >= aligned_stride * height {
        aligned_stride
    } else {
        packed_stride
    };
    let padding = stride - packed_stride;
    let expect = stride * height;

    if pixels.len() < expect {
        return Err(WzlError::PixelDataTooShort {
            expect: aligned_stride * height,
            have: pixels.len(),
        });
    }

    let out_stride = width * 4;

    pixels
        .chunks_exact(stride)
        .take(height)
        .enumerate()
        .for_each(|(stored_row, row)| {
            let out_row = height - 1 - stored_row;
            let out = &mut res[out_row * out_stride..(out_row + 1) * out_stride];

            row[padding..]
                .chunks_exact(bytes_per_pixel)
                .zip(out.chunks_exact_mut(4))
                .for_each(|(src, dst)| convert(src, dst));
        });

    Ok(res)
}
