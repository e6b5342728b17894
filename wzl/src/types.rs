use std::{ffi::OsStr, path::Path};

use image::RgbaImage;

use crate::{
    constants::{RGB565_COLOR_BITS, SPRITE_HEADER_LENGTH},
    decode::decode_sprite,
    error::WzlError,
    palette::palette_rgba,
    parser::{parse_index, read_sprite_header},
};

/// Slot offsets into the `.wzl` data file. Offset 0 marks an empty slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIndex {
    offsets: Vec<u32>,
}

impl ArchiveIndex {
    pub fn new(offsets: Vec<u32>) -> Self {
        Self { offsets }
    }

    /// Offsets exactly as stored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WzlError> {
        parse_index(bytes, 0)
    }

    /// Offsets below `min_offset` are treated as empty slots.
    pub fn from_bytes_normalized(bytes: &[u8], min_offset: u32) -> Result<Self, WzlError> {
        parse_index(bytes, min_offset)
    }

    pub fn from_file(path: impl AsRef<Path> + AsRef<OsStr>) -> Result<Self, WzlError> {
        let bytes = std::fs::read(path)?;

        Self::from_bytes(&bytes)
    }

    pub fn slot_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn offset(&self, slot: usize) -> Option<u32> {
        self.offsets.get(slot).copied()
    }

    pub fn is_empty_slot(&self, slot: usize) -> bool {
        self.offset(slot) == Some(0)
    }

    /// Offset of the first non-empty slot after `slot`.
    pub fn next_non_empty_offset(&self, slot: usize) -> Option<u32> {
        self.offsets
            .iter()
            .skip(slot + 1)
            .copied()
            .find(|&offset| offset != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    /// One byte per pixel, looked up in the palette.
    Indexed8,
    /// Little-endian 5-6-5, pure black is transparent.
    Rgb565,
}

impl ColorDepth {
    pub fn from_color_bits(color_bits: u8) -> Self {
        if color_bits == RGB565_COLOR_BITS {
            Self::Rgb565
        } else {
            Self::Indexed8
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Indexed8 => 1,
            Self::Rgb565 => 2,
        }
    }

    /// Stored row length. Rows are padded to a 4 byte boundary.
    pub fn row_stride(self, width: usize) -> usize {
        let bits = width * self.bytes_per_pixel() * 8;

        bits.div_ceil(32) * 4
    }
}

/// The 16 bytes in front of every sprite payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteHeader {
    pub color_bits: u8,
    pub compressed: bool,
    pub reserved: u16,
    pub width: i16,
    pub height: i16,
    pub anchor_x: i16,
    pub anchor_y: i16,
    pub payload_length: u32,
}

impl SpriteHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, WzlError> {
        read_sprite_header(bytes)
    }

    pub fn color_depth(&self) -> ColorDepth {
        ColorDepth::from_color_bits(self.color_bits)
    }

    /// A zero payload length means raw pixels follow, whatever the flag says.
    pub fn is_compressed(&self) -> bool {
        self.compressed && self.payload_length != 0
    }

    /// Bytes the payload occupies after the header.
    pub fn stored_length(&self) -> usize {
        if self.payload_length != 0 {
            return self.payload_length as usize;
        }

        let width = self.width.max(0) as usize;
        let height = self.height.max(0) as usize;

        width * height * self.color_depth().bytes_per_pixel()
    }
}

/// A header and its payload, borrowed out of a read window.
#[derive(Debug, Clone, Copy)]
pub struct SpriteRecord<'a> {
    pub header: SpriteHeader,
    pub payload: &'a [u8],
}

impl<'a> SpriteRecord<'a> {
    /// Reads the record at the start of `window`.
    ///
    /// `None` when the window ends before the header or payload does.
    pub fn read(window: &'a [u8]) -> Option<Self> {
        let header = SpriteHeader::parse(window).ok()?;
        let end = SPRITE_HEADER_LENGTH.checked_add(header.stored_length())?;
        let payload = window.get(SPRITE_HEADER_LENGTH..end)?;

        Some(Self { header, payload })
    }

    /// Header plus payload.
    pub fn encoded_length(&self) -> usize {
        SPRITE_HEADER_LENGTH + self.payload.len()
    }

    pub fn decode(&self) -> Result<Sprite, WzlError> {
        decode_sprite(&self.header, self.payload)
    }
}

/// Decoded sprite. `pixels` is `width * height` RGBA, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub is_empty: bool,
    pub width: u16,
    pub height: u16,
    pub anchor_x: i16,
    pub anchor_y: i16,
    pub pixels: Vec<u8>,
}

impl Sprite {
    /// Stand-in for empty slots: one pixel of palette entry 0.
    pub fn empty() -> Self {
        Self {
            is_empty: true,
            width: 1,
            height: 1,
            anchor_x: 0,
            anchor_y: 0,
            pixels: palette_rgba(0).to_vec(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let start = (y as usize * self.width as usize + x as usize) * 4;
        let pixel = self.pixels.get(start..start + 4)?;

        Some([pixel[0], pixel[1], pixel[2], pixel[3]])
    }

    /// Returns None only if `pixels` does not match the dimensions.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width as u32, self.height as u32, self.pixels.clone())
    }
}
