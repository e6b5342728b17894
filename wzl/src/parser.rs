use nom::{
    bytes::complete::take,
    combinator::map,
    multi::count,
    number::complete::{le_i16, le_u16, le_u32, le_u8},
    IResult as _IResult, Parser,
};

use crate::{
    constants::{INDEX_HEADER_LENGTH, SPRITE_HEADER_LENGTH},
    error::WzlError,
    types::{ArchiveIndex, SpriteHeader},
};

pub type IResult<'a, T> = _IResult<&'a [u8], T>;

/// `[44-byte header][u32 slot count]`
pub fn parse_slot_count(i: &'_ [u8]) -> IResult<'_, u32> {
    let (i, _header) = take(INDEX_HEADER_LENGTH).parse(i)?;

    le_u32(i)
}

/// `[44-byte header][u32 slot count][u32 offset; slot count]`
pub fn parse_index_body(i: &'_ [u8]) -> IResult<'_, Vec<u32>> {
    let (i, slot_count) = parse_slot_count(i)?;

    count(le_u32, slot_count as usize).parse(i)
}

pub fn parse_sprite_header(i: &'_ [u8]) -> IResult<'_, SpriteHeader> {
    map(
        (le_u8, le_u8, le_u16, le_i16, le_i16, le_i16, le_i16, le_u32),
        |(color_bits, compressed, reserved, width, height, anchor_x, anchor_y, payload_length)| {
            SpriteHeader {
                color_bits,
                compressed: compressed != 0,
                reserved,
                width,
                height,
                anchor_x,
                anchor_y,
                payload_length,
            }
        },
    )
    .parse(i)
}

/// Parses the index and zeroes every offset below `min_offset`.
///
/// `min_offset == 0` keeps the offsets exactly as stored.
pub fn parse_index(bytes: &[u8], min_offset: u32) -> Result<ArchiveIndex, WzlError> {
    let count_end = INDEX_HEADER_LENGTH + 4;

    let (_, slot_count) = parse_slot_count(bytes).map_err(|_| WzlError::MalformedIndex {
        expect: count_end as u64,
        have: bytes.len(),
    })?;
    let expect = count_end as u64 + 4 * slot_count as u64;

    // checked up front so a garbage count never reaches the allocator
    if (bytes.len() as u64) < expect {
        return Err(WzlError::MalformedIndex {
            expect,
            have: bytes.len(),
        });
    }

    let (_, mut offsets) = parse_index_body(bytes).map_err(|_| WzlError::MalformedIndex {
        expect,
        have: bytes.len(),
    })?;

    offsets
        .iter_mut()
        .filter(|offset| **offset < min_offset)
        .for_each(|offset| *offset = 0);

    Ok(ArchiveIndex::new(offsets))
}

pub fn read_sprite_header(bytes: &[u8]) -> Result<SpriteHeader, WzlError> {
    if bytes.len() < SPRITE_HEADER_LENGTH {
        return Err(WzlError::ParseSpriteHeader);
    }

    parse_sprite_header(bytes)
        .map(|(_, header)| header)
        .map_err(|_| WzlError::ParseSpriteHeader)
}
