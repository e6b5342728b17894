/// Opaque header in front of the slot count in the `.wzx` index.
pub const INDEX_HEADER_LENGTH: usize = 44;
/// Opaque header at the start of the `.wzl` data file.
pub const DATA_HEADER_LENGTH: usize = 64;
/// The data header repeats the slot count here.
pub const DATA_SLOT_COUNT_OFFSET: usize = 0x2C;
pub const SPRITE_HEADER_LENGTH: usize = 16;
/// Offsets below this cannot point past the data header.
pub const MIN_DATA_OFFSET: u32 = DATA_HEADER_LENGTH as u32;
/// `colorBits` value of 16-bit 5-6-5 sprites. Anything else is palette indexed.
pub const RGB565_COLOR_BITS: u8 = 5;
pub const PALETTE_SIZE: usize = 256;
