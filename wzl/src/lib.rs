//! WZL texture library parsing
//!
//! A library is a pair of files. The `.wzx` index holds one offset per slot
//! into the `.wzl` data file, where every non-empty slot is a 16 byte sprite
//! header followed by its (maybe zlib compressed) pixels.
pub mod constants;
mod decode;
pub mod error;
pub mod palette;
mod parser;
mod types;

pub use decode::{decode_sprite, inflate, rgb565_to_rgba};
pub use error::WzlError;
pub use palette::{palette_entry, palette_rgba, PALETTE_ARGB};
pub use parser::{parse_index, parse_sprite_header};
pub use types::*;
