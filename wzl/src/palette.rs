//! The client's stock 256 colour table used by 8-bit sprites.

use crate::constants::PALETTE_SIZE;

/// Packed `0xAARRGGBB`, so `to_be_bytes` yields `{alpha, red, green, blue}`.
///
/// Entry 0 is the transparent key colour.
pub static PALETTE_ARGB: [u32; PALETTE_SIZE] = [
    0x00000000, 0xFF800000, 0xFF008000, 0xFF808000, 0xFF000080, 0xFF800080, 0xFF008080, 0xFFC0C0C0,
    0xFF558097, 0xFF9DB9C8, 0xFF7B7373, 0xFF2D2929, 0xFF5A5252, 0xFF635A5A, 0xFF423939, 0xFF1D1818,
    0xFF181010, 0xFF291818, 0xFF100808, 0xFFF29F71, 0xFFE1675F, 0xFFFF5A5A, 0xFFFF3131, 0xFFD65A52,
    0xFF941000, 0xFF942918, 0xFF390800, 0xFF731000, 0xFFB51800, 0xFFBD6352, 0xFF421810, 0xFFFFAA99,
    0xFF5A1000, 0xFF733929, 0xFFA54A31, 0xFF947B73, 0xFFBD5231, 0xFF522110, 0xFF7B3118, 0xFF2D1810,
    0xFF8C4A31, 0xFF942910, 0xFFB53918, 0xFFC66342, 0xFF6B3121, 0xFFA54A29, 0xFFAD8C7B, 0xFF845A42,
    0xFF211008, 0xFF946B52, 0xFF6B4A39, 0xFFC6A594, 0xFF4A2910, 0xFF7B6B5A, 0xFF633118, 0xFF422910,
    0xFF635242, 0xFF5A4231, 0xFF8C6339, 0xFF9C6331, 0xFFB5946B, 0xFF392918, 0xFF7B6342, 0xFF422918,
    0xFF635A52, 0xFF6B5A4A, 0xFF847363, 0xFF312110, 0xFF423121, 0xFF734A21, 0xFF948C84, 0xFF6B5A42,
    0xFF8C7352, 0xFF392910, 0xFF5A4221, 0xFFE7C69C, 0xFF846B4A, 0xFF635239, 0xFFE7A54A, 0xFF846339,
    0xFF5A4A31, 0xFF735A39, 0xFF4A3921, 0xFF292110, 0xFF9C7B4A, 0xFF181008, 0xFF94846B, 0xFFAD8C5A,
    0xFF291808, 0xFF6B5231, 0xFF8C7B5A, 0xFFBD9C6B, 0xFF9C8463, 0xFF6B6352, 0xFFC6AD84, 0xFF524A39,
    0xFF948C73, 0xFF6B5A31, 0xFF4A4231, 0xFF313121, 0xFF524A31, 0xFF8C7B4A, 0xFF423918, 0xFF5A5231,
    0xFF737352, 0xFF7B7B5A, 0xFF9C9C7B, 0xFF212110, 0xFF393918, 0xFF5A5A31, 0xFF6B6B4A, 0xFF292918,
    0xFF21291A, 0xFF394A39, 0xFF4A6352, 0xFF213121, 0xFF526352, 0xFF395239, 0xFF294229, 0xFF638463,
    0xFF314231, 0xFF182918, 0xFF4A5A4A, 0xFF425242, 0xFF294A4A, 0xFF185252, 0xFF104A4A, 0xFF082929,
    0xFF107373, 0xFF216B6B, 0xFF397B7B, 0xFF5A8C8C, 0xFF526B6B, 0xFF314242, 0xFF637B7B, 0xFF5A9494,
    0xFF428C9C, 0xFF316B7B, 0xFF294A5A, 0xFF082139, 0xFF183952, 0xFF4A637B, 0xFF5A7394, 0xFF42526B,
    0xFF29395A, 0xFF10214A, 0xFF394A73, 0xFF213163, 0xFF52638C, 0xFF6B7BA5, 0xFF101839, 0xFF081031,
    0xFF181842, 0xFF29297B, 0xFF31318C, 0xFF5252A5, 0xFF18109C, 0xFF21188C, 0xFF3121A5, 0xFF5A4AC6,
    0xFF7B63D6, 0xFF6B5AB5, 0xFF3A2A73, 0xFF4A3984, 0xFF5A4A94, 0xFF312963, 0xFF21184A, 0xFF29215A,
    0xFF523973, 0xFF6B4A8C, 0xFF7B5AAD, 0xFF5A3173, 0xFF42294A, 0xFF63425A, 0xFF7B5273, 0xFF9C6B94,
    0xFF8C4273, 0xFF73315A, 0xFF5A214A, 0xFF4A1839, 0xFF841852, 0xFFA52963, 0xFFC63973, 0xFFBD5A84,
    0xFF944A63, 0xFF633139, 0xFF391821, 0xFF7B4A52, 0xFF9C636B, 0xFFB58484, 0xFFCE9C9C, 0xFFE7C6C6,
    0xFFFFE7E7, 0xFFFFD6D6, 0xFFF7B5B5, 0xFFEF9494, 0xFFDE7373, 0xFFCE5A5A, 0xFFB54242, 0xFF9C2929,
    0xFF841818, 0xFF6B1010, 0xFF520808, 0xFF390000, 0xFF290000, 0xFF180000, 0xFF310808, 0xFF4A1010,
    0xFF632118, 0xFF7B2929, 0xFF943131, 0xFFAD4239, 0xFFC65242, 0xFFDE6B52, 0xFFEF8463, 0xFFFFA573,
    0xFFFFC694, 0xFFFFDEB5, 0xFFFFEFD6, 0xFFF7F7E7, 0xFFE7E7D6, 0xFFD6D6C6, 0xFFC6C6B5, 0xFFADAD9C,
    0xFFCECEB5, 0xFFDEDEC6, 0xFFEFEFD6, 0xFFB5B5A5, 0xFF9C9C8C, 0xFF84847B, 0xFF6B6B63, 0xFF52524A,
    0xFF42424A, 0xFF39394A, 0xFF31314A, 0xFF292942, 0xFF212139, 0xFF181831, 0xFF101029, 0xFF080821,
    0xFF000018, 0xFF080808, 0xFF101010, 0xFF0000C8, 0xFF0000F8, 0xFF0000FF, 0xFFFFFBF0, 0xFFA0A0A4,
    0xFF808080, 0xFFFF0000, 0xFF00FF00, 0xFFFFFF00, 0xFF0000FF, 0xFFFF00FF, 0xFF00FFFF, 0xFFFFFFFF,
];

/// Palette entry in storage order: `{alpha, red, green, blue}`.
pub fn palette_entry(index: u8) -> [u8; 4] {
    PALETTE_ARGB[index as usize].to_be_bytes()
}

/// Palette entry as an output pixel: `{red, green, blue, alpha}`.
pub fn palette_rgba(index: u8) -> [u8; 4] {
    let [a, r, g, b] = palette_entry(index);
    [r, g, b, a]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_colour_is_transparent() {
        assert_eq!(palette_entry(0), [0, 0, 0, 0]);
        assert_eq!(palette_rgba(0), [0, 0, 0, 0]);
    }

    #[test]
    fn entry_order_is_swizzled() {
        // 0xFF800000 is dark red
        assert_eq!(palette_entry(1), [255, 128, 0, 0]);
        assert_eq!(palette_rgba(1), [128, 0, 0, 255]);

        assert_eq!(palette_rgba(255), [255, 255, 255, 255]);
    }

    #[test]
    fn only_key_colour_is_transparent() {
        assert!(PALETTE_ARGB
            .iter()
            .skip(1)
            .all(|entry| entry >> 24 == 0xFF));
    }
}
