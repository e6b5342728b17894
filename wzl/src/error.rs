#[derive(Debug, thiserror::Error)]
pub enum WzlError {
    #[error("Malformed index. Expect at least ({expect}) bytes. Have ({have})")]
    MalformedIndex { expect: u64, have: usize },
    #[error("Failed to parse sprite header")]
    ParseSpriteHeader,
    #[error("Invalid sprite dimensions: {width}x{height}")]
    InvalidDimensions { width: i16, height: i16 },
    #[error("Pixel data too short. Expect ({expect}). Have ({have})")]
    PixelDataTooShort { expect: usize, have: usize },
    #[error("Failed to inflate sprite payload: {source}")]
    Decompress {
        #[source]
        source: std::io::Error,
    },
    #[error("IOError: {source}")]
    IOError {
        #[from]
        source: std::io::Error,
    },
}
