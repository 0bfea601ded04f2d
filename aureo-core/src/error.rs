use thiserror::Error;

/// Smallest canvas (in pixels) that can carry the three contrast anchors.
pub const MIN_CANVAS_SIZE: u32 = 16;

#[derive(Error, Debug)]
pub enum SealError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Composition failed: {0}")]
    Composition(String),

    #[error(
        "Extraction failed: {block_size}x{block_size} block at ({x}, {y}) exceeds {width}x{height} image"
    )]
    ExtractionOutOfBounds {
        x: u32,
        y: u32,
        block_size: u32,
        width: u32,
        height: u32,
    },

    #[error("Unreadable image: {0}")]
    UnreadableImage(String),

    #[error("Invalid author id: {0}")]
    InvalidAuthor(String),

    #[error("Invalid seal id: {0}")]
    InvalidSealId(String),

    #[error("Operation cancelled after {rows_scanned} rows")]
    Cancelled { rows_scanned: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SealError {
    /// Whether the error means "nothing could be concluded" rather than a failure.
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, SealError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, SealError>;
