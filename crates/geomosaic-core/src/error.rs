//! Error types shared by every pipeline stage.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MosaicError>;

/// Errors that abort a mosaic run.
///
/// None of these are recoverable for the current invocation: the pipeline
/// fails fast instead of producing degraded output.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// Contradictory or incomplete options.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A georeference could not be resolved or synthesized.
    #[error("Georeference error: {0}")]
    Georeference(String),

    /// A transform was numerically degenerate.
    #[error("Reprojection error: {0}")]
    Reprojection(String),

    /// The composite bbox has no area after cropping to the canvas.
    #[error("Total bbox is empty ({width}x{height}). Georeference calculation is probably incorrect.")]
    EmptyComposite { width: i64, height: i64 },

    /// The prepared composite has zero rows or columns.
    #[error("Composite image is empty. Georeference calculation is probably incorrect.")]
    EmptyOutput,

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoding or encoding raster data failed.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl MosaicError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        MosaicError::Configuration(msg.into())
    }
}

impl From<image::ImageError> for MosaicError {
    fn from(err: image::ImageError) -> Self {
        MosaicError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MosaicError::config("need at least one input image");
        assert_eq!(
            err.to_string(),
            "Configuration error: need at least one input image"
        );

        let err = MosaicError::EmptyComposite {
            width: 0,
            height: 12,
        };
        assert!(err.to_string().starts_with("Total bbox is empty (0x12)"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.png");
        let err: MosaicError = io.into();
        assert!(matches!(err, MosaicError::Io(_)));
    }
}
