//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.
//!
//! Only the boundary can fail: a bad parameter block or a badly shaped image pair. Once the
//! inputs have been accepted the optimisation and post-processing stages are total.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the patchmatch crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A parameter was present but outside its allowed range.
    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParam {
        field: &'static str,
        reason: String
    },

    /// The parameter block could not be parsed, for example because a required field is missing.
    #[error("Could not parse parameters: {0}")]
    ParamsParse(#[from] serde_json::Error),

    /// The parameter file could not be read.
    #[error("Could not read parameters file: {0}")]
    ParamsIo(#[from] std::io::Error),

    /// The left and right images have different dimensions.
    #[error("Image dimensions need to be the same, left is {left:?} but right is {right:?}")]
    ShapeMismatch {
        left: (u32, u32),
        right: (u32, u32)
    },

    /// One of the images has no pixels.
    #[error("Images must contain at least one pixel")]
    EmptyImage,

    /// A raw host buffer does not hold `width * height * 3` bytes.
    #[error("Raw RGB buffer should hold {expected} bytes but holds {actual}")]
    BufferLength {
        expected: usize,
        actual: usize
    }
}
