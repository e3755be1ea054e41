//! The [`TrackTableError`] `enum` definition and error messages.

use polars::prelude::PolarsError;
use std::num::ParseFloatError;
use thiserror::Error;

/// The [`TrackTableError`] defines the standard set of errors that a
/// [`crate::TrackTable`] operation can surface to the caller.
///
/// Every variant is fatal; there is no internal retry. The only soft paths of
/// the parser (type auto-detection and default-type assignment) are reported
/// through warning-level diagnostics instead of errors.
#[derive(Debug, Error)]
pub enum TrackTableError {
    // Raw input shape errors
    #[error("structural validation failed: {0}")]
    StructuralValidation(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Header grammar / dispatch errors
    #[error("no conversion routine is registered for track type or parameter value '{0}'")]
    UnrecognizedTrackType(String),
    #[error("malformed feature token '{0}': at most one '=' is allowed per feature entry")]
    MalformedFeatureToken(String),

    // API misuse
    #[error("the track table has not been parsed yet; call parse() first")]
    Unparsed,

    // Wrapped source errors
    #[error("float parsing error: {0}")]
    ParseFloat(#[from] ParseFloatError),
    #[error("file reading error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}
