//! Custom error types for coordinate extraction and CRS handling

use std::fmt;
use std::io;

/// Coarse classification of a [`GeoError`]
///
/// Calling tooling (CLI, crawlers) branches on this to decide whether to
/// retry, skip the input, or abort the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    UnknownCrs,
    Projection,
    Transform,
    GeoidDataUnavailable,
    Document,
    BatchTooLarge,
    Config,
    Io,
}

/// Errors raised by parsers, the CRS registry and the transform engine
#[derive(Debug)]
pub enum GeoError {
    /// Malformed literal for a specific coordinate format
    Parse {
        /// Format name ("dms", "utm", "mgrs", ...)
        format: &'static str,
        /// Human readable reason
        message: String,
    },
    /// EPSG code or alias that the registry cannot resolve
    UnknownCrs(String),
    /// Mathematically undefined projection input (e.g. UTM for a polar point)
    Projection(String),
    /// No valid pipeline between two reference systems
    Transform {
        from: String,
        to: String,
        message: String,
    },
    /// Geoid height requested without a usable grid
    GeoidDataUnavailable(String),
    /// Structured payload (KML, GML, GeoJSON) that cannot be read
    Document {
        format: &'static str,
        message: String,
    },
    /// Coordinate batch exceeds the configured cap
    BatchTooLarge { len: usize, limit: usize },
    /// Invalid configuration value
    Config(String),
    /// I/O error
    Io(io::Error),
}

impl GeoError {
    /// Shorthand for building a parse error
    pub fn parse(format: &'static str, message: impl Into<String>) -> Self {
        GeoError::Parse { format, message: message.into() }
    }

    /// Shorthand for building a document error
    pub fn document(format: &'static str, message: impl Into<String>) -> Self {
        GeoError::Document { format, message: message.into() }
    }

    /// Shorthand for building a transform error
    pub fn transform(from: &str, to: &str, message: impl Into<String>) -> Self {
        GeoError::Transform {
            from: from.to_string(),
            to: to.to_string(),
            message: message.into(),
        }
    }

    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeoError::Parse { .. } => ErrorKind::Parse,
            GeoError::UnknownCrs(_) => ErrorKind::UnknownCrs,
            GeoError::Projection(_) => ErrorKind::Projection,
            GeoError::Transform { .. } => ErrorKind::Transform,
            GeoError::GeoidDataUnavailable(_) => ErrorKind::GeoidDataUnavailable,
            GeoError::Document { .. } => ErrorKind::Document,
            GeoError::BatchTooLarge { .. } => ErrorKind::BatchTooLarge,
            GeoError::Config(_) => ErrorKind::Config,
            GeoError::Io(_) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for GeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoError::Parse { format, message } => write!(f, "Cannot parse {} coordinate: {}", format, message),
            GeoError::UnknownCrs(name) => write!(f, "Unknown CRS: {}", name),
            GeoError::Projection(msg) => write!(f, "Projection error: {}", msg),
            GeoError::Transform { from, to, message } => {
                write!(f, "No transform from {} to {}: {}", from, to, message)
            },
            GeoError::GeoidDataUnavailable(msg) => write!(f, "Geoid data unavailable: {}", msg),
            GeoError::Document { format, message } => write!(f, "Invalid {} document: {}", format, message),
            GeoError::BatchTooLarge { len, limit } => {
                write!(f, "Coordinate batch of {} exceeds the limit of {}", len, limit)
            },
            GeoError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GeoError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for GeoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for GeoError {
    fn from(error: io::Error) -> Self {
        GeoError::Io(error)
    }
}

impl From<String> for GeoError {
    fn from(msg: String) -> Self {
        GeoError::Config(msg)
    }
}

/// Result type for coordinate and CRS operations
pub type GeoResult<T> = Result<T, GeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(GeoError::parse("dms", "bad").kind(), ErrorKind::Parse);
        assert_eq!(GeoError::UnknownCrs("FOO".into()).kind(), ErrorKind::UnknownCrs);
        assert_eq!(GeoError::transform("EPSG:4267", "EPSG:4326", "no grid").kind(), ErrorKind::Transform);
        assert_eq!(GeoError::BatchTooLarge { len: 10, limit: 5 }.kind(), ErrorKind::BatchTooLarge);
    }

    #[test]
    fn test_display_mentions_format() {
        let err = GeoError::parse("mgrs", "odd digit count");
        assert_eq!(err.to_string(), "Cannot parse mgrs coordinate: odd digit count");
    }
}
