//! OGC documents: WMTS and WMS capabilities, and exception reports.

use std::fmt::{Display, Formatter};

use tilemap_tile_utils::Format;

mod xml;

mod exceptions;
pub use exceptions::ExceptionEnvelope;

mod capabilities;
pub use capabilities::{wms_capabilities, wmts_capabilities};

/// WMTS protocol version.
pub const WMTS_VERSION: &str = "1.0.0";

/// WMS protocol version.
pub const WMS_VERSION: &str = "1.1.1";

/// Raster formats tiles and maps can be delivered in.
pub const OUTPUT_FORMATS: [Format; 3] = [Format::Png, Format::Jpeg, Format::Webp];

/// Whether sources stored as `format` are advertised by the OGC services.
#[must_use]
pub fn is_advertised_format(format: Format) -> bool {
    OUTPUT_FORMATS.contains(&format)
}

/// Output formats of a source stored as `stored`, the stored format first.
#[must_use]
pub fn output_formats(stored: Format) -> Vec<Format> {
    let mut formats = vec![stored];
    formats.extend(OUTPUT_FORMATS.iter().copied().filter(|f| *f != stored));
    formats
}

/// Exception codes shared by WMTS and WMS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    /// A required parameter has no value.
    MissingParameterValue,
    /// A required parameter is absent.
    MissingParameter,
    /// A parameter has a value that cannot be used.
    InvalidParameterValue,
    /// The requested operation is unknown.
    OperationNotSupported,
    /// The layer, tile or format does not exist.
    NotFound,
    /// The server failed to process a valid request.
    NoApplicableCode,
}

impl ExceptionCode {
    /// The code as written into exception reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingParameterValue => "MissingParameterValue",
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::OperationNotSupported => "OperationNotSupported",
            Self::NotFound => "NotFound",
            Self::NoApplicableCode => "NoApplicableCode",
        }
    }
}

impl Display for ExceptionCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol level failure reported to the client.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct OgcException {
    /// Exception code.
    pub code: ExceptionCode,
    /// Human readable description.
    pub message: String,
}

impl OgcException {
    /// Creates an exception.
    #[must_use]
    pub fn new(code: ExceptionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
