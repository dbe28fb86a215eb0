//! Structured error types for xlclone.
//!
//! Every failure of a serialization run is reported to the caller as an
//! [`XlcloneError`]; nothing is swallowed and nothing is retried internally.

/// All errors that can occur while serializing a workbook into a template.
#[derive(Debug, thiserror::Error)]
pub enum XlcloneError {
    /// Malformed row/column pair or cell reference string.
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// A cell value that cannot be represented in worksheet XML.
    #[error("Unsupported cell value: {0}")]
    UnsupportedValue(String),

    /// A part the template must provide is absent.
    #[error("Template part missing: {0}")]
    TemplateMissing(String),

    /// The snapshot and the template manifest disagree (sheet count or order).
    #[error("Package inconsistent: {0}")]
    PackageInconsistent(String),

    /// The snapshot itself violates its preconditions (empty or duplicate sheet names).
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// XML parsing error from quick-xml while reading template parts.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was aborted through its cancellation token.
    #[error("Serialization cancelled")]
    Cancelled,
}

/// Coarse error classification, for front ends that report the kind separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidAddress,
    UnsupportedValue,
    TemplateMissing,
    PackageInconsistent,
    InvalidSnapshot,
    IoFailure,
    Cancelled,
}

impl XlcloneError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Self::UnsupportedValue(_) => ErrorKind::UnsupportedValue,
            Self::TemplateMissing(_) => ErrorKind::TemplateMissing,
            Self::PackageInconsistent(_) => ErrorKind::PackageInconsistent,
            Self::InvalidSnapshot(_) => ErrorKind::InvalidSnapshot,
            // A template part that is not well-formed XML is an unreadable input.
            Self::Xml(_) | Self::Zip(_) | Self::Io(_) => ErrorKind::IoFailure,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidAddress => "InvalidAddress",
            Self::UnsupportedValue => "UnsupportedValue",
            Self::TemplateMissing => "TemplateMissing",
            Self::PackageInconsistent => "PackageInconsistent",
            Self::InvalidSnapshot => "InvalidSnapshot",
            Self::IoFailure => "IOFailure",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XlcloneError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_classify_as_io_failure() {
        let err: XlcloneError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert_eq!(err.kind().to_string(), "IOFailure");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_display_includes_detail() {
        let err = XlcloneError::TemplateMissing("[Content_Types].xml".to_string());
        assert_eq!(
            err.to_string(),
            "Template part missing: [Content_Types].xml"
        );
        assert_eq!(err.kind(), ErrorKind::TemplateMissing);
    }
}
