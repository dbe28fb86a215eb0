//! Serialization settings.
//!
//! There is no global configuration: callers build a [`SerializeOptions`]
//! (the CLI maps its flags onto one) and hand it to the
//! [`Serializer`](crate::Serializer).

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::{Result, XlcloneError};

/// Timestamp stamped on every zip entry.
///
/// Fixed rather than wall-clock so identical inputs give identical archives.
/// Zip stores DOS times, so only 1980..=2107 at two-second resolution is
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Default for ArchiveTimestamp {
    /// 1980-01-01 00:00:00, the zip epoch.
    fn default() -> Self {
        Self {
            year: 1980,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl ArchiveTimestamp {
    /// Convert to the zip crate's DOS timestamp.
    ///
    /// # Errors
    /// [`XlcloneError::UnsupportedValue`] outside the DOS time range.
    pub fn to_zip(self) -> Result<zip::DateTime> {
        zip::DateTime::from_date_and_time(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
        .map_err(|()| {
            XlcloneError::UnsupportedValue(format!("archive timestamp {self} is not a zip date"))
        })
    }
}

impl std::fmt::Display for ArchiveTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl FromStr for ArchiveTimestamp {
    type Err = XlcloneError;

    /// Parse `"YYYY-MM-DD HH:MM:SS"`.
    fn from_str(s: &str) -> Result<Self> {
        let dt = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
            .map_err(|e| XlcloneError::UnsupportedValue(format!("timestamp {s:?}: {e}")))?;
        let narrow = |v: u32| u8::try_from(v).unwrap_or(u8::MAX);
        let ts = Self {
            year: u16::try_from(dt.year()).map_err(|_| {
                XlcloneError::UnsupportedValue(format!("timestamp {s:?}: year out of range"))
            })?,
            month: narrow(dt.month()),
            day: narrow(dt.day()),
            hour: narrow(dt.hour()),
            minute: narrow(dt.minute()),
            second: narrow(dt.second()),
        };
        ts.to_zip()?;
        Ok(ts)
    }
}

/// Compression applied to every entry of the output archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    pub(crate) fn method(self) -> zip::CompressionMethod {
        match self {
            Self::Deflated => zip::CompressionMethod::Deflated,
            Self::Stored => zip::CompressionMethod::Stored,
        }
    }
}

/// How date cells pick their style index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStyle {
    /// Use the first date-formatted cell style the template's stylesheet defines.
    #[default]
    Auto,
    /// Use this cell style index; it must be a `cellXfs` entry of the template.
    Index(u32),
    /// Give date cells no style; they display as plain serial numbers.
    Unstyled,
}

/// Cooperative cancellation flag shared between a caller and a running serialization.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Settings for one [`Serializer`](crate::Serializer).
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    pub archive_timestamp: ArchiveTimestamp,
    pub compression: Compression,
    /// Style index for generated non-date cells; `None` writes no `s` attribute.
    /// It must be a `cellXfs` entry of the template.
    pub default_style: Option<u32>,
    pub date_style: DateStyle,
    /// Treat a sheet-name mismatch with the template as an error instead of a warning.
    pub strict_sheet_names: bool,
    pub cancellation: Option<CancellationToken>,
}

impl SerializeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn archive_timestamp(mut self, ts: ArchiveTimestamp) -> Self {
        self.archive_timestamp = ts;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn default_style(mut self, style: Option<u32>) -> Self {
        self.default_style = style;
        self
    }

    #[must_use]
    pub fn date_style(mut self, style: DateStyle) -> Self {
        self.date_style = style;
        self
    }

    #[must_use]
    pub fn strict_sheet_names(mut self, strict: bool) -> Self {
        self.strict_sheet_names = strict;
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fail with [`XlcloneError::Cancelled`] once the token has been cancelled.
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(XlcloneError::Cancelled),
            _ => Ok(()),
        }
    }
}
