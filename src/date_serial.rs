//! Calendar date/time to serial day number conversion.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Result, XlcloneError};

/// Excel date system - determines how serial dates are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateSystem {
    /// Windows 1900 date system (default) - serial date 1 = January 1, 1900.
    /// 1900 is treated as a leap year: serial 60 is the nonexistent
    /// February 29, 1900, so every date from March 1, 1900 is one higher
    /// than a true day count.
    #[default]
    Date1900,
    /// Mac 1904 date system - serial date 0 = January 1, 1904
    Date1904,
}

const SECONDS_PER_DAY: f64 = 86_400.0;

impl DateSystem {
    /// Serial number for `dt`: whole days since the epoch plus the time of
    /// day as a fraction.
    ///
    /// # Errors
    /// [`XlcloneError::UnsupportedValue`] for dates before the system's first
    /// representable day (1899-12-30 for 1900; 1904-01-01 for 1904).
    ///
    /// In the 1900 system both 1899-12-30 (the OLE automation zero date) and
    /// 1899-12-31 are day 0, so time-only values from either convention
    /// serialize as a bare fraction.
    pub fn serial(self, dt: &NaiveDateTime) -> Result<f64> {
        let date = dt.date();
        let days = match self {
            Self::Date1900 => {
                let zero = ymd(1899, 12, 31)?;
                if date < ymd(1899, 12, 30)? {
                    return Err(unrepresentable(dt, self));
                }
                let days = (date - zero).num_days().max(0);
                // Skip the fictitious 1900-02-29 for everything after February.
                if date >= ymd(1900, 3, 1)? {
                    days + 1
                } else {
                    days
                }
            }
            Self::Date1904 => {
                let zero = ymd(1904, 1, 1)?;
                if date < zero {
                    return Err(unrepresentable(dt, self));
                }
                (date - zero).num_days()
            }
        };

        let time = dt.time();
        let seconds =
            f64::from(time.num_seconds_from_midnight()) + f64::from(time.nanosecond()) / 1e9;

        #[allow(clippy::cast_precision_loss)]
        let days = days as f64;
        Ok(days + seconds / SECONDS_PER_DAY)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| XlcloneError::UnsupportedValue(format!("{year}-{month}-{day}")))
}

fn unrepresentable(dt: &NaiveDateTime, system: DateSystem) -> XlcloneError {
    XlcloneError::UnsupportedValue(format!(
        "date {dt} precedes the {system:?} epoch"
    ))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, ss)
            .unwrap()
    }

    #[test_case(1900, 1, 1, 1.0; "first day")]
    #[test_case(1900, 2, 28, 59.0; "last day before the phantom leap day")]
    #[test_case(1900, 3, 1, 61.0; "first day after the phantom leap day")]
    #[test_case(1970, 1, 1, 25_569.0; "unix epoch")]
    #[test_case(2024, 1, 31, 45_322.0; "recent date")]
    fn test_1900_serials(y: i32, m: u32, d: u32, expected: f64) {
        assert_eq!(DateSystem::Date1900.serial(&at(y, m, d, 0, 0, 0)).unwrap(), expected);
    }

    #[test]
    fn test_time_fraction() {
        let serial = DateSystem::Date1900.serial(&at(2024, 1, 31, 12, 0, 0)).unwrap();
        assert_eq!(serial, 45_322.5);
        let serial = DateSystem::Date1900.serial(&at(2024, 1, 31, 6, 0, 0)).unwrap();
        assert_eq!(serial, 45_322.25);
    }

    #[test]
    fn test_time_only_values_use_day_zero() {
        let serial = DateSystem::Date1900.serial(&at(1899, 12, 31, 18, 0, 0)).unwrap();
        assert_eq!(serial, 0.75);
    }

    #[test_case(0, 0.0; "midnight")]
    #[test_case(6, 0.25; "morning")]
    #[test_case(18, 0.75; "evening")]
    fn test_ole_zero_date_times_use_day_zero(hour: u32, expected: f64) {
        let ole = DateSystem::Date1900.serial(&at(1899, 12, 30, hour, 0, 0)).unwrap();
        let excel = DateSystem::Date1900.serial(&at(1899, 12, 31, hour, 0, 0)).unwrap();
        assert_eq!(ole, expected);
        assert_eq!(ole, excel);
    }

    #[test]
    fn test_1904_serials() {
        assert_eq!(DateSystem::Date1904.serial(&at(1904, 1, 1, 0, 0, 0)).unwrap(), 0.0);
        // The two systems differ by 1462 days for modern dates.
        let d = at(2024, 1, 31, 0, 0, 0);
        let diff = DateSystem::Date1900.serial(&d).unwrap() - DateSystem::Date1904.serial(&d).unwrap();
        assert_eq!(diff, 1462.0);
    }

    #[test]
    fn test_rejects_dates_before_epoch() {
        assert!(matches!(
            DateSystem::Date1900.serial(&at(1899, 12, 29, 23, 59, 59)),
            Err(XlcloneError::UnsupportedValue(_))
        ));
        assert!(matches!(
            DateSystem::Date1904.serial(&at(1903, 12, 31, 0, 0, 0)),
            Err(XlcloneError::UnsupportedValue(_))
        ));
    }
}
