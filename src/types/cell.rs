use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single cell's already-computed value.
///
/// There is no formula variant; only cached values are serialized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellValue {
    /// No value; never written to the worksheet.
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Calendar date/time, written as a serial day number.
    Date(NaiveDateTime),
}

impl CellValue {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Tag used in log and error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::Date(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Empty, Into::into)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let v: CellValue = serde_json::from_str(r#"{"number": 100.5}"#).unwrap();
        assert_eq!(v, CellValue::Number(100.5));
        let v: CellValue = serde_json::from_str(r#"{"text": "Q1"}"#).unwrap();
        assert_eq!(v, CellValue::Text("Q1".into()));
        let v: CellValue = serde_json::from_str(r#"{"boolean": true}"#).unwrap();
        assert_eq!(v, CellValue::Boolean(true));
        let v: CellValue = serde_json::from_str(r#""empty""#).unwrap();
        assert!(v.is_empty());
        let v: CellValue = serde_json::from_str(r#"{"date": "2024-01-31T12:30:00"}"#).unwrap();
        assert_eq!(v.type_name(), "date");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(CellValue::from(None::<f64>), CellValue::Empty);
        assert_eq!(CellValue::from(Some("x")), CellValue::Text("x".into()));
    }
}
