use calamine::Data;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single spreadsheet value. Master rows and log rows are both built from these.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

/// A named value, kept in column order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub column: String,
    pub value: CellValue,
}

impl Field {
    pub fn new(column: impl Into<String>, value: CellValue) -> Self {
        Field {
            column: column.into(),
            value,
        }
    }

    pub fn text(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(column, CellValue::Text(value.into()))
    }
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

// Stringified form used for key matching, sorting and export comparisons.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) | CellValue::Error(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{}", *x as i64)
            }
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Bool(true) => f.write_str("True"),
            CellValue::Bool(false) => f.write_str("False"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) if s.is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(x) => CellValue::Float(*x),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map_or(CellValue::Float(dt.as_f64()), CellValue::DateTime),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Error(e.to_string()),
        }
    }
}

// JSON carries scalars as-is; dates and error literals travel as their string form.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_none(),
            CellValue::Int(i) => serializer.serialize_i64(*i),
            CellValue::Float(x) => serializer.serialize_f64(*x),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Text(s) => serializer.serialize_str(s),
            other => serializer.collect_str(other),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireValue::deserialize(deserializer)? {
            WireValue::Null => CellValue::Empty,
            WireValue::Bool(b) => CellValue::Bool(b),
            WireValue::Int(i) => CellValue::Int(i),
            WireValue::Float(x) => CellValue::Float(x),
            WireValue::Text(s) => CellValue::Text(s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn stringifies_like_a_dataframe_cast() {
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::Int(10).to_string(), "10");
        assert_eq!(CellValue::Float(12.0).to_string(), "12");
        assert_eq!(CellValue::Float(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Bool(true).to_string(), "True");
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(CellValue::DateTime(dt).to_string(), "2024-03-09 00:00:00");
    }

    #[test]
    fn json_round_trip_keeps_scalars() {
        let values = vec![
            CellValue::Empty,
            CellValue::Bool(false),
            CellValue::Int(7),
            CellValue::Float(2.25),
            CellValue::text("Ζ-12"),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,false,7,2.25,"Ζ-12"]"#);
        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn blank_detection() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::text("  ").is_blank());
        assert!(!CellValue::Int(0).is_blank());
    }
}
