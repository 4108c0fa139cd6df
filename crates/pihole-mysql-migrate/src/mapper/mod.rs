//! Positional mapping from Pi-hole load-query columns to destination fields.
//!
//! The load query returns the 8 `queries` columns followed by the 5
//! `network_addresses` columns. Each mapped position is coerced to its
//! declared destination type; position 9 (`na.ip`, a duplicate of the
//! client address) is not mapped.

use chrono::{DateTime, Datelike, NaiveDateTime};

use crate::core::{MigrationRecord, SourceValue, SqlValue};
use crate::error::{MigrateError, Result};

/// Declared destination type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Timestamp,
    Str,
}

/// One source position mapped to a named destination column.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub source_index: usize,
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn field(source_index: usize, name: &'static str, field_type: FieldType) -> FieldMapping {
    FieldMapping {
        source_index,
        name,
        field_type,
    }
}

/// Number of columns the load query returns.
pub const SOURCE_COLUMN_COUNT: usize = 13;

/// Field mappings in destination column order.
pub const FIELD_MAPPINGS: [FieldMapping; 12] = [
    field(0, "query_id", FieldType::Int),
    field(1, "query_timestamp", FieldType::Timestamp),
    field(2, "query_type", FieldType::Int),
    field(3, "query_status", FieldType::Int),
    field(4, "query_domain", FieldType::Str),
    field(6, "query_forward", FieldType::Str),
    field(7, "query_additional_info", FieldType::Str),
    field(5, "client_ip", FieldType::Str),
    field(8, "client_network_id", FieldType::Int),
    field(10, "client_last_seen", FieldType::Timestamp),
    field(11, "client_name", FieldType::Str),
    field(12, "client_last_update", FieldType::Timestamp),
];

/// Destination column names in insert order.
pub fn destination_columns() -> impl Iterator<Item = &'static str> {
    FIELD_MAPPINGS.iter().map(|m| m.name)
}

impl FieldMapping {
    /// Read and coerce this field's cell from a source row.
    pub fn read(&self, row: &[SourceValue]) -> Result<SqlValue> {
        let value = row.get(self.source_index).ok_or_else(|| {
            MigrateError::transform(
                self.name,
                format!(
                    "row has {} columns, expected at least {}",
                    row.len(),
                    self.source_index + 1
                ),
            )
        })?;
        coerce(value, self.field_type).map_err(|message| MigrateError::transform(self.name, message))
    }
}

/// Coerce a raw SQLite cell to a destination type. NULL stays NULL.
pub fn coerce(value: &SourceValue, field_type: FieldType) -> std::result::Result<SqlValue, String> {
    match (field_type, value) {
        (_, SourceValue::Null) => Ok(SqlValue::Null),

        (FieldType::Int, SourceValue::Integer(v)) => Ok(SqlValue::Int(*v)),
        (FieldType::Int, SourceValue::Real(v)) => real_to_int(*v).map(SqlValue::Int),
        (FieldType::Int, SourceValue::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::Int)
            .map_err(|_| format!("'{}' is not an integer", s)),

        (FieldType::Timestamp, SourceValue::Integer(secs)) => {
            epoch_to_datetime(*secs as f64).map(SqlValue::DateTime)
        }
        (FieldType::Timestamp, SourceValue::Real(secs)) => {
            epoch_to_datetime(*secs).map(SqlValue::DateTime)
        }

        (FieldType::Str, SourceValue::Text(s)) => Ok(SqlValue::Text(s.clone())),
        (FieldType::Str, SourceValue::Integer(v)) => Ok(SqlValue::Text(v.to_string())),
        (FieldType::Str, SourceValue::Real(v)) => Ok(SqlValue::Text(v.to_string())),
        (FieldType::Str, SourceValue::Blob(b)) => String::from_utf8(b.clone())
            .map(SqlValue::Text)
            .map_err(|_| "BLOB is not valid UTF-8".to_string()),

        (field_type, other) => Err(format!(
            "cannot convert {} to {:?}",
            other.storage_class(),
            field_type
        )),
    }
}

fn real_to_int(v: f64) -> std::result::Result<i64, String> {
    if v.is_finite() && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Ok(v.trunc() as i64)
    } else {
        Err(format!("{} is out of integer range", v))
    }
}

/// Years a MySQL `DATETIME` column can hold.
const DATETIME_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Convert Unix epoch seconds (fraction allowed) to a UTC timestamp.
fn epoch_to_datetime(secs: f64) -> std::result::Result<NaiveDateTime, String> {
    if !secs.is_finite() {
        return Err(format!("{} is not a valid epoch timestamp", secs));
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .map(|dt| dt.naive_utc())
        .filter(|dt| DATETIME_YEARS.contains(&dt.year()))
        .ok_or_else(|| format!("{} is not a valid epoch timestamp", secs))
}

/// Transform one joined source row into a [`MigrationRecord`].
///
/// Fails if any mapped cell cannot be coerced, or if a field the destination
/// requires (the `queries` columns and the client address) is NULL.
pub fn transform_row(row: &[SourceValue]) -> Result<MigrationRecord> {
    let mut values = FIELD_MAPPINGS
        .iter()
        .map(|mapping| mapping.read(row))
        .collect::<Result<Vec<_>>>()?
        .into_iter();

    let mut next = || values.next().unwrap_or(SqlValue::Null);

    Ok(MigrationRecord {
        query_id: required(next().into_int(), "query_id")?,
        query_timestamp: required(next().into_datetime(), "query_timestamp")?,
        query_type: required(next().into_int(), "query_type")?,
        query_status: required(next().into_int(), "query_status")?,
        query_domain: required(next().into_text(), "query_domain")?,
        query_forward: next().into_text(),
        query_additional_info: next().into_text(),
        client_ip: required(next().into_text(), "client_ip")?,
        client_network_id: next().into_int(),
        client_last_seen: next().into_datetime(),
        client_name: next().into_text(),
        client_last_update: next().into_datetime(),
    })
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| MigrateError::transform(column, "value is NULL"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn joined_row() -> Vec<SourceValue> {
        vec![
            42_i64.into(),
            1_700_000_000_i64.into(),
            2_i64.into(),
            3_i64.into(),
            "example.com".into(),
            "192.168.1.20".into(),
            "1.1.1.1#53".into(),
            SourceValue::Null,
            7_i64.into(),
            "192.168.1.20".into(),
            1_699_990_000_i64.into(),
            "laptop.lan".into(),
            1_699_000_000_i64.into(),
        ]
    }

    fn unmatched_row() -> Vec<SourceValue> {
        let mut row = joined_row();
        for cell in row.iter_mut().skip(8) {
            *cell = SourceValue::Null;
        }
        row
    }

    #[test]
    fn test_destination_columns_order() {
        let columns: Vec<_> = destination_columns().collect();
        assert_eq!(columns.len(), 12);
        assert_eq!(columns[0], "query_id");
        assert_eq!(columns[7], "client_ip");
        assert_eq!(columns[11], "client_last_update");
        assert!(!columns.contains(&"ip"));
    }

    #[test]
    fn test_every_source_position_except_ip_is_mapped_once() {
        let mut positions: Vec<_> = FIELD_MAPPINGS.iter().map(|m| m.source_index).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12]);
        assert!(positions.iter().all(|p| *p < SOURCE_COLUMN_COUNT));
    }

    #[test]
    fn test_transform_joined_row() {
        let record = transform_row(&joined_row()).unwrap();
        assert_eq!(record.query_id, 42);
        assert_eq!(
            record.query_timestamp,
            NaiveDate::from_ymd_opt(2023, 11, 14)
                .unwrap()
                .and_hms_opt(22, 13, 20)
                .unwrap()
        );
        assert_eq!(record.query_type, 2);
        assert_eq!(record.query_status, 3);
        assert_eq!(record.query_domain, "example.com");
        assert_eq!(record.query_forward.as_deref(), Some("1.1.1.1#53"));
        assert_eq!(record.query_additional_info, None);
        assert_eq!(record.client_ip, "192.168.1.20");
        assert_eq!(record.client_network_id, Some(7));
        assert!(record.client_last_seen.is_some());
        assert_eq!(record.client_name.as_deref(), Some("laptop.lan"));
        assert!(record.client_last_update.is_some());
    }

    #[test]
    fn test_unmatched_join_yields_null_client_fields() {
        let record = transform_row(&unmatched_row()).unwrap();
        assert_eq!(record.client_ip, "192.168.1.20");
        assert_eq!(record.client_network_id, None);
        assert_eq!(record.client_last_seen, None);
        assert_eq!(record.client_name, None);
        assert_eq!(record.client_last_update, None);
    }

    #[test]
    fn test_non_numeric_query_type_fails() {
        let mut row = joined_row();
        row[2] = "A".into();
        let err = transform_row(&row).unwrap_err();
        match err {
            MigrateError::Transform { column, .. } => assert_eq!(column, "query_type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_numeric_text_is_accepted_for_int() {
        let mut row = joined_row();
        row[3] = " 12 ".into();
        assert_eq!(transform_row(&row).unwrap().query_status, 12);
    }

    #[test]
    fn test_null_required_field_fails() {
        let mut row = joined_row();
        row[4] = SourceValue::Null;
        assert!(matches!(
            transform_row(&row),
            Err(MigrateError::Transform { .. })
        ));
    }

    #[test]
    fn test_short_row_fails() {
        let row = joined_row().into_iter().take(8).collect::<Vec<_>>();
        assert!(transform_row(&row).is_err());
    }

    #[test]
    fn test_fractional_timestamp() {
        let value = coerce(&SourceValue::Real(1.5), FieldType::Timestamp).unwrap();
        let dt = value.into_datetime().unwrap();
        assert_eq!(dt.and_utc().timestamp(), 1);
        assert_eq!(dt.and_utc().timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_timestamp_beyond_year_9999_rejected() {
        // epoch milliseconds land tens of thousands of years out
        assert!(coerce(&SourceValue::Integer(1_700_000_000_000), FieldType::Timestamp).is_err());
        assert!(coerce(&SourceValue::Real(5e12), FieldType::Timestamp).is_err());

        let last_second = NaiveDate::from_ymd_opt(9999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let secs = last_second.and_utc().timestamp();
        assert_eq!(
            coerce(&SourceValue::Integer(secs), FieldType::Timestamp).unwrap(),
            SqlValue::DateTime(last_second)
        );
        assert!(coerce(&SourceValue::Integer(secs + 1), FieldType::Timestamp).is_err());
    }

    #[test]
    fn test_timestamp_overflow_discards_row() {
        let mut row = joined_row();
        row[10] = 1_699_990_000_000_i64.into();
        match transform_row(&row).unwrap_err() {
            MigrateError::Transform { column, .. } => assert_eq!(column, "client_last_seen"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_text_timestamp_rejected() {
        assert!(coerce(&"yesterday".into(), FieldType::Timestamp).is_err());
    }

    #[test]
    fn test_real_truncates_to_int() {
        assert_eq!(
            coerce(&SourceValue::Real(3.9), FieldType::Int).unwrap(),
            SqlValue::Int(3)
        );
        assert!(coerce(&SourceValue::Real(f64::NAN), FieldType::Int).is_err());
    }

    #[test]
    fn test_string_field_accepts_numbers() {
        assert_eq!(
            coerce(&SourceValue::Integer(5), FieldType::Str).unwrap(),
            SqlValue::Text("5".into())
        );
    }
}
