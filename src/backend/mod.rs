//! Backend module: read-only access to the reading store
//!
//! # Components
//!
//! - [`ReadingStore`] - Trait over the relational store (device catalog and reading tables)
//! - [`MySqlStore`] - sqlx/MySQL implementation; one connection per call
//! - [`QueryCache`] - Keyed, time-expiring memoization of query results
//! - [`CachedStore`] - Wraps a [`ReadingStore`] with a [`QueryCache`]
//!
//! All queries are parameterized. Values (device id, start date) are bound;
//! table and column names come from [`InstrumentSchema`] declarations, are
//! validated against `[A-Za-z0-9_]+` and back-quoted.

pub mod cache;
pub mod mysql;

pub use cache::{
    CacheStats, CachedStore, Clock, ManualClock, QueryCache, QueryKey, SystemClock,
    Ttl,
};
pub use mysql::MySqlStore;

use crate::config::ConnectionDescriptor;
use crate::error::{DataAccessError, Result, SensorVisError};
use crate::types::{
    DeviceRecord, InstrumentSchema, RawReading, CHANNEL_PLACEHOLDER, INSTRUMENT_PLACEHOLDER,
};
use chrono::NaiveDate;

/// Device catalog query
pub const DEVICE_CATALOG_QUERY: &str =
    "SELECT `id`, `uuid`, `sensorChannelList` FROM `devices` ORDER BY `id` ASC";

/// Read-only interface to the relational store
///
/// Implementations open and release their own connection per call.
#[cfg_attr(test, mockall::automock)]
pub trait ReadingStore: Send + Sync {
    /// Fetch every device
    fn fetch_device_catalog(
        &self,
        conn: &ConnectionDescriptor,
    ) -> std::result::Result<Vec<DeviceRecord>, DataAccessError>;

    /// Fetch the readings of one instrument kind for one device
    ///
    /// Rows are filtered by `device_id = ?` and, when `start` is given, by
    /// `timestamp >= start`; newest first.
    fn fetch_readings(
        &self,
        conn: &ConnectionDescriptor,
        schema: &InstrumentSchema,
        device_id: i64,
        start: Option<NaiveDate>,
    ) -> std::result::Result<Vec<RawReading>, DataAccessError>;
}

/// Fetch tilt readings (`x_value`, `y_value`)
pub fn fetch_tilt_readings(
    store: &dyn ReadingStore,
    conn: &ConnectionDescriptor,
    device_id: i64,
    start: Option<NaiveDate>,
) -> std::result::Result<Vec<RawReading>, DataAccessError> {
    store.fetch_readings(conn, &InstrumentSchema::tilt(), device_id, start)
}

/// Fetch secondary readings (`value1`, `value2`)
pub fn fetch_secondary_readings(
    store: &dyn ReadingStore,
    conn: &ConnectionDescriptor,
    device_id: i64,
    start: Option<NaiveDate>,
) -> std::result::Result<Vec<RawReading>, DataAccessError> {
    store.fetch_readings(conn, &InstrumentSchema::secondary(), device_id, start)
}

/// Fetch the device catalog
pub fn fetch_device_catalog(
    store: &dyn ReadingStore,
    conn: &ConnectionDescriptor,
) -> std::result::Result<Vec<DeviceRecord>, DataAccessError> {
    store.fetch_device_catalog(conn)
}

fn is_safe_identifier(ident: &str) -> bool {
    !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check that every identifier of a schema can be placed in a query
pub fn validate_schema(schema: &InstrumentSchema) -> Result<()> {
    let invalid = |message: String| SensorVisError::Schema {
        schema: schema.name.clone(),
        message,
    };

    if schema.name.trim().is_empty() {
        return Err(invalid("name must not be empty".to_string()));
    }
    if schema.channels.is_empty() {
        return Err(invalid("at least one channel is required".to_string()));
    }

    for placeholder in [INSTRUMENT_PLACEHOLDER, CHANNEL_PLACEHOLDER] {
        if !schema.key_template.contains(placeholder) {
            return Err(invalid(format!(
                "key_template '{}' must contain {}",
                schema.key_template, placeholder
            )));
        }
    }

    let identifiers = [
        schema.table.as_str(),
        schema.device_column.as_str(),
        schema.time_column.as_str(),
        schema.name_column.as_str(),
    ]
    .into_iter()
    .chain(schema.channels.iter().map(|c| c.column.as_str()));

    for ident in identifiers {
        if !is_safe_identifier(ident) {
            return Err(invalid(format!("'{}' is not a plain identifier", ident)));
        }
    }

    let mut tags: Vec<String> = schema.channels.iter().map(|c| c.tag.to_uppercase()).collect();
    if tags.iter().any(|t| t.is_empty()) {
        return Err(invalid("channel tags must not be empty".to_string()));
    }
    tags.sort_unstable();
    if tags.windows(2).any(|w| w[0] == w[1]) {
        return Err(invalid("channel tags must be unique".to_string()));
    }

    Ok(())
}

/// Build the reading query for a schema
///
/// The device id is always the first bound parameter; the start timestamp is
/// the second one when `with_start` is set.
pub fn build_readings_query(schema: &InstrumentSchema, with_start: bool) -> Result<String> {
    validate_schema(schema)?;

    let mut columns = vec![
        format!("`{}`", schema.time_column),
        format!("`{}`", schema.name_column),
    ];
    columns.extend(schema.channels.iter().map(|c| format!("`{}`", c.column)));

    let mut sql = format!(
        "SELECT {} FROM `{}` WHERE `{}` = ?",
        columns.join(", "),
        schema.table,
        schema.device_column
    );
    if with_start {
        sql.push_str(&format!(" AND `{}` >= ?", schema.time_column));
    }
    sql.push_str(&format!(" ORDER BY `{}` DESC", schema.time_column));
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelSpec;

    #[test]
    fn test_tilt_query_without_start() {
        let sql = build_readings_query(&InstrumentSchema::tilt(), false).unwrap();
        assert_eq!(
            sql,
            "SELECT `DataTime`, `name`, `x_value`, `y_value` FROM `tis` WHERE `device_id` = ? ORDER BY `DataTime` DESC"
        );
    }

    #[test]
    fn test_secondary_query_with_start() {
        let sql = build_readings_query(&InstrumentSchema::secondary(), true).unwrap();
        assert_eq!(
            sql,
            "SELECT `DataTime`, `name`, `value1`, `value2` FROM `vgs` WHERE `device_id` = ? AND `DataTime` >= ? ORDER BY `DataTime` DESC"
        );
        assert_eq!(sql.matches('?').count(), 2);
    }

    #[test]
    fn test_rejects_injection_in_column() {
        let mut schema = InstrumentSchema::tilt();
        schema.channels.push(ChannelSpec::new("z`; DROP TABLE tis; --", "z"));
        assert!(build_readings_query(&schema, false).is_err());
    }

    #[test]
    fn test_rejects_duplicate_tags() {
        let mut schema = InstrumentSchema::tilt();
        schema.channels[1].tag = "X".to_string();
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn test_rejects_key_template_missing_placeholder() {
        for template in ["{instrument}", "{channel}", "fixed"] {
            let mut schema = InstrumentSchema::tilt();
            schema.key_template = template.to_string();
            assert!(
                matches!(validate_schema(&schema), Err(SensorVisError::Schema { .. })),
                "template {} accepted",
                template
            );
        }

        let mut schema = InstrumentSchema::tilt();
        schema.key_template = "{channel}-{instrument}".to_string();
        assert!(validate_schema(&schema).is_ok());
    }

    #[test]
    fn test_rejects_empty_channels() {
        let mut schema = InstrumentSchema::secondary();
        schema.channels.clear();
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn test_convenience_fetchers_use_builtin_schemas() {
        use std::time::Duration;

        let conn = ConnectionDescriptor {
            host: "db".to_string(),
            port: 3306,
            user: "u".to_string(),
            password: "p".to_string(),
            database: "d".to_string(),
            connect_timeout: Duration::from_secs(10),
        };

        let mut store = MockReadingStore::new();
        store
            .expect_fetch_readings()
            .withf(|_, schema, id, start| schema.table == "tis" && *id == 3 && start.is_none())
            .times(1)
            .returning(|_, _, _, _| Ok(Vec::new()));
        store
            .expect_fetch_readings()
            .withf(|_, schema, _, _| schema.table == "vgs")
            .times(1)
            .returning(|_, _, _, _| Err(DataAccessError::QueryFailed("no table".into())));
        store
            .expect_fetch_device_catalog()
            .times(1)
            .returning(|_| Ok(vec![DeviceRecord::new(3, "dev-3", vec![])]));

        assert!(fetch_tilt_readings(&store, &conn, 3, None).unwrap().is_empty());
        assert!(fetch_secondary_readings(&store, &conn, 3, None).is_err());
        assert_eq!(fetch_device_catalog(&store, &conn).unwrap().len(), 1);
    }
}
