//! MySQL implementation of [`ReadingStore`]
//!
//! Every call opens its own connection, runs one query and closes the
//! connection again. The calls block the caller on a private current-thread
//! tokio runtime; opening the connection is bounded by the descriptor's
//! `connect_timeout`, the query itself is not cancellable once issued.

use super::{build_readings_query, ReadingStore, DEVICE_CATALOG_QUERY};
use crate::config::ConnectionDescriptor;
use crate::error::{DataAccessError, Result};
use crate::types::{DeviceRecord, InstrumentSchema, RawReading};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Connection, Row};
use std::time::Instant;
use tokio::runtime::Runtime;

/// Blocking MySQL reading store
pub struct MySqlStore {
    runtime: Runtime,
}

impl MySqlStore {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    fn connect_options(conn: &ConnectionDescriptor) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&conn.host)
            .port(conn.port)
            .username(&conn.user)
            .password(&conn.password);
        if !conn.database.is_empty() {
            options = options.database(&conn.database);
        }
        options
    }

    async fn connect(conn: &ConnectionDescriptor) -> std::result::Result<MySqlConnection, DataAccessError> {
        let options = Self::connect_options(conn);
        match tokio::time::timeout(conn.connect_timeout, options.connect()).await {
            Ok(Ok(connection)) => Ok(connection),
            Ok(Err(e)) => Err(DataAccessError::ConnectionFailed(e.to_string())),
            Err(_) => Err(DataAccessError::ConnectionFailed(format!(
                "timed out after {}s connecting to {}:{}",
                conn.connect_timeout.as_secs(),
                conn.host,
                conn.port
            ))),
        }
    }

    async fn close(connection: MySqlConnection) {
        if let Err(e) = connection.close().await {
            tracing::debug!("Error closing MySQL connection: {}", e);
        }
    }
}

fn query_failed(e: sqlx::Error) -> DataAccessError {
    DataAccessError::QueryFailed(e.to_string())
}

/// Parse the text form of a DECIMAL value
fn parse_decimal(text: &str) -> std::result::Result<f64, DataAccessError> {
    text.trim()
        .parse::<f64>()
        .map_err(|e| DataAccessError::QueryFailed(format!("'{}' is not numeric: {}", text, e)))
}

/// Decode a numeric column; `NULL` becomes `NaN`
///
/// DOUBLE and FLOAT decode directly. DECIMAL arrives on the wire as text and
/// is parsed from that.
fn decode_value(row: &MySqlRow, index: usize) -> std::result::Result<f64, DataAccessError> {
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return Ok(value.unwrap_or(f64::NAN));
    }
    if let Ok(value) = row.try_get::<Option<f32>, _>(index) {
        return Ok(value.map_or(f64::NAN, f64::from));
    }
    match row
        .try_get_unchecked::<Option<String>, _>(index)
        .map_err(query_failed)?
    {
        Some(text) => parse_decimal(&text),
        None => Ok(f64::NAN),
    }
}

fn decode_reading(
    row: &MySqlRow,
    schema: &InstrumentSchema,
) -> std::result::Result<RawReading, DataAccessError> {
    let timestamp: NaiveDateTime = row.try_get(0).map_err(query_failed)?;
    let instrument: Option<String> = row.try_get(1).map_err(query_failed)?;
    let values = (0..schema.channel_count())
        .map(|channel| decode_value(row, channel + 2))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RawReading::new(timestamp, instrument.unwrap_or_default(), values))
}

fn decode_device(row: &MySqlRow) -> std::result::Result<DeviceRecord, DataAccessError> {
    let id: i64 = row.try_get(0).map_err(query_failed)?;
    let uuid: Option<String> = row.try_get(1).map_err(query_failed)?;
    let channels: Option<String> = row.try_get(2).map_err(query_failed)?;
    Ok(DeviceRecord::new(
        id,
        uuid.unwrap_or_else(|| id.to_string()),
        DeviceRecord::parse_channel_list(channels.as_deref()),
    ))
}

impl ReadingStore for MySqlStore {
    fn fetch_device_catalog(
        &self,
        conn: &ConnectionDescriptor,
    ) -> std::result::Result<Vec<DeviceRecord>, DataAccessError> {
        let started = Instant::now();
        let devices = self.runtime.block_on(async {
            let mut connection = Self::connect(conn).await?;
            let result = sqlx::query(DEVICE_CATALOG_QUERY)
                .fetch_all(&mut connection)
                .await;
            Self::close(connection).await;
            result
                .map_err(query_failed)?
                .iter()
                .map(decode_device)
                .collect::<std::result::Result<Vec<_>, _>>()
        })?;

        tracing::info!(
            "Fetched {} devices in {:?}",
            devices.len(),
            started.elapsed()
        );
        Ok(devices)
    }

    fn fetch_readings(
        &self,
        conn: &ConnectionDescriptor,
        schema: &InstrumentSchema,
        device_id: i64,
        start: Option<NaiveDate>,
    ) -> std::result::Result<Vec<RawReading>, DataAccessError> {
        let sql = build_readings_query(schema, start.is_some())
            .map_err(|e| DataAccessError::QueryFailed(e.to_string()))?;
        let started = Instant::now();

        let readings = self.runtime.block_on(async {
            let mut connection = Self::connect(conn).await?;
            let mut query = sqlx::query(&sql).bind(device_id);
            if let Some(date) = start {
                query = query.bind(date.and_time(NaiveTime::MIN));
            }
            let result = query.fetch_all(&mut connection).await;
            Self::close(connection).await;
            result
                .map_err(query_failed)?
                .iter()
                .map(|row| decode_reading(row, schema))
                .collect::<std::result::Result<Vec<_>, _>>()
        })?;

        tracing::info!(
            schema = %schema.name,
            device_id,
            ?start,
            "Fetched {} readings in {:?}",
            readings.len(),
            started.elapsed()
        );
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("12.5000").unwrap(), 12.5);
        assert_eq!(parse_decimal(" -0.0031 ").unwrap(), -0.0031);
        assert!(matches!(
            parse_decimal("abc"),
            Err(DataAccessError::QueryFailed(_))
        ));
    }
}
