//! Hand-written store double for integration tests
//!
//! Unlike the mockall mock used in unit tests, this store keeps data per
//! device and counts every query it serves, which is what the cache and
//! pipeline scenarios assert on.

use chrono::NaiveDate;
use sensorvis_rs::config::ConnectionDescriptor;
use sensorvis_rs::error::DataAccessError;
use sensorvis_rs::{DeviceRecord, InstrumentSchema, RawReading, ReadingStore};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Query counters shared between a store and the test
#[derive(Debug, Default)]
pub struct CallCounts {
    pub catalog: AtomicUsize,
    pub readings: AtomicUsize,
}

impl CallCounts {
    pub fn catalog(&self) -> usize {
        self.catalog.load(Ordering::SeqCst)
    }

    pub fn readings(&self) -> usize {
        self.readings.load(Ordering::SeqCst)
    }
}

/// In-memory reading store
#[derive(Default)]
pub struct FakeStore {
    devices: Vec<DeviceRecord>,
    readings: Mutex<HashMap<(String, i64), Vec<RawReading>>>,
    failing_schemas: HashSet<String>,
    catalog_down: bool,
    pub calls: Arc<CallCounts>,
}

impl FakeStore {
    pub fn new(devices: Vec<DeviceRecord>) -> Self {
        Self {
            devices,
            ..Default::default()
        }
    }

    pub fn with_readings(self, schema: &str, device_id: i64, rows: Vec<RawReading>) -> Self {
        self.set_readings(schema, device_id, rows);
        self
    }

    /// Replace rows after construction (simulates new data arriving)
    pub fn set_readings(&self, schema: &str, device_id: i64, rows: Vec<RawReading>) {
        self.readings
            .lock()
            .unwrap()
            .insert((schema.to_string(), device_id), rows);
    }

    pub fn failing(mut self, schema: &str) -> Self {
        self.failing_schemas.insert(schema.to_string());
        self
    }

    pub fn catalog_down(mut self) -> Self {
        self.catalog_down = true;
        self
    }

    pub fn counts(&self) -> Arc<CallCounts> {
        self.calls.clone()
    }
}

impl ReadingStore for FakeStore {
    fn fetch_device_catalog(
        &self,
        _conn: &ConnectionDescriptor,
    ) -> Result<Vec<DeviceRecord>, DataAccessError> {
        self.calls.catalog.fetch_add(1, Ordering::SeqCst);
        if self.catalog_down {
            return Err(DataAccessError::ConnectionFailed(
                "connection refused".to_string(),
            ));
        }
        Ok(self.devices.clone())
    }

    fn fetch_readings(
        &self,
        _conn: &ConnectionDescriptor,
        schema: &InstrumentSchema,
        device_id: i64,
        start: Option<NaiveDate>,
    ) -> Result<Vec<RawReading>, DataAccessError> {
        self.calls.readings.fetch_add(1, Ordering::SeqCst);
        if self.failing_schemas.contains(&schema.name) {
            return Err(DataAccessError::QueryFailed(format!(
                "table {} unavailable",
                schema.table
            )));
        }
        let rows = self
            .readings
            .lock()
            .unwrap()
            .get(&(schema.name.clone(), device_id))
            .cloned()
            .unwrap_or_default();
        let cutoff = start.map(|d| d.and_time(chrono::NaiveTime::MIN));
        Ok(rows
            .into_iter()
            .filter(|r| cutoff.map_or(true, |c| r.timestamp >= c))
            .collect())
    }
}
