//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use chrono::{NaiveDate, NaiveDateTime};

/// Fixed test date (2025-08-07)
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 7).unwrap()
}

/// Timestamp on the test date at the given hour
pub fn at_hour(hour: u32) -> NaiveDateTime {
    test_date().and_hms_opt(hour, 0, 0).unwrap()
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
