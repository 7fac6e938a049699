//! Record normalizer: source-native device records in, sanitized flat records out.
//!
//! A record is emitted only when it yields a valid MAC and a valid coordinate pair. Anything else
//! about a record is best effort, and a bad record never stops the rest of the batch.

pub mod classify;
pub mod lookup;
pub mod sanitize;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::FormatterConfig;
use crate::constants::{
    FIELD_AVG_ALT, FIELD_AVG_LAT, FIELD_AVG_LON, FIELD_BEACONED_SSID, FIELD_BT_MANUFACTURER,
    FIELD_BT_NAME, FIELD_CHANNEL, FIELD_FIRST_TIME, FIELD_LAST_TIME, FIELD_PROBED_SSID,
    FIELD_SSID_CRYPT, MAC_FIELDS, MAX_GENERIC_STRING_LEN, SIGNAL_FIELDS, SIGNAL_MAX_DBM,
    SIGNAL_MIN_DBM, SOURCE_TAG, TIMESTAMP_FORMAT,
};
use crate::error::{BridgeError, Result};
use crate::metrics;
use crate::types::{DeviceBatch, NormalizedRecord, RawRecord};

use self::classify::classify;
use self::lookup::lookup;
use self::sanitize::{canonical_mac, is_valid_mac, sanitize_text};

/// Counts for one normalized batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub received: usize,
    pub normalized: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    lat: f64,
    lon: f64,
    alt: Option<i64>,
}

pub struct DeviceNormalizer {
    config: FormatterConfig,
}

impl DeviceNormalizer {
    pub fn new(config: FormatterConfig) -> Self {
        info!(obfuscate_gps = config.obfuscate_gps, "Device normalizer initialized");
        Self { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Normalize every record that can be normalized, in input order.
    pub fn normalize_batch(&self, records: &[RawRecord]) -> (DeviceBatch, BatchStats) {
        let mut devices = Vec::with_capacity(records.len());
        for record in records {
            match self.normalize_record(record) {
                Ok(device) => devices.push(device),
                Err(e) => debug!("Dropping device record: {}", e),
            }
        }

        let stats = BatchStats {
            received: records.len(),
            normalized: devices.len(),
            dropped: records.len() - devices.len(),
        };
        metrics::normalize::batch(stats.received, stats.normalized);
        if stats.dropped > 0 {
            info!(
                received = stats.received,
                normalized = stats.normalized,
                dropped = stats.dropped,
                "Normalized device batch"
            );
        } else {
            debug!(received = stats.received, "Normalized device batch");
        }
        (DeviceBatch { devices }, stats)
    }

    /// Normalize one record. A missing MAC or coordinate pair is a `Validation` error.
    pub fn normalize_record(&self, record: &RawRecord) -> Result<NormalizedRecord> {
        if !record.is_object() {
            return Err(BridgeError::Validation("device record is not an object".into()));
        }

        let device_type = classify(record);
        let netid = extract_mac(record)
            .ok_or_else(|| BridgeError::Validation("no valid MAC address".into()))?;
        let position = self
            .extract_position(record)
            .ok_or_else(|| BridgeError::Validation(format!("no valid coordinates for {}", netid)))?;

        let mut normalized = NormalizedRecord {
            device_type,
            netid,
            trilat: position.lat,
            trilong: position.lon,
            signal: extract_signal(record),
            firstseen: extract_timestamp(record, FIELD_FIRST_TIME),
            lastseen: extract_timestamp(record, FIELD_LAST_TIME),
            source: SOURCE_TAG.to_string(),
            altitude: position.alt,
            ssid: None,
            encryption: None,
            channel: None,
            name: None,
            manufacturer: None,
        };

        if device_type.is_bluetooth() {
            add_bluetooth_fields(&mut normalized, record);
        } else {
            self.add_wifi_fields(&mut normalized, record);
        }
        debug!(netid = %normalized.netid, device_type = device_type.as_str(), "Normalized device");
        Ok(normalized)
    }

    fn extract_position(&self, record: &RawRecord) -> Option<Position> {
        let lat = lookup(record, FIELD_AVG_LAT).and_then(as_number)?;
        let lon = lookup(record, FIELD_AVG_LON).and_then(as_number)?;
        if !valid_coordinates(lat, lon) {
            debug!(lat, lon, "Coordinates out of range");
            return None;
        }

        let precision = if self.config.obfuscate_gps {
            self.config.gps_obfuscation_precision
        } else {
            self.config.gps_precision
        };

        Some(Position {
            lat: round_to(lat, precision),
            lon: round_to(lon, precision),
            alt: lookup(record, FIELD_AVG_ALT)
                .and_then(as_number)
                .filter(|a| a.is_finite())
                .map(|a| a.trunc() as i64),
        })
    }

    fn add_wifi_fields(&self, normalized: &mut NormalizedRecord, record: &RawRecord) {
        let ssid = lookup(record, FIELD_BEACONED_SSID)
            .and_then(as_text)
            .or_else(|| lookup(record, FIELD_PROBED_SSID).and_then(as_text));
        normalized.ssid = ssid.map(|s| sanitize_text(&s, self.config.max_ssid_length));

        normalized.encryption = lookup(record, FIELD_SSID_CRYPT)
            .and_then(as_text)
            .map(|e| sanitize_text(&e, MAX_GENERIC_STRING_LEN));

        normalized.channel = lookup(record, FIELD_CHANNEL)
            .and_then(as_integer)
            .filter(|c| *c != 0);
    }
}

fn add_bluetooth_fields(normalized: &mut NormalizedRecord, record: &RawRecord) {
    normalized.name = lookup(record, FIELD_BT_NAME)
        .and_then(as_text)
        .map(|n| sanitize_text(&n, MAX_GENERIC_STRING_LEN));
    normalized.manufacturer = lookup(record, FIELD_BT_MANUFACTURER)
        .and_then(as_text)
        .map(|m| sanitize_text(&m, MAX_GENERIC_STRING_LEN));
}

fn extract_mac(record: &RawRecord) -> Option<String> {
    MAC_FIELDS
        .iter()
        .filter_map(|field| lookup(record, field).and_then(Value::as_str))
        .find(|mac| is_valid_mac(mac))
        .map(canonical_mac)
}

// First candidate that is numeric and in range wins; anything else is skipped
fn extract_signal(record: &RawRecord) -> Option<i64> {
    SIGNAL_FIELDS
        .iter()
        .filter_map(|field| lookup(record, field).and_then(as_number))
        .filter(|s| s.is_finite())
        .map(|s| s.trunc() as i64)
        .find(|s| (SIGNAL_MIN_DBM..=SIGNAL_MAX_DBM).contains(s))
}

/// Epoch seconds at `field` in the fixed text format, or the current time when the field is
/// absent, zero or unrepresentable.
fn extract_timestamp(record: &RawRecord, field: &str) -> String {
    let formatted = lookup(record, field)
        .and_then(as_number)
        .filter(|t| t.is_finite() && *t != 0.0)
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.trunc() as i64, 0))
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string());
    formatted.unwrap_or_else(|| Utc::now().format(TIMESTAMP_FORMAT).to_string())
}

pub fn valid_coordinates(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// Whole numbers as-is, finite floats truncated; strings must hold an integer
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

// Non-empty strings as-is, numbers in their JSON form (encryption is often a bitfield)
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
