use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::constants::FIELD_EXPLORER_LOOKBACK_SECS;
use crate::error::Result;
use crate::infra::kismet_client::KismetClient;
use crate::pipeline::normalize::lookup::lookup;

/// Inspects what the Kismet API actually returns, so field paths can be checked against a live
/// server before the bridge relies on them.
pub struct FieldExplorer<'a> {
    client: &'a mut KismetClient,
}

impl<'a> FieldExplorer<'a> {
    pub fn new(client: &'a mut KismetClient) -> Self {
        Self { client }
    }

    /// Catalogue of every field the server tracks, or `None` if it cannot be fetched.
    pub async fn tracked_fields(&mut self) -> Option<Value> {
        info!("Fetching tracked fields from Kismet");
        match self.client.get_tracked_fields().await {
            Ok(fields) => Some(fields),
            Err(e) => {
                error!("Failed to fetch tracked fields: {}", e);
                None
            }
        }
    }

    /// A device by key, or the first device seen in the last five minutes.
    pub async fn sample_device(&mut self, device_key: Option<&str>) -> Option<Value> {
        let result = match device_key {
            Some(key) => {
                info!("Fetching device: {}", key);
                self.client.get_device_by_key(key).await
            }
            None => {
                info!("Fetching recent devices");
                self.client
                    .get_recent_devices(-FIELD_EXPLORER_LOOKBACK_SECS)
                    .await
                    .map(|devices| devices.into_iter().next().unwrap_or(Value::Null))
            }
        };

        match result {
            Ok(Value::Null) => {
                warn!("No recent devices found");
                None
            }
            Ok(device) => Some(device),
            Err(e) => {
                error!("Failed to fetch device: {}", e);
                None
            }
        }
    }
}

/// Every key path in a record, `/`-joined, parents listed before their children.
pub fn list_available_fields(record: &Value) -> Vec<String> {
    let mut fields = Vec::new();
    collect_fields(record, "", &mut fields);
    fields
}

fn collect_fields(value: &Value, prefix: &str, out: &mut Vec<String>) {
    let Some(map) = value.as_object() else {
        return;
    };
    for (key, child) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}/{}", prefix, key)
        };
        out.push(path.clone());
        if child.is_object() {
            collect_fields(child, &path, out);
        }
    }
}

/// Whether each field exists in `record`: as a direct key, a `/`-separated path,
/// or a dotted path in any of the layouts the normalizer understands.
pub fn validate_fields<S: AsRef<str>>(fields: &[S], record: &Value) -> Vec<(String, bool)> {
    fields
        .iter()
        .map(|field| {
            let field = field.as_ref();
            let direct = record.get(field).is_some();
            let present = direct || slash_path_exists(record, field) || lookup(record, field).is_some();
            (field.to_string(), present)
        })
        .collect()
}

fn slash_path_exists(record: &Value, field: &str) -> bool {
    if !field.contains('/') {
        return false;
    }
    let mut current = record;
    for part in field.split('/') {
        match current.get(part) {
            Some(next) if current.is_object() => current = next,
            _ => return false,
        }
    }
    true
}

/// Write `{total_fields, fields, sample_device}` as pretty JSON. Returns the field count.
pub fn export_fields(record: &Value, path: impl AsRef<Path>) -> Result<usize> {
    let mut fields = list_available_fields(record);
    fields.sort();
    let report = json!({
        "total_fields": fields.len(),
        "fields": fields,
        "sample_device": record,
    });
    fs::write(path.as_ref(), serde_json::to_string_pretty(&report)?)?;
    info!("Exported {} fields to {}", fields.len(), path.as_ref().display());
    Ok(fields.len())
}
