use serde_json::Value;

use super::lookup::{contains, lookup};
use crate::constants::{
    DOT11_KEY_MARKER, FIELD_BLUETOOTH_DEVICE, FIELD_BT_LE_LIMITED, FIELD_DOT11_DEVICE,
    FIELD_PHYNAME, PHY_80211_MARKER,
};
use crate::types::DeviceType;

/// Decide the device type from which fields a record carries.
///
/// Precedence is fixed: the Wi-Fi check runs first, the BLE flag is only consulted for Bluetooth
/// records, and a record with neither marker set is tagged `wifi`.
pub fn classify(record: &Value) -> DeviceType {
    if has_wifi_branch(record) && has_wifi_marker(record) {
        return DeviceType::Wifi;
    }

    if has_branch(record, FIELD_BLUETOOTH_DEVICE) {
        return if lookup(record, FIELD_BT_LE_LIMITED).map(truthy).unwrap_or(false) {
            DeviceType::Ble
        } else {
            DeviceType::Bt
        };
    }

    DeviceType::Wifi
}

// Only the `dot11.device` branch itself or a PHY name opens the Wi-Fi check; stray flat
// `dot11.device.*` keys do not
fn has_wifi_branch(record: &Value) -> bool {
    contains(record, FIELD_DOT11_DEVICE) || contains(record, FIELD_PHYNAME)
}

fn has_wifi_marker(record: &Value) -> bool {
    let phy_is_80211 = lookup(record, FIELD_PHYNAME)
        .and_then(Value::as_str)
        .map(|phy| phy.contains(PHY_80211_MARKER))
        .unwrap_or(false);
    phy_is_80211 || top_level_keys(record).any(|k| k.contains(DOT11_KEY_MARKER))
}

// A branch counts as present when stored as one key or spread over flat `branch.*` keys
fn has_branch(record: &Value, branch: &str) -> bool {
    if contains(record, branch) {
        return true;
    }
    let prefix = format!("{}.", branch);
    top_level_keys(record).any(|k| k.starts_with(&prefix))
}

fn top_level_keys(record: &Value) -> impl Iterator<Item = &String> {
    record.as_object().into_iter().flat_map(|m| m.keys())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}
