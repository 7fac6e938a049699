use serde::{Deserialize, Serialize};

/// Raw device record as returned by the Kismet API. Shape varies by PHY and Kismet version.
pub type RawRecord = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Wifi,
    Bt,
    Ble,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Wifi => "wifi",
            DeviceType::Bt => "bt",
            DeviceType::Ble => "ble",
        }
    }

    pub fn is_bluetooth(&self) -> bool {
        matches!(self, DeviceType::Bt | DeviceType::Ble)
    }
}

/// Canonical flat record sent downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub netid: String,
    pub trilat: f64,
    pub trilong: f64,
    pub signal: Option<i64>,
    pub firstseen: String,
    pub lastseen: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub altitude: Option<i64>,

    // Wi-Fi
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encryption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub channel: Option<i64>,

    // Bluetooth / BLE
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub manufacturer: Option<String>,
}

/// One poll cycle's worth of normalized records; serializes as `{"devices": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceBatch {
    pub devices: Vec<NormalizedRecord>,
}

impl DeviceBatch {
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
