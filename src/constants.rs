/// Kismet REST endpoints and record field paths shared across the crate.
/// Field paths are dotted; lookups accept both flat and nested record shapes.

// Source API endpoints
pub const ENDPOINT_SYSTEM_STATUS: &str = "/system/status.json";
pub const ENDPOINT_TRACKED_FIELDS: &str = "/system/tracked_fields.json";

pub fn recent_devices_endpoint(last_time: i64) -> String {
    format!("/devices/last-time/{}/devices.json", last_time)
}

pub fn device_by_key_endpoint(safe_key: &str) -> String {
    format!("/devices/by-key/{}/device.json", safe_key)
}

pub fn devices_by_mac_endpoint(mac: &str) -> String {
    format!("/devices/by-mac/{}/devices.json", mac)
}

// Hosts the source client may talk to
pub const ALLOWED_SOURCE_HOSTS: [&str; 3] = ["127.0.0.1", "localhost", "::1"];

// Rate window length
pub const RATE_WINDOW_SECS: u64 = 60;

// Device classification
pub const FIELD_PHYNAME: &str = "kismet.device.base.phyname";
pub const FIELD_DOT11_DEVICE: &str = "dot11.device";
pub const FIELD_BLUETOOTH_DEVICE: &str = "bluetooth.device";
pub const FIELD_BT_LE_LIMITED: &str = "bluetooth.device.le_limited";
pub const DOT11_KEY_MARKER: &str = "dot11";
pub const PHY_80211_MARKER: &str = "802.11";

// MAC candidates, in probe order
pub const MAC_FIELDS: [&str; 3] = [
    "kismet.device.base.macaddr",
    "dot11.device.last_bssid",
    "bluetooth.device.bd_addr",
];

// Location
pub const FIELD_AVG_LAT: &str = "kismet.device.base.location.avg_lat";
pub const FIELD_AVG_LON: &str = "kismet.device.base.location.avg_lon";
pub const FIELD_AVG_ALT: &str = "kismet.device.base.location.avg_alt";

// Signal candidates, in probe order
pub const SIGNAL_FIELDS: [&str; 3] = [
    "kismet.device.base.signal.last_signal",
    "dot11.device.last_signal",
    "bluetooth.device.rssi",
];
pub const SIGNAL_MIN_DBM: i64 = -120;
pub const SIGNAL_MAX_DBM: i64 = 0;

// Timestamps
pub const FIELD_FIRST_TIME: &str = "kismet.device.base.first_time";
pub const FIELD_LAST_TIME: &str = "kismet.device.base.last_time";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Wi-Fi
pub const FIELD_BEACONED_SSID: &str = "dot11.device.last_beaconed_ssid";
pub const FIELD_PROBED_SSID: &str = "dot11.device.last_probed_ssid";
pub const FIELD_SSID_CRYPT: &str = "dot11.device.last_beaconed_ssid_crypt";
pub const FIELD_CHANNEL: &str = "kismet.device.base.channel";

// Bluetooth
pub const FIELD_BT_NAME: &str = "bluetooth.device.name";
pub const FIELD_BT_MANUFACTURER: &str = "bluetooth.device.manufacturer";

// Sanitization
pub const MAX_GENERIC_STRING_LEN: usize = 256;

pub const SOURCE_TAG: &str = "kismet";

/// Every field path the normalizer reads, for field discovery reports.
pub const REQUIRED_FIELDS: [&str; 18] = [
    FIELD_PHYNAME,
    MAC_FIELDS[0],
    MAC_FIELDS[1],
    MAC_FIELDS[2],
    FIELD_AVG_LAT,
    FIELD_AVG_LON,
    FIELD_AVG_ALT,
    SIGNAL_FIELDS[0],
    SIGNAL_FIELDS[1],
    SIGNAL_FIELDS[2],
    FIELD_FIRST_TIME,
    FIELD_LAST_TIME,
    FIELD_BEACONED_SSID,
    FIELD_PROBED_SSID,
    FIELD_SSID_CRYPT,
    FIELD_CHANNEL,
    FIELD_BT_NAME,
    FIELD_BT_MANUFACTURER,
];

// Sample window the field explorer uses when no key is given
pub const FIELD_EXPLORER_LOOKBACK_SECS: i64 = 300;

// Credential keys
pub const CREDENTIAL_ENV_PREFIX: &str = "KISMET_BRIDGE_";
pub const KISMET_USERNAME_KEY: &str = "kismet_username";
pub const KISMET_PASSWORD_KEY: &str = "kismet_password";
