use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DeviceBatch, RawRecord};

// Source-side port
#[async_trait]
pub trait DeviceSource: Send {
    /// Status document of the source; used as the connectivity probe.
    async fn system_status(&mut self) -> Result<serde_json::Value>;

    /// Records seen since `last_time` (negative: seconds before now; positive: absolute epoch).
    async fn recent_devices(&mut self, last_time: i64) -> Result<Vec<RawRecord>>;

    /// Release the underlying session.
    fn close(&mut self);
}

// Delivery-side port
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn deliver(&self, batch: &DeviceBatch) -> DeliveryOutcome;
}

/// Result of one delivery attempt. Failures are reported, never raised.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered { devices: usize, bytes: usize },
    Failed(crate::error::BridgeError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}
