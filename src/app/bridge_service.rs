use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::app::ports::{BatchSink, DeliveryOutcome, DeviceSource};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::metrics;
use crate::pipeline::normalize::DeviceNormalizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusConfig {
    pub poll_interval_secs: f64,
    pub lookback_seconds: i64,
    pub gps_obfuscation: bool,
}

/// Point-in-time view of the service, safe to take from another task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    /// Epoch seconds of the last cycle whose fetch succeeded.
    pub last_poll_time: Option<i64>,
    pub cycles: u64,
    pub config: StatusConfig,
}

/// Shared, lock-guarded status. Clones observe the same service.
#[derive(Debug, Clone)]
pub struct StatusHandle(Arc<Mutex<ServiceStatus>>);

impl StatusHandle {
    pub fn snapshot(&self) -> ServiceStatus {
        match self.0.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut ServiceStatus)) {
        match self.0.lock() {
            Ok(mut status) => f(&mut *status),
            Err(poisoned) => f(&mut *poisoned.into_inner()),
        }
    }
}

/// Outcome of one fetch → normalize → forward cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub received: usize,
    pub normalized: usize,
    pub delivered: bool,
}

/// Poll orchestrator: fetches recent devices, normalizes them and forwards the batch.
pub struct BridgeService {
    source: Box<dyn DeviceSource>,
    sink: Box<dyn BatchSink>,
    normalizer: DeviceNormalizer,
    poll_interval: Duration,
    lookback_seconds: i64,
    status: StatusHandle,
}

impl BridgeService {
    pub fn new(
        source: Box<dyn DeviceSource>,
        sink: Box<dyn BatchSink>,
        normalizer: DeviceNormalizer,
        config: &ServiceConfig,
    ) -> Self {
        let poll_interval = Duration::from_secs(config.poll_interval_secs);
        let status = ServiceStatus {
            state: ServiceState::Stopped,
            last_poll_time: None,
            cycles: 0,
            config: StatusConfig {
                poll_interval_secs: poll_interval.as_secs_f64(),
                lookback_seconds: config.lookback_seconds,
                gps_obfuscation: normalizer.config().obfuscate_gps,
            },
        };
        info!("Bridge service initialized");
        Self {
            source,
            sink,
            normalizer,
            poll_interval,
            lookback_seconds: config.lookback_seconds,
            status: StatusHandle(Arc::new(Mutex::new(status))),
        }
    }

    /// Override the sleep between cycles.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        let secs = interval.as_secs_f64();
        self.status.update(|s| s.config.poll_interval_secs = secs);
        self
    }

    pub fn status(&self) -> ServiceStatus {
        self.status.snapshot()
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Probe the source, then poll until `shutdown` turns true (or its sender is dropped).
    ///
    /// A failed probe is returned to the caller. Errors inside a cycle are logged and the loop
    /// carries on after the normal sleep.
    pub async fn start(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Starting bridge service");
        self.status.update(|s| s.state = ServiceState::Running);

        let probe = match self.source.system_status().await {
            Ok(probe) => probe,
            Err(e) => {
                error!("Kismet connectivity probe failed: {}", e);
                self.stop();
                return Err(e);
            }
        };
        let version = probe
            .get("kismet.system.version")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        info!("Connected to Kismet: {}", version);

        while !*shutdown.borrow() {
            let span = info_span!("poll_cycle", cycle_id = %Uuid::new_v4());
            if let Err(e) = self.poll_once().instrument(span).await {
                if e.is_fatal() {
                    error!(kind = e.kind(), "Poll cycle failed, check configuration: {}", e);
                } else {
                    warn!(kind = e.kind(), "Poll cycle failed: {}", e);
                }
                metrics::service::cycle_failed(e.kind());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed");
                        break;
                    }
                }
            }
        }

        self.stop();
        Ok(())
    }

    /// Run exactly one cycle. Delivery failures are reported in the result, not raised.
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        debug!("Polling Kismet for devices (last {}s)", self.lookback_seconds);
        let records = self.source.recent_devices(-self.lookback_seconds).await?;
        let polled_at = chrono::Utc::now().timestamp();
        self.status.update(|s| {
            s.last_poll_time = Some(polled_at);
            s.cycles += 1;
        });
        metrics::service::cycle_completed();

        if records.is_empty() {
            debug!("No new devices found");
            return Ok(CycleReport::default());
        }
        info!("Found {} devices", records.len());

        let (batch, stats) = self.normalizer.normalize_batch(&records);
        let mut report = CycleReport {
            received: stats.received,
            normalized: stats.normalized,
            delivered: false,
        };
        if batch.is_empty() {
            debug!("No devices after normalization");
            return Ok(report);
        }
        info!("Normalized {} devices", batch.len());

        match self.sink.deliver(&batch).await {
            DeliveryOutcome::Delivered { .. } => report.delivered = true,
            DeliveryOutcome::Failed(e) => warn!(kind = e.kind(), "Batch not delivered this cycle"),
        }
        Ok(report)
    }

    /// Mark the service stopped and release the source session.
    pub fn stop(&mut self) {
        info!("Stopping bridge service");
        self.status.update(|s| s.state = ServiceState::Stopped);
        self.source.close();
        info!("Bridge service stopped");
    }
}
