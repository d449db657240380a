//! BLE Scanner Module
//!
//! Handles discovery of the LED strip by its hardware address.

use crate::domain::models::DeviceAddress;
use crate::infrastructure::bluetooth::error::BleError;
use btleplug::api::{BDAddr, Central, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the adapter's peripheral list is checked while scanning
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// BLE Scanner bound to a single adapter
pub struct BleScanner {
    adapter: Adapter,
}

impl BleScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Scan until a peripheral with `address` is seen or `timeout` elapses
    pub async fn find_by_address(
        &self,
        address: &DeviceAddress,
        timeout: Duration,
    ) -> Result<Option<Peripheral>, BleError> {
        let target = BDAddr::from(address.octets());
        info!("Starting BLE scan for {}", address);

        self.adapter.start_scan(ScanFilter::default()).await?;
        let found = tokio::time::timeout(timeout, self.wait_for(target)).await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop BLE scan: {}", e);
        }

        match found {
            Ok(peripheral) => peripheral.map(Some),
            Err(_) => {
                debug!("No advertisement from {} within {:?}", address, timeout);
                Ok(None)
            }
        }
    }

    async fn wait_for(&self, target: BDAddr) -> Result<Peripheral, BleError> {
        loop {
            let peripherals = self.adapter.peripherals().await?;
            if let Some(peripheral) = peripherals.into_iter().find(|p| p.address() == target) {
                return Ok(peripheral);
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }
}
