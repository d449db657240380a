//! GATT access through `btleplug`

use crate::domain::models::DeviceAddress;
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::infrastructure::bluetooth::transport::BleTransport;
use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, WriteType};
use btleplug::platform::{Manager, Peripheral};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// [`BleTransport`] backed by the first Bluetooth adapter of the host
pub struct BtleplugTransport {
    _manager: Manager,
    scanner: BleScanner,
}

impl BtleplugTransport {
    pub async fn new() -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleError::NoAdapter)?;

        let info = adapter
            .adapter_info()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        info!("Using Bluetooth adapter: {}", info);

        Ok(Self {
            _manager: manager,
            scanner: BleScanner::new(adapter),
        })
    }
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    type Device = Peripheral;
    type Link = Peripheral;

    async fn scan_for_address(
        &self,
        address: &DeviceAddress,
        timeout: Duration,
    ) -> Result<Option<Peripheral>, BleError> {
        self.scanner.find_by_address(address, timeout).await
    }

    async fn connect(&self, device: &Peripheral, timeout: Duration) -> Result<Peripheral, BleError> {
        tokio::time::timeout(timeout, device.connect())
            .await
            .map_err(|_| BleError::Timeout(timeout))??;
        rollback_on_error(
            async { device.discover_services().await.map_err(BleError::from) },
            async { device.disconnect().await.map_err(BleError::from) },
        )
        .await?;
        Ok(device.clone())
    }

    async fn write_characteristic(
        &self,
        link: &Peripheral,
        characteristic: Uuid,
        bytes: &[u8],
    ) -> Result<(), BleError> {
        let target = link
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic)
            .ok_or(BleError::CharacteristicNotFound(characteristic))?;

        link.write(&target, bytes, WriteType::WithoutResponse).await?;
        Ok(())
    }

    async fn disconnect(&self, link: &Peripheral) -> Result<(), BleError> {
        link.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self, link: &Peripheral) -> bool {
        link.is_connected().await.unwrap_or(false)
    }
}

/// Await `setup`; if it fails, await `teardown` before returning the error so
/// a half-opened connection is not left behind
async fn rollback_on_error<S, D>(setup: S, teardown: D) -> Result<(), BleError>
where
    S: Future<Output = Result<(), BleError>>,
    D: Future<Output = Result<(), BleError>>,
{
    match setup.await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Err(teardown_err) = teardown.await {
                warn!("Failed to drop half-open connection: {}", teardown_err);
            }
            Err(e)
        }
    }
}
