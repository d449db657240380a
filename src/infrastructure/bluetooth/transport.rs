//! BLE transport abstraction
//!
//! The connection manager only needs these five operations from a BLE
//! stack. [`BtleplugTransport`](super::gatt::BtleplugTransport) provides them
//! on the host's Bluetooth adapter; tests use a scripted in-memory stand-in.

use crate::domain::models::DeviceAddress;
use crate::infrastructure::bluetooth::error::BleError;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait BleTransport: Send + Sync {
    /// A discovered, not yet connected peripheral
    type Device: Send + Sync;
    /// An open GATT connection
    type Link: Send + Sync;

    /// Scan until a peripheral advertising `address` shows up.
    ///
    /// Returns `Ok(None)` if nothing matched within `timeout`.
    async fn scan_for_address(
        &self,
        address: &DeviceAddress,
        timeout: Duration,
    ) -> Result<Option<Self::Device>, BleError>;

    async fn connect(&self, device: &Self::Device, timeout: Duration)
        -> Result<Self::Link, BleError>;

    /// Write without waiting for a response from the peripheral
    async fn write_characteristic(
        &self,
        link: &Self::Link,
        characteristic: Uuid,
        bytes: &[u8],
    ) -> Result<(), BleError>;

    async fn disconnect(&self, link: &Self::Link) -> Result<(), BleError>;

    async fn is_connected(&self, link: &Self::Link) -> bool;
}
