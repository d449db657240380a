//! BLE error types

use crate::domain::models::DeviceAddress;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a [`BleTransport`](super::transport::BleTransport)
#[derive(Debug, Error)]
pub enum BleError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(Uuid),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("not connected")]
    NotConnected,
    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),
    #[error("{0}")]
    Other(String),
}

/// Failures of the connection state machine
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("device {address} not found within {timeout:?}")]
    Discovery {
        address: DeviceAddress,
        timeout: Duration,
    },
    #[error("scanning for {address} failed: {source}")]
    Scan {
        address: DeviceAddress,
        #[source]
        source: BleError,
    },
    #[error("GATT connection to {address} failed after {attempts} attempts")]
    Connect {
        address: DeviceAddress,
        attempts: u32,
        #[source]
        source: Option<BleError>,
    },
    #[error("could not connect to {address} after {attempts} attempts; is there an existing or old connection? Try restarting Bluetooth")]
    RetriesExhausted { address: DeviceAddress, attempts: u32 },
    #[error("writing to characteristic {characteristic} failed: {source}")]
    Write {
        characteristic: Uuid,
        #[source]
        source: BleError,
    },
    #[error("connection is closed")]
    Closed,
}
