//! Scripted in-memory transport for tests

use crate::domain::models::DeviceAddress;
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::transport::BleTransport;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MockState {
    /// Scans left that will come back empty
    pub discovery_failures: u32,
    /// Connect calls left that will fail
    pub connect_failures: u32,
    /// Writes left that will fail
    pub write_failures: u32,
    /// How long each scan takes
    pub scan_delay: Duration,

    pub discover_calls: u32,
    pub connect_calls: u32,
    pub disconnect_calls: u32,
    pub write_attempts: Vec<Vec<u8>>,
    /// Frames that reached the peripheral
    pub delivered: Vec<Vec<u8>>,
    pub connected: bool,
}

/// Clones share the same state, so a test can keep one handle for
/// assertions while the manager owns another
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discovery_failures(self, n: u32) -> Self {
        self.state().discovery_failures = n;
        self
    }

    pub fn with_connect_failures(self, n: u32) -> Self {
        self.state().connect_failures = n;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    type Device = DeviceAddress;
    type Link = u32;

    async fn scan_for_address(
        &self,
        address: &DeviceAddress,
        _timeout: Duration,
    ) -> Result<Option<DeviceAddress>, BleError> {
        let delay = self.state().scan_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.discover_calls += 1;
        if state.discovery_failures > 0 {
            state.discovery_failures -= 1;
            return Ok(None);
        }
        Ok(Some(*address))
    }

    async fn connect(&self, _device: &DeviceAddress, _timeout: Duration) -> Result<u32, BleError> {
        let mut state = self.state();
        state.connect_calls += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(BleError::Other("service unavailable".into()));
        }
        state.connected = true;
        Ok(state.connect_calls)
    }

    async fn write_characteristic(
        &self,
        _link: &u32,
        _characteristic: Uuid,
        bytes: &[u8],
    ) -> Result<(), BleError> {
        let mut state = self.state();
        state.write_attempts.push(bytes.to_vec());
        if state.write_failures > 0 {
            state.write_failures -= 1;
            state.connected = false;
            return Err(BleError::Other("link lost".into()));
        }
        if !state.connected {
            return Err(BleError::NotConnected);
        }
        state.delivered.push(bytes.to_vec());
        Ok(())
    }

    async fn disconnect(&self, _link: &u32) -> Result<(), BleError> {
        let mut state = self.state();
        state.disconnect_calls += 1;
        state.connected = false;
        Ok(())
    }

    async fn is_connected(&self, _link: &u32) -> bool {
        self.state().connected
    }
}
